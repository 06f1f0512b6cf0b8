//! HTTP API handlers for snailtrack-server

pub mod ai;
pub mod auth;
pub mod buildinfo;
pub mod health;
pub mod sightings;
pub mod snails;
pub mod upload;

pub use ai::{analyze, estimate_age, identify};
pub use auth::auth_middleware;
pub use buildinfo::{get_build_info, BuildInfo};
pub use health::health_routes;
pub use sightings::{create_sighting, delete_sighting};
pub use snails::{add_image, create_snail, delete_snail, get_snail, list_snails, set_primary_image, update_snail};
pub use upload::upload;
