//! Database operations
//!
//! Free functions over a `SqlitePool`, one module per table group. Lookups
//! by id return `Option` (or `bool` for deletes) and leave the 404 decision
//! to the handler.

pub mod images;
pub mod sightings;
pub mod snails;

pub use images::{add_image, list_images, set_primary_image, store_embedding};
pub use sightings::{create_sighting, delete_sighting, list_sightings};
pub use snails::{create_snail, delete_snail, get_snail, get_snail_detail, list_snails, update_snail, SnailSort};
