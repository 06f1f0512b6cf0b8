//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked individual
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Snail {
    pub id: i64,
    pub name: String,
    pub species_tag: String,
    pub approx_age: Option<String>,
    pub age_explanation: Option<String>,
    pub age_confidence: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snail row plus list-view extras
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SnailSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub snail: Snail,
    pub primary_image: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Photo of a snail. The embedding column is read only by the matcher.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SnailImage {
    pub id: i64,
    pub snail_id: i64,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sighting {
    pub id: i64,
    pub snail_id: i64,
    pub garden_location: String,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SightingImage {
    pub id: i64,
    pub sighting_id: i64,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Image reference supplied by clients when creating records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImage {
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Snail with its photos and sighting history, as shown on the detail page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnailDetail {
    #[serde(flatten)]
    pub snail: Snail,
    /// Primary first, then creation order
    pub images: Vec<SnailImage>,
    /// Newest first
    pub sightings: Vec<SightingDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingDetail {
    #[serde(flatten)]
    pub sighting: Sighting,
    pub images: Vec<SightingImage>,
}

/// Validated input for a new snail
#[derive(Debug, Clone)]
pub struct NewSnail {
    pub name: String,
    pub species_tag: String,
    pub approx_age: Option<String>,
    pub age_explanation: Option<String>,
    pub age_confidence: Option<String>,
    pub notes: Option<String>,
    /// Must not be empty; the first becomes primary
    pub images: Vec<NewImage>,
}

/// Partial update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnailUpdate {
    pub name: Option<String>,
    pub species_tag: Option<String>,
    pub notes: Option<String>,
    pub approx_age: Option<String>,
    pub age_explanation: Option<String>,
    pub age_confidence: Option<String>,
}

/// Validated input for a new sighting
#[derive(Debug, Clone)]
pub struct NewSighting {
    pub garden_location: String,
    pub notes: Option<String>,
    pub images: Vec<NewImage>,
}
