//! Sighting persistence

use chrono::Utc;
use snailtrack_common::db::{NewSighting, Sighting, SightingDetail, SightingImage};
use snailtrack_common::Result;
use sqlx::SqlitePool;

/// Record a sighting and its photos. Returns `None` if the snail does not exist.
pub async fn create_sighting(
    pool: &SqlitePool,
    snail_id: i64,
    new: &NewSighting,
) -> Result<Option<SightingDetail>> {
    let mut tx = pool.begin().await?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM snails WHERE id = ?")
        .bind(snail_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let now = Utc::now();
    let sighting = sqlx::query_as::<_, Sighting>(
        "INSERT INTO sightings (snail_id, garden_location, notes, timestamp) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(snail_id)
    .bind(&new.garden_location)
    .bind(&new.notes)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let mut images = Vec::with_capacity(new.images.len());
    for image in &new.images {
        let row = sqlx::query_as::<_, SightingImage>(
            "INSERT INTO sighting_images (sighting_id, image_url, thumbnail_url, created_at) \
             VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(sighting.id)
        .bind(&image.url)
        .bind(&image.thumbnail_url)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        images.push(row);
    }

    tx.commit().await?;
    Ok(Some(SightingDetail { sighting, images }))
}

/// Sightings of one snail with their photos, newest first
pub async fn list_sightings(pool: &SqlitePool, snail_id: i64) -> Result<Vec<SightingDetail>> {
    let sightings = sqlx::query_as::<_, Sighting>(
        "SELECT * FROM sightings WHERE snail_id = ? ORDER BY timestamp DESC, id DESC",
    )
    .bind(snail_id)
    .fetch_all(pool)
    .await?;

    let images = sqlx::query_as::<_, SightingImage>(
        r#"
        SELECT si.* FROM sighting_images si
        JOIN sightings s ON s.id = si.sighting_id
        WHERE s.snail_id = ?
        ORDER BY si.id ASC
        "#,
    )
    .bind(snail_id)
    .fetch_all(pool)
    .await?;

    Ok(sightings
        .into_iter()
        .map(|sighting| {
            let images = images
                .iter()
                .filter(|img| img.sighting_id == sighting.id)
                .cloned()
                .collect();
            SightingDetail { sighting, images }
        })
        .collect())
}

/// Returns false if the sighting does not exist
pub async fn delete_sighting(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sightings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
