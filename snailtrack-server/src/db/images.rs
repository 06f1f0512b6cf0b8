//! Snail image persistence
//!
//! At most one image per snail carries `is_primary`. Every write that sets
//! the flag clears it on the snail's other images in the same transaction.

use chrono::Utc;
use snailtrack_common::db::{NewImage, SnailImage};
use snailtrack_common::embedding::embedding_to_bytes;
use snailtrack_common::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};

const IMAGE_COLUMNS: &str = "id, snail_id, image_url, thumbnail_url, is_primary, created_at";

/// Images of one snail, primary first, then creation order
pub async fn list_images(pool: &SqlitePool, snail_id: i64) -> Result<Vec<SnailImage>> {
    let images = sqlx::query_as::<_, SnailImage>(&format!(
        "SELECT {} FROM snail_images WHERE snail_id = ? ORDER BY is_primary DESC, id ASC",
        IMAGE_COLUMNS
    ))
    .bind(snail_id)
    .fetch_all(pool)
    .await?;
    Ok(images)
}

/// Attach an image to an existing snail
///
/// The image becomes primary when asked to, or when the snail has no other
/// image. Returns `None` if the snail does not exist.
pub async fn add_image(
    pool: &SqlitePool,
    snail_id: i64,
    image: &NewImage,
    make_primary: bool,
) -> Result<Option<SnailImage>> {
    let mut tx = pool.begin().await?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM snails WHERE id = ?")
        .bind(snail_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM snail_images WHERE snail_id = ?")
        .bind(snail_id)
        .fetch_one(&mut *tx)
        .await?;

    let primary = make_primary || existing == 0;
    if primary {
        clear_primary(&mut tx, snail_id).await?;
    }

    let row = sqlx::query_as::<_, SnailImage>(&format!(
        "INSERT INTO snail_images (snail_id, image_url, thumbnail_url, is_primary, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        IMAGE_COLUMNS
    ))
    .bind(snail_id)
    .bind(&image.url)
    .bind(&image.thumbnail_url)
    .bind(primary)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(row))
}

/// Make `image_id` the snail's primary image
///
/// Returns `None` if the image does not exist or belongs to another snail.
pub async fn set_primary_image(
    pool: &SqlitePool,
    snail_id: i64,
    image_id: i64,
) -> Result<Option<SnailImage>> {
    let mut tx = pool.begin().await?;

    let owned: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM snail_images WHERE id = ? AND snail_id = ?")
            .bind(image_id)
            .bind(snail_id)
            .fetch_optional(&mut *tx)
            .await?;
    if owned.is_none() {
        return Ok(None);
    }

    clear_primary(&mut tx, snail_id).await?;

    let row = sqlx::query_as::<_, SnailImage>(&format!(
        "UPDATE snail_images SET is_primary = 1 WHERE id = ? RETURNING {}",
        IMAGE_COLUMNS
    ))
    .bind(image_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(row))
}

/// Store the embedding vector for an image
pub async fn store_embedding(pool: &SqlitePool, image_id: i64, embedding: &[f32]) -> Result<()> {
    sqlx::query("UPDATE snail_images SET embedding = ? WHERE id = ?")
        .bind(embedding_to_bytes(embedding))
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn clear_primary(tx: &mut Transaction<'_, Sqlite>, snail_id: i64) -> Result<()> {
    sqlx::query("UPDATE snail_images SET is_primary = 0 WHERE snail_id = ? AND is_primary = 1")
        .bind(snail_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
