//! Snail persistence

use chrono::Utc;
use snailtrack_common::db::{NewSnail, Snail, SnailDetail, SnailImage, SnailSummary, SnailUpdate};
use snailtrack_common::{Error, Result};
use sqlx::SqlitePool;

use super::images::list_images;
use super::sightings::list_sightings;

/// List ordering for `GET /api/snails`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnailSort {
    /// Alphabetical by name
    #[default]
    Name,
    /// Most recently seen first, never-seen last
    LastSeen,
}

impl SnailSort {
    /// Anything other than `last_seen` sorts by name
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("last_seen") => SnailSort::LastSeen,
            _ => SnailSort::Name,
        }
    }

    fn order_clause(self) -> &'static str {
        match self {
            SnailSort::Name => "ORDER BY s.name COLLATE NOCASE ASC, s.id ASC",
            SnailSort::LastSeen => "ORDER BY last_seen IS NULL, last_seen DESC, s.name COLLATE NOCASE ASC",
        }
    }
}

/// List snails with their primary image and last sighting time
///
/// `search` is a case-insensitive substring match on name or species tag.
pub async fn list_snails(
    pool: &SqlitePool,
    search: Option<&str>,
    sort: SnailSort,
) -> Result<Vec<SnailSummary>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());

    let mut sql = String::from(
        r#"
        SELECT s.*,
               (SELECT image_url FROM snail_images
                WHERE snail_id = s.id
                ORDER BY is_primary DESC, id ASC LIMIT 1) AS primary_image,
               (SELECT MAX(timestamp) FROM sightings WHERE snail_id = s.id) AS last_seen
        FROM snails s
        "#,
    );
    if search.is_some() {
        sql.push_str(r"WHERE s.name LIKE ?1 ESCAPE '\' OR s.species_tag LIKE ?1 ESCAPE '\' ");
    }
    sql.push_str(sort.order_clause());

    let mut query = sqlx::query_as::<_, SnailSummary>(&sql);
    if let Some(term) = search {
        query = query.bind(format!("%{}%", escape_like(term)));
    }

    Ok(query.fetch_all(pool).await?)
}

/// Insert a snail and its images in one transaction. The first image is
/// marked primary.
pub async fn create_snail(pool: &SqlitePool, new: &NewSnail) -> Result<(Snail, Vec<SnailImage>)> {
    if new.images.is_empty() {
        return Err(Error::InvalidInput("At least one image is required".to_string()));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let snail = sqlx::query_as::<_, Snail>(
        r#"
        INSERT INTO snails (name, species_tag, approx_age, age_explanation, age_confidence, notes,
                            created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new.name)
    .bind(&new.species_tag)
    .bind(&new.approx_age)
    .bind(&new.age_explanation)
    .bind(&new.age_confidence)
    .bind(&new.notes)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let mut images = Vec::with_capacity(new.images.len());
    for (i, image) in new.images.iter().enumerate() {
        let row = sqlx::query_as::<_, SnailImage>(
            r#"
            INSERT INTO snail_images (snail_id, image_url, thumbnail_url, is_primary, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, snail_id, image_url, thumbnail_url, is_primary, created_at
            "#,
        )
        .bind(snail.id)
        .bind(&image.url)
        .bind(&image.thumbnail_url)
        .bind(i == 0)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        images.push(row);
    }

    tx.commit().await?;
    Ok((snail, images))
}

pub async fn get_snail(pool: &SqlitePool, id: i64) -> Result<Option<Snail>> {
    let snail = sqlx::query_as::<_, Snail>("SELECT * FROM snails WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(snail)
}

/// Snail with images and sightings, or `None` if it does not exist
pub async fn get_snail_detail(pool: &SqlitePool, id: i64) -> Result<Option<SnailDetail>> {
    let Some(snail) = get_snail(pool, id).await? else {
        return Ok(None);
    };

    let images = list_images(pool, id).await?;
    let sightings = list_sightings(pool, id).await?;

    Ok(Some(SnailDetail {
        snail,
        images,
        sightings,
    }))
}

/// Apply a partial update and bump `updated_at`
pub async fn update_snail(pool: &SqlitePool, id: i64, update: &SnailUpdate) -> Result<Option<Snail>> {
    let snail = sqlx::query_as::<_, Snail>(
        r#"
        UPDATE snails
        SET name = COALESCE(?, name),
            species_tag = COALESCE(?, species_tag),
            notes = COALESCE(?, notes),
            approx_age = COALESCE(?, approx_age),
            age_explanation = COALESCE(?, age_explanation),
            age_confidence = COALESCE(?, age_confidence),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&update.name)
    .bind(&update.species_tag)
    .bind(&update.notes)
    .bind(&update.approx_age)
    .bind(&update.age_explanation)
    .bind(&update.age_confidence)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(snail)
}

/// Delete a snail; images and sightings cascade. Returns false if absent.
pub async fn delete_snail(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM snails WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sightings::create_sighting;
    use snailtrack_common::db::{create_schema, NewImage, NewSighting};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    fn new_snail(name: &str, species: &str, urls: &[&str]) -> NewSnail {
        NewSnail {
            name: name.to_string(),
            species_tag: species.to_string(),
            approx_age: None,
            age_explanation: None,
            age_confidence: None,
            notes: None,
            images: urls
                .iter()
                .map(|u| NewImage {
                    url: u.to_string(),
                    thumbnail_url: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_marks_first_image_primary() {
        let pool = memory_pool().await;
        let (snail, images) = create_snail(&pool, &new_snail("Shelly", "Garden snail", &["a", "b"]))
            .await
            .unwrap();

        assert_eq!(snail.name, "Shelly");
        assert_eq!(images.len(), 2);
        assert!(images[0].is_primary);
        assert!(!images[1].is_primary);
    }

    #[tokio::test]
    async fn test_create_requires_image() {
        let pool = memory_pool().await;
        let result = create_snail(&pool, &new_snail("Nobody", "Garden snail", &[])).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_list_search_and_sort() {
        let pool = memory_pool().await;
        let (zed, _) = create_snail(&pool, &new_snail("Zed", "Roman snail", &["z"])).await.unwrap();
        create_snail(&pool, &new_snail("amber", "Garden snail", &["a"])).await.unwrap();
        create_snail(&pool, &new_snail("Milo", "Garden snail", &["m"])).await.unwrap();

        let by_name = list_snails(&pool, None, SnailSort::Name).await.unwrap();
        let names: Vec<&str> = by_name.iter().map(|s| s.snail.name.as_str()).collect();
        assert_eq!(names, vec!["amber", "Milo", "Zed"]);
        assert_eq!(by_name[0].primary_image.as_deref(), Some("a"));

        let found = list_snails(&pool, Some("ROMAN"), SnailSort::Name).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].snail.id, zed.id);

        assert!(list_snails(&pool, Some("%"), SnailSort::Name).await.unwrap().is_empty());

        create_sighting(
            &pool,
            zed.id,
            &NewSighting {
                garden_location: "Rockery".to_string(),
                notes: None,
                images: vec![],
            },
        )
        .await
        .unwrap();

        let by_seen = list_snails(&pool, None, SnailSort::LastSeen).await.unwrap();
        assert_eq!(by_seen[0].snail.name, "Zed");
        assert!(by_seen[0].last_seen.is_some());
        assert!(by_seen[1].last_seen.is_none());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_absent_fields() {
        let pool = memory_pool().await;
        let mut new = new_snail("Shelly", "Garden snail", &["a"]);
        new.notes = Some("Likes lettuce".to_string());
        let (snail, _) = create_snail(&pool, &new).await.unwrap();

        let updated = update_snail(
            &pool,
            snail.id,
            &SnailUpdate {
                name: Some("Shelly II".to_string()),
                ..SnailUpdate::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "Shelly II");
        assert_eq!(updated.notes.as_deref(), Some("Likes lettuce"));
        assert!(updated.updated_at >= snail.updated_at);

        assert!(update_snail(&pool, 999, &SnailUpdate::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let pool = memory_pool().await;
        let (snail, _) = create_snail(&pool, &new_snail("Gone", "Garden snail", &["a"])).await.unwrap();

        assert!(delete_snail(&pool, snail.id).await.unwrap());
        assert!(!delete_snail(&pool, snail.id).await.unwrap());
        assert!(get_snail_detail(&pool, snail.id).await.unwrap().is_none());

        let (images,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM snail_images")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(images, 0);
    }

    #[test]
    fn test_sort_param() {
        assert_eq!(SnailSort::from_param(Some("last_seen")), SnailSort::LastSeen);
        assert_eq!(SnailSort::from_param(Some("name")), SnailSort::Name);
        assert_eq!(SnailSort::from_param(Some("bogus")), SnailSort::Name);
        assert_eq!(SnailSort::from_param(None), SnailSort::Name);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
