//! Candidate selection for matching
//!
//! One representative image per known snail: the primary image if one is
//! flagged, otherwise the earliest image. Snails without images never appear.

use async_trait::async_trait;
use snailtrack_common::embedding::bytes_to_embedding;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use super::{CandidateRow, MatchError};

/// Source of candidates for one matching run
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Up to `limit` candidates, newest snail first, one row per snail
    async fn list_candidates(&self, limit: u32) -> Result<Vec<CandidateRow>, MatchError>;
}

/// SQLite-backed candidate source
#[derive(Clone)]
pub struct SqliteCandidateRepository {
    pool: SqlitePool,
}

impl SqliteCandidateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateRepository for SqliteCandidateRepository {
    async fn list_candidates(&self, limit: u32) -> Result<Vec<CandidateRow>, MatchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // The correlated subquery pins exactly one image per snail
        let rows = sqlx::query(
            r#"
            SELECT s.id AS snail_id, s.name, s.species_tag,
                   si.image_url, si.thumbnail_url, si.embedding
            FROM snails s
            JOIN snail_images si ON si.id = (
                SELECT id FROM snail_images
                WHERE snail_id = s.id
                ORDER BY is_primary DESC, id ASC
                LIMIT 1
            )
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MatchError::Repository(e.to_string()))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let snail_id: i64 = row.try_get("snail_id").map_err(repo_err)?;
            let blob: Option<Vec<u8>> = row.try_get("embedding").map_err(repo_err)?;

            let embedding = match blob {
                Some(bytes) => match bytes_to_embedding(&bytes) {
                    Ok(v) if !v.is_empty() => Some(v),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(snail_id, error = %e, "Ignoring corrupt stored embedding");
                        None
                    }
                },
                None => None,
            };

            candidates.push(CandidateRow {
                snail_id,
                name: row.try_get("name").map_err(repo_err)?,
                species_tag: row.try_get("species_tag").map_err(repo_err)?,
                image_url: row.try_get("image_url").map_err(repo_err)?,
                thumbnail_url: row.try_get("thumbnail_url").map_err(repo_err)?,
                embedding,
            });
        }

        Ok(candidates)
    }
}

fn repo_err(e: sqlx::Error) -> MatchError {
    MatchError::Repository(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snailtrack_common::db::create_schema;
    use snailtrack_common::embedding::embedding_to_bytes;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashSet;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    async fn insert_snail(pool: &SqlitePool, name: &str, created_at: &str) -> i64 {
        sqlx::query("INSERT INTO snails (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(created_at)
            .bind(created_at)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    async fn insert_image(
        pool: &SqlitePool,
        snail_id: i64,
        url: &str,
        primary: bool,
        embedding: Option<Vec<u8>>,
    ) {
        sqlx::query(
            "INSERT INTO snail_images (snail_id, image_url, is_primary, embedding) VALUES (?, ?, ?, ?)",
        )
        .bind(snail_id)
        .bind(url)
        .bind(primary)
        .bind(embedding)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_one_row_per_snail_newest_first() {
        let pool = memory_pool().await;
        let old = insert_snail(&pool, "Old", "2024-01-01 10:00:00").await;
        let new = insert_snail(&pool, "New", "2024-06-01 10:00:00").await;
        insert_image(&pool, old, "old-1", false, None).await;
        insert_image(&pool, old, "old-2", false, None).await;
        insert_image(&pool, new, "new-1", false, None).await;
        insert_image(&pool, new, "new-2", true, None).await;

        let repo = SqliteCandidateRepository::new(pool);
        let candidates = repo.list_candidates(20).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].snail_id, new);
        assert_eq!(candidates[0].image_url, "new-2");
        assert_eq!(candidates[1].snail_id, old);
        assert_eq!(candidates[1].image_url, "old-1");

        let ids: HashSet<i64> = candidates.iter().map(|c| c.snail_id).collect();
        assert_eq!(ids.len(), candidates.len());
    }

    #[tokio::test]
    async fn test_duplicate_primaries_pick_lowest_id() {
        // Rows written before primaries were kept unique
        let pool = memory_pool().await;
        let id = insert_snail(&pool, "Legacy", "2023-05-01 09:00:00").await;
        insert_image(&pool, id, "w", false, None).await;
        insert_image(&pool, id, "x", true, None).await;
        insert_image(&pool, id, "y", true, None).await;
        insert_image(&pool, id, "z", true, None).await;

        let repo = SqliteCandidateRepository::new(pool);
        let candidates = repo.list_candidates(20).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].image_url, "x");
    }

    #[tokio::test]
    async fn test_snails_without_images_are_absent() {
        let pool = memory_pool().await;
        let with = insert_snail(&pool, "Pictured", "2024-01-01 10:00:00").await;
        insert_snail(&pool, "Camera shy", "2024-02-01 10:00:00").await;
        insert_image(&pool, with, "p-1", false, None).await;

        let repo = SqliteCandidateRepository::new(pool);
        let candidates = repo.list_candidates(20).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Pictured");
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let pool = memory_pool().await;
        for i in 0..5 {
            let id = insert_snail(&pool, &format!("s{}", i), &format!("2024-01-0{} 00:00:00", i + 1)).await;
            insert_image(&pool, id, &format!("img-{}", i), false, None).await;
        }

        let repo = SqliteCandidateRepository::new(pool);
        let candidates = repo.list_candidates(3).await.unwrap();
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["s4", "s3", "s2"]);

        assert!(repo.list_candidates(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embeddings_decoded_and_corrupt_ignored() {
        let pool = memory_pool().await;
        let good = insert_snail(&pool, "Good", "2024-01-02 00:00:00").await;
        let bad = insert_snail(&pool, "Bad", "2024-01-01 00:00:00").await;
        insert_image(&pool, good, "g", true, Some(embedding_to_bytes(&[0.5, -1.0]))).await;
        insert_image(&pool, bad, "b", true, Some(vec![1, 2, 3])).await;

        let repo = SqliteCandidateRepository::new(pool);
        let candidates = repo.list_candidates(20).await.unwrap();

        assert_eq!(candidates[0].embedding, Some(vec![0.5, -1.0]));
        assert_eq!(candidates[1].embedding, None);
    }

    #[tokio::test]
    async fn test_closed_pool_is_repository_error() {
        let pool = memory_pool().await;
        pool.close().await;

        let repo = SqliteCandidateRepository::new(pool);
        assert!(matches!(
            repo.list_candidates(20).await,
            Err(MatchError::Repository(_))
        ));
    }
}
