//! Durable records of image generation requests and their outputs, kept in
//! the `dynamo` schema.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// A new in-flight image request row
#[derive(Debug, Clone)]
pub struct NewImageRequest {
    pub id: Uuid,
    pub twitch_user_id: String,
    pub broadcast_id: Option<i32>,
    pub screening_id: Option<Uuid>,
    pub style: String,
    pub inputs: serde_json::Value,
    pub prompt: String,
}

/// Database operations the request handler depends on
#[async_trait]
pub trait ImageRequestStore: Send + Sync {
    /// Inserts a new in-flight request row. Fails on a duplicate id.
    async fn insert_request(&self, request: NewImageRequest) -> Result<()>;

    /// Marks an in-flight request as failed with the given message and
    /// returns the number of rows affected. 0 means the id is unknown or the
    /// request already reached a terminal state; callers treat both as
    /// non-errors.
    async fn mark_failure(&self, request_id: Uuid, error_message: &str) -> Result<u64>;

    /// Marks an in-flight request as finished successfully, leaving the
    /// error message null. Same affected-row semantics as `mark_failure`.
    async fn mark_success(&self, request_id: Uuid) -> Result<u64>;

    /// Records a stored image produced for a request. Fails on a
    /// `(request_id, index)` collision or a missing parent row.
    async fn insert_image(&self, request_id: Uuid, index: i32, url: &str, color: &str)
        -> Result<()>;

    /// Records an auxiliary text generation made for a request.
    async fn insert_answer(&self, request_id: Uuid, prompt: &str, value: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct ImageRequestRepo {
    pool: PgPool,
}

impl ImageRequestRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRequestStore for ImageRequestRepo {
    async fn insert_request(&self, request: NewImageRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dynamo.image_request
                (id, twitch_user_id, broadcast_id, screening_id, style, inputs, prompt)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(request.id)
        .bind(&request.twitch_user_id)
        .bind(request.broadcast_id)
        .bind(request.screening_id)
        .bind(&request.style)
        .bind(&request.inputs)
        .bind(&request.prompt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failure(&self, request_id: Uuid, error_message: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE dynamo.image_request
               SET finished_at = now(), error_message = $2
             WHERE id = $1 AND finished_at IS NULL
            "#,
        )
        .bind(request_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_success(&self, request_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE dynamo.image_request
               SET finished_at = now()
             WHERE id = $1 AND finished_at IS NULL
            "#,
        )
        .bind(request_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_image(
        &self,
        request_id: Uuid,
        index: i32,
        url: &str,
        color: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dynamo.image (image_request_id, "index", url, color)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(request_id)
        .bind(index)
        .bind(url)
        .bind(color)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_answer(&self, request_id: Uuid, prompt: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dynamo.answer (image_request_id, prompt, value)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(request_id)
        .bind(prompt)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
