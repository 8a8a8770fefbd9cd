use sqlx::{types::Json, PgPool};
use tracing::{debug, info};
use shared::models::*;
use crate::store::{check_options, new_poll_id, PollStore, StoreError};

/// Postgres-backed store keeping each poll as one JSONB document.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[rocket::async_trait]
impl PollStore for DocumentStore {
    async fn get_poll(&self, id: &str) -> Result<Poll, StoreError> {
        sqlx::query_scalar::<_, Json<Poll>>("SELECT document FROM polls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(|Json(poll)| poll)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE polls SET document = $2 WHERE id = $1")
            .bind(&poll.id)
            .bind(Json(poll))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(poll.id.clone()));
        }
        Ok(())
    }

    async fn create_poll(&self, options: Vec<PollOption>) -> Result<Poll, StoreError> {
        check_options(&options)?;
        let poll = Poll::new(new_poll_id(), options);

        sqlx::query("INSERT INTO polls (id, document) VALUES ($1, $2)")
            .bind(&poll.id)
            .bind(Json(&poll))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        debug!("Inserted poll document {}", poll.id);
        Ok(poll)
    }

    async fn delete_poll(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        info!("Closed document store connection pool");
        Ok(())
    }
}
