//! Greeting operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::Greeting;

use super::Database;

impl Database {
    /// Insert a new greeting
    pub async fn insert_greeting(&self, text: &str) -> Result<Greeting, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO greetings (text, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(text)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(Greeting {
            id: result.get("id"),
            text: text.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a greeting by ID
    pub async fn get_greeting(&self, id: i64) -> Result<Option<Greeting>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, text, created_at, updated_at
            FROM greetings
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Greeting::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all greetings, oldest first
    pub async fn list_greetings(&self) -> Result<Vec<Greeting>, DbError> {
        let rows = sqlx::query("SELECT id, text, created_at, updated_at FROM greetings ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Greeting::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Replace the text of a greeting
    pub async fn update_greeting(&self, id: i64, text: &str) -> Result<Option<Greeting>, DbError> {
        let now = Utc::now();
        let result = sqlx::query("UPDATE greetings SET text = ?, updated_at = ? WHERE id = ?")
            .bind(text)
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_greeting(id).await
    }

    /// Delete a greeting
    pub async fn delete_greeting(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM greetings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
