//! Account operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{Account, NewAccount};
use crate::repository::Database;

const SELECT_ACCOUNT: &str = r#"
    SELECT a.id, a.username, a.password_hash, a.enabled, a.locked, a.expired,
           a.credentials_expired, a.created_at, a.updated_at,
           GROUP_CONCAT(r.role) AS roles
    FROM accounts a
    LEFT JOIN account_roles r ON r.account_id = a.id
"#;

/// Map a UNIQUE violation on `username` to `Duplicate`
fn duplicate_or(e: sqlx::Error, username: &str) -> DbError {
    if e
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
    {
        DbError::Duplicate(format!("Account '{}' already exists", username))
    } else {
        DbError::from(e)
    }
}

impl Database {
    // ==================== Account Operations ====================

    /// Insert a new account together with its roles
    pub async fn insert_account(&self, account: NewAccount) -> Result<Account, DbError> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO accounts (username, password_hash, enabled, locked, expired,
                                  credentials_expired, created_at, updated_at)
            VALUES (?, ?, 1, 0, 0, 0, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| duplicate_or(e, &account.username))?;

        let id: i64 = result.get("id");

        let mut roles = Vec::with_capacity(account.roles.len());
        for role in account.roles {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        for role in &roles {
            sqlx::query("INSERT INTO account_roles (account_id, role) VALUES (?, ?)")
                .bind(id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Account {
            id,
            username: account.username,
            password_hash: account.password_hash,
            enabled: true,
            locked: false,
            expired: false,
            credentials_expired: false,
            roles,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an account by username
    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE a.username = ? GROUP BY a.id");
        let result = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| Account::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get an account by ID
    pub async fn get_account_by_id(&self, id: i64) -> Result<Option<Account>, DbError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE a.id = ? GROUP BY a.id");
        let result = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| Account::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
        let sql = format!("{SELECT_ACCOUNT} GROUP BY a.id ORDER BY a.username");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| Account::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Update account password. Clears the credentials-expired flag.
    pub async fn update_account_password(&self, id: i64, password_hash: &str) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = ?, credentials_expired = 0, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable an account
    pub async fn set_account_enabled(&self, id: i64, enabled: bool) -> Result<bool, DbError> {
        self.set_account_flag(id, "enabled", enabled).await
    }

    /// Lock or unlock an account
    pub async fn set_account_locked(&self, id: i64, locked: bool) -> Result<bool, DbError> {
        self.set_account_flag(id, "locked", locked).await
    }

    /// Mark an account (or its credentials) as expired
    pub async fn set_account_expired(&self, id: i64, expired: bool) -> Result<bool, DbError> {
        self.set_account_flag(id, "expired", expired).await
    }

    pub async fn set_credentials_expired(&self, id: i64, expired: bool) -> Result<bool, DbError> {
        self.set_account_flag(id, "credentials_expired", expired).await
    }

    // `column` is always one of the literals above, never caller input.
    async fn set_account_flag(&self, id: i64, column: &'static str, value: bool) -> Result<bool, DbError> {
        let now = Utc::now();
        let sql = format!("UPDATE accounts SET {column} = ?, updated_at = ? WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an account and its role grants
    pub async fn delete_account(&self, id: i64) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM account_roles WHERE account_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any accounts exist
    pub async fn has_accounts(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn new_account(username: &str, roles: Vec<Role>) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            roles,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_account() {
        let db = Database::in_memory().await.unwrap();
        assert!(!db.has_accounts().await.unwrap());

        let created = db
            .insert_account(new_account("operator", vec![Role::User, Role::Sysadmin]))
            .await
            .unwrap();
        assert!(created.enabled);

        let found = db.get_account_by_username("operator").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.has_role(Role::User));
        assert!(found.has_role(Role::Sysadmin));
        assert!(db.has_accounts().await.unwrap());

        assert!(db.get_account_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_account_without_roles() {
        let db = Database::in_memory().await.unwrap();
        let created = db.insert_account(new_account("guest", vec![])).await.unwrap();

        let found = db.get_account_by_id(created.id).await.unwrap().unwrap();
        assert!(found.roles.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = Database::in_memory().await.unwrap();
        db.insert_account(new_account("user", vec![Role::User])).await.unwrap();

        let result = db.insert_account(new_account("user", vec![Role::User])).await;
        assert!(matches!(result, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("accounts.db").display());
        let db = Database::new(&url).await.unwrap();

        for round in 0..20 {
            let username = format!("racer-{}", round);
            let (first, second) = tokio::join!(
                db.insert_account(new_account(&username, vec![Role::User])),
                db.insert_account(new_account(&username, vec![Role::User])),
            );

            let results = [first, second];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(
                results
                    .iter()
                    .filter_map(|r| r.as_ref().err())
                    .all(|e| matches!(e, DbError::Duplicate(_))),
                "round {}: {:?}",
                round,
                results.iter().filter_map(|r| r.as_ref().err()).collect::<Vec<_>>()
            );
        }

        assert_eq!(db.list_accounts().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_status_flags_and_delete() {
        let db = Database::in_memory().await.unwrap();
        let account = db.insert_account(new_account("user", vec![Role::User])).await.unwrap();

        assert!(db.set_account_locked(account.id, true).await.unwrap());
        assert!(db.set_account_enabled(account.id, false).await.unwrap());
        assert!(db.set_credentials_expired(account.id, true).await.unwrap());
        let found = db.get_account_by_id(account.id).await.unwrap().unwrap();
        assert!(found.locked);
        assert!(!found.enabled);
        assert!(found.credentials_expired);

        assert!(db.update_account_password(account.id, "new-hash").await.unwrap());
        let found = db.get_account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash, "new-hash");
        assert!(!found.credentials_expired);

        assert!(db.delete_account(account.id).await.unwrap());
        assert!(!db.delete_account(account.id).await.unwrap());
        assert!(db.list_accounts().await.unwrap().is_empty());
    }
}
