//! Database operations for users.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use checkout_core::{User, UserId, UserRole};

use super::{PgStore, PgTx, RepositoryError};
use crate::store::{StoreResult, UserDirectory};

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<UserRole>()
            .map_err(|e| RepositoryError::DataCorruption(format!("app_user.role: {e}")))?;
        Ok(Self {
            id: UserId::from_uuid(row.id),
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            created_at: row.created_at,
        })
    }
}

impl UserDirectory for PgStore {
    async fn find_user(&self, tx: &mut PgTx, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, first_name, last_name, role, created_at
            FROM checkout.app_user
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(tx.conn())
        .await?;

        row.map(User::try_from).transpose()
    }
}

impl PgStore {
    /// Insert a user, or refresh the profile columns of an existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email belongs to another user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO checkout.app_user (id, email, first_name, last_name, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                role = EXCLUDED.role
            ",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
