use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Tracks the single live token per user. The user id is the primary key,
/// so `replace` is one conditional upsert and the invariant holds under
/// concurrent logins.
#[derive(Clone)]
pub struct ActiveSessionRegistry {
    pool: PgPool,
}

impl ActiveSessionRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn replace(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO active_sessions (user_id, token, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id)
             DO UPDATE SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    /// Removes the entry only when it still holds the presented token, so a
    /// logout cannot clobber a session established by a newer login.
    pub async fn remove_if_matches(&self, user_id: Uuid, token: &str) -> sqlx::Result<u64> {
        sqlx::query("DELETE FROM active_sessions WHERE user_id = $1 AND token = $2")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected())
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> sqlx::Result<u64> {
        sqlx::query("DELETE FROM active_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected())
    }

    pub async fn token_for_user(&self, user_id: Uuid) -> sqlx::Result<Option<String>> {
        sqlx::query_scalar("SELECT token FROM active_sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }
}

/// Tokens rejected regardless of signature validity. Duplicate adds are
/// tolerated with last-write semantics.
#[derive(Clone)]
pub struct RevocationRegistry {
    pool: PgPool,
}

impl RevocationRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn add(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO revoked_tokens (token, user_id, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (token)
             DO UPDATE SET user_id = EXCLUDED.user_id, expires_at = EXCLUDED.expires_at",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    pub async fn contains(&self, token: &str) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1 FROM revoked_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.is_some())
    }
}
