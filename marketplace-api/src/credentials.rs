use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use common_auth::Role;
use rand_core::OsRng;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

/// A durable principal held by the credential provider.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("identity record carries unknown role '{0}'")]
    UnknownRole(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// The credential provider: owns email/password verification and identity
/// creation. Everything else in the API treats identities as opaque.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    full_name: String,
    user_type: String,
    status: String,
    password_hash: String,
}

impl CredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_identity(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
        status: &str,
    ) -> Result<Identity, CredentialError> {
        let password_hash = hash_password(password)?;
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO auth_identities (id, email, password_hash, full_name, user_type, status)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(email)
        .bind(&password_hash)
        .bind(full_name)
        .bind(role.as_str())
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(Identity {
            id,
            email: email.to_string(),
            full_name: full_name.to_string(),
            role,
            status: status.to_string(),
        })
    }

    /// Uniform `None` for unknown email, wrong password, and undecodable
    /// stored hashes; callers must not be able to tell these apart.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, CredentialError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, full_name, user_type, status, password_hash
             FROM auth_identities WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_valid = match PasswordHash::new(&row.password_hash) {
            Ok(parsed_hash) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
            Err(_) => false,
        };

        if !password_valid {
            return Ok(None);
        }

        let role = Role::parse(&row.user_type)
            .ok_or_else(|| CredentialError::UnknownRole(row.user_type.clone()))?;

        Ok(Some(Identity {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            role,
            status: row.status,
        }))
    }
}

fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError::Hash(err.to_string()))
}
