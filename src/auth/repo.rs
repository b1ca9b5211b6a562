use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::repo_types::{ProfileUpdate, User, UserRow},
    errors::AuthError,
};

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;
    /// Inserts a new user. Fails with `DuplicateEmail`/`DuplicateUsername`.
    async fn create(&self, user: &User) -> Result<User, AuthError>;
    /// Applies an allow-listed partial update; `None` if the user does not exist.
    async fn update(&self, id: Uuid, fields: &ProfileUpdate) -> Result<Option<User>, AuthError>;
    /// Persists every mutable column of an existing user, password hash included.
    async fn save(&self, user: &User) -> Result<User, AuthError>;
    async fn close(&self) {}
}

/// Refuses writes that would put a plaintext password on disk.
pub(crate) fn ensure_hashed(user: &User) -> Result<(), AuthError> {
    if user.password_touched() {
        return Err(AuthError::Internal(anyhow::anyhow!(
            "refusing to persist user {} with an unhashed password",
            user.id
        )));
    }
    Ok(())
}

const USER_COLUMNS: &str =
    "id, fullname, username, email, password_hash, gender, avatar, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn map_sqlx(e: sqlx::Error) -> AuthError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
            Some(c) if c.contains("username") => AuthError::DuplicateUsername,
            _ => AuthError::DuplicateEmail,
        },
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            warn!(error = %e, "postgres unavailable");
            AuthError::ServiceUnavailable("postgres")
        }
        _ => AuthError::Internal(anyhow::Error::new(e).context("postgres query")),
    }
}

fn into_user(row: UserRow) -> Result<User, AuthError> {
    User::try_from(row).map_err(AuthError::Internal)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)?;
        row.map(into_user).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)?;
        row.map(into_user).transpose()
    }

    async fn create(&self, user: &User) -> Result<User, AuthError> {
        ensure_hashed(user)?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, fullname, username, email, password_hash, gender, avatar,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.fullname)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.gender.as_str())
        .bind(&user.avatar)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.db)
        .await
        .map_err(map_sqlx)?;
        into_user(row)
    }

    async fn update(&self, id: Uuid, fields: &ProfileUpdate) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET fullname   = COALESCE($2, fullname),
                   username   = COALESCE($3, username),
                   email      = COALESCE($4, email),
                   gender     = COALESCE($5, gender),
                   avatar     = COALESCE($6, avatar),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.fullname.as_deref())
        .bind(fields.username.as_deref())
        .bind(fields.email.as_deref())
        .bind(fields.gender.map(|g| g.as_str()))
        .bind(fields.avatar.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)?;
        row.map(into_user).transpose()
    }

    async fn save(&self, user: &User) -> Result<User, AuthError> {
        ensure_hashed(user)?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET fullname = $2, username = $3, email = $4, password_hash = $5,
                   gender = $6, avatar = $7, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.fullname)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.gender.as_str())
        .bind(&user.avatar)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)?
        .ok_or(AuthError::NotFound)?;
        into_user(row)
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
