use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing::info;

use crate::{
    auth::{
        cookies::CookieSettings,
        jwt::JwtKeys,
        claims::TokenKind,
        memory::{MemorySessionRegistry, MemoryUserStore},
        password::PasswordHasher,
        repo::{PgUserStore, UserStore},
        services::AuthService,
        sessions::{RedisSessionRegistry, SessionRegistry},
    },
    config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub cookies: CookieSettings,
}

impl AppState {
    /// Connects Postgres and Redis, runs migrations and wires the service.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let users = PgUserStore::connect(&config.database_url)
            .await
            .context("connect to database")?;
        if let Err(e) = sqlx::migrate!("./migrations").run(users.pool()).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }
        info!("postgres connected");

        let sessions = RedisSessionRegistry::connect(&config.redis_url)
            .await
            .context("connect to redis")?;
        info!("redis connected");

        Self::from_parts(config, Arc::new(users), Arc::new(sessions))
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionRegistry>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::from_config(&config.jwt);
        let hasher = PasswordHasher::new(config.hash)?;
        let cookies = CookieSettings {
            secure: config.environment.is_production(),
            access_max_age: time::Duration::seconds(keys.ttl(TokenKind::Access).as_secs() as i64),
            refresh_max_age: time::Duration::seconds(keys.ttl(TokenKind::Refresh).as_secs() as i64),
        };
        let auth = AuthService::new(
            users,
            sessions,
            keys,
            hasher,
            Duration::from_millis(config.store_timeout_ms),
        );
        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            cookies,
        })
    }

    /// State backed by process-local stores.
    pub fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemorySessionRegistry::new()),
        )
    }

    /// Releases store connections.
    pub async fn shutdown(&self) {
        self.auth.users().close().await;
        self.auth.sessions().close().await;
        info!("stores disconnected");
    }
}
