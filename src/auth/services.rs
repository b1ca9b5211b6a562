use std::{future::Future, sync::Arc, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::{TokenKind, TokenPair},
        dto::{ChangePasswordRequest, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{check_password_strength, PasswordHasher},
        repo::UserStore,
        repo_types::{Gender, NewUser, ProfileUpdate, PublicUser, User},
        sessions::SessionRegistry,
    },
    errors::AuthError,
    response::ErrorDetail,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hashes the password iff it was set since the user was loaded, then clears the flag.
/// Calling it again on the result is a no-op.
pub async fn prepare_for_persist(mut user: User, hasher: &PasswordHasher) -> Result<User, AuthError> {
    if user.password_touched() {
        let plain = std::mem::take(&mut user.password_hash);
        let hash = hasher.hash(plain).await?;
        user.mark_hashed(hash);
    }
    Ok(user)
}

/// Collects the names of absent or blank fields.
fn missing_fields(fields: &[(&str, Option<&String>)]) -> Vec<ErrorDetail> {
    fields
        .iter()
        .filter(|(_, v)| v.map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| ErrorDetail::field(*name, format!("{name} is required")))
        .collect()
}

fn require(fields: &[(&str, Option<&String>)]) -> Result<(), AuthError> {
    let missing = missing_fields(fields);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(missing))
    }
}

fn parse_gender(raw: &str) -> Result<Gender, AuthError> {
    match raw.trim().parse::<Gender>() {
        Ok(Gender::Unspecified) | Err(_) => Err(AuthError::validation(
            "gender",
            "gender must be one of male, female, other",
        )),
        Ok(g) => Ok(g),
    }
}

/// Orchestrates credential checks, token issuance and session tracking.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionRegistry>,
    keys: JwtKeys,
    hasher: PasswordHasher,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionRegistry>,
        keys: JwtKeys,
        hasher: PasswordHasher,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            keys,
            hasher,
            store_timeout,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    pub fn sessions(&self) -> &Arc<dyn SessionRegistry> {
        &self.sessions
    }

    /// Bounds a store call; an elapsed timer fails the request instead of hanging it.
    async fn bounded<T, F>(&self, backend: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!(backend, timeout_ms = self.store_timeout.as_millis() as u64, "store call timed out");
                Err(AuthError::ServiceUnavailable(backend))
            }
        }
    }

    /// Signs both tokens and records the refresh token for its full lifetime.
    async fn start_session(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        let pair = TokenPair {
            access: self.keys.sign_access(user_id)?,
            refresh: self.keys.sign_refresh(user_id)?,
        };
        let ttl = self.keys.ttl(TokenKind::Refresh).as_secs();
        self.bounded("redis", self.sessions.put(&pair.refresh, user_id, ttl))
            .await?;
        Ok(pair)
    }

    #[instrument(skip_all)]
    pub async fn register(&self, req: RegisterRequest) -> Result<(PublicUser, TokenPair), AuthError> {
        require(&[
            ("fullname", req.fullname.as_ref()),
            ("username", req.username.as_ref()),
            ("email", req.email.as_ref()),
            ("password", req.password.as_ref()),
            ("confirmPassword", req.confirm_password.as_ref()),
            ("gender", req.gender.as_ref()),
        ])?;
        let (
            Some(fullname),
            Some(username),
            Some(email),
            Some(password),
            Some(confirm_password),
            Some(gender),
        ) = (
            req.fullname,
            req.username,
            req.email,
            req.password,
            req.confirm_password,
            req.gender,
        )
        else {
            return Err(AuthError::validation("body", "All fields are required"));
        };

        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            warn!("register with invalid email");
            return Err(AuthError::validation("email", "Invalid email"));
        }
        let gender = parse_gender(&gender)?;

        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        check_password_strength(&password, "password")?;

        if self
            .bounded("postgres", self.users.find_by_email(&email))
            .await?
            .is_some()
        {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let user = User::new(NewUser {
            fullname: fullname.trim().to_string(),
            username: username.trim().to_string(),
            email,
            password,
            gender,
            avatar: req.avatar.unwrap_or_default(),
        });
        let user = prepare_for_persist(user, &self.hasher).await?;
        let user = self.bounded("postgres", self.users.create(&user)).await?;

        let tokens = self.start_session(user.id).await?;
        info!(user_id = %user.id, "user registered");
        Ok((PublicUser::from(&user), tokens))
    }

    #[instrument(skip_all)]
    pub async fn login(&self, req: LoginRequest) -> Result<(PublicUser, TokenPair), AuthError> {
        require(&[
            ("email", req.email.as_ref()),
            ("password", req.password.as_ref()),
        ])?;
        let (Some(email), Some(password)) = (req.email, req.password) else {
            return Err(AuthError::validation("body", "Email and password are required"));
        };
        let email = normalize_email(&email);

        let user = match self
            .bounded("postgres", self.users.find_by_email(&email))
            .await?
        {
            Some(u) => u,
            None => {
                warn!(email = %email, "login unknown email");
                return Err(AuthError::UserNotFound);
            }
        };

        if !self
            .hasher
            .verify(password, user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.start_session(user.id).await?;
        info!(user_id = %user.id, "user logged in");
        Ok((PublicUser::from(&user), tokens))
    }

    /// Revokes the refresh token. The access token must carry a valid signature but
    /// may already be expired, and must belong to the user the refresh token is registered to.
    #[instrument(skip_all)]
    pub async fn logout(&self, access: Option<&str>, refresh: Option<&str>) -> Result<(), AuthError> {
        let (Some(access), Some(refresh)) = (access, refresh) else {
            return Err(AuthError::Unauthenticated);
        };
        let claims = self.keys.verify_allow_expired(access, TokenKind::Access)?;
        match self.bounded("redis", self.sessions.get(refresh)).await? {
            Some(owner) if owner != claims.sub => {
                warn!(user_id = %claims.sub, "logout with a refresh token of another user");
                return Err(AuthError::TokenInvalid);
            }
            Some(_) => self.bounded("redis", self.sessions.delete(refresh)).await?,
            None => {}
        }
        info!(user_id = %claims.sub, "user logged out");
        Ok(())
    }

    /// Mints a new access token from a live, registered refresh token.
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, refresh: Option<&str>) -> Result<String, AuthError> {
        let refresh = refresh.ok_or(AuthError::Unauthenticated)?;
        let claims = self.keys.verify(refresh, TokenKind::Refresh)?;

        match self.bounded("redis", self.sessions.get(refresh)).await? {
            Some(owner) if owner == claims.sub => {}
            Some(_) => {
                warn!(user_id = %claims.sub, "refresh token registered to another user");
                return Err(AuthError::TokenInvalid);
            }
            None => {
                warn!(user_id = %claims.sub, "refresh token revoked or unknown");
                return Err(AuthError::TokenInvalid);
            }
        }

        let user = self
            .bounded("postgres", self.users.find_by_id(claims.sub))
            .await?
            .ok_or(AuthError::Unauthenticated)?;
        let access = self.keys.sign_access(user.id)?;
        info!(user_id = %user.id, "access token refreshed");
        Ok(access)
    }

    /// Resolves the user behind a live access token.
    pub async fn authenticate(&self, access: &str) -> Result<User, AuthError> {
        let claims = self.keys.verify(access, TokenKind::Access)?;
        self.bounded("postgres", self.users.find_by_id(claims.sub))
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<PublicUser, AuthError> {
        let user = self
            .bounded("postgres", self.users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::NotFound)?;
        Ok(PublicUser::from(&user))
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        mut update: ProfileUpdate,
    ) -> Result<PublicUser, AuthError> {
        let mut problems = Vec::new();
        if let Some(name) = update.fullname.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                problems.push(ErrorDetail::field("fullname", "fullname must not be empty"));
            }
        }
        if let Some(name) = update.username.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                problems.push(ErrorDetail::field("username", "username must not be empty"));
            }
        }
        if let Some(email) = update.email.as_mut() {
            *email = normalize_email(email);
            if !is_valid_email(email) {
                problems.push(ErrorDetail::field("email", "Invalid email"));
            }
        }
        if !problems.is_empty() {
            return Err(AuthError::Validation(problems));
        }

        if update.is_empty() {
            return self.get_profile(user_id).await;
        }

        let user = self
            .bounded("postgres", self.users.update(user_id, &update))
            .await?
            .ok_or(AuthError::NotFound)?;
        info!(user_id = %user.id, "profile updated");
        Ok(PublicUser::from(&user))
    }

    #[instrument(skip(self, req))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<PublicUser, AuthError> {
        require(&[
            ("currentPassword", req.current_password.as_ref()),
            ("newPassword", req.new_password.as_ref()),
        ])?;
        let (Some(current), Some(new)) = (req.current_password, req.new_password) else {
            return Err(AuthError::validation("body", "currentPassword and newPassword are required"));
        };

        let mut user = self
            .bounded("postgres", self.users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self
            .hasher
            .verify(current.clone(), user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "change password with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }
        if current == new {
            return Err(AuthError::SamePassword);
        }
        check_password_strength(&new, "newPassword")?;

        user.set_password(new);
        let user = prepare_for_persist(user, &self.hasher).await?;
        let user = self.bounded("postgres", self.users.save(&user)).await?;
        info!(user_id = %user.id, "password changed");
        Ok(PublicUser::from(&user))
    }
}
