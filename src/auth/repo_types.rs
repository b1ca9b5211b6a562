use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Gender as stored on the profile; empty when never set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unspecified => "",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "" => Ok(Gender::Unspecified),
            other => Err(format!("unknown gender `{other}`")),
        }
    }
}

/// User record as held by the service layer.
///
/// `password_hash` holds plaintext only while `password_touched` is set, i.e. between
/// [`User::set_password`] and `prepare_for_persist`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub gender: Gender,
    pub avatar: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    password_touched: bool,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: Gender,
    pub avatar: String,
}

impl User {
    /// A not-yet-persisted user whose password still awaits hashing.
    pub fn new(fields: NewUser) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            fullname: fields.fullname,
            username: fields.username,
            email: fields.email,
            password_hash: fields.password,
            gender: fields.gender,
            avatar: fields.avatar,
            created_at: now,
            updated_at: now,
            password_touched: true,
        }
    }

    pub fn set_password(&mut self, plain: String) {
        self.password_hash = plain;
        self.password_touched = true;
    }

    pub fn password_touched(&self) -> bool {
        self.password_touched
    }

    /// Stores a freshly computed hash and clears the touched flag.
    pub(crate) fn mark_hashed(&mut self, hash: String) {
        self.password_hash = hash;
        self.password_touched = false;
    }

    /// Applies an allow-listed profile update in place.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(v) = &update.fullname {
            self.fullname = v.clone();
        }
        if let Some(v) = &update.username {
            self.username = v.clone();
        }
        if let Some(v) = &update.email {
            self.email = v.clone();
        }
        if let Some(v) = update.gender {
            self.gender = v;
        }
        if let Some(v) = &update.avatar {
            self.avatar = v.clone();
        }
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// Database row for `users`.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub gender: String,
    pub avatar: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            fullname: r.fullname,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            gender: r.gender.parse().map_err(anyhow::Error::msg)?,
            avatar: r.avatar,
            created_at: r.created_at,
            updated_at: r.updated_at,
            password_touched: false,
        })
    }
}

/// Allow-listed profile fields. Anything else in a request body is dropped by serde.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub fullname: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none()
            && self.username.is_none()
            && self.email.is_none()
            && self.gender.is_none()
            && self.avatar.is_none()
    }
}

/// Sanitized user: everything but the password hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub gender: Gender,
    pub avatar: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            fullname: u.fullname.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            gender: u.gender,
            avatar: u.avatar.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User::new(NewUser {
            fullname: "Ada Lovelace".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password: "Plain#1a".into(),
            gender: Gender::Female,
            avatar: String::new(),
        })
    }

    #[test]
    fn public_user_never_contains_password() {
        let mut user = sample();
        user.mark_hashed("$argon2id$fake".into());
        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.to_lowercase().contains("password"));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"gender\":\"female\""));
    }

    #[test]
    fn new_user_is_touched_until_hashed() {
        let mut user = sample();
        assert!(user.password_touched());
        user.mark_hashed("hash".into());
        assert!(!user.password_touched());
        user.set_password("Other#2b".into());
        assert!(user.password_touched());
    }

    #[test]
    fn profile_update_ignores_unknown_fields() {
        let update: ProfileUpdate = serde_json::from_value(serde_json::json!({
            "fullname": "New Name",
            "password": "Hacked#1",
            "id": "00000000-0000-0000-0000-000000000000",
            "role": "admin"
        }))
        .unwrap();
        assert_eq!(update.fullname.as_deref(), Some("New Name"));

        let mut user = sample();
        user.mark_hashed("hash".into());
        let id = user.id;
        user.apply(&update);
        assert_eq!(user.fullname, "New Name");
        assert_eq!(user.password_hash, "hash");
        assert_eq!(user.id, id);
    }

    #[test]
    fn gender_round_trips_through_text() {
        for g in [Gender::Male, Gender::Female, Gender::Other, Gender::Unspecified] {
            assert_eq!(g.as_str().parse::<Gender>().unwrap(), g);
        }
        assert!("robot".parse::<Gender>().is_err());
    }
}
