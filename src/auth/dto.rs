use serde::{Deserialize, Serialize};

use crate::auth::repo_types::PublicUser;

/// Request body for user registration. Fields are optional so that missing ones
/// surface as validation errors rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub fullname: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub gender: Option<String>,
    pub avatar: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// `data` payload for every endpoint that returns a user.
#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: PublicUser,
}
