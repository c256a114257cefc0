use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::repo_types::User;

/// Request body for user registration.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Ensure this field has at least 6 characters."))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub name: String,
}

/// Request body for obtaining a token.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// PATCH body for the authenticated user's profile.
#[derive(Default, Deserialize, Validate)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Ensure this field has at least 6 characters."))]
    pub password: Option<String>,
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}
