use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::dto::UpdateMeRequest;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, User, UserChanges};
use crate::db::Store;
use crate::errors::{ApiError, NON_FIELD_ERRORS};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalizes and checks an email, reporting problems on the `email` field.
fn clean_email(raw: &str) -> Result<String, ApiError> {
    let email = normalize_email(raw);
    if email.is_empty() {
        return Err(ApiError::field("email", "This field may not be blank."));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::field("email", "Enter a valid email address."));
    }
    Ok(email)
}

async fn insert_user(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: &str,
    elevated: bool,
) -> Result<User, ApiError> {
    let email = clean_email(email)?;
    let password_hash = hash_password(password)?;
    let user = store
        .insert_user(NewUser {
            email,
            password_hash,
            name: name.trim().to_string(),
            is_staff: elevated,
            is_superuser: elevated,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, superuser = elevated, "user created");
    Ok(user)
}

pub async fn create_user(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: &str,
) -> Result<User, ApiError> {
    insert_user(store, email, password, name, false).await
}

pub async fn create_superuser(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    insert_user(store, email, password, "", true).await
}

/// `Ok(None)` for an unknown email, a wrong password or an inactive account.
pub async fn verify_credentials(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<Option<User>, ApiError> {
    let email = normalize_email(email);
    let Some(user) = store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Ok(None);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Ok(None);
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login for inactive user");
        return Ok(None);
    }
    Ok(Some(user))
}

fn generate_token_key() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Checks the credentials and returns the user's token, creating it on first login.
pub async fn issue_token(store: &dyn Store, email: &str, password: &str) -> Result<String, ApiError> {
    let user = verify_credentials(store, email, password).await?.ok_or_else(|| {
        ApiError::field(
            NON_FIELD_ERRORS,
            "Unable to authenticate with provided credentials.",
        )
    })?;
    let token = store
        .get_or_create_token(user.id, &generate_token_key())
        .await?;
    info!(user_id = %user.id, "token issued");
    Ok(token.key)
}

pub async fn resolve_token(store: &dyn Store, key: &str) -> Result<User, ApiError> {
    match store.find_user_by_token(key).await? {
        Some(user) if user.is_active => {
            debug!(user_id = %user.id, "token resolved");
            Ok(user)
        }
        Some(_) => Err(ApiError::Unauthenticated("User inactive or deleted.")),
        None => Err(ApiError::Unauthenticated("Invalid token.")),
    }
}

pub async fn update_profile(
    store: &dyn Store,
    user_id: Uuid,
    patch: UpdateMeRequest,
) -> Result<User, ApiError> {
    let email = patch.email.as_deref().map(clean_email).transpose()?;
    let password_hash = patch
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;
    let changes = UserChanges {
        email,
        password_hash,
        name: patch.name.map(|n| n.trim().to_string()),
    };
    let user = store.update_user(user_id, changes).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}
