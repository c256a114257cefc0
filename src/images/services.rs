use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use image::ImageFormat;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::errors::ApiError;
use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::Recipe;
use crate::storage::StorageClient;

pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

pub struct ImageUpload {
    pub file_name: Option<String>,
    pub body: Bytes,
}

fn extension_of(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Storage key for a recipe image: a fresh name that keeps only the
/// original extension, e.g. `uploads/recipe/<uuid>.jpg`.
pub fn recipe_image_file_path(id: Uuid, file_name: &str) -> String {
    match extension_of(file_name) {
        Some(ext) => format!("{RECIPE_IMAGE_DIR}/{id}.{ext}"),
        None => format!("{RECIPE_IMAGE_DIR}/{id}"),
    }
}

/// Fully decodes the payload and reports its format.
async fn decode_image(body: Bytes) -> Result<ImageFormat, ApiError> {
    let decoded = tokio::task::spawn_blocking(move || {
        let format = image::guess_format(&body)?;
        image::load_from_memory_with_format(&body, format)?;
        Ok::<_, image::ImageError>(format)
    })
    .await
    .context("image decode task")?;

    decoded.map_err(|e| {
        warn!(error = %e, "rejected image upload");
        ApiError::field("image", INVALID_IMAGE)
    })
}

/// Validates and stores a recipe image, then points the recipe at it.
/// Nothing is written when the payload is not an image.
pub async fn upload_recipe_image(
    store: &dyn Store,
    storage: &dyn StorageClient,
    owner: Uuid,
    recipe_id: i64,
    upload: ImageUpload,
) -> Result<Recipe, ApiError> {
    if store.find_recipe(owner, recipe_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    if upload.body.is_empty() {
        return Err(ApiError::field("image", "The submitted file is empty."));
    }

    let format = decode_image(upload.body.clone()).await?;
    let fallback = format!(
        "upload.{}",
        format.extensions_str().first().copied().unwrap_or("bin")
    );
    let file_name = upload
        .file_name
        .as_deref()
        .filter(|name| extension_of(name).is_some())
        .unwrap_or(fallback.as_str());
    let key = recipe_image_file_path(Uuid::new_v4(), file_name);

    storage
        .put_object(&key, upload.body, format.to_mime_type())
        .await
        .with_context(|| format!("put_object {}", key))?;

    let previous = match store.set_recipe_image(owner, recipe_id, Some(&key)).await {
        Ok(previous) => previous,
        Err(e) => {
            if let Err(cleanup) = storage.delete_object(&key).await {
                warn!(error = ?cleanup, %key, "failed to remove unlinked image");
            }
            return Err(e.into());
        }
    };
    if let Some(old) = previous.filter(|old| *old != key) {
        if let Err(e) = storage.delete_object(&old).await {
            warn!(error = ?e, key = %old, "failed to remove replaced image");
        }
    }

    info!(recipe_id, %owner, %key, "recipe image stored");
    store
        .find_recipe(owner, recipe_id)
        .await?
        .ok_or(ApiError::NotFound)
}
