pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::attribute_routes())
        .merge(handlers::recipe_routes())
}

#[cfg(test)]
mod tests;
