pub mod recipes;

use axum::{routing::get, Router};

use crate::server::AppState;

/// Create the API router with all endpoint routes
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/recipes",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/:id",
            get(recipes::get_recipe)
                .put(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
}
