use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    database::recipes::{NewRecipe, PageRequest, Recipe, RecipePatch, API_PAGE_SIZE},
    error::AppError,
    server::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    // Kept as text so non-numeric values fall back to defaults instead of a 400.
    pub limit: Option<String>,
    pub offset: Option<String>,
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse().ok())
}

fn recipe_not_found() -> AppError {
    AppError::NotFound("Recipe not found".to_string())
}

/// GET /api/recipes - Search when `q` is present, otherwise a page of recipes
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    // An empty `q` is a plain listing, not a match-everything search.
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        let recipes = Recipe::search(&state.db, q).await?;
        let total = recipes.len();
        return Ok(Json(json!({ "recipes": recipes, "total": total })));
    }

    let page = PageRequest::new(
        parse_number(query.limit.as_deref()),
        parse_number(query.offset.as_deref()),
        API_PAGE_SIZE,
    );
    let listing = Recipe::list(&state.db, page).await?;

    Ok(Json(json!({
        "recipes": listing.recipes,
        "total": listing.total,
        "limit": page.limit,
        "offset": page.offset
    })))
}

/// GET /api/recipes/:id - Get a single recipe
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match Recipe::get_by_id(&state.db, &id).await? {
        Some(recipe) => Ok((StatusCode::OK, Json(recipe))),
        None => Err(recipe_not_found()),
    }
}

/// POST /api/recipes - Create a recipe; required fields are checked by the store
pub async fn create_recipe(
    State(state): State<AppState>,
    payload: Result<Json<NewRecipe>, axum::extract::rejection::JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let recipe = Recipe::create(&state.db, input).await?;

    Ok((StatusCode::CREATED, Json(recipe)))
}

/// PUT /api/recipes/:id - Partial update
pub async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RecipePatch>, axum::extract::rejection::JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(patch) = payload?;

    match Recipe::update(&state.db, &id, patch).await? {
        Some(recipe) => Ok((StatusCode::OK, Json(recipe))),
        None => Err(recipe_not_found()),
    }
}

/// DELETE /api/recipes/:id
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if Recipe::delete(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(recipe_not_found())
    }
}
