use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::schema::{ParamSpec, ParamType, ToolSchema};
use super::tools::{
    create_error_response, create_success_response, extract_optional_param, ToolHandler,
};
use super::types::CallToolResponse;
use crate::{
    database::{
        recipes::{NewRecipe, PageRequest, Recipe, RecipePatch, TOOL_PAGE_SIZE},
        DbPool,
    },
    error::{AppError, Result},
};

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn not_found(id: &str) -> CallToolResponse {
    create_error_response(&format!("No recipe found with ID: {}", id))
}

/// Domain failures become the tool result; infrastructure faults propagate.
fn domain_failure(action: &str, err: AppError) -> Result<CallToolResponse> {
    if err.is_domain() {
        Ok(create_error_response(&format!(
            "Failed to {} recipe: {}",
            action, err
        )))
    } else {
        Err(err)
    }
}

fn id_argument(arguments: &Value) -> Result<String> {
    Ok(extract_optional_param(arguments, "id")?.unwrap_or_default())
}

/// `• {id} — {name} (cuisine)` line used by the listing summary
fn summary_line(recipe: &Recipe) -> String {
    let cuisine = recipe
        .cuisine
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();
    format!("• {} — {}{}", recipe.id, recipe.name, cuisine)
}

pub struct SaveRecipeTool;

#[async_trait]
impl ToolHandler for SaveRecipeTool {
    async fn call(&self, db: &DbPool, arguments: Value) -> Result<CallToolResponse> {
        // Missing required fields pass through; the store rejects them.
        let input = NewRecipe {
            name: extract_optional_param(&arguments, "name")?.unwrap_or_default(),
            description: extract_optional_param(&arguments, "description")?,
            ingredients: extract_optional_param(&arguments, "ingredients")?,
            instructions: extract_optional_param(&arguments, "instructions")?,
            prep_time: extract_optional_param(&arguments, "prepTime")?,
            cook_time: extract_optional_param(&arguments, "cookTime")?,
            servings: extract_optional_param(&arguments, "servings")?,
            cuisine: extract_optional_param(&arguments, "cuisine")?,
            tags: extract_optional_param(&arguments, "tags")?.unwrap_or_default(),
            source: extract_optional_param(&arguments, "source")?,
            image_url: None,
        };

        match Recipe::create(db, input).await {
            Ok(recipe) => Ok(create_success_response(&format!(
                "Recipe saved successfully!\n\nID: {}\nName: {}\n\n{}",
                recipe.id,
                recipe.name,
                pretty(&recipe)?
            ))),
            Err(e) => domain_failure("save", e),
        }
    }

    fn name(&self) -> &'static str {
        "save_recipe"
    }

    fn description(&self) -> &'static str {
        "Save a new recipe to the recipe collection. Use this whenever a user asks you to create or save a recipe."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ParamSpec::required("name", ParamType::String).describe("Recipe name (required)"),
            ParamSpec::optional("description", ParamType::String)
                .describe("A brief summary of the dish"),
            ParamSpec::required("ingredients", ParamType::StringList).describe(
                "List of ingredients, each as a string (e.g., \"2 cups flour\")",
            ),
            ParamSpec::required("instructions", ParamType::StringList)
                .describe("Step-by-step cooking instructions"),
            ParamSpec::optional("prepTime", ParamType::Integer).describe("Prep time in minutes"),
            ParamSpec::optional("cookTime", ParamType::Integer).describe("Cook time in minutes"),
            ParamSpec::optional("servings", ParamType::Integer).describe("Number of servings"),
            ParamSpec::optional("cuisine", ParamType::String)
                .describe("Cuisine type (e.g., Italian, Mexican, Thai)"),
            ParamSpec::optional("tags", ParamType::StringList).describe(
                "Tags for categorization (e.g., [\"vegetarian\", \"quick\", \"dessert\"])",
            ),
            ParamSpec::optional("source", ParamType::String)
                .describe("Source of the recipe (e.g., \"Claude\", \"GPT-4\", \"User\")"),
        ])
    }
}

pub struct ListRecipesTool;

#[async_trait]
impl ToolHandler for ListRecipesTool {
    async fn call(&self, db: &DbPool, arguments: Value) -> Result<CallToolResponse> {
        let page = PageRequest::new(
            extract_optional_param(&arguments, "limit")?,
            extract_optional_param(&arguments, "offset")?,
            TOOL_PAGE_SIZE,
        );

        let listing = Recipe::list(db, page).await?;
        let summary = listing
            .recipes
            .iter()
            .map(summary_line)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(create_success_response(&format!(
            "Showing {} of {} recipes:\n\n{}\n\nFull data:\n{}",
            listing.recipes.len(),
            listing.total,
            summary,
            pretty(&listing.recipes)?
        )))
    }

    fn name(&self) -> &'static str {
        "list_recipes"
    }

    fn description(&self) -> &'static str {
        "List saved recipes, newest first. Supports pagination."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ParamSpec::optional("limit", ParamType::Integer)
                .describe("Max results to return (default 20, max 100)"),
            ParamSpec::optional("offset", ParamType::Integer)
                .describe("Number of results to skip for pagination"),
        ])
    }
}

pub struct GetRecipeTool;

#[async_trait]
impl ToolHandler for GetRecipeTool {
    async fn call(&self, db: &DbPool, arguments: Value) -> Result<CallToolResponse> {
        let id = id_argument(&arguments)?;

        match Recipe::get_by_id(db, &id).await? {
            Some(recipe) => Ok(create_success_response(&pretty(&recipe)?)),
            None => Ok(not_found(&id)),
        }
    }

    fn name(&self) -> &'static str {
        "get_recipe"
    }

    fn description(&self) -> &'static str {
        "Retrieve the full details of a specific recipe by its ID."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ParamSpec::required("id", ParamType::String).describe("The recipe ID (UUID)")
        ])
    }
}

pub struct SearchRecipesTool;

#[async_trait]
impl ToolHandler for SearchRecipesTool {
    async fn call(&self, db: &DbPool, arguments: Value) -> Result<CallToolResponse> {
        let query: String = extract_optional_param(&arguments, "query")?.unwrap_or_default();

        let recipes = Recipe::search(db, &query).await?;
        if recipes.is_empty() {
            return Ok(create_success_response(&format!(
                "No recipes found matching \"{}\"",
                query
            )));
        }

        Ok(create_success_response(&format!(
            "Found {} recipe(s) matching \"{}\":\n\n{}",
            recipes.len(),
            query,
            pretty(&recipes)?
        )))
    }

    fn name(&self) -> &'static str {
        "search_recipes"
    }

    fn description(&self) -> &'static str {
        "Search recipes by name, ingredient, cuisine, description, or tag."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![ParamSpec::required("query", ParamType::String)
            .describe("Search term to look for across all recipe fields")])
    }
}

pub struct UpdateRecipeTool;

#[async_trait]
impl ToolHandler for UpdateRecipeTool {
    async fn call(&self, db: &DbPool, arguments: Value) -> Result<CallToolResponse> {
        let id = id_argument(&arguments)?;
        let patch = RecipePatch {
            name: extract_optional_param(&arguments, "name")?,
            description: extract_optional_param(&arguments, "description")?,
            ingredients: extract_optional_param(&arguments, "ingredients")?,
            instructions: extract_optional_param(&arguments, "instructions")?,
            prep_time: extract_optional_param(&arguments, "prepTime")?,
            cook_time: extract_optional_param(&arguments, "cookTime")?,
            servings: extract_optional_param(&arguments, "servings")?,
            cuisine: extract_optional_param(&arguments, "cuisine")?,
            tags: extract_optional_param(&arguments, "tags")?,
            ..RecipePatch::default()
        };

        match Recipe::update(db, &id, patch).await {
            Ok(Some(recipe)) => Ok(create_success_response(&format!(
                "Recipe updated!\n\n{}",
                pretty(&recipe)?
            ))),
            Ok(None) => Ok(not_found(&id)),
            Err(e) => domain_failure("update", e),
        }
    }

    fn name(&self) -> &'static str {
        "update_recipe"
    }

    fn description(&self) -> &'static str {
        "Update fields of an existing recipe. Only the fields you provide will be changed."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ParamSpec::required("id", ParamType::String)
                .describe("The recipe ID to update (required)"),
            ParamSpec::optional("name", ParamType::String),
            ParamSpec::optional("description", ParamType::String),
            ParamSpec::optional("ingredients", ParamType::StringList),
            ParamSpec::optional("instructions", ParamType::StringList),
            ParamSpec::optional("prepTime", ParamType::Integer),
            ParamSpec::optional("cookTime", ParamType::Integer),
            ParamSpec::optional("servings", ParamType::Integer),
            ParamSpec::optional("cuisine", ParamType::String),
            ParamSpec::optional("tags", ParamType::StringList),
        ])
    }
}

pub struct DeleteRecipeTool;

#[async_trait]
impl ToolHandler for DeleteRecipeTool {
    async fn call(&self, db: &DbPool, arguments: Value) -> Result<CallToolResponse> {
        let id = id_argument(&arguments)?;

        if Recipe::delete(db, &id).await? {
            Ok(create_success_response(&format!(
                "Recipe {} deleted successfully.",
                id
            )))
        } else {
            Ok(not_found(&id))
        }
    }

    fn name(&self) -> &'static str {
        "delete_recipe"
    }

    fn description(&self) -> &'static str {
        "Permanently delete a recipe by ID."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(vec![
            ParamSpec::required("id", ParamType::String).describe("The recipe ID to delete")
        ])
    }
}
