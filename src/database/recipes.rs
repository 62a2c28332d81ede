use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::debug;
use uuid::Uuid;

use super::DbPool;
use crate::error::{AppError, Result};

/// Hard ceiling on any page size.
pub const MAX_PAGE_SIZE: i64 = 100;
/// Page size for REST listing when the client does not ask for one.
pub const API_PAGE_SIZE: i64 = 50;
/// Page size for tool-driven listing when the agent does not ask for one.
pub const TOOL_PAGE_SIZE: i64 = 20;
/// Search returns at most this many records and no separate total.
pub const SEARCH_LIMIT: i64 = 30;

const RECIPE_COLUMNS: &str = "id, name, description, ingredients, instructions, prep_time, \
    cook_time, servings, cuisine, tags, source, image_url, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub cuisine: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row as persisted: sequences are JSON text, timestamps are sortable RFC 3339 text.
#[derive(Debug, FromRow)]
struct RecipeRow {
    id: String,
    name: String,
    description: Option<String>,
    ingredients: String,
    instructions: String,
    prep_time: Option<i64>,
    cook_time: Option<i64>,
    servings: Option<i64>,
    cuisine: Option<String>,
    tags: String,
    source: Option<String>,
    image_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = AppError;

    fn try_from(row: RecipeRow) -> Result<Self> {
        Ok(Recipe {
            ingredients: parse_list(&row.id, &row.ingredients)?,
            instructions: parse_list(&row.id, &row.instructions)?,
            tags: parse_list(&row.id, &row.tags)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            id: row.id,
            name: row.name,
            description: row.description,
            prep_time: row.prep_time,
            cook_time: row.cook_time,
            servings: row.servings,
            cuisine: row.cuisine,
            source: row.source,
            image_url: row.image_url,
        })
    }
}

fn parse_list(id: &str, raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| {
        AppError::Internal(anyhow::anyhow!(
            "Corrupt list column for recipe '{}': {}",
            id,
            e
        ))
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid timestamp '{}': {}", raw, e)))
}

/// Fixed-width UTC text, so lexical order in SQL equals chronological order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Tags behave like an ordered set: first occurrence wins.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

/// `%query%` with LIKE wildcards escaped, so the query matches as a literal substring.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Rejection for a new recipe missing its name or either list
pub const REQUIRED_FIELDS_MESSAGE: &str =
    "name, ingredients (array), and instructions (array) are required";

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Recipe name is required".to_string()));
    }
    Ok(())
}

fn validate_minutes(field: &str, minutes: Option<i64>) -> Result<()> {
    match minutes {
        Some(m) if m < 0 => Err(AppError::BadRequest(format!(
            "{} must be a non-negative number of minutes",
            field
        ))),
        _ => Ok(()),
    }
}

fn validate_servings(servings: Option<i64>) -> Result<()> {
    match servings {
        Some(s) if s < 1 => Err(AppError::BadRequest(
            "servings must be a positive number".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Creation input. Ingredient and instruction sequences are required but may be
/// empty; `None` means the caller left them out and is rejected by `validate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipe {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub cuisine: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
}

impl NewRecipe {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.ingredients.is_none() || self.instructions.is_none()
        {
            return Err(AppError::BadRequest(REQUIRED_FIELDS_MESSAGE.to_string()));
        }
        validate_minutes("prepTime", self.prep_time)?;
        validate_minutes("cookTime", self.cook_time)?;
        validate_servings(self.servings)
    }
}

/// Partial update. `None` means "leave unchanged"; an explicit JSON `null`
/// deserializes to `None` as well, so it cannot clear a field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub cuisine: Option<String>,
    pub tags: Option<Vec<String>>,
    pub source: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
}

impl RecipePatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_minutes("prepTime", self.prep_time)?;
        validate_minutes("cookTime", self.cook_time)?;
        validate_servings(self.servings)
    }

    /// One `column = value` pair per supplied field, in column order.
    /// Omitted fields produce nothing and therefore keep their stored value.
    pub fn assignments(&self) -> Result<Vec<(&'static str, ColumnValue)>> {
        use ColumnValue::{Integer, Text};

        let mut out = Vec::new();
        if let Some(name) = &self.name {
            out.push(("name", Text(name.clone())));
        }
        if let Some(description) = &self.description {
            out.push(("description", Text(description.clone())));
        }
        if let Some(ingredients) = &self.ingredients {
            out.push(("ingredients", Text(serde_json::to_string(ingredients)?)));
        }
        if let Some(instructions) = &self.instructions {
            out.push(("instructions", Text(serde_json::to_string(instructions)?)));
        }
        if let Some(prep_time) = self.prep_time {
            out.push(("prep_time", Integer(prep_time)));
        }
        if let Some(cook_time) = self.cook_time {
            out.push(("cook_time", Integer(cook_time)));
        }
        if let Some(servings) = self.servings {
            out.push(("servings", Integer(servings)));
        }
        if let Some(cuisine) = &self.cuisine {
            out.push(("cuisine", Text(cuisine.clone())));
        }
        if let Some(tags) = &self.tags {
            let tags = normalize_tags(tags.clone());
            out.push(("tags", Text(serde_json::to_string(&tags)?)));
        }
        if let Some(source) = &self.source {
            out.push(("source", Text(source.clone())));
        }
        if let Some(image_url) = &self.image_url {
            out.push(("image_url", Text(image_url.clone())));
        }
        Ok(out)
    }
}

/// Normalized paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    /// Missing or non-positive limits fall back to `default_limit`, limits are
    /// clamped to [`MAX_PAGE_SIZE`], negative offsets become 0.
    pub fn new(limit: Option<i64>, offset: Option<i64>, default_limit: i64) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_PAGE_SIZE),
            _ => default_limit.min(MAX_PAGE_SIZE),
        };
        let offset = match offset {
            Some(o) if o >= 0 => o,
            _ => 0,
        };
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipePage {
    pub recipes: Vec<Recipe>,
    pub total: i64,
}

impl Recipe {
    pub async fn create(pool: &DbPool, input: NewRecipe) -> Result<Recipe> {
        input.validate()?;

        let id = Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        let ingredients = serde_json::to_string(&input.ingredients.unwrap_or_default())?;
        let instructions = serde_json::to_string(&input.instructions.unwrap_or_default())?;
        let tags = serde_json::to_string(&normalize_tags(input.tags))?;

        let query = format!(
            r#"
            INSERT INTO recipes ({RECIPE_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            RETURNING {RECIPE_COLUMNS}
        "#
        );
        let row = sqlx::query_as::<_, RecipeRow>(&query)
            .bind(&id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&ingredients)
            .bind(&instructions)
            .bind(input.prep_time)
            .bind(input.cook_time)
            .bind(input.servings)
            .bind(&input.cuisine)
            .bind(&tags)
            .bind(&input.source)
            .bind(&input.image_url)
            .bind(&now)
            .fetch_one(pool)
            .await?;

        debug!("Saved recipe {} ({})", row.id, row.name);
        Recipe::try_from(row)
    }

    pub async fn get_by_id(pool: &DbPool, id: &str) -> Result<Option<Recipe>> {
        let query = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1");
        let row = sqlx::query_as::<_, RecipeRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(Recipe::try_from).transpose()
    }

    /// Newest first. The page and the total come from one read transaction.
    pub async fn list(pool: &DbPool, page: PageRequest) -> Result<RecipePage> {
        let mut tx = pool.begin().await?;

        let query = format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1 OFFSET ?2
        "#
        );
        let rows = sqlx::query_as::<_, RecipeRow>(&query)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&mut *tx)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let recipes = rows
            .into_iter()
            .map(Recipe::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(RecipePage { recipes, total })
    }

    /// Case-insensitive literal substring match over name, description,
    /// cuisine and the serialized ingredient and tag lists.
    pub async fn search(pool: &DbPool, query: &str) -> Result<Vec<Recipe>> {
        let pattern = like_pattern(query);
        let sql = format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes
            WHERE name LIKE ?1 ESCAPE '\'
               OR description LIKE ?1 ESCAPE '\'
               OR ingredients LIKE ?1 ESCAPE '\'
               OR cuisine LIKE ?1 ESCAPE '\'
               OR tags LIKE ?1 ESCAPE '\'
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
        "#
        );
        let rows = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(&pattern)
            .bind(SEARCH_LIMIT)
            .fetch_all(pool)
            .await?;

        rows.into_iter().map(Recipe::try_from).collect()
    }

    /// Applies only the supplied fields in a single UPDATE statement, so
    /// concurrent updates to the same record never overwrite each other's
    /// fields with stale values. The patch is validated before the record is
    /// looked up, so an invalid patch on a missing id is a bad request, not `None`.
    pub async fn update(pool: &DbPool, id: &str, patch: RecipePatch) -> Result<Option<Recipe>> {
        patch.validate()?;

        let now = format_timestamp(Utc::now());
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE recipes SET ");
        for (column, value) in patch.assignments()? {
            builder.push(column).push(" = ");
            match value {
                ColumnValue::Text(text) => {
                    builder.push_bind(text);
                }
                ColumnValue::Integer(number) => {
                    builder.push_bind(number);
                }
            }
            builder.push(", ");
        }
        // MAX keeps updated_at non-decreasing even if the wall clock steps back.
        builder
            .push("updated_at = MAX(updated_at, ")
            .push_bind(now)
            .push(") WHERE id = ")
            .push_bind(id.to_string())
            .push(" RETURNING ")
            .push(RECIPE_COLUMNS);

        let row = builder
            .build_query_as::<RecipeRow>()
            .fetch_optional(pool)
            .await?;

        if row.is_some() {
            debug!("Updated recipe {}", id);
        }
        row.map(Recipe::try_from).transpose()
    }

    pub async fn delete(pool: &DbPool, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &DbPool) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(pool)
            .await?;
        Ok(total)
    }
}
