use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use super::recipe_tools::*;
use super::schema::ToolSchema;
use super::types::{CallToolRequest, CallToolResponse, Tool, ToolContent};
use crate::{database::DbPool, error::Result};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// `arguments` has already been coerced against [`ToolHandler::schema`].
    async fn call(&self, db: &DbPool, arguments: Value) -> Result<CallToolResponse>;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> ToolSchema;

    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.schema().to_json(),
        }
    }
}

/// Macro to register multiple tools at once
macro_rules! register_tools {
    ($registry:expr, $($tool:expr),+ $(,)?) => {
        $(
            $registry.register($tool);
        )+
    };
}

/// Process-wide, read-only after construction. Enumeration keeps registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolHandler>>,
    by_name: HashMap<&'static str, usize>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registry holding the six recipe tools
    pub fn with_recipe_tools() -> Self {
        let mut registry = Self::new();
        register_tools!(
            registry,
            SaveRecipeTool,
            ListRecipesTool,
            GetRecipeTool,
            SearchRecipesTool,
            UpdateRecipeTool,
            DeleteRecipeTool,
        );
        registry
    }

    pub fn register<T: ToolHandler + 'static>(&mut self, tool: T) {
        let name = tool.name();
        if let Some(&index) = self.by_name.get(name) {
            warn!("Tool '{}' registered twice, replacing", name);
            self.tools[index] = Box::new(tool);
            return;
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(Box::new(tool));
    }

    pub fn get_tool(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.by_name.get(name).map(|&index| &*self.tools[index])
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Unknown names produce a tool-level error result, not an `Err`.
    /// `Err` is reserved for infrastructure faults raised by the tool.
    pub async fn call_tool(&self, db: &DbPool, request: CallToolRequest) -> Result<CallToolResponse> {
        match self.get_tool(&request.name) {
            Some(tool) => {
                let arguments = tool.schema().coerce(request.arguments);
                tool.call(db, arguments).await
            }
            None => Ok(create_error_response(&format!(
                "Unknown tool: {}",
                request.name
            ))),
        }
    }
}

pub fn create_success_response(message: &str) -> CallToolResponse {
    CallToolResponse {
        content: vec![ToolContent {
            content_type: "text".to_string(),
            text: message.to_string(),
        }],
        is_error: None,
    }
}

pub fn create_error_response(error: &str) -> CallToolResponse {
    CallToolResponse {
        content: vec![ToolContent {
            content_type: "text".to_string(),
            text: error.to_string(),
        }],
        is_error: Some(true),
    }
}

/// Read an optional argument from coerced tool arguments
pub fn extract_optional_param<T>(arguments: &Value, key: &str) -> Result<Option<T>>
where
    T: for<'de> serde::Deserialize<'de>,
{
    match arguments.get(key) {
        Some(value) if !value.is_null() => {
            let parsed: T = serde_json::from_value(value.clone()).map_err(|e| {
                crate::error::AppError::BadRequest(format!("Invalid parameter '{}': {}", key, e))
            })?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}
