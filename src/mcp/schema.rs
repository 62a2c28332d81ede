//! Typed parameter schemas for tools.
//!
//! A [`ToolSchema`] is the single source for both the JSON Schema advertised in
//! `tools/list` and the argument coercion applied before a tool runs. Coercion
//! is permissive: a value of the wrong shape is dropped and the tool sees the
//! field as absent, so required-field problems surface from the store rather
//! than as protocol faults.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    StringList,
}

impl ParamType {
    fn json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({ "type": "string" }),
            ParamType::Integer => json!({ "type": "number" }),
            ParamType::StringList => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }

    /// The value in the declared shape, or `None` when it cannot be read as one.
    /// Fractional numbers are truncated; non-string list items are dropped.
    fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ParamType::String, Value::String(_)) => Some(value.clone()),
            (ParamType::Integer, Value::Number(number)) => number
                .as_i64()
                .or_else(|| {
                    number
                        .as_f64()
                        .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                        .map(|f| f.trunc() as i64)
                })
                .map(Value::from),
            (ParamType::StringList, Value::Array(items)) => Some(Value::Array(
                items.iter().filter(|item| item.is_string()).cloned().collect(),
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    pub description: Option<&'static str>,
}

impl ParamSpec {
    pub const fn required(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            required: true,
            description: None,
        }
    }

    pub const fn optional(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            required: false,
            description: None,
        }
    }

    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// JSON Schema object advertised as the tool's `inputSchema`
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut schema = param.param_type.json_schema();
            if let (Some(description), Value::Object(fields)) = (param.description, &mut schema) {
                fields.insert("description".to_string(), Value::from(description));
            }
            properties.insert(param.name.to_string(), schema);
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Keep only declared parameters whose values have the declared shape.
    /// Anything else, including a non-object argument payload, is dropped.
    pub fn coerce(&self, arguments: Option<Value>) -> Value {
        let mut coerced = Map::new();
        if let Some(Value::Object(args)) = arguments {
            for param in &self.params {
                if let Some(value) = args.get(param.name).and_then(|v| param.param_type.coerce(v)) {
                    coerced.insert(param.name.to_string(), value);
                }
            }
        }
        Value::Object(coerced)
    }
}
