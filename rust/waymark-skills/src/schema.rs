//! Declarative skill parameter tables and their JSON tool schemas.
//!
//! Each skill hand-writes its parameter table; no runtime reflection is
//! involved. The table renders into the `input_schema` object shape LLM
//! tool-use APIs expect.

use serde_json::{json, Map, Value};

/// JSON type of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
        }
    }
}

/// One declared skill parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub doc: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            doc,
            required: true,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            doc,
            required: false,
        }
    }
}

/// Name, doc and parameter table of a registered skill.
#[derive(Debug, Clone)]
pub struct SkillDescriptor {
    pub name: &'static str,
    pub doc: &'static str,
    pub parameters: Vec<ParamSpec>,
}

impl SkillDescriptor {
    pub fn new(name: &'static str, doc: &'static str, parameters: Vec<ParamSpec>) -> Self {
        Self {
            name,
            doc,
            parameters,
        }
    }

    /// Render the tool-use schema object for this skill.
    pub fn tool_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.json_type(),
                    "description": param.doc,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.to_string()));
            }
        }

        json!({
            "name": self.name,
            "description": self.doc,
            "input_schema": {
                "type": "object",
                "properties": Value::Object(properties),
                "required": Value::Array(required),
            }
        })
    }
}
