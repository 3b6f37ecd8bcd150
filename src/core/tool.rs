use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Which adapter produced a descriptor, and therefore which dispatch path applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSource {
    Local,
    Mcp,
    Langchain,
}

impl ToolSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSource::Local => "local",
            ToolSource::Mcp => "mcp",
            ToolSource::Langchain => "langchain",
        }
    }
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ToolSource::Local),
            "mcp" => Ok(ToolSource::Mcp),
            "langchain" => Ok(ToolSource::Langchain),
            other => Err(format!("unknown tool source: {other}")),
        }
    }
}

/// Coarse grouping tag for native tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Search,
    File,
    Email,
    Terminal,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Search => "search",
            ToolCategory::File => "file",
            ToolCategory::Email => "email",
            ToolCategory::Terminal => "terminal",
        }
    }
}

/// One construction/configuration parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    pub optional: bool,
    /// `None` when the parameter has no default; `Some(Value::Null)` when the default is null.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub default: Option<Value>,
}

/// A present key, `null` included, is `Some`; only a missing key is `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// The normalized record every source adapter produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub origin_name: String,
    pub description: String,
    pub source: ToolSource,
    pub params: Vec<ParamDescriptor>,
    /// JSON text: property name -> {type, description, ..}.
    pub inputs: String,
    pub output_type: String,
    pub class_name: String,
    pub usage: Option<String>,
    pub category: Option<String>,
}

impl ToolDescriptor {
    /// Parsed form of `inputs`; an empty object if the text is somehow not JSON.
    pub fn inputs_value(&self) -> Value {
        serde_json::from_str(&self.inputs).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// Map a declared type annotation to its JSON schema type name.
///
/// Unknown annotations pass through verbatim; an absent annotation is a string.
pub fn json_type_name(annotation: Option<&str>) -> String {
    let Some(annotation) = annotation else {
        return "string".to_string();
    };

    match annotation {
        "str" => "string",
        "int" => "integer",
        "float" => "float",
        "bool" => "boolean",
        "list" | "List" | "tuple" | "Tuple" => "array",
        "dict" | "Dict" => "object",
        "Any" => "any",
        other => other,
    }
    .to_string()
}
