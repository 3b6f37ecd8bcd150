//! Shared types and traits for native tools.
//!
//! A native tool is described by a `ToolClass`: static metadata plus a
//! constructor taking named parameters. Constructing a class yields a
//! `NativeTool` whose `forward` runs one invocation.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::tool::ToolCategory;

/// Errors that can occur while constructing or running a native tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Kind of progress message a tool emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Tool,
    Card,
    Other,
}

/// Receives progress messages from running tools.
pub trait ToolObserver: Send + Sync {
    fn add_message(&self, process_type: ProcessType, content: &str);
}

/// Observer that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ToolObserver for NullObserver {
    fn add_message(&self, _process_type: ProcessType, _content: &str) {}
}

/// One declared constructor parameter of a tool class.
#[derive(Debug, Clone)]
pub struct ConstructorParam {
    pub name: &'static str,
    /// Declared type annotation, e.g. `"str"` or `"MessageObserver"`.
    pub annotation: Option<&'static str>,
    pub description: &'static str,
    /// `None` means the parameter is required.
    pub default: Option<Value>,
    /// Excluded parameters are wired by the runtime, not configured by users.
    pub exclude: bool,
}

/// A constructed tool, ready to run.
pub trait NativeTool: Send {
    /// Run once with keyword arguments matching the class's declared inputs.
    fn forward(&self, inputs: &Map<String, Value>) -> Result<String, ToolError>;
}

/// A tool implementation known at compile time.
pub trait ToolClass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Implementation identifier used to relocate the class at dispatch time.
    fn class_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Declared invocation schema: property name -> {type, description, ..}.
    fn inputs(&self) -> Value;

    fn output_type(&self) -> &'static str {
        "string"
    }

    fn category(&self) -> Option<ToolCategory> {
        None
    }

    fn constructor_params(&self) -> Vec<ConstructorParam>;

    fn accepts_observer(&self) -> bool {
        self.constructor_params()
            .iter()
            .any(|param| param.name == "observer")
    }

    fn instantiate(
        &self,
        params: &Map<String, Value>,
        observer: Option<Arc<dyn ToolObserver>>,
    ) -> Result<Box<dyn NativeTool>, ToolError>;
}

/// Match supplied constructor values against the declared parameters.
///
/// Unknown names and missing required values are rejected; omitted optional
/// parameters take their defaults. Excluded parameters are never bound here.
pub fn bind_params(
    declared: &[ConstructorParam],
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>, ToolError> {
    if let Some(unknown) = supplied.keys().find(|key| {
        !declared
            .iter()
            .any(|param| param.name == key.as_str() && !param.exclude)
    }) {
        return Err(ToolError::InvalidInput(format!(
            "unexpected constructor parameter '{}'",
            unknown
        )));
    }

    let mut bound = Map::new();
    for param in declared.iter().filter(|param| !param.exclude) {
        match (supplied.get(param.name), &param.default) {
            (Some(value), _) if !value.is_null() => {
                bound.insert(param.name.to_string(), value.clone());
            }
            (_, Some(default)) => {
                bound.insert(param.name.to_string(), default.clone());
            }
            (_, None) => {
                return Err(ToolError::InvalidInput(format!(
                    "missing required constructor parameter '{}'",
                    param.name
                )));
            }
        }
    }
    Ok(bound)
}

/// Read a string argument, falling back to `default` when absent or null.
pub(crate) fn str_arg<'a>(
    args: &'a Map<String, Value>,
    key: &str,
    default: Option<&'a str>,
) -> Result<&'a str, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        None | Some(Value::Null) => default
            .ok_or_else(|| ToolError::InvalidInput(format!("{} required", key))),
        Some(other) => Err(ToolError::InvalidInput(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}
