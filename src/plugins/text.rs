//! Text and clock helpers.

use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use serde_json::{json, Map, Value};

use super::{Plugin, PluginError, PluginRegistry};

const ORIGIN: &str = "text.rs";
const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn register(registry: &mut PluginRegistry) {
    registry.register(ORIGIN, WordCount);
    registry.register(ORIGIN, CurrentTime);
}

/// Counts whitespace-separated words.
pub struct WordCount;

impl Plugin for WordCount {
    fn name(&self) -> &str {
        "word_count"
    }

    fn description(&self) -> &str {
        "Count the number of whitespace-separated words in a text."
    }

    fn args(&self) -> Value {
        json!({
            "text": {"type": "string", "description": "Text to count words in"}
        })
    }

    fn return_annotation(&self) -> Option<&str> {
        Some("int")
    }

    fn invoke(&self, inputs: &Map<String, Value>) -> Result<Value, PluginError> {
        let text = inputs
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PluginError::InvalidArgs("text must be a string".into()))?;
        Ok(json!(text.split_whitespace().count()))
    }
}

/// Current UTC time, formatted with strftime syntax.
pub struct CurrentTime;

impl Plugin for CurrentTime {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Return the current UTC time, optionally in a custom strftime format."
    }

    fn args(&self) -> Value {
        // No description on purpose: the adapter fills one in.
        json!({
            "format": {"type": "string", "default": DEFAULT_TIME_FORMAT}
        })
    }

    fn return_annotation(&self) -> Option<&str> {
        Some("str")
    }

    fn invoke(&self, inputs: &Map<String, Value>) -> Result<Value, PluginError> {
        let format = match inputs.get("format") {
            None | Some(Value::Null) => DEFAULT_TIME_FORMAT,
            Some(Value::String(f)) => f.as_str(),
            Some(other) => {
                return Err(PluginError::InvalidArgs(format!(
                    "format must be a string, got {}",
                    other
                )))
            }
        };

        let items: Vec<Item> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(PluginError::InvalidArgs(format!(
                "invalid time format '{}'",
                format
            )));
        }
        Ok(Value::String(
            Utc::now().format_with_items(items.into_iter()).to_string(),
        ))
    }
}
