use serde_json::Value;
use tracing::warn;

use crate::core::tool::{json_type_name, ToolDescriptor, ToolSource};
use crate::plugins::{plugin_name, Plugin, PluginDiscovery, PluginError};

const ARG_DESCRIPTION_FALLBACK: &str = "see the description";

/// Run discovery and describe every well-formed plugin.
///
/// A plugin that cannot be described is logged with its origin and skipped.
pub fn descriptors(discovery: &dyn PluginDiscovery) -> Vec<ToolDescriptor> {
    let mut out = Vec::new();
    for discovered in discovery.discover() {
        match describe(discovered.plugin.as_ref()) {
            Ok(descriptor) => out.push(descriptor),
            Err(e) => warn!(
                origin = %discovered.origin,
                "Error processing plugin tool in {}: {}", discovered.origin, e
            ),
        }
    }
    out
}

pub fn describe(plugin: &dyn Plugin) -> Result<ToolDescriptor, PluginError> {
    let name = plugin_name(plugin);
    if name.is_empty() {
        return Err(PluginError::Unnamed);
    }

    let mut inputs = match plugin.args() {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(PluginError::InvalidSchema(format!(
                "args must be an object, got {}",
                other
            )))
        }
    };
    for (arg, spec) in inputs.iter_mut() {
        let Value::Object(fields) = spec else {
            return Err(PluginError::InvalidSchema(format!(
                "schema of argument '{}' is not an object",
                arg
            )));
        };
        fields
            .entry("description")
            .or_insert_with(|| Value::String(ARG_DESCRIPTION_FALLBACK.to_string()));
    }

    Ok(ToolDescriptor {
        name: name.to_string(),
        origin_name: name.to_string(),
        description: plugin.description().to_string(),
        source: ToolSource::Langchain,
        params: Vec::new(),
        inputs: Value::Object(inputs).to_string(),
        output_type: json_type_name(plugin.return_annotation()),
        class_name: name.to_string(),
        usage: None,
        category: None,
    })
}
