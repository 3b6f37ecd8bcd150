//! Function-style plugins (the `langchain` tool source).
//!
//! A plugin module is a registration function that adds plugins to a
//! `PluginRegistry`. Discovery runs every registration function in a fixed
//! list, so re-running it always yields a fresh set of plugin objects.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

pub mod text;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("plugin failed: {0}")]
    Failed(String),
    #[error("plugin has no name")]
    Unnamed,
    #[error("invalid argument schema: {0}")]
    InvalidSchema(String),
}

/// A callable plugin with self-describing metadata.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Argument schema: name -> {type, description?, ..}.
    fn args(&self) -> Value;

    /// Declared return type annotation, if the plugin exposes one.
    fn return_annotation(&self) -> Option<&str> {
        None
    }

    fn invoke(&self, inputs: &Map<String, Value>) -> Result<Value, PluginError>;
}

/// The name a plugin is listed and dispatched under.
pub fn plugin_name(plugin: &dyn Plugin) -> &str {
    plugin.name().trim()
}

/// A plugin plus the module it was registered from.
#[derive(Clone)]
pub struct DiscoveredPlugin {
    pub origin: String,
    pub plugin: Arc<dyn Plugin>,
}

/// Collects plugins during one discovery pass.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<DiscoveredPlugin>,
}

impl PluginRegistry {
    pub fn register(&mut self, origin: &str, plugin: impl Plugin + 'static) {
        self.plugins.push(DiscoveredPlugin {
            origin: origin.to_string(),
            plugin: Arc::new(plugin),
        });
    }

    pub fn into_plugins(self) -> Vec<DiscoveredPlugin> {
        self.plugins
    }
}

/// Source of plugin objects.
pub trait PluginDiscovery: Send + Sync {
    fn discover(&self) -> Vec<DiscoveredPlugin>;
}

/// Registration function of one plugin module.
pub type RegisterFn = fn(&mut PluginRegistry);

/// The fixed set of plugin modules compiled into this binary.
pub struct BuiltinPlugins {
    modules: Vec<RegisterFn>,
}

impl Default for BuiltinPlugins {
    fn default() -> Self {
        Self {
            modules: vec![text::register],
        }
    }
}

impl BuiltinPlugins {
    pub fn with_modules(modules: Vec<RegisterFn>) -> Self {
        Self { modules }
    }
}

impl PluginDiscovery for BuiltinPlugins {
    fn discover(&self) -> Vec<DiscoveredPlugin> {
        let mut registry = PluginRegistry::default();
        for register in &self.modules {
            register(&mut registry);
        }
        registry.into_plugins()
    }
}
