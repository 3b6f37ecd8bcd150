//! Native tool classes.
//!
//! - `types`: `ToolClass`/`NativeTool` traits, constructor metadata, observer hook, `ToolError`
//! - `registry`: the fixed, ordered list of classes the native adapter enumerates
//! - `fs`: workspace-confined file tools
//!
//! # Adding New Tools
//!
//! 1. Implement `ToolClass` (metadata + `instantiate`) and `NativeTool` (`forward`)
//! 2. Add the class to `NativeRegistry::builtin`

pub use registry::NativeRegistry;
pub use types::{
    bind_params, ConstructorParam, NativeTool, NullObserver, ProcessType, ToolClass, ToolError,
    ToolObserver,
};

pub mod fs;
mod registry;
mod types;
