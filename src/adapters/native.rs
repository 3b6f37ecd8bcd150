use crate::core::tool::{json_type_name, ParamDescriptor, ToolDescriptor, ToolSource};
use crate::tools::{NativeRegistry, ToolClass};

/// Describe every registered native tool class, in registry order.
pub fn descriptors(registry: &NativeRegistry) -> Vec<ToolDescriptor> {
    registry.classes().map(describe).collect()
}

pub fn describe(class: &dyn ToolClass) -> ToolDescriptor {
    let params = class
        .constructor_params()
        .into_iter()
        .filter(|param| !param.exclude)
        .map(|param| ParamDescriptor {
            name: param.name.to_string(),
            param_type: json_type_name(param.annotation),
            description: param.description.to_string(),
            optional: param.default.is_some(),
            default: param.default,
        })
        .collect();

    ToolDescriptor {
        name: class.name().to_string(),
        origin_name: class.name().to_string(),
        description: class.description().to_string(),
        source: ToolSource::Local,
        params,
        inputs: class.inputs().to_string(),
        output_type: class.output_type().to_string(),
        class_name: class.class_name().to_string(),
        usage: None,
        category: class.category().map(|c| c.as_str().to_string()),
    }
}
