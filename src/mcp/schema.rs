//! Flattening of remote tool input schemas.
//!
//! Servers may describe arguments with `$ref` pointers into a `$defs` (or
//! `definitions`) section. The catalog stores a flat `properties` map, so refs
//! are inlined here and the definition sections dropped.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

const DESCRIPTION_FALLBACK: &str = "see tool description";
const TYPE_FALLBACK: &str = "string";

/// Refs nested deeper than this are treated as a cycle.
const MAX_REF_DEPTH: usize = 32;

/// Upper bound on JSON values in a flattened schema. Refs that share a
/// target are copied at every use, so the output can dwarf the input.
pub const MAX_SCHEMA_NODES: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("unresolvable $ref '{0}'")]
    UnresolvableRef(String),
    #[error("cyclic $ref '{0}'")]
    Cycle(String),
    #[error("flattened schema exceeds {0} values")]
    TooLarge(usize),
}

/// Inline every local `$ref` and drop the top-level `$defs` section.
///
/// A node holding a `$ref` is replaced by its target; sibling keys of the ref are discarded.
pub fn resolve_refs(schema: &Value) -> Result<Value, SchemaError> {
    let mut resolver = Resolver::new(schema);

    match schema {
        Value::Object(map) if !map.contains_key("$ref") => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map.iter().filter(|(key, _)| *key != "$defs") {
                out.insert(key.clone(), resolver.resolve(value)?);
            }
            Ok(Value::Object(out))
        }
        other => resolver.resolve(other),
    }
}

struct Resolver<'a> {
    root: &'a Value,
    stack: Vec<&'a str>,
    /// Each ref target resolved so far, with the number of values it holds.
    resolved: HashMap<&'a str, (Value, usize)>,
    nodes: usize,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            stack: Vec::new(),
            resolved: HashMap::new(),
            nodes: 0,
        }
    }

    fn resolve(&mut self, node: &'a Value) -> Result<Value, SchemaError> {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.resolve_ref(reference);
                }
                charge(&mut self.nodes, 1)?;
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.resolve(value)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                charge(&mut self.nodes, 1)?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve(item)?);
                }
                Ok(Value::Array(out))
            }
            other => {
                charge(&mut self.nodes, 1)?;
                Ok(other.clone())
            }
        }
    }

    fn resolve_ref(&mut self, reference: &'a str) -> Result<Value, SchemaError> {
        if let Some((value, count)) = self.resolved.get(reference) {
            charge(&mut self.nodes, *count)?;
            return Ok(value.clone());
        }
        if self.stack.contains(&reference) || self.stack.len() >= MAX_REF_DEPTH {
            return Err(SchemaError::Cycle(reference.to_string()));
        }

        let target = lookup(self.root, reference)?;
        let before = self.nodes;
        self.stack.push(reference);
        let resolved = self.resolve(target);
        self.stack.pop();

        let value = resolved?;
        self.resolved.insert(reference, (value.clone(), self.nodes - before));
        Ok(value)
    }
}

fn charge(nodes: &mut usize, count: usize) -> Result<(), SchemaError> {
    *nodes = nodes.saturating_add(count);
    if *nodes > MAX_SCHEMA_NODES {
        return Err(SchemaError::TooLarge(MAX_SCHEMA_NODES));
    }
    Ok(())
}

fn lookup<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, SchemaError> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| SchemaError::UnresolvableRef(reference.to_string()))?;
    if pointer.is_empty() {
        return Ok(root);
    }
    root.pointer(pointer)
        .ok_or_else(|| SchemaError::UnresolvableRef(reference.to_string()))
}

/// Resolve refs, take `properties`, and backfill `description`/`type` on each property.
///
/// A schema without `properties` yields an empty map.
pub fn normalize_input_schema(schema: &Value) -> Result<Map<String, Value>, SchemaError> {
    let resolved = resolve_refs(schema)?;

    let mut properties = match resolved.get("properties") {
        Some(Value::Object(props)) => props.clone(),
        _ => Map::new(),
    };

    for property in properties.values_mut() {
        if let Value::Object(fields) = property {
            fields
                .entry("description")
                .or_insert_with(|| Value::String(DESCRIPTION_FALLBACK.to_string()));
            fields
                .entry("type")
                .or_insert_with(|| Value::String(TYPE_FALLBACK.to_string()));
        }
    }

    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_resolve_refs_inlines_defs_and_drops_section() {
        let schema = json!({
            "type": "object",
            "properties": {
                "location": {"$ref": "#/$defs/Location"},
                "tags": {"type": "array", "items": {"$ref": "#/$defs/Tag"}}
            },
            "$defs": {
                "Location": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}}
                },
                "Tag": {"type": "string", "description": "a tag"}
            }
        });

        let flat = resolve_refs(&schema).unwrap();
        assert_eq!(
            flat,
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "object",
                        "properties": {"city": {"type": "string"}}
                    },
                    "tags": {"type": "array", "items": {"type": "string", "description": "a tag"}}
                }
            })
        );
    }

    #[test]
    fn test_resolve_refs_follows_chained_refs() {
        let schema = json!({
            "properties": {"a": {"$ref": "#/$defs/A"}},
            "$defs": {
                "A": {"$ref": "#/$defs/B"},
                "B": {"type": "integer"}
            }
        });
        let flat = resolve_refs(&schema).unwrap();
        assert_eq!(flat["properties"]["a"], json!({"type": "integer"}));
    }

    #[test]
    fn test_resolve_refs_supports_definitions_pointer() {
        let schema = json!({
            "properties": {"mode": {"$ref": "#/definitions/Mode"}},
            "definitions": {"Mode": {"enum": ["fast", "slow"]}}
        });
        let flat = resolve_refs(&schema).unwrap();
        assert_eq!(flat["properties"]["mode"], json!({"enum": ["fast", "slow"]}));
    }

    #[test]
    fn test_resolve_refs_rejects_cycles_and_dangling_refs() {
        let cyclic = json!({
            "properties": {"node": {"$ref": "#/$defs/Node"}},
            "$defs": {"Node": {"properties": {"next": {"$ref": "#/$defs/Node"}}}}
        });
        assert_eq!(
            resolve_refs(&cyclic),
            Err(SchemaError::Cycle("#/$defs/Node".into()))
        );

        let dangling = json!({"properties": {"x": {"$ref": "#/$defs/Missing"}}});
        assert_eq!(
            resolve_refs(&dangling),
            Err(SchemaError::UnresolvableRef("#/$defs/Missing".into()))
        );

        let remote = json!({"properties": {"x": {"$ref": "https://example.com/s.json"}}});
        assert!(matches!(
            resolve_refs(&remote),
            Err(SchemaError::UnresolvableRef(_))
        ));
    }

    /// Every level points twice at the next, so naive inlining doubles per level.
    fn diamond_schema(levels: usize) -> Value {
        let mut defs = Map::new();
        for level in 0..levels {
            let next = format!("#/$defs/D{}", level + 1);
            defs.insert(
                format!("D{level}"),
                json!({"type": "object", "properties": {"a": {"$ref": next}, "b": {"$ref": next}}}),
            );
        }
        defs.insert(format!("D{levels}"), json!({"type": "string"}));
        json!({
            "type": "object",
            "properties": {"root": {"$ref": "#/$defs/D0"}},
            "$defs": defs
        })
    }

    #[test]
    fn test_resolve_refs_expands_shallow_diamond() {
        let flat = resolve_refs(&diamond_schema(3)).unwrap();
        let root = &flat["properties"]["root"];
        assert_eq!(root["properties"]["a"], root["properties"]["b"]);
        assert_eq!(
            root["properties"]["b"]["properties"]["a"]["properties"]["b"],
            json!({"type": "string"})
        );
        assert!(flat.get("$defs").is_none());
    }

    #[test]
    fn test_resolve_refs_rejects_exponential_diamond() {
        let schema = diamond_schema(24);
        assert!(schema.to_string().len() < 4096);

        assert_eq!(
            resolve_refs(&schema),
            Err(SchemaError::TooLarge(MAX_SCHEMA_NODES))
        );
        assert_eq!(
            normalize_input_schema(&schema),
            Err(SchemaError::TooLarge(MAX_SCHEMA_NODES))
        );
    }

    #[test]
    fn test_normalize_backfills_missing_fields() {
        let schema = json!({
            "type": "object",
            "properties": {
                "param1": {},
                "param2": {"type": "integer", "description": "count"}
            }
        });

        let props = normalize_input_schema(&schema).unwrap();
        assert_eq!(props["param1"]["description"], "see tool description");
        assert_eq!(props["param1"]["type"], "string");
        assert_eq!(props["param2"], json!({"type": "integer", "description": "count"}));
    }

    #[test]
    fn test_normalize_without_properties_is_empty() {
        assert!(normalize_input_schema(&json!({"type": "object"}))
            .unwrap()
            .is_empty());
        assert!(normalize_input_schema(&json!({})).unwrap().is_empty());
    }
}
