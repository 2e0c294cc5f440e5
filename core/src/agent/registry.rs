use crate::traits::{Tool, ToolDescriptor};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named tools available to the conversation engine.
///
/// Registration happens once at startup through `&mut self`; afterwards the
/// registry is shared behind an `Arc` and only read.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tool` under `name`. A second registration under the same
    /// name replaces the first.
    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!("Tool '{}' re-registered, previous entry replaced", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolDescriptor {
                name: name.clone(),
                ..tool.descriptor()
            })
            .collect()
    }

    pub fn catalog(&self) -> Value {
        Value::Array(self.descriptors().iter().map(catalog_entry).collect())
    }

    /// Serializes the catalog that is embedded in the system prompt.
    pub fn dump_catalog(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&self.catalog())?)
    }
}

fn catalog_entry(descriptor: &ToolDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, param) in &descriptor.parameters {
        let mut property = Map::new();
        property.insert("type".into(), Value::String(param.kind.clone()));
        if let Some(format) = &param.format {
            property.insert("format".into(), Value::String(format.clone()));
        }
        properties.insert(name.clone(), Value::Object(property));

        if param.required {
            required.push(name.clone());
        }
    }

    json!({
        "type": "function",
        "function": {
            "name": descriptor.name,
            "description": descriptor.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
            "use_case": descriptor.use_cases,
        }
    })
}
