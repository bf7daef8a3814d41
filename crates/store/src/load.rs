//! Object dumps: JSON or YAML, one or more documents, each a single object,
//! a `*List` with `items`, or a plain array.

use std::path::Path;

use anyhow::Context;
use ksq_resources::{ResourceObject, Scheme};
use serde::Deserialize;
use serde_json::Value;

pub fn parse_documents(text: &str) -> anyhow::Result<Vec<Value>> {
    let mut out = Vec::new();
    for (i, doc) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = Value::deserialize(doc).with_context(|| format!("document {i}"))?;
        flatten(value, &mut out);
    }
    Ok(out)
}

fn flatten(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.into_iter().for_each(|v| flatten(v, out)),
        Value::Object(mut map) if is_list(&map) => {
            if let Some(Value::Array(items)) = map.remove("items") {
                items.into_iter().for_each(|v| flatten(v, out));
            }
        }
        other => out.push(other),
    }
}

fn is_list(map: &serde_json::Map<String, Value>) -> bool {
    map.get("kind").and_then(|k| k.as_str()).is_some_and(|k| k.ends_with("List")) && map.get("items").is_some_and(Value::is_array)
}

pub fn load_documents(scheme: &Scheme, text: &str) -> anyhow::Result<Vec<ResourceObject>> {
    parse_documents(text)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| scheme.decode(v).with_context(|| format!("object {i}")))
        .collect()
}

pub fn load_file(scheme: &Scheme, path: &Path) -> anyhow::Result<Vec<ResourceObject>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    load_documents(scheme, &text).with_context(|| format!("load {}", path.display()))
}
