#![allow(dead_code)]

pub mod steps;

use serde_json::Value;
use weft::store::SharedStore;

/// Appends `name` to the `visited` list in the store.
pub fn push_visit(shared: &SharedStore, name: &str) {
    shared.with_mut(|map| {
        let entry = map
            .entry("visited".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(Value::String(name.to_string()));
        }
    });
}

/// Reads the `visited` list back as strings.
pub fn visited(shared: &SharedStore) -> Vec<String> {
    match shared.get("visited") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
