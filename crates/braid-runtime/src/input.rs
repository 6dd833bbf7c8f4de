//! Variable resolution for node configs.
//!
//! String values may reference run variables with `${name}` placeholders:
//!
//! ```json
//! { "query": "${topic}", "greeting": "Hello ${user.name}!" }
//! ```
//!
//! Placeholder names are looked up verbatim in the variable table; a dotted
//! name is a flat key, not a path. String variables are substituted as-is and
//! any other JSON value is rendered as JSON text. Unknown names are left
//! untouched so they stay visible in the node's input.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is a valid regex")
});

/// Resolve every `${name}` placeholder in `value` against `variables`.
///
/// Objects keep their keys and resolve their values; arrays resolve element by
/// element; numbers, booleans and null pass through.
pub fn resolve(value: &Value, variables: &Map<String, Value>) -> Value {
  match value {
    Value::String(text) => Value::String(resolve_str(text, variables)),
    Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, variables)).collect()),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(key, v)| (key.clone(), resolve(v, variables)))
        .collect(),
    ),
    other => other.clone(),
  }
}

fn resolve_str(text: &str, variables: &Map<String, Value>) -> String {
  PLACEHOLDER
    .replace_all(text, |caps: &Captures<'_>| match variables.get(&caps[1]) {
      Some(Value::String(s)) => s.clone(),
      Some(other) => other.to_string(),
      None => caps[0].to_string(),
    })
    .into_owned()
}

/// Variable names referenced by `value`, in order of first appearance.
pub fn placeholders(value: &Value) -> Vec<String> {
  let mut names = Vec::new();
  collect_placeholders(value, &mut names);
  names
}

fn collect_placeholders(value: &Value, names: &mut Vec<String>) {
  match value {
    Value::String(text) => {
      for caps in PLACEHOLDER.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
          names.push(name.to_string());
        }
      }
    }
    Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, names)),
    Value::Object(map) => map.values().for_each(|v| collect_placeholders(v, names)),
    _ => {}
  }
}
