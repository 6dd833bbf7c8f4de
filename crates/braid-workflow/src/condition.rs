//! Edge traversal conditions.
//!
//! An edge can carry a declarative [`ConditionConfig`] (serializable, the
//! primary form) and/or an opaque [`Predicate`] registered programmatically.
//! When both are present the predicate wins. When neither is present the edge
//! always fires.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Programmatic edge condition evaluated against the source node's result.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Declarative edge condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionConfig {
  /// Traverse iff the result equals `value`.
  ResultEquals { value: Value },
  /// Traverse iff the result differs from `value`.
  ResultNotEquals { value: Value },
  /// Traverse iff the result contains `value`: a substring of a string result,
  /// an element of an array result, or a key of an object result.
  ResultContains { value: Value },
  /// Traverse iff the result is truthy.
  ResultTruthy,
  /// Traverse iff the result is falsy.
  ResultFalsy,
  /// Traverse iff the field at the dot-separated `path` equals `value`.
  FieldEquals { path: String, value: Value },
}

impl ConditionConfig {
  pub fn result_equals(value: impl Into<Value>) -> Self {
    Self::ResultEquals {
      value: value.into(),
    }
  }

  pub fn result_contains(value: impl Into<Value>) -> Self {
    Self::ResultContains {
      value: value.into(),
    }
  }

  pub fn field_equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::FieldEquals {
      path: path.into(),
      value: value.into(),
    }
  }

  /// Check the condition against a node result.
  pub fn matches(&self, result: &Value) -> bool {
    match self {
      ConditionConfig::ResultEquals { value } => values_equal(result, value),
      ConditionConfig::ResultNotEquals { value } => !values_equal(result, value),
      ConditionConfig::ResultContains { value } => contains(result, value),
      ConditionConfig::ResultTruthy => is_truthy(result),
      ConditionConfig::ResultFalsy => !is_truthy(result),
      ConditionConfig::FieldEquals { path, value } => {
        lookup_path(result, path).is_some_and(|field| values_equal(field, value))
      }
    }
  }
}

/// Decide whether an edge fires.
///
/// A missing result is evaluated as `null`.
pub fn evaluate(
  predicate: Option<&Predicate>,
  condition: Option<&ConditionConfig>,
  result: Option<&Value>,
) -> bool {
  let result = result.unwrap_or(&Value::Null);
  match (predicate, condition) {
    (Some(predicate), _) => predicate(result),
    (None, Some(condition)) => condition.matches(result),
    (None, None) => true,
  }
}

/// JSON truthiness: `null`, `false`, zero, and empty strings, arrays and objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
  }
}

/// Equality that treats `1` and `1.0` as the same number.
fn values_equal(left: &Value, right: &Value) -> bool {
  match (left, right) {
    (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
      (Some(a), Some(b)) => a == b,
      _ => a == b,
    },
    _ => left == right,
  }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
  match haystack {
    Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
    Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
    Value::Object(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
    _ => false,
  }
}

fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  path
    .split('.')
    .filter(|segment| !segment.is_empty())
    .try_fold(value, |current, segment| match current {
      Value::Object(map) => map.get(segment),
      Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
      _ => None,
    })
}
