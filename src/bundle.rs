// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Analytics records and normalized extractor output.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One analytics record: a stable identity key, a sampling weight, and the
/// fields consumed by series/facet extractors. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Stable identity key; membership hashing is a pure function of it.
    pub id: String,
    /// Sampling multiplier applied to facet weights and counts.
    pub weight: f64,
    /// Raw fields read by extractors.
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

impl Bundle {
    /// Creates a bundle with no fields.
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            fields: serde_json::Map::new(),
        }
    }

    /// Adds one raw field, builder-style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns one raw field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A batch of bundles delivered to ingestion in one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub date: String,
    pub bundles: Vec<Bundle>,
}

impl Chunk {
    pub fn new(date: impl Into<String>, bundles: Vec<Bundle>) -> Self {
        Self {
            date: date.into(),
            bundles,
        }
    }
}

/// Facet extractor output, normalized once at the extractor boundary.
///
/// Downstream code never re-derives "is this a list or a scalar": an
/// extractor yields no value, one value, or several values, and every
/// consumer matches on exactly that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValues {
    /// The extractor produced nothing for this bundle.
    Empty,
    /// A single categorical value.
    Single(String),
    /// Several categorical values, each counted independently.
    Multiple(Vec<String>),
}

impl FieldValues {
    /// Normalizes a raw JSON field into extractor output.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValues::Empty,
            Value::String(s) => FieldValues::Single(s.clone()),
            Value::Bool(b) => FieldValues::Single(b.to_string()),
            Value::Number(n) => FieldValues::Single(n.to_string()),
            Value::Array(items) => {
                let values: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        Value::Bool(b) => Some(b.to_string()),
                        Value::Number(n) => Some(n.to_string()),
                        other => Some(other.to_string()),
                    })
                    .collect();
                match values.len() {
                    0 => FieldValues::Empty,
                    1 => FieldValues::Single(values.into_iter().next().unwrap_or_default()),
                    _ => FieldValues::Multiple(values),
                }
            }
            other => FieldValues::Single(other.to_string()),
        }
    }

    /// Returns true if the extractor produced nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValues::Empty)
    }

    /// Iterates the produced values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: Vec<&str> = match self {
            FieldValues::Empty => Vec::new(),
            FieldValues::Single(value) => vec![value.as_str()],
            FieldValues::Multiple(values) => values.iter().map(String::as_str).collect(),
        };
        values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalization() {
        assert_eq!(FieldValues::from_json(&json!(null)), FieldValues::Empty);
        assert_eq!(
            FieldValues::from_json(&json!("mobile")),
            FieldValues::Single("mobile".to_string())
        );
        assert_eq!(
            FieldValues::from_json(&json!(["a", "b"])),
            FieldValues::Multiple(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            FieldValues::from_json(&json!(["a"])),
            FieldValues::Single("a".to_string())
        );
        assert_eq!(FieldValues::from_json(&json!([])), FieldValues::Empty);
    }
}
