//! Creation payloads: flat form fields turned into a nested tree
//!
//! Keys are dotted paths (`shape.x`, `annotations.0`) and may use brackets
//! (`annotations[0]`). Maps whose keys are exactly `0..n` become lists.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use indexmap::IndexMap;
use thiserror::Error;

use super::types::StoredObject;

/// Errors raised while interpreting a payload
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Key '{0}' is used both as a value and as a prefix")]
    KeyConflict(String),

    #[error("Malformed key '{0}'")]
    MalformedKey(String),

    #[error("Missing field '{0}'")]
    Missing(String),

    #[error("Field '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Field '{field}' references unknown object '{value}'")]
    UnresolvedReference { field: String, value: String },
}

/// A form value as received
#[derive(Debug, Clone)]
pub enum RawValue {
    Text(String),
    Bytes(Bytes),
}

/// Flat `(key, value)` list in submission order
#[derive(Debug, Clone, Default)]
pub struct RawPayload {
    entries: Vec<(String, RawValue)>,
}

impl RawPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), RawValue::Text(value.into())));
    }

    pub fn push_bytes(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.entries.push((key.into(), RawValue::Bytes(value.into())));
    }

    /// Builder form of [`RawPayload::push_text`]
    pub fn text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_text(key, value);
        self
    }

    /// Builder form of [`RawPayload::push_bytes`]
    pub fn bytes(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.push_bytes(key, value);
        self
    }

    pub fn field_count(&self) -> usize {
        self.entries.len()
    }

    pub fn into_entries(self) -> Vec<(String, RawValue)> {
        self.entries
    }
}

/// A leaf after reference resolution
#[derive(Debug, Clone)]
pub enum PayloadValue {
    Text(String),
    Bytes(Bytes),
    Object(StoredObject),
}

#[derive(Debug, Clone)]
pub enum PayloadNode {
    Value(PayloadValue),
    List(Vec<PayloadNode>),
    Map(IndexMap<String, PayloadNode>),
}

impl PayloadNode {
    fn describe(&self) -> &'static str {
        match self {
            PayloadNode::Value(PayloadValue::Text(_)) => "text",
            PayloadNode::Value(PayloadValue::Bytes(_)) => "a file",
            PayloadNode::Value(PayloadValue::Object(_)) => "an object reference",
            PayloadNode::List(_) => "a list",
            PayloadNode::Map(_) => "a map",
        }
    }

    /// Child by key (maps) or by index (lists)
    pub fn child(&self, key: &str) -> Option<&PayloadNode> {
        match self {
            PayloadNode::Map(map) => map.get(key),
            PayloadNode::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            PayloadNode::Value(_) => None,
        }
    }

    pub fn as_text(&self, field: &str) -> Result<&str, PayloadError> {
        match self {
            PayloadNode::Value(PayloadValue::Text(text)) => Ok(text),
            _ => Err(PayloadError::WrongType {
                field: field.to_string(),
                expected: "text",
            }),
        }
    }

    pub fn parse<T>(&self, field: &str) -> Result<T, PayloadError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.as_text(field)?
            .trim()
            .parse()
            .map_err(|e: T::Err| PayloadError::InvalidField {
                field: field.to_string(),
                message: e.to_string(),
            })
    }

    pub fn as_bytes(&self, field: &str) -> Result<&Bytes, PayloadError> {
        match self {
            PayloadNode::Value(PayloadValue::Bytes(bytes)) => Ok(bytes),
            other => Err(PayloadError::WrongType {
                field: format!("{} ({})", field, other.describe()),
                expected: "a file",
            }),
        }
    }

    pub fn as_object(&self, field: &str) -> Result<&StoredObject, PayloadError> {
        match self {
            PayloadNode::Value(PayloadValue::Object(object)) => Ok(object),
            PayloadNode::Value(PayloadValue::Text(value)) => Err(PayloadError::UnresolvedReference {
                field: field.to_string(),
                value: value.clone(),
            }),
            _ => Err(PayloadError::WrongType {
                field: field.to_string(),
                expected: "an object id",
            }),
        }
    }

    /// Elements of a list; a single value counts as a one-element list
    pub fn items(&self) -> Vec<&PayloadNode> {
        match self {
            PayloadNode::List(items) => items.iter().collect(),
            PayloadNode::Map(map) => map.values().collect(),
            value => vec![value],
        }
    }
}

/// Nested, reference-resolved payload
#[derive(Debug, Clone, Default)]
pub struct Payload {
    root: IndexMap<String, PayloadNode>,
}

fn split_key(key: &str) -> Result<Vec<String>, PayloadError> {
    let normalized = key.replace('[', ".").replace(']', "");
    let segments: Vec<String> = normalized.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PayloadError::MalformedKey(key.to_string()));
    }
    Ok(segments)
}

fn insert_path(
    root: &mut IndexMap<String, PayloadNode>,
    key: &str,
    value: PayloadValue,
) -> Result<(), PayloadError> {
    let segments = split_key(key)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| PayloadError::MalformedKey(key.to_string()))?;

    let mut map = root;
    for segment in parents {
        let node = map
            .entry(segment.clone())
            .or_insert_with(|| PayloadNode::Map(IndexMap::new()));
        map = match node {
            PayloadNode::Map(inner) => inner,
            _ => return Err(PayloadError::KeyConflict(key.to_string())),
        };
    }
    if map.contains_key(last) {
        return Err(PayloadError::KeyConflict(key.to_string()));
    }
    map.insert(last.clone(), PayloadNode::Value(value));
    Ok(())
}

/// Turn maps keyed exactly `0..n` into lists, recursively
fn listify(node: PayloadNode) -> PayloadNode {
    match node {
        PayloadNode::Map(map) => {
            let n = map.len();
            let is_sequence = n > 0
                && map
                    .keys()
                    .all(|k| k.parse::<usize>().is_ok_and(|i| i < n && i.to_string() == *k));
            if is_sequence {
                let mut items: Vec<(usize, PayloadNode)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, listify(v))))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                PayloadNode::List(items.into_iter().map(|(_, v)| v).collect())
            } else {
                PayloadNode::Map(map.into_iter().map(|(k, v)| (k, listify(v))).collect())
            }
        }
        other => other,
    }
}

impl Payload {
    /// Build from already resolved `(key, value)` pairs
    pub fn unflatten(entries: Vec<(String, PayloadValue)>) -> Result<Self, PayloadError> {
        let mut root = IndexMap::new();
        for (key, value) in entries {
            insert_path(&mut root, &key, value)?;
        }
        let root = root.into_iter().map(|(k, v)| (k, listify(v))).collect();
        Ok(Self { root })
    }

    pub fn get(&self, field: &str) -> Option<&PayloadNode> {
        self.root.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.root.contains_key(field)
    }

    pub fn require(&self, field: &str) -> Result<&PayloadNode, PayloadError> {
        self.get(field)
            .ok_or_else(|| PayloadError::Missing(field.to_string()))
    }

    pub fn text(&self, field: &str) -> Result<&str, PayloadError> {
        self.require(field)?.as_text(field)
    }

    pub fn opt_text(&self, field: &str) -> Result<Option<&str>, PayloadError> {
        self.get(field).map(|node| node.as_text(field)).transpose()
    }

    pub fn parse<T>(&self, field: &str) -> Result<T, PayloadError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.require(field)?.parse(field)
    }

    pub fn bytes(&self, field: &str) -> Result<&Bytes, PayloadError> {
        self.require(field)?.as_bytes(field)
    }

    pub fn object(&self, field: &str) -> Result<&StoredObject, PayloadError> {
        self.require(field)?.as_object(field)
    }

    /// Objects referenced by a list field (`field.0`, `field.1`, ...)
    pub fn objects(&self, field: &str) -> Result<Vec<&StoredObject>, PayloadError> {
        self.require(field)?
            .items()
            .into_iter()
            .enumerate()
            .map(|(i, node)| node.as_object(&format!("{}.{}", field, i)))
            .collect()
    }

    /// Numbers under `field.{names[0]}, field.{names[1]}, ...` or, when the
    /// field is a list, `field.0, field.1, ...`; missing components take
    /// `defaults`
    pub fn components<T, const N: usize>(
        &self,
        field: &str,
        names: [&str; N],
        defaults: [Option<T>; N],
    ) -> Result<Option<[T; N]>, PayloadError>
    where
        T: FromStr + Copy,
        T::Err: fmt::Display,
    {
        let Some(node) = self.get(field) else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(N);
        for (i, (name, default)) in names.into_iter().zip(defaults).enumerate() {
            let path = format!("{}.{}", field, name);
            let child = match node {
                PayloadNode::List(items) => items.get(i),
                _ => node.child(name),
            };
            match (child, default) {
                (Some(child), _) => out.push(child.parse(&path)?),
                (None, Some(default)) => out.push(default),
                (None, None) => return Err(PayloadError::Missing(path)),
            }
        }
        out.try_into()
            .map(Some)
            .map_err(|_| PayloadError::Missing(field.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(key: &str, value: &str) -> (String, PayloadValue) {
        (key.to_string(), PayloadValue::Text(value.to_string()))
    }

    #[test]
    fn test_unflatten_nested_maps() {
        let payload = Payload::unflatten(vec![
            text("shape.x", "10"),
            text("shape.y", "20"),
            text("sigma", "1.5"),
        ])
        .unwrap();
        let shape = payload.get("shape").unwrap();
        assert!(matches!(shape, PayloadNode::Map(_)));
        assert_eq!(shape.child("y").unwrap().as_text("shape.y").unwrap(), "20");
        assert_eq!(payload.parse::<f32>("sigma").unwrap(), 1.5);
    }

    #[test]
    fn test_numeric_keys_become_lists() {
        let payload = Payload::unflatten(vec![
            text("color[2]", "0.3"),
            text("color.0", "0.1"),
            text("color.1", "0.2"),
        ])
        .unwrap();
        let PayloadNode::List(items) = payload.get("color").unwrap() else {
            panic!("expected a list");
        };
        let values: Vec<&str> = items.iter().map(|n| n.as_text("color").unwrap()).collect();
        assert_eq!(values, vec!["0.1", "0.2", "0.3"]);
    }

    #[test]
    fn test_sparse_indices_stay_a_map() {
        let payload = Payload::unflatten(vec![text("a.0", "x"), text("a.2", "y")]).unwrap();
        assert!(matches!(payload.get("a").unwrap(), PayloadNode::Map(_)));
    }

    #[test]
    fn test_key_conflict() {
        let result = Payload::unflatten(vec![text("a", "1"), text("a.b", "2")]);
        assert!(matches!(result, Err(PayloadError::KeyConflict(_))));
        let result = Payload::unflatten(vec![text("a.b", "2"), text("a", "1")]);
        assert!(matches!(result, Err(PayloadError::KeyConflict(_))));
        let result = Payload::unflatten(vec![text("a", "1"), text("a", "2")]);
        assert!(matches!(result, Err(PayloadError::KeyConflict(_))));
    }

    #[test]
    fn test_malformed_key() {
        assert!(matches!(
            Payload::unflatten(vec![text("a..b", "1")]),
            Err(PayloadError::MalformedKey(_))
        ));
        assert!(matches!(
            Payload::unflatten(vec![text("a[]", "1")]),
            Err(PayloadError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_components_from_list_and_map() {
        let payload = Payload::unflatten(vec![
            text("pointA.0", "1.7"),
            text("pointA.1", "2"),
            text("pointA.2", "3"),
            text("offset.y", "4"),
        ])
        .unwrap();
        let point: [f64; 3] = payload
            .components("pointA", ["x", "y", "z"], [None; 3])
            .unwrap()
            .unwrap();
        assert_eq!(point, [1.7, 2.0, 3.0]);

        let offset: [i64; 3] = payload
            .components("offset", ["x", "y", "z"], [Some(0); 3])
            .unwrap()
            .unwrap();
        assert_eq!(offset, [0, 4, 0]);

        assert!(payload
            .components::<i64, 3>("missing", ["x", "y", "z"], [None; 3])
            .unwrap()
            .is_none());
        assert!(matches!(
            payload.components::<i64, 3>("offset", ["x", "y", "z"], [None; 3]),
            Err(PayloadError::Missing(_))
        ));
    }

    #[test]
    fn test_unresolved_reference() {
        let payload = Payload::unflatten(vec![text("raw_data", "nope")]).unwrap();
        assert!(matches!(
            payload.object("raw_data"),
            Err(PayloadError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_invalid_number() {
        let payload = Payload::unflatten(vec![text("sigma", "abc")]).unwrap();
        assert!(matches!(
            payload.parse::<f32>("sigma"),
            Err(PayloadError::InvalidField { .. })
        ));
        assert!(matches!(
            payload.parse::<f32>("other"),
            Err(PayloadError::Missing(_))
        ));
    }
}
