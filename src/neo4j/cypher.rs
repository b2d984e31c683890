//! Cypher building helpers
//!
//! Labels and relationship types cannot be query parameters, so they are
//! interpolated as backtick-quoted identifiers. Everything else goes through
//! `$params` built here.

use crate::error::StoreError;
use crate::graph::{is_reserved_key, PropertyMap};
use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType};
use std::collections::HashMap;

/// Quote a label or relationship type for interpolation into Cypher.
///
/// Backticks inside the name are doubled; empty names are rejected.
pub fn escape_identifier(name: &str) -> Result<String, StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Convert a JSON value into the Bolt representation sent to Neo4j
pub fn json_to_bolt(value: &serde_json::Value) -> BoltType {
    match value {
        serde_json::Value::Null => BoltType::Null(BoltNull),
        serde_json::Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        serde_json::Value::String(s) => BoltType::String(BoltString::new(s)),
        serde_json::Value::Array(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(json_to_bolt(item));
            }
            BoltType::List(list)
        }
        serde_json::Value::Object(map) => {
            let mut bolt = BoltMap::with_capacity(map.len());
            for (k, v) in map {
                bolt.put(BoltString::new(k), json_to_bolt(v));
            }
            BoltType::Map(bolt)
        }
    }
}

/// Bolt map from string keys to Bolt values
pub fn bolt_map<'a, I>(entries: I) -> BoltType
where
    I: IntoIterator<Item = (&'a str, BoltType)>,
{
    let mut map = BoltMap::new();
    for (k, v) in entries {
        map.put(BoltString::new(k), v);
    }
    BoltType::Map(map)
}

/// Bolt list of strings
pub fn bolt_strings(items: &[String]) -> BoltType {
    let mut list = BoltList::with_capacity(items.len());
    for item in items {
        list.push(BoltType::String(BoltString::new(item)));
    }
    BoltType::List(list)
}

/// Bolt list of already-converted values, e.g. `UNWIND $rows` batches
pub fn bolt_list(items: Vec<BoltType>) -> BoltType {
    let mut list = BoltList::with_capacity(items.len());
    for item in items {
        list.push(item);
    }
    BoltType::List(list)
}

/// Bolt list of floats, as Neo4j stores embeddings
pub fn bolt_embedding(embedding: &[f32]) -> BoltType {
    let mut list = BoltList::with_capacity(embedding.len());
    for x in embedding {
        list.push(BoltType::Float(BoltFloat::new(*x as f64)));
    }
    BoltType::List(list)
}

fn is_scalar(value: &serde_json::Value) -> bool {
    matches!(
        value,
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) | serde_json::Value::String(_)
    )
}

/// Make a property map storable as Neo4j node/relationship properties.
///
/// Neo4j accepts scalars and homogeneous lists of scalars only. Nulls are
/// dropped (setting a property to null removes it), nested objects and mixed
/// lists are stored as their JSON text, and store-owned keys are skipped.
pub fn sanitize_properties(properties: &PropertyMap) -> PropertyMap {
    let mut clean = PropertyMap::new();
    for (key, value) in properties {
        if is_reserved_key(key) {
            continue;
        }
        let stored = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::Array(items) if items.is_empty() => value.clone(),
            serde_json::Value::Array(items) => {
                let homogeneous = items.iter().all(is_scalar)
                    && items.iter().all(|i| {
                        std::mem::discriminant(i) == std::mem::discriminant(&items[0])
                    });
                if homogeneous {
                    value.clone()
                } else {
                    serde_json::Value::String(value.to_string())
                }
            }
            serde_json::Value::Object(_) => serde_json::Value::String(value.to_string()),
            _ => value.clone(),
        };
        clean.insert(key.clone(), stored);
    }
    clean
}

/// Bolt map of a sanitized property map
pub fn bolt_properties(properties: &PropertyMap) -> BoltType {
    let mut map = BoltMap::with_capacity(properties.len());
    for (k, v) in sanitize_properties(properties) {
        map.put(BoltString::new(&k), json_to_bolt(&v));
    }
    BoltType::Map(map)
}

/// Builder for parameterized WHERE clauses in Cypher queries
#[derive(Default)]
pub struct WhereBuilder {
    conditions: Vec<String>,
    params: HashMap<String, BoltType>,
}

impl WhereBuilder {
    /// Create a new empty WhereBuilder
    pub fn new() -> Self {
        Self::default()
    }

    fn next_param(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.params.len())
    }

    /// `alias.id IN $ids`
    pub fn add_id_filter(&mut self, alias: &str, ids: Option<&[String]>) -> &mut Self {
        if let Some(ids) = ids {
            let param = self.next_param("ids");
            self.conditions.push(format!("{}.id IN ${}", alias, param));
            self.params.insert(param, bolt_strings(ids));
        }
        self
    }

    /// `alias.name IN $names`
    pub fn add_name_filter(&mut self, alias: &str, names: Option<&[String]>) -> &mut Self {
        if let Some(names) = names {
            let param = self.next_param("names");
            self.conditions.push(format!("{}.name IN ${}", alias, param));
            self.params.insert(param, bolt_strings(names));
        }
        self
    }

    /// `type(alias) IN $types`
    pub fn add_type_filter(&mut self, alias: &str, types: Option<&[String]>) -> &mut Self {
        if let Some(types) = types {
            let param = self.next_param("types");
            self.conditions.push(format!("type({}) IN ${}", alias, param));
            self.params.insert(param, bolt_strings(types));
        }
        self
    }

    /// One equality per property; values are sanitized the same way as on write
    pub fn add_property_filters(
        &mut self,
        alias: &str,
        properties: Option<&PropertyMap>,
    ) -> &mut Self {
        let Some(properties) = properties else {
            return self;
        };
        for (key, value) in properties {
            let stored = if is_reserved_key(key) {
                value.clone()
            } else {
                let mut single = PropertyMap::new();
                single.insert(key.clone(), value.clone());
                match sanitize_properties(&single).remove(key) {
                    Some(v) => v,
                    None => continue,
                }
            };
            let param = self.next_param("prop");
            self.conditions
                .push(format!("{}[${}_key] = ${}", alias, param, param));
            self.params
                .insert(format!("{}_key", param), BoltType::String(BoltString::new(key)));
            self.params.insert(param, json_to_bolt(&stored));
        }
        self
    }

    /// Add a raw condition with no parameters
    pub fn add_condition(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }

    /// Build the WHERE clause (returns empty string if no conditions)
    pub fn build(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Check if any conditions have been added
    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Attach the collected parameters to a query
    pub fn apply(&self, mut q: neo4rs::Query) -> neo4rs::Query {
        for (name, value) in &self.params {
            q = q.param(name, value.clone());
        }
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("PERSON").unwrap(), "`PERSON`");
        assert_eq!(escape_identifier("we`ird").unwrap(), "`we``ird`");
        assert!(matches!(
            escape_identifier("  "),
            Err(StoreError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_sanitize_properties() {
        let mut props = PropertyMap::new();
        props.insert("age".into(), json!(28));
        props.insert("tags".into(), json!(["a", "b"]));
        props.insert("mixed".into(), json!([1, "x"]));
        props.insert("nested".into(), json!({"k": 1}));
        props.insert("gone".into(), json!(null));
        props.insert("name".into(), json!("shadow"));

        let clean = sanitize_properties(&props);

        assert_eq!(clean.get("age"), Some(&json!(28)));
        assert_eq!(clean.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(clean.get("mixed"), Some(&json!("[1,\"x\"]")));
        assert_eq!(clean.get("nested"), Some(&json!("{\"k\":1}")));
        assert!(!clean.contains_key("gone"));
        assert!(!clean.contains_key("name"));
    }

    #[test]
    fn test_json_to_bolt_scalars() {
        assert!(matches!(json_to_bolt(&json!(null)), BoltType::Null(_)));
        assert!(matches!(json_to_bolt(&json!(true)), BoltType::Boolean(_)));
        assert!(matches!(json_to_bolt(&json!(3)), BoltType::Integer(_)));
        assert!(matches!(json_to_bolt(&json!(1.5)), BoltType::Float(_)));
        assert!(matches!(json_to_bolt(&json!("s")), BoltType::String(_)));
        assert!(matches!(json_to_bolt(&json!([1, 2])), BoltType::List(_)));
        assert!(matches!(json_to_bolt(&json!({"a": 1})), BoltType::Map(_)));
    }

    #[test]
    fn test_where_builder_empty() {
        let wb = WhereBuilder::new();
        assert!(!wb.has_conditions());
        assert_eq!(wb.build(), "");
    }

    #[test]
    fn test_where_builder_conditions() {
        let mut props = PropertyMap::new();
        props.insert("age".into(), json!(28));

        let mut wb = WhereBuilder::new();
        wb.add_id_filter("e", Some(&["x".to_string()]))
            .add_name_filter("e", None)
            .add_property_filters("e", Some(&props));

        assert_eq!(
            wb.build(),
            "WHERE e.id IN $ids_0 AND e[$prop_1_key] = $prop_1"
        );
        assert_eq!(wb.params.len(), 3);
    }

    #[test]
    fn test_where_builder_type_filter() {
        let mut wb = WhereBuilder::new();
        wb.add_type_filter("r", Some(&["LIVES_IN".to_string()]));
        assert_eq!(wb.build(), "WHERE type(r) IN $types_0");
    }
}
