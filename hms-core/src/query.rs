//! Query identity and mutation declarations.
//!
//! A cacheable read is identified by its endpoint name plus its arguments in
//! canonical form, so `{page: 1, limit: 10}` and `{limit: 10, page: 1}` share
//! one cache entry.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::request::ApiRequest;
use crate::tag::{EntityTag, TagSet};

/// Cache key: endpoint name and canonical argument record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey {
    endpoint: String,
    args: String,
}

impl QueryKey {
    pub fn new<A: Serialize + ?Sized>(endpoint: impl Into<String>, args: &A) -> Self {
        Self {
            endpoint: endpoint.into(),
            args: canonical_args(args),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn args(&self) -> &str {
        &self.args
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.endpoint, self.args)
    }
}

/// Render arguments in canonical form.
///
/// Object members are sorted by key at every depth and `null` members are
/// dropped, so an omitted optional argument and an explicit `null` produce the
/// same key. Array order is significant and kept.
pub fn canonical_args<A: Serialize + ?Sized>(args: &A) -> String {
    let value = serde_json::to_value(args).unwrap_or(Value::Null);
    let mut out = String::new();
    write_canonical(&value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            members.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Immutable description of a cacheable read.
///
/// Identity is the [`QueryKey`] alone; the request and provided tags are
/// derived from the same arguments and travel with the key.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    key: QueryKey,
    request: ApiRequest,
    provides: TagSet,
}

impl QueryDescriptor {
    pub fn new<A: Serialize + ?Sized>(
        endpoint: impl Into<String>,
        args: &A,
        request: ApiRequest,
    ) -> Self {
        Self {
            key: QueryKey::new(endpoint, args),
            request,
            provides: TagSet::new(),
        }
    }

    /// Declare the tags the cached result provides.
    pub fn provides<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityTag>,
    {
        self.provides.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn provided_tags(&self) -> &TagSet {
        &self.provides
    }
}

impl PartialEq for QueryDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for QueryDescriptor {}

impl Hash for QueryDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// A write against the backend and the tags it invalidates on success.
#[derive(Debug, Clone)]
pub struct Mutation {
    name: String,
    request: ApiRequest,
    invalidates: TagSet,
}

impl Mutation {
    pub fn new(name: impl Into<String>, request: ApiRequest) -> Self {
        Self {
            name: name.into(),
            request,
            invalidates: TagSet::new(),
        }
    }

    pub fn invalidates<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityTag>,
    {
        self.invalidates.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn invalidated_tags(&self) -> &TagSet {
        &self.invalidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_member_order() {
        let a = QueryKey::new("patients", &json!({ "page": 1, "limit": 10 }));
        let b = QueryKey::new("patients", &json!({ "limit": 10, "page": 1 }));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), r#"patients({"limit":10,"page":1})"#);
    }

    #[test]
    fn test_key_sorts_nested_objects() {
        let a = canonical_args(&json!({ "filter": { "z": 1, "a": [3, 1] } }));
        assert_eq!(a, r#"{"filter":{"a":[3,1],"z":1}}"#);
    }

    #[test]
    fn test_null_members_are_dropped() {
        let a = QueryKey::new("encounters", &json!({ "id": "p1", "search": null }));
        let b = QueryKey::new("encounters", &json!({ "id": "p1" }));
        assert_eq!(a, b);
    }

    #[test]
    fn test_endpoint_is_part_of_identity() {
        let args = json!({ "id": "p1" });
        assert_ne!(QueryKey::new("patient", &args), QueryKey::new("encounters", &args));
    }

    #[test]
    fn test_unit_args() {
        assert_eq!(canonical_args(&()), "null");
    }

    #[test]
    fn test_descriptor_identity_is_key() {
        let a = QueryDescriptor::new("hospital", &(), ApiRequest::get("/hospitals"))
            .provides(["Hospital"]);
        let b = QueryDescriptor::new("hospital", &(), ApiRequest::get("/hospitals/other"));
        assert_eq!(a, b);
        assert!(a.provided_tags().contains(&EntityTag::hospital()));
    }

    #[test]
    fn test_mutation_declares_tags() {
        let mutation = Mutation::new("deletePatient", ApiRequest::delete("/patients/1"))
            .invalidates(["Patient"]);
        assert_eq!(mutation.invalidated_tags().len(), 1);
        assert_eq!(mutation.name(), "deletePatient");
    }
}
