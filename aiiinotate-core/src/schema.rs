//! Data-valued write schemas for the stored collections.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::store::lookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Object,
    /// An object or an array of objects.
    ObjectOrArray,
    /// A non-empty array of strings.
    StringArray,
    /// An array of strings, possibly empty.
    StringList,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_u64() || value.is_i64(),
            Self::Object => value.is_object(),
            Self::ObjectOrArray => match value {
                Value::Object(_) => true,
                Value::Array(items) => items.iter().all(Value::is_object),
                _ => false,
            },
            Self::StringArray => value
                .as_array()
                .is_some_and(|items| !items.is_empty() && items.iter().all(Value::is_string)),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Object => "an object",
            Self::ObjectOrArray => "an object or an array of objects",
            Self::StringArray => "a non-empty array of strings",
            Self::StringList => "an array of strings",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub path: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    const fn required(path: &'static str, kind: FieldKind) -> Self {
        Self { path, kind, required: true }
    }

    const fn optional(path: &'static str, kind: FieldKind) -> Self {
        Self { path, kind, required: false }
    }

    fn top_level(&self) -> &str {
        self.path.split('.').next().unwrap_or(self.path)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DocumentSchema {
    pub name: &'static str,
    pub fields: Vec<FieldRule>,
}

impl DocumentSchema {
    /// Stored IIIF 2.1 annotation.
    pub fn annotation2() -> Self {
        use FieldKind::*;
        Self {
            name: "annotation",
            fields: vec![
                FieldRule::required("@id", String),
                FieldRule::required("@context", String),
                FieldRule::required("on", Object),
                FieldRule::required("on.@type", String),
                FieldRule::required("on.full", String),
                FieldRule::required("on.manifestShortId", String),
                FieldRule::optional("on.manifestUri", String),
                FieldRule::optional("on.canvasIdx", Integer),
                FieldRule::required("motivation", StringArray),
                FieldRule::optional("resource", ObjectOrArray),
            ],
        }
    }

    /// Stored IIIF 2.1 manifest.
    pub fn manifest2() -> Self {
        use FieldKind::*;
        Self {
            name: "manifest",
            fields: vec![
                FieldRule::required("@id", String),
                FieldRule::required("manifestShortId", String),
                FieldRule::required("canvasIds", StringList),
            ],
        }
    }

    /// Validate a complete document.
    pub fn validate(&self, doc: &Value) -> Result<(), Vec<SchemaViolation>> {
        self.check(doc, |_| true)
    }

    /// Validate the fields of a partial `$set` update.
    ///
    /// Only rules whose top-level field is being set are checked.
    pub fn validate_set(&self, set: &Map<String, Value>) -> Result<(), Vec<SchemaViolation>> {
        let doc = Value::Object(set.clone());
        self.check(&doc, |rule| set.contains_key(rule.top_level()))
    }

    /// Fields that may never be unset.
    pub fn check_unset(&self, unset: &[String]) -> Result<(), Vec<SchemaViolation>> {
        let violations: Vec<_> = unset
            .iter()
            .filter(|key| self.fields.iter().any(|r| r.required && r.path == key.as_str()))
            .map(|key| SchemaViolation {
                path: key.clone(),
                message: "required field cannot be removed".into(),
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn check<F>(&self, doc: &Value, applies: F) -> Result<(), Vec<SchemaViolation>>
    where
        F: Fn(&FieldRule) -> bool,
    {
        let mut violations = Vec::new();
        if !doc.is_object() {
            violations.push(SchemaViolation {
                path: String::new(),
                message: format!("{} must be a JSON object", self.name),
            });
            return Err(violations);
        }

        for rule in self.fields.iter().filter(|r| applies(r)) {
            match lookup(doc, rule.path) {
                Some(value) if !value.is_null() => {
                    if !rule.kind.accepts(value) {
                        violations.push(SchemaViolation {
                            path: rule.path.to_string(),
                            message: format!("expected {}", rule.kind.describe()),
                        });
                    }
                }
                _ if rule.required => violations.push(SchemaViolation {
                    path: rule.path.to_string(),
                    message: "missing required field".to_string(),
                }),
                _ => {}
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
