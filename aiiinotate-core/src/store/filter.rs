use serde_json::{Map, Value};

use super::{StoreError, StoreResult};

/// Query predicate over dotted field paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(path.into(), value.into())
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(path.into(), value.into())
    }

    /// AND-combine, dropping `All` clauses and flattening single clauses.
    pub fn and(clauses: Vec<Filter>) -> Self {
        let mut clauses: Vec<Filter> = clauses.into_iter().filter(|c| *c != Filter::All).collect();
        match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Eq(path, expected) => field_equals(doc, path, expected),
            Self::Ne(path, expected) => !field_equals(doc, path, expected),
            Self::In(path, values) => values.iter().any(|v| field_equals(doc, path, v)),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

fn field_equals(doc: &Value, path: &str, expected: &Value) -> bool {
    let mut candidates = Vec::new();
    collect_values(doc, &path.split('.').collect::<Vec<_>>(), &mut candidates);
    candidates.into_iter().any(|v| v == expected)
}

/// Every value reachable at `path`, descending into arrays on the way.
/// A terminal array contributes itself and each of its elements.
fn collect_values<'a>(value: &'a Value, path: &[&str], out: &mut Vec<&'a Value>) {
    match (value, path.split_first()) {
        (Value::Array(items), Some(_)) => {
            for item in items {
                collect_values(item, path, out);
            }
        }
        (Value::Object(map), Some((head, rest))) => {
            if let Some(child) = map.get(*head) {
                collect_values(child, rest, out);
            }
        }
        (_, Some(_)) => {}
        (Value::Array(items), None) => {
            out.push(value);
            out.extend(items.iter());
        }
        (_, None) => out.push(value),
    }
}

/// Plain object navigation along a dotted path.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, key| value.get(key))
}

/// Field selection applied to read results.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    #[default]
    All,
    /// Keep only these paths (and `@id`).
    Include(Vec<String>),
    /// Drop these paths.
    Exclude(Vec<String>),
}

impl Projection {
    /// Build from `(path, included)` pairs. Inclusion and exclusion cannot be mixed.
    pub fn from_flags(flags: &[(&str, bool)]) -> StoreResult<Self> {
        let included: Vec<String> = flags.iter().filter(|(_, inc)| *inc).map(|(p, _)| p.to_string()).collect();
        let excluded: Vec<String> = flags.iter().filter(|(_, inc)| !*inc).map(|(p, _)| p.to_string()).collect();
        match (included.is_empty(), excluded.is_empty()) {
            (true, true) => Ok(Self::All),
            (false, true) => Ok(Self::Include(included)),
            (true, false) => Ok(Self::Exclude(excluded)),
            (false, false) => Err(StoreError::InvalidQuery(format!(
                "cannot mix inclusion and exclusion in a projection (include: {included:?}, exclude: {excluded:?})"
            ))),
        }
    }

    pub fn apply(&self, doc: Value) -> Value {
        match self {
            Self::All => doc,
            Self::Exclude(paths) => {
                let mut doc = doc;
                for path in paths {
                    remove_path(&mut doc, &path.split('.').collect::<Vec<_>>());
                }
                doc
            }
            Self::Include(paths) => {
                let mut out = Map::new();
                if let Some(id) = doc.get("@id") {
                    out.insert("@id".to_string(), id.clone());
                }
                for path in paths {
                    include_path(&doc, &mut out, &path.split('.').collect::<Vec<_>>());
                }
                Value::Object(out)
            }
        }
    }
}

fn remove_path(value: &mut Value, path: &[&str]) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(|item| remove_path(item, path)),
        Value::Object(map) => match path {
            [last] => {
                map.remove(*last);
            }
            [head, rest @ ..] => {
                if let Some(child) = map.get_mut(*head) {
                    remove_path(child, rest);
                }
            }
            [] => {}
        },
        _ => {}
    }
}

// Arrays met on the way are copied whole.
fn include_path(src: &Value, dst: &mut Map<String, Value>, path: &[&str]) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let Some(child) = src.get(*head) else {
        return;
    };
    if rest.is_empty() || !child.is_object() {
        dst.insert(head.to_string(), child.clone());
        return;
    }
    let entry = dst
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(nested) = entry {
        include_path(child, nested, rest);
    }
}
