use serde::{Deserialize, Serialize};

/// A JSON value that may arrive either as a single item or as an array.
///
/// Open Annotation payloads use both shapes interchangeably for bodies and
/// motivations; this is resolved once at deserialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Self::One(item) => std::slice::from_ref(item).iter(),
            Self::Many(items) => items.iter(),
        }
    }

    /// Keep only matching items, preserving the shape. `None` when nothing is left.
    pub fn retain<F>(self, mut keep: F) -> Option<Self>
    where
        F: FnMut(&T) -> bool,
    {
        match self {
            Self::One(item) => keep(&item).then_some(Self::One(item)),
            Self::Many(mut items) => {
                items.retain(|item| keep(item));
                (!items.is_empty()).then_some(Self::Many(items))
            }
        }
    }

    pub fn try_map<U, E, F>(self, mut f: F) -> Result<OneOrMany<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(match self {
            Self::One(item) => OneOrMany::One(f(item)?),
            Self::Many(items) => {
                OneOrMany::Many(items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?)
            }
        })
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(item: T) -> Self {
        Self::One(item)
    }
}
