//! Document and query types shared by all store backends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field values of a document.
pub type DocumentData = Map<String, Value>;

/// A stored document: an ID plus arbitrary JSON fields.
///
/// System attributes (`$createdAt`, `$permissions`, ...) are dropped when a
/// document is read; only `$id` is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(flatten)]
    pub data: DocumentData,
}

impl Document {
    /// Build a document from its raw JSON object.
    pub fn from_object(mut object: DocumentData) -> Option<Self> {
        let id = match object.remove("$id") {
            Some(Value::String(id)) => id,
            _ => return None,
        };
        object.retain(|key, _| !key.starts_with('$'));
        Some(Self { id, data: object })
    }

    /// Read a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    /// Read an integer field.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.data.get(field).and_then(Value::as_i64)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let object = DocumentData::deserialize(deserializer)?;
        Document::from_object(object)
            .ok_or_else(|| serde::de::Error::missing_field("$id"))
    }
}

/// Result of a list call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentList {
    /// Total matching documents (may exceed `documents.len()` when limited).
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// A query primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Attribute equals any of the values.
    Equal { attribute: String, values: Vec<Value> },
    /// Sort by attribute, highest first.
    OrderDesc { attribute: String },
    /// Return at most this many documents.
    Limit(usize),
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Self::Equal {
            attribute: attribute.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn order_desc(attribute: &str) -> Self {
        Self::OrderDesc {
            attribute: attribute.to_string(),
        }
    }

    pub fn limit(n: usize) -> Self {
        Self::Limit(n)
    }

    /// Encode in Appwrite's JSON query syntax.
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Equal { attribute, values } => serde_json::json!({
                "method": "equal",
                "attribute": attribute,
                "values": values,
            }),
            Self::OrderDesc { attribute } => serde_json::json!({
                "method": "orderDesc",
                "attribute": attribute,
            }),
            Self::Limit(n) => serde_json::json!({
                "method": "limit",
                "values": [n],
            }),
        };
        value.to_string()
    }

    /// Check a document against an `Equal` query. Other queries always match.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::Equal { attribute, values } => document
                .data
                .get(attribute)
                .is_some_and(|v| values.contains(v)),
            _ => true,
        }
    }
}

/// Apply queries to documents held in default order. Used by in-process backends.
pub fn apply_queries(documents: Vec<Document>, queries: &[Query]) -> DocumentList {
    let mut matched: Vec<Document> = documents
        .into_iter()
        .filter(|d| queries.iter().all(|q| q.matches(d)))
        .collect();
    let total = matched.len() as u64;

    for query in queries {
        if let Query::OrderDesc { attribute } = query {
            // Stable sort keeps default order between equal values
            matched.sort_by(|a, b| compare_values(b.data.get(attribute), a.data.get(attribute)));
        }
    }

    if let Some(limit) = queries.iter().rev().find_map(|q| match q {
        Query::Limit(n) => Some(*n),
        _ => None,
    }) {
        matched.truncate(limit);
    }

    DocumentList {
        total,
        documents: matched,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
