use std::collections::BTreeMap;

use serde::Deserialize;

/// One cell of a record. Most columns hold a single string; multi-select
/// columns hold a list. Anything else (numbers, attachments) is carried
/// opaquely so an unexpected column never fails a whole fetch.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Other(serde_json::Value),
}

/// A row of the opportunities table, owned by the external service and
/// never mutated by the bot.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct OpportunityRecord {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl OpportunityRecord {
    /// Single display value of a column; for multi-valued cells, the first
    /// entry.
    pub fn text(&self, column: &str) -> Option<&str> {
        match self.fields.get(column)? {
            FieldValue::Text(value) => Some(value),
            FieldValue::List(values) => values.first().map(String::as_str),
            FieldValue::Other(_) => None,
        }
    }

    /// Every value of a column, multi-valued cells flattened.
    pub fn values(&self, column: &str) -> Vec<&str> {
        match self.fields.get(column) {
            Some(FieldValue::Text(value)) => vec![value.as_str()],
            Some(FieldValue::List(values)) => values.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}
