use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw value of a field. Indexed `Text` values are analyzed into terms;
/// indexed `Int` values become range-filterable (e.g. epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Int(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Text(s.to_string()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Text(s) }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self { FieldValue::Int(v) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    /// Retrievable verbatim after indexing.
    pub stored: bool,
    /// Searchable: analyzed into postings for text, range column for ints.
    pub indexed: bool,
}

/// An ordered set of fields handed to the index builder. The document id is
/// assigned by the builder, not carried here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self { Self::default() }

    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>, stored: bool, indexed: bool) -> &mut Self {
        self.fields.push(Field { name: name.into(), value: value.into(), stored, indexed });
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>, stored: bool, indexed: bool) -> Self {
        self.add_field(name, value, stored, indexed);
        self
    }

    pub fn fields(&self) -> &[Field] { &self.fields }

    /// First value of `name`, regardless of flags.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Documents without any indexed field are legal but never match a query.
    pub fn is_searchable(&self) -> bool { self.fields.iter().any(|f| f.indexed) }

    pub fn into_fields(self) -> Vec<Field> { self.fields }
}
