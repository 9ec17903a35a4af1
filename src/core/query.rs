use crate::utils::error::{Result, StorageError};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A caller-supplied query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    /// Query-string syntax, passed through verbatim. Empty matches all.
    Raw(String),
    /// Conjunction of per-field clauses.
    Fields(BTreeMap<String, TermValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Str(String),
    Int(i64),
    Float(f64),
    /// Field value is one of the listed values.
    OneOf(Vec<Value>),
    /// Backend query fragment handed over as-is.
    Nested(Map<String, Value>),
}

impl Keyword {
    pub fn fields() -> FieldsBuilder {
        FieldsBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct FieldsBuilder {
    fields: BTreeMap<String, TermValue>,
}

impl FieldsBuilder {
    pub fn term(mut self, field: impl Into<String>, value: impl Into<TermValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn one_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.fields.insert(field.into(), TermValue::OneOf(values));
        self
    }

    pub fn nested(mut self, field: impl Into<String>, fragment: Map<String, Value>) -> Self {
        self.fields.insert(field.into(), TermValue::Nested(fragment));
        self
    }

    pub fn build(self) -> Keyword {
        Keyword::Fields(self.fields)
    }
}

impl From<&str> for Keyword {
    fn from(query: &str) -> Self {
        Keyword::Raw(query.to_string())
    }
}

impl From<String> for Keyword {
    fn from(query: String) -> Self {
        Keyword::Raw(query)
    }
}

impl From<BTreeMap<String, TermValue>> for Keyword {
    fn from(fields: BTreeMap<String, TermValue>) -> Self {
        Keyword::Fields(fields)
    }
}

impl From<&str> for TermValue {
    fn from(v: &str) -> Self {
        TermValue::Str(v.to_string())
    }
}

impl From<String> for TermValue {
    fn from(v: String) -> Self {
        TermValue::Str(v)
    }
}

impl From<i64> for TermValue {
    fn from(v: i64) -> Self {
        TermValue::Int(v)
    }
}

impl From<i32> for TermValue {
    fn from(v: i32) -> Self {
        TermValue::Int(v.into())
    }
}

impl From<f64> for TermValue {
    fn from(v: f64) -> Self {
        TermValue::Float(v)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl TryFrom<Value> for TermValue {
    type Error = StorageError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(TermValue::Str(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(TermValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(TermValue::Float(f))
                } else {
                    Err(StorageError::bad_request(format!(
                        "unsupported keyword value: {}",
                        n
                    )))
                }
            }
            Value::Array(values) => Ok(TermValue::OneOf(values)),
            Value::Object(map) => Ok(TermValue::Nested(map)),
            other => Err(StorageError::bad_request(format!(
                "unknown keyword value type: {}",
                json_type_name(&other)
            ))),
        }
    }
}

/// 接受鬆散型別的關鍵字 (字串或欄位對應)
impl TryFrom<Value> for Keyword {
    type Error = StorageError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Keyword::Raw(s)),
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (field, v) in map {
                    fields.insert(field, TermValue::try_from(v)?);
                }
                Ok(Keyword::Fields(fields))
            }
            other => Err(StorageError::bad_request(format!(
                "unknown keyword argument: {}",
                json_type_name(&other)
            ))),
        }
    }
}

fn clause(field: &str, value: &TermValue) -> Value {
    match value {
        TermValue::Str(s) => json!({ "term": { field: s } }),
        TermValue::Int(i) => json!({ "term": { field: i } }),
        TermValue::Float(f) => json!({ "term": { field: f } }),
        TermValue::OneOf(values) => json!({ "terms": { field: values } }),
        TermValue::Nested(fragment) => Value::Object(fragment.clone()),
    }
}

/// Translates a keyword into a search-engine query. `None` means no
/// restriction.
pub fn translate(keyword: &Keyword) -> Option<Value> {
    match keyword {
        Keyword::Raw(query) if query.is_empty() => None,
        Keyword::Raw(query) => Some(json!({ "query_string": { "query": query } })),
        Keyword::Fields(fields) => {
            let must: Vec<Value> = fields
                .iter()
                .map(|(field, value)| clause(field, value))
                .collect();
            Some(json!({ "bool": { "must": must } }))
        }
    }
}
