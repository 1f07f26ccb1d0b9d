use std::collections::HashMap;
use std::fmt;

use tracing::debug;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    #[default]
    Null,
}

impl Value {
    pub fn kind(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            // Null is classified as text, same as any other non bool/number value
            Value::String(_) | Value::Null => ValueType::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

// Integral numbers are shown without a fractional part, 30 and not 30.0
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
}

impl ValueType {
    /// Value a freshly added row starts with.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Boolean => Value::Boolean(false),
            ValueType::Number => Value::Null,
            ValueType::String => Value::String(String::new()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub value_type: ValueType,
}

impl Column {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }

    /// Display label, the name with its first letter capitalized.
    pub fn header(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Ordered columns with their value types, fixed for the lifetime of a loaded table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnSchema {
    columns: Vec<Column>,
}

impl ColumnSchema {
    /// Infers the type of every column from the first row, if there is one.
    ///
    /// Without a sample row every column is treated as text.
    pub fn infer(names: &[String], first_row: Option<&HashMap<String, Value>>) -> Self {
        let columns = names
            .iter()
            .map(|name| {
                let value_type = first_row
                    .and_then(|row| row.get(name))
                    .map(Value::kind)
                    .unwrap_or_default();
                Column::new(name.clone(), value_type)
            })
            .collect::<Vec<Column>>();
        for c in columns.iter() {
            debug!("Inferred column \"{}\" as {}", c.name, c.value_type);
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn value_type(&self, name: &str) -> Option<ValueType> {
        self.index_of(name).map(|idx| self.columns[idx].value_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn default_values(&self) -> Vec<Value> {
        self.columns
            .iter()
            .map(|c| c.value_type.default_value())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn infers_types_from_first_row() {
        let row = HashMap::from([
            ("name".to_string(), Value::from("Ann")),
            ("age".to_string(), Value::from(30.0)),
            ("active".to_string(), Value::from(true)),
            ("note".to_string(), Value::Null),
        ]);
        let schema = ColumnSchema::infer(&names(&["name", "age", "active", "note"]), Some(&row));

        assert_eq!(schema.value_type("name"), Some(ValueType::String));
        assert_eq!(schema.value_type("age"), Some(ValueType::Number));
        assert_eq!(schema.value_type("active"), Some(ValueType::Boolean));
        assert_eq!(schema.value_type("note"), Some(ValueType::String));
        assert_eq!(schema.value_type("missing"), None);
    }

    #[test]
    fn empty_table_defaults_to_text() {
        let schema = ColumnSchema::infer(&names(&["a", "b"]), None);
        assert!(schema.columns().iter().all(|c| c.value_type == ValueType::String));
        assert_eq!(
            schema.default_values(),
            vec![Value::from(""), Value::from("")]
        );
    }

    #[test]
    fn defaults_per_type() {
        assert_eq!(ValueType::Boolean.default_value(), Value::Boolean(false));
        assert_eq!(ValueType::Number.default_value(), Value::Null);
        assert_eq!(ValueType::String.default_value(), Value::from(""));
    }

    #[test]
    fn header_capitalizes_first_letter() {
        assert_eq!(Column::new("name", ValueType::String).header(), "Name");
        assert_eq!(Column::new("élan", ValueType::String).header(), "Élan");
        assert_eq!(Column::new("", ValueType::String).header(), "");
    }

    #[test]
    fn number_display() {
        assert_eq!(Value::from(30.0).to_string(), "30");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(false).to_string(), "false");
    }
}
