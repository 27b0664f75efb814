//! Column metadata and key order.
//!
//! A [`Schema`] keeps its fields in declaration order and derives a *key
//! order*: the sequence of visible (non-hidden) field names renderers use for
//! column headers. Field names are never taken from an unordered map, so the
//! key order is stable across calls.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::Value;

/// Informational type tag for a field. Not enforced on record values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Any,
    String,
    Integer,
    Float,
    Bool,
    Timestamp,
    List,
}

impl FieldType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
            Self::List => "list",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render-time value formatter.
pub type Formatter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Describes one column.
#[derive(Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Hidden fields stay addressable by name but are left out of the key order.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(skip)]
    formatter: Option<Formatter>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Any,
            hidden: false,
            formatter: None,
        }
    }

    #[must_use]
    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn has_formatter(&self) -> bool {
        self.formatter.is_some()
    }

    /// Apply the formatter, or return the value unchanged when none is set.
    pub fn format(&self, value: &Value) -> Value {
        match &self.formatter {
            Some(formatter) => formatter(value),
            None => value.clone(),
        }
    }

    /// Display string for a value in this column.
    pub fn display(&self, value: &Value) -> String {
        self.format(value).to_string()
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("hidden", &self.hidden)
            .field("formatter", &self.formatter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        let same_formatter = match (&self.formatter, &other.formatter) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.name == other.name
            && self.field_type == other.field_type
            && self.hidden == other.hidden
            && same_formatter
    }
}

/// Ordered field metadata plus the derived visible key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaRepr", into = "SchemaRepr")]
pub struct Schema {
    fields: Vec<Field>,
    key_order: Vec<String>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct SchemaRepr {
    fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_order: Option<Vec<String>>,
}

impl TryFrom<SchemaRepr> for Schema {
    type Error = ModelError;

    fn try_from(repr: SchemaRepr) -> Result<Self> {
        let mut schema = Self::from_fields(repr.fields)?;
        if let Some(order) = repr.key_order {
            schema.set_key_order(order)?;
        }
        Ok(schema)
    }
}

impl From<Schema> for SchemaRepr {
    fn from(schema: Schema) -> Self {
        let derived: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| !f.hidden)
            .map(|f| f.name.as_str())
            .collect();
        let key_order = (derived != schema.key_order).then(|| schema.key_order.clone());
        Self {
            fields: schema.fields,
            key_order,
        }
    }
}

impl Schema {
    /// Build a schema from fields. Key order is the visible field names in
    /// declaration order.
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Result<Self> {
        let mut schema = Self::default();
        for field in fields {
            schema.push_field(field)?;
        }
        Ok(schema)
    }

    /// One visible, untyped field per key, in the given order.
    pub fn from_keys<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_fields(keys.into_iter().map(Field::new))
    }

    fn push_field(&mut self, field: Field) -> Result<usize> {
        if field.name.trim().is_empty() {
            return Err(ModelError::EmptyFieldName);
        }
        if self.index.contains_key(&field.name) {
            return Err(ModelError::DuplicateField(field.name));
        }
        let idx = self.fields.len();
        self.index.insert(field.name.clone(), idx);
        if !field.hidden {
            self.key_order.push(field.name.clone());
        }
        self.fields.push(field);
        Ok(idx)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn visible_field_count(&self) -> usize {
        self.fields.iter().filter(|f| !f.hidden).count()
    }

    /// Visible field names in display order. Empty, never absent, for a
    /// schema without visible fields.
    pub fn key_order(&self) -> &[String] {
        &self.key_order
    }

    /// Look up a field by name. Hidden fields are found too.
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&idx| &self.fields[idx])
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Replace the key order with an explicit permutation of the visible fields.
    pub fn set_key_order<I, S>(&mut self, order: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = order.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(order.len());
        for name in &order {
            let Some(field) = self.find_field(name) else {
                return Err(ModelError::UnknownField(name.clone()));
            };
            if field.hidden {
                return Err(ModelError::HiddenField(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ModelError::DuplicateField(name.clone()));
            }
        }
        let expected = self.visible_field_count();
        if order.len() != expected {
            return Err(ModelError::KeyOrderMismatch {
                expected,
                actual: order.len(),
            });
        }
        self.key_order = order;
        Ok(())
    }

    /// Append a field. When `position` is given and the field is visible, the
    /// name is inserted into the key order at that index, clamped to the end.
    pub fn insert_field(&mut self, field: Field, position: Option<usize>) -> Result<()> {
        let visible = !field.hidden;
        let name = field.name.clone();
        self.push_field(field)?;
        if visible && let Some(position) = position {
            self.key_order.pop();
            let at = position.min(self.key_order.len());
            self.key_order.insert(at, name);
        }
        Ok(())
    }

    /// Move an existing visible field to `position` in the key order (clamped).
    pub fn move_key(&mut self, name: &str, position: usize) -> Result<()> {
        let Some(current) = self.key_order.iter().position(|k| k == name) else {
            return match self.find_field(name) {
                Some(_) => Err(ModelError::HiddenField(name.to_string())),
                None => Err(ModelError::UnknownField(name.to_string())),
            };
        };
        let key = self.key_order.remove(current);
        let at = position.min(self.key_order.len());
        self.key_order.insert(at, key);
        Ok(())
    }
}
