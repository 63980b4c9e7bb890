//! Typed records mapped to and from [`Row`]s
//!
//! Every record type lists its columns once in [`Record::FIELDS`]; both
//! directions of the mapping are driven by that list. Reading a row is
//! strict: each declared field must be present, extra columns are ignored.

use crate::{Column, DbError, DbResult, Row, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub trait Record: Sized {
    /// Declared fields, identifier included, in row order.
    const FIELDS: &'static [&'static str];

    /// Current value of a declared field.
    fn field(&self, name: &str) -> Option<Value>;

    /// Build a record from a complete set of declared fields.
    fn from_fields(fields: Fields) -> DbResult<Self>;

    fn to_row(&self) -> Row {
        Self::FIELDS
            .iter()
            .map(|&name| Column::new(name, self.field(name).unwrap_or(Value::Null)))
            .collect()
    }

    fn to_dict(&self) -> BTreeMap<String, Value> {
        self.to_row()
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect()
    }

    /// Fails with [`DbError::NotEnoughData`] naming every declared field
    /// the row does not supply. When a column repeats, the first one wins.
    fn from_row(row: &Row) -> DbResult<Self> {
        let mut values = HashMap::with_capacity(Self::FIELDS.len());
        for column in row {
            if let Some(&name) = Self::FIELDS.iter().find(|&&f| f == column.name) {
                values.entry(name).or_insert_with(|| column.value.clone());
            }
        }

        let missing: Vec<String> = Self::FIELDS
            .iter()
            .filter(|&&f| !values.contains_key(f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DbError::NotEnoughData(missing));
        }

        Self::from_fields(Fields { values })
    }
}

/// Field values collected by [`Record::from_row`].
#[derive(Debug, Default)]
pub struct Fields {
    values: HashMap<&'static str, Value>,
}

impl Fields {
    fn take(&mut self, field: &str) -> DbResult<Value> {
        self.values
            .remove(field)
            .ok_or_else(|| DbError::NotEnoughData(vec![field.to_string()]))
    }

    pub fn take_text(&mut self, field: &str) -> DbResult<String> {
        match self.take(field)? {
            Value::Text(v) => Ok(v),
            other => Err(wrong_type(field, "text", &other)),
        }
    }

    pub fn take_bool(&mut self, field: &str) -> DbResult<bool> {
        match self.take(field)? {
            Value::Bool(v) => Ok(v),
            other => Err(wrong_type(field, "bool", &other)),
        }
    }

    pub fn take_integer(&mut self, field: &str) -> DbResult<i64> {
        match self.take(field)? {
            Value::Integer(v) => Ok(v),
            other => Err(wrong_type(field, "integer", &other)),
        }
    }

    /// Like [`Fields::take_integer`], with NULL read as `None`.
    pub fn take_optional_integer(&mut self, field: &str) -> DbResult<Option<i64>> {
        match self.take(field)? {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(v)),
            other => Err(wrong_type(field, "integer", &other)),
        }
    }

    pub fn take_timestamp(&mut self, field: &str) -> DbResult<DateTime<Utc>> {
        match self.take(field)? {
            Value::Timestamp(v) => Ok(v),
            other => Err(wrong_type(field, "timestamp", &other)),
        }
    }
}

fn wrong_type(field: &str, expected: &'static str, found: &Value) -> DbError {
    DbError::WrongFieldType {
        field: field.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Application user. `id` is `None` until the row has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserModel {
    pub id: Option<i64>,
    pub username: String,
    pub password: String,
    pub email: String,
    pub active: bool,
}

impl Default for UserModel {
    fn default() -> Self {
        Self {
            id: None,
            username: String::new(),
            password: String::new(),
            email: String::new(),
            active: true,
        }
    }
}

impl UserModel {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

impl Record for UserModel {
    const FIELDS: &'static [&'static str] = &["id", "username", "password", "email", "active"];

    fn field(&self, name: &str) -> Option<Value> {
        let value: Value = match name {
            "id" => self.id.into(),
            "username" => self.username.as_str().into(),
            "password" => self.password.as_str().into(),
            "email" => self.email.as_str().into(),
            "active" => self.active.into(),
            _ => return None,
        };
        Some(value)
    }

    fn from_fields(mut fields: Fields) -> DbResult<Self> {
        Ok(Self {
            id: fields.take_optional_integer("id")?,
            username: fields.take_text("username")?,
            password: fields.take_text("password")?,
            email: fields.take_text("email")?,
            active: fields.take_bool("active")?,
        })
    }
}
