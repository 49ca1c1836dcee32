//! Logical schema snapshots.
//!
//! A [`Schema`] is an opaque value from the worker's point of view: the core
//! never mutates one, it only hands pairs of them (before/after) to the step
//! mapper. Equality is structural, which is what the worker relies on when it
//! advances `active_schema` after a successful deployment.

use serde::{Deserialize, Serialize};

/// A logical database schema snapshot.
///
/// Models are kept in declaration order. Two schemas are equal iff they
/// declare the same models with the same fields in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub models: Vec<Model>,
}

impl Schema {
    /// The schema of a freshly bootstrapped project: no models.
    pub fn empty() -> Self {
        Self { models: Vec::new() }
    }

    /// Look up a model by name.
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// One model (table) in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One field (column) of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

/// Logical field types and their Postgres column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Int,
    BigInt,
    Float,
    Boolean,
    DateTime,
    Json,
    Uuid,
}

impl FieldType {
    /// The Postgres column type used when materializing this field.
    pub fn column_type(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Int => "INTEGER",
            FieldType::BigInt => "BIGINT",
            FieldType::Float => "DOUBLE PRECISION",
            FieldType::Boolean => "BOOLEAN",
            FieldType::DateTime => "TIMESTAMPTZ",
            FieldType::Json => "JSONB",
            FieldType::Uuid => "UUID",
        }
    }
}
