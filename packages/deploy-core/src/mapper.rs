//! Step-to-mutation mapping.
//!
//! The mapper is a pure function from `(before schema, after schema, step)`
//! to zero or one [`ClientSqlMutaction`]. Zero is a legal and common answer:
//! some steps are metadata-only and have no database effect. Whenever a
//! forward payload exists, the mapper is expected to produce its rollback
//! counterpart too; the applier treats a missing one as a programming error.

use crate::migration::MigrationStep;
use crate::schema::{Field, Model, Schema};

/// A DB-runnable payload: an ordered list of SQL statements that the client
/// database executes as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatements(pub Vec<String>);

impl SqlStatements {
    pub fn one(statement: impl Into<String>) -> Self {
        Self(vec![statement.into()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A concrete database mutation produced by mapping one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSqlMutaction {
    statements: SqlStatements,
    rollback_statements: Option<SqlStatements>,
}

impl ClientSqlMutaction {
    pub fn new(statements: SqlStatements, rollback_statements: Option<SqlStatements>) -> Self {
        Self {
            statements,
            rollback_statements,
        }
    }

    /// The forward payload.
    pub fn execute(&self) -> &SqlStatements {
        &self.statements
    }

    /// The reverse payload, when one exists.
    pub fn rollback(&self) -> Option<&SqlStatements> {
        self.rollback_statements.as_ref()
    }
}

/// Translates a logical step plus before/after schemas into a mutation.
///
/// Implementations are pure: no I/O, no state.
pub trait MigrationStepMapper: Send + Sync + 'static {
    fn mutaction_for(
        &self,
        prev: &Schema,
        next: &Schema,
        step: &MigrationStep,
    ) -> Option<ClientSqlMutaction>;
}

// =============================================================================
// Postgres mapper
// =============================================================================

/// Step mapper emitting Postgres DDL.
///
/// Tables are created empty and grown column by column, so a `CreateModel`
/// plus its `CreateField` steps compose cleanly within one migration.
/// Rollback payloads restore structure, not data.
#[derive(Debug, Default, Clone)]
pub struct PostgresStepMapper;

impl PostgresStepMapper {
    pub fn new() -> Self {
        Self
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_def(field: &Field) -> String {
    let nullability = if field.required { "NOT NULL" } else { "NULL" };
    format!(
        "{} {} {}",
        quote_ident(&field.name),
        field.field_type.column_type(),
        nullability
    )
}

fn create_table(model: &Model) -> String {
    let columns: Vec<String> = model.fields.iter().map(column_def).collect();
    format!("CREATE TABLE {} ({})", quote_ident(&model.name), columns.join(", "))
}

fn drop_table(model: &str) -> String {
    format!("DROP TABLE {}", quote_ident(model))
}

fn add_column(model: &str, field: &Field) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(model),
        column_def(field)
    )
}

fn drop_column(model: &str, field: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(model),
        quote_ident(field)
    )
}

impl MigrationStepMapper for PostgresStepMapper {
    fn mutaction_for(
        &self,
        prev: &Schema,
        _next: &Schema,
        step: &MigrationStep,
    ) -> Option<ClientSqlMutaction> {
        match step {
            MigrationStep::CreateModel { model } => Some(ClientSqlMutaction::new(
                SqlStatements::one(format!("CREATE TABLE {} ()", quote_ident(model))),
                Some(SqlStatements::one(drop_table(model))),
            )),

            MigrationStep::DeleteModel { model } => {
                // Without the old definition there is nothing to drop or
                // restore; the step is metadata-only.
                let old = prev.model(model)?;
                Some(ClientSqlMutaction::new(
                    SqlStatements::one(drop_table(model)),
                    Some(SqlStatements::one(create_table(old))),
                ))
            }

            MigrationStep::CreateField { model, field } => Some(ClientSqlMutaction::new(
                SqlStatements::one(add_column(model, field)),
                Some(SqlStatements::one(drop_column(model, &field.name))),
            )),

            MigrationStep::DeleteField { model, field } => {
                // A field unknown to the previous schema is metadata-only.
                let old_field = prev.model(model)?.field(field)?;
                Some(ClientSqlMutaction::new(
                    SqlStatements::one(drop_column(model, field)),
                    Some(SqlStatements::one(add_column(model, old_field))),
                ))
            }
        }
    }
}
