//! PostgreSQL-backed repository implementations

mod blog;
mod doctor;
mod meeting;
mod payment;
mod protocol;
mod schedule;
mod treatment;

use crate::{Error, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;

/// PostgreSQL-backed store implementing every repository trait.
#[derive(Clone)]
pub struct PostgresStore {
    pub(crate) pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

/// Decode a TEXT column into one of the model enums.
pub(crate) fn text_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e| Error::Internal(format!("Invalid value in column '{column}': {e}")))
}

/// Same as [`text_column`] for nullable columns.
pub(crate) fn optional_text_column<T>(row: &PgRow, column: &str) -> Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        value
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid value in column '{column}': {e}")))
    })
    .transpose()
}

/// Map a unique-constraint violation to a conflict.
pub(crate) fn map_unique_violation(err: sqlx::Error, message: impl Into<String>) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return Error::Conflict(message.into());
        }
    }
    Error::Database(err)
}
