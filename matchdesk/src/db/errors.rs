use crate::types::Operation;
use sqlx::error::DatabaseError;
use thiserror::Error;

/// Database failures that callers can act on, plus a catch-all for everything else.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Entity not found")]
    NotFound,

    /// A unique index rejected the write (usernames, `(category, value)` settings)
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
        /// The duplicated value, taken from the `Key (..)=(..)` detail when Postgres gives one
        conflicting_value: Option<String>,
    },

    #[error("Foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Enum-like text columns and non-negative money columns are guarded by CHECKs
    #[error("Check constraint violation")]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// The row exists but a data rule forbids the change: a user still referenced by leads, a
    /// lead with payments, a payment that was already decided. Role checks belong to the API
    /// layer, not here.
    #[error("{operation:?} cannot be applied to entity of type {entity_type}: {reason}")]
    ProtectedEntity {
        operation: Operation,
        reason: String,
        entity_type: String,
        entity_id: Option<String>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn conflicting_value(db_err: &(dyn DatabaseError + 'static)) -> Option<String> {
    let detail = db_err.try_downcast_ref::<sqlx::postgres::PgDatabaseError>()?.detail()?;
    parse_key_detail(detail)
}

/// `Key (category, value)=(religion, Hindu) already exists.` yields `religion, Hindu`.
fn parse_key_detail(detail: &str) -> Option<String> {
    let (_, rest) = detail.split_once(")=(")?;
    let (value, _) = rest.rsplit_once(") already exists")?;
    Some(value.to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let sqlx::Error::Database(db_err) = &err else {
            return match err {
                sqlx::Error::RowNotFound => DbError::NotFound,
                other => DbError::Other(anyhow::Error::from(other)),
            };
        };

        let constraint = owned(db_err.constraint());
        let table = owned(db_err.table());
        let message = db_err.message().to_string();

        if db_err.is_unique_violation() {
            DbError::UniqueViolation {
                conflicting_value: conflicting_value(db_err.as_ref()),
                constraint,
                table,
                message,
            }
        } else if db_err.is_foreign_key_violation() {
            DbError::ForeignKeyViolation { constraint, table, message }
        } else if db_err.is_check_violation() {
            DbError::CheckViolation { constraint, table, message }
        } else {
            DbError::Other(anyhow::Error::from(err))
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
