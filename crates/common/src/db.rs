//! Shared database error mapping for Colloquy
//!
//! Repositories surface storage-level uniqueness failures as
//! [`Error::ConstraintViolation`] rather than leaking driver errors.

use crate::error::Error;

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Map a sqlx error to a [`Error::ConstraintViolation`] when it is a unique
/// constraint failure; everything else passes through as a database error.
pub fn map_constraint_violation(err: sqlx::Error, what: &str) -> Error {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return Error::ConstraintViolation(what.to_string());
        }
    }
    Error::Database(err)
}
