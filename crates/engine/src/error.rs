//! The module contains the errors the engine can throw.
//!
//! Every error belongs to exactly one [`ErrorKind`], which is what callers
//! should branch on:
//!
//! - [`NotFound`]: a referenced currency, obligation or transfer is absent.
//! - [`Conflict`]: a business rule blocked the operation (for example
//!   [`AlreadySettled`]).
//! - [`Invalid`]: the request itself is malformed (amounts, codes, ids).
//! - [`Persistence`]: storage failed or the optimistic retry budget ran out.
//!
//!  [`NotFound`]: ErrorKind::NotFound
//!  [`Conflict`]: ErrorKind::Conflict
//!  [`Invalid`]: ErrorKind::Invalid
//!  [`Persistence`]: ErrorKind::Persistence
//!  [`AlreadySettled`]: EngineError::AlreadySettled
use sea_orm::{DbErr, RuntimeErr, sqlx};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Ownership mismatch: {0}")]
    OwnershipMismatch(String),
    #[error("VAT mismatch: {0}")]
    VatMismatch(String),
    #[error("Already settled: {0}")]
    AlreadySettled(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("Retries exhausted: {0}")]
    RetriesExhausted(String),
    #[error(transparent)]
    Database(DbErr),
}

/// SQLite lock contention (`SQLITE_BUSY`, `SQLITE_LOCKED` and their extended
/// codes) means another writer got there first, so it is reported as a
/// concurrent modification. Everything else stays a database error.
impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        if is_lock_contention(&err) {
            Self::ConcurrentModification(err.to_string())
        } else {
            Self::Database(err)
        }
    }
}

fn is_lock_contention(err: &DbErr) -> bool {
    let (DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
    | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
    | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))) = err
    else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(is_sqlite_busy_code)
}

/// Primary result code lives in the low byte of an extended code.
fn is_sqlite_busy_code(code: i32) -> bool {
    matches!(code & 0xff, 5 | 6)
}

/// Closed classification of [`EngineError`].
///
/// The engine never deals with transport status codes: the boundary layer
/// maps kinds to whatever its transport needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Persistence,
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyNotFound(_) => ErrorKind::NotFound,
            Self::ExistingKey(_)
            | Self::OwnershipMismatch(_)
            | Self::VatMismatch(_)
            | Self::AlreadySettled(_)
            | Self::CurrencyMismatch(_) => ErrorKind::Conflict,
            Self::InvalidAmount(_)
            | Self::InvalidCurrency(_)
            | Self::InvalidOwner(_)
            | Self::InvalidId(_) => ErrorKind::Invalid,
            Self::ConcurrentModification(_) | Self::RetriesExhausted(_) | Self::Database(_) => {
                ErrorKind::Persistence
            }
        }
    }

    /// Returns `true` if the coordinator may transparently retry the whole
    /// validate-mutate-persist attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::OwnershipMismatch(a), Self::OwnershipMismatch(b)) => a == b,
            (Self::VatMismatch(a), Self::VatMismatch(b)) => a == b,
            (Self::AlreadySettled(a), Self::AlreadySettled(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidCurrency(a), Self::InvalidCurrency(b)) => a == b,
            (Self::InvalidOwner(a), Self::InvalidOwner(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::ConcurrentModification(a), Self::ConcurrentModification(b)) => a == b,
            (Self::RetriesExhausted(a), Self::RetriesExhausted(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
