use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod currencies;
mod obligations;
mod transfers;

/// Optimistic retry budget used when the builder is not told otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

/// Re-run a whole attempt while it fails with a retryable error, up to
/// `max_retries` extra attempts.
macro_rules! with_retries {
    ($self:expr, $op:literal, $attempt:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match $attempt {
                Err(err) if err.is_retryable() => {
                    if attempt > $self.max_retries {
                        tracing::warn!(operation = $op, attempts = attempt, "retry budget exhausted");
                        break Err($crate::EngineError::RetriesExhausted(format!(
                            "{}: {err}",
                            $op
                        )));
                    }
                    tracing::debug!(operation = $op, attempt, error = %err, "retrying");
                }
                result => break result,
            }
        }
    }};
}

pub(crate) use with_retries;
pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    max_retries: u32,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    max_retries: u32,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// How many times a transfer create/delete is retried after losing an
    /// optimistic concurrency race.
    pub fn max_retries(mut self, max_retries: u32) -> EngineBuilder {
        self.max_retries = max_retries;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            max_retries: self.max_retries,
        })
    }
}
