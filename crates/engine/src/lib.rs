//! Obligation settlement engine.
//!
//! Tracks obligations (money owed by a user in a currency) and the transfers
//! paying them down. [`Engine`] is the single entry point: it validates
//! proposed transfers, applies their effect on the obligation ledger and
//! persists both records atomically.

pub use commands::{Caller, NewObligationCmd, NewTransferCmd, ObligationFilter, TransferFilter};
pub use currency::Currency;
pub use error::{EngineError, ErrorKind};
pub use ledger::{Settlement, recompute, settlement};
pub use money::Money;
pub use obligations::Obligation;
pub use ops::{DEFAULT_MAX_RETRIES, Engine, EngineBuilder};
pub use transfers::Transfer;
pub use validation::{check_proposal, validate_transfer};

mod commands;
mod currency;
mod error;
mod ledger;
mod money;
mod obligations;
mod ops;
mod transfers;
mod util;
mod validation;

pub type ResultEngine<T> = Result<T, EngineError>;
