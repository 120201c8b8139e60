//! Subcommands and their dispatch onto the engine.
//!
//! This is where caller authorization happens: the engine trusts whatever
//! owner filter it is handed, so every read is scoped through
//! [`Caller::owner_scope`] and admin-only writes are refused here.

use clap::{Args, Subcommand};
use engine::{
    Caller, Currency, Engine, Money, NewObligationCmd, NewTransferCmd, ObligationFilter,
    TransferFilter,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::AdminError;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the currency registry.
    Currency(CurrencyArgs),
    /// Manage obligations.
    Obligation(ObligationArgs),
    /// Manage transfers paying obligations down.
    Transfer(TransferArgs),
}

#[derive(Args, Debug)]
pub struct CurrencyArgs {
    #[command(subcommand)]
    command: CurrencyCommand,
}

#[derive(Subcommand, Debug)]
enum CurrencyCommand {
    Add {
        code: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Delete {
        code: String,
    },
    Show {
        code: String,
    },
    List,
}

#[derive(Args, Debug)]
pub struct ObligationArgs {
    #[command(subcommand)]
    command: ObligationCommand,
}

#[derive(Subcommand, Debug)]
enum ObligationCommand {
    Create {
        #[arg(long)]
        currency: Currency,
        #[arg(long)]
        total: Money,
        #[arg(long)]
        requires_vat: bool,
        /// Owner of the obligation (defaults to the caller).
        #[arg(long)]
        owner: Option<String>,
    },
    Show {
        id: Uuid,
    },
    List {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        currency: Option<Currency>,
        #[arg(long)]
        settled: Option<bool>,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(subcommand)]
    command: TransferCommand,
}

#[derive(Subcommand, Debug)]
enum TransferCommand {
    Create {
        #[arg(long)]
        obligation: Uuid,
        #[arg(long)]
        netto: Money,
        #[arg(long)]
        vat: Money,
        #[arg(long)]
        currency: Currency,
        /// The transfer carries a VAT invoice.
        #[arg(long)]
        is_vat: bool,
    },
    Show {
        id: Uuid,
    },
    List {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        obligation: Option<Uuid>,
        #[arg(long)]
        booked: Option<bool>,
    },
    Delete {
        id: Uuid,
    },
    /// Mark a transfer as booked (or unbooked with `--undo`).
    Book {
        id: Uuid,
        #[arg(long)]
        undo: bool,
    },
}

fn require_privileged(caller: &Caller, action: &str) -> Result<(), AdminError> {
    if caller.privileged {
        Ok(())
    } else {
        Err(AdminError::Forbidden(format!(
            "{action} requires a privileged caller"
        )))
    }
}

/// Non-privileged callers only ever see their own records.
fn scoped_owner(caller: &Caller, requested: Option<String>) -> Option<String> {
    match caller.owner_scope() {
        Some(own) => Some(own.to_string()),
        None => requested,
    }
}

pub async fn run(engine: &Engine, caller: &Caller, command: Command) -> Result<Value, AdminError> {
    match command {
        Command::Currency(CurrencyArgs { command }) => currency(engine, caller, command).await,
        Command::Obligation(ObligationArgs { command }) => {
            obligation(engine, caller, command).await
        }
        Command::Transfer(TransferArgs { command }) => transfer(engine, caller, command).await,
    }
}

async fn currency(
    engine: &Engine,
    caller: &Caller,
    command: CurrencyCommand,
) -> Result<Value, AdminError> {
    let value = match command {
        CurrencyCommand::Add { code } => {
            require_privileged(caller, "adding a currency")?;
            serde_json::to_value(engine.create_currency(&code).await?)?
        }
        CurrencyCommand::Rename { from, to } => {
            serde_json::to_value(engine.rename_currency(&from, &to).await?)?
        }
        CurrencyCommand::Delete { code } => {
            require_privileged(caller, "deleting a currency")?;
            engine.delete_currency(&code).await?;
            json!({ "deleted": code.trim().to_ascii_uppercase() })
        }
        CurrencyCommand::Show { code } => serde_json::to_value(engine.currency(&code).await?)?,
        CurrencyCommand::List => serde_json::to_value(engine.list_currencies().await?)?,
    };
    Ok(value)
}

async fn obligation(
    engine: &Engine,
    caller: &Caller,
    command: ObligationCommand,
) -> Result<Value, AdminError> {
    let value = match command {
        ObligationCommand::Create {
            currency,
            total,
            requires_vat,
            owner,
        } => {
            require_privileged(caller, "creating an obligation")?;
            let owner = owner.unwrap_or_else(|| caller.user_id.clone());
            let cmd = NewObligationCmd::new(currency, total, owner).requires_vat(requires_vat);
            serde_json::to_value(engine.create_obligation(cmd).await?)?
        }
        ObligationCommand::Show { id } => {
            serde_json::to_value(engine.obligation(id, caller.owner_scope()).await?)?
        }
        ObligationCommand::List {
            owner,
            currency,
            settled,
        } => {
            let filter = ObligationFilter {
                owner: scoped_owner(caller, owner),
                currency,
                is_settled: settled,
            };
            serde_json::to_value(engine.list_obligations(&filter).await?)?
        }
        ObligationCommand::Delete { id } => {
            require_privileged(caller, "deleting an obligation")?;
            engine.delete_obligation(id).await?;
            json!({ "deleted": id })
        }
    };
    Ok(value)
}

async fn transfer(
    engine: &Engine,
    caller: &Caller,
    command: TransferCommand,
) -> Result<Value, AdminError> {
    let value = match command {
        TransferCommand::Create {
            obligation,
            netto,
            vat,
            currency,
            is_vat,
        } => {
            let cmd = NewTransferCmd::new(obligation, caller.user_id.as_str(), netto, vat, currency)
                .is_vat(is_vat);
            serde_json::to_value(engine.create_transfer(cmd).await?)?
        }
        TransferCommand::Show { id } => {
            serde_json::to_value(engine.transfer(id, caller.owner_scope()).await?)?
        }
        TransferCommand::List {
            owner,
            obligation,
            booked,
        } => {
            let filter = TransferFilter {
                owner: scoped_owner(caller, owner),
                obligation_id: obligation,
                is_booked: booked,
            };
            serde_json::to_value(engine.list_transfers(&filter).await?)?
        }
        TransferCommand::Delete { id } => {
            // Existence check under the caller's scope hides foreign transfers.
            engine.transfer(id, caller.owner_scope()).await?;
            engine.delete_transfer(id).await?;
            json!({ "deleted": id })
        }
        TransferCommand::Book { id, undo } => {
            require_privileged(caller, "booking a transfer")?;
            serde_json::to_value(engine.set_transfer_booked(id, !undo).await?)?
        }
    };
    Ok(value)
}
