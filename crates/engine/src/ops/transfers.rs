//! Settlement coordinator: the only code path that moves an obligation's
//! `settled` amount.
//!
//! Every attempt runs in one database transaction: read the obligation with
//! its version, validate, apply the ledger arithmetic, then persist the
//! obligation with a compare-and-swap on the version together with the
//! transfer insert/delete. A lost race rolls the whole attempt back and
//! [`with_retries`] runs it again against fresh state.

use chrono::Utc;
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, NewTransferCmd, ResultEngine, Transfer, TransferFilter, transfers,
    validation::{check_proposal, validate_transfer},
};

use super::{
    Engine,
    obligations::{claim_obligation, find_obligation, persist_obligation},
    with_retries, with_tx,
};

impl TransferFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(owner) = &self.owner {
            condition = condition.add(transfers::Column::Owner.eq(owner.as_str()));
        }
        if let Some(obligation_id) = self.obligation_id {
            condition = condition.add(transfers::Column::ObligationId.eq(obligation_id.to_string()));
        }
        if let Some(is_booked) = self.is_booked {
            condition = condition.add(transfers::Column::IsBooked.eq(is_booked));
        }
        condition
    }
}

impl Engine {
    /// Applies a transfer to its obligation.
    ///
    /// `brutto = netto + vat` is added to the obligation's `settled`, the
    /// derived fields are recomputed and both rows are written atomically.
    pub async fn create_transfer(&self, cmd: NewTransferCmd) -> ResultEngine<Transfer> {
        check_proposal(&cmd)?;
        let transfer = with_retries!(
            self,
            "create_transfer",
            self.try_create_transfer(&cmd).await
        )?;
        tracing::info!(
            transfer_id = %transfer.id(),
            obligation_id = %transfer.obligation_id(),
            brutto = %transfer.brutto(),
            "transfer created"
        );
        Ok(transfer)
    }

    async fn try_create_transfer(&self, cmd: &NewTransferCmd) -> ResultEngine<Transfer> {
        with_tx!(self, |db_tx| {
            claim_obligation(&db_tx, cmd.obligation_id).await?;
            let found = find_obligation(&db_tx, cmd.obligation_id).await?;
            let mut obligation = validate_transfer(cmd, found.as_ref())?.clone();

            let transfer = Transfer::new(cmd, Utc::now())?;
            obligation.apply_settled_delta(transfer.brutto())?;

            persist_obligation(&db_tx, &obligation).await?;
            transfers::ActiveModel::from(&transfer)
                .insert(&db_tx)
                .await?;
            Ok(transfer)
        })
    }

    /// Retracts a transfer, subtracting its `brutto` from the obligation.
    ///
    /// Not validated: a transfer can always be removed once it exists.
    pub async fn delete_transfer(&self, transfer_id: Uuid) -> ResultEngine<()> {
        let transfer = with_retries!(
            self,
            "delete_transfer",
            self.try_delete_transfer(transfer_id).await
        )?;
        tracing::info!(
            transfer_id = %transfer.id(),
            obligation_id = %transfer.obligation_id(),
            brutto = %transfer.brutto(),
            "transfer deleted"
        );
        Ok(())
    }

    async fn try_delete_transfer(&self, transfer_id: Uuid) -> ResultEngine<Transfer> {
        with_tx!(self, |db_tx| {
            claim_transfer(&db_tx, transfer_id).await?;
            let transfer = find_transfer(&db_tx, transfer_id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transfer not exists".to_string()))?;
            let mut obligation = find_obligation(&db_tx, transfer.obligation_id())
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("obligation not exists".to_string()))?;

            obligation.apply_settled_delta(-transfer.brutto())?;

            persist_obligation(&db_tx, &obligation).await?;
            transfers::Entity::delete_by_id(transfer_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(transfer)
        })
    }

    /// Returns a transfer by id.
    ///
    /// With `owner` set, transfers of other owners are reported as missing.
    pub async fn transfer(&self, id: Uuid, owner: Option<&str>) -> ResultEngine<Transfer> {
        let transfer = find_transfer(&self.database, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transfer not exists".to_string()))?;
        if owner.is_some_and(|owner| owner != transfer.owner()) {
            return Err(EngineError::KeyNotFound("transfer not exists".to_string()));
        }
        Ok(transfer)
    }

    /// Lists transfers matching `filter`, most recent first.
    pub async fn list_transfers(&self, filter: &TransferFilter) -> ResultEngine<Vec<Transfer>> {
        transfers::Entity::find()
            .filter(filter.condition())
            .order_by_desc(transfers::Column::SentAt)
            .order_by_asc(transfers::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transfer::try_from)
            .collect()
    }

    /// Sets the "booked" acknowledgement flag. Balances are not touched.
    pub async fn set_transfer_booked(&self, id: Uuid, booked: bool) -> ResultEngine<Transfer> {
        let transfer = with_tx!(self, |db_tx| {
            let model = transfers::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("transfer not exists".to_string()))?;
            let mut active: transfers::ActiveModel = model.into();
            active.is_booked = ActiveValue::Set(booked);
            let model = active.update(&db_tx).await?;
            Transfer::try_from(model)
        })?;
        tracing::info!(transfer_id = %id, booked, "transfer booking updated");
        Ok(transfer)
    }
}

/// Same as [`claim_obligation`], for the delete path where only the transfer
/// id is known up front.
async fn claim_transfer(db_tx: &DatabaseTransaction, id: Uuid) -> ResultEngine<()> {
    transfers::Entity::update_many()
        .col_expr(
            transfers::Column::IsBooked,
            Expr::col(transfers::Column::IsBooked).into(),
        )
        .filter(transfers::Column::Id.eq(id.to_string()))
        .exec(db_tx)
        .await?;
    Ok(())
}

async fn find_transfer<C>(db: &C, id: Uuid) -> ResultEngine<Option<Transfer>>
where
    C: ConnectionTrait,
{
    transfers::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(Transfer::try_from)
        .transpose()
}
