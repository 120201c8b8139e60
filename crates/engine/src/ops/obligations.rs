use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, NewObligationCmd, Obligation, ObligationFilter, ResultEngine, obligations,
    transfers,
};

use super::{Engine, currencies::require_currency, with_tx};

impl ObligationFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(owner) = &self.owner {
            condition = condition.add(obligations::Column::Owner.eq(owner.as_str()));
        }
        if let Some(currency) = &self.currency {
            condition = condition.add(obligations::Column::Currency.eq(currency.code()));
        }
        if let Some(is_settled) = self.is_settled {
            condition = condition.add(obligations::Column::IsSettled.eq(is_settled));
        }
        condition
    }
}

impl Engine {
    /// Creates an open obligation in a registered currency.
    pub async fn create_obligation(&self, cmd: NewObligationCmd) -> ResultEngine<Obligation> {
        let obligation = Obligation::new(
            cmd.currency,
            cmd.total_amount,
            cmd.requires_vat,
            &cmd.owner,
        )?;
        with_tx!(self, |db_tx| {
            require_currency(&db_tx, obligation.currency()).await?;
            obligations::ActiveModel::from(&obligation)
                .insert(&db_tx)
                .await?;
            Ok(())
        })?;
        tracing::info!(
            obligation_id = %obligation.id(),
            owner = obligation.owner(),
            total = %obligation.total_amount(),
            currency = %obligation.currency(),
            "obligation created"
        );
        Ok(obligation)
    }

    /// Returns an obligation by id.
    ///
    /// With `owner` set, obligations of other owners are reported as missing.
    pub async fn obligation(&self, id: Uuid, owner: Option<&str>) -> ResultEngine<Obligation> {
        let obligation = find_obligation(&self.database, id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("obligation not exists".to_string()))?;
        if owner.is_some_and(|owner| owner != obligation.owner()) {
            return Err(EngineError::KeyNotFound(
                "obligation not exists".to_string(),
            ));
        }
        Ok(obligation)
    }

    /// Lists obligations matching `filter`.
    pub async fn list_obligations(
        &self,
        filter: &ObligationFilter,
    ) -> ResultEngine<Vec<Obligation>> {
        obligations::Entity::find()
            .filter(filter.condition())
            .order_by_asc(obligations::Column::Owner)
            .order_by_asc(obligations::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Obligation::try_from)
            .collect()
    }

    /// Deletes an obligation together with its transfers.
    pub async fn delete_obligation(&self, id: Uuid) -> ResultEngine<()> {
        let transfers_deleted = with_tx!(self, |db_tx| {
            let transfers_deleted = transfers::Entity::delete_many()
                .filter(transfers::Column::ObligationId.eq(id.to_string()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            let result = obligations::Entity::delete_by_id(id.to_string())
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound(
                    "obligation not exists".to_string(),
                ));
            }
            Ok(transfers_deleted)
        })?;
        tracing::info!(obligation_id = %id, transfers_deleted, "obligation deleted");
        Ok(())
    }
}

pub(super) async fn find_obligation<C>(db: &C, id: Uuid) -> ResultEngine<Option<Obligation>>
where
    C: ConnectionTrait,
{
    obligations::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(Obligation::try_from)
        .transpose()
}

/// No-op write on the obligation row, issued before anything is read.
///
/// On SQLite the first write of a transaction takes the database write lock,
/// waiting out other writers through the busy timeout. Claiming it up front
/// keeps a reader from later failing to upgrade its lock mid-attempt.
pub(super) async fn claim_obligation(db_tx: &DatabaseTransaction, id: Uuid) -> ResultEngine<()> {
    obligations::Entity::update_many()
        .col_expr(
            obligations::Column::Version,
            Expr::col(obligations::Column::Version).into(),
        )
        .filter(obligations::Column::Id.eq(id.to_string()))
        .exec(db_tx)
        .await?;
    Ok(())
}

/// Writes the balance columns of `obligation` if nobody changed the row since
/// it was read, bumping its version.
pub(super) async fn persist_obligation(
    db_tx: &DatabaseTransaction,
    obligation: &Obligation,
) -> ResultEngine<()> {
    let result = obligations::Entity::update_many()
        .col_expr(
            obligations::Column::SettledMinor,
            Expr::value(obligation.settled().minor()),
        )
        .col_expr(
            obligations::Column::ToSettleMinor,
            Expr::value(obligation.to_settle().minor()),
        )
        .col_expr(
            obligations::Column::IsSettled,
            Expr::value(obligation.is_settled()),
        )
        .col_expr(
            obligations::Column::Version,
            Expr::value(obligation.version() + 1),
        )
        .filter(obligations::Column::Id.eq(obligation.id().to_string()))
        .filter(obligations::Column::Version.eq(obligation.version()))
        .exec(db_tx)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::ConcurrentModification(format!(
            "obligation {} changed since version {}",
            obligation.id(),
            obligation.version()
        )));
    }
    Ok(())
}
