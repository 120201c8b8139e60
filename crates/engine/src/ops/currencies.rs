use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{Currency, EngineError, ResultEngine, currency, obligations, transfers};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a new currency code.
    pub async fn create_currency(&self, code: &str) -> ResultEngine<Currency> {
        let currency = Currency::new(code)?;
        with_tx!(self, |db_tx| {
            if currency::Entity::find_by_id(currency.code())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(currency.code().to_string()));
            }
            currency::ActiveModel {
                code: ActiveValue::Set(currency.code().to_string()),
            }
            .insert(&db_tx)
            .await?;
            Ok(())
        })?;
        tracing::info!(currency = %currency, "currency created");
        Ok(currency)
    }

    /// Returns a registered currency.
    pub async fn currency(&self, code: &str) -> ResultEngine<Currency> {
        let currency = Currency::new(code)?;
        let model = currency::Entity::find_by_id(currency.code())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("currency not exists".to_string()))?;
        Currency::try_from(model)
    }

    /// Lists every registered currency, sorted by code.
    pub async fn list_currencies(&self) -> ResultEngine<Vec<Currency>> {
        currency::Entity::find()
            .order_by_asc(currency::Column::Code)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Currency::try_from)
            .collect()
    }

    /// Renames a currency, re-pointing every obligation and transfer.
    ///
    /// Touched obligations get their version bumped, so a coordinator attempt
    /// that read them before the rename retries against the new code.
    pub async fn rename_currency(&self, old: &str, new: &str) -> ResultEngine<Currency> {
        let old = Currency::new(old)?;
        let new = Currency::new(new)?;
        if old == new {
            return Ok(new);
        }
        with_tx!(self, |db_tx| {
            require_currency(&db_tx, &old).await?;
            if currency::Entity::find_by_id(new.code())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(new.code().to_string()));
            }
            currency::ActiveModel {
                code: ActiveValue::Set(new.code().to_string()),
            }
            .insert(&db_tx)
            .await?;

            obligations::Entity::update_many()
                .col_expr(obligations::Column::Currency, Expr::value(new.code()))
                .col_expr(
                    obligations::Column::Version,
                    Expr::col(obligations::Column::Version).add(1),
                )
                .filter(obligations::Column::Currency.eq(old.code()))
                .exec(&db_tx)
                .await?;
            transfers::Entity::update_many()
                .col_expr(transfers::Column::Currency, Expr::value(new.code()))
                .filter(transfers::Column::Currency.eq(old.code()))
                .exec(&db_tx)
                .await?;
            currency::Entity::delete_by_id(old.code())
                .exec(&db_tx)
                .await?;
            Ok(())
        })?;
        tracing::info!(from = %old, to = %new, "currency renamed");
        Ok(new)
    }

    /// Deletes a currency together with its obligations and transfers.
    pub async fn delete_currency(&self, code: &str) -> ResultEngine<()> {
        let currency = Currency::new(code)?;
        let (obligations_deleted, transfers_deleted) = with_tx!(self, |db_tx| {
            require_currency(&db_tx, &currency).await?;
            let transfers_deleted = transfers::Entity::delete_many()
                .filter(transfers::Column::Currency.eq(currency.code()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            let obligations_deleted = obligations::Entity::delete_many()
                .filter(obligations::Column::Currency.eq(currency.code()))
                .exec(&db_tx)
                .await?
                .rows_affected;
            currency::Entity::delete_by_id(currency.code())
                .exec(&db_tx)
                .await?;
            Ok((obligations_deleted, transfers_deleted))
        })?;
        tracing::info!(
            currency = %currency,
            obligations_deleted,
            transfers_deleted,
            "currency deleted"
        );
        Ok(())
    }
}

pub(super) async fn require_currency<C>(db: &C, currency: &Currency) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    currency::Entity::find_by_id(currency.code())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("currency not exists".to_string()))?;
    Ok(())
}
