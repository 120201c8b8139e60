//! Obligations: money owed by a user in a given currency.
//!
//! The balance fields of an [`Obligation`] are read-only outside the crate.
//! `settled` only moves through [`Obligation::apply_settled_delta`], which the
//! settlement coordinator calls when a transfer is created or deleted, and the
//! derived fields are recomputed by [`ledger::recompute`] every time.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, ResultEngine,
    ledger::{self, Settlement},
    util::{normalize_owner, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Obligation {
    id: Uuid,
    currency: Currency,
    total_amount: Money,
    settled: Money,
    to_settle: Money,
    is_settled: bool,
    requires_vat: bool,
    owner: String,
    #[serde(skip)]
    version: i64,
}

impl Obligation {
    /// Creates an open obligation with nothing settled yet.
    pub fn new(
        currency: Currency,
        total_amount: Money,
        requires_vat: bool,
        owner: &str,
    ) -> ResultEngine<Self> {
        if !total_amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "total_amount must be > 0".to_string(),
            ));
        }
        let owner = normalize_owner(owner)?;
        Ok(ledger::recompute(Self {
            id: Uuid::new_v4(),
            currency,
            total_amount,
            settled: Money::ZERO,
            to_settle: total_amount,
            is_settled: false,
            requires_vat,
            owner,
            version: 0,
        }))
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    #[must_use]
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Cumulative amount paid toward the obligation. May exceed
    /// `total_amount` after an overpayment.
    #[must_use]
    pub fn settled(&self) -> Money {
        self.settled
    }

    /// Outstanding amount, always within `[0, total_amount]`.
    #[must_use]
    pub fn to_settle(&self) -> Money {
        self.to_settle
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.is_settled
    }

    #[must_use]
    pub fn requires_vat(&self) -> bool {
        self.requires_vat
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Optimistic concurrency token of the stored row.
    pub(crate) fn version(&self) -> i64 {
        self.version
    }

    /// Moves `settled` by `delta` and recomputes the derived fields.
    pub(crate) fn apply_settled_delta(&mut self, delta: Money) -> ResultEngine<()> {
        let settled = self.settled.checked_add(delta).ok_or_else(|| {
            EngineError::InvalidAmount(format!("settled amount overflow on obligation {}", self.id))
        })?;
        self.settled = settled;
        *self = ledger::recompute(self.clone());
        Ok(())
    }

    pub(crate) fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.to_settle = settlement.to_settle;
        self.is_settled = settlement.is_settled;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "obligations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub currency: String,
    pub total_amount_minor: i64,
    pub settled_minor: i64,
    pub to_settle_minor: i64,
    pub is_settled: bool,
    pub requires_vat: bool,
    pub owner: String,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::currency::Entity",
        from = "Column::Currency",
        to = "super::currency::Column::Code",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Currencies,
    #[sea_orm(has_many = "super::transfers::Entity")]
    Transfers,
}

impl Related<super::currency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Currencies.def()
    }
}

impl Related<super::transfers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transfers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Obligation> for ActiveModel {
    fn from(obligation: &Obligation) -> Self {
        Self {
            id: ActiveValue::Set(obligation.id.to_string()),
            currency: ActiveValue::Set(obligation.currency.code().to_string()),
            total_amount_minor: ActiveValue::Set(obligation.total_amount.minor()),
            settled_minor: ActiveValue::Set(obligation.settled.minor()),
            to_settle_minor: ActiveValue::Set(obligation.to_settle.minor()),
            is_settled: ActiveValue::Set(obligation.is_settled),
            requires_vat: ActiveValue::Set(obligation.requires_vat),
            owner: ActiveValue::Set(obligation.owner.clone()),
            version: ActiveValue::Set(obligation.version),
        }
    }
}

impl TryFrom<Model> for Obligation {
    type Error = EngineError;

    /// Stored derived columns are not trusted: they are recomputed from
    /// `total_amount` and `settled` on load.
    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(ledger::recompute(Self {
            id: parse_uuid(&model.id, "obligation")?,
            currency: Currency::new(&model.currency)?,
            total_amount: Money::new(model.total_amount_minor),
            settled: Money::new(model.settled_minor),
            to_settle: Money::new(model.to_settle_minor),
            is_settled: model.is_settled,
            requires_vat: model.requires_vat,
            owner: model.owner,
            version: model.version,
        }))
    }
}
