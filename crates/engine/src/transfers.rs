//! Transfers: payments applied against an obligation.
//!
//! A transfer is immutable once created except for the `is_booked`
//! acknowledgement flag, which never touches balances.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, NewTransferCmd, ResultEngine,
    util::{normalize_owner, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transfer {
    id: Uuid,
    obligation_id: Uuid,
    netto: Money,
    vat: Money,
    brutto: Money,
    currency: Currency,
    is_vat: bool,
    sent_at: DateTime<Utc>,
    is_booked: bool,
    owner: String,
}

impl Transfer {
    /// Builds the transfer a proposal describes, deriving `brutto`.
    pub(crate) fn new(cmd: &NewTransferCmd, sent_at: DateTime<Utc>) -> ResultEngine<Self> {
        let brutto = cmd
            .netto
            .checked_add(cmd.vat)
            .ok_or_else(|| EngineError::InvalidAmount("brutto overflow".to_string()))?;
        Ok(Self {
            id: Uuid::new_v4(),
            obligation_id: cmd.obligation_id,
            netto: cmd.netto,
            vat: cmd.vat,
            brutto,
            currency: cmd.currency.clone(),
            is_vat: cmd.is_vat,
            sent_at,
            is_booked: false,
            owner: normalize_owner(&cmd.owner)?,
        })
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn obligation_id(&self) -> Uuid {
        self.obligation_id
    }

    #[must_use]
    pub fn netto(&self) -> Money {
        self.netto
    }

    #[must_use]
    pub fn vat(&self) -> Money {
        self.vat
    }

    /// `netto + vat`: the exact amount this transfer added to the
    /// obligation's `settled`.
    #[must_use]
    pub fn brutto(&self) -> Money {
        self.brutto
    }

    #[must_use]
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    #[must_use]
    pub fn is_vat(&self) -> bool {
        self.is_vat
    }

    #[must_use]
    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    #[must_use]
    pub fn is_booked(&self) -> bool {
        self.is_booked
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub obligation_id: String,
    pub currency: String,
    pub netto_minor: i64,
    pub vat_minor: i64,
    pub brutto_minor: i64,
    pub is_vat: bool,
    pub sent_at: DateTimeUtc,
    pub is_booked: bool,
    pub owner: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::obligations::Entity",
        from = "Column::ObligationId",
        to = "super::obligations::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Obligations,
}

impl Related<super::obligations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Obligations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transfer> for ActiveModel {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: ActiveValue::Set(transfer.id.to_string()),
            obligation_id: ActiveValue::Set(transfer.obligation_id.to_string()),
            currency: ActiveValue::Set(transfer.currency.code().to_string()),
            netto_minor: ActiveValue::Set(transfer.netto.minor()),
            vat_minor: ActiveValue::Set(transfer.vat.minor()),
            brutto_minor: ActiveValue::Set(transfer.brutto.minor()),
            is_vat: ActiveValue::Set(transfer.is_vat),
            sent_at: ActiveValue::Set(transfer.sent_at),
            is_booked: ActiveValue::Set(transfer.is_booked),
            owner: ActiveValue::Set(transfer.owner.clone()),
        }
    }
}

impl TryFrom<Model> for Transfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transfer")?,
            obligation_id: parse_uuid(&model.obligation_id, "obligation")?,
            netto: Money::new(model.netto_minor),
            vat: Money::new(model.vat_minor),
            brutto: Money::new(model.brutto_minor),
            currency: Currency::new(&model.currency)?,
            is_vat: model.is_vat,
            sent_at: model.sent_at,
            is_booked: model.is_booked,
            owner: model.owner,
        })
    }
}
