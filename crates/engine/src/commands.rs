//! Command structs for engine operations.
//!
//! These types group parameters for write operations and list filters,
//! keeping call sites readable and avoiding long argument lists.

use uuid::Uuid;

use crate::{Currency, Money};

/// Create an obligation.
#[derive(Clone, Debug)]
pub struct NewObligationCmd {
    pub currency: Currency,
    pub total_amount: Money,
    pub requires_vat: bool,
    pub owner: String,
}

impl NewObligationCmd {
    #[must_use]
    pub fn new(currency: Currency, total_amount: Money, owner: impl Into<String>) -> Self {
        Self {
            currency,
            total_amount,
            requires_vat: false,
            owner: owner.into(),
        }
    }

    #[must_use]
    pub fn requires_vat(mut self, requires_vat: bool) -> Self {
        self.requires_vat = requires_vat;
        self
    }
}

/// Propose a transfer paying down an obligation.
///
/// `brutto` and `sent_at` are not part of the proposal: the coordinator
/// derives them when the transfer is applied.
#[derive(Clone, Debug)]
pub struct NewTransferCmd {
    pub obligation_id: Uuid,
    pub netto: Money,
    pub vat: Money,
    pub currency: Currency,
    pub is_vat: bool,
    pub owner: String,
}

impl NewTransferCmd {
    #[must_use]
    pub fn new(
        obligation_id: Uuid,
        owner: impl Into<String>,
        netto: Money,
        vat: Money,
        currency: Currency,
    ) -> Self {
        Self {
            obligation_id,
            netto,
            vat,
            currency,
            is_vat: false,
            owner: owner.into(),
        }
    }

    #[must_use]
    pub fn is_vat(mut self, is_vat: bool) -> Self {
        self.is_vat = is_vat;
        self
    }
}

/// Filters for [`crate::Engine::list_obligations`]. Empty means "everything".
#[derive(Clone, Debug, Default)]
pub struct ObligationFilter {
    pub owner: Option<String>,
    pub currency: Option<Currency>,
    pub is_settled: Option<bool>,
}

impl ObligationFilter {
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn is_settled(mut self, is_settled: bool) -> Self {
        self.is_settled = Some(is_settled);
        self
    }
}

/// Filters for [`crate::Engine::list_transfers`].
#[derive(Clone, Debug, Default)]
pub struct TransferFilter {
    pub owner: Option<String>,
    pub obligation_id: Option<Uuid>,
    pub is_booked: Option<bool>,
}

impl TransferFilter {
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn obligation_id(mut self, obligation_id: Uuid) -> Self {
        self.obligation_id = Some(obligation_id);
        self
    }

    #[must_use]
    pub fn is_booked(mut self, is_booked: bool) -> Self {
        self.is_booked = Some(is_booked);
        self
    }
}

/// Identity of whoever is calling into the engine.
///
/// A privileged caller sees every record; anyone else only their own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub privileged: bool,
}

impl Caller {
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            privileged: false,
        }
    }

    #[must_use]
    pub fn privileged(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            privileged: true,
        }
    }

    /// Owner filter to pass to read operations.
    #[must_use]
    pub fn owner_scope(&self) -> Option<&str> {
        if self.privileged {
            None
        } else {
            Some(self.user_id.as_str())
        }
    }
}
