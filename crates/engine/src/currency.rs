//! Currency registry entries.
//!
//! Obligations and transfers reference a [`Currency`] by its code. Codes are
//! normalized on the way in (trimmed, upper-cased) so `"pln"` and `" PLN "`
//! name the same registry entry.

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::{EngineError, ResultEngine};

/// Longest code the registry accepts.
pub const MAX_CODE_LEN: usize = 15;

/// A normalized currency code, e.g. `PLN` or `USD`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Validates and normalizes a currency code.
    ///
    /// Codes are 1 to [`MAX_CODE_LEN`] ASCII alphanumeric characters.
    pub fn new(code: &str) -> ResultEngine<Self> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(EngineError::InvalidCurrency(
                "currency code must not be empty".to_string(),
            ));
        }
        if normalized.len() > MAX_CODE_LEN {
            return Err(EngineError::InvalidCurrency(format!(
                "currency code longer than {MAX_CODE_LEN} characters: {normalized}"
            )));
        }
        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(EngineError::InvalidCurrency(format!(
                "unsupported currency code: {normalized}"
            )));
        }
        Ok(Self(normalized))
    }

    /// Canonical currency code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl core::str::FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "currencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::obligations::Entity")]
    Obligations,
}

impl Related<super::obligations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Obligations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Currency {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Self::new(&model.code)
    }
}
