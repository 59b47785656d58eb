//! Error types for the vending controller.

use thiserror::Error;

use crate::Cents;
use crate::model::{ButtonId, Channel, Index};

/// Top-level error returned by [`Controller::apply`](super::Controller::apply).
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("credit ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Registry(#[from] RegistryError),
}

impl ControllerError {
    /// The controller and the hardware disagree about which buttons exist.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ControllerError::Registry(RegistryError::UnknownButton(_)))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient credit: have {credit}, requested {requested}")]
    InsufficientCredit { credit: Cents, requested: Cents },
}

/// A hardware reference the registry cannot resolve.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown channel {0}")]
    UnknownChannel(Channel),

    #[error("unknown button pressed: {0}")]
    UnknownButton(ButtonId),
}

/// The hardware reported a layout the controller cannot run on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "selection table mismatch: {buttons} buttons, {racks} product racks, {products} products"
    )]
    SelectionMismatch {
        buttons: usize,
        racks: usize,
        products: usize,
    },

    #[error("coin racks {first} and {second} both hold {value} coins")]
    DuplicateDenomination {
        value: Cents,
        first: Index,
        second: Index,
    },

    #[error("coin rack {0} holds zero-valued coins")]
    ZeroDenomination(Index),
}
