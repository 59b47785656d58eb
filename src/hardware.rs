//! The hardware facade the controller drives.

use thiserror::Error;

use crate::Cents;
use crate::model::{Index, Product};

/// Failure of a release or dispense command on a physical channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    #[error("channel is empty")]
    Empty,
    #[error("channel is disabled")]
    Disabled,
    #[error("channel capacity exceeded")]
    CapacityExceeded,
}

/// Queries and commands exposed by the machine.
///
/// Inventory lives on the hardware side; the controller only ever reads it
/// through these queries. Implementations must not call back into the
/// controller: notifications are delivered later as
/// [`HardwareEvent`](crate::HardwareEvent)s.
pub trait Hardware {
    fn coin_rack_count(&self) -> usize;
    /// Denomination held by a coin rack.
    fn coin_kind(&self, rack: Index) -> Cents;
    fn coin_rack_capacity(&self, rack: Index) -> u32;
    /// Coins currently held by a coin rack.
    fn coins_in_rack(&self, rack: Index) -> u32;
    /// Drop one coin from a rack into the coin return.
    fn release_coin(&mut self, rack: Index) -> Result<(), HardwareError>;
    fn has_coin_return(&self) -> bool;

    fn selection_button_count(&self) -> usize;
    fn product_rack_count(&self) -> usize;
    fn config_button_count(&self) -> usize;
    /// Product kinds, one per selection index.
    fn products(&self) -> Vec<Product>;
    fn dispense_product(&mut self, rack: Index) -> Result<(), HardwareError>;

    fn display(&mut self, text: &str);
    fn set_exact_change_light(&mut self, on: bool);
    fn set_out_of_order_light(&mut self, on: bool);
    /// Machine-wide safety interlock.
    fn set_safety(&mut self, on: bool);
}
