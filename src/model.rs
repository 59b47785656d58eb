//! Core domain types for the vending controller.

use std::fmt;

use crate::Cents;

/// Position of a channel within its kind (coin rack 0, product rack 3, ...).
pub type Index = usize;

/// Machine-wide subsystems that cannot be toggled individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    CoinSlot,
    CoinReceptacle,
    CoinReturn,
    Display,
    ConfigurationPanel,
}

/// One addressable piece of hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    CoinRack(Index),
    ProductRack(Index),
    SelectionButton(Index),
    /// Anything whose failure affects the whole machine.
    Other(Subsystem),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::CoinRack(i) => write!(f, "coin rack #{i}"),
            Channel::ProductRack(i) => write!(f, "product rack #{i}"),
            Channel::SelectionButton(i) => write!(f, "selection button #{i}"),
            Channel::Other(s) => write!(f, "{s:?}"),
        }
    }
}

/// Every push button the machine can report a press for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Selection(Index),
    Config(Index),
    ConfigEnter,
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonId::Selection(i) => write!(f, "selection button #{i}"),
            ButtonId::Config(i) => write!(f, "configuration button #{i}"),
            ButtonId::ConfigEnter => write!(f, "configuration enter button"),
        }
    }
}

/// Notifications from a coin rack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinRackEvent {
    CoinAdded(Cents),
    CoinRemoved(Cents),
    Full,
    Loaded(Vec<Cents>),
    Unloaded(Vec<Cents>),
}

/// Notifications from the coin receptacle (coins held before sorting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceptacleEvent {
    CoinAdded(Cents),
    CoinsRemoved,
    Full,
    Loaded(Vec<Cents>),
    Unloaded(Vec<Cents>),
}

/// Notifications from a product rack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRackEvent {
    Added,
    Removed,
    Full,
    Loaded(u32),
    Unloaded(u32),
}

/// An input of the controller, as reported by the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEvent {
    /// The coin slot accepted a valid coin.
    CoinAccepted(Cents),
    /// The coin slot rejected a coin; the customer gets it back.
    CoinRejected(Cents),
    ButtonPressed(ButtonId),
    Enabled(Channel),
    Disabled(Channel),
    CoinRack { rack: Index, event: CoinRackEvent },
    ProductRack { rack: Index, event: ProductRackEvent },
    Receptacle(ReceptacleEvent),
}

/// A product kind offered behind a selection button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    pub price: Cents,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Cents) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

/// Machine-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineMode {
    #[default]
    Operational,
    /// A non channel-specific subsystem failed; no new purchases.
    Fault,
}

/// What the controller publishes to observers such as the idle blinker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineStatus {
    pub credit: Cents,
    pub mode: MachineMode,
}

impl MachineStatus {
    /// Nobody is buying and the machine can sell.
    pub fn is_idle(&self) -> bool {
        self.credit.is_zero() && self.mode == MachineMode::Operational
    }
}

/// Where the controller is within a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurchasePhase {
    #[default]
    Idle,
    Dispensing,
    ReturningChange,
}
