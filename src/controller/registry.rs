//! Channel registry: which channels exist and which are usable.

use crate::Cents;
use crate::hardware::Hardware;
use crate::model::{ButtonId, Channel, Index, MachineMode, Product};

use super::error::{ConfigError, RegistryError};

/// A coin rack as known to the registry. Its inventory stays on the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinRackSlot {
    pub value: Cents,
    pub capacity: u32,
    pub enabled: bool,
}

/// One selection index: button, product rack and product share it.
#[derive(Debug, Clone)]
struct SelectionSlot {
    product: Product,
    button_enabled: bool,
    rack_enabled: bool,
}

/// What the controller must do after a registry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    /// Nothing beyond the flag change.
    None,
    /// Coin rack availability changed; exact change must be rechecked.
    CoinRacks,
    /// A machine-wide subsystem failed while operational.
    EnterFault,
    /// A machine-wide subsystem came back. `recovered` is set when this left Fault.
    ClearFault { recovered: bool },
}

/// Fixed table of channels, built once from the hardware layout.
#[derive(Debug)]
pub struct ChannelRegistry {
    coin_racks: Vec<CoinRackSlot>,
    selections: Vec<SelectionSlot>,
    config_buttons: usize,
    mode: MachineMode,
}

impl ChannelRegistry {
    /// Build the registry from the hardware layout. Every channel starts disabled.
    pub fn from_hardware(hardware: &impl Hardware) -> Result<Self, ConfigError> {
        let coin_racks = (0..hardware.coin_rack_count())
            .map(|rack| (hardware.coin_kind(rack), hardware.coin_rack_capacity(rack)))
            .collect();
        Self::new(
            coin_racks,
            hardware.selection_button_count(),
            hardware.product_rack_count(),
            hardware.products(),
            hardware.config_button_count(),
        )
    }

    pub fn new(
        coin_racks: Vec<(Cents, u32)>,
        buttons: usize,
        product_racks: usize,
        products: Vec<Product>,
        config_buttons: usize,
    ) -> Result<Self, ConfigError> {
        if buttons != product_racks || buttons != products.len() {
            return Err(ConfigError::SelectionMismatch {
                buttons,
                racks: product_racks,
                products: products.len(),
            });
        }

        for (rack, (value, _)) in coin_racks.iter().enumerate() {
            if value.is_zero() {
                return Err(ConfigError::ZeroDenomination(rack));
            }
            if let Some(first) = coin_racks[..rack].iter().position(|(v, _)| v == value) {
                return Err(ConfigError::DuplicateDenomination {
                    value: *value,
                    first,
                    second: rack,
                });
            }
        }

        Ok(Self {
            coin_racks: coin_racks
                .into_iter()
                .map(|(value, capacity)| CoinRackSlot {
                    value,
                    capacity,
                    enabled: false,
                })
                .collect(),
            selections: products
                .into_iter()
                .map(|product| SelectionSlot {
                    product,
                    button_enabled: false,
                    rack_enabled: false,
                })
                .collect(),
            config_buttons,
            mode: MachineMode::Operational,
        })
    }

    pub fn mode(&self) -> MachineMode {
        self.mode
    }

    /// Denominations of all coin racks.
    pub fn denominations(&self) -> Vec<Cents> {
        self.coin_racks.iter().map(|slot| slot.value).collect()
    }

    pub fn coin_rack(&self, rack: Index) -> Option<&CoinRackSlot> {
        self.coin_racks.get(rack)
    }

    pub fn coin_rack_count(&self) -> usize {
        self.coin_racks.len()
    }

    /// The rack holding coins of `value`.
    pub fn rack_for(&self, value: Cents) -> Option<Index> {
        self.coin_racks.iter().position(|slot| slot.value == value)
    }

    pub fn selection_count(&self) -> usize {
        self.selections.len()
    }

    pub fn product(&self, index: Index) -> Option<&Product> {
        self.selections.get(index).map(|slot| &slot.product)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> + '_ {
        self.selections.iter().map(|slot| &slot.product)
    }

    /// Whether the button/product rack pair at `index` may be offered: both
    /// halves enabled and the machine operational.
    pub fn is_circuit_enabled(&self, index: Index) -> bool {
        self.mode == MachineMode::Operational
            && self
                .selections
                .get(index)
                .is_some_and(|slot| slot.button_enabled && slot.rack_enabled)
    }

    pub fn is_rack_enabled(&self, index: Index) -> bool {
        self.selections
            .get(index)
            .is_some_and(|slot| slot.rack_enabled)
    }

    pub fn is_button_enabled(&self, index: Index) -> bool {
        self.selections
            .get(index)
            .is_some_and(|slot| slot.button_enabled)
    }

    /// Check that a pressed button exists on this machine.
    pub fn resolve_button(&self, button: ButtonId) -> Result<ButtonId, RegistryError> {
        let known = match button {
            ButtonId::Selection(i) => i < self.selections.len(),
            ButtonId::Config(i) => i < self.config_buttons,
            ButtonId::ConfigEnter => true,
        };
        if known {
            Ok(button)
        } else {
            Err(RegistryError::UnknownButton(button))
        }
    }

    /// Check that a channel exists on this machine.
    pub fn resolve(&self, channel: Channel) -> Result<Channel, RegistryError> {
        let known = match channel {
            Channel::CoinRack(i) => i < self.coin_racks.len(),
            Channel::ProductRack(i) | Channel::SelectionButton(i) => i < self.selections.len(),
            Channel::Other(_) => true,
        };
        if known {
            Ok(channel)
        } else {
            Err(RegistryError::UnknownChannel(channel))
        }
    }

    pub fn enable(&mut self, channel: Channel) -> Result<Cascade, RegistryError> {
        match self.resolve(channel)? {
            Channel::CoinRack(i) => {
                self.coin_racks[i].enabled = true;
                Ok(Cascade::CoinRacks)
            }
            // the circuit opens only once the paired half is up too
            Channel::ProductRack(i) => {
                self.selections[i].rack_enabled = true;
                Ok(Cascade::None)
            }
            Channel::SelectionButton(i) => {
                self.selections[i].button_enabled = true;
                Ok(Cascade::None)
            }
            Channel::Other(_) => {
                let recovered = self.mode == MachineMode::Fault;
                self.mode = MachineMode::Operational;
                Ok(Cascade::ClearFault { recovered })
            }
        }
    }

    pub fn disable(&mut self, channel: Channel) -> Result<Cascade, RegistryError> {
        match self.resolve(channel)? {
            Channel::CoinRack(i) => {
                self.coin_racks[i].enabled = false;
                Ok(Cascade::CoinRacks)
            }
            Channel::ProductRack(i) => {
                self.selections[i].rack_enabled = false;
                Ok(Cascade::None)
            }
            Channel::SelectionButton(i) => {
                self.selections[i].button_enabled = false;
                Ok(Cascade::None)
            }
            Channel::Other(_) => match self.mode {
                MachineMode::Operational => Ok(Cascade::EnterFault),
                MachineMode::Fault => Ok(Cascade::None),
            },
        }
    }

    /// Enter the machine-wide fault mode. Returns false if already there.
    pub fn enter_fault(&mut self) -> bool {
        let entered = self.mode == MachineMode::Operational;
        self.mode = MachineMode::Fault;
        entered
    }
}
