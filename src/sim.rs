//! In-memory vending machine implementing [`Hardware`].
//!
//! Operator commands and controller commands both mutate the simulated
//! devices and queue the resulting [`HardwareEvent`]s. Nothing is delivered to
//! the controller from inside a command; the caller drains the queue and feeds
//! it back, so the controller never sees a re-entrant callback.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::blinker::DisplaySink;
use crate::controller::{Controller, ControllerError};
use crate::hardware::{Hardware, HardwareError};
use crate::log::EventLog;
use crate::model::{
    ButtonId, Channel, CoinRackEvent, HardwareEvent, Index, Product, ProductRackEvent,
    ReceptacleEvent, Subsystem,
};
use crate::Cents;

pub const CANADIAN_COINS: [u32; 5] = [5, 10, 25, 100, 200];
pub const CONFIG_PANEL_BUTTONS: usize = 37;
const COIN_RACK_CAPACITY: u32 = 25;
const PRODUCT_RACK_CAPACITY: u32 = 10;
const RECEPTACLE_CAPACITY: u32 = 200;

/// Operator actions on the simulated machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    InsertCoin(Cents),
    Press(ButtonId),
    LoadCoins { rack: Index, count: u32 },
    UnloadCoins(Index),
    LoadProducts { rack: Index, count: u32 },
    Enable(Channel),
    Disable(Channel),
    EmptyReceptacle,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("{0} does not exist")]
    NoSuchChannel(Channel),
    #[error("{channel}: {source}")]
    Hardware {
        channel: Channel,
        source: HardwareError,
    },
}

#[derive(Debug, Default)]
struct DisplayState {
    text: String,
    history: Vec<String>,
}

/// Shared handle on the simulated display.
#[derive(Debug, Clone, Default)]
pub struct SimDisplay(Arc<Mutex<DisplayState>>);

impl SimDisplay {
    fn lock(&self) -> MutexGuard<'_, DisplayState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }
}

impl DisplaySink for SimDisplay {
    fn show(&self, text: &str) {
        let mut state = self.lock();
        state.text = text.to_string();
        state.history.push(text.to_string());
    }
}

#[derive(Debug, Clone)]
struct SimCoinRack {
    value: Cents,
    capacity: u32,
    coins: u32,
    enabled: bool,
}

#[derive(Debug, Clone)]
struct SimProductRack {
    product: Product,
    capacity: u32,
    count: u32,
    enabled: bool,
}

/// A simulated machine with coin racks, product racks, buttons and a receptacle.
#[derive(Debug)]
pub struct SimMachine {
    coin_racks: Vec<SimCoinRack>,
    product_racks: Vec<SimProductRack>,
    buttons: Vec<bool>,
    coin_slot_enabled: bool,
    receptacle: Vec<Cents>,
    receptacle_enabled: bool,
    coin_return: Option<Vec<Cents>>,
    delivered: Vec<String>,
    display: SimDisplay,
    exact_change_light: bool,
    out_of_order_light: bool,
    safety: bool,
    events: VecDeque<HardwareEvent>,
}

impl SimMachine {
    /// A powered-off machine: every channel starts disabled and every rack empty.
    pub fn new(coin_kinds: &[u32], products: Vec<Product>) -> Self {
        Self {
            coin_racks: coin_kinds
                .iter()
                .map(|&value| SimCoinRack {
                    value: Cents::new(value),
                    capacity: COIN_RACK_CAPACITY,
                    coins: 0,
                    enabled: false,
                })
                .collect(),
            buttons: vec![false; products.len()],
            product_racks: products
                .into_iter()
                .map(|product| SimProductRack {
                    product,
                    capacity: PRODUCT_RACK_CAPACITY,
                    count: 0,
                    enabled: false,
                })
                .collect(),
            coin_slot_enabled: false,
            receptacle: Vec::new(),
            receptacle_enabled: false,
            coin_return: Some(Vec::new()),
            delivered: Vec::new(),
            display: SimDisplay::default(),
            exact_change_light: false,
            out_of_order_light: false,
            safety: false,
            events: VecDeque::new(),
        }
    }

    /// Canadian coins and five products.
    pub fn standard() -> Self {
        Self::new(
            &CANADIAN_COINS,
            vec![
                Product::new("Cola", Cents::new(250)),
                Product::new("Root Beer", Cents::new(250)),
                Product::new("Water", Cents::new(150)),
                Product::new("Iced Tea", Cents::new(225)),
                Product::new("Ginger Ale", Cents::new(200)),
            ],
        )
    }

    /// Same machine without a coin return chute.
    pub fn without_coin_return(mut self) -> Self {
        self.coin_return = None;
        self
    }

    /// Enable every device, queueing the readiness events.
    pub fn power_on(&mut self) {
        self.coin_slot_enabled = true;
        self.receptacle_enabled = true;
        self.events
            .push_back(HardwareEvent::Enabled(Channel::Other(Subsystem::CoinSlot)));
        self.events
            .push_back(HardwareEvent::Enabled(Channel::Other(Subsystem::CoinReceptacle)));
        for rack in 0..self.coin_racks.len() {
            self.coin_racks[rack].enabled = true;
            self.events
                .push_back(HardwareEvent::Enabled(Channel::CoinRack(rack)));
        }
        for index in 0..self.buttons.len() {
            self.buttons[index] = true;
            self.product_racks[index].enabled = true;
            self.events
                .push_back(HardwareEvent::Enabled(Channel::SelectionButton(index)));
            self.events
                .push_back(HardwareEvent::Enabled(Channel::ProductRack(index)));
        }
    }

    /// Run one operator command.
    pub fn execute(&mut self, command: &SimCommand) -> Result<(), SimError> {
        match *command {
            SimCommand::InsertCoin(value) => {
                self.insert_coin(value);
                Ok(())
            }
            SimCommand::Press(button) => {
                self.press(button);
                Ok(())
            }
            SimCommand::LoadCoins { rack, count } => self.load_coins(rack, count),
            SimCommand::UnloadCoins(rack) => self.unload_coins(rack).map(|_| ()),
            SimCommand::LoadProducts { rack, count } => self.load_products(rack, count),
            SimCommand::Enable(channel) => self.set_enabled(channel, true),
            SimCommand::Disable(channel) => self.set_enabled(channel, false),
            SimCommand::EmptyReceptacle => {
                self.empty_receptacle();
                Ok(())
            }
        }
    }

    pub fn insert_coin(&mut self, value: Cents) {
        let valid = self.coin_racks.iter().any(|rack| rack.value == value);
        let room = (self.receptacle.len() as u32) < RECEPTACLE_CAPACITY;
        if !valid || !room || !self.coin_slot_enabled || !self.receptacle_enabled || self.safety {
            self.events.push_back(HardwareEvent::CoinRejected(value));
            return;
        }

        self.receptacle.push(value);
        self.events.push_back(HardwareEvent::CoinAccepted(value));
        self.events
            .push_back(HardwareEvent::Receptacle(ReceptacleEvent::CoinAdded(value)));
        if self.receptacle.len() as u32 == RECEPTACLE_CAPACITY {
            self.events
                .push_back(HardwareEvent::Receptacle(ReceptacleEvent::Full));
        }
    }

    /// Presses on disabled buttons are swallowed by the button itself.
    pub fn press(&mut self, button: ButtonId) {
        if let ButtonId::Selection(index) = button {
            if !self.buttons.get(index).copied().unwrap_or(true) {
                return;
            }
        }
        self.events.push_back(HardwareEvent::ButtonPressed(button));
    }

    pub fn load_coins(&mut self, rack: Index, count: u32) -> Result<(), SimError> {
        let channel = Channel::CoinRack(rack);
        let slot = self
            .coin_racks
            .get_mut(rack)
            .ok_or(SimError::NoSuchChannel(channel))?;
        if slot.coins + count > slot.capacity {
            return Err(SimError::Hardware {
                channel,
                source: HardwareError::CapacityExceeded,
            });
        }
        slot.coins += count;
        let full = slot.coins == slot.capacity;
        let coins = vec![slot.value; count as usize];
        self.events.push_back(HardwareEvent::CoinRack {
            rack,
            event: CoinRackEvent::Loaded(coins),
        });
        if full {
            self.events.push_back(HardwareEvent::CoinRack {
                rack,
                event: CoinRackEvent::Full,
            });
        }
        Ok(())
    }

    pub fn unload_coins(&mut self, rack: Index) -> Result<Vec<Cents>, SimError> {
        let slot = self
            .coin_racks
            .get_mut(rack)
            .ok_or(SimError::NoSuchChannel(Channel::CoinRack(rack)))?;
        let coins = vec![slot.value; slot.coins as usize];
        slot.coins = 0;
        self.events.push_back(HardwareEvent::CoinRack {
            rack,
            event: CoinRackEvent::Unloaded(coins.clone()),
        });
        Ok(coins)
    }

    pub fn load_products(&mut self, rack: Index, count: u32) -> Result<(), SimError> {
        let channel = Channel::ProductRack(rack);
        let slot = self
            .product_racks
            .get_mut(rack)
            .ok_or(SimError::NoSuchChannel(channel))?;
        if slot.count + count > slot.capacity {
            return Err(SimError::Hardware {
                channel,
                source: HardwareError::CapacityExceeded,
            });
        }
        slot.count += count;
        let full = slot.count == slot.capacity;
        self.events.push_back(HardwareEvent::ProductRack {
            rack,
            event: ProductRackEvent::Loaded(count),
        });
        if full {
            self.events.push_back(HardwareEvent::ProductRack {
                rack,
                event: ProductRackEvent::Full,
            });
        }
        Ok(())
    }

    pub fn empty_receptacle(&mut self) {
        self.receptacle.clear();
        self.events
            .push_back(HardwareEvent::Receptacle(ReceptacleEvent::CoinsRemoved));
    }

    /// Toggle a device and queue the matching event.
    pub fn set_enabled(&mut self, channel: Channel, on: bool) -> Result<(), SimError> {
        let missing = SimError::NoSuchChannel(channel);
        match channel {
            Channel::CoinRack(i) => self.coin_racks.get_mut(i).ok_or(missing)?.enabled = on,
            Channel::ProductRack(i) => self.product_racks.get_mut(i).ok_or(missing)?.enabled = on,
            Channel::SelectionButton(i) => *self.buttons.get_mut(i).ok_or(missing)? = on,
            Channel::Other(Subsystem::CoinSlot) => self.coin_slot_enabled = on,
            Channel::Other(Subsystem::CoinReceptacle) => self.receptacle_enabled = on,
            Channel::Other(_) => {}
        }
        self.events.push_back(if on {
            HardwareEvent::Enabled(channel)
        } else {
            HardwareEvent::Disabled(channel)
        });
        Ok(())
    }

    /// Queue a raw event, as a misbehaving device would.
    pub fn inject(&mut self, event: HardwareEvent) {
        self.events.push_back(event);
    }

    pub fn take_events(&mut self) -> Vec<HardwareEvent> {
        self.events.drain(..).collect()
    }

    pub fn display_handle(&self) -> SimDisplay {
        self.display.clone()
    }

    pub fn display_text(&self) -> String {
        self.display.text()
    }

    /// Coins dropped into the coin return so far.
    pub fn coin_return(&self) -> &[Cents] {
        self.coin_return.as_deref().unwrap_or_default()
    }

    /// Names of delivered products, in order.
    pub fn delivered(&self) -> &[String] {
        &self.delivered
    }

    pub fn products_in_rack(&self, rack: Index) -> u32 {
        self.product_racks.get(rack).map_or(0, |slot| slot.count)
    }

    pub fn exact_change_light(&self) -> bool {
        self.exact_change_light
    }

    pub fn out_of_order_light(&self) -> bool {
        self.out_of_order_light
    }

    pub fn safety(&self) -> bool {
        self.safety
    }

    fn selection_channels(&self) -> Vec<Channel> {
        let mut channels = Vec::new();
        for index in 0..self.buttons.len() {
            if self.buttons[index] {
                channels.push(Channel::SelectionButton(index));
            }
            if self.product_racks[index].enabled {
                channels.push(Channel::ProductRack(index));
            }
        }
        channels
    }
}

impl Hardware for SimMachine {
    fn coin_rack_count(&self) -> usize {
        self.coin_racks.len()
    }

    fn coin_kind(&self, rack: Index) -> Cents {
        self.coin_racks.get(rack).map_or(Cents::ZERO, |slot| slot.value)
    }

    fn coin_rack_capacity(&self, rack: Index) -> u32 {
        self.coin_racks.get(rack).map_or(0, |slot| slot.capacity)
    }

    fn coins_in_rack(&self, rack: Index) -> u32 {
        self.coin_racks.get(rack).map_or(0, |slot| slot.coins)
    }

    fn release_coin(&mut self, rack: Index) -> Result<(), HardwareError> {
        let slot = self.coin_racks.get_mut(rack).ok_or(HardwareError::Disabled)?;
        if !slot.enabled {
            return Err(HardwareError::Disabled);
        }
        if slot.coins == 0 {
            return Err(HardwareError::Empty);
        }
        let chute = self
            .coin_return
            .as_mut()
            .ok_or(HardwareError::CapacityExceeded)?;
        slot.coins -= 1;
        chute.push(slot.value);
        self.events.push_back(HardwareEvent::CoinRack {
            rack,
            event: CoinRackEvent::CoinRemoved(slot.value),
        });
        Ok(())
    }

    fn has_coin_return(&self) -> bool {
        self.coin_return.is_some()
    }

    fn selection_button_count(&self) -> usize {
        self.buttons.len()
    }

    fn product_rack_count(&self) -> usize {
        self.product_racks.len()
    }

    fn config_button_count(&self) -> usize {
        CONFIG_PANEL_BUTTONS
    }

    fn products(&self) -> Vec<Product> {
        self.product_racks
            .iter()
            .map(|slot| slot.product.clone())
            .collect()
    }

    fn dispense_product(&mut self, rack: Index) -> Result<(), HardwareError> {
        let slot = self
            .product_racks
            .get_mut(rack)
            .ok_or(HardwareError::Disabled)?;
        if !slot.enabled || self.safety {
            return Err(HardwareError::Disabled);
        }
        if slot.count == 0 {
            return Err(HardwareError::Empty);
        }
        slot.count -= 1;
        self.delivered.push(slot.product.name.clone());
        self.events.push_back(HardwareEvent::ProductRack {
            rack,
            event: ProductRackEvent::Removed,
        });
        Ok(())
    }

    fn display(&mut self, text: &str) {
        self.display.show(text);
    }

    fn set_exact_change_light(&mut self, on: bool) {
        self.exact_change_light = on;
    }

    fn set_out_of_order_light(&mut self, on: bool) {
        self.out_of_order_light = on;
    }

    /// The interlock shuts the coin slot and every selection. The resulting
    /// events are queued, never delivered from here.
    fn set_safety(&mut self, on: bool) {
        if on == self.safety {
            return;
        }
        self.safety = on;
        let mut channels = Vec::new();
        if self.coin_slot_enabled {
            channels.push(Channel::Other(Subsystem::CoinSlot));
        }
        channels.extend(self.selection_channels());
        for channel in channels {
            self.events.push_back(if on {
                HardwareEvent::Disabled(channel)
            } else {
                HardwareEvent::Enabled(channel)
            });
        }
    }
}

/// Deliver queued simulator events to `controller` until none are left.
/// Returns the errors the controller reported along the way.
pub fn pump<L: EventLog>(controller: &mut Controller<SimMachine, L>) -> Vec<ControllerError> {
    let mut errors = Vec::new();
    loop {
        let events = controller.hardware_mut().take_events();
        if events.is_empty() {
            return errors;
        }
        for event in events {
            if let Err(e) = controller.apply(event) {
                errors.push(e);
            }
        }
    }
}

/// Async variant of [`pump`] that goes through [`Controller::run`].
pub async fn settle<L: EventLog>(controller: &mut Controller<SimMachine, L>) {
    loop {
        let events = controller.hardware_mut().take_events();
        if events.is_empty() {
            return;
        }
        controller.run(tokio_stream::iter(events)).await;
    }
}
