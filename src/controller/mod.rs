//! Vending controller.
//!
//! The controller consumes hardware events one at a time, keeps the customer's
//! credit and the availability of every channel, and drives purchases and
//! change return through the [`Hardware`] facade.

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::Cents;
use crate::config::ControllerConfig;
use crate::hardware::{Hardware, HardwareError};
use crate::log::EventLog;
use crate::model::{
    ButtonId, Channel, CoinRackEvent, HardwareEvent, Index, MachineMode, MachineStatus,
    ProductRackEvent, PurchasePhase, ReceptacleEvent, Subsystem,
};

mod change;
pub use change::{ChangePlan, RackView, exact_change_possible, plan_change};

mod error;
pub use error::{ConfigError, ControllerError, LedgerError, RegistryError};

mod ledger;
pub use ledger::CreditLedger;

mod registry;
pub use registry::{Cascade, ChannelRegistry, CoinRackSlot};

pub const MSG_INVALID_COIN: &str = "Invalid coin!";
pub const MSG_DISPENSING: &str = "Dispensing. Enjoy!";
pub const MSG_UNAVAILABLE: &str = "Option unavailable";
pub const MSG_OUT_OF_ORDER: &str = "Out of order";
pub const MSG_NO_CHANGE: &str = "Unable to return any change";

/// Running totals of the coin receptacle. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceptacleTally {
    pub value: Cents,
    pub coins: u32,
    pub full: bool,
    pub enabled_events: u32,
    pub disabled_events: u32,
}

/// Result of pressing a selection button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Product released. `shortfall` is credit that could not be returned as change.
    Dispensed {
        selection: Index,
        change: Cents,
        shortfall: Cents,
    },
    Unavailable(Index),
    OutOfOrder(Index),
    InsufficientCredit {
        selection: Index,
        price: Cents,
        credit: Cents,
    },
    /// The product rack refused to release although every guard passed.
    DispenseFailed {
        selection: Index,
        reason: HardwareError,
    },
}

impl PurchaseOutcome {
    /// Whether the customer got a product and all of their change.
    pub fn is_complete(&self) -> bool {
        matches!(self, PurchaseOutcome::Dispensed { shortfall, .. } if shortfall.is_zero())
    }
}

/// The vending controller.
///
/// Owns the credit ledger, the channel registry and the in-flight purchase
/// state. All mutation happens through `&mut self`, one event at a time.
pub struct Controller<H, L> {
    hardware: H,
    log: L,
    config: ControllerConfig,
    ledger: CreditLedger,
    registry: ChannelRegistry,
    phase: PurchasePhase,
    exact_change_light: bool,
    out_of_order_light: bool,
    receptacle: ReceptacleTally,
    current_message: String,
    /// When to replace a rejection message with the credit.
    deferred_credit: Option<Instant>,
    status_tx: watch::Sender<MachineStatus>,
    last_outcome: Option<PurchaseOutcome>,
}

/// Public API
impl<H: Hardware, L: EventLog> Controller<H, L> {
    pub fn new(hardware: H, log: L, config: ControllerConfig) -> Result<Self, ConfigError> {
        let registry = ChannelRegistry::from_hardware(&hardware)?;
        let ledger = CreditLedger::new(registry.denominations());
        let (status_tx, _) = watch::channel(MachineStatus::default());

        let mut controller = Self {
            hardware,
            log,
            config,
            ledger,
            registry,
            phase: PurchasePhase::Idle,
            exact_change_light: false,
            out_of_order_light: false,
            receptacle: ReceptacleTally::default(),
            current_message: String::new(),
            deferred_credit: None,
            status_tx,
            last_outcome: None,
        };

        let active = !controller.exact_change_possible();
        controller.exact_change_light = active;
        controller.hardware.set_exact_change_light(active);
        controller.hardware.set_out_of_order_light(false);
        controller.show_idle_or_credit();

        info!(
            coin_racks = controller.registry.coin_rack_count(),
            selections = controller.registry.selection_count(),
            "controller ready"
        );
        Ok(controller)
    }

    /// Handle events from `stream` until it ends.
    ///
    /// A pending rejection message is replaced by the credit once its hold
    /// period expires, without blocking event handling.
    pub async fn run(&mut self, mut stream: impl Stream<Item = HardwareEvent> + Unpin) {
        loop {
            let deadline = self.deferred_credit;
            tokio::select! {
                next = stream.next() => match next {
                    Some(event) => {
                        // recoverable errors are already logged; only a diverged button table is fatal
                        if let Err(e) = self.apply(event) {
                            if e.is_fatal() {
                                error!(reason = %e, "controller and hardware disagree");
                                if cfg!(debug_assertions) {
                                    panic!("{e}");
                                }
                            }
                        }
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush_deferred();
                }
            }
        }
    }

    /// Wait out a pending rejection message, then show the credit.
    pub async fn finish(&mut self) {
        if let Some(deadline) = self.deferred_credit {
            sleep_until(deadline).await;
            self.flush_deferred();
        }
    }

    /// Apply a single hardware event on top of the current state.
    pub fn apply(&mut self, event: HardwareEvent) -> Result<(), ControllerError> {
        match event {
            HardwareEvent::CoinAccepted(value) => {
                self.accept_coin(value);
                Ok(())
            }
            HardwareEvent::CoinRejected(value) => {
                self.reject_coin(value);
                Ok(())
            }
            HardwareEvent::ButtonPressed(button) => self.press(button),
            HardwareEvent::Enabled(channel) => self.enable(channel),
            HardwareEvent::Disabled(channel) => self.disable(channel),
            HardwareEvent::CoinRack { rack, event } => self.on_coin_rack(rack, event),
            HardwareEvent::ProductRack { rack, event } => self.on_product_rack(rack, event),
            HardwareEvent::Receptacle(event) => {
                self.on_receptacle(event);
                Ok(())
            }
        }
    }

    /// Show the credit now if a rejection message is still on screen.
    pub fn flush_deferred(&mut self) {
        if self.deferred_credit.take().is_some() {
            self.show_credit();
        }
    }

    /// Fresh exact-change computation over current inventories.
    pub fn exact_change_possible(&self) -> bool {
        if !self.hardware.has_coin_return() {
            return false;
        }
        let racks = self.rack_views();
        change::exact_change_possible(
            self.credit(),
            self.registry.products().map(|product| product.price),
            &racks,
        )
    }

    /// Whether selection `index` can currently be bought (credit aside).
    pub fn is_available(&self, index: Index) -> bool {
        self.registry.mode() == MachineMode::Operational && self.registry.is_circuit_enabled(index)
    }

    pub fn credit(&self) -> Cents {
        self.ledger.current_credit()
    }

    /// Read-only view of credit and mode for observers such as the idle blinker.
    pub fn subscribe_status(&self) -> watch::Receiver<MachineStatus> {
        self.status_tx.subscribe()
    }

    pub fn mode(&self) -> MachineMode {
        self.registry.mode()
    }

    pub fn phase(&self) -> PurchasePhase {
        self.phase
    }

    pub fn exact_change_light(&self) -> bool {
        self.exact_change_light
    }

    pub fn out_of_order_light(&self) -> bool {
        self.out_of_order_light
    }

    /// Last text the controller sent to the display. While the machine is
    /// idle the blinker may be alternating it with a blank screen.
    pub fn current_message(&self) -> &str {
        &self.current_message
    }

    pub fn pending_display(&self) -> Option<Instant> {
        self.deferred_credit
    }

    pub fn receptacle(&self) -> &ReceptacleTally {
        &self.receptacle
    }

    pub fn last_outcome(&self) -> Option<&PurchaseOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn denominations(&self) -> &[Cents] {
        self.ledger.denominations()
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn event_log(&self) -> &L {
        &self.log
    }
}

/// Private API
impl<H: Hardware, L: EventLog> Controller<H, L> {
    fn show(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.deferred_credit = None;
        self.hardware.display(&text);
        self.current_message = text;
    }

    fn show_credit(&mut self) {
        self.show(format!("Current Credit: {}", self.credit()));
    }

    fn show_idle_or_credit(&mut self) {
        if self.credit().is_zero() {
            self.show(self.config.idle_message.clone());
        } else {
            self.show_credit();
        }
    }

    /// Publish the new credit and recheck exact change.
    fn credit_changed(&mut self) {
        self.publish_status();
        self.refresh_exact_change();
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(MachineStatus {
            credit: self.credit(),
            mode: self.registry.mode(),
        });
    }

    fn refresh_exact_change(&mut self) {
        let active = !self.exact_change_possible();
        if active != self.exact_change_light {
            debug!(active, credit = %self.credit(), "exact change light toggled");
            self.exact_change_light = active;
            self.hardware.set_exact_change_light(active);
        }
    }

    fn set_out_of_order_light(&mut self, on: bool) {
        if on != self.out_of_order_light {
            self.out_of_order_light = on;
            self.hardware.set_out_of_order_light(on);
        }
    }

    /// Coin racks in denomination order, as the change engine sees them.
    fn rack_views(&self) -> Vec<RackView> {
        self.ledger
            .denominations()
            .iter()
            .filter_map(|&value| {
                let rack = self.registry.rack_for(value)?;
                let slot = self.registry.coin_rack(rack)?;
                Some(RackView {
                    value,
                    count: self.hardware.coins_in_rack(rack),
                    enabled: slot.enabled,
                })
            })
            .collect()
    }

    fn configuration_fault(&mut self, err: RegistryError) -> ControllerError {
        warn!(reason = %err, "event ignored");
        self.log.record(&format!("Configuration fault: {err}"));
        err.into()
    }

    fn accept_coin(&mut self, value: Cents) {
        self.ledger.add_credit(value);
        info!(coin = %value, credit = %self.credit(), "coin accepted");
        self.credit_changed();
        self.show_credit();
    }

    fn reject_coin(&mut self, value: Cents) {
        info!(coin = %value, "coin rejected");
        self.show(MSG_INVALID_COIN);
        let hold = self.config.rejection_hold;
        if hold.is_zero() {
            self.show_credit();
        } else {
            self.deferred_credit = Some(Instant::now() + hold);
        }
    }

    fn press(&mut self, button: ButtonId) -> Result<(), ControllerError> {
        if let Err(e) = self.registry.resolve_button(button) {
            error!(%button, "button press does not match any known button");
            self.log.record(&format!("Unknown button pressed: {button}"));
            return Err(e.into());
        }

        match button {
            ButtonId::Selection(index) => {
                let result = self.purchase(index);
                self.phase = PurchasePhase::Idle;
                let outcome = result?;
                Self::log_outcome(&outcome);
                self.last_outcome = Some(outcome);
            }
            ButtonId::Config(_) | ButtonId::ConfigEnter => {
                debug!(%button, "configuration panel input ignored");
            }
        }
        Ok(())
    }

    /// Purchase flow: guards, product release, price deduction, change return.
    fn purchase(&mut self, index: Index) -> Result<PurchaseOutcome, ControllerError> {
        if self.registry.mode() == MachineMode::Fault {
            self.show(MSG_OUT_OF_ORDER);
            return Ok(PurchaseOutcome::OutOfOrder(index));
        }
        if !self.registry.is_circuit_enabled(index) {
            self.show(MSG_UNAVAILABLE);
            return Ok(PurchaseOutcome::Unavailable(index));
        }

        let product = self
            .registry
            .product(index)
            .cloned()
            .ok_or(RegistryError::UnknownButton(ButtonId::Selection(index)))?;
        let credit = self.credit();
        if product.price > credit {
            self.show(format!(
                "Price of {}: {}, Current Credit: {}",
                product.name, product.price, credit
            ));
            return Ok(PurchaseOutcome::InsufficientCredit {
                selection: index,
                price: product.price,
                credit,
            });
        }

        self.phase = PurchasePhase::Dispensing;
        if let Err(reason) = self.hardware.dispense_product(index) {
            error!(selection = index, reason = %reason, "product release failed despite passing guards");
            self.show_credit();
            return Ok(PurchaseOutcome::DispenseFailed {
                selection: index,
                reason,
            });
        }
        self.show(MSG_DISPENSING);
        self.ledger.deduct_credit(product.price)?;
        self.credit_changed();

        self.phase = PurchasePhase::ReturningChange;
        let change = self.return_change()?;
        self.phase = PurchasePhase::Idle;
        self.show_idle_or_credit();

        Ok(PurchaseOutcome::Dispensed {
            selection: index,
            change,
            shortfall: self.credit(),
        })
    }

    /// Release coins highest denomination first, one at a time, while the
    /// guards hold. Whatever cannot be paid out stays as credit.
    fn return_change(&mut self) -> Result<Cents, ControllerError> {
        let mut returned = Cents::ZERO;

        if self.hardware.has_coin_return() {
            let denominations = self.ledger.denominations().to_vec();
            for value in denominations {
                let Some(rack) = self.registry.rack_for(value) else {
                    continue;
                };
                while self.can_release(rack, value) {
                    if let Err(reason) = self.hardware.release_coin(rack) {
                        error!(rack, coin = %value, reason = %reason, "coin release failed despite passing guards");
                        break;
                    }
                    self.ledger.deduct_credit(value)?;
                    returned += value;
                }
            }
        } else {
            warn!(credit = %self.credit(), "no coin return installed");
            self.show(MSG_NO_CHANGE);
        }

        if !returned.is_zero() {
            info!(change = %returned, remaining = %self.credit(), "change returned");
        }
        self.credit_changed();
        Ok(returned)
    }

    fn can_release(&self, rack: Index, value: Cents) -> bool {
        self.registry.mode() == MachineMode::Operational
            && self.credit() >= value
            && self.registry.coin_rack(rack).is_some_and(|slot| slot.enabled)
            && self.hardware.coins_in_rack(rack) > 0
    }

    fn enable(&mut self, channel: Channel) -> Result<(), ControllerError> {
        let cascade = self
            .registry
            .enable(channel)
            .map_err(|e| self.configuration_fault(e))?;
        debug!(%channel, "channel enabled");
        if channel == Channel::Other(Subsystem::CoinReceptacle) {
            self.receptacle.enabled_events += 1;
        }

        match cascade {
            Cascade::CoinRacks => self.refresh_exact_change(),
            Cascade::ClearFault { recovered } => {
                self.set_out_of_order_light(false);
                if recovered {
                    info!(%channel, "machine back in service");
                    self.hardware.set_safety(false);
                    self.publish_status();
                    self.show_idle_or_credit();
                }
            }
            Cascade::None | Cascade::EnterFault => {}
        }
        Ok(())
    }

    fn disable(&mut self, channel: Channel) -> Result<(), ControllerError> {
        let cascade = self
            .registry
            .disable(channel)
            .map_err(|e| self.configuration_fault(e))?;
        debug!(%channel, "channel disabled");
        if channel == Channel::Other(Subsystem::CoinReceptacle) {
            self.receptacle.disabled_events += 1;
        }

        match cascade {
            Cascade::CoinRacks => self.refresh_exact_change(),
            Cascade::EnterFault => self.enter_fault(channel)?,
            Cascade::None if matches!(channel, Channel::Other(_)) => {
                debug!(%channel, "already out of order");
            }
            Cascade::None | Cascade::ClearFault { .. } => {}
        }
        Ok(())
    }

    /// Operational -> Fault. The registry only hands out `EnterFault` once
    /// per fault, so the side effects below never repeat.
    fn enter_fault(&mut self, cause: Channel) -> Result<(), ControllerError> {
        warn!(%cause, credit = %self.credit(), "subsystem failed, taking machine out of order");
        self.set_out_of_order_light(true);
        // still operational here, so the change guards let coins through
        self.return_change()?;
        self.registry.enter_fault();
        self.publish_status();
        self.hardware.set_safety(true);
        self.show(MSG_OUT_OF_ORDER);
        Ok(())
    }

    fn on_coin_rack(&mut self, rack: Index, event: CoinRackEvent) -> Result<(), ControllerError> {
        let slot = match self.registry.resolve(Channel::CoinRack(rack)) {
            Ok(_) => self.registry.coin_rack(rack).copied(),
            Err(e) => return Err(self.configuration_fault(e)),
        };
        let capacity = slot.map_or(0, |slot| slot.capacity);

        let line = match &event {
            CoinRackEvent::CoinAdded(coin) => format!("Coin rack #{rack} received a {coin} coin."),
            CoinRackEvent::CoinRemoved(coin) => format!("Coin rack #{rack} released a {coin} coin."),
            CoinRackEvent::Full => format!("Coin rack #{rack} is full ({capacity} coins)."),
            CoinRackEvent::Loaded(coins) => format!(
                "Coin rack #{rack} was loaded with {} coins worth {}.",
                coins.len(),
                coins.iter().copied().sum::<Cents>()
            ),
            CoinRackEvent::Unloaded(coins) => format!(
                "Coin rack #{rack} was unloaded of {} coins worth {}.",
                coins.len(),
                coins.iter().copied().sum::<Cents>()
            ),
        };
        self.log.record(&line);
        debug!(rack, ?event, "coin rack event");

        if !matches!(event, CoinRackEvent::Full) {
            self.refresh_exact_change();
        }
        Ok(())
    }

    fn on_product_rack(
        &mut self,
        rack: Index,
        event: ProductRackEvent,
    ) -> Result<(), ControllerError> {
        if let Err(e) = self.registry.resolve(Channel::ProductRack(rack)) {
            return Err(self.configuration_fault(e));
        }
        debug!(rack, ?event, "product rack event");
        Ok(())
    }

    fn on_receptacle(&mut self, event: ReceptacleEvent) {
        let tally = &mut self.receptacle;
        let line = match event {
            ReceptacleEvent::CoinAdded(coin) => {
                tally.value += coin;
                tally.coins += 1;
                format!("Coin receptacle received a {coin} coin, holding {}.", tally.value)
            }
            ReceptacleEvent::CoinsRemoved => {
                let removed = tally.value;
                tally.value = Cents::ZERO;
                tally.coins = 0;
                tally.full = false;
                format!("Coin receptacle was emptied of {removed}.")
            }
            ReceptacleEvent::Full => {
                tally.full = true;
                format!("Coin receptacle is full with {} coins.", tally.coins)
            }
            ReceptacleEvent::Loaded(coins) => {
                for coin in &coins {
                    tally.value += *coin;
                    tally.coins += 1;
                }
                format!(
                    "Coin receptacle was loaded with {} coins, holding {}.",
                    coins.len(),
                    tally.value
                )
            }
            ReceptacleEvent::Unloaded(coins) => {
                for coin in &coins {
                    tally.value = tally.value.saturating_sub(*coin);
                    tally.coins = tally.coins.saturating_sub(1);
                }
                format!(
                    "Coin receptacle was unloaded of {} coins, holding {}.",
                    coins.len(),
                    tally.value
                )
            }
        };
        self.log.record(&line);
    }

    /// Small helper to log purchase outcomes
    fn log_outcome(outcome: &PurchaseOutcome) {
        match outcome {
            PurchaseOutcome::Dispensed {
                selection,
                change,
                shortfall,
            } => {
                if shortfall.is_zero() {
                    info!(selection, change = %change, "purchase completed");
                } else {
                    warn!(selection, change = %change, shortfall = %shortfall, "purchase completed without full change");
                }
            }
            PurchaseOutcome::InsufficientCredit {
                selection,
                price,
                credit,
            } => {
                info!(selection, price = %price, credit = %credit, "purchase skipped: insufficient credit");
            }
            PurchaseOutcome::Unavailable(selection) => {
                info!(selection, "purchase skipped: selection unavailable");
            }
            PurchaseOutcome::OutOfOrder(selection) => {
                info!(selection, "purchase skipped: machine out of order");
            }
            PurchaseOutcome::DispenseFailed { selection, reason } => {
                warn!(selection, reason = %reason, "purchase aborted");
            }
        }
    }
}
