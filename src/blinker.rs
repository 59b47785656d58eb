//! Idle-message blinker.
//!
//! Runs beside the controller and only ever reads the published status.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::config::ControllerConfig;
use crate::model::MachineStatus;

/// Somewhere the blinker can write text.
pub trait DisplaySink: Send + 'static {
    fn show(&self, text: &str);
}

/// While the machine is idle (operational, zero credit), alternate between a
/// blank display (`blink_off`) and the idle message (`blink_on`). Stops when
/// the status publisher goes away.
pub fn spawn_idle_blinker<D: DisplaySink>(
    status: watch::Receiver<MachineStatus>,
    display: D,
    config: &ControllerConfig,
) -> JoinHandle<()> {
    let message = config.idle_message.clone();
    let (on, off) = (config.blink_on, config.blink_off);
    tokio::spawn(blink(status, display, message, on, off))
}

async fn blink<D: DisplaySink>(
    mut status: watch::Receiver<MachineStatus>,
    display: D,
    message: String,
    on: Duration,
    off: Duration,
) {
    loop {
        let closed = status.wait_for(MachineStatus::is_idle).await.is_err();
        if closed {
            debug!("status publisher dropped, blinker stopping");
            return;
        }

        sleep(off).await;
        if !status.borrow().is_idle() {
            continue;
        }
        display.show(&message);

        sleep(on).await;
        if !status.borrow().is_idle() {
            continue;
        }
        display.show("");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::Cents;
    use crate::model::MachineMode;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl DisplaySink for Recorder {
        fn show(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    impl Recorder {
        fn shown(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn credit(cents: u32) -> MachineStatus {
        MachineStatus {
            credit: Cents::new(cents),
            mode: MachineMode::Operational,
        }
    }

    fn config() -> ControllerConfig {
        ControllerConfig {
            blink_on: Duration::from_secs(5),
            blink_off: Duration::from_secs(10),
            ..ControllerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blinks_while_credit_is_zero() {
        let (_tx, rx) = watch::channel(credit(0));
        let recorder = Recorder::default();
        let handle = spawn_idle_blinker(rx, recorder.clone(), &config());

        sleep(Duration::from_secs(11)).await;
        assert_eq!(recorder.shown(), ["Welcome"]);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.shown(), ["Welcome", ""]);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stays_quiet_with_credit() {
        let (_tx, rx) = watch::channel(credit(100));
        let recorder = Recorder::default();
        let handle = spawn_idle_blinker(rx, recorder.clone(), &config());

        sleep(Duration::from_secs(60)).await;
        assert!(recorder.shown().is_empty());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn skips_message_if_credit_arrives_during_pause() {
        let (tx, rx) = watch::channel(credit(0));
        let recorder = Recorder::default();
        let handle = spawn_idle_blinker(rx, recorder.clone(), &config());

        sleep(Duration::from_secs(3)).await;
        tx.send_replace(credit(25));

        sleep(Duration::from_secs(30)).await;
        assert!(recorder.shown().is_empty());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stays_quiet_during_fault() {
        let fault = MachineStatus {
            credit: Cents::ZERO,
            mode: MachineMode::Fault,
        };
        let (_tx, rx) = watch::channel(fault);
        let recorder = Recorder::default();
        let handle = spawn_idle_blinker(rx, recorder.clone(), &config());

        sleep(Duration::from_secs(60)).await;
        assert!(recorder.shown().is_empty());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_mid_cycle_when_fault_begins() {
        let (tx, rx) = watch::channel(credit(0));
        let recorder = Recorder::default();
        let handle = spawn_idle_blinker(rx, recorder.clone(), &config());

        sleep(Duration::from_secs(11)).await;
        tx.send_modify(|status| status.mode = MachineMode::Fault);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(recorder.shown(), ["Welcome"]);

        tx.send_modify(|status| status.mode = MachineMode::Operational);
        sleep(Duration::from_secs(11)).await;
        assert_eq!(recorder.shown(), ["Welcome", "Welcome"]);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_publisher_dropped() {
        let (tx, rx) = watch::channel(credit(5));
        let handle = spawn_idle_blinker(rx, Recorder::default(), &config());
        drop(tx);
        handle.await.unwrap();
    }
}
