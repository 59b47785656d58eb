pub mod blinker;
pub mod cents;
pub mod config;
pub mod controller;
pub mod csv;
pub mod hardware;
pub mod log;
pub mod model;
pub mod sim;

pub use cents::Cents;
pub use config::ControllerConfig;
pub use controller::{Controller, ControllerError, PurchaseOutcome};
pub use hardware::{Hardware, HardwareError};
pub use model::{
    ButtonId, Channel, HardwareEvent, Index, MachineMode, MachineStatus, Product, Subsystem,
};
