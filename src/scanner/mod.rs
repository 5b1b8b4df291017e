pub mod controller;
pub mod ledger;
pub mod loop_worker;
pub mod projector;
pub mod state;

pub use controller::ScannerController;
pub use ledger::{RewardLedger, RewardSnapshot};
pub use loop_worker::SamplerConfig;
pub use projector::{project, DisplayState};
pub use state::{SamplerStatus, ScannerSnapshot};
