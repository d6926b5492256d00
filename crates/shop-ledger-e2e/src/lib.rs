//! Shop Ledger E2E: a browser-driven shopping journey checked against the price ledger.

pub mod config;
pub mod driver;
pub mod journey;
pub mod report;

pub use config::{load_profile, resolve_profile_path};
pub use driver::PageDriver;
pub use journey::Journey;
pub use report::{JourneyReport, StepRecord, StepStatus};
