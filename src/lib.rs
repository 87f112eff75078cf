pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::cli::LocalStorage;
pub use config::toml_config::PortalsConfig;
pub use crate::core::{
    integration::{PortalIntegration, Strategy},
    relocator::{relocate, RelocateMode},
    store::ContentStore,
    sweep::{SweepOptions, SweepPhases, SweepProcessor, SweepReport},
    transform::{SessionSummary, TransformHook},
};
pub use utils::error::{PortalError, Result};
