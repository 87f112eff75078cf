pub mod grammar;
pub mod integration;
pub mod live;
pub mod relocator;
pub mod store;
pub mod sweep;
pub mod transform;
pub mod walker;

pub use crate::domain::model::{Fragment, Label, Relocation, ScanResult, TransformOutput};
pub use crate::domain::ports::{BuildHooks, ScriptInjector, Storage};
pub use crate::utils::error::Result;
