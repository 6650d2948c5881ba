//! App - wiring on top of the ports.
//!
//! - **StoreBuilder**: builds a store and brings it to the prepared state
//! - **StageRegistry**: stage name -> stage
//! - **StageRunner**: workers that claim, process and mark documents
//! - **StoreStats**: counts and readiness snapshot

pub mod builder;
pub mod registry;
pub mod runner;
pub mod status;

pub use self::builder::{BuildError, StoreBuilder, connect};
pub use self::registry::{RegistryError, StageRegistry};
pub use self::runner::{RunnerOptions, StageRunner};
pub use self::status::StoreStats;
