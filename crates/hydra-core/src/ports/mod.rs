//! Ports - the traits the core talks through.
//!
//! - store traits: reader / writer / status coordinator
//! - stage + attachment source: the pipeline-facing boundary
//! - clock + id generator: injectable time and identity

pub mod attachments;
pub mod clock;
pub mod document_store;
pub mod id_generator;
pub mod stage;

pub use self::attachments::{AttachmentError, AttachmentSource, AttachmentStream};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::document_store::{DocumentReader, DocumentStore, DocumentWriter, StatusCoordinator};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::stage::{Stage, StageContext, StageError};
