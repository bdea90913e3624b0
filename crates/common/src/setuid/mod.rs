//! The setuid pipeline.
//!
//! A request flows through [`ContextAssembler`], [`ValidationChain`],
//! [`HostVendorGate`] and [`ResponseComposer`]. The first stage that fails
//! hands its [`Rejection`] to the [`ErrorClassifier`], which produces the
//! response instead. [`SetuidHandler`] wires the stages together.

pub mod context;
pub mod handler;
pub mod host_vendor;
pub mod outcome;
pub mod registry;
pub mod response;
pub mod validation;

pub use context::{ContextAssembler, SetuidContext, SetuidQuery};
pub use handler::{SetuidCollaborators, SetuidHandler};
pub use host_vendor::{HostVendorDecision, HostVendorGate};
pub use outcome::{classify, Classification, ErrorClassifier, LegalBlock, Rejection};
pub use registry::{SyncRegistry, UsersyncFormat, UsersyncMethodType};
pub use response::ResponseComposer;
pub use validation::ValidationChain;
