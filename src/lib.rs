//! Element-template binding engine.
//!
//! Reconciles declarative, versioned template descriptors against the
//! in-memory business-object tree of a process-diagram element: resolves a
//! property's current value from its storage location (a plain field, a
//! singleton nested object, or an entry in an ordered collection under an
//! extension container), writes new values back with create-on-demand and
//! prune-on-empty container semantics, and manages whole-template lifecycle
//! (apply, replace, unlink, remove, cross-version migration) as atomic
//! undoable commands.
//!
//! The diagram canvas, form rendering, document parsing, and descriptor
//! fetching are the host's business; the engine only ever sees an element
//! subtree, a registry of parsed descriptors, and a command stack.

pub mod applier;
pub mod binding;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod registry;
pub mod validate;

pub use applier::{ApplyPolicy, TemplateApplier};
pub use command::CommandStack;
pub use descriptor::{BindingDescriptor, BindingKind, TemplateDescriptor, TemplateDescriptorJson};
pub use error::{EngineError, Result};
pub use lifecycle::{stamped_identity, TemplateLifecycleManager, TemplateState};
pub use model::{BusinessObject, Value};
pub use registry::{LoadOutcome, TemplateRegistry};
pub use validate::ValidationError;
