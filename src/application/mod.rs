//! Application services: the controllers that sit between the cache store and
//! the rendering layer, plus the boundary traits for the server-side
//! collaborators.

pub mod filters;
pub mod mutation;
pub mod query;
pub mod session;
pub mod sources;

pub use filters::{FilterController, FilterState};
pub use mutation::{ListEdit, MutationController, MutationError, MutationState, MutationStatus, WriteOp, apply_edit};
pub use query::{QueryController, QueryHandle};
pub use session::{ResourceController, ResourceSources, Session, SessionSources};
pub use sources::{FieldPatch, ListSource, SourceError, WriteReceipt, WriteSource};
