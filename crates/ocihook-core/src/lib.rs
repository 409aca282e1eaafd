//! Shared types for the ocihook engine: the runtime-spec hook model, the
//! invocation state handed to hooks, and the error taxonomy.

pub mod error;
pub mod state;
pub mod types;

pub use error::{ExitReason, HookError, HookErrorKind, HookResult, SpecError};
pub use state::{InvocationState, OCI_VERSION, build_state};
pub use types::{CONFIG_FILE_NAME, Hook, Hooks, Spec, Stage};
