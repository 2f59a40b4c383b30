mod autosave;
mod service;
mod shuffle;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{SessionError, SubmissionError};
pub use autosave::{Autosaver, DEFAULT_QUIET_PERIOD};
pub use service::ModuleSession;
pub use shuffle::{shuffle_module, shuffle_module_with};
pub use workflow::SubmissionService;
