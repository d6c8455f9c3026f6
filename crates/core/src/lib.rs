pub mod config;
pub mod domain;
pub mod errors;

pub use domain::correspondent::{Correspondent, CorrespondentKey, ThreadBinding};
pub use domain::file::{AttachmentCapability, FileInput, FilePurpose, FileRef};
pub use domain::run::{AssistantRef, RunOutcome, RunResult, RunStatus, ToolCall, ToolOutput};
pub use errors::{ApplicationError, InterfaceError};
