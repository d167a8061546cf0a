//! Client side of the CSV import protocol: pick a file, validate it, import it,
//! and present the server's reports.

pub mod api;
pub mod notify;
pub mod presenter;
pub mod selector;
pub mod workflow;

pub use api::{ClientError, ImportApi, ImportBackend};
pub use notify::{Notification, NotificationKind, NotificationLog, Notifier, TracingNotifier};
pub use selector::{CandidateFile, FileRejection, FileSelector, RejectionCode};
pub use workflow::{ImportWorkflow, WorkflowError, WorkflowState};
