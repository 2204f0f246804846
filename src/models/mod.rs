pub mod job;
pub mod request;
pub mod session;
pub mod tool;

pub use job::{Job, JobKey, JobStatus, PollResponse};
pub use request::{FormValues, RequestContext, Submission};
pub use session::{CredentialMode, ManualCredential, Session};
pub use tool::{ManualKind, Provider, Tool, ToolField};
