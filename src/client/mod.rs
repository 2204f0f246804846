pub mod api;
pub mod poller;

pub use api::{HttpJobApi, JobApi};
pub use poller::{JobClient, JobTask, PollPolicy, Sleeper, TokioSleeper};
