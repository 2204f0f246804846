use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::api::JobApi;
use crate::error::{Error, PollError, SubmissionError};
use crate::models::{Job, JobStatus, PollResponse, Submission};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Suspension between polls
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between result lookups
    pub interval: Duration,
    /// Give up after this much waiting. `None` polls until the job finishes.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

/// Runs the submit-then-poll protocol against a [`JobApi`]
#[derive(Clone)]
pub struct JobClient {
    api: Arc<dyn JobApi>,
    sleeper: Arc<dyn Sleeper>,
    policy: PollPolicy,
}

impl JobClient {
    pub fn new(api: Arc<dyn JobApi>, policy: PollPolicy) -> Self {
        Self {
            api,
            sleeper: Arc::new(TokioSleeper),
            policy,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub async fn submit(&self, submission: &Submission) -> Result<Job, SubmissionError> {
        tracing::info!(
            "Submitting job [{}] tool={} model={}",
            submission.request_id,
            submission.context.tool,
            if submission.context.custom_model.is_empty() {
                "default"
            } else {
                submission.context.custom_model.as_str()
            }
        );

        let key = self.api.create_job(submission).await.map_err(|e| {
            tracing::error!("Job submission [{}] failed: {}", submission.request_id, e);
            e
        })?;

        tracing::info!("Job [{}] accepted with key {}", submission.request_id, key);
        Ok(Job::pending(key))
    }

    /// Poll until the job leaves `Pending`.
    ///
    /// The first lookup goes out right away; after that one lookup per
    /// interval. Lookups never overlap.
    pub async fn poll(&self, job: &mut Job) -> Result<String, PollError> {
        let mut waited = Duration::ZERO;

        loop {
            job.polls += 1;
            match self.api.fetch_result(&job.key).await {
                Ok(PollResponse::Ready(body)) => {
                    job.status = JobStatus::Ready;
                    tracing::info!("Job {} ready after {} polls", job.key, job.polls);
                    return Ok(body);
                }
                Ok(PollResponse::NotReady) => {
                    tracing::debug!("Job {} not ready (poll {})", job.key, job.polls);
                }
                Err(e) => {
                    job.status = JobStatus::Failed;
                    tracing::error!("Job {} failed: {}", job.key, e);
                    return Err(e);
                }
            }

            if let Some(max_wait) = self.policy.max_wait {
                if waited + self.policy.interval > max_wait {
                    job.status = JobStatus::Failed;
                    tracing::warn!("Job {} gave up after {:?}", job.key, waited);
                    return Err(PollError::TimedOut {
                        key: job.key.to_string(),
                        waited,
                    });
                }
            }

            self.sleeper.sleep(self.policy.interval).await;
            waited += self.policy.interval;
        }
    }

    /// Submit and wait for the result
    pub async fn run(&self, submission: Submission) -> Result<String, Error> {
        let mut job = self.submit(&submission).await?;
        let result = self.poll(&mut job).await;
        tracing::info!(
            "Job [{}] finished ({:?}) {}s after submission",
            submission.request_id,
            job.status,
            submission.elapsed_secs()
        );
        Ok(result?)
    }

    /// Run on the runtime as an abortable task
    pub fn spawn(&self, submission: Submission) -> JobTask {
        let client = self.clone();
        JobTask {
            handle: tokio::spawn(async move { client.run(submission).await }),
        }
    }
}

/// Handle to a job running in the background
pub struct JobTask {
    handle: JoinHandle<Result<String, Error>>,
}

impl JobTask {
    /// Abandon the job. The backend keeps working on it.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub async fn join(self) -> Result<String, Error> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormValues, JobKey, RequestContext, Tool};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted backend: serves the queued poll responses in order
    #[derive(Default)]
    struct FakeApi {
        submit_status: Option<u16>,
        responses: Mutex<VecDeque<Result<PollResponse, u16>>>,
        submissions: Mutex<Vec<String>>,
        polls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn with_responses(responses: Vec<Result<PollResponse, u16>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl JobApi for FakeApi {
        async fn create_job(&self, submission: &Submission) -> Result<JobKey, SubmissionError> {
            self.submissions.lock().unwrap().push(submission.prompt.clone());
            match self.submit_status {
                Some(status) => Err(SubmissionError::Rejected {
                    status,
                    body: "rejected".to_string(),
                }),
                None => Ok(JobKey::new("job-1")),
            }
        }

        async fn fetch_result(&self, key: &JobKey) -> Result<PollResponse, PollError> {
            self.polls.lock().unwrap().push(key.to_string());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(response)) => Ok(response),
                Some(Err(status)) => Err(PollError::Failed {
                    key: key.to_string(),
                    status,
                    body: String::new(),
                }),
                None => Ok(PollResponse::NotReady),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn submission(prompt: &str) -> Submission {
        let context = RequestContext::new(Tool::GoogleDocs, &FormValues::default());
        Submission::new(prompt.to_string(), context, None)
    }

    fn client(api: Arc<FakeApi>, sleeper: Arc<RecordingSleeper>, policy: PollPolicy) -> JobClient {
        JobClient::new(api, policy).with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_polls_until_ready() {
        let api = Arc::new(FakeApi::with_responses(vec![
            Ok(PollResponse::NotReady),
            Ok(PollResponse::NotReady),
            Ok(PollResponse::Ready("done".to_string())),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(api.clone(), sleeper.clone(), PollPolicy::default());

        let result = client.run(submission("Summarize X")).await.unwrap();

        assert_eq!(result, "done");
        assert_eq!(api.polls.lock().unwrap().len(), 3);
        let sleeps = sleeper.0.lock().unwrap();
        assert_eq!(sleeps.len(), 2);
        assert!(sleeps.iter().all(|d| *d >= Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_poll_failure_is_terminal() {
        let api = Arc::new(FakeApi::with_responses(vec![
            Ok(PollResponse::NotReady),
            Err(500),
            Ok(PollResponse::Ready("never".to_string())),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(api.clone(), sleeper, PollPolicy::default());

        let mut job = client.submit(&submission("p")).await.unwrap();
        let err = client.poll(&mut job).await.unwrap_err();

        assert!(matches!(err, PollError::Failed { status: 500, .. }));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.is_terminal());
        assert_eq!(api.polls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_submission_never_polls() {
        let api = Arc::new(FakeApi {
            submit_status: Some(403),
            ..Default::default()
        });
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(api.clone(), sleeper, PollPolicy::default());

        let err = client.run(submission("p")).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Submission(SubmissionError::Rejected { status: 403, .. })
        ));
        assert_eq!(api.submissions.lock().unwrap().len(), 1);
        assert!(api.polls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_max_wait_stops_polling() {
        let api = Arc::new(FakeApi::default());
        let sleeper = Arc::new(RecordingSleeper::default());
        let policy = PollPolicy {
            interval: Duration::from_secs(30),
            max_wait: Some(Duration::from_secs(90)),
        };
        let client = client(api.clone(), sleeper.clone(), policy);

        let err = client.run(submission("p")).await.unwrap_err();

        assert!(matches!(err, Error::Poll(PollError::TimedOut { .. })));
        assert_eq!(api.polls.lock().unwrap().len(), 4);
        assert_eq!(sleeper.0.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_job_can_be_cancelled() {
        let api = Arc::new(FakeApi::default());
        let client = JobClient::new(api.clone(), PollPolicy::default());

        let task = client.spawn(submission("p"));
        tokio::time::sleep(Duration::from_secs(65)).await;
        task.cancel();

        assert!(matches!(task.join().await, Err(Error::Cancelled)));
        let polls = api.polls.lock().unwrap().len();
        assert!((2..=3).contains(&polls));
    }
}
