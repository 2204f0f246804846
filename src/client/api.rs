use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;

use crate::error::{PollError, SubmissionError};
use crate::models::{JobKey, PollResponse, Submission};

/// The two backend endpoints of the job protocol
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Create a job and return its key
    async fn create_job(&self, submission: &Submission) -> Result<JobKey, SubmissionError>;

    /// Look up a job result once
    async fn fetch_result(&self, key: &JobKey) -> Result<PollResponse, PollError>;
}

/// reqwest-backed client for `/api/promptweb` and `/api/results`
#[derive(Debug, Clone)]
pub struct HttpJobApi {
    client: Client,
    base_url: String,
}

impl HttpJobApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(3))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn submit_url(&self, prompt: &str) -> String {
        format!(
            "{}/api/promptweb?prompt={}",
            self.base_url,
            urlencoding::encode(prompt)
        )
    }

    pub fn result_url(&self, key: &JobKey) -> String {
        format!(
            "{}/api/results/{}",
            self.base_url,
            urlencoding::encode(key.as_str())
        )
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn create_job(&self, submission: &Submission) -> Result<JobKey, SubmissionError> {
        let mut request = self
            .client
            .post(self.submit_url(&submission.prompt))
            .json(&submission.context);

        if let Some(cookie) = submission.session_cookie.as_deref() {
            request = request.header(header::COOKIE, format!("session={}", cookie));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let key = body.trim();
        if key.is_empty() {
            return Err(SubmissionError::EmptyKey);
        }

        Ok(JobKey::new(key))
    }

    async fn fetch_result(&self, key: &JobKey) -> Result<PollResponse, PollError> {
        let response = self.client.get(self.result_url(key)).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(PollResponse::NotReady);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(PollError::Failed {
                key: key.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(PollResponse::Ready(body))
    }
}
