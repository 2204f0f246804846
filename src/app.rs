use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::{Credential, SessionManager};
use crate::client::JobClient;
use crate::error::{Error, Result, ValidationError};
use crate::form::{CredentialLayout, FormController};
use crate::models::tool::{FIELD_CONTEXT_WINDOW, FIELD_CUSTOM_MODEL, FIELD_PROMPT};
use crate::models::{CredentialMode, FormValues, ManualCredential, RequestContext, Submission, Tool};
use crate::presenter::ResultPresenter;
use crate::storage::{normalize, FieldStore, PromptHistory};

/// Background session refresh. Stops when aborted or dropped.
pub struct RefreshTask {
    ticker: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl RefreshTask {
    pub fn abort(&self) {
        self.ticker.abort();
        self.watcher.abort();
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.abort();
    }
}

#[derive(Debug, Clone, Default)]
struct CredentialInput {
    mode: CredentialMode,
    manual: ManualCredential,
}

/// One tool's form: persisted fields, credentials and the submit flow
pub struct PromptApp {
    tool: Tool,
    fields: Arc<dyn FieldStore>,
    history: PromptHistory,
    sessions: Arc<SessionManager>,
    form: FormController,
    jobs: JobClient,
    presenter: ResultPresenter,
    credentials: Mutex<CredentialInput>,
}

impl PromptApp {
    pub fn new(
        fields: Arc<dyn FieldStore>,
        sessions: Arc<SessionManager>,
        form: FormController,
        jobs: JobClient,
        presenter: ResultPresenter,
    ) -> Self {
        let app = Self {
            tool: sessions.tool(),
            history: PromptHistory::new(fields.clone()),
            fields,
            sessions,
            form,
            jobs,
            presenter,
            credentials: Mutex::new(CredentialInput::default()),
        };
        app.refresh_layout();
        app
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn form(&self) -> &FormController {
        &self.form
    }

    pub fn history(&self) -> &PromptHistory {
        &self.history
    }

    /// Restore every field, falling back to its default.
    ///
    /// `prompt_override` stands in for the default prompt only; a prompt the
    /// user already typed wins.
    pub async fn load(&self, prompt_override: Option<&str>) -> FormValues {
        let ns = self.tool.namespace();
        let mut values = FormValues {
            argument_debugging: false,
            ..Default::default()
        };

        for name in self.tool.field_names() {
            let stored = self.fields.get(ns, name).await;
            let value = match (name, stored) {
                (_, Some(value)) => value,
                (FIELD_PROMPT, None) => match prompt_override.map(normalize) {
                    Some(prompt) if !prompt.is_empty() => prompt,
                    _ => self.tool.default_prompt().to_string(),
                },
                (_, None) => self.tool.default_value(name).unwrap_or_default().to_string(),
            };

            match name {
                FIELD_PROMPT => values.prompt = value,
                FIELD_CUSTOM_MODEL => values.custom_model = value,
                FIELD_CONTEXT_WINDOW => values.context_window = value,
                _ => {
                    values.tool_fields.insert(name.to_string(), value);
                }
            }
        }

        values
    }

    /// Persist a field as soon as it changes
    pub async fn update_field(&self, field: &str, value: &str) -> std::result::Result<(), ValidationError> {
        if !self.tool.field_names().contains(&field) {
            return Err(ValidationError::UnknownField {
                tool: self.tool.to_string(),
                field: field.to_string(),
            });
        }
        self.fields.set(self.tool.namespace(), field, value).await;
        Ok(())
    }

    pub fn credential_mode(&self) -> CredentialMode {
        self.credentials().mode
    }

    pub fn set_mode(&self, mode: CredentialMode) -> CredentialLayout {
        self.credentials().mode = mode;
        self.refresh_layout()
    }

    pub fn set_manual_credential(&self, manual: ManualCredential) -> CredentialLayout {
        self.credentials().manual = manual;
        self.refresh_layout()
    }

    /// Re-read the session and recompute which controls are shown
    pub fn refresh_layout(&self) -> CredentialLayout {
        let input = self.credentials().clone();
        let logged_in = self.sessions.is_valid(self.sessions.current_session().as_ref());
        let layout = CredentialLayout::derive(input.mode, logged_in, input.manual.is_present());
        self.form.set_layout(layout);
        layout
    }

    /// Keep the session state and the layout current while idle.
    ///
    /// The session manager's ticker re-derives the login state; every change
    /// it publishes re-renders the credential layout.
    pub fn spawn_refresh(self: &Arc<Self>, period: Duration) -> RefreshTask {
        let ticker = self.sessions.spawn_refresh(period);
        let mut changes = self.sessions.subscribe();
        let app = Arc::clone(self);
        let watcher = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                app.refresh_layout();
            }
        });
        RefreshTask { ticker, watcher }
    }

    /// Validate, submit and wait for one prompt.
    ///
    /// The form stays locked for the whole attempt and unlocks on every exit
    /// path. Validation failures are raised as alerts and nothing is sent.
    pub async fn submit(&self, values: &FormValues) -> Result<String> {
        let _lock = self.form.lock().ok_or(Error::Busy)?;

        let submission = match self.prepare(values).await {
            Ok(submission) => submission,
            Err(e) => {
                tracing::warn!("Submission for {} rejected locally: {}", self.tool, e);
                self.presenter.alert(&e.to_string());
                return Err(e.into());
            }
        };

        self.history.record(self.tool.namespace(), &values.prompt).await;
        self.presenter.loading();

        let outcome = self.jobs.run(submission).await;
        self.presenter.present_outcome(&outcome);
        outcome
    }

    async fn prepare(&self, values: &FormValues) -> std::result::Result<Submission, ValidationError> {
        if normalize(&values.prompt).is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        let input = self.credentials().clone();
        let credential = self.sessions.resolve_credential(input.mode, &input.manual)?;
        let provider = self.tool.provider();
        let context = RequestContext::new(self.tool, values);

        let submission = match credential {
            Credential::Session(cookie) => Submission::new(values.prompt.clone(), context, Some(cookie)),
            Credential::Token(token) => Submission::new(
                values.prompt.clone(),
                context.with_field(provider.access_token_key(), token),
                None,
            ),
            Credential::File(path) => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| ValidationError::UnreadableFile {
                        path: path.clone(),
                        source,
                    })?;
                if content.trim().is_empty() {
                    return Err(ValidationError::MissingFile);
                }
                Submission::new(
                    values.prompt.clone(),
                    context.with_field(provider.service_account_key(), content),
                    None,
                )
            }
        };

        Ok(submission)
    }

    fn credentials(&self) -> MutexGuard<'_, CredentialInput> {
        self.credentials.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
