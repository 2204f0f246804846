mod terminal;

pub use terminal::{TerminalFormView, TerminalHistoryView, TerminalResultView};

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::app::PromptApp;
use crate::auth::{AuthState, BrowserNavigator, SessionManager, SystemClock};
use crate::client::{HttpJobApi, JobClient};
use crate::config::AppConfig;
use crate::error::Error;
use crate::form::FormController;
use crate::models::tool::FIELD_PROMPT;
use crate::models::{CredentialMode, FormValues, ManualCredential, Tool};
use crate::presenter::{ResultPresenter, ResultView};
use crate::storage::{Database, FileSessionStore};

/// Everything a command needs, wired for one tool
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<Database>,
    pub app: Arc<PromptApp>,
}

impl AppState {
    pub async fn init(config: AppConfig, tool: Tool, view: Arc<dyn ResultView>) -> Result<Self> {
        // 데이터베이스 초기화
        let data_dir = config.data_dir();
        let db = Arc::new(
            Database::init(&data_dir)
                .await
                .with_context(|| format!("Failed to open field store in {}", data_dir.display()))?,
        );

        let sessions = Arc::new(SessionManager::new(
            tool,
            config.oauth(tool.provider()),
            Arc::new(FileSessionStore::new(config.session_path())),
            Arc::new(SystemClock),
            Arc::new(BrowserNavigator),
        ));

        let api = HttpJobApi::new(&config.base_url, config.request_timeout())
            .context("Failed to build HTTP client")?;
        let jobs = JobClient::new(Arc::new(api), config.poll_policy());

        let app = Arc::new(PromptApp::new(
            db.clone(),
            sessions,
            FormController::new(Arc::new(TerminalFormView)),
            jobs,
            ResultPresenter::with_view(view),
        ));

        Ok(Self { config, db, app })
    }
}

pub async fn status(state: &AppState) -> Result<()> {
    let app = &state.app;
    let sessions = app.sessions();
    let auth = sessions.refresh();
    let layout = app.refresh_layout();

    println!("Tool:     {}", app.tool());
    println!("Backend:  {}", state.config.base_url);

    let expiry = sessions
        .current_session()
        .and_then(|s| s.expires_at)
        .and_then(|exp| chrono::DateTime::from_timestamp(exp, 0));
    match (auth, expiry) {
        (AuthState::LoggedIn, Some(expires)) => {
            println!("Session:  logged in to {} until {}", app.tool().provider(), expires)
        }
        (AuthState::LoggedIn, None) => println!("Session:  logged in to {}", app.tool().provider()),
        (AuthState::AwaitingCallback, _) => println!("Session:  waiting for login to finish"),
        (AuthState::LoggedOut, _) => println!("Session:  logged out"),
    }

    if layout.logout_visible {
        println!("Ready to submit.");
    } else {
        println!("Run `login`, or submit with a manual credential.");
    }
    Ok(())
}

pub async fn login(state: &AppState) -> Result<()> {
    let sessions = state.app.sessions();
    match sessions.begin_login() {
        Ok(url) => println!("Opened {} login in your browser:\n  {}", sessions.tool().provider(), url),
        Err(e) => {
            tracing::warn!("Could not open a browser: {}", e);
            println!("Open this URL to log in:\n  {}", sessions.authorize_url());
        }
    }
    println!(
        "After approving, copy the `session` cookie and run:\n  promptweb --tool {} session import <cookie>",
        sessions.tool()
    );
    Ok(())
}

pub async fn import_session(state: &AppState, cookie: &str) -> Result<()> {
    let sessions = state.app.sessions();
    match sessions.complete_login(cookie) {
        AuthState::LoggedIn => {
            state.app.refresh_layout();
            println!("Logged in to {}", sessions.tool().provider());
            Ok(())
        }
        _ => bail!(
            "The cookie does not carry a valid {} session",
            sessions.tool().provider()
        ),
    }
}

pub async fn logout(state: &AppState) -> Result<()> {
    state.app.sessions().logout();
    state.app.refresh_layout();
    println!("Logged out of {}", state.app.tool().provider());
    Ok(())
}

pub async fn set_field(state: &AppState, field: &str, value: &str) -> Result<()> {
    state.app.update_field(field, value).await?;
    println!("Saved {}", field);
    Ok(())
}

/// `default_prompt` replaces the built-in prompt when none has been saved
pub async fn show(state: &AppState, default_prompt: Option<&str>) -> Result<()> {
    let tool = state.app.tool();
    let values = state.app.load(default_prompt).await;
    let stored: HashSet<String> = state
        .db
        .snapshot(tool.namespace())
        .await?
        .into_iter()
        .map(|(field, _)| field)
        .collect();

    for name in tool.field_names() {
        let value = values.get(name).unwrap_or_default();
        let marker = if stored.contains(name) { "" } else { " (default)" };
        println!("{:<16} {}{}", name, value, marker);
    }
    Ok(())
}

pub async fn history(state: &AppState, use_entry: Option<usize>) -> Result<()> {
    let ns = state.app.tool().namespace();
    let history = state.app.history();

    match use_entry {
        None => history.render(ns, &TerminalHistoryView).await,
        Some(0) => bail!("History entries are numbered from 1"),
        Some(n) => match history.select(ns, n - 1).await {
            Some(prompt) => println!("Prompt set to: {}", prompt),
            None => bail!("No history entry {}", n),
        },
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct SubmitArgs {
    pub prompt: Option<String>,
    /// Used only when no prompt has been saved
    pub default_prompt: Option<String>,
    pub token: Option<String>,
    pub credential_file: Option<PathBuf>,
    pub argument_debugging: bool,
}

/// Form state for a submission: an explicit prompt is saved like an edit,
/// a default prompt only fills in for a missing one
async fn form_values(app: &PromptApp, args: &SubmitArgs) -> Result<FormValues> {
    if let Some(prompt) = &args.prompt {
        app.update_field(FIELD_PROMPT, prompt).await?;
    }
    let mut values = app.load(args.default_prompt.as_deref()).await;
    values.argument_debugging = args.argument_debugging;
    Ok(values)
}

/// Submit the stored form and wait for the result.
///
/// The outcome has already been shown by the time this returns; the exit
/// code only reports success or failure.
pub async fn submit(state: &AppState, args: SubmitArgs) -> Result<ExitCode> {
    let app = &state.app;
    let values = form_values(app, &args).await?;

    // 수동 자격 증명이 주어지면 세션 대신 사용
    let manual = match (args.token, args.credential_file) {
        (Some(token), _) => ManualCredential::Token(token),
        (None, Some(path)) => ManualCredential::File(path),
        (None, None) => ManualCredential::None,
    };
    if manual.is_present() {
        app.set_mode(CredentialMode::ManualToken);
        app.set_manual_credential(manual);
    }

    let refresher = app.spawn_refresh(state.config.session_refresh());
    let outcome = tokio::select! {
        outcome = app.submit(&values) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    refresher.abort();

    match outcome {
        Some(Ok(_)) => Ok(ExitCode::SUCCESS),
        Some(Err(Error::Busy)) => {
            eprintln!("{}", Error::Busy);
            Ok(ExitCode::FAILURE)
        }
        Some(Err(e)) => {
            tracing::debug!("Submission failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
        None => {
            eprintln!("Cancelled. The backend keeps working on the job.");
            Ok(ExitCode::from(130))
        }
    }
}
