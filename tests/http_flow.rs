use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use promptweb::auth::{ManualClock, Navigator, OAuthConfig, ProviderSettings, SessionManager};
use promptweb::client::{HttpJobApi, JobApi, JobClient, PollPolicy};
use promptweb::error::{Error, PollError, SubmissionError};
use promptweb::form::{FormController, NoopFormView};
use promptweb::models::{
    CredentialMode, FormValues, JobKey, ManualCredential, PollResponse, Provider, RequestContext,
    Session, Submission, Tool,
};
use promptweb::presenter::{ResultPresenter, ResultView};
use promptweb::storage::{Cookie, MemoryFieldStore, MemorySessionStore, SessionStore};
use promptweb::PromptApp;

const NOW: i64 = 1_700_000_000;
const RESULT_MARKDOWN: &str = "# Result\n\nAll good <script>alert(1)</script>";

#[derive(Debug, Default)]
struct Recorded {
    query: Option<String>,
    body: Option<Value>,
    cookie: Option<String>,
    polls: usize,
}

#[derive(Clone, Default)]
struct Backend(Arc<Mutex<Recorded>>);

async fn create_job(
    State(backend): State<Backend>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let query = uri.query().unwrap_or_default().to_string();
    let mut recorded = backend.0.lock().unwrap();
    recorded.cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    recorded.body = Some(body);
    recorded.query = Some(query.clone());

    match query.as_str() {
        "prompt=reject" => (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response(),
        "prompt=broken" => "broken-job".into_response(),
        _ => "job-42".into_response(),
    }
}

async fn fetch_result(State(backend): State<Backend>, Path(key): Path<String>) -> Response {
    let mut recorded = backend.0.lock().unwrap();
    recorded.polls += 1;

    if key == "broken-job" {
        return (StatusCode::BAD_GATEWAY, "model crashed").into_response();
    }
    if recorded.polls <= 2 {
        return StatusCode::NOT_FOUND.into_response();
    }
    RESULT_MARKDOWN.into_response()
}

async fn spawn_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let router = Router::new()
        .route("/api/promptweb", post(create_job))
        .route("/api/results/:key", get(fetch_result))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, backend)
}

struct NoNavigation;

impl Navigator for NoNavigation {
    fn navigate(&self, _url: &str) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingView(Mutex<Vec<(&'static str, String)>>);

impl RecordingView {
    fn events(&self) -> Vec<(&'static str, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl ResultView for RecordingView {
    fn show_status(&self, text: &str) {
        self.0.lock().unwrap().push(("status", text.to_string()));
    }

    fn show_html(&self, html: &str) {
        self.0.lock().unwrap().push(("html", html.to_string()));
    }

    fn show_error(&self, text: &str) {
        self.0.lock().unwrap().push(("error", text.to_string()));
    }

    fn alert(&self, text: &str) {
        self.0.lock().unwrap().push(("alert", text.to_string()));
    }
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(20),
        max_wait: None,
    }
}

fn app(addr: SocketAddr, tool: Tool, cookies: MemorySessionStore, view: Arc<RecordingView>) -> PromptApp {
    let sessions = Arc::new(SessionManager::new(
        tool,
        OAuthConfig::for_provider(tool.provider(), &ProviderSettings::default()),
        Arc::new(cookies),
        Arc::new(ManualClock::new(NOW)),
        Arc::new(NoNavigation),
    ));
    let api = HttpJobApi::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    PromptApp::new(
        Arc::new(MemoryFieldStore::new()),
        sessions,
        FormController::new(Arc::new(NoopFormView)),
        JobClient::new(Arc::new(api), fast_policy()),
        ResultPresenter::with_view(view),
    )
}

#[tokio::test]
async fn test_http_api_treats_404_as_not_ready() {
    let (addr, backend) = spawn_backend().await;
    let api = HttpJobApi::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();

    let context = RequestContext::new(Tool::GoogleDocs, &FormValues::default());
    let submission = Submission::new("Summarize X".to_string(), context, Some("abc".to_string()));
    let key = api.create_job(&submission).await.unwrap();
    assert_eq!(key, JobKey::new("job-42"));

    assert_eq!(api.fetch_result(&key).await.unwrap(), PollResponse::NotReady);
    assert_eq!(api.fetch_result(&key).await.unwrap(), PollResponse::NotReady);
    assert_eq!(
        api.fetch_result(&key).await.unwrap(),
        PollResponse::Ready(RESULT_MARKDOWN.to_string())
    );

    let recorded = backend.0.lock().unwrap();
    assert_eq!(recorded.query.as_deref(), Some("prompt=Summarize%20X"));
    assert_eq!(recorded.cookie.as_deref(), Some("session=abc"));
    assert_eq!(recorded.polls, 3);
}

#[tokio::test]
async fn test_session_submission_end_to_end() {
    let (addr, backend) = spawn_backend().await;
    let cookie = Session::new("ya29.token", Some(NOW + 3600)).encode(Provider::Google);
    let cookies = MemorySessionStore::with_cookie(Cookie::new(cookie.clone()));
    let view = Arc::new(RecordingView::default());
    let app = app(addr, Tool::GoogleDocs, cookies, view.clone());

    let mut values = app.load(None).await;
    values.prompt = "Summarize X".to_string();
    values.custom_model = "llama3.2".to_string();

    let markdown = app.submit(&values).await.unwrap();
    assert_eq!(markdown, RESULT_MARKDOWN);

    {
        let recorded = backend.0.lock().unwrap();
        assert_eq!(recorded.query.as_deref(), Some("prompt=Summarize%20X"));
        assert_eq!(recorded.cookie.as_deref(), Some(format!("session={}", cookie).as_str()));
        assert_eq!(recorded.polls, 3);

        let body = recorded.body.as_ref().unwrap();
        assert_eq!(body["tool"], "GoogleDocs");
        assert_eq!(body["custom_model"], "llama3.2");
        assert_eq!(body["context_window"], "65536");
        assert_eq!(
            body["google_document_id"],
            "195j9eDD3ccgjQRttHhJPymLJUCOUjs-jmwTrekvdjFE"
        );
        assert!(body.get("google_access_token").is_none());
    }

    let events = view.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, "status");
    assert_eq!(events[1].0, "html");
    assert!(events[1].1.contains("<h1>Result</h1>"));
    assert!(events[1].1.contains("All good"));
    assert!(!events[1].1.contains("<script"));

    assert!(!app.form().is_locked());
    assert_eq!(app.history().list("GoogleDocs").await, vec!["Summarize X"]);
}

#[tokio::test]
async fn test_manual_token_end_to_end() {
    let (addr, backend) = spawn_backend().await;
    let view = Arc::new(RecordingView::default());
    let app = app(addr, Tool::SlackChannel, MemorySessionStore::new(), view.clone());

    app.set_mode(CredentialMode::ManualToken);
    app.set_manual_credential(ManualCredential::Token("xoxp-secret".to_string()));
    app.update_field("channel", "general").await.unwrap();

    app.submit(&app.load(None).await).await.unwrap();

    let recorded = backend.0.lock().unwrap();
    assert!(recorded.cookie.is_none());
    let body = recorded.body.as_ref().unwrap();
    assert_eq!(body["tool"], "SlackChannel");
    assert_eq!(body["slack_access_token"], "xoxp-secret");
    assert_eq!(body["slack_channel"], "general");
    assert_eq!(body["slack_days"], "7");
}

#[tokio::test]
async fn test_rejected_submission_shows_backend_text() {
    let (addr, backend) = spawn_backend().await;
    let view = Arc::new(RecordingView::default());
    let app = app(addr, Tool::SlackChannel, MemorySessionStore::new(), view.clone());
    app.set_mode(CredentialMode::ManualToken);
    app.set_manual_credential(ManualCredential::Token("xoxp-1".to_string()));

    let mut values = app.load(None).await;
    values.prompt = "reject".to_string();
    let err = app.submit(&values).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Submission(SubmissionError::Rejected { status: 500, .. })
    ));
    assert_eq!(backend.0.lock().unwrap().polls, 0);

    let events = view.events();
    assert_eq!(events.last().unwrap().0, "error");
    assert!(events.last().unwrap().1.contains("backend exploded"));
    assert!(!app.form().is_locked());
}

#[tokio::test]
async fn test_failed_poll_stops_and_reports() {
    let (addr, backend) = spawn_backend().await;
    let view = Arc::new(RecordingView::default());
    let app = app(addr, Tool::SlackChannel, MemorySessionStore::new(), view.clone());
    app.set_mode(CredentialMode::ManualToken);
    app.set_manual_credential(ManualCredential::Token("xoxp-1".to_string()));

    let mut values = app.load(None).await;
    values.prompt = "broken".to_string();
    let err = app.submit(&values).await.unwrap_err();

    assert!(matches!(err, Error::Poll(PollError::Failed { status: 502, .. })));
    assert_eq!(backend.0.lock().unwrap().polls, 1);
    assert!(view.events().last().unwrap().1.contains("model crashed"));
}

#[tokio::test]
async fn test_expired_session_never_reaches_backend() {
    let (addr, backend) = spawn_backend().await;
    let cookie = Session::new("ya29.token", Some(NOW - 1)).encode(Provider::Google);
    let cookies = MemorySessionStore::new();
    cookies.save(Cookie::new(cookie));
    let view = Arc::new(RecordingView::default());
    let app = app(addr, Tool::GoogleDocs, cookies, view.clone());

    assert!(!app.refresh_layout().submit_ready);
    let err = app.submit(&app.load(None).await).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(backend.0.lock().unwrap().query.is_none());
    assert_eq!(view.events()[0].0, "alert");
}
