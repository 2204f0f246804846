use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use promptweb::commands::{self, AppState, SubmitArgs, TerminalResultView};
use promptweb::models::Tool;
use promptweb::AppConfig;

#[derive(Parser)]
#[command(name = "promptweb", version, about = "Submit prompts to the summarizer backend")]
struct Cli {
    /// Tool whose form to use (google-docs, slack-channel)
    #[arg(long, short, global = true, default_value = "google-docs")]
    tool: Tool,

    /// Config file (defaults to $PROMPTWEB_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the session state
    Status,
    /// Open the provider's login page
    Login,
    /// Manage the session cookie
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Forget the session
    Logout,
    /// Save a form field
    Set { field: String, value: String },
    /// Print the saved form fields
    Show {
        /// Prompt shown when none has been saved
        #[arg(long)]
        default_prompt: Option<String>,
    },
    /// List recent prompts, or reuse one
    History {
        /// Copy entry N into the prompt field
        #[arg(long = "use", value_name = "N")]
        use_entry: Option<usize>,
    },
    /// Submit the prompt and wait for the result
    Submit {
        /// Prompt to submit; saved like an edit
        #[arg(long)]
        prompt: Option<String>,
        /// Prompt used when none has been saved
        #[arg(long)]
        default_prompt: Option<String>,
        /// Access token used instead of the session
        #[arg(long, conflicts_with = "credential_file")]
        token: Option<String>,
        /// Credential file used instead of the session
        #[arg(long)]
        credential_file: Option<PathBuf>,
        #[arg(long)]
        argument_debugging: bool,
        /// Write the HTML result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Store the cookie delivered by the login callback
    Import { cookie: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // 로깅 초기화 (콘솔 + 파일)
    let log_dir = config.log_dir();

    // 로그 디렉토리 생성
    let _ = std::fs::create_dir_all(&log_dir);

    // 파일 로거 설정 (일별 회전)
    let file_appender = tracing_appender::rolling::daily(&log_dir, "promptweb.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // 콘솔은 경고 이상만, 파일은 EnvFilter 기준
    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::filter::LevelFilter::WARN),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(non_blocking)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                ),
        )
        .init();

    tracing::info!("promptweb starting... Log file: {:?}", log_dir.join("promptweb.log"));

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<ExitCode> {
    let output = match &cli.command {
        Command::Submit { output, .. } => output.clone(),
        _ => None,
    };
    let view = Arc::new(TerminalResultView::new(output));
    let state = AppState::init(config, cli.tool, view).await?;

    let code = match cli.command {
        Command::Status => commands::status(&state).await.map(|_| ExitCode::SUCCESS),
        Command::Login => commands::login(&state).await.map(|_| ExitCode::SUCCESS),
        Command::Session {
            action: SessionAction::Import { cookie },
        } => commands::import_session(&state, &cookie)
            .await
            .map(|_| ExitCode::SUCCESS),
        Command::Logout => commands::logout(&state).await.map(|_| ExitCode::SUCCESS),
        Command::Set { field, value } => commands::set_field(&state, &field, &value)
            .await
            .map(|_| ExitCode::SUCCESS),
        Command::Show { default_prompt } => commands::show(&state, default_prompt.as_deref())
            .await
            .map(|_| ExitCode::SUCCESS),
        Command::History { use_entry } => commands::history(&state, use_entry)
            .await
            .map(|_| ExitCode::SUCCESS),
        Command::Submit {
            prompt,
            default_prompt,
            token,
            credential_file,
            argument_debugging,
            output: _,
        } => {
            let args = SubmitArgs {
                prompt,
                default_prompt,
                token,
                credential_file,
                argument_debugging,
            };
            commands::submit(&state, args).await
        }
    };

    state.db.close().await;
    code
}
