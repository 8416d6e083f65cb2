use agit_core::Settings;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agit", about = "Assistants API backed by a git repository")]
struct Cli {
    /// Repository to serve; overrides AGIT_REPO_PATH.
    #[arg(long, global = true)]
    repo: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the OpenAPI document.
    Openapi,
    /// Print the effective settings.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Openapi => {
            println!("{}", agit_serve::openapi::generate_spec());
            ExitCode::SUCCESS
        }
        Command::Config => match load_settings(cli.repo) {
            Ok(settings) => {
                println!("{settings:#?}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("config error: {err}");
                ExitCode::FAILURE
            }
        },
        Command::Serve { bind, port } => {
            init_tracing();
            let mut settings = match load_settings(cli.repo) {
                Ok(settings) => settings,
                Err(err) => {
                    error!(error = %err, "invalid configuration");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            match serve(settings).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(message) => {
                    error!(%message, "server stopped");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("agit=info,agit_core=info,agit_serve=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(repo: Option<PathBuf>) -> Result<Settings, agit_core::error::ConfigError> {
    let repo = repo.map(|path| path.to_string_lossy().into_owned());
    Settings::load_with(|key| match (key, &repo) {
        ("AGIT_REPO_PATH", Some(path)) => Some(path.clone()),
        _ => std::env::var(key).ok(),
    })
}

async fn serve(settings: Settings) -> Result<(), String> {
    let addr: SocketAddr = format!("{}:{}", settings.bind, settings.port)
        .parse()
        .map_err(|err| format!("invalid bind address {}:{}: {err}", settings.bind, settings.port))?;
    let state = agit_serve::AppState::open(&settings).map_err(|err| err.to_string())?;
    info!(
        repo = %settings.repo_path.display(),
        working_branch = %settings.working_branch,
        "repository opened"
    );
    agit_serve::serve(state, addr)
        .await
        .map_err(|err| err.to_string())
}
