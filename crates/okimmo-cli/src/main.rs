//! Okimmo CLI - terminal front end for the okimmo session library.
//!
//! Stands in for the mobile screens: login, registration, the signed-in
//! summary and logout. All session logic lives in `okimmo-core`.

mod prompt;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use okimmo_core::utils::{mask_token, preview_token, NOT_AVAILABLE};
use okimmo_core::{
    ApiClient, Config, Notice, Operation, RegistrationForm, Session, SessionState, StorageBackend,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directory for an optional rolling log file
const ENV_LOG_DIR: &str = "OKIMMO_LOG_DIR";

#[derive(Parser)]
#[command(name = "okimmo")]
#[command(version)]
#[command(about = "Sign in to okimmo and inspect the stored session")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides config and OKIMMO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where to keep the session
    #[arg(long, global = true)]
    storage: Option<StorageArg>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StorageArg {
    /// JSON file in the config directory
    File,
    /// OS keychain
    Keyring,
}

impl From<StorageArg> for StorageBackend {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::File => StorageBackend::File,
            StorageArg::Keyring => StorageBackend::Keyring,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Show whether a session is stored
    Status,

    /// Show the cached profile
    Whoami,

    /// Send an authenticated GET and print the JSON response
    Get { path: String },

    /// Forget the stored session
    #[command(alias = "signout")]
    Logout,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match std::env::var_os(ENV_LOG_DIR) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "okimmo.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

struct App {
    config: Config,
    api: ApiClient,
    session: Session,
}

fn build_app(cli: &Cli) -> Result<App> {
    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    let backend = cli.storage.map(StorageBackend::from).unwrap_or_else(|| config.storage());
    let store = Config::open_backend(backend).context("Failed to open session storage")?;

    let base_url = cli.api_url.clone().unwrap_or_else(|| config.api_base_url());
    let api = ApiClient::with_timeout(&base_url, store, config.request_timeout())
        .context("Failed to create API client")?;
    let session = Session::from_api(&api);

    Ok(App { config, api, session })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose);
    info!("okimmo starting");

    let mut app = build_app(&cli)?;

    let ok = match &cli.command {
        Commands::Login { email } => cmd_login(&mut app, email.clone()).await?,
        Commands::Register { name, email } => {
            cmd_register(&mut app, name.clone(), email.clone()).await?
        }
        Commands::Status => cmd_status(&app),
        Commands::Whoami => cmd_whoami(&app),
        Commands::Get { path } => cmd_get(&app, path).await,
        Commands::Logout => cmd_logout(&app),
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn show(notice: &Notice) {
    eprintln!("{}", notice);
}

/// Mirrors the login screen: skip straight through when already signed in.
fn already_signed_in(app: &App) -> bool {
    if app.session.state() == SessionState::Authenticated {
        show(&Notice::info("Already logged in. Use 'okimmo logout' to sign out first."));
        true
    } else {
        false
    }
}

fn remember_email(app: &mut App, email: &str) {
    app.config.last_email = Some(email.trim().to_string());
    if let Err(e) = app.config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

async fn cmd_login(app: &mut App, email: Option<String>) -> Result<bool> {
    if already_signed_in(app) {
        return Ok(true);
    }

    let email = match email {
        Some(email) => email,
        None => prompt::line_with_default("Email", app.config.last_email.as_deref())?,
    };
    let password = prompt::password("Password: ")?;

    eprintln!("Signing in...");
    match app.session.login(&email, &password).await {
        Ok(profile) => {
            remember_email(app, &email);
            show(&Notice::success(format!("Login successful. Welcome, {}", profile.name)));
            Ok(true)
        }
        Err(e) => {
            warn!(error = %e, "Login failed");
            show(&Notice::from_error(&e, Operation::Login));
            Ok(false)
        }
    }
}

async fn cmd_register(
    app: &mut App,
    name: Option<String>,
    email: Option<String>,
) -> Result<bool> {
    if already_signed_in(app) {
        return Ok(true);
    }

    let name = match name {
        Some(name) => name,
        None => prompt::line("Full name")?,
    };
    let email = match email {
        Some(email) => email,
        None => prompt::line("Email")?,
    };
    let form = RegistrationForm {
        name,
        email,
        password: prompt::password("Password: ")?,
        password_confirmation: prompt::password("Confirm password: ")?,
    };

    eprintln!("Creating account...");
    match app.session.register(&form).await {
        Ok(profile) => {
            remember_email(app, &form.email);
            show(&Notice::success(format!("Registration successful. Welcome, {}", profile.name)));
            Ok(true)
        }
        Err(e) => {
            warn!(error = %e, "Registration failed");
            show(&Notice::from_error(&e, Operation::Register));
            Ok(false)
        }
    }
}

fn cmd_status(app: &App) -> bool {
    match app.session.state() {
        SessionState::Authenticated => {
            println!("Logged in");
            println!("Token: {}", mask_token(app.session.access_token().as_deref()));
            true
        }
        SessionState::Unauthenticated => {
            println!("Not logged in. Run 'okimmo login' or 'okimmo register'.");
            false
        }
    }
}

fn cmd_whoami(app: &App) -> bool {
    if app.session.state() == SessionState::Unauthenticated {
        show(&Notice::warning("Not logged in"));
        return false;
    }

    match app.session.profile() {
        Some(profile) => {
            println!("Name:         {}", profile.name);
            println!("Email:        {}", profile.email);
            println!("Member since: {}", profile.member_since());
        }
        None => {
            println!("Name:         User");
            println!("Email:        {}", NOT_AVAILABLE);
        }
    }
    let token = app.session.access_token();
    println!(
        "Token:        {}",
        token
            .as_deref()
            .map(preview_token)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    );
    true
}

async fn cmd_get(app: &App, path: &str) -> bool {
    match app.api.get::<serde_json::Value>(path).await {
        Ok(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(pretty) => println!("{}", pretty),
                Err(_) => println!("{}", value),
            }
            true
        }
        Err(e) => {
            warn!(error = %e, path, "Request failed");
            show(&Notice::from_error(&e, Operation::Request));
            false
        }
    }
}

fn cmd_logout(app: &App) -> bool {
    match app.session.logout() {
        Ok(()) => {
            show(&Notice::success("Logged out"));
            true
        }
        Err(e) => {
            show(&Notice::error(format!("Failed to clear session: {}", e)));
            false
        }
    }
}
