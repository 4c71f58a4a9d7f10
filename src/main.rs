use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File, FileFormat};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use devtrack::api::{AppState, create_router};
use devtrack::auth::{AuthService, TokenCodec};
use devtrack::config::{AppConfig, AuthConfig};
use devtrack::db::Database;
use devtrack::oauth::GithubClient;
use devtrack::user::UserRepository;

const APP_NAME: &str = "devtrack";
const ENV_PREFIX: &str = "DEVTRACK";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_serve(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging();
    debug!("config file: {}", ctx.config_file.display());

    match cli.command {
        Command::Serve(cmd) => async_serve(ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "DevTrack - developer activity tracker backend.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Inspect or bootstrap the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print a freshly generated JWT secret
    GenerateSecret,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    config_file: PathBuf,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let config_file = match common.config.clone() {
            Some(path) => path,
            None => default_config_file()?,
        };
        let config = load_config(&config_file)?;
        Ok(Self {
            common,
            config_file,
            config,
        })
    }

    fn init_logging(&self) {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        let level = if self.common.quiet {
            "error"
        } else {
            match self.common.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level},tower_http={level}")));

        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .ok();
        } else {
            let disable_color =
                std::env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(!disable_color))
                .try_init()
                .ok();
        }
    }
}

fn default_config_file() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| anyhow!("cannot determine config directory"))?;
    Ok(dir.join(APP_NAME).join("config.toml"))
}

fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::data_dir().ok_or_else(|| anyhow!("cannot determine data directory"))?;
    Ok(dir.join(APP_NAME).join(format!("{APP_NAME}.db")))
}

fn load_config(config_file: &Path) -> Result<AppConfig> {
    let built = Config::builder()
        .add_source(
            File::from(config_file)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .context("building configuration")?;

    built
        .try_deserialize()
        .context("deserializing configuration")
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                println!("{}", serde_json::to_string_pretty(&ctx.config)?);
            } else {
                println!("{}", toml::to_string_pretty(&ctx.config)?);
            }
            Ok(())
        }
        ConfigCommand::Init { force } => {
            if ctx.config_file.exists() && !force {
                return Err(anyhow!(
                    "{} already exists (use --force to overwrite)",
                    ctx.config_file.display()
                ));
            }
            if let Some(parent) = ctx.config_file.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating config directory {parent:?}"))?;
            }
            let toml = toml::to_string_pretty(&AppConfig::default())
                .context("serializing default config")?;
            fs::write(&ctx.config_file, toml)
                .with_context(|| format!("writing {}", ctx.config_file.display()))?;
            println!("wrote {}", ctx.config_file.display());
            Ok(())
        }
        ConfigCommand::GenerateSecret => {
            println!("{}", AuthConfig::generate_jwt_secret());
            Ok(())
        }
    }
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting DevTrack backend server...");

    ctx.config
        .auth
        .validate()
        .context("invalid auth configuration")?;
    let jwt_secret = ctx
        .config
        .auth
        .resolve_jwt_secret()?
        .ok_or_else(|| anyhow!("auth.jwt_secret is required"))?;

    let db_path = match &ctx.config.database.path {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {parent:?}"))?;
    }
    info!("Database path: {}", db_path.display());
    let database = Database::new(&db_path).await?;

    let users = UserRepository::new(database.pool().clone());
    let tokens = TokenCodec::new(
        &jwt_secret,
        ctx.config.auth.access_ttl_secs,
        ctx.config.auth.refresh_ttl_secs,
    );
    let auth = AuthService::new(users, tokens.clone());

    let github = if ctx.config.github.is_configured() {
        info!("GitHub login enabled");
        Some(GithubClient::new(&ctx.config.github)?)
    } else {
        info!("GitHub login not configured; federated sign-in disabled");
        None
    };

    let state = AppState::new(auth, tokens, github);
    let app = create_router(state, &ctx.config.server.allowed_origins);

    let host = cmd.host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = cmd.port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{host}:{port}").parse().context("invalid address")?;

    info!("Listening on http://{}", addr);
    let listener = TcpListener::bind(addr).await.context("binding to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
