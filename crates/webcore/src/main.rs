mod deps;
mod logging;
mod modules;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;

use webcore_auth::ApiKeyAuthentication;
use webcore_core::auth::AuthRequest;
use webcore_core::config::{AppConfig, ConfigLoader};
use webcore_core::kernel::bootstrap::Application;
use webcore_core::kernel::error::{Error, Result};
use webcore_core::library_system::LibraryRegistry;
use webcore_core::module_system::Module;

use crate::logging::LogFormat;
use crate::modules::StatusModule;

/// Webcore: library lifecycle manager for service applications
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Log filter, e.g. `debug` or `webcore_core=trace` (default: RUST_LOG, then warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered library loaders
    Libraries,
    /// Boot the application once, report the materialized libraries and shut down
    Check {
        /// Configuration file (default: ./config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the authentication chain for one request
    Auth {
        /// API key sent with the request
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: String,
        /// Configuration file (default: ./config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = logging::init(args.log_level.as_deref(), args.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Libraries => {
            let registry = LibraryRegistry::new(deps::loaders());
            for name in registry.loader_names() {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { config } => check(load_config(config)?).await,
        Commands::Auth {
            key,
            method,
            path,
            config,
        } => {
            let config = load_config(config)?;
            let header = config.auth.header.clone();
            let request = AuthRequest::new(method, path).with_header(&header, key);
            auth(config, request).await
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::with_default_file(),
    };
    info!("Loading configuration ({:?})", loader.path());
    Ok(loader.load::<AppConfig>()?)
}

async fn check(config: AppConfig) -> Result<ExitCode> {
    let status = Arc::new(StatusModule::new());
    let modules: Vec<Arc<dyn Module>> = vec![status.clone()];
    let mut app = Application::new(config, deps::loaders(), modules)?;

    app.start().await?;
    for key in app.registry().loaded_keys().await {
        println!("loaded {}", key);
    }
    for line in status.report() {
        println!("{}", line);
    }
    app.shutdown().await?;
    println!("ok");
    Ok(ExitCode::SUCCESS)
}

async fn auth(config: AppConfig, request: AuthRequest) -> Result<ExitCode> {
    let mut app = Application::new(config, deps::loaders(), Vec::new())?;
    app.start().await?;

    let outcome = match ApiKeyAuthentication::load(app.context()).await {
        Ok(authn) => Ok(authn.check(&request).await),
        Err(e) => Err(e),
    };
    app.shutdown().await?;

    match outcome? {
        Ok(identity) => {
            println!("{}", to_json(&identity)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(denied) => {
            println!("{}", to_json(&denied)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Other(format!("cannot render output: {}", e)))
}
