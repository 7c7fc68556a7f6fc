//! mocklet - CLI entry point
//!
//! Dry-run tooling for mock configuration files: validate a file, list
//! the handlers it would install, or resolve a single request against it.

use anyhow::Result;
use clap::{Parser, Subcommand};
use mocklet::{Engine, HttpMethod, MockConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mocklet",
    about = "Development-time HTTP mocking - inspect and dry-run mock configurations",
    version
)]
struct Args {
    /// Path to a JSON or YAML configuration file
    #[arg(short, long, default_value = "mocklet.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and exit
    Validate,
    /// List the handlers the configuration would install
    List,
    /// Resolve one request against the configuration, honoring delays
    Resolve {
        /// HTTP method (GET, POST, ...)
        method: HttpMethod,
        /// Request path, e.g. /api/users/42
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = MockConfig::from_file(&args.config)?;

    match args.command {
        Command::Validate => {
            let problems = config.validate();
            if problems.is_empty() {
                println!(
                    "Configuration is valid ({} API(s) defined)",
                    config.apis.len()
                );
                Ok(())
            } else {
                for (api_id, error) in &problems {
                    eprintln!("API `{api_id}`: {error}");
                }
                anyhow::bail!("{} invalid API definition(s)", problems.len());
            }
        }

        Command::List => {
            let engine = Engine::new();
            let report = engine
                .rebuild(&config.apis, &config.settings.base_path)
                .await;
            for api in &config.apis {
                let state = if !api.is_enabled {
                    "disabled"
                } else if api.resolved_active_case().is_some() {
                    "active"
                } else {
                    "no active case"
                };
                println!("{:7} {:40} [{state}]", api.method.as_str(), api.path);
            }
            println!("{report}");
            Ok(())
        }

        Command::Resolve { method, path } => {
            let engine = Engine::new();
            let report = engine
                .rebuild(&config.apis, &config.settings.base_path)
                .await;
            for (api_id, error) in &report.errors {
                eprintln!("warning: API `{api_id}` skipped: {error}");
            }

            match engine.resolve(method, &path).await {
                Some(resolved) => {
                    if resolved.delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(resolved.delay_ms)).await;
                    }
                    println!("matched: {} (case {})", resolved.api_id, resolved.case_id);
                    println!("status: {}", resolved.status);
                    for (name, value) in &resolved.headers {
                        println!("{name}: {value}");
                    }
                    println!("{}", serde_json::to_string_pretty(&resolved.body)?);
                    Ok(())
                }
                None => {
                    println!("no mock matched {method} {path}; request would pass through");
                    Ok(())
                }
            }
        }
    }
}
