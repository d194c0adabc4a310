//! webprobe CLI - authentication checks and endpoint traversal from an API description

mod report;

use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use webprobe_core::{Config, loader};
use webprobe_runner::{ExerciseError, Exerciser, ReqwestTransport};

use report::EndpointResult;

const EXIT_TOOL_ERROR: u8 = 3;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "webprobe")]
#[command(about = "Exercise an HTTP API straight from its OpenAPI / Swagger description")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every secured endpoint rejects anonymous calls with 401
    Auth {
        /// Config file (default: .webprobe.toml)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Call every endpoint once with the configured headers
    Traverse {
        /// Config file (default: .webprobe.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Exit with 1 when any endpoint answers 5xx
        #[arg(long)]
        fail_on_server_error: bool,
    },

    /// Initialize config file
    Init,

    /// Check config and API description
    Doctor,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_TOOL_ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Token cancelled on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, abandoning the request in flight");
            token.cancel();
        }
    });
    cancel
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let cfg = match path {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::load_default()?,
    };
    Ok(cfg)
}

fn build_exerciser(cfg: &Config) -> Result<Exerciser> {
    tracing::debug!(
        spec = %cfg.spec.display(),
        values = cfg.values.len(),
        bodies = cfg.bodies.len(),
        "building exerciser"
    );
    let mut exerciser = Exerciser::from_path(&cfg.spec)?;
    if let Some(hook) = cfg.parameter_hook() {
        exerciser = exerciser.with_parameter_hook(hook);
    }
    if let Some(hook) = cfg.body_hook() {
        exerciser = exerciser.with_body_hook(hook);
    }
    Ok(exerciser)
}

fn http_transport(cfg: &Config) -> Result<ReqwestTransport> {
    ReqwestTransport::with_timeout(&cfg.base_url, Duration::from_secs(cfg.timeout_secs))
        .context("cannot create HTTP client")
}

fn print_config(cfg: &Config, with_headers: bool) {
    eprintln!("Config:");
    eprintln!("  spec:     {}", cfg.spec.display());
    eprintln!("  base_url: {}", cfg.base_url);
    if with_headers && !cfg.headers.is_empty() {
        eprintln!("  headers:  {} configured", cfg.headers.len());
    }
    eprintln!();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Auth { config } => {
            let cfg = load_config(config.as_deref())?;
            if cli.output != OutputFormat::Silent {
                print_config(&cfg, false);
            }

            let exerciser = build_exerciser(&cfg)?;
            // Anonymous by definition: configured headers are never sent here
            let transport = http_transport(&cfg)?;
            let cancel = cancel_on_ctrl_c();
            let start = Instant::now();

            let (requests, failure) = match exerciser
                .verify_secured_endpoints_require_authentication(&transport, &cancel)
                .await
            {
                Ok(summary) => (Some(summary.requests_sent), None),
                Err(ExerciseError::Verification(failure)) => (None, Some(failure)),
                Err(ExerciseError::Cancelled) => return Ok(EXIT_INTERRUPTED),
                Err(e) => return Err(e.into()),
            };
            let exit_code = i32::from(failure.is_some());

            match cli.output {
                OutputFormat::Terminal => match (&failure, requests) {
                    (Some(failure), _) => {
                        println!("FAIL: {failure}");
                        println!("  Exit code: {exit_code}");
                    }
                    (None, Some(0) | None) => {
                        println!("PASS: no secured operations declared, nothing to check");
                    }
                    (None, Some(requests)) => {
                        println!("PASS: {requests} secured endpoints rejected anonymous calls");
                        println!("  Duration: {:.2}s", start.elapsed().as_secs_f64());
                    }
                },
                OutputFormat::Json => {
                    let json = report::auth_json(requests, failure.as_ref(), exit_code);
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(exit_code)
        }

        Commands::Traverse {
            config,
            fail_on_server_error,
        } => {
            let cfg = load_config(config.as_deref())?;
            if cli.output != OutputFormat::Silent {
                print_config(&cfg, true);
            }

            let exerciser = build_exerciser(&cfg)?;
            let transport = http_transport(&cfg)?.with_headers(cfg.headers.clone());
            let cancel = cancel_on_ctrl_c();
            let start = Instant::now();

            let output = cli.output;
            let mut results: Vec<EndpointResult> = Vec::new();
            let outcome = exerciser
                .exercise_all_endpoints(
                    &transport,
                    |endpoint, response| {
                        let result = EndpointResult::new(endpoint, response);
                        if output == OutputFormat::Terminal {
                            println!("  {}", result.line());
                        }
                        results.push(result);
                        Ok(())
                    },
                    &cancel,
                )
                .await;

            match outcome {
                Ok(_) => {}
                Err(ExerciseError::Cancelled) => return Ok(EXIT_INTERRUPTED),
                Err(e) => return Err(e.into()),
            }

            let server_errors = results.iter().filter(|r| r.is_server_error()).count();
            let exit_code = i32::from(fail_on_server_error && server_errors > 0);

            match cli.output {
                OutputFormat::Terminal => {
                    let dist = report::status_distribution(&results);
                    println!(
                        "\n{}: {} requests in {:.2}s",
                        if exit_code == 0 { "DONE" } else { "FAIL" },
                        results.len(),
                        start.elapsed().as_secs_f64()
                    );
                    if !dist.is_empty() {
                        println!("  Status: {}", report::format_distribution(&dist));
                    }
                    if server_errors > 0 {
                        println!("  Server errors: {server_errors}");
                    }
                }
                OutputFormat::Json => {
                    let json = report::traverse_json(&results, exit_code);
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(exit_code)
        }

        Commands::Init => {
            let config_path = ".webprobe.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI / Swagger description");
            println!("  - base_url: server to test");
            println!("  - headers: credentials for `webprobe traverse`");
            println!("  - values: path parameter and body property values");
            Ok(0)
        }

        Commands::Doctor => {
            println!("webprobe doctor");
            println!("===============\n");

            let cfg = match Config::load_default() {
                Ok(cfg) => {
                    println!("[OK] Config file");
                    cfg
                }
                Err(e) => {
                    println!("[NG] Config file: {e}");
                    return Ok(1);
                }
            };

            match loader::load_path(&cfg.spec) {
                Ok(document) => {
                    println!("[OK] API description ({})", cfg.spec.display());
                    println!(
                        "     {} operations, {} secured",
                        document.operation_count(),
                        document.secured_operation_count()
                    );
                }
                Err(e) => {
                    println!("[NG] API description ({}): {e}", cfg.spec.display());
                    println!("\nCreate config file:");
                    println!("  webprobe init");
                    return Ok(1);
                }
            }

            println!("\nReady to exercise {}", cfg.base_url);
            Ok(0)
        }
    }
}
