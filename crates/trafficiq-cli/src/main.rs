mod config;
mod display;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use trafficiq_agent::{CancellationToken, Collaborators, Router, RunRequest};
use trafficiq_ai::MockPlateExtractor;
use trafficiq_core::{AgentResult, CaseStore, PipelineError};
use trafficiq_store::{InMemoryCaseStore, LocalCaseStore};

#[derive(Parser)]
#[command(name = "trafficiq", version, about = "Vehicle identification and case triage")]
struct Cli {
    /// Policy JSON file; documented defaults apply when omitted
    #[arg(long, env = "TRAFFICIQ_POLICY", global = true)]
    policy: Option<PathBuf>,

    /// Watchlist JSON file; the built-in demo table is used when omitted
    #[arg(long, env = "TRAFFICIQ_WATCHLIST", global = true)]
    watchlist: Option<PathBuf>,

    /// Plate extractor penalty JSON file; built-in penalties apply when omitted
    #[arg(long, env = "TRAFFICIQ_PLATE_PENALTIES", global = true)]
    plate_penalties: Option<PathBuf>,

    /// Directory for evidence artifacts and the case log
    #[arg(long, env = "TRAFFICIQ_ARTIFACTS", default_value = "./artifacts", global = true)]
    artifacts: PathBuf,

    /// Log level written to stderr (error, warn, info, debug, trace)
    #[arg(long, env = "TRAFFICIQ_LOG_LEVEL", default_value = "info", global = true)]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identify the vehicle in an image without opening a case
    Identify {
        image_uri: String,
        /// Print JSON instead of a card
        #[arg(long)]
        json: bool,
    },
    /// Run the full pipeline and open a case
    Run {
        image_uri: String,
        /// Where the image was captured
        #[arg(long)]
        location: Option<String>,
        /// Capture time, RFC 3339
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
        /// Cancel the run if it has not finished after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print JSON instead of a card
        #[arg(long)]
        json: bool,
    },
    /// List recent cases from the case log
    Cases {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn build_router(cli: &Cli, cases: Arc<dyn CaseStore>) -> anyhow::Result<Router> {
    let policy = config::load_policy(cli.policy.as_deref())?;
    let table = Arc::new(config::load_watchlist(cli.watchlist.as_deref())?);
    let penalties = config::load_plate_penalties(cli.plate_penalties.as_deref())?;

    let mut collaborators = Collaborators::mock(table, cases);
    collaborators.extractor = Arc::new(MockPlateExtractor::new(penalties)?);
    Router::new(policy, collaborators).context("initialising router")
}

/// Run the pipeline on a blocking task, cancelling it once `timeout` elapses.
///
/// The outer error is a task failure; the inner one is the pipeline's own.
async fn run_pipeline(
    router: Router,
    request: RunRequest,
    timeout: Option<Duration>,
) -> anyhow::Result<Result<AgentResult, PipelineError>> {
    let cancel = CancellationToken::new();
    let mut task = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || router.run_with_cancel(&request, &cancel))
    };

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "run timed out; cancelling");
                cancel.cancel();
                task.await
            }
        },
        None => task.await,
    };

    joined.context("pipeline task failed")
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .init();
    info!("trafficiq v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Identify { image_uri, json } => {
            let router = build_router(&cli, Arc::new(InMemoryCaseStore::new()?))?;
            let vehicle = match router.identify(image_uri) {
                Ok(v) => v,
                Err(e) => {
                    display::print_failure(&e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&vehicle)?);
            } else {
                display::print_vehicle(image_uri, &vehicle);
            }
        }
        Command::Run {
            image_uri,
            location,
            timestamp,
            timeout_ms,
            json,
        } => {
            if *timeout_ms == Some(0) {
                bail!("--timeout-ms must be greater than zero");
            }
            let store = LocalCaseStore::open(&cli.artifacts)
                .with_context(|| format!("opening artifacts at {}", cli.artifacts.display()))?;
            let router = build_router(&cli, Arc::new(store))?;

            let mut request = RunRequest::new(image_uri.clone());
            request.location = location.clone();
            request.timestamp = *timestamp;

            let outcome =
                run_pipeline(router, request, timeout_ms.map(Duration::from_millis)).await?;
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    display::print_failure(&e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                display::print_result(&result);
            }
        }
        Command::Cases { limit, json } => {
            let store = LocalCaseStore::open(&cli.artifacts)
                .with_context(|| format!("opening artifacts at {}", cli.artifacts.display()))?;
            let cases = store.list_cases(*limit)?;
            if *json {
                for c in &cases {
                    println!("{}", serde_json::to_string(c)?);
                }
            } else {
                display::print_cases(&cases);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "trafficiq",
            "--artifacts",
            "/tmp/tiq",
            "run",
            "cam/night_1.jpg",
            "--location",
            "I-95 NB",
            "--timestamp",
            "2026-03-01T12:00:00Z",
            "--timeout-ms",
            "500",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.artifacts, PathBuf::from("/tmp/tiq"));
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        match cli.command {
            Command::Run {
                image_uri,
                location,
                timestamp,
                timeout_ms,
                json,
            } => {
                assert_eq!(image_uri, "cam/night_1.jpg");
                assert_eq!(location.as_deref(), Some("I-95 NB"));
                assert_eq!(timestamp, Some("2026-03-01T12:00:00Z".parse().unwrap()));
                assert_eq!(timeout_ms, Some(500));
                assert!(!json);
            }
            _ => panic!("expected run"),
        }
    }

    #[tokio::test]
    async fn pipeline_runs_on_blocking_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalCaseStore::open(dir.path()).unwrap());
        let router = Router::new(
            trafficiq_core::Policy::default(),
            Collaborators::mock(Arc::new(trafficiq_ai::WatchlistTable::demo()), store.clone()),
        )
        .unwrap();
        let result = run_pipeline(
            router,
            RunRequest::new("gs://cams/i-95/0001.jpg"),
            Some(Duration::from_secs(30)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(store.list_cases(10).unwrap(), vec![result.case]);
    }

    #[tokio::test]
    async fn pipeline_failure_is_returned_to_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalCaseStore::open(dir.path()).unwrap());
        std::fs::create_dir(store.case_log_path()).unwrap();
        let router = Router::new(
            trafficiq_core::Policy::default(),
            Collaborators::mock(Arc::new(trafficiq_ai::WatchlistTable::demo()), store),
        )
        .unwrap();

        let outcome = run_pipeline(router, RunRequest::new("cam/1.jpg"), None).await.unwrap();
        let err = outcome.unwrap_err();
        assert!(
            matches!(err.error, trafficiq_core::StageError::Persistence { .. }),
            "{err:?}"
        );
        assert_eq!(err.trace.last(), Some(&trafficiq_core::Stage::CaseCreation));
    }

    #[test]
    fn plate_penalties_flag_reaches_the_router() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.json");
        std::fs::write(&path, r#"{ "night": 2.0 }"#).unwrap();
        let cli = Cli::try_parse_from([
            "trafficiq",
            "--plate-penalties",
            path.to_str().unwrap(),
            "identify",
            "cam/1.jpg",
        ])
        .unwrap();
        let cases = Arc::new(InMemoryCaseStore::new().unwrap());
        assert!(build_router(&cli, cases).is_err());
    }
}
