use std::{fs, path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use bakeoff::{
    catalog,
    report::{self, rank_badge, score_band, ScoreBand},
    ApiKeys, BakeoffConfig, CredentialSource, CredentialStore, EngineEvent, EngineSettings,
    EvaluationEngine, InMemoryGateway, JsonFileStore, NoopSink, NotificationSink, RunOutcome,
    RunSummary, WebhookEvent, WebhookNotifier,
};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long queued webhook deliveries may hold up exit.
const WEBHOOK_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "bakeoff")]
#[command(about = "Compare AI agents and models on weighted evaluation criteria")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate every selected agent and print the ranking
    Run(RunArgs),
    /// Print the advisory duration of a configuration
    Estimate {
        /// Bake-off configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(ClapArgs)]
struct RunArgs {
    /// Bake-off configuration (YAML, or JSON by extension)
    #[arg(short, long)]
    config: PathBuf,

    /// Display name for the run
    #[arg(long)]
    name: Option<String>,

    /// JSON settings file holding `bakeoff_api_keys` (falls back to *_API_KEY env vars)
    #[arg(long)]
    keys_file: Option<PathBuf>,

    /// Send webhook notifications; without a value the stored or default URL is used
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    webhook: Option<String>,

    /// Skip the pause after demo-mode agents
    #[arg(long)]
    no_delay: bool,

    /// Fixed seed for reproducible scores
    #[arg(long)]
    seed: Option<u64>,

    /// Write results to this file
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "json")]
    format: ExportFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,bakeoff=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Estimate { config } => {
            let config = BakeoffConfig::from_path(&config)?;
            println!(
                "{} agents x {} tests ({:?}): ~{} min",
                config.target_count(),
                config.selected_tests.len(),
                config.complexity,
                config.estimated_minutes()
            );
            for test in &config.selected_tests {
                println!("  - {}", catalog::test_label(test));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = BakeoffConfig::from_path(&args.config)?;

    let store = args.keys_file.as_ref().map(|path| CredentialStore::new(JsonFileStore::new(path)));
    let credentials: Arc<dyn CredentialSource> = match &store {
        Some(store) if store.has_any_api_key() => Arc::new(store.api_keys()),
        _ => Arc::new(ApiKeys::from_env()),
    };

    let notifier = match args.webhook.as_deref() {
        Some(url) if !url.trim().is_empty() => Some(WebhookNotifier::new(url)?),
        Some(_) => {
            let url = store
                .as_ref()
                .map(|store| store.webhook_url())
                .unwrap_or_else(|| bakeoff::credentials::DEFAULT_WEBHOOK_URL.to_string());
            Some(WebhookNotifier::new(url)?)
        }
        None => None,
    };
    let sink: Arc<dyn NotificationSink> = match &notifier {
        Some(notifier) => Arc::new(notifier.clone()),
        None => Arc::new(NoopSink),
    };

    let gateway = Arc::new(InMemoryGateway::new());
    let record = gateway.create_bakeoff(config.clone(), args.name.clone()).await;

    let settings = if args.no_delay {
        EngineSettings::immediate()
    } else {
        EngineSettings::default()
    };
    let mut engine = EvaluationEngine::new(gateway.clone())
        .with_credentials(credentials)
        .with_notifier(sink)
        .with_settings(settings);
    if let Some(seed) = args.seed {
        engine = engine.with_seed(seed);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling after the current agent");
            on_interrupt.cancel();
        }
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<EngineEvent>();
    let printer = tokio::spawn(async move {
        let mut last_percent = None;
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::Log(line) => {
                    println!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), line)
                }
                EngineEvent::Progress { percent, .. } if last_percent != Some(percent) => {
                    last_percent = Some(percent);
                    println!("[{percent:>3}%]");
                }
                EngineEvent::Error(message) => eprintln!("error: {message}"),
                _ => {}
            }
        }
    });

    println!("{} ({})", record.name, record.id);
    let outcome = engine.run(&record.id, &config, &tx, &cancel).await;
    drop(tx);
    let _ = printer.await;

    let code = report_outcome(&args, &gateway, notifier.as_ref(), &record.id, outcome?).await;
    if let Some(notifier) = &notifier {
        notifier.flush(WEBHOOK_FLUSH_TIMEOUT).await;
    }
    code
}

async fn report_outcome(
    args: &RunArgs,
    gateway: &InMemoryGateway,
    notifier: Option<&WebhookNotifier>,
    run_id: &str,
    outcome: RunOutcome,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match outcome {
        RunOutcome::Completed { .. } => {
            let results = gateway.get_results(run_id).await;
            print_ranking(&results);

            if let Some(path) = &args.out {
                let body = match args.format {
                    ExportFormat::Json => report::to_json(&results)?,
                    ExportFormat::Csv => report::to_csv(&results),
                };
                fs::write(path, body)?;
                println!("\nResults written to {}", path.display());

                if let Some(notifier) = notifier {
                    let summary = RunSummary::from_results(run_id, results.len(), &results);
                    if let Err(err) = notifier.deliver(WebhookEvent::ResultsExported, &summary).await {
                        tracing::warn!(error = %err, "failed to send export webhook");
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Cancelled => {
            eprintln!("Bake-off cancelled; no results were saved.");
            Ok(ExitCode::from(130))
        }
        RunOutcome::Failed { message } => {
            eprintln!("Bake-off failed: {message}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_ranking(results: &[bakeoff::ResultRecord]) {
    println!();
    for ranked in report::rank_results(results) {
        let record = ranked.record;
        let band = match score_band(record.overall_score) {
            ScoreBand::High => "high",
            ScoreBand::Medium => "medium",
            ScoreBand::Low => "low",
        };
        println!(
            "{:>4}  {:<40} {:>5.1} ({band})  {:>6} ms",
            rank_badge(ranked.rank),
            record.agent_name,
            record.overall_score,
            record.execution_time_ms
        );

        let strengths = report::strengths(&record.criteria_scores);
        if !strengths.is_empty() {
            println!("      excels at {}", strengths.join(", "));
        }
        let weaknesses = report::weaknesses(&record.criteria_scores);
        if !weaknesses.is_empty() {
            println!("      could improve in {}", weaknesses.join(", "));
        }
    }
}
