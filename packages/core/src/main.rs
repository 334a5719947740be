use clap::Parser;

use warehouse_alarms::alarms::CHECK_NAMES;
use warehouse_alarms::cli::Cli;
use warehouse_alarms::config::{load_env_files, Config};
use warehouse_alarms::context::RunContext;
use warehouse_alarms::controller::{AlarmController, FailurePolicy};
use warehouse_alarms::error::AppError;
use warehouse_alarms::logging::{init_logging, LogFormat};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.list_checks {
        for name in CHECK_NAMES {
            println!("{}", name);
        }
        return;
    }

    let env_files = load_env_files();
    init_logging(LogFormat::from_env());
    if let Err(err) = env_files {
        tracing::warn!("{}", err);
    }

    if let Err(err) = run(cli).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()?;
    tracing::info!("Starting alarms with config: {:?}", config);

    let run_date = cli.date.unwrap_or_else(RunContext::yesterday_utc);
    let policy = if cli.fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::Isolate
    };

    let controller = AlarmController::from_config(&config, run_date)
        .await?
        .with_policy(policy)
        .select(&cli.checks)?;

    let report = controller.run_all_checks().await;
    if report.is_success() {
        Ok(())
    } else {
        Err(AppError::ChecksFailed(report.failed_checks()))
    }
}
