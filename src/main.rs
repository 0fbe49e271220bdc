use std::process;

use gen_core::{RunOutcome, RunRequest};
use genflow::logging::init_logging;
use genflow::{assemble, run_config, select_generator, AppConfig, AppError, CliArgs, DEFAULT_SEED};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = run().await {
        error!("{e}");
        process::exit(e.exit_code());
    }
}

async fn run() -> Result<(), AppError> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    let config = AppConfig::from_env()?;
    let engine = assemble(&config, select_generator(&config.generator)?);
    let request = RunRequest { seed: args.seed.unwrap_or(DEFAULT_SEED),
                               choice: args.choice };

    match engine.run(request, run_config(&engine)).await? {
        RunOutcome::AwaitingChoice { candidates, .. } => {
            println!("candidates:");
            for (i, c) in candidates.iter().enumerate() {
                println!("  {i}: {} ({}) ({})",
                         c["title"].as_str().unwrap_or("?"),
                         c["topic"].as_str().unwrap_or("?"),
                         c["voice"].as_str().unwrap_or("?"));
            }
            println!("run again with `genflow <choice>` to produce a video");
        }
        RunOutcome::Completed(report) => {
            info!("run {} done: {}", report.run_id, report.location.display());
            println!("{}", report.location.join("merged.mp4").display());
            println!("{}", serde_json::to_string_pretty(&report.stats).unwrap_or_default());
        }
    }
    Ok(())
}
