use clap::Parser;
use network_regen::utils::error::PipelineError;
use network_regen::utils::logger;
use network_regen::utils::monitor::SystemMonitor;
use network_regen::{
    CliConfig, ConfigProvider, Identifier, LocalStorage, PipelineRunner, Progress,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting network-regen");
    tracing::debug!("CLI config: {:?}", cli);

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    let id = match Identifier::new(config.identifier()) {
        Ok(id) => id,
        Err(e) => fail(&e),
    };

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.working_dir());
    let monitor = Arc::new(SystemMonitor::new(cli.monitor));
    // with --json, stdout carries only the report
    let progress = if cli.json {
        Progress::Stderr
    } else {
        Progress::Stdout
    };
    let runner = PipelineRunner::from_config(&config, storage, monitor).with_progress(progress);

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be executed");
        let plan = runner.plan(&id);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            println!("Identifier: {}", plan.identifier);
            for (index, command) in plan.commands.iter().enumerate() {
                println!("Step {}: {}", index + 1, command);
            }
            println!("Expected CSV: {}", plan.artifacts.csv.display());
            println!("Expected JSON: {}", plan.artifacts.json.display());
        }
        return Ok(());
    }

    let outcome = tokio::select! {
        result = runner.run(&id) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping the running step");
            Err(PipelineError::Interrupted)
        }
    };

    match outcome {
        Ok(report) => {
            tracing::info!("✅ Network files ready for {}", report.identifier);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        Err(e) => fail(&e),
    }
}

fn fail(e: &PipelineError) -> ! {
    tracing::error!(
        "❌ Pipeline failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}
