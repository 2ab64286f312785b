use birthday_notifier::app::{build_orchestrator, check::run_check};
use birthday_notifier::config::cli::parse_now;
use birthday_notifier::config::Command;
use birthday_notifier::core::clock::{FixedClock, SystemClock};
use birthday_notifier::domain::ports::Clock;
use birthday_notifier::utils::{logger, validation::Validate};
use birthday_notifier::{CliConfig, NotifierError};
use clap::Parser;

fn exit_with(e: &NotifierError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting birthday-notifier");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    match cli.command() {
        Command::Run { dry_run, now } => {
            let clock: Box<dyn Clock> = match now.as_deref().map(parse_now).transpose() {
                Ok(Some(now)) => Box::new(FixedClock::new(now)),
                Ok(None) => Box::new(SystemClock),
                Err(e) => exit_with(&e),
            };
            if dry_run {
                tracing::info!("🔍 Dry run: messages are logged, not sent");
            }

            let mut orchestrator = match build_orchestrator(&config, clock, dry_run) {
                Ok(orchestrator) => orchestrator,
                Err(e) => exit_with(&e),
            };

            match orchestrator.run().await {
                Ok(summary) => {
                    println!("✅ Birthday run completed: {}", summary);
                    for failure in summary.failures() {
                        println!(
                            "   ⚠️ {} ({}, {}): {}",
                            failure.customer_name,
                            failure.customer_id,
                            failure.time_frame,
                            failure.error_detail.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
                Err(e) => exit_with(&e),
            }
        }
        Command::Check { send_test } => {
            let report = run_check(&config, send_test).await;
            print!("{}", report);
            if !report.is_ok() {
                std::process::exit(1);
            }
            println!("🎉 All checks passed!");
        }
    }

    Ok(())
}
