use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_relay::cli::{Cli, Commands};
use audio_relay::config::Config;
use audio_relay::pipeline::Pipeline;
use audio_relay::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);

    let mut config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Convert {
            urls,
            strategy,
            keep_work_dir,
        } => {
            // Check for required external dependencies (non-fatal in Docker)
            let missing_deps = utils::check_dependencies(&config.tools).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - tools may be available)");
            }

            config.app.keep_work_dir |= keep_work_dir;
            let strategy = strategy.unwrap_or(config.app.default_strategy);
            let pipeline = Pipeline::new(config).await?;

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                let progress = ProgressBar::new_spinner();
                progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
                progress.enable_steady_tick(Duration::from_millis(120));
                progress
            };
            progress.set_message(format!("Converting {} video(s) via {}...", urls.len(), strategy));

            let results = futures_util::future::join_all(urls.iter().map(|url| pipeline.run(url, strategy))).await;
            progress.finish_and_clear();

            let mut failures = 0;
            for (url, result) in urls.iter().zip(results) {
                match result {
                    Ok(link) => println!("{}", link),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: {}", url, e);
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{} of {} conversion(s) failed", failures, urls.len());
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Edit it to set the storage bucket and tool paths.");
            }
        }
        Commands::Check => {
            let missing = utils::check_dependencies(&config.tools).await;
            if missing.is_empty() {
                println!("All external tools are available.");
            } else {
                for dep in &missing {
                    println!("  • missing: {}", dep);
                }
                anyhow::bail!("{} external tool(s) unavailable", missing.len());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "audio_relay=debug" } else { "audio_relay=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so stdout carries only the links
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
