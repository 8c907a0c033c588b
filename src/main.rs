use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use highlight_clipper::cli::{Cli, Commands};
use highlight_clipper::config::Config;
use highlight_clipper::pipeline::{PipelineOrchestrator, RunRegistry, RunStatus};
use highlight_clipper::sources::SourceRegistry;
use highlight_clipper::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Run {
            source,
            instruction,
            output,
            format,
        } => {
            let config = Config::load()?;
            warn_missing_dependencies(&config).await;

            let orchestrator = PipelineOrchestrator::from_config(&config).await?;
            let progress = spinner(cli.quiet, format!("Clipping highlights from {}...", source));
            let started = Instant::now();

            let result = orchestrator.run(&source, instruction.as_deref()).await;
            progress.finish_and_clear();
            let result = result?;

            eprintln!(
                "{} {} of {} highlights published in {}",
                style("✔").green(),
                result.clips.len(),
                result.highlights.len(),
                utils::format_duration(started.elapsed().as_secs_f64())
            );

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format).await?;
                    println!("Result saved to: {}", path.display());
                }
                None => output::print_to_console(&result, &format)?,
            }
        }
        Commands::Batch {
            sources,
            instruction,
            poll_interval,
        } => {
            let config = Config::load()?;
            warn_missing_dependencies(&config).await;

            let orchestrator = Arc::new(PipelineOrchestrator::from_config(&config).await?);
            let registry = RunRegistry::new(orchestrator, config.app.max_concurrent_runs);

            let mut submitted = Vec::new();
            for source in sources {
                let id = registry.submit(source.clone(), instruction.clone()).await;
                println!("{} {} -> run {}", style("queued").cyan(), source, id);
                submitted.push((source, id));
            }

            let progress = spinner(cli.quiet, "Waiting for runs to finish...".to_string());
            let interval = Duration::from_secs(poll_interval.max(1));
            let mut failures = 0;

            for (source, id) in &submitted {
                progress.set_message(format!("Waiting for {}...", source));
                let finished = registry.wait(id, interval).await;
                registry.forget(id).await;
                match finished {
                    Some(RunStatus::Completed(result)) => {
                        progress.println(format!(
                            "{} {}: {} clips",
                            style("completed").green(),
                            source,
                            result.clips.len()
                        ));
                        for url in &result.clips {
                            progress.println(format!("    {}", url));
                        }
                    }
                    Some(RunStatus::Failed(reason)) => {
                        failures += 1;
                        progress.println(format!("{} {}: {}", style("failed").red(), source, reason));
                    }
                    other => {
                        failures += 1;
                        progress.println(format!(
                            "{} {}: unexpected status {}",
                            style("failed").red(),
                            source,
                            other.map(|s| s.label()).unwrap_or("unknown")
                        ));
                    }
                }
            }
            progress.finish_and_clear();

            if failures > 0 {
                anyhow::bail!("{} of {} runs failed", failures, submitted.len());
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save()?;
                println!("Default configuration written to: {}", path.display());
            } else {
                let config = Config::load()?;
                if show {
                    config.display();
                } else {
                    println!("Edit the configuration file to change settings:");
                    println!("  {}", Config::config_path()?.display());
                }
            }
        }
        Commands::Sources => {
            let registry = SourceRegistry::from_config(&Config::default());
            println!("Sources fetched before clipping:");
            for platform in registry.list_platforms() {
                println!("  • {}", platform);
            }
            println!("Any other reference is treated as a local file path.");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "highlight_clipper=debug"
    } else {
        "highlight_clipper=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

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

/// Check for required external tools (non-fatal, they may still resolve at run time)
async fn warn_missing_dependencies(config: &Config) {
    let missing =
        utils::check_dependencies(&config.extraction.ffmpeg_path, &config.app.yt_dlp_path).await;
    if !missing.is_empty() {
        eprintln!("{}  Dependency check warnings:", style("⚠️").yellow());
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(template);
    }
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
