use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use shared_utils::common_utils::ensure_dir_exists;
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::report::print_summary_report;
use vid_stealth::{Pipeline, StealthConfig};

#[derive(Parser)]
#[command(name = "vid-stealth")]
#[command(version, about = "Batch re-encoder for near-identical, metadata-scrubbed video copies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every video in the configured input directory
    Run {
        /// TOML configuration; built-in defaults when omitted
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Fixed RNG seed, overriding the config file
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write the default configuration as TOML
    InitConfig {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

fn warn_missing_tool(tool: &Path) {
    if which::which(tool).is_err() {
        warn!(tool = %tool.display(), "Tool not found on PATH");
        eprintln!("⚠️  {} not found on PATH", tool.display());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { path } => {
            let text = StealthConfig::default().to_toml_string()?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_dir_exists(parent)?;
            }
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("📝 Default configuration written to {}", path.display());
        }

        Commands::Run { config, seed } => {
            let mut config = match config {
                Some(path) => StealthConfig::load(&path)?,
                None => StealthConfig::default(),
            };
            if seed.is_some() {
                config.seed = seed;
            }

            if let Err(e) = init_logging(
                "vid_stealth",
                LogConfig::new().with_log_file(&config.log_file),
            ) {
                eprintln!("⚠️  Could not open log file: {:#}", e);
            }
            info!(
                codec = config.codec_mode.as_str(),
                metadata = ?config.metadata_mode,
                seed = ?config.seed,
                "🎬 vid-stealth run"
            );

            warn_missing_tool(&config.tools.ffmpeg);
            warn_missing_tool(&config.tools.ffprobe);

            let started = Instant::now();
            let batch = match Pipeline::new(&config).run_batch() {
                Ok(batch) => batch,
                Err(e) if e.is_batch_abort() => {
                    warn!(error = %e, "Batch aborted before processing");
                    println!("⚠️  {}", e);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            print_summary_report(&batch, started.elapsed(), &config.output_dir, "vid-stealth");
        }
    }

    Ok(())
}
