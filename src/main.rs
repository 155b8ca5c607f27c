// src/main.rs

use adaptive_imports::config::CONFIG_FILE;
use adaptive_imports::{AdaptiveConfig, DirectoryResolver, FlagSet, Matcher, load_config};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "adaptive")]
#[command(author, version, long_about = None)]
#[command(about = "Inspect flag-gated adaptive module variants")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the declared flag sets, most specific first
    FlagSets {
        /// Configuration file
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
    /// Show the variants of a module
    Matches {
        /// Module file
        file: PathBuf,
        /// Configuration file
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
    /// Show the variant selected for an active flag set
    Pick {
        /// Module file
        file: PathBuf,
        /// Active flags, dot-separated (e.g. mobile.ios); empty for none
        #[arg(short, long, default_value = "")]
        flags: String,
        /// Configuration file
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn read_config(path: &Path) -> Result<AdaptiveConfig> {
    load_config(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn matcher_for(config: &AdaptiveConfig) -> Result<Matcher> {
    Ok(Matcher::new(
        Box::new(DirectoryResolver::new()),
        config.declared_flag_sets()?,
        config.undeclared_alternates,
    ))
}

/// Absolute path of a module file as the matcher expects it
fn module_id(file: &Path) -> Result<String> {
    let path = std::path::absolute(file)
        .with_context(|| format!("Failed to resolve {}", file.display()))?;
    Ok(path.to_string_lossy().into_owned())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::FlagSets { config }) => {
            let config = read_config(&config)?;
            let declared = config.declared_flag_sets()?;
            info!("{} declared flag set(s)", declared.len());

            for flags in declared.iter() {
                if flags.is_empty() {
                    println!("(none)");
                } else {
                    println!("{}", flags.to_dotted());
                }
            }
            Ok(())
        }

        Some(Commands::Matches { file, config }) => {
            let config = read_config(&config)?;
            let matcher = matcher_for(&config)?;
            let id = module_id(&file)?;

            match matcher.get_matches(&id)? {
                Some(matches) => println!("{}", serde_json::to_string_pretty(matches.as_ref())?),
                None => println!("{} is not adaptive", id),
            }
            Ok(())
        }

        Some(Commands::Pick { file, flags, config }) => {
            let config = read_config(&config)?;
            let matcher = matcher_for(&config)?;
            let id = module_id(&file)?;
            let active = FlagSet::parse_dotted(&flags)?;
            debug!("Picking variant of {} for {}", id, active);

            match matcher.get_matches(&id)? {
                Some(matches) => println!("{}", matches.pick(&active)),
                None => println!("{}", id),
            }
            Ok(())
        }

        Some(Commands::Completions { shell }) => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "adaptive", &mut std::io::stdout());
            Ok(())
        }

        None => {
            println!("adaptive v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'adaptive --help' for usage information");
            Ok(())
        }
    }
}
