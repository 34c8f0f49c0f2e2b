use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use metasync::{CopyStatus, UpdateNotifier, cli};
use owo_colors::OwoColorize;
use std::time::Duration;

/// How long to wait for the update check once the command is done
const UPDATE_GRACE: Duration = Duration::from_secs(2);

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Metasync: persist retrieved metadata as OS-safe, formatted local artifacts
#[derive(Parser)]
#[command(name = "metasync", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source settings from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the style configuration (.prettierrc.json) and project config
    Init,

    /// List leaf directories below a root
    Dirs {
        /// Directory to start from
        #[arg(default_value = ".")]
        root: String,

        /// How many levels to descend
        #[arg(short, long, default_value_t = 1)]
        depth: usize,

        /// Print full paths instead of paths relative to the root
        #[arg(long)]
        include_root: bool,

        /// Use the blocking walker
        #[arg(long)]
        blocking: bool,
    },

    /// Beautify an artifact in place
    Format {
        /// Directory holding the artifact
        dir: String,

        /// Artifact name, without extension
        name: String,

        /// File type / extension, e.g. html, ssjs, amp, json
        #[arg(value_name = "TYPE")]
        file_type: String,
    },

    /// Copy a file, skipping sources that no longer exist
    Copy { from: String, to: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = dotenvy::from_filename(&cli.env)
        && !e.not_found()
    {
        return Err(e.into());
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    let update = UpdateNotifier::for_package(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))?
        .notify();

    let result = run(cli.command).await;

    if tokio::time::timeout(UPDATE_GRACE, update).await.is_err() {
        log::debug!("Update check still running, skipped");
    }

    result
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            let project_dir = cli::project_dir()?;
            log::info!("Initializing project in {}", project_dir.display().bright_black());
            for path in cli::init_project(&project_dir).await? {
                log::info!("Wrote {}", path.display().bright_black());
            }
        }
        Commands::Dirs {
            root,
            depth,
            include_root,
            blocking,
        } => {
            log::debug!("Listing {} to depth {}", root.bright_black(), depth.cyan());
            for dir in cli::list_dirs(&root, depth, include_root, blocking).await? {
                println!("{}", dir.display());
            }
        }
        Commands::Format {
            dir,
            name,
            file_type,
        } => {
            let project_dir = cli::project_dir()?;
            let path = cli::format_artifact(&project_dir, &dir, &name, &file_type).await?;
            log::info!("Formatted {}", path.display().bright_black());
        }
        Commands::Copy { from, to } => {
            let outcome = cli::copy_file(&from, &to).await;
            match outcome.status {
                CopyStatus::Ok => log::info!("Copied {} → {}", from.bright_black(), to.bright_black()),
                CopyStatus::Skipped => log::warn!(
                    "Skipped {}: {}",
                    from.bright_black(),
                    outcome.status_message.unwrap_or_default().yellow()
                ),
                CopyStatus::Failed => {
                    return Err(eyre::eyre!(
                        "Copying {} failed: {}",
                        from,
                        outcome.status_message.unwrap_or_default()
                    ));
                }
            }
        }
    }

    Ok(())
}
