use std::path::PathBuf;

use clap::{Parser, Subcommand};
use moodlog_cli::cli::{commands::sign_in, execute, CliCommand, CliConfig};
use moodlog_core::models::{Mood, TimeFilter};
use moodlog_core::tracing_setup::init_tracing_with_service;
use moodlog_core::CoreRuntime;

#[derive(Parser)]
#[command(name = "moodlog")]
#[command(about = "Mood journal from the command line")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Path to JSON config file (dataDir, userId, adminCode, pageSize, liveWindow)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Directory of the local store (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User to act as (overrides the config file)
    #[arg(long, short = 'u', global = true)]
    user: Option<String>,

    /// Admin code presented when a user first signs in
    #[arg(long, global = true)]
    admin_code: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new entry
    Add {
        /// joyful, sad, angry or calm
        #[arg(value_parser = parse_mood)]
        mood: Mood,
        /// Entry text
        #[arg(default_value = "")]
        text: String,
        /// Image file to attach
        #[arg(long, short = 'i')]
        image: Option<PathBuf>,
    },

    /// Show your entries, newest first
    Timeline {
        /// Older pages to load after the live window
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },

    /// Edit one of your entries
    Edit {
        id: String,
        #[arg(long, short = 'm', value_parser = parse_mood)]
        mood: Option<Mood>,
        #[arg(long, short = 't')]
        text: Option<String>,
    },

    /// Delete an entry
    Delete { id: String },

    /// Mood counts over a time window
    Stats {
        /// 1d, 7d, 30d or all
        #[arg(long, short = 'w', default_value = "7d", value_parser = parse_window)]
        window: TimeFilter,
    },

    /// List every user's entries (admin only)
    All,

    /// List registered users (admin only)
    Users,

    /// Set your profile photo
    Photo {
        /// Image file to upload
        path: PathBuf,
    },
}

fn parse_mood(raw: &str) -> Result<Mood, String> {
    Mood::parse(raw).ok_or_else(|| format!("unknown mood '{}'", raw))
}

fn parse_window(raw: &str) -> Result<TimeFilter, String> {
    TimeFilter::parse(raw).ok_or_else(|| format!("unknown window '{}'", raw))
}

#[tokio::main]
async fn main() {
    init_tracing_with_service("moodlog-cli");
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Add { mood, text, image } => CliCommand::Add { mood, text, image },
        Commands::Timeline { pages } => CliCommand::Timeline { pages },
        Commands::Edit { id, mood, text } => CliCommand::Edit { id, mood, text },
        Commands::Delete { id } => CliCommand::Delete { id },
        Commands::Stats { window } => CliCommand::Stats { window },
        Commands::All => CliCommand::All,
        Commands::Users => CliCommand::Users,
        Commands::Photo { path } => CliCommand::Photo { path },
    };

    if let Err(e) = run(
        cli.config,
        cli.data_dir,
        cli.user,
        cli.admin_code,
        command,
        cli.pretty,
    )
    .await
    {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(
    config_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    user: Option<String>,
    admin_code: Option<String>,
    command: CliCommand,
    pretty: bool,
) -> anyhow::Result<()> {
    let mut config = CliConfig::resolve(config_path.as_deref())?;
    // Flags win over the config file
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }
    if user.is_some() {
        config.user_id = user;
    }
    if admin_code.is_some() {
        config.admin_code = admin_code;
    }

    let mut runtime = CoreRuntime::local(config.to_core_config())?;
    let user_id = config.user_id.clone().unwrap_or_default();
    sign_in(&runtime, &user_id, config.admin_code.as_deref()).await?;

    let result = execute(&runtime, command).await;
    runtime.shutdown();
    let value = result?;

    let output = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{}", output);
    Ok(())
}
