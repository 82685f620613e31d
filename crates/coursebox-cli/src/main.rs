//! Coursebox CLI
//!
//! Command-line interface for Coursebox - offline-first courseware authoring.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coursebox_core::{Config, Store, SyncDirection};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "coursebox")]
#[command(about = "Coursebox - offline-first courseware authoring")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage coursewares
    Course {
        #[command(subcommand)]
        command: CourseCommands,
    },
    /// Manage questions within a courseware
    Question {
        #[command(subcommand)]
        command: QuestionCommands,
    },
    /// Show store and change-log status
    Status,
    /// Sync with the remote endpoint
    Sync {
        /// Phases to run: upload, download or both
        #[arg(long, default_value = "both")]
        direction: String,
    },
    /// Reset failed changes to pending and re-upload them
    Retry,
    /// Remove synced change-log records
    Clean {
        /// Only records created before this RFC 3339 timestamp
        #[arg(long)]
        before: Option<String>,
    },
    /// Show or set sync configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum CourseCommands {
    /// Create a new courseware
    #[command(alias = "add")]
    Create {
        /// Courseware title
        title: String,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List all coursewares
    #[command(alias = "ls")]
    List,
    /// Show courseware details and its questions
    Show {
        /// Courseware ID
        id: String,
    },
    /// Update courseware fields
    Update {
        /// Courseware ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description ("none" clears it)
        #[arg(long)]
        description: Option<String>,
        /// New status (draft, completed, archived)
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a courseware and its questions
    #[command(alias = "rm")]
    Delete {
        /// Courseware ID
        id: String,
    },
}

#[derive(Subcommand)]
enum QuestionCommands {
    /// Add a question to a courseware
    #[command(alias = "create")]
    Add {
        /// Owning courseware ID
        courseware_id: String,
        /// Question type tag, e.g. single_choice or essay
        #[arg(short = 't', long, default_value = "single_choice")]
        question_type: String,
        /// Explicit position (appended when omitted)
        #[arg(long)]
        order: Option<i64>,
        /// Media file path (repeatable)
        #[arg(short, long)]
        media: Vec<String>,
        /// OCR text extracted from the media
        #[arg(long)]
        ocr_text: Option<String>,
        /// Options blob as JSON
        #[arg(long)]
        options: Option<String>,
        /// Answer blob as JSON
        #[arg(long)]
        answer: Option<String>,
    },
    /// List the questions of a courseware
    #[command(alias = "ls")]
    List {
        /// Courseware ID
        courseware_id: String,
    },
    /// Replace the entire question set from a JSON file
    Replace {
        /// Courseware ID
        courseware_id: String,
        /// JSON file holding an array of questions
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Reorder questions by the given id sequence
    Reorder {
        /// Courseware ID
        courseware_id: String,
        /// Question IDs in the new order
        ids: Vec<String>,
    },
    /// Delete a question
    #[command(alias = "rm")]
    Delete {
        /// Question ID
        id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (endpoint, credential, auto_sync, interval_minutes, timeout_secs)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coursebox_core=warn,coursebox_cli=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let config = Config::load()?;

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(&config, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(&config, key, value, &output)
            }
        };
    }

    let store = Store::open(config.store_path())?;

    match cli.command {
        Commands::Course { command } => handle_course_command(command, &store, &output),
        Commands::Question { command } => handle_question_command(command, &store, &output),
        Commands::Status => commands::status::show(&store, &config, &output),
        Commands::Sync { direction } => {
            let direction: SyncDirection = direction
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            commands::sync::sync(&store, &config, direction, &output)
        }
        Commands::Retry => commands::sync::retry(&store, &config, &output),
        Commands::Clean { before } => commands::sync::clean(&store, before, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_course_command(command: CourseCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        CourseCommands::Create { title, description } => {
            commands::course::create(store, title, description, output)
        }
        CourseCommands::List => commands::course::list(store, output),
        CourseCommands::Show { id } => commands::course::show(store, id, output),
        CourseCommands::Update {
            id,
            title,
            description,
            status,
        } => commands::course::update(store, id, title, description, status, output),
        CourseCommands::Delete { id } => commands::course::delete(store, id, output),
    }
}

fn handle_question_command(
    command: QuestionCommands,
    store: &Store,
    output: &Output,
) -> Result<()> {
    match command {
        QuestionCommands::Add {
            courseware_id,
            question_type,
            order,
            media,
            ocr_text,
            options,
            answer,
        } => commands::question::add(
            store,
            courseware_id,
            question_type,
            order,
            media,
            ocr_text,
            options,
            answer,
            output,
        ),
        QuestionCommands::List { courseware_id } => {
            commands::question::list(store, courseware_id, output)
        }
        QuestionCommands::Replace {
            courseware_id,
            file,
        } => commands::question::replace(store, courseware_id, file, output),
        QuestionCommands::Reorder { courseware_id, ids } => {
            commands::question::reorder(store, courseware_id, ids, output)
        }
        QuestionCommands::Delete { id } => commands::question::delete(store, id, output),
    }
}
