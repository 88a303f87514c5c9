mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hivemind::config::HivemindConfig;
use hivemind::hooks::HookAdapter;
use hivemind::statute::TOPIC_DEFAULT_MAX_TOKENS;

#[derive(Parser)]
#[command(
    name = "hivemind",
    version,
    about = "Session memory and context preservation for agent lifecycle hooks"
)]
struct Cli {
    /// Project root (overrides config and the hook payload `cwd`)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the project store and schema
    Init,
    /// Upsert a key/value entry
    Set {
        key: String,
        value: String,
        category: Option<String>,
    },
    /// Read an entry by key
    Get { key: String },
    /// List entries, newest first
    List { category: Option<String> },
    /// Record a running task
    TaskStart {
        id: String,
        description: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Mark a running task completed (or failed)
    TaskComplete {
        id: String,
        result: Option<String>,
        #[arg(long)]
        failed: bool,
    },
    /// Open a work phase
    PhaseStart {
        name: String,
        context: Option<String>,
        #[arg(long)]
        parent: Option<i64>,
    },
    /// Complete an active phase
    PhaseComplete { id: i64 },
    /// List recent phases, newest first
    PhaseList,
    /// Queue a learning for export
    LearningAdd {
        #[arg(value_name = "TYPE")]
        learning_type: String,
        content: String,
    },
    /// Export pending learnings to the learnings document
    LearningsExport,
    /// Append a context snapshot
    SnapshotSave {
        session: String,
        #[arg(default_value = "")]
        summary: String,
        #[arg(long = "type", default_value = "manual")]
        snapshot_type: String,
    },
    /// Print the statute digest as plain text
    Statute,
    /// Print a bounded view of recent state
    Dump,
    /// Print entries and active phases as plain text
    DumpCompact,
    /// Print entries matching a topic as a token-budgeted text block
    ContextFor {
        topic: String,
        #[arg(long, default_value_t = TOPIC_DEFAULT_MAX_TOKENS)]
        max_tokens: usize,
    },
    /// Substring search over keys and values
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Store health and watcher liveness
    Status,
    /// Handle a host lifecycle event (payload on stdin)
    Hook { event: String },
    /// Run the context watcher until interrupted
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match HivemindConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // A bad config file must not fail a hook.
            eprintln!("hivemind: {e:#}; using defaults");
            HivemindConfig::fallback()
        }
    };
    if let Some(dir) = &cli.project_dir {
        config.storage.project_dir = Some(dir.to_string_lossy().into_owned());
    }

    // Log to stderr so stdout stays clean for JSON output.
    let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            1
        }
    };
    std::process::exit(code);
}

/// Run one command and return the process exit code.
async fn run(command: Command, config: &HivemindConfig) -> Result<i32> {
    match command {
        Command::Hook { event } => {
            let adapter = HookAdapter::new(config);
            return Ok(adapter.run(&event, std::io::stdin().lock(), std::io::stdout().lock()));
        }
        Command::Init => cli::store::init(config),
        Command::Set {
            key,
            value,
            category,
        } => cli::store::set(config, &key, &value, category.as_deref()),
        Command::Get { key } => cli::store::get(config, &key),
        Command::List { category } => cli::store::list(config, category.as_deref()),
        Command::TaskStart {
            id,
            description,
            session,
        } => cli::tasks::task_start(config, &id, &description, session.as_deref()),
        Command::TaskComplete { id, result, failed } => {
            cli::tasks::task_complete(config, &id, result.as_deref(), failed)
        }
        Command::PhaseStart {
            name,
            context,
            parent,
        } => cli::phases::phase_start(config, &name, context.as_deref(), parent),
        Command::PhaseComplete { id } => cli::phases::phase_complete(config, id),
        Command::PhaseList => cli::phases::phase_list(config),
        Command::LearningAdd {
            learning_type,
            content,
        } => cli::learnings::learning_add(config, &learning_type, &content),
        Command::LearningsExport => cli::learnings::learnings_export(config),
        Command::SnapshotSave {
            session,
            summary,
            snapshot_type,
        } => cli::tasks::snapshot_save(config, &session, &snapshot_type, &summary),
        Command::Statute => cli::store::statute(config),
        Command::Dump => cli::store::dump(config),
        Command::DumpCompact => cli::store::dump_compact(config),
        Command::ContextFor { topic, max_tokens } => cli::store::context_for(config, &topic, max_tokens),
        Command::Search { query, limit } => cli::store::search(config, &query, limit),
        Command::Status => cli::status::status(config),
        Command::Watch => hivemind::watcher::run_watcher(config).await,
    }?;
    Ok(0)
}
