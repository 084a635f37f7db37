//! typebot-harvest -- export, inventory and seeding for Typebot instances.
//!
//! Startup order:
//!   - `.env` loading
//!   - CLI parsing
//!   - configuration (TOML file + env overrides)
//!   - tracing
//!   - API client, then the subcommand

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use typebot_client::{TimeFilter, TypebotClient};
use typebot_harvest::chat::{parse_var, render_transcript, run_chat};
use typebot_harvest::config::Config;
use typebot_harvest::export::{sanitize_name, save_json};
use typebot_harvest::extract::flatten_result;
use typebot_harvest::inventory::{self, InventoryEntry};
use typebot_harvest::pipeline::{STRUCTURE_FILE, process_bot, run_batch};
use typebot_harvest::seed::{RowOutcome, SeedOptions, SeedPlan, run_seed};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "typebot-harvest")]
#[command(about = "Export results, inventory workspaces and seed conversations on a Typebot instance")]
#[command(version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "HARVEST_CONFIG", default_value = "typebot-harvest.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a bot's structure, save it and list its variables.
    Bot {
        /// Bot id; defaults to BOT_ID.
        #[arg(long)]
        bot_id: Option<String>,
    },

    /// Export every result of one bot to CSV and JSON.
    Results {
        #[arg(long)]
        bot_id: Option<String>,
        /// Server-side time window (allTime, today, last7Days, ...).
        #[arg(long)]
        time_filter: Option<TimeFilter>,
        /// Skip the archived results listing.
        #[arg(long)]
        no_archived: bool,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Print one result, flattened with variable names, as JSON.
    #[command(name = "result")]
    Single {
        result_id: String,
        #[arg(long)]
        bot_id: Option<String>,
    },

    /// List every bot of the workspace(s) and write the inventory files.
    Inventory,

    /// Export several bots from the saved inventory.
    Export {
        /// Every bot in the inventory.
        #[arg(short, long, conflicts_with = "bot")]
        all: bool,
        /// Specific bot ids (repeatable).
        #[arg(long)]
        bot: Vec<String>,
    },

    /// Replay CSV rows as chat sessions.
    Seed {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        bot_id: Option<String>,
        /// Columns sent as prefilled variables (repeatable).
        #[arg(long)]
        prefill: Vec<String>,
        /// Only replay the first N rows.
        #[arg(long)]
        limit: Option<usize>,
        /// Pause before each answer, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Run a single conversation.
    Chat {
        #[arg(long)]
        bot_id: Option<String>,
        /// Prefilled variable as KEY=VALUE (repeatable).
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
        /// Answer to submit, in order (repeatable).
        #[arg(long = "answer")]
        answers: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before clap, so HARVEST_CONFIG may come from .env too.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if cli.json_logs {
        config.logging.json = true;
    }

    init_tracing(&config);
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        overrides = config.env_overrides.all().len(),
        "Starting typebot-harvest"
    );
    for (setting, env_var) in config.env_overrides.all() {
        tracing::debug!(setting, env_var, "Setting taken from environment");
    }

    let client = config.build_client()?;

    match cli.command {
        Commands::Bot { bot_id } => cmd_bot(&client, &config, bot_id.as_deref()).await,
        Commands::Results {
            bot_id,
            time_filter,
            no_archived,
            page_size,
        } => {
            if let Some(filter) = time_filter {
                note_flag_wins(&config, "results.time_filter");
                config.results.time_filter = filter;
            }
            if no_archived {
                note_flag_wins(&config, "results.include_archived");
                config.results.include_archived = false;
            }
            if let Some(size) = page_size {
                note_flag_wins(&config, "results.page_size");
                config.results.page_size = size;
            }
            cmd_results(&client, &config, bot_id.as_deref()).await
        }
        Commands::Single { result_id, bot_id } => {
            cmd_result(&client, &config, bot_id.as_deref(), &result_id).await
        }
        Commands::Inventory => cmd_inventory(&client, &config).await,
        Commands::Export { all, bot } => cmd_export(&client, &mut config, all, &bot).await,
        Commands::Seed {
            csv,
            bot_id,
            prefill,
            limit,
            delay_ms,
        } => {
            if !prefill.is_empty() {
                note_flag_wins(&config, "seed.prefill_columns");
                config.seed.prefill_columns = prefill;
            }
            if let Some(ms) = delay_ms {
                note_flag_wins(&config, "seed.turn_delay_ms");
                config.seed.turn_delay_ms = ms;
            }
            cmd_seed(&client, &mut config, bot_id.as_deref(), &csv, limit).await
        }
        Commands::Chat {
            bot_id,
            vars,
            answers,
        } => {
            let bot_id = config.bot_id(bot_id.as_deref())?;
            let transcript = run_chat(&client, &bot_id, &vars, &answers).await?;
            print!("{}", render_transcript(&transcript));
            Ok(())
        }
    }
}

/// Command-line flags beat the environment; say so when both were given.
fn note_flag_wins(config: &Config, setting: &str) {
    if let Some(env_var) = config.env_overrides.env_var_for(setting) {
        tracing::info!(setting, env_var, "Command-line flag overrides environment variable");
    }
}

fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("typebot_harvest={level},typebot_client={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_bot(client: &TypebotClient, config: &Config, bot_id: Option<&str>) -> anyhow::Result<()> {
    let bot_id = config.bot_id(bot_id)?;
    let definition = client.fetch_bot_definition(&bot_id).await?;

    let name = if definition.name.is_empty() { &bot_id } else { &definition.name };
    let path = config.output.dir.join(sanitize_name(name)).join(STRUCTURE_FILE);
    save_json(&path, &definition.raw)?;

    println!("{} ({}) -> {}", name, definition.id, path.display());
    println!("{} variable(s):", definition.variables.len());
    for var in &definition.variables {
        println!("  {:<28} {}", var.id, var.name);
    }
    Ok(())
}

async fn cmd_results(
    client: &TypebotClient,
    config: &Config,
    bot_id: Option<&str>,
) -> anyhow::Result<()> {
    let bot_id = config.bot_id(bot_id)?;
    let outcome = process_bot(client, &InventoryEntry::from_bot_id(&bot_id), config, false).await?;

    match &outcome.csv_path {
        Some(path) => println!("{} row(s) -> {}", outcome.rows, path.display()),
        None => println!("No results for {}", outcome.bot_name),
    }
    Ok(())
}

async fn cmd_result(
    client: &TypebotClient,
    config: &Config,
    bot_id: Option<&str>,
    result_id: &str,
) -> anyhow::Result<()> {
    let bot_id = config.bot_id(bot_id)?;
    let names = client.fetch_bot_definition(&bot_id).await?.variable_names();
    let record = client.fetch_result(&bot_id, result_id).await?;

    let row = flatten_result(&record, &names, None);
    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

async fn cmd_inventory(client: &TypebotClient, config: &Config) -> anyhow::Result<()> {
    let entries = inventory::collect_inventory(client, config.api.workspace_id.as_deref()).await?;

    let workspace_id = config
        .api
        .workspace_id
        .clone()
        .or_else(|| entries.first().and_then(|e| e.workspace_id.clone()))
        .unwrap_or_else(|| "N/A".to_string());
    let (json_path, report_path) =
        inventory::save_inventory(&config.output.dir, &workspace_id, &entries)?;

    println!(
        "{} bot(s) -> {}, {}",
        entries.len(),
        json_path.display(),
        report_path.display()
    );
    Ok(())
}

/// Pick the bots to export: the whole inventory, the listed ids, or BOT_ID.
fn select_bots(config: &Config, all: bool, ids: &[String]) -> anyhow::Result<Vec<InventoryEntry>> {
    if all {
        return Ok(inventory::load_inventory(&config.output.dir)?);
    }

    let known = inventory::load_inventory(&config.output.dir).unwrap_or_default();
    let ids = if ids.is_empty() {
        vec![config.bot_id(None)?]
    } else {
        ids.to_vec()
    };

    Ok(ids
        .iter()
        .map(|id| {
            known
                .iter()
                .find(|e| e.id() == id)
                .cloned()
                .unwrap_or_else(|| InventoryEntry::from_bot_id(id))
        })
        .collect())
}

async fn cmd_export(
    client: &TypebotClient,
    config: &mut Config,
    all: bool,
    ids: &[String],
) -> anyhow::Result<()> {
    let entries = select_bots(config, all, ids)?;
    if entries.is_empty() {
        println!("No bots selected");
        return Ok(());
    }

    let report = run_batch(client, &entries, config, true).await?;
    for done in &report.succeeded {
        match &done.csv_path {
            Some(path) => println!("ok      {} ({} rows) -> {}", done.bot_name, done.rows, path.display()),
            None => println!("empty   {}", done.bot_name),
        }
    }
    for id in &report.skipped {
        println!("skipped {id} (not found)");
    }
    for (id, reason) in &report.failed {
        println!("failed  {id}: {reason}");
    }
    println!("{} bot(s) processed", report.total());
    Ok(())
}

async fn cmd_seed(
    client: &TypebotClient,
    config: &mut Config,
    bot_id: Option<&str>,
    csv: &Path,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let bot_id = config.bot_id(bot_id)?;
    let plan = SeedPlan::from_csv(csv, &config.seed.prefill_columns)?;
    let opts = SeedOptions {
        limit,
        turn_delay: config.turn_delay(),
    };

    let report = run_seed(client, &bot_id, &plan, &opts, config).await?;
    for row in &report.rows {
        let session = row.session_id.as_deref().unwrap_or("-");
        match &row.outcome {
            RowOutcome::Completed { turns } => println!("row {:>4} completed ({turns} turns, {session})", row.line),
            RowOutcome::Partial { turns } => println!("row {:>4} partial ({turns} turns, {session})", row.line),
            RowOutcome::Failed(reason) => println!("row {:>4} failed: {reason}", row.line),
        }
    }
    println!(
        "{} completed, {} partial, {} failed",
        report.completed(),
        report.partial(),
        report.failed()
    );
    Ok(())
}
