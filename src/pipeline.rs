//! Per-bot export and the batch runner around it.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info, warn};

use typebot_client::{ResultRecord, ResultsQuery, TypebotClient};

use crate::config::Config;
use crate::error::Result;
use crate::export::{sanitize_name, save_json, timestamped_csv_path, write_csv};
use crate::extract::{flatten_result, order_columns};
use crate::inventory::InventoryEntry;

pub const STRUCTURE_FILE: &str = "structure.json";
pub const RESULTS_FILE: &str = "results.json";

/// What one bot export produced.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub bot_id: String,
    pub bot_name: String,
    pub rows: usize,
    pub structure_path: PathBuf,
    /// `None` when the bot has no results.
    pub csv_path: Option<PathBuf>,
}

/// Fetch every result across `queries`, keeping the first copy of each id.
pub async fn fetch_result_sets(
    client: &TypebotClient,
    bot_id: &str,
    queries: &[ResultsQuery],
) -> Result<Vec<ResultRecord>> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for query in queries {
        let batch = client.fetch_all_results(bot_id, query).await?;
        let before = records.len();
        for record in batch {
            if seen.insert(record.id.clone()) {
                records.push(record);
            }
        }
        info!(
            bot_id,
            archived = query.archived.unwrap_or(false),
            new = records.len() - before,
            "Result set fetched"
        );
    }

    Ok(records)
}

/// Export one bot: save its structure, then every result as a CSV table.
///
/// With `with_meta`, each row starts with the bot's identity columns.
pub async fn process_bot(
    client: &TypebotClient,
    entry: &InventoryEntry,
    config: &Config,
    with_meta: bool,
) -> Result<ExportOutcome> {
    let bot_id = entry.id();
    let definition = client.fetch_bot_definition(bot_id).await?;

    // Entries built from a bare BOT_ID carry the id as their name.
    let bot_name = if entry.name() == bot_id && !definition.name.is_empty() {
        definition.name.clone()
    } else {
        entry.name().to_string()
    };

    let bot_dir = config.output.dir.join(sanitize_name(&bot_name));
    let structure_path = bot_dir.join(STRUCTURE_FILE);
    save_json(&structure_path, &definition.raw)?;

    let records = fetch_result_sets(client, bot_id, &config.result_queries()).await?;
    save_json(&bot_dir.join(RESULTS_FILE), &records)?;

    if records.is_empty() {
        info!(bot_id, name = %bot_name, "No results to export");
        return Ok(ExportOutcome {
            bot_id: bot_id.to_string(),
            bot_name,
            rows: 0,
            structure_path,
            csv_path: None,
        });
    }

    let names = definition.variable_names();
    let meta = with_meta.then(|| entry.meta());
    let rows: Vec<_> = records
        .iter()
        .map(|r| flatten_result(r, &names, meta.as_ref()))
        .collect();
    let columns = order_columns(&rows, &definition.variable_order());

    let csv_path = timestamped_csv_path(&config.output.db_dir, &bot_name, Local::now().naive_local());
    write_csv(&csv_path, &columns, &rows)?;

    info!(bot_id, name = %bot_name, rows = rows.len(), "Bot exported");
    Ok(ExportOutcome {
        bot_id: bot_id.to_string(),
        bot_name,
        rows: rows.len(),
        structure_path,
        csv_path: Some(csv_path),
    })
}

/// Per-bot tally of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<ExportOutcome>,
    /// Bots the server no longer knows.
    pub skipped: Vec<String>,
    /// `(bot id, reason)`
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }
}

/// Export bots one after another.
///
/// A missing bot is skipped and any other failure is recorded, so one broken
/// bot never stops the rest. An auth failure first reloads `AUTH_TOKEN`; if
/// it changed the bot is retried once, otherwise the whole batch stops.
pub async fn run_batch(
    client: &TypebotClient,
    entries: &[InventoryEntry],
    config: &mut Config,
    with_meta: bool,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    info!(bots = entries.len(), "Starting batch export");

    for entry in entries {
        let mut outcome = process_bot(client, entry, config, with_meta).await;

        let auth_failed = matches!(&outcome, Err(e) if e.is_auth());
        if auth_failed {
            match config.reload_auth_token() {
                Some(token) => {
                    warn!(bot_id = entry.id(), "Auth failed, retrying with reloaded token");
                    client.set_auth_token(token).await;
                    outcome = process_bot(client, entry, config, with_meta).await;
                }
                None => {
                    error!(bot_id = entry.id(), "Auth failed and no new token is available");
                }
            }
        }

        match outcome {
            Ok(done) => report.succeeded.push(done),
            Err(e) if e.is_fatal() => {
                error!(bot_id = entry.id(), error = %e, "Aborting batch");
                return Err(e);
            }
            Err(e) if e.is_not_found() => {
                warn!(bot_id = entry.id(), "Bot not found, skipping");
                report.skipped.push(entry.id().to_string());
            }
            Err(e) => {
                error!(bot_id = entry.id(), name = entry.name(), error = %e, "Export failed");
                report.failed.push((entry.id().to_string(), e.to_string()));
            }
        }
    }

    info!(
        succeeded = report.succeeded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Batch finished"
    );
    Ok(report)
}
