//! Workspace inventory: every bot reachable by the token, tagged with the
//! folder it lives in.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use typebot_client::{BotSummary, TypebotClient, Workspace};

use crate::error::{HarvestError, Result};
use crate::export::save_json;
use crate::extract::BotMeta;

/// Folder label for bots that are not filed anywhere.
pub const ROOT_FOLDER: &str = "Root";

pub const INVENTORY_FILE: &str = "global_info.json";
pub const REPORT_FILE: &str = "global_info_report.md";

fn root_folder() -> String {
    ROOT_FOLDER.to_string()
}

/// A listed bot plus where it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    #[serde(flatten)]
    pub bot: BotSummary,
    #[serde(rename = "_folderName", default = "root_folder")]
    pub folder_name: String,
    #[serde(rename = "_workspaceId", default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

impl InventoryEntry {
    /// Entry for a bot known only by id (e.g. `BOT_ID` with no inventory).
    pub fn from_bot_id(bot_id: &str) -> Self {
        Self {
            bot: BotSummary {
                id: bot_id.to_string(),
                name: bot_id.to_string(),
                public_id: None,
                folder_id: None,
                extra: serde_json::Map::new(),
            },
            folder_name: root_folder(),
            workspace_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.bot.id
    }

    /// Display name, falling back to the id for unnamed bots.
    pub fn name(&self) -> &str {
        if self.bot.name.is_empty() {
            &self.bot.id
        } else {
            &self.bot.name
        }
    }

    pub fn meta(&self) -> BotMeta {
        BotMeta {
            id: self.bot.id.clone(),
            name: self.name().to_string(),
            public_id: self.bot.public_id.clone(),
            folder: Some(self.folder_name.clone()),
        }
    }
}

/// Listing failures other than auth only cost the part being listed.
fn tolerate<T>(result: typebot_client::Result<Vec<T>>, what: &str) -> Result<Vec<T>> {
    match result {
        Ok(items) => Ok(items),
        Err(e) if e.is_auth() => Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to list {what}, skipping");
            Ok(Vec::new())
        }
    }
}

/// Collected entries keyed by bot id. A bot seen twice keeps its first
/// position; a folder tag wins over `Root`.
#[derive(Default)]
struct Collected(IndexMap<String, InventoryEntry>);

impl Collected {
    fn add(&mut self, bots: Vec<BotSummary>, folder_name: &str, workspace_id: &str) {
        for bot in bots {
            let entry = InventoryEntry {
                bot,
                folder_name: folder_name.to_string(),
                workspace_id: Some(workspace_id.to_string()),
            };
            match self.0.get_mut(entry.id()) {
                Some(existing) => {
                    debug!(bot_id = entry.id(), folder = folder_name, "Bot listed twice");
                    if existing.folder_name == ROOT_FOLDER && folder_name != ROOT_FOLDER {
                        *existing = entry;
                    }
                }
                None => {
                    self.0.insert(entry.id().to_string(), entry);
                }
            }
        }
    }

    fn into_entries(self) -> Vec<InventoryEntry> {
        self.0.into_values().collect()
    }
}

/// Walk the configured workspace (or every listed one): root bots first,
/// then each folder in listing order.
pub async fn collect_inventory(
    client: &TypebotClient,
    workspace_id: Option<&str>,
) -> Result<Vec<InventoryEntry>> {
    let workspaces = match workspace_id {
        Some(id) => {
            info!(workspace_id = id, "Using configured workspace");
            vec![Workspace {
                id: id.to_string(),
                name: "Configured workspace".to_string(),
                extra: serde_json::Map::new(),
            }]
        }
        None => client.list_workspaces().await?,
    };

    if workspaces.is_empty() {
        warn!("No workspace found or configured");
        return Ok(Vec::new());
    }

    let mut collected = Collected::default();
    for ws in &workspaces {
        info!(workspace_id = %ws.id, name = %ws.name, "Processing workspace");

        let folders = tolerate(client.list_folders(&ws.id).await, "folders")?;
        info!(workspace_id = %ws.id, folders = folders.len(), "Folders listed");

        let root = tolerate(client.list_bots(&ws.id, None).await, "root bots")?;
        collected.add(root, ROOT_FOLDER, &ws.id);

        for folder in &folders {
            let folder_name = if folder.name.is_empty() { "Unnamed" } else { folder.name.as_str() };
            let bots = tolerate(
                client.list_bots(&ws.id, Some(&folder.id)).await,
                &format!("bots of folder {}", folder.id),
            )?;
            collected.add(bots, folder_name, &ws.id);
        }
    }

    let entries = collected.into_entries();
    info!(bots = entries.len(), workspaces = workspaces.len(), "Inventory collected");
    Ok(entries)
}

/// Markdown overview of an inventory, root bots first.
pub fn render_report(workspace_id: &str, entries: &[InventoryEntry]) -> String {
    let mut folders: IndexMap<&str, Vec<&InventoryEntry>> = IndexMap::new();
    for entry in entries {
        folders.entry(entry.folder_name.as_str()).or_default().push(entry);
    }
    let public_id = |e: &InventoryEntry| e.bot.public_id.clone().unwrap_or_else(|| "N/A".into());

    let mut md = String::new();
    let _ = writeln!(md, "# Workspace Inventory\n");
    let _ = writeln!(md, "**Workspace ID:** `{workspace_id}`");
    let _ = writeln!(md, "**Total bots:** {}\n", entries.len());

    let _ = writeln!(md, "## Root bots");
    match folders.shift_remove(ROOT_FOLDER) {
        Some(root) if !root.is_empty() => {
            for entry in root {
                let _ = writeln!(md, "- **{}** (Public ID: `{}`)", entry.name(), public_id(entry));
            }
        }
        _ => {
            let _ = writeln!(md, "_No bots at the root, or the root listing failed._");
        }
    }

    let _ = writeln!(md, "\n## Bots by folder");
    if folders.is_empty() {
        let _ = writeln!(md, "_No other folder with bots._");
    }
    for (folder, bots) in &folders {
        let _ = writeln!(md, "\n### Folder: {folder}");
        for entry in bots {
            let _ = writeln!(
                md,
                "- **{}** (ID: `{}`, Public ID: `{}`)",
                entry.name(),
                entry.id(),
                public_id(entry)
            );
        }
    }
    md
}

/// Write `global_info.json` and the Markdown report into `dir`.
pub fn save_inventory(
    dir: &Path,
    workspace_id: &str,
    entries: &[InventoryEntry],
) -> Result<(PathBuf, PathBuf)> {
    let json_path = dir.join(INVENTORY_FILE);
    save_json(&json_path, entries)?;

    let report_path = dir.join(REPORT_FILE);
    std::fs::write(&report_path, render_report(workspace_id, entries))
        .map_err(|e| HarvestError::io(&report_path, e))?;
    info!(path = %report_path.display(), "Report written");

    Ok((json_path, report_path))
}

/// Read a previously saved inventory.
pub fn load_inventory(dir: &Path) -> Result<Vec<InventoryEntry>> {
    let path = dir.join(INVENTORY_FILE);
    if !path.exists() {
        return Err(HarvestError::Input(format!(
            "{} not found; run the `inventory` command first",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(&path).map_err(|e| HarvestError::io(&path, e))?;
    Ok(serde_json::from_str(&content)?)
}
