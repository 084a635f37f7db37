//! Workspace, folder and bot listings.
//!
//! Self-hosted instances disagree on these endpoints, so each call carries
//! the fallback the older deployments need.

use tracing::{debug, info, warn};

use crate::config;
use crate::error::{Error, Result};
use crate::models::parse_listing;
use crate::models::workspace::{BotSummary, Folder, Workspace};
use crate::transport::http::TypebotHttpClient;

/// List the caller's workspaces. Instances without the endpoint yield an
/// empty list.
pub async fn list_workspaces(http: &TypebotHttpClient, base_url: &str) -> Result<Vec<Workspace>> {
    let url = config::workspaces_url(base_url);
    info!("Fetching workspaces");

    match http.get_json(&url, &[], "workspaces endpoint").await {
        Ok(body) => parse_listing(body, "workspaces"),
        Err(e) if e.is_not_found() => {
            warn!("Workspaces endpoint not available on this instance");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// List the folders of a workspace, falling back to
/// `/workspaces/{id}/folders` when `/folders` is missing.
pub async fn list_folders(
    http: &TypebotHttpClient,
    base_url: &str,
    workspace_id: &str,
) -> Result<Vec<Folder>> {
    let url = config::folders_url(base_url);
    let params = [("workspaceId", workspace_id.to_string())];
    let resource = format!("folders of workspace {}", workspace_id);

    let body = match http.get_json(&url, &params, &resource).await {
        Ok(body) => body,
        Err(e) if e.is_not_found() => {
            debug!(workspace_id, "Falling back to nested folders endpoint");
            let alt = config::workspace_folders_url(base_url, workspace_id);
            http.get_json(&alt, &[], &resource).await?
        }
        Err(e) => return Err(e),
    };

    parse_listing(body, "folders")
}

/// List bots of a workspace, either at the root (`folder_id = None`) or in
/// one folder.
///
/// Some instances answer 5xx when `workspaceId` is sent; a root listing is
/// then repeated once without parameters. That answer spans every folder and
/// workspace the token can see, so only unfiled bots of `workspace_id` are
/// kept (bots that do not report a `workspaceId` are kept too).
pub async fn list_bots(
    http: &TypebotHttpClient,
    base_url: &str,
    workspace_id: &str,
    folder_id: Option<&str>,
) -> Result<Vec<BotSummary>> {
    let url = config::bots_url(base_url);
    let mut params = vec![("workspaceId", workspace_id.to_string())];
    if let Some(folder_id) = folder_id {
        params.push(("folderId", folder_id.to_string()));
    }
    let resource = format!("bots of workspace {}", workspace_id);

    let bots: Vec<BotSummary> = match http.get_json(&url, &params, &resource).await {
        Ok(body) => parse_listing(body, "typebots")?,
        Err(e) if is_server_failure(&e) && folder_id.is_none() => {
            warn!(workspace_id, error = %e, "Bot listing failed with workspaceId, retrying without parameters");
            let body = http.get_json(&url, &[], &resource).await?;
            let all: Vec<BotSummary> = parse_listing(body, "typebots")?;
            let total = all.len();
            let root: Vec<BotSummary> = all
                .into_iter()
                .filter(|bot| is_root_bot_of(bot, workspace_id))
                .collect();
            debug!(workspace_id, total, kept = root.len(), "Filtered unparameterised listing");
            root
        }
        Err(e) => return Err(e),
    };

    debug!(workspace_id, folder = folder_id.unwrap_or("root"), count = bots.len(), "Bots listed");
    Ok(bots)
}

fn is_server_failure(e: &Error) -> bool {
    match e {
        Error::Api { status, .. } | Error::RetriesExhausted { status: Some(status), .. } => {
            (500..=599).contains(status)
        }
        _ => false,
    }
}

fn is_root_bot_of(bot: &BotSummary, workspace_id: &str) -> bool {
    if bot.folder_id.is_some() {
        return false;
    }
    match bot.extra.get("workspaceId").and_then(|v| v.as_str()) {
        Some(ws) => ws == workspace_id,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bot(value: serde_json::Value) -> BotSummary {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_server_failure_needs_a_5xx_status() {
        assert!(is_server_failure(&Error::Api { status: 502, message: String::new() }));
        assert!(is_server_failure(&Error::RetriesExhausted {
            attempts: 3,
            status: Some(500),
            message: String::new(),
        }));
        assert!(!is_server_failure(&Error::RetriesExhausted {
            attempts: 3,
            status: None,
            message: "connection refused".into(),
        }));
        assert!(!is_server_failure(&Error::RetriesExhausted {
            attempts: 3,
            status: Some(429),
            message: String::new(),
        }));
        assert!(!is_server_failure(&Error::Api { status: 400, message: String::new() }));
    }

    #[test]
    fn test_root_bot_filter() {
        assert!(is_root_bot_of(&bot(json!({"id": "b1", "workspaceId": "w1"})), "w1"));
        assert!(is_root_bot_of(&bot(json!({"id": "b1"})), "w1"));
        assert!(!is_root_bot_of(&bot(json!({"id": "b2", "workspaceId": "w1", "folderId": "f1"})), "w1"));
        assert!(!is_root_bot_of(&bot(json!({"id": "bX", "workspaceId": "w9"})), "w1"));
    }
}
