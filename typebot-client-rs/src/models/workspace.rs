//! Workspace, folder and bot listing records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A bot as it appears in `GET /typebots` listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bot_summary_keeps_unknown_fields() {
        let bot: BotSummary = serde_json::from_value(json!({
            "id": "b1",
            "name": "Survey",
            "publicId": "survey-x",
            "icon": "🤖",
            "updatedAt": "2024-01-01"
        }))
        .unwrap();
        assert_eq!(bot.public_id.as_deref(), Some("survey-x"));
        assert!(bot.folder_id.is_none());
        assert_eq!(bot.extra.get("icon"), Some(&json!("🤖")));
    }
}
