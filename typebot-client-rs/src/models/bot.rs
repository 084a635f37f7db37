//! Bot structure (the static flow definition).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A variable declared by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Bot definition as returned by `GET /typebots/{botId}`.
///
/// Only the identity fields and the variable list are typed. Groups, edges
/// and events are kept opaque: the client never interprets the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub groups: serde_json::Value,
    #[serde(default)]
    pub edges: serde_json::Value,
    #[serde(default)]
    pub events: serde_json::Value,
    /// The complete response body, for saving verbatim.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl BotDefinition {
    /// Decode a `GET /typebots/{botId}` response body (wrapped or bare).
    pub fn from_response(body: serde_json::Value) -> Result<Self> {
        let inner = super::unwrap_envelope(body.clone(), "typebot");
        let mut definition: BotDefinition = serde_json::from_value(inner)?;
        definition.raw = body;
        Ok(definition)
    }

    /// Build the `variableId -> name` mapping.
    pub fn variable_names(&self) -> VariableNames {
        self.variables
            .iter()
            .map(|v| (v.id.clone(), v.name.clone()))
            .collect()
    }

    /// Variable names in declaration order, without duplicates.
    pub fn variable_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::with_capacity(self.variables.len());
        for var in &self.variables {
            if !var.name.is_empty() && !order.contains(&var.name) {
                order.push(var.name.clone());
            }
        }
        order
    }
}

/// Mapping from opaque variable identifiers to their friendly names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableNames(HashMap<String, String>);

impl VariableNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Friendly name for `id`, if the bot declares it.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str).filter(|n| !n.is_empty())
    }

    /// Friendly name for `id`, or the id itself when unknown.
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for VariableNames {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "typebot": {
                "id": "b1",
                "name": "Survey",
                "workspaceId": "w1",
                "folderId": null,
                "publicId": "survey-x",
                "variables": [
                    {"id": "v1", "name": "Name"},
                    {"id": "v2", "name": "Age"},
                    {"id": "v3", "name": "Name"}
                ],
                "groups": [{"id": "g1", "blocks": []}],
                "edges": []
            }
        })
    }

    #[test]
    fn test_from_wrapped_response() {
        let def = BotDefinition::from_response(sample()).unwrap();
        assert_eq!(def.id, "b1");
        assert_eq!(def.workspace_id.as_deref(), Some("w1"));
        assert!(def.folder_id.is_none());
        assert_eq!(def.variables.len(), 3);
        assert!(def.events.is_null());
        assert_eq!(def.raw, sample());
    }

    #[test]
    fn test_from_bare_response() {
        let def = BotDefinition::from_response(json!({"id": "b2"})).unwrap();
        assert_eq!(def.id, "b2");
        assert!(def.variables.is_empty());
    }

    #[test]
    fn test_variable_names() {
        let def = BotDefinition::from_response(sample()).unwrap();
        let names = def.variable_names();
        assert_eq!(names.get("v2"), Some("Age"));
        assert_eq!(names.resolve("unknown"), "unknown");
        assert_eq!(def.variable_order(), vec!["Name", "Age"]);
    }
}
