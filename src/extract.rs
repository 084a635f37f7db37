//! Flattening of result records into tabular rows.
//!
//! Each record becomes one [`Row`]: an insertion-ordered map from column name
//! to rendered cell. Column names come from the variable names of the bot
//! definition, so exports read `Name`/`Age` instead of opaque ids.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use typebot_client::{ResultRecord, VariableNames};

/// One flattened result.
pub type Row = IndexMap<String, String>;

/// Prefix shared by the bot metadata columns.
pub const META_PREFIX: &str = "Bot_";

/// Per-result columns that always follow the bot metadata.
pub const FIXED_COLUMNS: [&str; 4] = ["ResultId", "SubmittedAt", "IsCompleted", "ChatSessionId"];

/// Prefix of answer columns that no variable name covers.
pub const ANSWER_PREFIX: &str = "Ans_";

/// Prefix given to bot variables whose name clashes with a reserved column.
pub const VARIABLE_PREFIX: &str = "Var_";

fn is_reserved(column: &str) -> bool {
    column.starts_with(META_PREFIX) || FIXED_COLUMNS.contains(&column)
}

/// Column for a bot variable. Names clashing with the fixed or bot metadata
/// columns get [`VARIABLE_PREFIX`].
pub fn data_column(name: &str) -> String {
    if is_reserved(name) {
        format!("{VARIABLE_PREFIX}{name}")
    } else {
        name.to_string()
    }
}

/// Identity of the bot a row was exported from.
///
/// Only set when exporting from an inventory, where rows of many bots may be
/// compared side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMeta {
    pub id: String,
    pub name: String,
    pub public_id: Option<String>,
    pub folder: Option<String>,
}

impl BotMeta {
    fn columns(&self) -> [(&'static str, String); 4] {
        [
            ("Bot_Id", self.id.clone()),
            ("Bot_Name", self.name.clone()),
            ("Bot_PublicId", self.public_id.clone().unwrap_or_default()),
            ("Bot_Folder", self.folder.clone().unwrap_or_default()),
        ]
    }
}

/// Render a variable value or answer as a CSV cell.
///
/// Strings are kept raw, lists are joined with `", "`, `null` is empty and
/// anything else is compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Flatten one record.
///
/// Variables carried by the record win; answers only fill columns that no
/// variable produced. An answer whose variable is unknown lands in
/// `Ans_<blockId>`.
pub fn flatten_result(record: &ResultRecord, names: &VariableNames, meta: Option<&BotMeta>) -> Row {
    let mut row = Row::new();

    if let Some(meta) = meta {
        for (column, value) in meta.columns() {
            row.insert(column.to_string(), value);
        }
    }

    row.insert("ResultId".into(), record.id.clone());
    row.insert("SubmittedAt".into(), record.created_at.clone().unwrap_or_default());
    row.insert(
        "IsCompleted".into(),
        record.is_completed.map(|c| c.to_string()).unwrap_or_default(),
    );
    row.insert(
        "ChatSessionId".into(),
        record.last_chat_session_id.clone().unwrap_or_default(),
    );

    for var in &record.variables {
        let column = var
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| var.id.as_deref().and_then(|id| names.get(id)))
            .or(var.id.as_deref());
        if let Some(column) = column {
            row.insert(data_column(column), render_value(&var.value));
        }
    }

    for answer in &record.answers {
        if answer.content.is_null() {
            continue;
        }
        let mapped = answer.variable_id.as_deref().and_then(|id| names.get(id));
        let column = match (mapped, answer.block_id.as_deref()) {
            (Some(name), _) => data_column(name),
            (None, Some(block_id)) => format!("{ANSWER_PREFIX}{block_id}"),
            (None, None) => continue,
        };
        if !row.contains_key(&column) {
            row.insert(column, render_value(&answer.content));
        }
    }

    row
}

/// Final column order for a set of rows: bot metadata, the fixed columns,
/// variables in declaration order, then whatever else appeared, in the order
/// it was first seen.
pub fn order_columns(rows: &[Row], declared: &[String]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    for row in rows {
        for column in row.keys() {
            if !seen.contains(&column.as_str()) {
                seen.push(column.as_str());
            }
        }
    }

    let mut ordered: Vec<String> = seen
        .iter()
        .filter(|c| c.starts_with(META_PREFIX))
        .map(|c| c.to_string())
        .collect();

    for fixed in FIXED_COLUMNS {
        if seen.contains(&fixed) {
            ordered.push(fixed.to_string());
        }
    }

    for name in declared {
        let name = data_column(name);
        if seen.contains(&name.as_str()) && !ordered.contains(&name) {
            ordered.push(name);
        }
    }

    for column in seen {
        if !ordered.iter().any(|c| c == column) {
            ordered.push(column.to_string());
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names() -> VariableNames {
        [("v1", "Name"), ("v2", "Age"), ("v3", "Email")]
            .into_iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect()
    }

    fn record(value: Value) -> ResultRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("Ana")), "Ana");
        assert_eq!(render_value(&json!(["a", "b", 3])), "a, b, 3");
        assert_eq!(render_value(&Value::Null), "");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!({"k": 1})), r#"{"k":1}"#);
    }

    #[test]
    fn test_flatten_uses_variable_names() {
        let rec = record(json!({
            "id": "r1",
            "createdAt": "2024-05-01T10:00:00.000Z",
            "isCompleted": false,
            "lastChatSessionId": "s1",
            "variables": [
                {"id": "v1", "name": "Name", "value": "Ana"},
                {"id": "v2", "value": 28},
                {"id": "v9", "value": "orphan"}
            ]
        }));

        let row = flatten_result(&rec, &names(), None);
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(
            columns,
            vec!["ResultId", "SubmittedAt", "IsCompleted", "ChatSessionId", "Name", "Age", "v9"]
        );
        assert_eq!(row["IsCompleted"], "false");
        assert_eq!(row["Age"], "28");
        assert_eq!(row["v9"], "orphan");
    }

    #[test]
    fn test_answers_fill_missing_columns_only() {
        let rec = record(json!({
            "id": "r1",
            "variables": [{"id": "v1", "name": "Name", "value": "Ana"}],
            "answers": [
                {"blockId": "bk1", "variableId": "v1", "content": "ignored"},
                {"blockId": "bk2", "variableId": "v3", "content": "ana@example.com"},
                {"blockId": "bk3", "variableId": "v8", "content": "x"},
                {"blockId": "bk4", "content": "free text"},
                {"blockId": "bk5", "variableId": "v2", "content": null}
            ]
        }));

        let row = flatten_result(&rec, &names(), None);
        assert_eq!(row["Name"], "Ana");
        assert_eq!(row["Email"], "ana@example.com");
        assert_eq!(row["Ans_bk3"], "x");
        assert_eq!(row["Ans_bk4"], "free text");
        assert!(!row.contains_key("Age"));
    }

    #[test]
    fn test_variables_never_overwrite_reserved_columns() {
        let names: VariableNames = [("v1", "ResultId"), ("v2", "Bot_Score")]
            .into_iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        let rec = record(json!({
            "id": "r1",
            "variables": [{"id": "v1", "value": "from-bot"}],
            "answers": [{"blockId": "bk1", "variableId": "v2", "content": 9}]
        }));
        let meta = BotMeta { id: "b1".into(), ..BotMeta::default() };

        let row = flatten_result(&rec, &names, Some(&meta));
        assert_eq!(row["ResultId"], "r1");
        assert_eq!(row["Var_ResultId"], "from-bot");
        assert_eq!(row["Var_Bot_Score"], "9");
        assert_eq!(row["Bot_Id"], "b1");

        let declared = vec!["Bot_Score".to_string(), "ResultId".to_string()];
        let order = order_columns(&[row], &declared);
        assert_eq!(
            order,
            vec![
                "Bot_Id", "Bot_Name", "Bot_PublicId", "Bot_Folder",
                "ResultId", "SubmittedAt", "IsCompleted", "ChatSessionId",
                "Var_Bot_Score", "Var_ResultId",
            ]
        );
    }

    #[test]
    fn test_meta_columns_come_first() {
        let meta = BotMeta {
            id: "b1".into(),
            name: "Survey".into(),
            public_id: Some("survey".into()),
            folder: None,
        };
        let row = flatten_result(&record(json!({"id": "r1"})), &names(), Some(&meta));
        let columns: Vec<&str> = row.keys().take(5).map(String::as_str).collect();
        assert_eq!(
            columns,
            vec!["Bot_Id", "Bot_Name", "Bot_PublicId", "Bot_Folder", "ResultId"]
        );
        assert_eq!(row["Bot_Folder"], "");
    }

    #[test]
    fn test_order_columns() {
        let mut first = Row::new();
        first.insert("ResultId".into(), "r1".into());
        first.insert("Extra".into(), "x".into());
        first.insert("Age".into(), "28".into());
        first.insert("Bot_Id".into(), "b1".into());

        let mut second = Row::new();
        second.insert("Name".into(), "Bo".into());
        second.insert("Late".into(), "y".into());

        let declared = vec!["Name".to_string(), "Age".to_string(), "Unused".to_string()];
        let order = order_columns(&[first, second], &declared);
        assert_eq!(order, vec!["Bot_Id", "ResultId", "Name", "Age", "Extra", "Late"]);
    }
}
