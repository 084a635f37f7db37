//! Conversation results and the paginated listing.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// A variable value captured in a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultVariable {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// One answer submitted to an input block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub variable_id: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A captured run (complete or partial) through the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub has_started: Option<bool>,
    #[serde(default)]
    pub last_chat_session_id: Option<String>,
    #[serde(default)]
    pub variables: Vec<ResultVariable>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// One page of `GET /typebots/{botId}/results`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    #[serde(default)]
    pub results: Vec<ResultRecord>,
    /// Opaque continuation token. Some instances emit a numeric offset.
    #[serde(default, deserialize_with = "deserialize_cursor")]
    pub next_cursor: Option<String>,
}

impl ResultPage {
    /// The cursor for the next page, if the listing continues.
    pub fn cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

fn deserialize_cursor<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Server-side time window applied to the results listing.
///
/// The server defaults to the last seven days when no filter is sent, so
/// callers that need full history must ask for [`TimeFilter::AllTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeFilter {
    Today,
    Last7Days,
    Last30Days,
    MonthToDate,
    LastMonth,
    YearToDate,
    AllTime,
}

impl TimeFilter {
    /// Wire value used in the `timeFilter` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Last7Days => "last7Days",
            Self::Last30Days => "last30Days",
            Self::MonthToDate => "monthToDate",
            Self::LastMonth => "lastMonth",
            Self::YearToDate => "yearToDate",
            Self::AllTime => "allTime",
        }
    }
}

impl std::fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "today" => Ok(Self::Today),
            "last7days" => Ok(Self::Last7Days),
            "last30days" => Ok(Self::Last30Days),
            "monthtodate" => Ok(Self::MonthToDate),
            "lastmonth" => Ok(Self::LastMonth),
            "yeartodate" => Ok(Self::YearToDate),
            "alltime" | "all" => Ok(Self::AllTime),
            _ => Err(format!("Unknown time filter: {s}")),
        }
    }
}

/// Filters for the results listing. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsQuery {
    pub time_filter: Option<TimeFilter>,
    pub limit: Option<u32>,
    /// `Some(true)` lists archived results only.
    pub archived: Option<bool>,
}

impl ResultsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_filter(mut self, filter: TimeFilter) -> Self {
        self.time_filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Query parameters for one page request.
    pub fn to_params(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(filter) = self.time_filter {
            params.push(("timeFilter", filter.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(archived) = self.archived {
            params.push(("isArchived", archived.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        params
    }
}
