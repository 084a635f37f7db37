//! Bulk seeding: replay CSV rows through the chat API so each row becomes a
//! real result on the instance.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use typebot_client::{PrefilledVariables, TypebotClient};

use crate::config::Config;
use crate::error::{HarvestError, Result};

/// One CSV row, split into prefilled variables and ordered answers.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRow {
    /// 1-based data row number, for logs.
    pub line: usize,
    pub prefilled: PrefilledVariables,
    /// One slot per answer column, `None` for an empty cell.
    pub answers: Vec<Option<String>>,
}

impl SeedRow {
    /// Answers up to the first empty cell. Later cells cannot be sent
    /// without shifting them onto the wrong question.
    pub fn replayable_answers(&self) -> &[Option<String>] {
        let end = self
            .answers
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.answers.len());
        &self.answers[..end]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedPlan {
    pub prefill_columns: Vec<String>,
    pub answer_columns: Vec<String>,
    pub rows: Vec<SeedRow>,
}

impl SeedPlan {
    pub fn from_csv(path: &Path, prefill_columns: &[String]) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| HarvestError::io(path, e))?;
        Self::from_reader(file, prefill_columns)
    }

    /// Columns named in `prefill_columns` become prefilled variables; every
    /// other column is an answer, submitted in header order. Empty prefill
    /// cells are left out; empty answer cells keep their slot.
    pub fn from_reader<R: Read>(reader: R, prefill_columns: &[String]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(HarvestError::Input("seed CSV has no header row".into()));
        }

        let is_prefill = |h: &str| prefill_columns.iter().any(|p| p == h);
        let mut plan = SeedPlan {
            prefill_columns: headers.iter().filter(|h| is_prefill(h)).cloned().collect(),
            answer_columns: headers
                .iter()
                .filter(|h| !h.is_empty() && !is_prefill(h))
                .cloned()
                .collect(),
            rows: Vec::new(),
        };

        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let mut row = SeedRow {
                line: i + 1,
                prefilled: PrefilledVariables::new(),
                answers: Vec::new(),
            };

            for (i, header) in headers.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                let cell = record.get(i).map(str::trim).filter(|c| !c.is_empty());
                if is_prefill(header) {
                    if let Some(cell) = cell {
                        row.prefilled.insert(header.clone(), Value::String(cell.to_string()));
                    }
                } else {
                    row.answers.push(cell.map(str::to_string));
                }
            }

            if row.prefilled.is_empty() && row.answers.iter().all(Option::is_none) {
                debug!(line = row.line, "Skipping empty seed row");
                continue;
            }
            plan.rows.push(row);
        }

        info!(
            rows = plan.rows.len(),
            prefill = ?plan.prefill_columns,
            answers = plan.answer_columns.len(),
            "Seed plan loaded"
        );
        Ok(plan)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    /// Only replay the first `limit` rows.
    pub limit: Option<usize>,
    /// Pause before each answer.
    pub turn_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The flow reached its end.
    Completed { turns: u32 },
    /// The answers ran out, or hit an empty cell, while the flow still
    /// waits for input.
    Partial { turns: u32 },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReport {
    pub line: usize,
    pub session_id: Option<String>,
    pub outcome: RowOutcome,
}

#[derive(Debug, Default)]
pub struct SeedReport {
    pub rows: Vec<RowReport>,
}

impl SeedReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Completed { .. }))
    }

    pub fn partial(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Partial { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&RowOutcome) -> bool) -> usize {
        self.rows.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Replay one row. The session id is reported even when a later turn fails.
async fn seed_row(
    client: &TypebotClient,
    bot_id: &str,
    row: &SeedRow,
    turn_delay: Duration,
    session_id: &mut Option<String>,
) -> typebot_client::Result<RowOutcome> {
    let mut session = client.start_chat(bot_id, &row.prefilled).await?;
    *session_id = Some(session.session_id().to_string());

    let answers = row.replayable_answers();
    if answers.len() < row.answers.len() && row.answers[answers.len()..].iter().any(Option::is_some) {
        warn!(
            line = row.line,
            column = answers.len() + 1,
            "Empty answer cell, later answers of this row are not sent"
        );
    }

    for answer in answers.iter().flatten() {
        if session.is_finished() {
            break;
        }
        if !turn_delay.is_zero() {
            tokio::time::sleep(turn_delay).await;
        }
        session.reply(client, answer).await?;
    }

    let turns = session.turns();
    Ok(if session.is_finished() {
        RowOutcome::Completed { turns }
    } else {
        RowOutcome::Partial { turns }
    })
}

/// Replay the plan row by row.
///
/// A failing row is recorded and the next one starts. An auth failure first
/// reloads `AUTH_TOKEN`; if it changed the row is replayed once from a new
/// session, otherwise the run stops.
pub async fn run_seed(
    client: &TypebotClient,
    bot_id: &str,
    plan: &SeedPlan,
    opts: &SeedOptions,
    config: &mut Config,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let rows = plan.rows.iter().take(opts.limit.unwrap_or(usize::MAX));

    for row in rows {
        let mut session_id = None;
        let mut result = seed_row(client, bot_id, row, opts.turn_delay, &mut session_id).await;

        if matches!(&result, Err(e) if e.is_auth()) {
            match config.reload_auth_token() {
                Some(token) => {
                    warn!(line = row.line, session_id = ?session_id, "Auth failed, replaying row with reloaded token");
                    client.set_auth_token(token).await;
                    session_id = None;
                    result = seed_row(client, bot_id, row, opts.turn_delay, &mut session_id).await;
                }
                None => {
                    error!(line = row.line, "Auth failed and no new token is available");
                }
            }
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_auth() => {
                error!(line = row.line, "Aborting seed run");
                return Err(e.into());
            }
            Err(e) => {
                warn!(line = row.line, session_id = ?session_id, error = %e, "Seed row failed");
                RowOutcome::Failed(e.to_string())
            }
        };

        info!(line = row.line, session_id = ?session_id, outcome = ?outcome, "Seed row done");
        report.rows.push(RowReport {
            line: row.line,
            session_id,
            outcome,
        });
    }

    info!(
        completed = report.completed(),
        partial = report.partial(),
        failed = report.failed(),
        "Seed run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefill() -> Vec<String> {
        vec!["Name".to_string(), "Phone".to_string()]
    }

    #[test]
    fn test_plan_splits_prefill_and_answers() {
        let csv = "\u{feff}Name,Consent,Phone,Age\nAna,yes,5511999,28\nBo,,,\n";
        let plan = SeedPlan::from_reader(csv.as_bytes(), &prefill()).unwrap();

        assert_eq!(plan.prefill_columns, vec!["Name", "Phone"]);
        assert_eq!(plan.answer_columns, vec!["Consent", "Age"]);
        assert_eq!(plan.rows.len(), 2);

        let ana = &plan.rows[0];
        assert_eq!(ana.line, 1);
        assert_eq!(ana.prefilled.get("Name"), Some(&Value::String("Ana".into())));
        assert_eq!(ana.prefilled.get("Phone"), Some(&Value::String("5511999".into())));
        assert_eq!(ana.answers, vec![Some("yes".to_string()), Some("28".to_string())]);

        let bo = &plan.rows[1];
        assert_eq!(bo.prefilled.len(), 1);
        assert_eq!(bo.answers, vec![None, None]);
        assert!(bo.replayable_answers().is_empty());
    }

    #[test]
    fn test_empty_cell_keeps_answer_slots() {
        let csv = "Q1,Q2,Q3
a,,c
d,e
";
        let plan = SeedPlan::from_reader(csv.as_bytes(), &[]).unwrap();

        let first = &plan.rows[0];
        assert_eq!(first.answers, vec![Some("a".to_string()), None, Some("c".to_string())]);
        assert_eq!(first.replayable_answers(), &[Some("a".to_string())]);

        // Short records read as empty trailing cells.
        let second = &plan.rows[1];
        assert_eq!(second.answers, vec![Some("d".to_string()), Some("e".to_string()), None]);
        assert_eq!(second.replayable_answers().len(), 2);
    }

    #[test]
    fn test_plan_skips_blank_rows() {
        let csv = "Name,Age\n,\nCy,40\n";
        let plan = SeedPlan::from_reader(csv.as_bytes(), &prefill()).unwrap();
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rows[0].line, 2);
    }

    #[test]
    fn test_plan_without_prefill_columns() {
        let csv = "Q1,Q2\na,b\n";
        let plan = SeedPlan::from_reader(csv.as_bytes(), &[]).unwrap();
        assert!(plan.rows[0].prefilled.is_empty());
        assert_eq!(plan.rows[0].answers, vec![Some("a".to_string()), Some("b".to_string())]);
    }

    #[test]
    fn test_report_counts() {
        let report = SeedReport {
            rows: vec![
                RowReport { line: 1, session_id: Some("s1".into()), outcome: RowOutcome::Completed { turns: 2 } },
                RowReport { line: 2, session_id: Some("s2".into()), outcome: RowOutcome::Partial { turns: 1 } },
                RowReport { line: 3, session_id: None, outcome: RowOutcome::Failed("boom".into()) },
            ],
        };
        assert_eq!(report.completed(), 1);
        assert_eq!(report.partial(), 1);
        assert_eq!(report.failed(), 1);
    }
}
