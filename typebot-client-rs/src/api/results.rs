//! Result listing, cursor pagination and single-result retrieval.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::client::TypebotClient;
use crate::config;
use crate::error::{Error, Result};
use crate::models::result::{ResultPage, ResultRecord, ResultsQuery};
use crate::models::unwrap_envelope;
use crate::transport::http::TypebotHttpClient;

/// Fetch one page of results.
///
/// `cursor` must come from a previous page obtained for the same bot and
/// the same `query`.
pub async fn fetch_results_page(
    http: &TypebotHttpClient,
    base_url: &str,
    bot_id: &str,
    cursor: Option<&str>,
    query: &ResultsQuery,
) -> Result<ResultPage> {
    let url = config::results_url(base_url, bot_id);
    let params = query.to_params(cursor);

    let body = http
        .get_json(&url, &params, &format!("results of bot {}", bot_id))
        .await?;
    let page: ResultPage = serde_json::from_value(body)?;

    debug!(
        bot_id,
        cursor = cursor.unwrap_or("-"),
        count = page.results.len(),
        next = page.cursor().unwrap_or("-"),
        "Results page fetched"
    );
    Ok(page)
}

/// Fetch a single result from `GET /typebots/{botId}/results/{resultId}`.
pub async fn fetch_result(
    http: &TypebotHttpClient,
    base_url: &str,
    bot_id: &str,
    result_id: &str,
) -> Result<ResultRecord> {
    let url = config::result_url(base_url, bot_id, result_id);
    let body = http
        .get_json(&url, &[], &format!("result {} of bot {}", result_id, bot_id))
        .await?;

    let record = unwrap_envelope(body, "result");
    if record.is_null() {
        return Err(Error::not_found(format!("result {} of bot {}", result_id, bot_id)));
    }
    Ok(serde_json::from_value(record)?)
}

/// Sequential cursor walk over one bot's results.
///
/// The pager owns the bot id and query, so a cursor is only ever replayed
/// against the listing that produced it. It stops when a page carries no
/// cursor, when a page is empty, or when the server hands back a cursor it
/// already returned.
pub struct ResultPager<'a> {
    client: &'a TypebotClient,
    bot_id: String,
    query: ResultsQuery,
    cursor: Option<String>,
    seen_cursors: HashSet<String>,
    pages: u32,
    done: bool,
}

impl<'a> ResultPager<'a> {
    pub(crate) fn new(client: &'a TypebotClient, bot_id: impl Into<String>, query: ResultsQuery) -> Self {
        Self {
            client,
            bot_id: bot_id.into(),
            query,
            cursor: None,
            seen_cursors: HashSet::new(),
            pages: 0,
            done: false,
        }
    }

    /// Number of pages fetched so far.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<ResultPage>> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .client
            .fetch_results_page(&self.bot_id, self.cursor.as_deref(), &self.query)
            .await?;
        self.pages += 1;

        if page.results.is_empty() {
            self.done = true;
            return Ok(None);
        }

        match page.cursor() {
            None => self.done = true,
            Some(next) if self.seen_cursors.contains(next) => {
                warn!(bot_id = self.bot_id.as_str(), cursor = next, "Cursor repeated, stopping pagination");
                self.done = true;
            }
            Some(next) => {
                self.seen_cursors.insert(next.to_string());
                self.cursor = Some(next.to_string());
            }
        }

        Ok(Some(page))
    }

    /// Drain the pager, returning every record once, in first-seen order.
    pub async fn collect_all(mut self) -> Result<Vec<ResultRecord>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        while let Some(page) = self.next_page().await? {
            for record in page.results {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                }
            }
        }

        info!(
            bot_id = self.bot_id.as_str(),
            pages = self.pages,
            records = records.len(),
            "Results listing exhausted"
        );
        Ok(records)
    }
}
