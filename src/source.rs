//! External collaborators: where rows, recipes and chat replies come from.
//!
//! Both an HTTP implementation (blocking `reqwest`) and a local-file
//! implementation sit behind the same traits so the session loop does not
//! care which one it talks to.

use crate::config::{PollConfig, ServerConfig};
use crate::csv_reader::read_csv_from_path;
use crate::data::RowStore;
use crate::recipe::{parse_chat_chart, parse_recipe_document, Recipe, RecipeStatus};
use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Supplies the dataset and the chart recipes
pub trait DashboardSource {
    fn fetch_rows(&self) -> Result<RowStore>;
    fn poll_recipes(&self) -> Result<RecipeStatus>;
}

/// Answers free-form questions about the dataset
pub trait ChatService {
    fn ask(&self, question: &str, viz_mode: bool) -> Result<ChatReply>;
}

/// A chat answer with an optional chart to render alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub chart: Option<Recipe>,
}

// =============================================================================
// HTTP
// =============================================================================

#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    server: ServerConfig,
}

impl HttpSource {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(server.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            server: server.clone(),
        })
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.server.url(path);
        debug!(url = url.as_str(), "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", url, status);
        }
        response
            .json::<Value>()
            .with_context(|| format!("{} returned invalid JSON", url))
    }
}

impl DashboardSource for HttpSource {
    fn fetch_rows(&self) -> Result<RowStore> {
        let payload = self.get_json(&self.server.rows_path)?;
        RowStore::from_payload(&payload)
    }

    fn poll_recipes(&self) -> Result<RecipeStatus> {
        let payload = self.get_json(&self.server.recipes_path)?;
        serde_json::from_value(payload).context("Malformed recipe status")
    }
}

impl ChatService for HttpSource {
    fn ask(&self, question: &str, viz_mode: bool) -> Result<ChatReply> {
        let url = self.server.url(&self.server.chat_path);
        debug!(url = url.as_str(), viz_mode, "POST");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "question": question, "vizMode": viz_mode }))
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status();
        let body: Value = response.json().unwrap_or(Value::Null);
        chat_reply_from_response(status.is_success(), status.as_u16(), &body)
    }
}

/// Interpret a chat response body. Non-2xx responses carry `{error}`.
pub fn chat_reply_from_response(success: bool, status: u16, body: &Value) -> Result<ChatReply> {
    if !success {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("chat service returned HTTP {}", status));
        return Err(anyhow!(message));
    }

    let reply = body
        .get("reply")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Chat response is missing 'reply'"))?
        .to_string();

    Ok(ChatReply {
        reply,
        chart: parse_chat_chart(body.get("chart")),
    })
}

// =============================================================================
// Local files
// =============================================================================

/// Rows from a CSV file, recipes from a JSON document. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    pub data: Option<PathBuf>,
    pub recipes: Option<PathBuf>,
}

impl FileSource {
    pub fn new(data: Option<PathBuf>, recipes: Option<PathBuf>) -> Self {
        Self { data, recipes }
    }
}

impl DashboardSource for FileSource {
    fn fetch_rows(&self) -> Result<RowStore> {
        match &self.data {
            Some(path) => read_csv_from_path(path),
            None => Ok(RowStore::empty()),
        }
    }

    fn poll_recipes(&self) -> Result<RecipeStatus> {
        let recipes = match &self.recipes {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read recipe file '{}'", path.display()))?;
                Some(parse_recipe_document(&text)?)
            }
            None => None,
        };
        Ok(RecipeStatus { ready: true, recipes })
    }
}

/// Chat stand-in for sessions without a chat service
pub struct OfflineChat;

impl ChatService for OfflineChat {
    fn ask(&self, _question: &str, _viz_mode: bool) -> Result<ChatReply> {
        bail!("No chat service is configured for this session")
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Fetch rows; a failure is logged and yields an empty store
pub fn load_rows_or_empty<S: DashboardSource + ?Sized>(source: &S) -> RowStore {
    match source.fetch_rows() {
        Ok(store) => {
            info!(rows = store.len(), columns = store.headers.len(), "Rows loaded");
            store
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to load rows; continuing with an empty dataset");
            RowStore::empty()
        }
    }
}

/// Poll until the recipe source reports ready. Waits `ready_delay` after a
/// not-ready answer and `error_delay` after a failure. Unbounded unless
/// `max_attempts` is set.
pub fn wait_for_recipes<S, F>(source: &S, poll: &PollConfig, mut sleep: F) -> Result<Vec<Recipe>>
where
    S: DashboardSource + ?Sized,
    F: FnMut(Duration),
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let delay = match source.poll_recipes() {
            Ok(status) if status.ready => {
                let recipes = status.into_recipes();
                info!(recipes = recipes.len(), attempts, "Recipes ready");
                return Ok(recipes);
            }
            Ok(_) => {
                debug!(attempts, "Recipes not ready yet");
                poll.ready_delay()
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), attempts, "Recipe poll failed");
                poll.error_delay()
            }
        };

        if let Some(max) = poll.max_attempts {
            if attempts >= max {
                bail!("Recipes were not ready after {} attempts", attempts);
            }
        }
        sleep(delay);
    }
}
