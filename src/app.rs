//! app.rs
//!
//! Wires the client, parser, formatter and index poller into the two run
//! modes:
//! - one-shot: `elasticsearch-cli get _cat/indices`
//! - interactive: a rustyline REPL whose prompt colour follows cluster health
//!   and whose tab completion is refreshed in the background by the poller

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, EditMode, Editor};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cli::completer::{IndexCompleter, SharedCompletionTree, refresh_completer};
use crate::cli::formatter::{FormatOptions, format_response};
use crate::cli::parser::InputParser;
use crate::client::config::ClientConfig;
use crate::client::http_client::{HttpClient, RemoteCaller};
use crate::client::models::{ClusterHealth, HealthStatus};
use crate::config::Settings;
use crate::poller::IndexPoller;

/// Used when the cluster health cannot be retrieved.
pub const DEFAULT_PROMPT: &str = "\x1b[34melasticsearch> \x1b[0m";
pub const GREEN_PROMPT: &str = "\x1b[32melasticsearch> \x1b[0m";
pub const YELLOW_PROMPT: &str = "\x1b[33melasticsearch> \x1b[0m";
pub const RED_PROMPT: &str = "\x1b[31melasticsearch> \x1b[0m";

const CLUSTER_HEALTH_ENDPOINT: &str = "/_cluster/health";
const HISTORY_FILE: &str = "elasticsearch-cli.history";

type ReplEditor = Editor<IndexCompleter, DefaultHistory>;

pub struct Application {
    client: Arc<HttpClient>,
    verbose: bool,
    poll_interval: i64,
}

impl Application {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut cfg = ClientConfig::new(
            &settings.host,
            settings.port,
            settings.user.as_str(),
            settings.pass.as_str(),
            settings.timeout,
        )
        .context("invalid client configuration")?;
        for (key, value) in &settings.headers {
            cfg.set_header(key, value)?;
        }

        let client = HttpClient::new(cfg).context("failed to build http client")?;

        Ok(Self {
            client: Arc::new(client),
            verbose: settings.verbose,
            poll_interval: settings.poll_interval,
        })
    }

    /// One-shot mode: `args` is `METHOD [PATH [BODY]]`.
    pub async fn handle_cli<S: AsRef<str>>(&self, args: &[S]) -> Result<()> {
        let input = InputParser::new(args)?;
        self.dispatch(&input, false).await
    }

    async fn dispatch(&self, input: &InputParser, interactive: bool) -> Result<()> {
        let res = self
            .client
            .call(input.method(), input.url(), input.body())
            .await
            .with_context(|| format!("{} {} failed", input.method(), input.url()))?;

        let opts = FormatOptions {
            method: input.method(),
            path: input.url(),
            verbose: self.verbose,
            interactive,
        };
        let mut buf = Vec::new();
        format_response(res, opts, &mut buf).await?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&buf)?;
        stdout.flush()?;
        Ok(())
    }

    /// Runs the REPL until `exit`, `quit` or EOF. Needs the multi-threaded
    /// runtime: reading a line blocks the current worker.
    pub async fn interactive(&mut self) -> Result<()> {
        info!(cluster = %self.client.config().address(), "starting interactive session");
        let tree = SharedCompletionTree::new();
        let mut rl = build_editor(tree.clone())?;
        let history = history_path();
        if let Err(e) = rl.load_history(&history) {
            debug!(path = %history.display(), "no history loaded: {e}");
        }

        let (tx, rx) = mpsc::channel(1);
        let poller = IndexPoller::new(self.client.clone(), tx, self.poll_interval);
        let poller_handle = poller.handle();
        let refresher = tokio::spawn(refresh_completer(rx, tree));
        let polling = tokio::spawn(poller.start());

        let result = self.read_loop(&mut rl).await;

        poller_handle.stop();
        for (task, handle) in [("index poller", polling), ("completion refresh", refresher)] {
            if let Err(e) = handle.await {
                warn!("{task} task failed: {e}");
            }
        }
        if let Err(e) = rl.save_history(&history) {
            warn!(path = %history.display(), "failed to save history: {e}");
        }

        result
    }

    async fn read_loop(&mut self, rl: &mut ReplEditor) -> Result<()> {
        loop {
            let prompt = cluster_prompt(self.client.as_ref()).await;
            let line = match tokio::task::block_in_place(|| rl.readline(prompt)) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e).context("readline failed"),
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Err(e) = rl.add_history_entry(line) {
                debug!("history entry dropped: {e}");
            }
            if matches!(line, "exit" | "quit") {
                break;
            }

            let input: Vec<&str> = line.split_whitespace().collect();
            let outcome = if is_set_command(&input) {
                self.do_set_command(&input)
            } else {
                match InputParser::from_line(line) {
                    Ok(parsed) => self.dispatch(&parsed, true).await,
                    Err(e) => Err(e.into()),
                }
            };
            if let Err(e) = outcome {
                error!("{e:#}");
            }
        }
        Ok(())
    }

    fn do_set_command(&mut self, input: &[&str]) -> Result<()> {
        match input {
            [_, "verbose"] => self.verbose = true,
            [_, "verbose", value] => {
                self.verbose = value
                    .parse()
                    .with_context(|| format!("{value} is not true or false"))?;
            }
            [_, "host", host] => self.client.set_host(host)?,
            [_, "port", port] => {
                let port = port
                    .parse()
                    .with_context(|| format!("{port} is not a valid port"))?;
                self.client.set_port(port);
            }
            [_, "user", user] => self.client.set_user(user),
            [_, "pass", pass] => self.client.set_pass(pass),
            _ => bail!("usage: set user|pass|host|port <value>, set verbose [true|false]"),
        }
        Ok(())
    }
}

/// Verbs are case-insensitive, `set` included, matching the completer.
fn is_set_command(words: &[&str]) -> bool {
    words.first().is_some_and(|w| w.eq_ignore_ascii_case("set"))
}

fn build_editor(tree: SharedCompletionTree) -> Result<ReplEditor> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut rl = Editor::with_config(config).context("failed to initialize line editor")?;
    rl.set_helper(Some(IndexCompleter::new(tree)));
    Ok(rl)
}

fn history_path() -> PathBuf {
    std::env::temp_dir().join(HISTORY_FILE)
}

async fn cluster_prompt(client: &dyn RemoteCaller) -> &'static str {
    let res = match client.call("GET", CLUSTER_HEALTH_ENDPOINT, "").await {
        Ok(res) => res,
        Err(e) => {
            debug!("cluster health unavailable: {e:#}");
            return DEFAULT_PROMPT;
        }
    };

    match res.json::<ClusterHealth>().await {
        Ok(health) => prompt_for(health.status),
        Err(e) => {
            debug!("cluster health unreadable: {e:#}");
            DEFAULT_PROMPT
        }
    }
}

fn prompt_for(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Green => GREEN_PROMPT,
        HealthStatus::Yellow => YELLOW_PROMPT,
        HealthStatus::Red => RED_PROMPT,
        HealthStatus::Unknown => DEFAULT_PROMPT,
    }
}
