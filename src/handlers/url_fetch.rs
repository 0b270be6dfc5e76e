use super::traits::{Delivery, Handler, HandlerError, Responder};
use crate::config::UrlFetchConfig;
use crate::executor::ProcessExecutor;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

const HELP: &str = "URL fetching commands:
• url <http[s]://...> - Fetch and clean a webpage
• fetch <http[s]://...> - Same as url command
• Just paste a URL - Automatically detected and fetched

The fetcher extracts the main content from web pages and returns clean text.";

/// Fetches a web page through an external cleaner script and returns its
/// text, chunked.
pub struct UrlFetchHandler {
    interpreter: String,
    script: PathBuf,
    url_like: Regex,
    executor: Arc<ProcessExecutor>,
}

impl UrlFetchHandler {
    pub fn new(config: &UrlFetchConfig, executor: Arc<ProcessExecutor>) -> anyhow::Result<Self> {
        if config.interpreter.trim().is_empty() {
            anyhow::bail!("url_fetch interpreter is empty");
        }
        Ok(Self {
            interpreter: config.interpreter.clone(),
            script: config.script.clone(),
            url_like: Regex::new(r"(?i)^\s*https?://")?,
            executor,
        })
    }

    pub fn is_url_like(&self, text: &str) -> bool {
        self.url_like.is_match(text)
    }

    /// The URL part of `command`, or `None` when the command carries none.
    ///
    /// Outer `None`: not a fetch command at all.
    fn extract_url<'c>(&self, command: &'c str) -> Option<Option<&'c str>> {
        let url = if let Some(rest) = strip_prefix_ignore_case(command, "url ") {
            rest
        } else if let Some(rest) = strip_prefix_ignore_case(command, "fetch ") {
            rest
        } else if self.is_url_like(command) {
            command
        } else {
            return None;
        };
        let url = url.trim();
        Some((!url.is_empty()).then_some(url))
    }

    /// Reply text when the cleaner script cannot be used.
    async fn script_problem(&self) -> Option<String> {
        if tokio::fs::metadata(&self.script).await.is_err() {
            return Some(format!(
                "Fetch script not found at {}",
                self.script.display()
            ));
        }
        if tokio::fs::File::open(&self.script).await.is_err() {
            return Some(format!(
                "Fetch script not readable at {}",
                self.script.display()
            ));
        }
        None
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

#[async_trait]
impl Handler for UrlFetchHandler {
    fn name(&self) -> &str {
        "url_fetch"
    }

    fn can_handle(&self, command: &str) -> bool {
        self.extract_url(command).is_some()
    }

    async fn execute(&self, command: &str, out: &Responder<'_>) -> anyhow::Result<Delivery> {
        let Some(url) = self
            .extract_url(command)
            .ok_or_else(|| HandlerError::unrecognized(self.name(), command))?
        else {
            return out.send("No URL provided").await;
        };

        if let Some(problem) = self.script_problem().await {
            tracing::warn!(script = %self.script.display(), "{problem}");
            return out.send(&problem).await;
        }

        let argv = vec![
            self.interpreter.clone(),
            self.script.display().to_string(),
            url.to_string(),
        ];
        let output = self.executor.run(&argv).await;
        out.send_chunked(&output).await
    }

    fn help(&self) -> String {
        HELP.to_string()
    }
}
