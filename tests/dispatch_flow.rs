//! End-to-end dispatch: gate, registry order, real subprocesses, chunked
//! replies, all through the public library API.

#![cfg(unix)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use teleshell::channels::traits::{Channel, ChannelMessage, SendMessage, SenderIdentity};
use teleshell::chunker::NO_TEXT_PLACEHOLDER;
use teleshell::config::{CommandSpec, CommandTableConfig, HandlersConfig, ReplyStyle};
use teleshell::executor::ProcessExecutor;
use teleshell::handlers::{HandlerContext, HandlerRegistry, default_factories};
use teleshell::observability::NoopObserver;
use teleshell::security::{AllowlistGate, FORBIDDEN_REPLY, Gate, OpenGate};
use teleshell::{DispatchOutcome, Dispatcher};

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<SendMessage>>,
}

impl Outbox {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|m| m.recipient.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for Outbox {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
        self.sent.lock().push(message.clone());
        Ok(())
    }

    async fn listen(&self, _tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        Ok(())
    }
}

fn message(sender: SenderIdentity, content: &str) -> ChannelMessage {
    ChannelMessage {
        id: "m1".into(),
        sender,
        reply_target: "555".into(),
        content: content.into(),
        channel: "outbox".into(),
        timestamp: 0,
    }
}

fn admin() -> SenderIdentity {
    SenderIdentity::new(1001, Some("admin"))
}

/// Default handler set, with every table pointed at harmless commands.
fn handlers_config(script: std::path::PathBuf) -> HandlersConfig {
    let mut config = HandlersConfig::default();
    config.system = CommandTableConfig {
        label: "System".into(),
        style: ReplyStyle::Plain,
        commands: vec![
            CommandSpec::new("uptime", &["echo", "up 3 days"]),
            CommandSpec::new("df", &["printf", "a\\nb\\nc\\nd\\n"]),
            CommandSpec::new("quiet", &["true"]),
            CommandSpec::new("slow", &["sleep", "30"]),
        ],
    };
    config.services.commands = vec![CommandSpec::new("kodi stop", &["echo", "kodi off"])];
    config.windows.commands = vec![CommandSpec::new("shutdown-nuky", &["true"])];
    config.restart.devices = vec![CommandSpec::new("router", &["echo", "router rebooting"])];
    config.url_fetch.interpreter = "sh".into();
    config.url_fetch.script = script;
    config
}

fn dispatcher(gate: Arc<dyn Gate>, script: std::path::PathBuf, chunk_size: usize) -> Dispatcher {
    let executor = Arc::new(ProcessExecutor::new(Duration::from_secs(2)));
    let ctx = HandlerContext::new(handlers_config(script), executor);
    let registry = HandlerRegistry::build(&default_factories(), &ctx, &NoopObserver);
    Dispatcher::new(Arc::new(registry), gate, Arc::new(NoopObserver)).with_chunk_size(chunk_size)
}

fn fetch_script(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let script = dir.path().join("fetch.sh");
    std::fs::write(&script, "echo \"fetched $1\"\n").unwrap();
    script
}

// ── Gate ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unauthorised_sender_gets_forbidden_and_nothing_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    let gate = Arc::new(AllowlistGate::new(vec![1001], vec!["admin".into()]));
    let d = dispatcher(gate, fetch_script(&dir), 3500);
    let out = Outbox::default();

    let outcome = d
        .dispatch(&message(SenderIdentity::new(7, Some("admin")), "uptime"), &out)
        .await;

    assert_eq!(outcome, DispatchOutcome::Rejected);
    assert_eq!(out.texts(), vec![FORBIDDEN_REPLY]);
    assert_eq!(out.recipients(), vec!["555"]);
}

#[tokio::test]
async fn allow_listed_sender_reaches_handlers() {
    let dir = tempfile::TempDir::new().unwrap();
    let gate = Arc::new(AllowlistGate::new(vec![1001], vec!["@admin".into()]));
    let d = dispatcher(gate, fetch_script(&dir), 3500);
    let out = Outbox::default();

    let outcome = d.dispatch(&message(admin(), "uptime"), &out).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Handled {
            handler: "system_commands".into(),
            messages: 1
        }
    );
    assert_eq!(out.texts(), vec!["up 3 days\n"]);
}

// ── Routing ───────────────────────────────────────────────────────

#[tokio::test]
async fn each_default_handler_is_reachable() {
    let dir = tempfile::TempDir::new().unwrap();
    let d = dispatcher(Arc::new(OpenGate), fetch_script(&dir), 3500);

    let cases = [
        ("kodi stop", "service_commands", "kodi off\n"),
        ("restart router", "restart_commands", "router rebooting\n"),
        (
            "restart toaster",
            "restart_commands",
            "Usage: restart (router)",
        ),
        (
            "shutdown-nuky",
            "windows_commands",
            "🔄 Initiating shutdown-nuky...",
        ),
        ("https://example.com", "url_fetch", "fetched https://example.com"),
    ];

    for (command, handler, first_reply) in cases {
        let out = Outbox::default();
        let outcome = d.dispatch(&message(admin(), command), &out).await;

        match outcome {
            DispatchOutcome::Handled { handler: h, .. } => assert_eq!(h, handler, "{command}"),
            other => panic!("{command}: unexpected outcome {other:?}"),
        }
        assert_eq!(out.texts()[0], first_reply, "{command}");
    }
}

#[tokio::test]
async fn confirmed_style_reports_success_on_empty_output() {
    let dir = tempfile::TempDir::new().unwrap();
    let d = dispatcher(Arc::new(OpenGate), fetch_script(&dir), 3500);
    let out = Outbox::default();

    d.dispatch(&message(admin(), "shutdown-nuky"), &out).await;

    assert_eq!(
        out.texts(),
        vec![
            "🔄 Initiating shutdown-nuky...",
            "✅ shutdown-nuky completed successfully"
        ]
    );
}

#[tokio::test]
async fn surrounding_whitespace_is_ignored() {
    let dir = tempfile::TempDir::new().unwrap();
    let d = dispatcher(Arc::new(OpenGate), fetch_script(&dir), 3500);
    let out = Outbox::default();

    d.dispatch(&message(admin(), "  uptime \n"), &out).await;

    assert_eq!(out.texts(), vec!["up 3 days\n"]);
}

// ── Help fallback ─────────────────────────────────────────────────

#[tokio::test]
async fn unknown_command_gets_aggregated_help() {
    let dir = tempfile::TempDir::new().unwrap();
    let d = dispatcher(Arc::new(OpenGate), fetch_script(&dir), 3500);
    let out = Outbox::default();

    let outcome = d.dispatch(&message(admin(), "make coffee"), &out).await;

    assert_eq!(outcome, DispatchOutcome::Help { messages: 1 });
    let help = &out.texts()[0];
    assert!(help.starts_with("Commands available:\n"));
    let system = help.find("System: uptime, df, quiet, slow").unwrap();
    let services = help.find("Services: kodi stop").unwrap();
    let restart = help.find("Restart: restart (router)").unwrap();
    let windows = help.find("Windows: shutdown-nuky").unwrap();
    let url = help.find("URL fetching commands:").unwrap();
    assert!(system < services && services < restart && restart < windows && windows < url);
}

#[tokio::test]
async fn disabled_handler_falls_through_to_help() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = handlers_config(fetch_script(&dir));
    config.disabled = vec!["restart_commands".into()];
    let ctx = HandlerContext::new(config, Arc::new(ProcessExecutor::default()));
    let registry = HandlerRegistry::build(&default_factories(), &ctx, &NoopObserver);
    let d = Dispatcher::new(Arc::new(registry), Arc::new(OpenGate), Arc::new(NoopObserver));
    let out = Outbox::default();

    let outcome = d.dispatch(&message(admin(), "restart router"), &out).await;

    assert!(matches!(outcome, DispatchOutcome::Help { .. }));
    assert!(!out.texts()[0].contains("Restart:"));
}

// ── Executor and chunking through dispatch ────────────────────────

#[tokio::test]
async fn silent_command_gets_placeholder() {
    let dir = tempfile::TempDir::new().unwrap();
    let d = dispatcher(Arc::new(OpenGate), fetch_script(&dir), 3500);
    let out = Outbox::default();

    d.dispatch(&message(admin(), "quiet"), &out).await;

    assert_eq!(out.texts(), vec![NO_TEXT_PLACEHOLDER]);
}

#[tokio::test]
async fn timed_out_command_still_replies() {
    let dir = tempfile::TempDir::new().unwrap();
    let d = dispatcher(Arc::new(OpenGate), fetch_script(&dir), 3500);
    let out = Outbox::default();

    let started = std::time::Instant::now();
    let outcome = d.dispatch(&message(admin(), "slow"), &out).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(outcome, DispatchOutcome::Handled { .. }));
    assert_eq!(out.texts(), vec!["Command timed out after 2 seconds"]);
}

#[tokio::test]
async fn long_output_is_split_on_line_boundaries() {
    let dir = tempfile::TempDir::new().unwrap();
    let d = dispatcher(Arc::new(OpenGate), fetch_script(&dir), 4);
    let out = Outbox::default();

    let outcome = d.dispatch(&message(admin(), "df"), &out).await;

    assert_eq!(outcome.messages(), 2);
    assert_eq!(out.texts(), vec!["a\nb", "c\nd"]);
    assert!(out.texts().iter().all(|t| t.chars().count() <= 4));
}

#[tokio::test]
async fn missing_fetch_script_is_reported_to_sender() {
    let d = dispatcher(
        Arc::new(OpenGate),
        std::path::PathBuf::from("/nonexistent/fetch.py"),
        3500,
    );
    let out = Outbox::default();

    d.dispatch(&message(admin(), "url https://example.com"), &out)
        .await;

    assert_eq!(
        out.texts(),
        vec!["Fetch script not found at /nonexistent/fetch.py"]
    );
}
