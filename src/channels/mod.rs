pub mod cli;
pub mod telegram;
pub mod traits;

pub use cli::CliChannel;
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelMessage, SendMessage, SenderIdentity};

use crate::config::{Config, TelegramConfig};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::executor::ProcessExecutor;
use crate::handlers::{HandlerContext, HandlerRegistry, default_factories};
use crate::observability::{self, Observer, ObserverEvent};
use crate::security::{AllowlistGate, Gate, OpenGate};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Inbound messages buffered between the listener and the dispatcher.
const CHANNEL_MESSAGE_BUFFER: usize = 100;

/// Bound on the `getMe` probe run by `doctor`.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the handler registry described by `config`.
pub fn build_registry(config: &Config, observer: &dyn Observer) -> HandlerRegistry {
    let executor = Arc::new(ProcessExecutor::from_config(&config.executor));
    let ctx = HandlerContext::new(config.handlers.clone(), executor);
    HandlerRegistry::build(&default_factories(), &ctx, observer)
}

/// Wire a dispatcher for `config` behind `gate`.
pub fn build_dispatcher(
    config: &Config,
    gate: Arc<dyn Gate>,
    observer: Arc<dyn Observer>,
) -> Dispatcher {
    let registry = Arc::new(build_registry(config, observer.as_ref()));
    Dispatcher::new(registry, gate, observer).with_chunk_size(config.delivery.chunk_size)
}

/// Text of the greeting sent when the service comes up.
pub fn startup_notice(now: DateTime<Local>) -> String {
    format!(
        "Hey, just woke up man! It is {}",
        now.format("%d %B %Y - %I:%M %p")
    )
}

fn telegram_config(config: &Config) -> Result<&TelegramConfig> {
    let telegram = config.channels_config.telegram.as_ref().with_context(|| {
        format!(
            "Telegram is not configured. Add [channels.telegram] to {} or set TELESHELL_BOT_TOKEN",
            config.config_path.display()
        )
    })?;
    if telegram.bot_token.trim().is_empty() {
        anyhow::bail!("Telegram bot_token is empty");
    }
    Ok(telegram)
}

/// Run the relay on Telegram until Ctrl-C.
pub async fn start_channels(config: Config) -> Result<()> {
    let telegram = telegram_config(&config)?.clone();
    if telegram.allowed_ids.is_empty() || telegram.allowed_usernames.is_empty() {
        tracing::warn!(
            "Telegram allow-list is incomplete (needs both allowed_ids and allowed_usernames); every sender will be rejected"
        );
    }

    let observer: Arc<dyn Observer> = Arc::from(observability::create_observer(&config.observability));
    let channel: Arc<dyn Channel> = Arc::new(TelegramChannel::from_config(&telegram));
    let gate: Arc<dyn Gate> = Arc::new(AllowlistGate::from_config(&telegram));
    let dispatcher = build_dispatcher(&config, gate, observer.clone());

    if telegram.startup_notice {
        send_startup_notice(channel.as_ref(), &telegram).await;
    }

    run_dispatch_loop(&config, channel, dispatcher, observer, true).await
}

/// Run the relay on stdin/stdout for a local operator until EOF or Ctrl-C.
pub async fn start_cli(config: Config) -> Result<()> {
    let observer: Arc<dyn Observer> = Arc::from(observability::create_observer(&config.observability));
    let channel: Arc<dyn Channel> = Arc::new(CliChannel::new());
    let dispatcher = build_dispatcher(&config, Arc::new(OpenGate), observer.clone());

    println!("teleshell interactive mode. Type a command, /quit to exit.");
    run_dispatch_loop(&config, channel, dispatcher, observer, false).await
}

/// Dispatch a single command as the local operator, replying on stdout.
pub async fn run_once(config: &Config, command: &str) -> DispatchOutcome {
    let observer: Arc<dyn Observer> = Arc::from(observability::create_observer(&config.observability));
    let dispatcher = build_dispatcher(config, Arc::new(OpenGate), observer);
    let channel = CliChannel::new();
    let msg = ChannelMessage {
        id: uuid::Uuid::new_v4().to_string(),
        sender: CliChannel::operator(),
        reply_target: "operator".into(),
        content: command.to_string(),
        channel: channel.name().to_string(),
        timestamp: crate::util::unix_timestamp(),
    };
    dispatcher.dispatch(&msg, &channel).await
}

async fn send_startup_notice(channel: &dyn Channel, telegram: &TelegramConfig) {
    let Some(recipient) = telegram.allowed_ids.first() else {
        tracing::info!("No allow-listed id to greet; skipping startup notice");
        return;
    };
    let notice = SendMessage::new(startup_notice(Local::now()), recipient.to_string());
    if let Err(e) = channel.send(&notice).await {
        tracing::warn!("Failed to send startup notice: {e}");
    }
}

/// Pull messages off the listener one at a time until the listener goes
/// away or the process is interrupted. A reload swaps the registry between
/// two dispatch cycles.
async fn run_dispatch_loop(
    config: &Config,
    channel: Arc<dyn Channel>,
    mut dispatcher: Dispatcher,
    observer: Arc<dyn Observer>,
    supervised: bool,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<ChannelMessage>(CHANNEL_MESSAGE_BUFFER);

    let listener = if supervised {
        spawn_supervised_listener(
            channel.clone(),
            tx,
            config.reliability.channel_initial_backoff_secs,
            config.reliability.channel_max_backoff_secs,
            observer.clone(),
        )
    } else {
        let ch = channel.clone();
        tokio::spawn(async move {
            if let Err(e) = ch.listen(tx).await {
                tracing::error!("Channel {} error: {e}", ch.name());
            }
        })
    };

    let mut reload = ReloadSignal::new()?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        channel = channel.name(),
        handlers = dispatcher.registry().len(),
        "Relay started"
    );

    loop {
        tokio::select! {
            maybe_msg = rx.recv() => {
                let Some(msg) = maybe_msg else {
                    tracing::info!("Listener closed; stopping");
                    break;
                };
                dispatcher.dispatch(&msg, channel.as_ref()).await;
            }
            () = reload.recv() => {
                reload_registry(config, &mut dispatcher, observer.as_ref());
            }
            _ = &mut shutdown => {
                tracing::info!("Interrupt received; shutting down");
                break;
            }
        }
    }

    listener.abort();
    observer.flush();
    Ok(())
}

/// Re-read the config file and replace the whole registry. On any error the
/// current registry stays in place.
fn reload_registry(config: &Config, dispatcher: &mut Dispatcher, observer: &dyn Observer) {
    tracing::info!(path = %config.config_path.display(), "Reloading handlers");
    match Config::load_from(&config.config_path) {
        Ok(fresh) => {
            let registry = build_registry(&fresh, observer);
            tracing::info!("Reloaded {} command handlers", registry.len());
            dispatcher.replace_registry(Arc::new(registry));
        }
        Err(e) => {
            tracing::error!("Reload failed, keeping current handlers: {e:#}");
            observer.record_event(&ObserverEvent::Error {
                component: "reload".into(),
                message: format!("{e:#}"),
            });
        }
    }
}

/// Keep `channel.listen` running, restarting it with exponential backoff
/// whenever it returns. Stops once the receiving side is gone.
fn spawn_supervised_listener(
    channel: Arc<dyn Channel>,
    tx: mpsc::Sender<ChannelMessage>,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
    observer: Arc<dyn Observer>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);

        loop {
            let result = channel.listen(tx.clone()).await;

            if tx.is_closed() {
                break;
            }

            match result {
                Ok(()) => {
                    tracing::warn!("Channel {} exited unexpectedly; restarting", channel.name());
                    backoff = initial_backoff_secs.max(1);
                }
                Err(e) => {
                    tracing::error!("Channel {} error: {e}; restarting", channel.name());
                    observer.record_event(&ObserverEvent::Error {
                        component: format!("channel:{}", channel.name()),
                        message: e.to_string(),
                    });
                }
            }

            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}

/// Fires on SIGHUP. Never fires on platforms without it.
struct ReloadSignal {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

impl ReloadSignal {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        let inner = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
        Ok(Self { inner })
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        if self.inner.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}

/// Check the Telegram API and report which handlers load.
pub async fn doctor_channels(config: &Config) -> Result<()> {
    println!("🩺 teleshell doctor");
    println!("  config: {}", config.config_path.display());

    let mut healthy = true;

    match telegram_config(config) {
        Ok(telegram) => {
            let channel = TelegramChannel::from_config(telegram);
            match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, channel.health_check()).await {
                Ok(true) => println!("  ✅ Telegram  healthy"),
                Ok(false) => {
                    healthy = false;
                    println!("  ❌ Telegram  unhealthy (getMe failed; check bot_token and network)");
                }
                Err(_) => {
                    healthy = false;
                    println!("  ⏱️  Telegram  timed out (>{}s)", HEALTH_CHECK_TIMEOUT.as_secs());
                }
            }
            if telegram.allowed_ids.is_empty() || telegram.allowed_usernames.is_empty() {
                println!("  ⚠️  allow-list incomplete: every sender will be rejected");
            }
        }
        Err(e) => {
            healthy = false;
            println!("  ❌ Telegram  {e}");
        }
    }

    let observer = observability::NoopObserver;
    let registry = build_registry(config, &observer);
    let expected = default_factories()
        .iter()
        .filter(|f| !config.handlers.disabled.iter().any(|d| d == f.key))
        .count();
    println!("  handlers loaded: {} ({})", registry.len(), registry.keys().join(", "));
    if registry.len() < expected {
        healthy = false;
        println!("  ❌ some handlers failed to load; see the log for details");
    }

    let script = &config.handlers.url_fetch.script;
    if !config.handlers.disabled.iter().any(|d| d == "url_fetch") && !script.exists() {
        println!("  ⚠️  fetch script missing: {}", script.display());
    }

    if healthy {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("doctor found problems")
    }
}
