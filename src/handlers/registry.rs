use super::restart::RestartHandler;
use super::table::CommandTableHandler;
use super::traits::Handler;
use super::url_fetch::UrlFetchHandler;
use crate::config::HandlersConfig;
use crate::executor::ProcessExecutor;
use crate::observability::{Observer, ObserverEvent};
use std::sync::Arc;

/// Everything a handler constructor may depend on.
#[derive(Clone)]
pub struct HandlerContext {
    pub config: HandlersConfig,
    pub executor: Arc<ProcessExecutor>,
}

impl HandlerContext {
    pub fn new(config: HandlersConfig, executor: Arc<ProcessExecutor>) -> Self {
        Self { config, executor }
    }
}

/// A named constructor for one registry entry.
#[derive(Clone, Copy)]
pub struct HandlerFactory {
    /// Stable registry key.
    pub key: &'static str,
    pub build: fn(&HandlerContext) -> anyhow::Result<Box<dyn Handler>>,
}

fn build_system(ctx: &HandlerContext) -> anyhow::Result<Box<dyn Handler>> {
    let handler =
        CommandTableHandler::new("system_commands", &ctx.config.system, ctx.executor.clone())?;
    Ok(Box::new(handler))
}

fn build_services(ctx: &HandlerContext) -> anyhow::Result<Box<dyn Handler>> {
    let handler =
        CommandTableHandler::new("service_commands", &ctx.config.services, ctx.executor.clone())?;
    Ok(Box::new(handler))
}

fn build_restart(ctx: &HandlerContext) -> anyhow::Result<Box<dyn Handler>> {
    Ok(Box::new(RestartHandler::new(
        &ctx.config.restart,
        ctx.executor.clone(),
    )?))
}

fn build_windows(ctx: &HandlerContext) -> anyhow::Result<Box<dyn Handler>> {
    let handler =
        CommandTableHandler::new("windows_commands", &ctx.config.windows, ctx.executor.clone())?;
    Ok(Box::new(handler))
}

fn build_url_fetch(ctx: &HandlerContext) -> anyhow::Result<Box<dyn Handler>> {
    Ok(Box::new(UrlFetchHandler::new(
        &ctx.config.url_fetch,
        ctx.executor.clone(),
    )?))
}

/// Built-in handlers, in dispatch priority order.
pub fn default_factories() -> Vec<HandlerFactory> {
    vec![
        HandlerFactory {
            key: "system_commands",
            build: build_system,
        },
        HandlerFactory {
            key: "service_commands",
            build: build_services,
        },
        HandlerFactory {
            key: "restart_commands",
            build: build_restart,
        },
        HandlerFactory {
            key: "windows_commands",
            build: build_windows,
        },
        HandlerFactory {
            key: "url_fetch",
            build: build_url_fetch,
        },
    ]
}

/// Insertion-ordered, read-only collection of handlers.
///
/// Built once; a reload builds a fresh registry and swaps the `Arc` rather
/// than editing entries in place.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<(String, Box<dyn Handler>)>,
}

impl HandlerRegistry {
    /// Instantiate each factory once, in order.
    ///
    /// Keys listed in `ctx.config.disabled` are skipped. A factory that fails
    /// is logged, reported, and left out; the rest still load.
    pub fn build(factories: &[HandlerFactory], ctx: &HandlerContext, observer: &dyn Observer) -> Self {
        let mut registry = Self::default();

        for factory in factories {
            if ctx.config.disabled.iter().any(|d| d == factory.key) {
                tracing::info!(handler = factory.key, "Handler disabled by config");
                continue;
            }

            match (factory.build)(ctx) {
                Ok(handler) => {
                    if registry.insert(factory.key, handler) {
                        tracing::info!(handler = factory.key, "Loaded command handler");
                    }
                }
                Err(e) => {
                    tracing::warn!(handler = factory.key, "Failed to load handler: {e:#}");
                    observer.record_event(&ObserverEvent::HandlerLoadFailed {
                        handler: factory.key.to_string(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        tracing::info!("Loaded {} command handlers", registry.len());
        registry
    }

    /// Registry keyed by each handler's own name, in the given order.
    pub fn from_handlers(handlers: impl IntoIterator<Item = Box<dyn Handler>>) -> Self {
        let mut registry = Self::default();
        for handler in handlers {
            let key = handler.name().to_string();
            registry.insert(&key, handler);
        }
        registry
    }

    /// Returns `false` (and keeps the first) when `key` is already present.
    fn insert(&mut self, key: &str, handler: Box<dyn Handler>) -> bool {
        if self.get(key).is_some() {
            tracing::warn!(handler = key, "Duplicate handler key ignored");
            return false;
        }
        self.entries.push((key.to_string(), handler));
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Handler)> {
        self.entries.iter().map(|(k, h)| (k.as_str(), h.as_ref()))
    }

    pub fn get(&self, key: &str) -> Option<&dyn Handler> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, h)| h.as_ref())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `"Commands available:\n"` followed by `"\n<help>"` for every handler
    /// with non-empty help, in registry order.
    pub fn help_text(&self) -> String {
        let mut text = String::from("Commands available:\n");
        for (_, handler) in self.iter() {
            let help = handler.help();
            if !help.is_empty() {
                text.push('\n');
                text.push_str(&help);
            }
        }
        text
    }
}
