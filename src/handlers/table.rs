use super::traits::{Delivery, Handler, HandlerError, Responder};
use crate::config::{CommandSpec, CommandTableConfig, ReplyStyle};
use crate::executor::ProcessExecutor;
use async_trait::async_trait;
use std::sync::Arc;

/// Exact-match command table: each command name runs one fixed argv.
///
/// Backs the `system_commands`, `service_commands` and `windows_commands`
/// registry entries; only the table data and reply style differ.
pub struct CommandTableHandler {
    name: String,
    label: String,
    style: ReplyStyle,
    commands: Vec<CommandSpec>,
    executor: Arc<ProcessExecutor>,
}

impl CommandTableHandler {
    pub fn new(
        name: &str,
        config: &CommandTableConfig,
        executor: Arc<ProcessExecutor>,
    ) -> anyhow::Result<Self> {
        if let Some(empty) = config.commands.iter().find(|c| c.argv.is_empty()) {
            anyhow::bail!("command '{}' has an empty argv", empty.name);
        }
        Ok(Self {
            name: name.to_string(),
            label: config.label.clone(),
            style: config.style,
            commands: config.commands.clone(),
            executor,
        })
    }

    fn lookup(&self, command: &str) -> Option<&CommandSpec> {
        let command = command.trim();
        self.commands.iter().find(|spec| spec.name == command)
    }

    async fn reply_confirmed(
        &self,
        spec: &CommandSpec,
        out: &Responder<'_>,
    ) -> anyhow::Result<Delivery> {
        let mut delivery = Delivery::default();
        if spec.name.contains("shutdown") {
            delivery += out.send(&format!("🔄 Initiating {}...", spec.name)).await?;
        }

        let output = self.executor.run(&spec.argv).await;
        delivery += if output.trim().is_empty() {
            out.send(&format!("✅ {} completed successfully", spec.name))
                .await?
        } else {
            out.send(&format!("Result: {output}")).await?
        };
        Ok(delivery)
    }
}

#[async_trait]
impl Handler for CommandTableHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, command: &str) -> bool {
        self.lookup(command).is_some()
    }

    async fn execute(&self, command: &str, out: &Responder<'_>) -> anyhow::Result<Delivery> {
        let spec = self
            .lookup(command)
            .ok_or_else(|| HandlerError::unrecognized(&self.name, command))?;

        match self.style {
            ReplyStyle::Plain => {
                let output = self.executor.run(&spec.argv).await;
                out.send(&output).await
            }
            ReplyStyle::Confirmed => self.reply_confirmed(spec, out).await,
        }
    }

    fn help(&self) -> String {
        if self.commands.is_empty() {
            return String::new();
        }
        let names: Vec<&str> = self.commands.iter().map(|c| c.name.as_str()).collect();
        format!("{}: {}", self.label, names.join(", "))
    }
}
