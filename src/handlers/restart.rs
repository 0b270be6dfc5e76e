use super::traits::{Delivery, Handler, HandlerError, Responder};
use crate::config::{CommandSpec, RestartConfig};
use crate::executor::ProcessExecutor;
use async_trait::async_trait;
use std::sync::Arc;

const PREFIX: &str = "restart ";

/// `restart <device>`: power-cycles one of a fixed set of devices.
pub struct RestartHandler {
    devices: Vec<CommandSpec>,
    executor: Arc<ProcessExecutor>,
}

impl RestartHandler {
    pub fn new(config: &RestartConfig, executor: Arc<ProcessExecutor>) -> anyhow::Result<Self> {
        if let Some(empty) = config.devices.iter().find(|d| d.argv.is_empty()) {
            anyhow::bail!("device '{}' has an empty argv", empty.name);
        }
        Ok(Self {
            devices: config.devices.clone(),
            executor,
        })
    }

    fn device_list(&self) -> String {
        let names: Vec<&str> = self.devices.iter().map(|d| d.name.as_str()).collect();
        format!("({})", names.join("|"))
    }

    fn usage(&self) -> String {
        format!("Usage: restart {}", self.device_list())
    }
}

#[async_trait]
impl Handler for RestartHandler {
    fn name(&self) -> &str {
        "restart_commands"
    }

    fn can_handle(&self, command: &str) -> bool {
        command.starts_with(PREFIX)
    }

    async fn execute(&self, command: &str, out: &Responder<'_>) -> anyhow::Result<Delivery> {
        let device = command
            .strip_prefix(PREFIX)
            .ok_or_else(|| HandlerError::unrecognized(self.name(), command))?
            .trim();

        match self.devices.iter().find(|d| d.name == device) {
            Some(spec) => {
                let output = self.executor.run(&spec.argv).await;
                out.send(&output).await
            }
            None => out.send(&self.usage()).await,
        }
    }

    fn help(&self) -> String {
        format!("Restart: restart {}", self.device_list())
    }
}
