use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".teleshell";

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default, rename = "channels")]
    pub channels_config: ChannelsConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub handlers: HandlersConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,
}

fn default_log_level() -> String {
    "info".into()
}

fn app_dir() -> PathBuf {
    let home = UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
    home.join(APP_DIR)
}

// ── Channels ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Numeric Telegram user ids allowed to issue commands.
    #[serde(default)]
    pub allowed_ids: Vec<i64>,
    /// Telegram @handles (without the `@`) allowed to issue commands.
    #[serde(default)]
    pub allowed_usernames: Vec<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Greet the first allow-listed id when the service starts.
    #[serde(default = "default_true")]
    pub startup_notice: bool,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            allowed_ids: Vec::new(),
            allowed_usernames: Vec::new(),
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
            startup_notice: true,
        }
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

// ── Delivery ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum characters per outbound message.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    crate::chunker::TELEGRAM_CHUNK_SIZE
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

// ── Executor ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Hard per-process timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum bytes captured per output stream.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_timeout_secs() -> u64 {
    crate::executor::DEFAULT_TIMEOUT_SECS
}

fn default_max_output_bytes() -> usize {
    crate::executor::MAX_OUTPUT_BYTES
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────

/// One named command and the argument vector it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub argv: Vec<String>,
}

impl CommandSpec {
    pub fn new(name: &str, argv: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            argv: argv.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// How a command table reports its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStyle {
    /// Send the raw process output.
    #[default]
    Plain,
    /// Announce destructive commands first and wrap the result.
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTableConfig {
    /// Help label, e.g. `"System"`.
    pub label: String,
    #[serde(default)]
    pub style: ReplyStyle,
    /// Ordered; help lists commands in this order.
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    #[serde(default)]
    pub devices: Vec<CommandSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFetchConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Helper that prints the cleaned text of a web page.
    #[serde(default = "default_fetch_script")]
    pub script: PathBuf,
}

fn default_interpreter() -> String {
    "python3".into()
}

fn default_fetch_script() -> PathBuf {
    app_dir().join("scripts").join("fetch_clean_url.py")
}

impl Default for UrlFetchConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: default_fetch_script(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlersConfig {
    /// Registry keys to leave out (e.g. `["windows_commands"]`).
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default = "default_system_table")]
    pub system: CommandTableConfig,
    #[serde(default = "default_services_table")]
    pub services: CommandTableConfig,
    #[serde(default = "default_windows_table")]
    pub windows: CommandTableConfig,
    #[serde(default = "default_restart")]
    pub restart: RestartConfig,
    #[serde(default)]
    pub url_fetch: UrlFetchConfig,
}

fn default_system_table() -> CommandTableConfig {
    CommandTableConfig {
        label: "System".into(),
        style: ReplyStyle::Plain,
        commands: vec![
            CommandSpec::new("uptime", &["uptime"]),
            CommandSpec::new("df", &["df", "-h"]),
            CommandSpec::new("last", &["last"]),
        ],
    }
}

fn default_services_table() -> CommandTableConfig {
    CommandTableConfig {
        label: "Services".into(),
        style: ReplyStyle::Plain,
        commands: vec![
            CommandSpec::new(
                "vpn-restart",
                &["sudo", "systemctl", "restart", "openvpn.service"],
            ),
            CommandSpec::new("kodi stop", &["sudo", "manage_kodi", "off"]),
            CommandSpec::new("kodi start", &["sudo", "manage_kodi", "on"]),
            CommandSpec::new("upgrade raspbxino", &["sudo", "upgrade_raspbxino"]),
            CommandSpec::new("tunnel-ssh", &["/usr/local/bin/ssh-port-forward.sh"]),
        ],
    }
}

fn default_windows_table() -> CommandTableConfig {
    CommandTableConfig {
        label: "Windows".into(),
        style: ReplyStyle::Confirmed,
        commands: vec![CommandSpec::new(
            "shutdown-nuky",
            &["/usr/local/bin/shutdown-nuky"],
        )],
    }
}

fn default_restart() -> RestartConfig {
    RestartConfig {
        devices: ["router", "raspberrino", "raspbxino"]
            .into_iter()
            .map(|device| CommandSpec::new(device, &["sudo", "restart_device", device]))
            .collect(),
    }
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            system: default_system_table(),
            services: default_services_table(),
            windows: default_windows_table(),
            restart: default_restart(),
            url_fetch: UrlFetchConfig::default(),
        }
    }
}

// ── Observability ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "log"
    pub backend: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "log".into(),
        }
    }
}

// ── Reliability ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Initial backoff (s) before restarting a failed channel listener.
    #[serde(default = "default_channel_initial_backoff_secs")]
    pub channel_initial_backoff_secs: u64,
    /// Ceiling (s) for the listener restart backoff.
    #[serde(default = "default_channel_max_backoff_secs")]
    pub channel_max_backoff_secs: u64,
}

fn default_channel_initial_backoff_secs() -> u64 {
    2
}

fn default_channel_max_backoff_secs() -> u64 {
    60
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            channel_initial_backoff_secs: default_channel_initial_backoff_secs(),
            channel_max_backoff_secs: default_channel_max_backoff_secs(),
        }
    }
}

// ── Loading / saving ──────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: app_dir().join("config.toml"),
            log_level: default_log_level(),
            channels_config: ChannelsConfig::default(),
            delivery: DeliveryConfig::default(),
            executor: ExecutorConfig::default(),
            handlers: HandlersConfig::default(),
            observability: ObservabilityConfig::default(),
            reliability: ReliabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let dir = app_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).context("Failed to create .teleshell directory")?;
        }
        Self::load_from(&dir.join("config.toml"))
    }

    /// Load `path`, writing a default config there first if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.config_path = path.to_path_buf();
            config
        } else {
            let mut config = Config::default();
            config.config_path = path.to_path_buf();
            config.save()?;
            config
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // Bot token: TELESHELL_BOT_TOKEN
        if let Some(token) = non_empty_env("TELESHELL_BOT_TOKEN") {
            match self.channels_config.telegram.as_mut() {
                Some(telegram) => telegram.bot_token = token,
                None => self.channels_config.telegram = Some(TelegramConfig::new(token)),
            }
        }

        // Allowed ids: TELESHELL_ALLOWED_IDS="123,456"
        if let Some(raw) = non_empty_env("TELESHELL_ALLOWED_IDS") {
            if let Some(telegram) = self.channels_config.telegram.as_mut() {
                telegram.allowed_ids = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .filter_map(|s| match s.parse::<i64>() {
                        Ok(id) => Some(id),
                        Err(_) => {
                            tracing::warn!("Ignoring invalid id in TELESHELL_ALLOWED_IDS: {s}");
                            None
                        }
                    })
                    .collect();
            }
        }

        // Allowed handles: TELESHELL_ALLOWED_USERNAMES="alice,bob"
        if let Some(raw) = non_empty_env("TELESHELL_ALLOWED_USERNAMES") {
            if let Some(telegram) = self.channels_config.telegram.as_mut() {
                telegram.allowed_usernames = raw
                    .split(',')
                    .map(|s| s.trim().trim_start_matches('@').to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }

        // Timeout: TELESHELL_COMMAND_TIMEOUT_SECS
        if let Some(raw) = non_empty_env("TELESHELL_COMMAND_TIMEOUT_SECS") {
            if let Ok(secs) = raw.parse::<u64>() {
                if secs > 0 {
                    self.executor.timeout_secs = secs;
                }
            }
        }

        // Log level: TELESHELL_LOG_LEVEL
        if let Some(level) = non_empty_env("TELESHELL_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;
        fs::create_dir_all(parent_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path) {
            let _ = fs::remove_file(&temp_path);
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> Result<()> {
    let dir = File::open(path)
        .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
    dir.sync_all()
        .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> Result<()> {
    Ok(())
}
