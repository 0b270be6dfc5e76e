pub mod schema;

pub use schema::{
    ChannelsConfig, CommandSpec, CommandTableConfig, Config, DeliveryConfig, ExecutorConfig,
    HandlersConfig, ObservabilityConfig, ReliabilityConfig, ReplyStyle, RestartConfig,
    TelegramConfig, UrlFetchConfig,
};
