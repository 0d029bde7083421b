// walletnotify core: background job lifecycle for wallet push notifications
//
// A push wakes the process, the process does the minimum wallet work the push
// asks for, and then it gets out of the way.

pub mod config;
pub mod connection;
pub mod job;
pub mod logging;
pub mod platform;
pub mod plugin;
pub mod sdk;
pub mod service;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    ConfigError, ConnectionConfig, LnurlConfig, Network, NwcConfig, PluginConfigs, ServiceConfig,
    ShutdownTimeouts,
};
pub use connection::{Connection, ConnectionError, ConnectionManager, ConnectionState};
pub use job::{
    build_job, Job, JobCompleter, JobContext, JobError, JobId, JobKind, JobOutcome, JobState,
};
pub use logging::{init_logging, LogLevel, LogSink, SinkLayer};
pub use platform::{Notification, PlatformBridge};
pub use plugin::{Plugin, PluginConfig, PluginError, PluginFactory, PluginKind, PluginRegistry};
pub use sdk::{
    ConnectRequest, CredentialStore, Credentials, EventListener, Invoice, ReceiveLimits,
    SdkConnection, SdkError, SdkEvent, StaticCredentials, WalletSdk,
};
pub use service::{
    Coordinator, CoordinatorError, JobSummary, SchedulerState, ShutdownReason,
};
pub use trigger::{Trigger, TriggerError, TriggerMessage};
