// Console host: notifications, LNURL replies and log lines on the terminal

use async_trait::async_trait;
use colored::*;
use serde_json::Value;
use walletnotify_core::{LogLevel, LogSink, Notification, PlatformBridge, ShutdownReason};

pub struct ConsoleBridge {
    agent: ureq::Agent,
}

impl ConsoleBridge {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(10))
                .build(),
        }
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[async_trait]
impl PlatformBridge for ConsoleBridge {
    fn show_notification(&self, notification: Notification) {
        println!(
            "{} {}: {}",
            "🔔".bright_yellow(),
            notification.title.bold(),
            notification.body
        );
    }

    async fn post_reply(&self, url: &str, body: Value) -> Result<(), String> {
        if !is_http(url) {
            println!("{} {} {}", "↩".bright_blue(), url.dimmed(), body);
            return Ok(());
        }

        let agent = self.agent.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .send_json(body)
                .map(|response| {
                    tracing::debug!("Reply to {} answered {}", url, response.status());
                })
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("reply task failed: {}", e))?
    }

    fn on_shutdown_requested(&self, reason: ShutdownReason) {
        println!("{} Service stopped ({})", "■".bright_red(), reason);
    }
}

/// Forwards core log lines to stderr
pub struct ConsoleLogSink;

impl LogSink for ConsoleLogSink {
    fn log(&self, tag: &str, message: &str, level: LogLevel) {
        let level = match level {
            LogLevel::Error => "ERROR".red().bold(),
            LogLevel::Warn => "WARN ".yellow(),
            LogLevel::Info => "INFO ".green(),
            LogLevel::Debug => "DEBUG".blue(),
            LogLevel::Trace => "TRACE".dimmed(),
        };
        eprintln!("{} {} {}", level, format!("[{}]", tag).dimmed(), message);
    }
}
