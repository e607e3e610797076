//! Shared setup for run commands: config, logging, Ctrl-C and progress.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use worldtiler::config::{config_file_path, RunConfig};
use worldtiler::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};
use worldtiler::pipeline::RunContext;

use crate::error::CliError;
use crate::progress::TerminalProgress;

/// Holds what a run command needs for its lifetime.
pub struct CliRunner {
    config: RunConfig,
    cancel: CancellationToken,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Loads the configuration, starts logging and installs the Ctrl-C handler.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        if config_path.is_some() && !path.exists() {
            return Err(CliError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let config = RunConfig::load_from(&path)?;

        let level = if verbose { "debug" } else { "info" };
        let logging = init_logging(&default_log_dir(), default_log_file(), level)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;
        info!(config = %path.display(), log = %logging.path().display(), "Configuration loaded");

        let cancel = CancellationToken::new();
        let handler_token = cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!();
            eprintln!("Received interrupt, finishing tiles in flight...");
            handler_token.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

        Ok(Self {
            config,
            cancel,
            _logging: logging,
        })
    }

    pub fn config_mut(&mut self) -> &mut RunConfig {
        &mut self.config
    }

    /// Validates the configuration after overrides and hands it out.
    pub fn finish_config(&self) -> Result<RunConfig, CliError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }

    pub fn context(&self) -> RunContext {
        RunContext::new(self.cancel.clone(), Arc::new(TerminalProgress::new()))
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            "WorldTiler starting"
        );
    }
}
