//! CLI error handling with user-facing messages and exit codes.

use std::fmt;
use std::process;

use worldtiler::config::ConfigFileError;
use worldtiler::vector::VectorError;
use worldtiler::TilerError;

/// Errors that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration could not be loaded, saved or validated
    Config(String),
    /// A run failed
    Run(TilerError),
    /// The run was interrupted with Ctrl-C
    Cancelled,
}

impl CliError {
    /// Exit code for this error: 130 for an interrupted run, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Print the error with any hints and exit the process.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Cancelled => {
                eprintln!("Tiles already written are kept; rerun the same command to resume.");
            }
            CliError::Run(TilerError::Vector(VectorError::Projection { .. })) => {
                eprintln!();
                eprintln!("Vector sources must use geographic coordinates (e.g. EPSG:4326).");
                eprintln!("Reproject the shapefile before tiling it.");
            }
            CliError::Run(TilerError::InvalidArgument(_)) => {
                eprintln!();
                eprintln!("Missing settings can be given as flags or in the config file");
                eprintln!("(see 'worldtiler init-config').");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Run(e) => write!(f, "{}", e),
            CliError::Cancelled => write!(f, "Run cancelled"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Run(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(err: ConfigFileError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<TilerError> for CliError {
    fn from(err: TilerError) -> Self {
        match err {
            TilerError::Cancelled => CliError::Cancelled,
            other => CliError::Run(other),
        }
    }
}
