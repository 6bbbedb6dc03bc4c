use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "buildlog",
    about = "Run build steps and record their status as a line-oriented build log",
    version = env!("GIT_DESCRIBE"),
    after_help = "Diagnostic logs are written to: ~/.local/share/buildlog/logs/buildlog.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to buildlog.yaml config file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command, recording its status and output in the build log
    Run {
        /// Write the build log to this file instead of the configured target
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Append to the output file instead of truncating it
        #[arg(long)]
        append: bool,

        /// Encoding for event lines (UTF-8, UTF-16BE, UTF-16LE, ISO-8859-1, US-ASCII)
        #[arg(long)]
        charset: Option<String>,

        /// Record events from a separate agent process over a forwarded channel
        #[arg(long)]
        remote: bool,

        /// Command and arguments to run
        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Remote half of `run --remote`; forwards the build log over stdout
    #[command(hide = true)]
    Agent {
        /// Serialized listener (JSON)
        #[arg(long)]
        listener: String,

        /// Command and arguments to run
        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'f', value_enum)]
        format: Option<OutputFormat>,
    },
}
