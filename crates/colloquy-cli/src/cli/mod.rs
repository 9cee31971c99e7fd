//! CLI command definitions for the `colloquy` binary.
//!
//! Uses clap derive macros for argument parsing. Session management is
//! grouped under `colloquy session`; `colloquy chat` runs turns.

pub mod chat;
pub mod session;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Persistent multi-turn chat sessions with LLMs.
#[derive(Parser)]
#[command(name = "colloquy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout via OpenTelemetry.
    #[arg(long, global = true, env = "COLLOQUY_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the chosen verbosity. `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,colloquy=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage chat sessions.
    #[command(alias = "sessions")]
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Ask a question, or start an interactive chat when no message is given.
    Chat(ChatArgs),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Create an empty session and print its id.
    Create {
        /// Session type (e.g., "chat").
        #[arg(long = "type", default_value = "chat")]
        session_type: String,

        /// Owning user.
        #[arg(long, default_value = "anonymous")]
        user: String,

        /// Human-readable description.
        #[arg(long)]
        description: Option<String>,

        /// Metadata entries as key=value (values are parsed as JSON when possible).
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },

    /// List sessions, oldest first.
    #[command(alias = "ls")]
    List {
        /// Only sessions of this type.
        #[arg(long = "type")]
        session_type: Option<String>,

        /// Only sessions owned by this user.
        #[arg(long)]
        user: Option<String>,
    },

    /// Show a session's metadata and messages.
    Show {
        /// Session id.
        id: String,
    },

    /// Merge metadata entries into a session.
    #[command(name = "set-metadata")]
    SetMetadata {
        /// Session id.
        id: String,

        /// Entries as key=value (values are parsed as JSON when possible).
        #[arg(required = true, value_name = "KEY=VALUE")]
        entries: Vec<String>,
    },

    /// Delete a session.
    #[command(alias = "rm")]
    Delete {
        /// Session id.
        id: String,
    },

    /// Remove every message from a session, keeping the session.
    Clear {
        /// Session id.
        id: String,
    },
}

#[derive(clap::Args)]
pub struct ChatArgs {
    /// Question to ask. Omit for an interactive chat read from stdin.
    pub message: Option<String>,

    /// Continue an existing session.
    #[arg(long, short)]
    pub session: Option<String>,

    /// Model provider (defaults to `chat.default_provider`).
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name (defaults to `chat.default_model`).
    #[arg(long, short)]
    pub model: Option<String>,

    /// Augment the prompt with web search results.
    #[arg(long)]
    pub web_search: bool,

    /// Wait for the full reply instead of streaming it.
    #[arg(long)]
    pub no_stream: bool,

    /// Owning user for a newly created session.
    #[arg(long, default_value = "anonymous")]
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat() {
        let cli = Cli::parse_from([
            "colloquy", "chat", "hello", "--session", "s1", "-m", "gpt-4o-mini", "--web-search",
        ]);
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.message.as_deref(), Some("hello"));
                assert_eq!(args.session.as_deref(), Some("s1"));
                assert_eq!(args.model.as_deref(), Some("gpt-4o-mini"));
                assert!(args.web_search);
                assert!(!args.no_stream);
                assert_eq!(args.user, "anonymous");
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_parse_set_metadata() {
        let cli = Cli::parse_from(["colloquy", "session", "set-metadata", "s1", "a=1", "b=x"]);
        match cli.command {
            Commands::Session {
                action: SessionCommand::SetMetadata { id, entries },
            } => {
                assert_eq!(id, "s1");
                assert_eq!(entries, vec!["a=1", "b=x"]);
            }
            _ => panic!("expected set-metadata"),
        }
    }

    #[test]
    fn test_log_filter_by_verbosity() {
        assert_eq!(Cli::parse_from(["colloquy", "session", "ls"]).log_filter(), "warn");
        assert_eq!(
            Cli::parse_from(["colloquy", "--quiet", "session", "ls"]).log_filter(),
            "error"
        );
        assert_eq!(
            Cli::parse_from(["colloquy", "-v", "session", "ls"]).log_filter(),
            "info,colloquy=debug"
        );
        assert_eq!(
            Cli::parse_from(["colloquy", "-vv", "session", "ls"]).log_filter(),
            "trace"
        );
    }
}
