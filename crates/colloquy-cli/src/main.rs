//! Colloquy CLI entry point.
//!
//! Binary name: `colloquy`
//!
//! Parses CLI arguments, initializes logging and storage, then dispatches
//! to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, SessionCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    colloquy_observe::init_tracing(cli.log_filter(), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let result = run(cli).await;
    colloquy_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "colloquy", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    tracing::debug!(data_dir = %state.data_dir.display(), "application state ready");

    match cli.command {
        Commands::Session { action } => match action {
            SessionCommand::Create {
                session_type,
                user,
                description,
                metadata,
            } => {
                cli::session::create_session(
                    &state,
                    session_type,
                    user,
                    description,
                    &metadata,
                    cli.json,
                )
                .await?;
            }
            SessionCommand::List { session_type, user } => {
                cli::session::list_sessions(
                    &state,
                    session_type.as_deref(),
                    user.as_deref(),
                    cli.json,
                )
                .await?;
            }
            SessionCommand::Show { id } => {
                cli::session::show_session(&state, &id, cli.json).await?;
            }
            SessionCommand::SetMetadata { id, entries } => {
                cli::session::set_metadata(&state, &id, &entries, cli.json).await?;
            }
            SessionCommand::Delete { id } => {
                cli::session::delete_session(&state, &id, cli.json).await?;
            }
            SessionCommand::Clear { id } => {
                cli::session::clear_session(&state, &id, cli.json).await?;
            }
        },

        Commands::Chat(args) => {
            cli::chat::run_chat(&state, args, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
