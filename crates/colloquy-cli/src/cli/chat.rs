//! `colloquy chat`: one-shot questions and an interactive loop.
//!
//! Streaming turns run through [`ChatOrchestrator::spawn_turn`] so Ctrl+C
//! can cancel a reply mid-stream without ending the process.
//!
//! [`ChatOrchestrator::spawn_turn`]: colloquy_core::chat::orchestrator::ChatOrchestrator::spawn_turn

use std::io::Write;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use colloquy_types::chat::{TurnRecord, TurnRequest};

use super::ChatArgs;
use crate::state::AppState;

/// Commands accepted at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
enum LoopInput<'a> {
    Quit,
    Skip,
    Question(&'a str),
}

fn classify(line: &str) -> LoopInput<'_> {
    match line.trim() {
        "" => LoopInput::Skip,
        "/exit" | "/quit" => LoopInput::Quit,
        question => LoopInput::Question(question),
    }
}

fn build_request(args: &ChatArgs, session_id: Option<&str>, question: &str) -> TurnRequest {
    let mut request = TurnRequest::new(question).streaming(!args.no_stream);
    request.session_id = session_id.map(str::to_string);
    request.user_id = args.user.clone();
    request.model_provider = args.provider.clone();
    request.model_name = args.model.clone();
    request.enable_web_search = args.web_search;
    request
}

pub async fn run_chat(state: &AppState, args: ChatArgs, json: bool) -> Result<()> {
    if let Some(message) = args.message.as_deref() {
        run_turn(state, build_request(&args, args.session.as_deref(), message), json).await?;
        return Ok(());
    }

    let mut session_id = args.session.clone();
    if !json {
        println!();
        println!(
            "  {} Interactive chat. Type {} to leave.",
            style("💬").bold(),
            style("/exit").yellow()
        );
        if let Some(id) = &session_id {
            println!("  Continuing session {}", style(id).cyan());
        }
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !json {
            print!("{} ", style("you ›").green().bold());
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match classify(&line) {
            LoopInput::Quit => break,
            LoopInput::Skip => continue,
            LoopInput::Question(question) => {
                let request = build_request(&args, session_id.as_deref(), question);
                match run_turn(state, request, json).await {
                    Ok(Some(id)) => session_id = Some(id),
                    Ok(None) => {}
                    Err(e) => eprintln!("  {} {e:#}", style("error:").red().bold()),
                }
            }
        }
    }

    if !json {
        if let Some(id) = &session_id {
            println!();
            println!("  Session saved as {}", style(id).cyan());
        }
    }
    Ok(())
}

/// Run one turn and print its records. Returns the session id once known.
async fn run_turn(state: &AppState, request: TurnRequest, json: bool) -> Result<Option<String>> {
    let mut handle = state.orchestrator.spawn_turn(request);
    let mut session_id = None;

    loop {
        let next = tokio::select! {
            record = handle.recv() => record,
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                if !json {
                    println!();
                    println!("  {}", style("(cancelled)").dim());
                }
                return Ok(session_id);
            }
        };
        let Some(record) = next else {
            break;
        };
        let record = record?;
        if session_id.is_none() {
            session_id = Some(record.session_id.clone());
            if !json {
                print!("\n{} ", style("assistant ›").cyan().bold());
            }
        }
        print_record(&record, json)?;
    }

    Ok(session_id)
}

/// Summary line printed after the final record of a turn.
fn turn_footer(record: &TurnRecord) -> Option<String> {
    if !record.is_final() {
        return None;
    }
    let tokens = record.token_count.unwrap_or_default();
    Some(format!("{tokens} tokens · {}", record.session_id))
}

fn print_record(record: &TurnRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
        return Ok(());
    }

    print!("{}", record.content);
    if let Some(footer) = turn_footer(record) {
        println!();
        println!("  {}", style(footer).dim());
        println!();
    }
    std::io::stdout().flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ChatArgs {
        ChatArgs {
            message: None,
            session: None,
            provider: Some("local".to_string()),
            model: Some("llama3".to_string()),
            web_search: true,
            no_stream: false,
            user: "alice".to_string(),
        }
    }

    #[test]
    fn test_classify_input() {
        assert_eq!(classify("   "), LoopInput::Skip);
        assert_eq!(classify("/exit"), LoopInput::Quit);
        assert_eq!(classify(" /quit "), LoopInput::Quit);
        assert_eq!(classify("  why? "), LoopInput::Question("why?"));
    }

    #[test]
    fn test_build_request_carries_flags() {
        let request = build_request(&args(), Some("s1"), "hi");
        assert_eq!(request.session_id.as_deref(), Some("s1"));
        assert_eq!(request.user_question, "hi");
        assert_eq!(request.user_id, "alice");
        assert_eq!(request.model_provider.as_deref(), Some("local"));
        assert_eq!(request.model_name.as_deref(), Some("llama3"));
        assert!(request.enable_web_search);
        assert!(request.stream);
    }

    #[test]
    fn test_footer_only_on_final_record() {
        assert_eq!(turn_footer(&TurnRecord::chunk("s1", "partial")), None);
        assert_eq!(
            turn_footer(&TurnRecord::finished("s1", "done", 42)).as_deref(),
            Some("42 tokens · s1")
        );
    }

    #[test]
    fn test_build_request_no_stream() {
        let mut a = args();
        a.no_stream = true;
        let request = build_request(&a, None, "hi");
        assert!(request.session_id.is_none());
        assert!(!request.stream);
    }
}
