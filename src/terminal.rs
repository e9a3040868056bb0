//! terminal.rs
//!
//! Console side of the tool: the removal confirmation and the question loop.
//!
//! Prompts go through [`Prompter`] so both loops run unchanged against an
//! interactive terminal (`inquire`) or plain line input (pipes, tests).
//! Both loops also race every prompt and query against a caller-supplied
//! interrupt future; `main` passes a single Ctrl+C listener for the whole run.

use std::error::Error as StdError;
use std::future::Future;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::pin::Pin;
use std::thread;

use inquire::{InquireError, Text};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::query_engine::QueryEngine;

pub const FAREWELL: &str = "Goodbye!";
const QUESTION_PROMPT: &str = "Ask a question (Ctrl+C to quit):";
const DIVIDER_WIDTH: usize = 60;

#[derive(Debug, Error)]
pub enum PromptError {
    /// Ctrl+C / Esc at the prompt, or end of input.
    #[error("interrupted")]
    Interrupted,

    #[error("prompt failed: {0}")]
    Inquire(#[from] InquireError),

    #[error("console I/O: {0}")]
    Io(#[from] io::Error),
}

pub trait Prompter {
    async fn ask(&mut self, message: &str) -> Result<String, PromptError>;
}

/// Interactive prompt with line editing. Raw mode turns Ctrl+C into a key
/// press, which `inquire` reports as an interrupt.
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    async fn ask(&mut self, message: &str) -> Result<String, PromptError> {
        match Text::new(message).prompt() {
            Ok(answer) => Ok(answer),
            Err(InquireError::OperationInterrupted | InquireError::OperationCanceled) => {
                Err(PromptError::Interrupted)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads one line per prompt; end of input counts as an interrupt.
///
/// Lines are read on a plain OS thread and handed over a channel, so waiting
/// for input never blocks the runtime and the interrupt can still fire.
pub struct LinePrompter<W> {
    lines: mpsc::UnboundedReceiver<io::Result<String>>,
    output: W,
}

impl<W: Write> LinePrompter<W> {
    pub fn new<R>(input: R, output: W) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        thread::spawn(move || {
            for line in input.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self { lines: rx, output }
    }
}

impl<W: Write> Prompter for LinePrompter<W> {
    async fn ask(&mut self, message: &str) -> Result<String, PromptError> {
        write!(self.output, "{message} ")?;
        self.output.flush()?;

        match self.lines.recv().await {
            Some(line) => Ok(line?),
            None => Err(PromptError::Interrupted),
        }
    }
}

/// Whichever prompter suits stdin.
pub enum ConsolePrompter {
    Interactive(InquirePrompter),
    Lines(LinePrompter<io::Stdout>),
}

impl Prompter for ConsolePrompter {
    async fn ask(&mut self, message: &str) -> Result<String, PromptError> {
        match self {
            Self::Interactive(p) => p.ask(message).await,
            Self::Lines(p) => p.ask(message).await,
        }
    }
}

/// `inquire` on a terminal, plain line reading otherwise.
pub fn console_prompter() -> ConsolePrompter {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        ConsolePrompter::Interactive(InquirePrompter)
    } else {
        ConsolePrompter::Lines(LinePrompter::new(io::BufReader::new(stdin), io::stdout()))
    }
}

/// `Some(true)` for "yes", `Some(false)` for "no", case-insensitive.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if answer.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

async fn ask_or_interrupt<P, I>(
    prompter: &mut P,
    message: &str,
    interrupt: Pin<&mut I>,
) -> Result<String, PromptError>
where
    P: Prompter,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = interrupt => Err(PromptError::Interrupted),
        answer = prompter.ask(message) => answer,
    }
}

/// Asks until the answer is "yes" or "no".
pub async fn confirm_removal<P, I>(
    prompter: &mut P,
    persist_dir: &Path,
    mut interrupt: Pin<&mut I>,
) -> Result<bool, PromptError>
where
    P: Prompter,
    I: Future<Output = ()>,
{
    let message = format!(
        "Existing index found in {}. Remove it and rebuild from scratch? (yes/no)",
        persist_dir.display()
    );
    loop {
        let answer = ask_or_interrupt(prompter, &message, interrupt.as_mut()).await?;
        match parse_yes_no(&answer) {
            Some(decision) => return Ok(decision),
            None => tracing::debug!(answer = %answer, "expected yes or no"),
        }
    }
}

pub fn divider() -> String {
    "-".repeat(DIVIDER_WIDTH)
}

/// `outer: inner: root`, skipping causes the outer message already ends with.
fn error_chain(err: &dyn StdError) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        if !chain.ends_with(&msg) {
            chain.push_str(": ");
            chain.push_str(&msg);
        }
        source = cause.source();
    }
    chain
}

/// Question loop. Returns after printing the farewell on interrupt.
pub async fn query_loop<P, Q, W, I>(
    prompter: &mut P,
    engine: &Q,
    out: &mut W,
    mut interrupt: Pin<&mut I>,
) -> Result<(), PromptError>
where
    P: Prompter,
    Q: QueryEngine,
    W: Write,
    I: Future<Output = ()>,
{
    loop {
        let question = match ask_or_interrupt(prompter, QUESTION_PROMPT, interrupt.as_mut()).await {
            Ok(q) => q,
            Err(PromptError::Interrupted) => break,
            Err(e) => return Err(e),
        };
        if question.trim().is_empty() {
            continue;
        }

        let result = tokio::select! {
            biased;
            _ = interrupt.as_mut() => break,
            result = engine.query(&question) => result,
        };
        match result {
            Ok(resp) => {
                writeln!(out, "{}", resp.default_formatted_sources())?;
                writeln!(out, "{}", divider())?;
                writeln!(out, "{resp}")?;
            }
            Err(e) => {
                let chain = error_chain(&e);
                tracing::warn!(error = %chain, "query failed");
                writeln!(out, "Error: {chain}")?;
            }
        }
    }

    writeln!(out, "{FAREWELL}")?;
    out.flush()?;
    Ok(())
}
