//! Console approval of intents.
//!
//! Prints each intent and reads one line: `y`/`yes` approves, `n`/`no` or an
//! empty line declines, `q`/`quit` or end of input declines and stops the
//! session.

use std::io::{BufRead, BufReader, Stdin, Write};

use flowbot_core::TradeIntent;
use flowbot_executor::Confirmation;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Operator reply to one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Approve,
    Decline,
    Quit,
}

fn parse_reply(line: &str) -> Reply {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Reply::Approve,
        "q" | "quit" => Reply::Quit,
        _ => Reply::Decline,
    }
}

/// Line-based confirmer over any reader.
pub struct ConsoleConfirmer<R> {
    input: Mutex<R>,
    cancel: CancellationToken,
}

impl ConsoleConfirmer<BufReader<Stdin>> {
    /// Prompt on stdout, read from stdin.
    pub fn stdin(cancel: CancellationToken) -> Self {
        Self::new(BufReader::new(std::io::stdin()), cancel)
    }
}

impl<R: BufRead + Send> ConsoleConfirmer<R> {
    pub fn new(input: R, cancel: CancellationToken) -> Self {
        Self {
            input: Mutex::new(input),
            cancel,
        }
    }

    fn prompt(intent: &TradeIntent) {
        let mut out = std::io::stdout().lock();
        // Best effort; the reply is still read.
        let _ = write!(
            out,
            "{} {} {} @ {} (cost {}, round {}) [y/N/q]: ",
            intent.side(),
            intent.size(),
            intent.token().short(),
            intent.price(),
            intent.cost(),
            intent.round()
        );
        let _ = out.flush();
    }

    fn read_reply(&self) -> Reply {
        let mut line = String::new();
        match self.input.lock().read_line(&mut line) {
            Ok(0) => Reply::Quit,
            Ok(_) => parse_reply(&line),
            Err(e) => {
                warn!(error = %e, "Failed to read approval, stopping");
                Reply::Quit
            }
        }
    }
}

impl<R: BufRead + Send> Confirmation for ConsoleConfirmer<R> {
    fn confirm(&self, intent: &TradeIntent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        Self::prompt(intent);
        match self.read_reply() {
            Reply::Approve => true,
            Reply::Decline => {
                info!(intent_id = %intent.id(), "Intent declined by operator");
                false
            }
            Reply::Quit => {
                info!("Operator quit, stopping session");
                self.cancel.cancel();
                false
            }
        }
    }
}
