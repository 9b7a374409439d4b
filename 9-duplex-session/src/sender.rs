use std::sync::Arc;

use async_trait::async_trait;
use tokio::{select, sync::watch};
use tracing::{debug, warn};

use crate::{
    message::Message,
    session::{TerminationSignal, cancelled},
    transport::TransportChannel,
};

/// Input that ends the sender without being transmitted.
pub const EXIT_SENTINEL: &str = "exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// One line typed or fed by the caller, without its line ending.
    Line(String),
    /// Caller-triggered interrupt.
    Interrupt,
    /// The input source has nothing more to offer.
    End,
}

/// Producer of outbound user input.
#[async_trait]
pub trait InputSource: Send {
    /// Waits for the next input item. Must be cancel safe.
    async fn next(&mut self) -> Input;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Sentinel,
    Payload,
}

/// Only an empty line is blank and only the bare sentinel ends the sender;
/// whitespace counts as payload.
pub fn classify(line: &str) -> LineKind {
    if line.is_empty() {
        LineKind::Blank
    } else if line.eq_ignore_ascii_case(EXIT_SENTINEL) {
        LineKind::Sentinel
    } else {
        LineKind::Payload
    }
}

/// Forwards input lines to `channel` until the user leaves or sending fails.
///
/// Returns `None` when stopped through `cancel`. A send already in flight
/// when cancellation arrives is allowed to finish.
pub async fn run<I>(
    channel: Arc<dyn TransportChannel>,
    mut input: I,
    mut cancel: watch::Receiver<bool>,
) -> Option<TerminationSignal>
where
    I: InputSource,
{
    let mut transmitted: u64 = 0;
    loop {
        let next = select! {
            _ = cancelled(&mut cancel) => {
                debug!(transmitted, "sender cancelled");
                return None;
            }
            next = input.next() => next,
        };

        let line = match next {
            Input::Line(line) => line,
            Input::Interrupt => {
                debug!("input interrupted");
                return Some(TerminationSignal::UserRequested);
            }
            Input::End => {
                debug!("input exhausted");
                return Some(TerminationSignal::UserRequested);
            }
        };

        match classify(&line) {
            LineKind::Blank => continue,
            LineKind::Sentinel => {
                debug!(transmitted, "exit requested");
                return Some(TerminationSignal::UserRequested);
            }
            LineKind::Payload => {
                if let Err(err) = channel.send(Message::Text(line)).await {
                    warn!(error = %err, "send failed");
                    return Some(TerminationSignal::TransportError(err.to_string()));
                }
                transmitted += 1;
            }
        }
    }
}
