//! Terminal-facing input source and output sink.

use std::{
    io::{self, BufRead, Write},
    thread,
};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, sync::mpsc};
use tracing::warn;

use crate::{
    message::Message,
    receiver::OutputSink,
    sender::{Input, InputSource},
};

/// Input fed through a tokio channel. Once every producer is gone the source
/// reports [`Input::End`].
pub struct ChannelInput {
    items: mpsc::Receiver<Input>,
}

impl ChannelInput {
    pub fn new(items: mpsc::Receiver<Input>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl InputSource for ChannelInput {
    async fn next(&mut self) -> Input {
        self.items.recv().await.unwrap_or(Input::End)
    }
}

/// Reads stdin lines on a dedicated OS thread.
///
/// Blocking stdin reads cannot be interrupted, so they stay off the runtime;
/// the thread is detached and ends with the process.
pub fn stdin() -> io::Result<ChannelInput> {
    let (tx, rx) = mpsc::channel(16);
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || forward_stdin_lines(tx))?;
    Ok(ChannelInput::new(rx))
}

fn forward_stdin_lines(tx: mpsc::Sender<Input>) {
    forward_lines(io::stdin().lock(), tx);
}

/// Forwards lines until input ends, a read fails, or the receiving side is gone.
///
/// Lines that are not valid UTF-8 are still forwarded, with invalid bytes
/// replaced. A read failure is reported on stderr before input is ended.
fn forward_lines<R: BufRead>(mut reader: R, tx: mpsc::Sender<Input>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                warn!(?error, "failed to read stdin");
                let _ = writeln!(io::stderr(), "!!! stdin read failed, ending input: {error}");
                break;
            }
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(err) => {
                warn!("stdin line is not valid UTF-8, replacing invalid bytes");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        if tx.blocking_send(Input::Line(line)).is_err() {
            return;
        }
    }
    let _ = tx.blocking_send(Input::End);
}

/// Prints each inbound message on its own stdout line.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl OutputSink for StdoutSink {
    async fn write(&mut self, message: &Message) -> io::Result<()> {
        write_stdout(&message.to_string()).await
    }
}

pub async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

pub async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}
