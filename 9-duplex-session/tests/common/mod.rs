#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use duplex_session::{
    message::Message,
    receiver::OutputSink,
    sender::{Input, InputSource},
    transport::{TransportChannel, TransportError},
};

/// One scripted step of inbound traffic.
#[derive(Debug, Clone)]
pub enum Step {
    Deliver(Message),
    Pause(Duration),
    Close,
    Fail(String),
}

/// A call made on a [`FakeChannel`], logged when the call starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Send,
    Receive,
    Close,
}

/// In-memory channel that replays a script and records outbound traffic.
pub struct FakeChannel {
    inbound: Mutex<VecDeque<Step>>,
    hold_open: bool,
    send_mode: SendMode,
    sent: Mutex<Vec<Message>>,
    close_calls: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendMode {
    Accept,
    Fail,
    Hang,
}

impl FakeChannel {
    /// Delivers `messages`, then reports a clean close.
    pub fn closing_after<I, M>(messages: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Message>,
    {
        let mut steps: Vec<Step> = messages
            .into_iter()
            .map(|message| Step::Deliver(message.into()))
            .collect();
        steps.push(Step::Close);
        Self::scripted(steps)
    }

    /// Never delivers anything and never closes.
    pub fn silent() -> Self {
        Self::scripted(Vec::new()).held_open()
    }

    pub fn scripted(steps: Vec<Step>) -> Self {
        Self {
            inbound: Mutex::new(steps.into()),
            hold_open: false,
            send_mode: SendMode::Accept,
            sent: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Blocks forever once the script runs out instead of closing.
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.send_mode = SendMode::Fail;
        self
    }

    pub fn hanging_sends(mut self) -> Self {
        self.send_mode = SendMode::Hang;
        self
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Send or receive calls that started after the first close.
    pub fn calls_after_close(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .skip_while(|call| *call != Call::Close)
            .skip(1)
            .filter(|call| *call != Call::Close)
            .collect()
    }

    fn log(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn next_step(&self) -> Option<Step> {
        self.inbound.lock().expect("inbound lock").pop_front()
    }
}

#[async_trait]
impl TransportChannel for FakeChannel {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.log(Call::Send);
        tokio::task::yield_now().await;
        match self.send_mode {
            SendMode::Accept => {
                self.sent.lock().expect("sent lock").push(message);
                Ok(())
            }
            SendMode::Fail => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "fake send failure",
            ))),
            SendMode::Hang => std::future::pending().await,
        }
    }

    async fn receive(&self) -> Result<Option<Message>, TransportError> {
        self.log(Call::Receive);
        loop {
            tokio::task::yield_now().await;
            match self.next_step() {
                Some(Step::Deliver(message)) => return Ok(Some(message)),
                Some(Step::Pause(duration)) => tokio::time::sleep(duration).await,
                Some(Step::Close) => return Ok(None),
                Some(Step::Fail(detail)) => return Err(TransportError::Io(io::Error::other(detail))),
                None if self.hold_open => std::future::pending::<()>().await,
                None => return Ok(None),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.log(Call::Close);
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Input replayed from a fixed list; afterwards it waits forever like an idle user.
pub struct ScriptedInput {
    items: VecDeque<Input>,
}

impl ScriptedInput {
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::items(lines.into_iter().map(|line| Input::Line(line.into())))
    }

    pub fn items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Input>,
    {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn idle() -> Self {
        Self::items(Vec::new())
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next(&mut self) -> Input {
        tokio::task::yield_now().await;
        match self.items.pop_front() {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }
}

/// Sink that records rendered messages and can be told to fail on a payload.
#[derive(Clone, Default)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<Message>>>,
    fail_on: Option<String>,
}

impl RecordingSink {
    pub fn failing_on(text: &str) -> Self {
        Self {
            fail_on: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<Message> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait]
impl OutputSink for RecordingSink {
    async fn write(&mut self, message: &Message) -> io::Result<()> {
        if self.fail_on.as_deref() == Some(message.to_string().as_str()) {
            return Err(io::Error::other("render failure"));
        }
        self.seen.lock().expect("seen lock").push(message.clone());
        Ok(())
    }
}

pub fn texts(messages: &[Message]) -> Vec<String> {
    messages.iter().map(ToString::to_string).collect()
}
