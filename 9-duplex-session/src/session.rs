//! Session coordinator.
//!
//! A [`Session`] owns one established [`TransportChannel`] and drives it with
//! two tasks: the [receiver](crate::receiver) renders inbound traffic and the
//! [sender](crate::sender) forwards user input. The first task to reach a
//! terminal state decides the session's [`TerminationSignal`]; the survivor is
//! asked to stop, awaited, and only then is the channel closed, exactly once.
//!
//! Lifecycle: `Connected -> Running -> Draining -> Closed`. Running a session
//! consumes it, so a closed session can never be restarted; reconnecting means
//! building a new one.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use tokio::{
    select,
    sync::{broadcast, watch},
    task::{JoinError, JoinSet},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    receiver::{self, OutputSink},
    sender::{self, InputSource},
    transport::TransportChannel,
};

/// How long the surviving task gets to notice cancellation before it is aborted.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Channel open, tasks not started.
    Connected,
    /// Receiver and sender both active.
    Running,
    /// First terminal event observed; the surviving task is being stopped.
    Draining,
    /// Channel closed and the termination signal is final.
    Closed,
}

/// Why a session ended. Exactly one is produced per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationSignal {
    /// The user typed the exit sentinel, interrupted input, or input ran out.
    UserRequested,
    /// The peer closed the connection cleanly.
    PeerClosed,
    /// The transport failed; carries the error detail for reporting.
    TransportError(String),
    /// The session was shut down from outside (Ctrl+C in the CLI).
    Interrupt,
}

impl TerminationSignal {
    /// Everything except a transport failure counts as a clean ending.
    pub fn is_clean(&self) -> bool {
        !matches!(self, TerminationSignal::TransportError(_))
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::UserRequested => f.write_str("user requested"),
            TerminationSignal::PeerClosed => f.write_str("peer closed"),
            TerminationSignal::TransportError(detail) => write!(f, "transport error: {detail}"),
            TerminationSignal::Interrupt => f.write_str("interrupted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub signal: TerminationSignal,
    /// Set when closing the channel failed; the signal is unaffected.
    pub close_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Receiver,
    Sender,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Receiver => f.write_str("receiver"),
            Task::Sender => f.write_str("sender"),
        }
    }
}

type TaskExit = (Task, Option<TerminationSignal>);

pub struct Session {
    channel: Arc<dyn TransportChannel>,
    state: watch::Sender<SessionState>,
    transitions: broadcast::Sender<SessionState>,
    drain_timeout: Duration,
}

impl Session {
    pub fn new(channel: Arc<dyn TransportChannel>) -> Self {
        let (state, _) = watch::channel(SessionState::Connected);
        // Three transitions per session, never more.
        let (transitions, _) = broadcast::channel(4);
        Self {
            channel,
            state,
            transitions,
            drain_timeout: DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observes the latest state, including the final `Closed`.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Every state the session enters after `Connected`, in order.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SessionState> {
        self.transitions.subscribe()
    }

    pub async fn run<I, O>(self, input: I, output: O) -> SessionReport
    where
        I: InputSource + 'static,
        O: OutputSink + 'static,
    {
        self.run_until(input, output, std::future::pending()).await
    }

    pub async fn run_until_ctrl_c<I, O>(self, input: I, output: O) -> SessionReport
    where
        I: InputSource + 'static,
        O: OutputSink + 'static,
    {
        self.run_until(input, output, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs both directions until one of them terminates or `shutdown` resolves.
    pub async fn run_until<I, O, F>(self, input: I, output: O, shutdown: F) -> SessionReport
    where
        I: InputSource + 'static,
        O: OutputSink + 'static,
        F: Future<Output = ()> + Send,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        let channel = Arc::clone(&self.channel);
        let cancel = cancel_rx.clone();
        tasks.spawn(async move {
            let signal = receiver::run(channel, output, cancel).await;
            (Task::Receiver, signal)
        });

        let channel = Arc::clone(&self.channel);
        let cancel = cancel_rx;
        tasks.spawn(async move {
            let signal = sender::run(channel, input, cancel).await;
            (Task::Sender, signal)
        });

        self.transition(SessionState::Running);
        tokio::pin!(shutdown);

        let signal = select! {
            biased;
            joined = tasks.join_next() => first_signal(joined),
            _ = &mut shutdown => {
                info!("session interrupted");
                TerminationSignal::Interrupt
            }
        };

        self.transition(SessionState::Draining);
        cancel_tx.send_replace(true);
        self.drain(&mut tasks).await;

        let close_error = match self.channel.close().await {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "failed to close transport channel");
                Some(err.to_string())
            }
        };

        self.transition(SessionState::Closed);
        info!(%signal, "session closed");

        SessionReport {
            signal,
            close_error,
        }
    }

    async fn drain(&self, tasks: &mut JoinSet<TaskExit>) {
        if timeout(self.drain_timeout, drain_tasks(tasks)).await.is_err() {
            warn!(
                timeout = ?self.drain_timeout,
                "surviving task ignored cancellation, aborting it"
            );
            tasks.abort_all();
            drain_tasks(tasks).await;
        }
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        // No subscribers is fine.
        let _ = self.transitions.send(next);
        debug!(from = ?previous, to = ?next, "session state changed");
    }
}

fn first_signal(joined: Option<Result<TaskExit, JoinError>>) -> TerminationSignal {
    match joined {
        Some(Ok((task, Some(signal)))) => {
            debug!(%task, %signal, "task finished first");
            signal
        }
        Some(Err(err)) => {
            warn!(error = ?err, "session task failed");
            TerminationSignal::TransportError(format!("session task failed: {err}"))
        }
        // A task only returns without a signal when told to stop.
        Some(Ok((_, None))) | None => TerminationSignal::Interrupt,
    }
}

async fn drain_tasks(tasks: &mut JoinSet<TaskExit>) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((task, Some(late))) => {
                debug!(%task, signal = %late, "discarding later termination signal");
            }
            Ok((task, None)) => debug!(%task, "task stopped"),
            Err(err) if err.is_cancelled() => debug!("task aborted"),
            Err(err) => warn!(error = ?err, "session task failed while draining"),
        }
    }
}

/// Resolves once the coordinator asks the task to stop.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // A dropped sender also means nobody is waiting on this task anymore.
    let _ = cancel.wait_for(|stop| *stop).await;
}
