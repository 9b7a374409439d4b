//! Duplex message client: one connection, two directions, one session.
//!
//! A session reads inbound messages and writes user input concurrently over a
//! single established transport, until either side ends it. Each module
//! focuses on a concrete responsibility:
//!
//! - [`transport`] defines the channel abstraction and its raw TCP and
//!   WebSocket implementations.
//! - [`receiver`] and [`sender`] are the two per-direction task loops.
//! - [`session`] starts both tasks, records the single termination signal,
//!   stops the survivor, and closes the channel exactly once.
//! - [`console`] adapts stdin and stdout to the session's input and output
//!   seams.
//! - [`echo`] is a small echo peer to talk to.
//! - [`cli`] and [`client`] wire all of it into the command-line tool.
//!
//! Integration tests drive sessions over in-memory fakes and real sockets.

pub mod cli;
pub mod client;
pub mod console;
pub mod echo;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod transport;
