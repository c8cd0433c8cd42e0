//! # nailpin
//!
//! Async Rust client for the Nailgun chunked wire protocol: dispatch a
//! command invocation to a persistent server over a single TCP connection
//! and stream back its stdout, stderr, and exit status.
//!
//! ## Architecture
//!
//! - **Protocol**: length-prefixed typed chunks (`[u32 BE length][type
//!   byte][payload]`) with reassembly of partial and coalesced reads
//! - **Handshake**: arguments, environment, working directory, then the
//!   command, sent once immediately after connect
//! - **Session**: a single actor task owns the connection lifecycle
//!   (Connecting → Handshaking → Ready → Closed/Failed); callers write
//!   stdin through the handle and receive events through typed callbacks
//!
//! ## Example
//!
//! ```ignore
//! use nailpin::{NailConfig, Session, SessionEvents};
//!
//! #[tokio::main]
//! async fn main() -> nailpin::Result<()> {
//!     let config = NailConfig::new("io.foldr.ngtesthost.Stdout")
//!         .with_args(["--greet"])
//!         .with_cwd("/tmp");
//!
//!     let events = SessionEvents::new()
//!         .on_stdout(|data| print!("{}", String::from_utf8_lossy(&data)))
//!         .on_stderr(|data| eprint!("{}", String::from_utf8_lossy(&data)))
//!         .on_exit(|code| println!("exit: {code}"));
//!
//!     let session = Session::open(config, events)?;
//!     session.close_stdin().await?;
//!     session.closed().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod protocol;
pub mod transport;

mod dispatch;
mod error;
mod handshake;
mod queue;
mod session;

pub use config::NailConfig;
pub use dispatch::{Dispatch, InboundDispatcher, SessionEvents};
pub use error::{NailpinError, Result};
pub use handshake::handshake_frames;
pub use queue::{OutboundQueue, PendingWrite};
pub use session::{Session, SessionState};
