//! Wire protocol between the coordinator and worker agents
//!
//! Messages travel over TCP as length-prefixed frames: a 4-byte unsigned
//! big-endian length followed by exactly that many payload bytes, with the
//! payload carrying a JSON document. Framing is transport-only; it never
//! inspects message semantics; that is the coordinator's dispatch layer.
//!
//! # Architecture
//!
//! - [`framing`] - Length-prefixed frame encode/decode over async streams
//! - [`message`] - Typed request/response message set
//!
//! # Usage
//!
//! ```ignore
//! use fetchq::protocol::{framing, message::Request};
//!
//! framing::write_message(&mut stream, &Request::register("worker-1")).await?;
//! let response: Response = framing::read_message(&mut stream).await?.unwrap();
//! ```

pub mod framing;
pub mod message;

pub use framing::{read_frame, read_message, write_frame, write_message, ProtocolError};
pub use message::{Request, RequestDecodeError, Response};
