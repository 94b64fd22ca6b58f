//! Wire protocol for the competition hub.
//!
//! The upstream producer (OWLCMS) speaks two frame shapes over a single
//! WebSocket: UTF-8 JSON envelopes (`{version, type, payload}`) and
//! length-prefixed binary frames carrying ZIP payloads. This crate parses
//! both, gates the protocol version, and builds the response envelopes the
//! hub sends back. It holds no state; everything stateful lives in the `hub`
//! crate.

pub mod binary;
pub mod envelope;
pub mod error;
pub mod response;
pub mod version;

pub use binary::{BinaryFrame, BinaryKind};
pub use envelope::Envelope;
pub use error::{ProtocolError, Result};
pub use response::Response;
pub use version::MINIMUM_PROTOCOL_VERSION;
