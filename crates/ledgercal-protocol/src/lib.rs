//! IPC framing and request/response types for ledgercal.
//!
//! Messages are length-prefixed JSON: a 4-byte big-endian length followed by
//! the payload. Every payload travels inside an [`Envelope`] carrying the
//! protocol version and a request id for correlation.
//!
//! ```rust
//! use ledgercal_protocol::{Envelope, Request, SyncParams, decode_message, encode_message};
//!
//! let request = Envelope::request("req-1", Request::sync(SyncParams::default()));
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{HEADER_LEN, decode_message, decode_payload, encode_message, frame_len};
pub use types::{
    Envelope, ErrorCode, ErrorResponse, Request, Response, StatusInfo, SyncParams,
};

pub const PROTOCOL_VERSION: &str = "1";

/// Maximum payload size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
