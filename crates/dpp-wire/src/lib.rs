//! The binary and textual wire protocol between the acquisition device and
//! the host.
//!
//! The device emits a stream of length-by-type frames (§4.1): the leading
//! byte names the message type, and everything after it is fixed-length
//! except for the two sample-data variants, whose header carries an
//! explicit sample count. [`decode`] never allocates for non-sample
//! messages; sample messages copy their payload into an owned `Vec` rather
//! than borrowing the input slice. This is a documented deviation from a
//! strict zero-copy decode — see `DESIGN.md`'s `dpp-wire` grounding section
//! for the reasoning.

mod codec;
mod error;
mod message;
mod textual;

pub use codec::{decode, encode, encode_to_vec};
pub use error::{WireError, WireResult};
pub use message::{
    ChannelConfig, DetectionMode, ErrorCode, FlashMode, Led, Message, MessageType, Response,
    SampleData, SourceCap, SourceCapReq, SourceConfig, Start, Version, COMMIT_SHA_WORDS,
    OPAMP_GAIN_SLOTS,
};
pub use textual::{from_yaml, to_yaml};
