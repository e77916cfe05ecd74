//! The device <-> host message set.
//!
//! Every message is length-by-type: the type byte fully determines the
//! payload length except for the two sample-data variants, whose header
//! carries an explicit sample count.

use serde::{Deserialize, Serialize};

use crate::error::{WireError, WireResult};

/// Number of 32-bit words carried by `VersionReq`/`Version`'s `commit_sha`
/// field. Sized for a SHA-1 abbreviated commit (160 bits).
pub const COMMIT_SHA_WORDS: usize = 5;

/// Number of analog-gain entries a `SourceCap` response can publish.
pub const OPAMP_GAIN_SLOTS: usize = 6;

/// The leading type byte of every frame. Numeric ordering is an ABI
/// commitment: never renumber existing variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Device acknowledgement of a previously sent message.
    Response = 0,
    /// Bidirectional LED mask set/get.
    Led = 1,
    /// Host configures a source's analog front end.
    SourceConfig = 2,
    /// Host configures a channel's digital post-processing.
    ChannelConfig = 3,
    /// Host requests a source's capability report.
    SourceCapReq = 4,
    /// Device reports a source's capabilities.
    SourceCap = 5,
    /// Host starts an acquisition.
    Start = 6,
    /// Host aborts the active acquisition.
    Abort = 7,
    /// Bidirectional firmware version request.
    VersionReq = 8,
    /// Bidirectional firmware version report.
    Version = 9,
    /// Device streams 16-bit samples for one channel.
    SampleData16 = 10,
    /// Device streams 32-bit samples for one channel.
    SampleData32 = 11,
}

impl MessageType {
    /// Recover a `MessageType` from its wire discriminant.
    pub fn from_val(val: u8) -> WireResult<Self> {
        match val {
            0 => Ok(Self::Response),
            1 => Ok(Self::Led),
            2 => Ok(Self::SourceConfig),
            3 => Ok(Self::ChannelConfig),
            4 => Ok(Self::SourceCapReq),
            5 => Ok(Self::SourceCap),
            6 => Ok(Self::Start),
            7 => Ok(Self::Abort),
            8 => Ok(Self::VersionReq),
            9 => Ok(Self::Version),
            10 => Ok(Self::SampleData16),
            11 => Ok(Self::SampleData32),
            other => Err(WireError::UnknownType(other)),
        }
    }

    /// The wire discriminant for this message type.
    pub fn to_val(self) -> u8 {
        self as u8
    }
}

/// `Response.error_code` values. Surfaced by name, never by number, in
/// user-visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// The request was accepted.
    Success = 0,
    /// A field carried a value outside its valid range.
    OutOfRange = 1,
    /// The leading type byte did not name a known message.
    BadMessageType = 2,
    /// The frame length did not match what the type requires.
    BadMessageLength = 3,
    /// `Start.src_mask` named a source the device does not have.
    BadSourceMask = 4,
    /// The device rejected a configuration change while acquiring.
    ActiveAcquisition = 5,
    /// `Start.frequency` is not achievable with the requested mode.
    BadFrequency = 6,
}

impl ErrorCode {
    /// Recover an `ErrorCode` from its wire discriminant.
    pub fn from_val(val: u16) -> WireResult<Self> {
        match val {
            0 => Ok(Self::Success),
            1 => Ok(Self::OutOfRange),
            2 => Ok(Self::BadMessageType),
            3 => Ok(Self::BadMessageLength),
            4 => Ok(Self::BadSourceMask),
            5 => Ok(Self::ActiveAcquisition),
            6 => Ok(Self::BadFrequency),
            other => Err(WireError::BadDiscriminant {
                field: "error_code",
                value: other as u32,
            }),
        }
    }

    /// The wire discriminant for this error code.
    pub fn to_val(self) -> u16 {
        self as u16
    }
}

/// Device acknowledgement of a previously sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// `MessageType` discriminant of the message being acknowledged.
    pub response_to: u8,
    /// Outcome of processing that message.
    pub error_code: ErrorCode,
}

/// Bidirectional LED mask set/get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Led {
    /// One bit per LED channel.
    pub led_mask: u16,
}

/// Host configures a source's analog front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Acquisition source index.
    pub source: u8,
    /// Opamp gain selector (index into the device's gain table).
    pub opamp_gain: u8,
    /// Opamp offset DAC setting.
    pub opamp_offset: u16,
    /// Software oversampling ratio.
    pub sw_oversample: u16,
    /// Hardware oversampling ratio.
    pub hw_oversample: u8,
    /// Hardware right-shift applied after oversampling accumulation.
    pub hw_shift: u8,
}

/// Host configures a channel's digital post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Logical channel index.
    pub channel: u8,
    /// Acquisition source this channel reads from.
    pub source: u8,
    /// Digital right-shift applied to the raw sample.
    pub shift: u8,
    /// Digital offset subtracted before shifting.
    pub offset: u32,
    /// Whether this channel streams 32-bit (vs 16-bit) samples.
    pub sample32: bool,
}

/// Host requests a source's capability report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCapReq {
    /// Acquisition source index.
    pub source: u8,
}

/// Device reports a source's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCap {
    /// Acquisition source index.
    pub source: u8,
    /// Whether the source supports hardware oversampling.
    pub hw_oversample: bool,
    /// Whether the source supports an opamp offset DAC.
    pub opamp_offset: bool,
    /// Number of valid entries in `opamp_gain`.
    pub opamp_gain_count: u8,
    /// Published analog gain steps, largest-first or smallest-first per firmware.
    pub opamp_gain: [u8; OPAMP_GAIN_SLOTS],
}

/// Emission mode selector carried by `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DetectionMode {
    /// All enabled sources sample simultaneously.
    Reflective = 0,
    /// All enabled sources sample simultaneously (transmissive geometry).
    Transmissive = 1,
}

impl DetectionMode {
    /// Recover a `DetectionMode` from its wire discriminant.
    pub fn from_val(val: u8) -> WireResult<Self> {
        match val {
            0 => Ok(Self::Reflective),
            1 => Ok(Self::Transmissive),
            other => Err(WireError::BadDiscriminant {
                field: "detection_mode",
                value: other as u32,
            }),
        }
    }

    /// The wire discriminant for this detection mode.
    pub fn to_val(self) -> u8 {
        self as u8
    }
}

/// LED-multiplexing mode selector carried by `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FlashMode {
    /// The LED mask indexes acquisition sources directly.
    Continuous = 0,
    /// The LED mask indexes LEDs, multiplexed across ticks.
    Flash = 1,
}

impl FlashMode {
    /// Recover a `FlashMode` from its wire discriminant.
    pub fn from_val(val: u8) -> WireResult<Self> {
        match val {
            0 => Ok(Self::Continuous),
            1 => Ok(Self::Flash),
            other => Err(WireError::BadDiscriminant {
                field: "flash_mode",
                value: other as u32,
            }),
        }
    }

    /// The wire discriminant for this flash mode.
    pub fn to_val(self) -> u8 {
        self as u8
    }
}

/// Host starts an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Start {
    /// Reflective vs transmissive photodiode geometry.
    pub detection_mode: DetectionMode,
    /// Continuous vs LED-multiplexed flash acquisition.
    pub flash_mode: FlashMode,
    /// Sample frequency in Hz.
    pub frequency: u16,
    /// LED mask to energize (meaning depends on `flash_mode`).
    pub led_mask: u16,
    /// Bitmask of sources to enable.
    pub src_mask: u16,
}

/// Bidirectional firmware version request/report payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Firmware revision number.
    pub revision: u8,
    /// Git commit SHA the firmware was built from, as raw words.
    pub commit_sha: [u32; COMMIT_SHA_WORDS],
}

/// Device streams samples for one channel.
///
/// `SampleData16` and `SampleData32` share this shape; the width is
/// carried by the surrounding [`crate::Message`] variant rather than a
/// payload field, matching the device's framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleData<T> {
    /// Logical channel index.
    pub channel: u8,
    /// Reserved header field, always zero on the wire.
    pub reserved: u16,
    /// Samples in device emission order (oldest first).
    pub data: Vec<T>,
}

/// One fully decoded wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// See [`Response`].
    Response(Response),
    /// See [`Led`].
    Led(Led),
    /// See [`SourceConfig`].
    SourceConfig(SourceConfig),
    /// See [`ChannelConfig`].
    ChannelConfig(ChannelConfig),
    /// See [`SourceCapReq`].
    SourceCapReq(SourceCapReq),
    /// See [`SourceCap`].
    SourceCap(SourceCap),
    /// See [`Start`].
    Start(Start),
    /// Host aborts the active acquisition. No payload.
    Abort,
    /// Bidirectional firmware version request. No payload.
    VersionReq,
    /// See [`Version`].
    Version(Version),
    /// 16-bit sample payload. See [`SampleData`].
    SampleData16(SampleData<u16>),
    /// 32-bit sample payload. See [`SampleData`].
    SampleData32(SampleData<u32>),
}

impl Message {
    /// The [`MessageType`] this message decodes/encodes as.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Response(_) => MessageType::Response,
            Message::Led(_) => MessageType::Led,
            Message::SourceConfig(_) => MessageType::SourceConfig,
            Message::ChannelConfig(_) => MessageType::ChannelConfig,
            Message::SourceCapReq(_) => MessageType::SourceCapReq,
            Message::SourceCap(_) => MessageType::SourceCap,
            Message::Start(_) => MessageType::Start,
            Message::Abort => MessageType::Abort,
            Message::VersionReq => MessageType::VersionReq,
            Message::Version(_) => MessageType::Version,
            Message::SampleData16(_) => MessageType::SampleData16,
            Message::SampleData32(_) => MessageType::SampleData32,
        }
    }
}
