//! Binary framing: one length-by-type frame per call.

use bytes::BufMut;

use crate::error::{WireError, WireResult};
use crate::message::{
    ChannelConfig, DetectionMode, ErrorCode, FlashMode, Led, Message, MessageType, Response,
    SampleData, SourceCap, SourceCapReq, SourceConfig, Start, Version, COMMIT_SHA_WORDS,
    OPAMP_GAIN_SLOTS,
};

fn require(buf: &[u8], needed: usize) -> WireResult<()> {
    if buf.len() < needed {
        Err(WireError::Incomplete {
            needed,
            have: buf.len(),
        })
    } else {
        Ok(())
    }
}

fn bad_length(type_name: &'static str, expected: usize, actual: usize) -> WireError {
    WireError::BadLength {
        type_name,
        expected,
        actual,
    }
}

/// Decode one frame from the front of `buf`.
///
/// On success returns the decoded [`Message`] and the number of bytes
/// consumed; `buf` is never mutated. On [`WireError::Incomplete`] the
/// caller should wait for more bytes and retry with the same slice
/// (plus whatever arrived since).
pub fn decode(buf: &[u8]) -> WireResult<(Message, usize)> {
    require(buf, 1)?;
    let msg_type = MessageType::from_val(buf[0])?;
    let body = &buf[1..];

    match msg_type {
        MessageType::Response => {
            require(body, 3)?;
            let response_to = body[0];
            let error_code = ErrorCode::from_val(u16::from_le_bytes([body[1], body[2]]))?;
            Ok((
                Message::Response(Response {
                    response_to,
                    error_code,
                }),
                1 + 3,
            ))
        }
        MessageType::Led => {
            require(body, 2)?;
            let led_mask = u16::from_le_bytes([body[0], body[1]]);
            Ok((Message::Led(Led { led_mask }), 1 + 2))
        }
        MessageType::SourceConfig => {
            require(body, 8)?;
            let source = body[0];
            let opamp_gain = body[1];
            let opamp_offset = u16::from_le_bytes([body[2], body[3]]);
            let sw_oversample = u16::from_le_bytes([body[4], body[5]]);
            let hw_oversample = body[6];
            let hw_shift = body[7];
            Ok((
                Message::SourceConfig(SourceConfig {
                    source,
                    opamp_gain,
                    opamp_offset,
                    sw_oversample,
                    hw_oversample,
                    hw_shift,
                }),
                1 + 8,
            ))
        }
        MessageType::ChannelConfig => {
            require(body, 8)?;
            let channel = body[0];
            let source = body[1];
            let shift = body[2];
            let offset = u32::from_le_bytes([body[3], body[4], body[5], body[6]]);
            let sample32 = body[7] != 0;
            Ok((
                Message::ChannelConfig(ChannelConfig {
                    channel,
                    source,
                    shift,
                    offset,
                    sample32,
                }),
                1 + 8,
            ))
        }
        MessageType::SourceCapReq => {
            require(body, 1)?;
            Ok((
                Message::SourceCapReq(SourceCapReq { source: body[0] }),
                1 + 1,
            ))
        }
        MessageType::SourceCap => {
            require(body, 10)?;
            let source = body[0];
            let hw_oversample = body[1] != 0;
            let opamp_offset = body[2] != 0;
            let opamp_gain_count = body[3];
            let mut opamp_gain = [0u8; OPAMP_GAIN_SLOTS];
            opamp_gain.copy_from_slice(&body[4..4 + OPAMP_GAIN_SLOTS]);
            Ok((
                Message::SourceCap(SourceCap {
                    source,
                    hw_oversample,
                    opamp_offset,
                    opamp_gain_count,
                    opamp_gain,
                }),
                1 + 10,
            ))
        }
        MessageType::Start => {
            require(body, 8)?;
            let detection_mode = DetectionMode::from_val(body[0])?;
            let flash_mode = FlashMode::from_val(body[1])?;
            let frequency = u16::from_le_bytes([body[2], body[3]]);
            let led_mask = u16::from_le_bytes([body[4], body[5]]);
            let src_mask = u16::from_le_bytes([body[6], body[7]]);
            Ok((
                Message::Start(Start {
                    detection_mode,
                    flash_mode,
                    frequency,
                    led_mask,
                    src_mask,
                }),
                1 + 8,
            ))
        }
        MessageType::Abort => Ok((Message::Abort, 1)),
        MessageType::VersionReq => Ok((Message::VersionReq, 1)),
        MessageType::Version => {
            let payload_len = 1 + 4 * COMMIT_SHA_WORDS;
            require(body, payload_len)?;
            let revision = body[0];
            let mut commit_sha = [0u32; COMMIT_SHA_WORDS];
            for (i, word) in commit_sha.iter_mut().enumerate() {
                let off = 1 + i * 4;
                *word = u32::from_le_bytes([
                    body[off],
                    body[off + 1],
                    body[off + 2],
                    body[off + 3],
                ]);
            }
            Ok((
                Message::Version(Version {
                    revision,
                    commit_sha,
                }),
                1 + payload_len,
            ))
        }
        MessageType::SampleData16 => decode_sample_data(body, true)
            .map(|(msg, len)| (msg, 1 + len)),
        MessageType::SampleData32 => decode_sample_data(body, false)
            .map(|(msg, len)| (msg, 1 + len)),
    }
}

fn decode_sample_data(body: &[u8], narrow: bool) -> WireResult<(Message, usize)> {
    require(body, 4)?;
    let channel = body[0];
    let count = body[1] as usize;
    let reserved = u16::from_le_bytes([body[2], body[3]]);
    let elem_size = if narrow { 2 } else { 4 };
    let payload_len = 4 + count * elem_size;
    require(body, payload_len)?;

    if narrow {
        let mut data = Vec::with_capacity(count);
        for i in 0..count {
            let off = 4 + i * 2;
            data.push(u16::from_le_bytes([body[off], body[off + 1]]));
        }
        Ok((
            Message::SampleData16(SampleData {
                channel,
                reserved,
                data,
            }),
            payload_len,
        ))
    } else {
        let mut data = Vec::with_capacity(count);
        for i in 0..count {
            let off = 4 + i * 4;
            data.push(u32::from_le_bytes([
                body[off],
                body[off + 1],
                body[off + 2],
                body[off + 3],
            ]));
        }
        Ok((
            Message::SampleData32(SampleData {
                channel,
                reserved,
                data,
            }),
            payload_len,
        ))
    }
}

/// Encode `msg` into `out`, appending the type byte and payload.
pub fn encode(msg: &Message, out: &mut Vec<u8>) -> WireResult<()> {
    out.put_u8(msg.message_type().to_val());
    match msg {
        Message::Response(r) => {
            out.put_u8(r.response_to);
            out.put_u16_le(r.error_code.to_val());
        }
        Message::Led(l) => out.put_u16_le(l.led_mask),
        Message::SourceConfig(s) => {
            out.put_u8(s.source);
            out.put_u8(s.opamp_gain);
            out.put_u16_le(s.opamp_offset);
            out.put_u16_le(s.sw_oversample);
            out.put_u8(s.hw_oversample);
            out.put_u8(s.hw_shift);
        }
        Message::ChannelConfig(c) => {
            out.put_u8(c.channel);
            out.put_u8(c.source);
            out.put_u8(c.shift);
            out.put_u32_le(c.offset);
            out.put_u8(c.sample32 as u8);
        }
        Message::SourceCapReq(r) => out.put_u8(r.source),
        Message::SourceCap(s) => {
            out.put_u8(s.source);
            out.put_u8(s.hw_oversample as u8);
            out.put_u8(s.opamp_offset as u8);
            out.put_u8(s.opamp_gain_count);
            out.put_slice(&s.opamp_gain);
        }
        Message::Start(s) => {
            out.put_u8(s.detection_mode.to_val());
            out.put_u8(s.flash_mode.to_val());
            out.put_u16_le(s.frequency);
            out.put_u16_le(s.led_mask);
            out.put_u16_le(s.src_mask);
        }
        Message::Abort => {}
        Message::VersionReq => {}
        Message::Version(v) => {
            out.put_u8(v.revision);
            for word in v.commit_sha {
                out.put_u32_le(word);
            }
        }
        Message::SampleData16(s) => {
            if s.data.len() > u8::MAX as usize {
                return Err(bad_length("SampleData16", u8::MAX as usize, s.data.len()));
            }
            out.put_u8(s.channel);
            out.put_u8(s.data.len() as u8);
            out.put_u16_le(s.reserved);
            for sample in &s.data {
                out.put_u16_le(*sample);
            }
        }
        Message::SampleData32(s) => {
            if s.data.len() > u8::MAX as usize {
                return Err(bad_length("SampleData32", u8::MAX as usize, s.data.len()));
            }
            out.put_u8(s.channel);
            out.put_u8(s.data.len() as u8);
            out.put_u16_le(s.reserved);
            for sample in &s.data {
                out.put_u32_le(*sample);
            }
        }
    }
    Ok(())
}

/// Convenience wrapper returning a freshly allocated buffer.
pub fn encode_to_vec(msg: &Message) -> WireResult<Vec<u8>> {
    let mut out = Vec::new();
    encode(msg, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SampleData;

    fn roundtrip(msg: Message) {
        let bytes = encode_to_vec(&msg).expect("encode");
        let (decoded, consumed) = decode(&bytes).expect("decode");
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn response_roundtrip() {
        roundtrip(Message::Response(Response {
            response_to: MessageType::Abort.to_val(),
            error_code: ErrorCode::Success,
        }));
    }

    #[test]
    fn abort_roundtrip() {
        roundtrip(Message::Abort);
    }

    #[test]
    fn start_roundtrip() {
        roundtrip(Message::Start(Start {
            detection_mode: DetectionMode::Transmissive,
            flash_mode: FlashMode::Flash,
            frequency: 1000,
            led_mask: 0x00ff,
            src_mask: 0x0003,
        }));
    }

    #[test]
    fn sample_data16_counts() {
        for count in [0usize, 1, 255] {
            let data = (0..count as u16).collect::<Vec<_>>();
            roundtrip(Message::SampleData16(SampleData {
                channel: 2,
                reserved: 0,
                data,
            }));
        }
    }

    #[test]
    fn sample_data32_counts() {
        for count in [0usize, 1, 255] {
            let data = (0..count as u32).collect::<Vec<_>>();
            roundtrip(Message::SampleData32(SampleData {
                channel: 5,
                reserved: 0,
                data,
            }));
        }
    }

    #[test]
    fn incomplete_frame_reports_needed() {
        let full = encode_to_vec(&Message::SourceConfig(SourceConfig {
            source: 0,
            opamp_gain: 1,
            opamp_offset: 2,
            sw_oversample: 3,
            hw_oversample: 4,
            hw_shift: 5,
        }))
        .expect("encode");
        let err = decode(&full[..full.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            WireError::Incomplete {
                needed: 8,
                have: full.len() - 2,
            }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = decode(&[0xfe]).unwrap_err();
        assert_eq!(err, WireError::UnknownType(0xfe));
    }
}
