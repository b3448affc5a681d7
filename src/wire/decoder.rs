//! # Telemetry Frame Decoder
//!
//! Splits the serial byte stream on `\n` and turns each line into a
//! [`TelemetryFrame`]. Decoding is all-or-nothing: a line with a missing,
//! misplaced or non-numeric field yields a [`DecodeError`] and no values.

use bytes::BytesMut;

use super::protocol::*;
use crate::error::DecodeError;

/// Decode one frame body (without the trailing `\n`)
///
/// A trailing `\r` is tolerated for firmware that prints with `println`.
///
/// # Errors
///
/// Returns error if:
/// - The frame does not have exactly seven comma-separated fields
/// - A field does not start with its expected tag
/// - A value is not an integer/decimal literal
/// - A value is outside its physical range (gear, throttle, load)
///
/// # Examples
///
/// ```
/// use shift_cluster::wire::decoder::decode_frame;
///
/// let frame = decode_frame("G:3,R:4500,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6").unwrap();
/// assert_eq!(frame.current_gear, 3);
/// assert_eq!(frame.engine_rpm, 4500);
/// ```
pub fn decode_frame(text: &str) -> Result<TelemetryFrame, DecodeError> {
    let text = text.trim_end_matches('\r');
    let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();

    if fields.len() != FIELD_TAGS.len() {
        return Err(DecodeError::FieldCount {
            expected: FIELD_TAGS.len(),
            found: fields.len(),
        });
    }

    let mut values = [""; 7];
    for (slot, (field, tag)) in values.iter_mut().zip(fields.iter().zip(FIELD_TAGS)) {
        *slot = field
            .strip_prefix(tag)
            .ok_or(DecodeError::MissingField(tag))?;
    }

    let current_gear = parse_int(TAG_GEAR, values[0])?;
    if !(GEAR_NONE..=GEAR_MAX).contains(&current_gear) {
        return Err(out_of_range(TAG_GEAR, values[0]));
    }

    let engine_rpm = parse_int(TAG_RPM, values[1])?;
    let engine_rpm = u32::try_from(engine_rpm).map_err(|_| out_of_range(TAG_RPM, values[1]))?;

    let coolant_temp = parse_decimal(TAG_COOLANT, values[2])?;

    let throttle = parse_decimal(TAG_THROTTLE, values[3])?;
    if !(0.0..=THROTTLE_MAX).contains(&throttle) {
        return Err(out_of_range(TAG_THROTTLE, values[3]));
    }

    let engine_load = parse_decimal(TAG_LOAD, values[4])?;
    if !(0.0..=ENGINE_LOAD_MAX).contains(&engine_load) {
        return Err(out_of_range(TAG_LOAD, values[4]));
    }

    let ambient_temp = parse_decimal(TAG_AMBIENT, values[5])?;
    let voltage = parse_decimal(TAG_VOLTAGE, values[6])?;

    Ok(TelemetryFrame {
        current_gear,
        engine_rpm,
        coolant_temp,
        throttle,
        engine_load,
        ambient_temp,
        voltage,
    })
}

/// Parse an integer literal: optional `-`, then one or more digits
fn parse_int(tag: &'static str, value: &str) -> Result<i32, DecodeError> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_number(tag, value));
    }

    value.parse::<i32>().map_err(|_| invalid_number(tag, value))
}

/// Parse an integer or decimal literal: optional `-`, digits, at most one `.`
///
/// Exponents, `inf` and `NaN` are rejected even though `f32::from_str`
/// would accept them.
fn parse_decimal(tag: &'static str, value: &str) -> Result<f32, DecodeError> {
    let body = value.strip_prefix('-').unwrap_or(value);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (body, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int_part.len() + frac_part.len() == 0 || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid_number(tag, value));
    }

    let parsed = value.parse::<f32>().map_err(|_| invalid_number(tag, value))?;
    if !parsed.is_finite() {
        return Err(out_of_range(tag, value));
    }

    Ok(parsed)
}

fn invalid_number(tag: &'static str, value: &str) -> DecodeError {
    DecodeError::InvalidNumber {
        tag,
        value: value.to_string(),
    }
}

fn out_of_range(tag: &'static str, value: &str) -> DecodeError {
    DecodeError::OutOfRange {
        tag,
        value: value.to_string(),
    }
}

/// Running counters for the acquisition status log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub decoded: u64,
    pub discarded: u64,
}

/// Incremental line framer
///
/// Feed it bytes as they come off the link. Every delimiter yields exactly one
/// decode result and empties the buffer, whatever the outcome, so a corrupted
/// line never bleeds into the next one.
///
/// # Examples
///
/// ```
/// use shift_cluster::wire::decoder::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
/// let mut results = Vec::new();
/// for &byte in b"G:1,R:1200,T:60,Th:5,L:10,A:20,V:12.4\n" {
///     if let Some(result) = decoder.push(byte) {
///         results.push(result);
///     }
/// }
/// assert_eq!(results.len(), 1);
/// assert!(results[0].is_ok());
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    overflowed: bool,
    stats: FrameStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_FRAME_LEN),
            overflowed: false,
            stats: FrameStats::default(),
        }
    }

    /// Push one byte; returns a result when the byte completes a frame
    pub fn push(&mut self, byte: u8) -> Option<Result<TelemetryFrame, DecodeError>> {
        if byte != FRAME_DELIMITER {
            if self.buffer.len() >= MAX_FRAME_LEN {
                self.overflowed = true;
            } else {
                self.buffer.extend_from_slice(&[byte]);
            }
            return None;
        }

        let result = if self.overflowed {
            Err(DecodeError::Overflow(MAX_FRAME_LEN))
        } else {
            std::str::from_utf8(&self.buffer)
                .ok()
                .filter(|text| text.is_ascii())
                .ok_or(DecodeError::NotAscii)
                .and_then(decode_frame)
        };

        self.buffer.clear();
        self.overflowed = false;

        match result {
            Ok(_) => self.stats.decoded += 1,
            Err(_) => self.stats.discarded += 1,
        }

        Some(result)
    }

    /// Push a slice; collects one result per completed frame
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Result<TelemetryFrame, DecodeError>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Bytes buffered towards the next frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encoder::encode_frame;
    use proptest::prelude::*;

    const SAMPLE: &str = "G:3,R:4500,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6";

    #[test]
    fn test_decode_sample_frame() {
        let frame = decode_frame(SAMPLE).unwrap();
        assert_eq!(frame.current_gear, 3);
        assert_eq!(frame.engine_rpm, 4500);
        assert_eq!(frame.coolant_temp, 82.5);
        assert_eq!(frame.throttle, 45.0);
        assert_eq!(frame.engine_load, 60.0);
        assert_eq!(frame.ambient_temp, 18.0);
        assert_eq!(frame.voltage, 12.6);
    }

    #[test]
    fn test_decode_tolerates_carriage_return() {
        let frame = decode_frame("G:0,R:900,T:40,Th:0,L:12,A:-3.5,V:13.8\r").unwrap();
        assert_eq!(frame.current_gear, 0);
        assert_eq!(frame.ambient_temp, -3.5);
    }

    #[test]
    fn test_decode_unknown_gear() {
        let frame = decode_frame("G:-1,R:0,T:20,Th:0,L:0,A:20,V:12.1").unwrap();
        assert_eq!(frame.current_gear, GEAR_NONE);
    }

    #[test]
    fn test_decode_missing_field() {
        let result = decode_frame("G:3,R:4500,T:82.5,Th:45.0,L:60.0,A:18.0");
        assert_eq!(
            result,
            Err(DecodeError::FieldCount { expected: 7, found: 6 })
        );
    }

    #[test]
    fn test_decode_wrong_tag() {
        let result = decode_frame("G:3,R:4500,X:82.5,Th:45.0,L:60.0,A:18.0,V:12.6");
        assert_eq!(result, Err(DecodeError::MissingField(TAG_COOLANT)));
    }

    #[test]
    fn test_decode_swapped_fields() {
        let result = decode_frame("R:4500,G:3,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6");
        assert_eq!(result, Err(DecodeError::MissingField(TAG_GEAR)));
    }

    #[test]
    fn test_decode_non_numeric() {
        let result = decode_frame("G:3,R:45x0,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6");
        assert!(matches!(result, Err(DecodeError::InvalidNumber { tag: "R:", .. })));
    }

    #[test]
    fn test_decode_truncated_value() {
        let result = decode_frame("G:3,R:4500,T:82.5,Th:45.0,L:60.0,A:18.0,V:");
        assert!(matches!(result, Err(DecodeError::InvalidNumber { tag: "V:", .. })));
    }

    #[test]
    fn test_decode_rejects_float_gear() {
        let result = decode_frame("G:3.0,R:4500,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6");
        assert!(matches!(result, Err(DecodeError::InvalidNumber { tag: "G:", .. })));
    }

    #[test]
    fn test_decode_rejects_exponent_and_nan() {
        for bad in ["1e3", "NaN", "inf", ".", "-", "1.2.3", "+5"] {
            let text = format!("G:3,R:4500,T:{},Th:45.0,L:60.0,A:18.0,V:12.6", bad);
            assert!(
                matches!(decode_frame(&text), Err(DecodeError::InvalidNumber { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_decode_out_of_range() {
        assert!(matches!(
            decode_frame("G:7,R:4500,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6"),
            Err(DecodeError::OutOfRange { tag: "G:", .. })
        ));
        assert!(matches!(
            decode_frame("G:3,R:-5,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6"),
            Err(DecodeError::OutOfRange { tag: "R:", .. })
        ));
        assert!(matches!(
            decode_frame("G:3,R:4500,T:82.5,Th:100.5,L:60.0,A:18.0,V:12.6"),
            Err(DecodeError::OutOfRange { tag: "Th:", .. })
        ));
        assert!(matches!(
            decode_frame("G:3,R:4500,T:82.5,Th:45.0,L:101,A:18.0,V:12.6"),
            Err(DecodeError::OutOfRange { tag: "L:", .. })
        ));
    }

    #[test]
    fn test_decoder_splits_on_newline() {
        let mut decoder = FrameDecoder::new();
        let input = format!("{}\n{}\n", SAMPLE, SAMPLE);
        let results = decoder.extend(input.as_bytes());

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(decoder.pending(), 0);
        assert_eq!(decoder.stats(), FrameStats { decoded: 2, discarded: 0 });
    }

    #[test]
    fn test_decoder_holds_partial_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.extend(b"G:3,R:45").is_empty());
        assert_eq!(decoder.pending(), 8);

        let results = decoder.extend(b"00,T:82.5,Th:45.0,L:60.0,A:18.0,V:12.6\n");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().engine_rpm, 4500);
    }

    #[test]
    fn test_decoder_clears_buffer_after_bad_frame() {
        let mut decoder = FrameDecoder::new();
        let input = format!("G:3,R:??\n{}\n", SAMPLE);
        let results = decoder.extend(input.as_bytes());

        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().current_gear, 3);
        assert_eq!(decoder.stats(), FrameStats { decoded: 1, discarded: 1 });
    }

    #[test]
    fn test_decoder_overflow_discards_line() {
        let mut decoder = FrameDecoder::new();
        let noise = vec![b'x'; MAX_FRAME_LEN * 3];
        assert!(decoder.extend(&noise).is_empty());
        assert_eq!(decoder.pending(), MAX_FRAME_LEN);

        let results = decoder.extend(format!("\n{}\n", SAMPLE).as_bytes());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Err(DecodeError::Overflow(MAX_FRAME_LEN)));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_decoder_rejects_binary_garbage() {
        let mut decoder = FrameDecoder::new();
        let results = decoder.extend(&[0xC8, 0xFF, 0x10, b'\n']);
        assert_eq!(results, vec![Err(DecodeError::NotAscii)]);
    }

    #[test]
    fn test_decoder_empty_line() {
        let mut decoder = FrameDecoder::new();
        let results = decoder.extend(b"\n");
        assert_eq!(
            results,
            vec![Err(DecodeError::FieldCount { expected: 7, found: 1 })]
        );
    }

    fn frame_strategy() -> impl Strategy<Value = TelemetryFrame> {
        (
            GEAR_NONE..=GEAR_MAX,
            0u32..20_000,
            -40.0f32..150.0,
            0.0f32..=THROTTLE_MAX,
            0.0f32..=ENGINE_LOAD_MAX,
            -40.0f32..60.0,
            0.0f32..16.0,
        )
            .prop_map(|(gear, rpm, coolant, throttle, load, ambient, voltage)| TelemetryFrame {
                current_gear: gear,
                engine_rpm: rpm,
                coolant_temp: coolant,
                throttle,
                engine_load: load,
                ambient_temp: ambient,
                voltage,
            })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(frame in frame_strategy()) {
            let text = encode_frame(&frame);
            let line = text.strip_suffix('\n').unwrap();
            prop_assert_eq!(decode_frame(line), Ok(frame));
        }

        #[test]
        fn decoding_is_deterministic(frame in frame_strategy()) {
            let text = encode_frame(&frame);
            let mut a = FrameDecoder::new();
            let mut b = FrameDecoder::new();
            prop_assert_eq!(a.extend(text.as_bytes()), b.extend(text.as_bytes()));
        }

        #[test]
        fn truncated_frames_never_decode(frame in frame_strategy(), cut in 1usize..20) {
            let text = encode_frame(&frame);
            let line = text.strip_suffix('\n').unwrap();
            let cut = cut.min(line.len());
            let truncated = &line[..line.len() - cut];
            // Cutting only trailing digits of the last field can still leave a valid frame
            prop_assume!(!truncated.contains("V:") || truncated.ends_with("V:"));
            prop_assert!(decode_frame(truncated).is_err());
        }
    }
}
