// src/io/decoder.rs
//
// Packet decoder for the ASCII joystick protocol.
//
// Frame format (one per line, terminator already stripped):
//   <h>,<v>,<c>,<r>      e.g. "512,512,1,0"
//
// Every line is classified on its own. A rejected line is simply dropped and
// the next line is decoded from scratch.

use super::error::PacketError;
use super::record::Record;

/// Field separator
const SEPARATOR: char = ',';

/// Number of fields in a packet
const FIELD_COUNT: usize = 4;

/// Decode one line into a `Record`.
///
/// Surrounding whitespace on each field is ignored, so a stray `\r` or padding
/// from the device does not cause a rejection.
pub fn decode_packet(line: &str) -> Result<Record, PacketError> {
    let first = line
        .find(SEPARATOR)
        .ok_or(PacketError::MalformedFrame("packet missing separator"))?;
    if first == 0 {
        return Err(PacketError::MalformedFrame("separator at position 0"));
    }

    let mut fields = [0i64; FIELD_COUNT];
    let mut count = 0;
    for part in line.split(SEPARATOR) {
        if count == FIELD_COUNT {
            return Err(PacketError::ParseFailure(format!(
                "expected {} fields, got more",
                FIELD_COUNT
            )));
        }
        let part = part.trim();
        fields[count] = part
            .parse::<i64>()
            .map_err(|e| PacketError::ParseFailure(format!("field {} {:?}: {}", count, part, e)))?;
        count += 1;
    }

    if count != FIELD_COUNT {
        return Err(PacketError::ParseFailure(format!(
            "expected {} fields, got {}",
            FIELD_COUNT, count
        )));
    }

    Ok(Record::new(fields[0], fields[1], fields[2], fields[3]))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn is_malformed(line: &str) -> bool {
        matches!(decode_packet(line), Err(PacketError::MalformedFrame(_)))
    }

    fn is_parse_failure(line: &str) -> bool {
        matches!(decode_packet(line), Err(PacketError::ParseFailure(_)))
    }

    #[test]
    fn test_decode_sentinel_line() {
        assert_eq!(decode_packet("512,512,1,0").unwrap(), Record::SENTINEL);
    }

    #[test]
    fn test_decode_preserves_field_order() {
        let record = decode_packet("10,20,1,5").unwrap();
        assert_eq!(record.as_tuple(), (10, 20, 1, 5));

        let record = decode_packet("1023,0,0,255").unwrap();
        assert_eq!(record.h, 1023);
        assert_eq!(record.v, 0);
        assert_eq!(record.c, 0);
        assert_eq!(record.r, 255);
    }

    #[test]
    fn test_decode_signed_and_unbounded() {
        assert_eq!(
            decode_packet("-1,-512,2,70000").unwrap(),
            Record::new(-1, -512, 2, 70000)
        );
        assert_eq!(
            decode_packet("+5,9000000000,0,0").unwrap(),
            Record::new(5, 9_000_000_000, 0, 0)
        );
    }

    #[test]
    fn test_decode_value_grid() {
        let values = [
            i64::MIN,
            i64::MIN + 1,
            -70_000,
            -512,
            -1,
            0,
            1,
            255,
            512,
            1023,
            9_000_000_000,
            i64::MAX - 1,
            i64::MAX,
        ];

        for &h in &values {
            for &v in &values {
                for &c in &[0, 1, -1, i64::MAX] {
                    for &r in &[0, 255, i64::MIN] {
                        let record = Record::new(h, v, c, r);
                        let line = record.to_string();
                        assert_eq!(decode_packet(&line), Ok(record), "line {:?}", line);
                    }
                }
            }
        }
    }

    #[test]
    fn test_reject_out_of_range_fields() {
        // One past each i64 bound, in every field position
        for overflow in ["9223372036854775808", "-9223372036854775809"] {
            for pos in 0..4 {
                let mut fields = ["512", "512", "1", "0"];
                fields[pos] = overflow;
                let line = fields.join(",");
                assert!(is_parse_failure(&line), "line {:?}", line);
            }
        }
        assert!(is_parse_failure("99999999999999999999999,0,0,0"));
    }

    #[test]
    fn test_decode_tolerates_whitespace_and_cr() {
        assert_eq!(decode_packet("1,2,1,0\r").unwrap(), Record::new(1, 2, 1, 0));
        assert_eq!(decode_packet(" 1, 2 ,1,0 ").unwrap(), Record::new(1, 2, 1, 0));
    }

    #[test]
    fn test_reject_missing_separator() {
        assert!(is_malformed(""));
        assert!(is_malformed("bad"));
        assert!(is_malformed("512"));
        assert!(is_malformed("512 512 1 0"));
    }

    #[test]
    fn test_reject_separator_at_start() {
        assert!(is_malformed(","));
        assert!(is_malformed(",512,512,1"));
        assert!(is_malformed(",512,512,1,0"));
    }

    #[test]
    fn test_reject_wrong_field_count() {
        assert!(is_parse_failure("512,512"));
        assert!(is_parse_failure("512,512,1"));
        assert!(is_parse_failure("512,512,1,0,7"));
        assert!(is_parse_failure("1,2,3,4,5,6"));
    }

    #[test]
    fn test_reject_non_integer_fields() {
        assert!(is_parse_failure("512,abc,1,0"));
        assert!(is_parse_failure("512,512,1.5,0"));
        assert!(is_parse_failure("512,,1,0"));
        assert!(is_parse_failure("512,512,1,"));
        assert!(is_parse_failure("0x10,2,1,0"));
    }

    #[test]
    fn test_reject_truncated_line() {
        // Dropped bytes mid-line leave a short or merged frame
        assert!(is_parse_failure("51,2,1"));
        assert!(is_parse_failure("512,5121,0"));
        assert!(is_parse_failure("512,512,1,0512,512,1,0"));
    }

    #[test]
    fn test_reject_noise_bytes() {
        assert!(decode_packet("\u{fffd}\u{fffd},512,1,0").is_err());
        assert!(decode_packet("51\u{0}2,512,1,0").is_err());
    }
}
