//! Well-known PostgreSQL type OIDs and column-byte decoders.
//!
//! Decoding routes through these helpers so callers never hand-roll
//! endianness or format-specific parsing (spec note: "Endianness and type
//! OIDs" in the design notes).

use crate::error::{PgError, PgResult};

pub const BOOL: u32 = 16;
pub const BYTEA: u32 = 17;
pub const CHAR: u32 = 18;
pub const NAME: u32 = 19;
pub const INT8: u32 = 20;
pub const INT2: u32 = 21;
pub const INT4: u32 = 23;
pub const TEXT: u32 = 25;
pub const FLOAT4: u32 = 700;
pub const FLOAT8: u32 = 701;
pub const VARCHAR: u32 = 1043;
pub const BPCHAR: u32 = 1042;
pub const UUID: u32 = 2950;
pub const JSONB: u32 = 3802;

/// Decode a `bool` column (format code 0 = text, 1 = binary).
pub fn decode_bool(bytes: &[u8], binary: bool) -> PgResult<bool> {
    if binary {
        match bytes.first() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(PgError::TypeDecode("malformed binary bool column".into())),
        }
    } else {
        match bytes {
            b"t" => Ok(true),
            b"f" => Ok(false),
            _ => Err(PgError::TypeDecode("malformed text bool column".into())),
        }
    }
}

/// Decode an integer column of width `width` bytes (2, 4, or 8) as `i64`.
pub fn decode_int(bytes: &[u8], binary: bool, width: usize) -> PgResult<i64> {
    if binary {
        match width {
            2 => bytes
                .try_into()
                .map(|b| i16::from_be_bytes(b) as i64)
                .map_err(|_| PgError::TypeDecode("malformed int2 column".into())),
            4 => bytes
                .try_into()
                .map(|b| i32::from_be_bytes(b) as i64)
                .map_err(|_| PgError::TypeDecode("malformed int4 column".into())),
            8 => bytes
                .try_into()
                .map(i64::from_be_bytes)
                .map_err(|_| PgError::TypeDecode("malformed int8 column".into())),
            _ => unreachable!("width must be 2, 4, or 8"),
        }
    } else {
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| PgError::TypeDecode("malformed text integer column".into()))
    }
}

pub fn decode_float(bytes: &[u8], binary: bool, width: usize) -> PgResult<f64> {
    if binary {
        match width {
            4 => bytes
                .try_into()
                .map(|b| f32::from_be_bytes(b) as f64)
                .map_err(|_| PgError::TypeDecode("malformed float4 column".into())),
            8 => bytes
                .try_into()
                .map(f64::from_be_bytes)
                .map_err(|_| PgError::TypeDecode("malformed float8 column".into())),
            _ => unreachable!("width must be 4 or 8"),
        }
    } else {
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| PgError::TypeDecode("malformed text float column".into()))
    }
}

pub fn decode_text(bytes: &[u8]) -> PgResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| PgError::TypeDecode("column is not valid UTF-8".into()))
}

/// `uuid`: 16 raw bytes in binary format, 36-char hex-and-dashes in text format.
pub fn decode_uuid(bytes: &[u8], binary: bool) -> PgResult<String> {
    if binary {
        if bytes.len() != 16 {
            return Err(PgError::TypeDecode("uuid column is not 16 bytes".into()));
        }
        Ok(format!(
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
        ))
    } else {
        decode_text(bytes)
    }
}

/// `jsonb`: a 1-byte version prefix (currently always `1`) then JSON text in
/// binary format; plain JSON text in text format.
pub fn decode_jsonb(bytes: &[u8], binary: bool) -> PgResult<String> {
    if binary {
        if bytes.is_empty() {
            return Err(PgError::TypeDecode("empty jsonb column".into()));
        }
        decode_text(&bytes[1..])
    } else {
        decode_text(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_bool() {
        assert_eq!(decode_bool(b"t", false).unwrap(), true);
        assert_eq!(decode_bool(b"f", false).unwrap(), false);
        assert!(decode_bool(b"x", false).is_err());
    }

    #[test]
    fn binary_int4() {
        assert_eq!(decode_int(&42i32.to_be_bytes(), true, 4).unwrap(), 42);
    }

    #[test]
    fn text_int() {
        assert_eq!(decode_int(b"-7", false, 4).unwrap(), -7);
    }

    #[test]
    fn uuid_binary_roundtrip_format() {
        let bytes: [u8; 16] = [
            0x55, 0x0e, 0x84, 0x00, 0xe2, 0x9b, 0x41, 0xd4, 0xa7, 0x16, 0x44, 0x66, 0x55, 0x44,
            0x00, 0x00,
        ];
        let s = decode_uuid(&bytes, true).unwrap();
        assert_eq!(s, "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn jsonb_strips_version_byte() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(b"{\"a\":1}");
        assert_eq!(decode_jsonb(&bytes, true).unwrap(), "{\"a\":1}");
    }
}
