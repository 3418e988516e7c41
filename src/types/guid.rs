use serde::Serialize;

use crate::{EncodingResult, Error};

/// 16-byte GUID split the way the wire format stores it: three little-endian
/// groups followed by eight raw bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

impl Guid {
    pub const NULL: Guid = Guid { data1: 0, data2: 0, data3: 0, data4: [0; 8] };

    /// Canonical `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` text, uppercase.
    pub fn to_canonical(&self) -> String {
        let mut out = Vec::with_capacity(36);
        push_hex(&mut out, &self.data1.to_be_bytes());
        out.push(b'-');
        push_hex(&mut out, &self.data2.to_be_bytes());
        out.push(b'-');
        push_hex(&mut out, &self.data3.to_be_bytes());
        out.push(b'-');
        push_hex(&mut out, &self.data4[0..2]);
        out.push(b'-');
        push_hex(&mut out, &self.data4[2..8]);
        String::from_utf8(out).unwrap()
    }

    /// Parses the canonical form. Hex digits may be any case; the hyphen
    /// positions are fixed.
    pub fn parse(input: &str) -> EncodingResult<Guid> {
        let b = input.as_bytes();
        if b.len() != 36 {
            return Err(Error::Decoding);
        }
        for (i, &c) in b.iter().enumerate() {
            match i {
                8 | 13 | 18 | 23 => {
                    if c != b'-' {
                        return Err(Error::Decoding);
                    }
                }
                _ => {
                    if !c.is_ascii_hexdigit() {
                        return Err(Error::Decoding);
                    }
                }
            }
        }
        let hex = |range: std::ops::Range<usize>| u64::from_str_radix(&input[range], 16).unwrap();
        let mut data4 = [0u8; 8];
        data4[0] = hex(19..21) as u8;
        data4[1] = hex(21..23) as u8;
        for (i, chunk) in data4[2..].iter_mut().enumerate() {
            *chunk = hex(24 + i * 2..26 + i * 2) as u8;
        }
        Ok(Guid {
            data1: hex(0..8) as u32,
            data2: hex(9..13) as u16,
            data3: hex(14..18) as u16,
            data4,
        })
    }
}

fn push_hex(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        out.push(HEX_UPPER[(b >> 4) as usize]);
        out.push(HEX_UPPER[(b & 0x0F) as usize]);
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_roundtrip() {
        let g = Guid {
            data1: 0x00000005,
            data2: 0xCAB9,
            data3: 0x4470,
            data4: [0x8F, 0x8A, 0x2C, 0x1E, 0xAD, 0x20, 0x7E, 0x0E],
        };
        let text = g.to_canonical();
        assert_eq!(text, "00000005-CAB9-4470-8F8A-2C1EAD207E0E");
        assert_eq!(Guid::parse(&text).unwrap(), g);
        // mixed case accepted
        assert_eq!(Guid::parse("00000005-cab9-4470-8f8a-2c1ead207e0e").unwrap(), g);
    }

    #[test]
    fn rejects_malformed() {
        assert!(Guid::parse("00000005+CAB9-4470-8F8A-2C1EAD207E0E").is_err());
        assert!(Guid::parse("00000005-CAB9-4470-8F8A-2C1EAD207E0").is_err());
        assert!(Guid::parse("0000000G-CAB9-4470-8F8A-2C1EAD207E0E").is_err());
    }
}
