//! GUID Utilities
//!
//! Object-typed ACEs scope an entry to a property set or child object class
//! named by a GUID. GUIDs are stored in the Windows layout: the first three
//! fields are little-endian on the wire, the trailing eight bytes are taken
//! as-is.

use core::fmt;
use core::str::FromStr;

use crate::se::{Result, SecurityError};

/// Size of a GUID in its binary form
pub const GUID_LENGTH: usize = 16;

/// GUID structure (128 bits)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Guid {
    /// First 32 bits (time_low)
    pub data1: u32,
    /// Next 16 bits (time_mid)
    pub data2: u16,
    /// Next 16 bits (time_hi_and_version)
    pub data3: u16,
    /// Final 64 bits (clock_seq_hi_and_reserved, clock_seq_low, node)
    pub data4: [u8; 8],
}

impl Guid {
    /// Create a new GUID from components
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self { data1, data2, data3, data4 }
    }

    /// Create a nil (all zeros) GUID
    pub const fn nil() -> Self {
        Self {
            data1: 0,
            data2: 0,
            data3: 0,
            data4: [0; 8],
        }
    }

    /// Check if this is the nil GUID
    pub fn is_nil(&self) -> bool {
        self.data1 == 0 && self.data2 == 0 && self.data3 == 0 &&
        self.data4 == [0; 8]
    }

    /// Create a GUID from little-endian bytes (Windows GUID format)
    pub fn from_bytes_le(bytes: [u8; GUID_LENGTH]) -> Self {
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4: [
                bytes[8], bytes[9], bytes[10], bytes[11],
                bytes[12], bytes[13], bytes[14], bytes[15],
            ],
        }
    }

    /// Read a GUID from the start of a buffer
    pub fn read_le(data: &[u8]) -> Option<Self> {
        let bytes: [u8; GUID_LENGTH] = data.get(..GUID_LENGTH)?.try_into().ok()?;
        Some(Self::from_bytes_le(bytes))
    }

    /// Convert to bytes (little-endian, Windows GUID format)
    pub fn to_bytes_le(&self) -> [u8; GUID_LENGTH] {
        let mut bytes = [0u8; GUID_LENGTH];
        bytes[0..4].copy_from_slice(&self.data1.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data2.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.data3.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.data4);
        bytes
    }
}

impl fmt::Display for Guid {
    /// Format as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-",
            self.data1, self.data2, self.data3, self.data4[0], self.data4[1]
        )?;
        for byte in &self.data4[2..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self)
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl FromStr for Guid {
    type Err = SecurityError;

    /// Parse the registry form, with or without surrounding braces
    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')).unwrap_or(s);
        let text = s.as_bytes();
        if text.len() != 36 {
            return Err(SecurityError::InvalidArgument("malformed GUID string"));
        }

        // Hyphens sit at fixed positions: 8-4-4-4-12
        let mut nibbles = [0u8; 32];
        let mut count = 0;
        for (i, &c) in text.iter().enumerate() {
            if matches!(i, 8 | 13 | 18 | 23) {
                if c != b'-' {
                    return Err(SecurityError::InvalidArgument("malformed GUID string"));
                }
                continue;
            }
            nibbles[count] = hex_value(c)
                .ok_or(SecurityError::InvalidArgument("malformed GUID string"))?;
            count += 1;
        }

        // Big-endian textual order
        let mut bytes = [0u8; GUID_LENGTH];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (nibbles[i * 2] << 4) | nibbles[i * 2 + 1];
        }

        Ok(Self {
            data1: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_be_bytes([bytes[4], bytes[5]]),
            data3: u16::from_be_bytes([bytes[6], bytes[7]]),
            data4: [
                bytes[8], bytes[9], bytes[10], bytes[11],
                bytes[12], bytes[13], bytes[14], bytes[15],
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    // bf967aba-0de6-11d0-a285-00aa003049e2 (user object class)
    const USER_CLASS: Guid = Guid::new(
        0xbf967aba,
        0x0de6,
        0x11d0,
        [0xa2, 0x85, 0x00, 0xaa, 0x00, 0x30, 0x49, 0xe2],
    );

    #[test]
    fn test_guid_format() {
        assert_eq!(USER_CLASS.to_string(), "bf967aba-0de6-11d0-a285-00aa003049e2");
    }

    #[test]
    fn test_guid_parse() {
        let parsed: Guid = "{BF967ABA-0DE6-11D0-A285-00AA003049E2}".parse().unwrap();
        assert_eq!(parsed, USER_CLASS);
        assert!("bf967aba-0de6-11d0-a285".parse::<Guid>().is_err());
        assert!("bf967aba+0de6-11d0-a285-00aa003049e2".parse::<Guid>().is_err());
    }

    #[test]
    fn test_guid_wire_layout() {
        let bytes = USER_CLASS.to_bytes_le();
        assert_eq!(&bytes[0..4], &[0xba, 0x7a, 0x96, 0xbf]);
        assert_eq!(Guid::from_bytes_le(bytes), USER_CLASS);
        assert_eq!(Guid::read_le(&bytes[..15]), None);
    }

    #[test]
    fn test_nil() {
        assert!(Guid::nil().is_nil());
        assert!(!USER_CLASS.is_nil());
    }
}
