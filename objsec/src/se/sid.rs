//! Security Identifier (SID) Implementation
//!
//! A SID uniquely identifies a security principal (user, group, or computer).
//! SIDs have the format: S-R-I-S-S-S...
//! - S: Literal 'S' identifying a SID string
//! - R: Revision level (always 1)
//! - I: Identifier authority (48-bit)
//! - S: Sub-authorities (32-bit each, variable count)
//!
//! Every identity stored inside an ACE is a SID; friendly account names only
//! exist at the rule level.
//!
//! # Well-Known SIDs
//! - S-1-0-0: Null SID
//! - S-1-1-0: World (Everyone)
//! - S-1-5-18: Local System
//! - S-1-5-19: Local Service
//! - S-1-5-20: Network Service
//! - S-1-5-32-544: Administrators

use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;

use super::error::{Result, SecurityError};

/// Maximum number of sub-authorities in a SID
pub const SID_MAX_SUB_AUTHORITIES: usize = 15;

/// SID revision
pub const SID_REVISION: u8 = 1;

/// Size of the fixed SID header (revision, count, authority)
pub const SID_HEADER_LENGTH: usize = 8;

/// Identifier Authority values
pub mod identifier_authority {
    /// Null authority
    pub const SECURITY_NULL_SID_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 0];
    /// World authority (Everyone)
    pub const SECURITY_WORLD_SID_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 1];
    /// Local authority
    pub const SECURITY_LOCAL_SID_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 2];
    /// Creator authority
    pub const SECURITY_CREATOR_SID_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 3];
    /// NT authority (most common)
    pub const SECURITY_NT_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 5];
}

/// Well-known relative identifiers (RIDs)
pub mod well_known_rids {
    pub const SECURITY_NULL_RID: u32 = 0;
    pub const SECURITY_WORLD_RID: u32 = 0;
    pub const SECURITY_CREATOR_OWNER_RID: u32 = 0;

    pub const SECURITY_AUTHENTICATED_USER_RID: u32 = 11;
    pub const SECURITY_LOCAL_SYSTEM_RID: u32 = 18;
    pub const SECURITY_LOCAL_SERVICE_RID: u32 = 19;
    pub const SECURITY_NETWORK_SERVICE_RID: u32 = 20;

    /// Built-in domain RID
    pub const SECURITY_BUILTIN_DOMAIN_RID: u32 = 32;

    /// Built-in group RIDs
    pub const DOMAIN_ALIAS_RID_ADMINS: u32 = 544;
    pub const DOMAIN_ALIAS_RID_USERS: u32 = 545;
}

/// Security Identifier (SID)
///
/// Fixed-capacity storage; only the first `sub_authority_count`
/// sub-authorities are significant.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Sid {
    /// Revision (always 1)
    pub revision: u8,
    /// Number of sub-authorities
    pub sub_authority_count: u8,
    /// Identifier authority (6 bytes, big-endian)
    pub identifier_authority: [u8; 6],
    /// Sub-authorities
    pub sub_authority: [u32; SID_MAX_SUB_AUTHORITIES],
}

impl Sid {
    /// Create a new empty SID
    pub const fn new() -> Self {
        Self {
            revision: SID_REVISION,
            sub_authority_count: 0,
            identifier_authority: [0; 6],
            sub_authority: [0; SID_MAX_SUB_AUTHORITIES],
        }
    }

    /// Create a SID with the given authority and sub-authorities
    pub fn create(authority: [u8; 6], sub_authorities: &[u32]) -> Option<Self> {
        if sub_authorities.len() > SID_MAX_SUB_AUTHORITIES {
            return None;
        }

        let mut sid = Self::new();
        sid.identifier_authority = authority;
        sid.sub_authority_count = sub_authorities.len() as u8;
        sid.sub_authority[..sub_authorities.len()].copy_from_slice(sub_authorities);

        Some(sid)
    }

    /// Get the size of this SID in bytes
    pub fn length(&self) -> usize {
        SID_HEADER_LENGTH + self.sub_authorities().len() * 4
    }

    /// Check if this is a valid SID
    pub fn is_valid(&self) -> bool {
        self.revision == SID_REVISION &&
        self.sub_authority_count <= SID_MAX_SUB_AUTHORITIES as u8
    }

    /// The significant sub-authorities
    ///
    /// A count beyond the array capacity is clamped to it.
    pub fn sub_authorities(&self) -> &[u32] {
        let count = (self.sub_authority_count as usize).min(SID_MAX_SUB_AUTHORITIES);
        &self.sub_authority[..count]
    }

    /// Get the last sub-authority (RID)
    pub fn get_rid(&self) -> Option<u32> {
        self.sub_authorities().last().copied()
    }

    /// Compare two SIDs for equality
    pub fn equal(&self, other: &Sid) -> bool {
        self.revision == other.revision &&
        self.identifier_authority == other.identifier_authority &&
        self.sub_authorities() == other.sub_authorities()
    }

    /// Parse a SID from its binary form, returning it with the bytes consumed
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < SID_HEADER_LENGTH {
            return Err(SecurityError::InvalidSid);
        }

        let revision = data[0];
        let count = data[1] as usize;
        if revision != SID_REVISION || count > SID_MAX_SUB_AUTHORITIES {
            return Err(SecurityError::InvalidSid);
        }

        let length = SID_HEADER_LENGTH + count * 4;
        if data.len() < length {
            return Err(SecurityError::InvalidSid);
        }

        let mut sid = Self::new();
        sid.sub_authority_count = count as u8;
        sid.identifier_authority.copy_from_slice(&data[2..8]);
        for (i, chunk) in data[SID_HEADER_LENGTH..length].chunks_exact(4).enumerate() {
            sid.sub_authority[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        Ok((sid, length))
    }

    /// Append the binary form of this SID to a buffer
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let sub_authorities = self.sub_authorities();
        buf.push(self.revision);
        buf.push(sub_authorities.len() as u8);
        buf.extend_from_slice(&self.identifier_authority);
        for sa in sub_authorities {
            buf.extend_from_slice(&sa.to_le_bytes());
        }
    }

    /// Binary form of this SID
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.length());
        self.write_to(&mut buf);
        buf
    }
}

impl Default for Sid {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Sid {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for Sid {}

impl Hash for Sid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.revision.hash(state);
        self.identifier_authority.hash(state);
        self.sub_authorities().hash(state);
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-", self.revision)?;

        // Authorities that fit in 32 bits print as decimal, the rest as hex
        let auth = &self.identifier_authority;
        if auth[0] == 0 && auth[1] == 0 {
            let value = u32::from_be_bytes([auth[2], auth[3], auth[4], auth[5]]);
            write!(f, "{}", value)?;
        } else {
            write!(f, "0x")?;
            for byte in auth {
                write!(f, "{:02X}", byte)?;
            }
        }

        for sa in self.sub_authorities() {
            write!(f, "-{}", sa)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid({})", self)
    }
}

impl FromStr for Sid {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('-');
        if !matches!(parts.next(), Some("S") | Some("s")) {
            return Err(SecurityError::InvalidSid);
        }

        let revision: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or(SecurityError::InvalidSid)?;
        if revision != SID_REVISION {
            return Err(SecurityError::InvalidSid);
        }

        let authority_text = parts.next().ok_or(SecurityError::InvalidSid)?;
        let authority_value = match authority_text.strip_prefix("0x").or_else(|| authority_text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).map_err(|_| SecurityError::InvalidSid)?,
            None => authority_text.parse::<u64>().map_err(|_| SecurityError::InvalidSid)?,
        };
        if authority_value >> 48 != 0 {
            return Err(SecurityError::InvalidSid);
        }
        let mut authority = [0u8; 6];
        authority.copy_from_slice(&authority_value.to_be_bytes()[2..8]);

        let mut sub_authorities = [0u32; SID_MAX_SUB_AUTHORITIES];
        let mut count = 0;
        for part in parts {
            if count == SID_MAX_SUB_AUTHORITIES {
                return Err(SecurityError::InvalidSid);
            }
            sub_authorities[count] = part.parse().map_err(|_| SecurityError::InvalidSid)?;
            count += 1;
        }

        Sid::create(authority, &sub_authorities[..count]).ok_or(SecurityError::InvalidSid)
    }
}

// ============================================================================
// Well-Known SIDs
// ============================================================================

const fn well_known(authority: [u8; 6], count: u8, rid0: u32, rid1: u32) -> Sid {
    let mut sub_authority = [0u32; SID_MAX_SUB_AUTHORITIES];
    sub_authority[0] = rid0;
    sub_authority[1] = rid1;
    Sid {
        revision: SID_REVISION,
        sub_authority_count: count,
        identifier_authority: authority,
        sub_authority,
    }
}

/// Null SID (S-1-0-0)
pub const SID_NULL: Sid = well_known(
    identifier_authority::SECURITY_NULL_SID_AUTHORITY,
    1,
    well_known_rids::SECURITY_NULL_RID,
    0,
);

/// Everyone SID (S-1-1-0)
pub const SID_WORLD: Sid = well_known(
    identifier_authority::SECURITY_WORLD_SID_AUTHORITY,
    1,
    well_known_rids::SECURITY_WORLD_RID,
    0,
);

/// Creator Owner SID (S-1-3-0)
pub const SID_CREATOR_OWNER: Sid = well_known(
    identifier_authority::SECURITY_CREATOR_SID_AUTHORITY,
    1,
    well_known_rids::SECURITY_CREATOR_OWNER_RID,
    0,
);

/// Local System SID (S-1-5-18)
pub const SID_LOCAL_SYSTEM: Sid = well_known(
    identifier_authority::SECURITY_NT_AUTHORITY,
    1,
    well_known_rids::SECURITY_LOCAL_SYSTEM_RID,
    0,
);

/// Local Service SID (S-1-5-19)
pub const SID_LOCAL_SERVICE: Sid = well_known(
    identifier_authority::SECURITY_NT_AUTHORITY,
    1,
    well_known_rids::SECURITY_LOCAL_SERVICE_RID,
    0,
);

/// Network Service SID (S-1-5-20)
pub const SID_NETWORK_SERVICE: Sid = well_known(
    identifier_authority::SECURITY_NT_AUTHORITY,
    1,
    well_known_rids::SECURITY_NETWORK_SERVICE_RID,
    0,
);

/// Authenticated Users SID (S-1-5-11)
pub const SID_AUTHENTICATED_USERS: Sid = well_known(
    identifier_authority::SECURITY_NT_AUTHORITY,
    1,
    well_known_rids::SECURITY_AUTHENTICATED_USER_RID,
    0,
);

/// Administrators group SID (S-1-5-32-544)
pub const SID_BUILTIN_ADMINISTRATORS: Sid = well_known(
    identifier_authority::SECURITY_NT_AUTHORITY,
    2,
    well_known_rids::SECURITY_BUILTIN_DOMAIN_RID,
    well_known_rids::DOMAIN_ALIAS_RID_ADMINS,
);

/// Users group SID (S-1-5-32-545)
pub const SID_BUILTIN_USERS: Sid = well_known(
    identifier_authority::SECURITY_NT_AUTHORITY,
    2,
    well_known_rids::SECURITY_BUILTIN_DOMAIN_RID,
    well_known_rids::DOMAIN_ALIAS_RID_USERS,
);
