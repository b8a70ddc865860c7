//! Security Descriptor Implementation
//!
//! A security descriptor contains the security information for an object:
//! - Owner SID: Who owns the object
//! - Group SID: Primary group of the object
//! - DACL: Discretionary ACL - who can access the object
//! - SACL: System ACL - auditing information
//!
//! Either ACL may be absent. Absence is distinct from an empty list: an
//! absent DACL grants everyone access, an empty one grants nobody. The
//! `DACL_PRESENT`/`SACL_PRESENT` control bits always mirror which lists exist.
//!
//! # Formats
//! - In memory: owned SIDs and ACLs
//! - Self-relative: all data in one contiguous block (for storage/transmission)

use alloc::vec::Vec;

use super::acl::Acl;
use super::codec::AclCodec;
use super::error::{Result, SecurityError};
use super::sid::Sid;

/// Security descriptor revision
pub const SECURITY_DESCRIPTOR_REVISION: u8 = 1;

/// Size of the self-relative header
pub const SECURITY_DESCRIPTOR_HEADER_LENGTH: usize = 20;

bitflags::bitflags! {
    /// Security descriptor control flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SdControl: u16 {
        /// Owner defaulted (set by RM, not creator)
        const OWNER_DEFAULTED = 0x0001;
        /// Group defaulted
        const GROUP_DEFAULTED = 0x0002;
        /// DACL present
        const DACL_PRESENT = 0x0004;
        /// DACL defaulted
        const DACL_DEFAULTED = 0x0008;
        /// SACL present
        const SACL_PRESENT = 0x0010;
        /// SACL defaulted
        const SACL_DEFAULTED = 0x0020;
        /// DACL auto-inherited by children
        const DACL_AUTO_INHERIT_REQ = 0x0100;
        /// SACL auto-inherited by children
        const SACL_AUTO_INHERIT_REQ = 0x0200;
        /// DACL was auto-inherited
        const DACL_AUTO_INHERITED = 0x0400;
        /// SACL was auto-inherited
        const SACL_AUTO_INHERITED = 0x0800;
        /// DACL protected from inheritance
        const DACL_PROTECTED = 0x1000;
        /// SACL protected from inheritance
        const SACL_PROTECTED = 0x2000;
        /// Resource manager control bits
        const RM_CONTROL_VALID = 0x4000;
        /// Self-relative format
        const SELF_RELATIVE = 0x8000;
    }
}

/// Per-object settings fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityOptions {
    /// Object can have children; entries may carry inheritance flags
    pub is_container: bool,
    /// Directory-service object; entries may be object-typed
    pub is_directory_service: bool,
}

impl SecurityOptions {
    pub const fn new(is_container: bool, is_directory_service: bool) -> Self {
        Self { is_container, is_directory_service }
    }
}

/// Security Descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor {
    revision: u8,
    control: SdControl,
    options: SecurityOptions,
    owner: Option<Sid>,
    group: Option<Sid>,
    sacl: Option<Acl>,
    dacl: Option<Acl>,
}

fn read_offset(data: &[u8], at: usize) -> usize {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize
}

fn section(data: &[u8], offset: usize) -> Result<Option<&[u8]>> {
    if offset == 0 {
        return Ok(None);
    }
    if offset < SECURITY_DESCRIPTOR_HEADER_LENGTH || offset >= data.len() {
        return Err(SecurityError::InvalidSecurityDescriptor("component offset out of bounds"));
    }
    Ok(Some(&data[offset..]))
}

impl SecurityDescriptor {
    /// Create a new empty security descriptor
    pub fn new(options: SecurityOptions) -> Self {
        Self {
            revision: SECURITY_DESCRIPTOR_REVISION,
            control: SdControl::empty(),
            options,
            owner: None,
            group: None,
            sacl: None,
            dacl: None,
        }
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn control(&self) -> SdControl {
        self.control
    }

    pub fn options(&self) -> SecurityOptions {
        self.options
    }

    /// Empty list shaped for this object
    pub fn new_acl(&self) -> Acl {
        Acl::new(self.options.is_container, self.options.is_directory_service)
    }

    pub fn owner(&self) -> Option<&Sid> {
        self.owner.as_ref()
    }

    pub fn group(&self) -> Option<&Sid> {
        self.group.as_ref()
    }

    pub fn set_owner(&mut self, owner: Option<Sid>) {
        self.owner = owner;
        self.control.remove(SdControl::OWNER_DEFAULTED);
    }

    pub fn set_group(&mut self, group: Option<Sid>) {
        self.group = group;
        self.control.remove(SdControl::GROUP_DEFAULTED);
    }

    pub fn has_dacl(&self) -> bool {
        self.control.contains(SdControl::DACL_PRESENT)
    }

    pub fn has_sacl(&self) -> bool {
        self.control.contains(SdControl::SACL_PRESENT)
    }

    pub fn dacl(&self) -> Option<&Acl> {
        self.dacl.as_ref()
    }

    pub fn sacl(&self) -> Option<&Acl> {
        self.sacl.as_ref()
    }

    /// Install or drop the DACL, keeping `DACL_PRESENT` in sync
    pub fn set_dacl(&mut self, dacl: Option<Acl>) {
        self.control.set(SdControl::DACL_PRESENT, dacl.is_some());
        self.control.remove(SdControl::DACL_DEFAULTED);
        self.dacl = dacl;
    }

    /// Install or drop the SACL, keeping `SACL_PRESENT` in sync
    pub fn set_sacl(&mut self, sacl: Option<Acl>) {
        self.control.set(SdControl::SACL_PRESENT, sacl.is_some());
        self.control.remove(SdControl::SACL_DEFAULTED);
        self.sacl = sacl;
    }

    pub fn is_dacl_protected(&self) -> bool {
        self.control.contains(SdControl::DACL_PROTECTED)
    }

    pub fn is_sacl_protected(&self) -> bool {
        self.control.contains(SdControl::SACL_PROTECTED)
    }

    pub fn set_dacl_protected(&mut self, protected: bool) {
        self.control.set(SdControl::DACL_PROTECTED, protected);
    }

    pub fn set_sacl_protected(&mut self, protected: bool) {
        self.control.set(SdControl::SACL_PROTECTED, protected);
    }

    /// Parse a self-relative descriptor
    ///
    /// A list flagged present but stored at offset zero (a NULL ACL) is
    /// treated as absent.
    pub fn from_self_relative(bytes: &[u8], options: SecurityOptions, codec: &dyn AclCodec) -> Result<Self> {
        if bytes.len() < SECURITY_DESCRIPTOR_HEADER_LENGTH {
            return Err(SecurityError::InvalidSecurityDescriptor("buffer smaller than the descriptor header"));
        }
        if bytes[0] != SECURITY_DESCRIPTOR_REVISION {
            return Err(SecurityError::InvalidSecurityDescriptor("unknown descriptor revision"));
        }

        let control = SdControl::from_bits_retain(u16::from_le_bytes([bytes[2], bytes[3]]));
        if !control.contains(SdControl::SELF_RELATIVE) {
            return Err(SecurityError::InvalidSecurityDescriptor("descriptor is not self-relative"));
        }

        let owner = match section(bytes, read_offset(bytes, 4))? {
            Some(data) => Some(Sid::from_bytes(data)?.0),
            None => None,
        };
        let group = match section(bytes, read_offset(bytes, 8))? {
            Some(data) => Some(Sid::from_bytes(data)?.0),
            None => None,
        };
        let sacl = match section(bytes, read_offset(bytes, 12))? {
            Some(data) if control.contains(SdControl::SACL_PRESENT) => {
                Some(codec.decode(data, options.is_container, options.is_directory_service)?)
            }
            _ => None,
        };
        let dacl = match section(bytes, read_offset(bytes, 16))? {
            Some(data) if control.contains(SdControl::DACL_PRESENT) => {
                Some(codec.decode(data, options.is_container, options.is_directory_service)?)
            }
            _ => None,
        };

        let mut descriptor = Self::new(options);
        descriptor.control = control - SdControl::SELF_RELATIVE;
        descriptor.owner = owner;
        descriptor.group = group;
        descriptor.control.set(SdControl::SACL_PRESENT, sacl.is_some());
        descriptor.control.set(SdControl::DACL_PRESENT, dacl.is_some());
        descriptor.sacl = sacl;
        descriptor.dacl = dacl;

        log::trace!(
            "[SE] Parsed self-relative descriptor ({} bytes, control {:#06x})",
            bytes.len(),
            descriptor.control.bits()
        );

        Ok(descriptor)
    }

    /// Emit the self-relative form: header, SACL, DACL, owner, group
    pub fn to_self_relative(&self, codec: &dyn AclCodec) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(SECURITY_DESCRIPTOR_HEADER_LENGTH);
        buf.push(self.revision);
        buf.push(0);
        buf.extend_from_slice(&(self.control | SdControl::SELF_RELATIVE).bits().to_le_bytes());
        buf.resize(SECURITY_DESCRIPTOR_HEADER_LENGTH, 0);

        let mut offsets = [0u32; 4];
        if let Some(sacl) = &self.sacl {
            offsets[2] = buf.len() as u32;
            buf.extend_from_slice(&codec.encode(sacl)?);
        }
        if let Some(dacl) = &self.dacl {
            offsets[3] = buf.len() as u32;
            buf.extend_from_slice(&codec.encode(dacl)?);
        }
        if let Some(owner) = &self.owner {
            offsets[0] = buf.len() as u32;
            owner.write_to(&mut buf);
        }
        if let Some(group) = &self.group {
            offsets[1] = buf.len() as u32;
            group.write_to(&mut buf);
        }

        for (i, offset) in offsets.iter().enumerate() {
            let at = 4 + i * 4;
            buf[at..at + 4].copy_from_slice(&offset.to_le_bytes());
        }

        Ok(buf)
    }
}
