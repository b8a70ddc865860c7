//! ACL Binary Codec
//!
//! Self-relative wire layout of an ACL (all integers little-endian):
//!
//! ```text
//! ACL header   revision u8 | sbz1 u8 | size u16 | count u16 | sbz2 u16
//! ACE header   type u8 | flags u8 | size u16
//! ACE body     mask u32
//!              [object flags u32 | object type GUID | inherited type GUID]
//!              SID
//!              [callback application data, padded to 4 bytes]
//! ```
//!
//! The object part is only present for object ACE types, and each GUID only
//! when its object flag is set.

use alloc::vec::Vec;

use super::ace::{Ace, AceFlags, AceType, ObjectAceFlags, ACE_HEADER_LENGTH};
use super::acl::{Acl, ACL_HEADER_LENGTH, MAX_ACL_SIZE};
use super::error::{Result, SecurityError};
use super::sid::Sid;
use crate::rtl::uuid::{Guid, GUID_LENGTH};

/// Raw ACL byte codec
pub trait AclCodec: Send + Sync {
    fn encode(&self, acl: &Acl) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8], is_container: bool, is_directory_service: bool) -> Result<Acl>;
}

/// NT binary ACL layout
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryAclCodec;

impl AclCodec for BinaryAclCodec {
    fn encode(&self, acl: &Acl) -> Result<Vec<u8>> {
        encode_acl(acl)
    }

    fn decode(&self, bytes: &[u8], is_container: bool, is_directory_service: bool) -> Result<Acl> {
        decode_acl(bytes, is_container, is_directory_service)
    }
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Encode an ACL into its binary form
pub fn encode_acl(acl: &Acl) -> Result<Vec<u8>> {
    let size = acl.binary_length();
    if size > MAX_ACL_SIZE {
        return Err(SecurityError::InvalidAcl("ACL exceeds maximum size"));
    }

    let mut buf = Vec::with_capacity(size);
    buf.push(acl.revision());
    buf.push(0);
    buf.extend_from_slice(&(size as u16).to_le_bytes());
    buf.extend_from_slice(&(acl.len() as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());

    for ace in acl.aces() {
        encode_ace(ace, &mut buf);
    }

    debug_assert_eq!(buf.len(), size);
    Ok(buf)
}

fn encode_ace(ace: &Ace, buf: &mut Vec<u8>) {
    buf.push(ace.ace_type() as u8);
    buf.push(ace.flags.bits());
    buf.extend_from_slice(&(ace.binary_length() as u16).to_le_bytes());
    buf.extend_from_slice(&ace.access_mask.to_le_bytes());

    if ace.is_object() {
        buf.extend_from_slice(&ace.object_flags().bits().to_le_bytes());
        if let Some(guid) = &ace.object_type {
            buf.extend_from_slice(&guid.to_bytes_le());
        }
        if let Some(guid) = &ace.inherited_object_type {
            buf.extend_from_slice(&guid.to_bytes_le());
        }
    }

    ace.sid.write_to(buf);

    if ace.is_callback {
        buf.extend_from_slice(&ace.application_data);
        let padding = (4 - ace.application_data.len() % 4) % 4;
        buf.extend(core::iter::repeat(0u8).take(padding));
    }
}

/// Decode an ACL from its binary form
pub fn decode_acl(bytes: &[u8], is_container: bool, is_directory_service: bool) -> Result<Acl> {
    if bytes.len() < ACL_HEADER_LENGTH {
        return Err(SecurityError::InvalidAcl("buffer smaller than the ACL header"));
    }

    let revision = bytes[0];
    let size = read_u16(bytes, 2).unwrap_or(0) as usize;
    let count = read_u16(bytes, 4).unwrap_or(0) as usize;
    if size < ACL_HEADER_LENGTH || size > bytes.len() {
        return Err(SecurityError::InvalidAcl("ACL size field out of bounds"));
    }

    let data = &bytes[..size];
    let mut offset = ACL_HEADER_LENGTH;
    let mut aces = Vec::with_capacity(count);
    for _ in 0..count {
        let (ace, length) = decode_ace(&data[offset..])?;
        aces.push(ace);
        offset += length;
    }

    Acl::from_parts(revision, is_container, is_directory_service, aces)
}

fn decode_ace(data: &[u8]) -> Result<(Ace, usize)> {
    if data.len() < ACE_HEADER_LENGTH {
        return Err(SecurityError::InvalidAcl("truncated ACE header"));
    }

    let raw_type = data[0];
    let flags = AceFlags::from_bits_retain(data[1]);
    let size = read_u16(data, 2).unwrap_or(0) as usize;
    if size < ACE_HEADER_LENGTH + 4 || size % 4 != 0 || size > data.len() {
        return Err(SecurityError::InvalidAcl("ACE size field out of bounds"));
    }

    let ace_type = AceType::from_u8(raw_type).ok_or(SecurityError::InvalidAcl("unknown ACE type"))?;
    let (qualifier, is_callback, is_object) = ace_type
        .decompose()
        .ok_or(SecurityError::InvalidAcl("unsupported ACE type"))?;

    let body = &data[ACE_HEADER_LENGTH..size];
    let access_mask = read_u32(body, 0).ok_or(SecurityError::InvalidAcl("truncated ACE"))?;
    let mut pos = 4;

    let mut object_type = None;
    let mut inherited_object_type = None;
    if is_object {
        let object_flags = ObjectAceFlags::from_bits_truncate(
            read_u32(body, pos).ok_or(SecurityError::InvalidAcl("truncated object ACE"))?,
        );
        pos += 4;
        if object_flags.contains(ObjectAceFlags::OBJECT_TYPE_PRESENT) {
            let guid = body.get(pos..).and_then(Guid::read_le);
            object_type = Some(guid.ok_or(SecurityError::InvalidAcl("truncated object type"))?);
            pos += GUID_LENGTH;
        }
        if object_flags.contains(ObjectAceFlags::INHERITED_OBJECT_TYPE_PRESENT) {
            let guid = body.get(pos..).and_then(Guid::read_le);
            inherited_object_type = Some(guid.ok_or(SecurityError::InvalidAcl("truncated inherited object type"))?);
            pos += GUID_LENGTH;
        }
    }

    let sid_bytes = body.get(pos..).ok_or(SecurityError::InvalidAcl("truncated ACE SID"))?;
    let (sid, sid_length) = Sid::from_bytes(sid_bytes)
        .map_err(|_| SecurityError::InvalidAcl("malformed SID in ACE"))?;
    pos += sid_length;

    let mut ace = Ace::new(qualifier, sid, access_mask, flags)
        .with_object_types(object_type, inherited_object_type);
    if is_callback {
        ace = ace.with_callback_data(body[pos..].to_vec());
    }

    Ok((ace, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::se::ace::AceQualifier;
    use crate::se::acl::{ACL_REVISION, ACL_REVISION_DS};
    use crate::se::sid::{SID_BUILTIN_ADMINISTRATORS, SID_WORLD};
    use alloc::vec;

    fn sample() -> Acl {
        let aces = vec![
            Ace::new(AceQualifier::AccessDenied, SID_WORLD, 0x0001_0000, AceFlags::empty()),
            Ace::new(AceQualifier::AccessAllowed, SID_BUILTIN_ADMINISTRATORS, 0x001F_01FF, AceFlags::CONTAINER_INHERIT),
            Ace::new(AceQualifier::AccessAllowed, SID_WORLD, 0x1, AceFlags::INHERITED)
                .with_callback_data(vec![0x61, 0x72, 0x74, 0x78, 0x01]),
        ];
        Acl::from_parts(ACL_REVISION, true, false, aces).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let acl = sample();
        let bytes = encode_acl(&acl).unwrap();
        assert_eq!(bytes[0], ACL_REVISION);
        assert_eq!(read_u16(&bytes, 2), Some(bytes.len() as u16));
        assert_eq!(read_u16(&bytes, 4), Some(3));
        // First ACE: access denied, 20 bytes
        assert_eq!(&bytes[8..12], &[1, 0, 20, 0]);
    }

    #[test]
    fn test_decode_matches_encode() {
        let acl = sample();
        let bytes = encode_acl(&acl).unwrap();
        let decoded = decode_acl(&bytes, true, false).unwrap();
        assert_eq!(decoded.aces()[2].application_data, vec![0x61, 0x72, 0x74, 0x78, 0x01, 0, 0, 0]);
        assert_eq!(decoded, acl);
        assert_eq!(encode_acl(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_object_ace_layout() {
        let object_type = Guid::new(0xbf967aba, 0x0de6, 0x11d0, [0xa2, 0x85, 0, 0xaa, 0, 0x30, 0x49, 0xe2]);
        let ace = Ace::new(AceQualifier::SystemAudit, SID_WORLD, 0x10, AceFlags::FAILED_ACCESS)
            .with_object_types(None, Some(object_type));
        let acl = Acl::from_parts(ACL_REVISION_DS, true, true, vec![ace.clone()]).unwrap();

        let bytes = encode_acl(&acl).unwrap();
        assert_eq!(bytes[8], AceType::SystemAuditObject as u8);
        assert_eq!(read_u32(&bytes, 16), Some(ObjectAceFlags::INHERITED_OBJECT_TYPE_PRESENT.bits()));

        let decoded = decode_acl(&bytes, true, true).unwrap();
        assert_eq!(decoded.aces(), &[ace]);
    }

    #[test]
    fn test_object_ace_needs_ds_revision() {
        let ace = Ace::new(AceQualifier::AccessAllowed, SID_WORLD, 0x1, AceFlags::empty())
            .with_object_types(Some(Guid::new(1, 2, 3, [4; 8])), None);
        let acl = Acl::from_parts(ACL_REVISION_DS, true, false, vec![ace]).unwrap();
        let mut bytes = encode_acl(&acl).unwrap();
        bytes[0] = ACL_REVISION;
        assert_eq!(
            decode_acl(&bytes, true, false),
            Err(SecurityError::RevisionTooLow { required: ACL_REVISION_DS, found: ACL_REVISION })
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        let bytes = encode_acl(&sample()).unwrap();

        assert!(decode_acl(&bytes[..6], true, false).is_err());

        let mut truncated = bytes.clone();
        truncated[2] = 12;
        truncated[3] = 0;
        assert_eq!(
            decode_acl(&truncated, true, false),
            Err(SecurityError::InvalidAcl("ACE size field out of bounds"))
        );

        let mut mandatory = bytes.clone();
        mandatory[8] = AceType::SystemMandatoryLabel as u8;
        assert_eq!(
            decode_acl(&mandatory, true, false),
            Err(SecurityError::InvalidAcl("unsupported ACE type"))
        );

        let mut bad_revision = bytes;
        bad_revision[0] = 9;
        assert_eq!(
            decode_acl(&bad_revision, true, false),
            Err(SecurityError::InvalidAcl("unknown ACL revision"))
        );
    }
}
