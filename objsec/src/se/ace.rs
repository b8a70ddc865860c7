//! Access Control Entry (ACE) Implementation
//!
//! An ACE binds a SID to an access mask under a qualifier (allow, deny,
//! audit, alarm). Two storage shapes exist:
//! - Generic entries: header, mask, SID
//! - Object entries: additionally scoped by an object-type GUID and/or an
//!   inherited-object-type GUID. These need an ACL at `ACL_REVISION_DS`.
//!
//! Callback variants carry opaque application data after the SID. The rule
//! engine never surfaces or edits them, it only carries them along.

use alloc::vec::Vec;

use super::rule::{AuditFlags, InheritanceFlags, PropagationFlags};
use super::sid::Sid;
use crate::rtl::uuid::{Guid, GUID_LENGTH};

/// Size of the ACE header (type, flags, size)
pub const ACE_HEADER_LENGTH: usize = 4;

/// ACE types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AceType {
    /// Access allowed
    AccessAllowed = 0,
    /// Access denied
    AccessDenied = 1,
    /// System audit
    SystemAudit = 2,
    /// System alarm
    SystemAlarm = 3,
    /// Access allowed (compound)
    AccessAllowedCompound = 4,
    /// Access allowed (object-specific)
    AccessAllowedObject = 5,
    /// Access denied (object-specific)
    AccessDeniedObject = 6,
    /// System audit (object-specific)
    SystemAuditObject = 7,
    /// System alarm (object-specific)
    SystemAlarmObject = 8,
    /// Access allowed (callback)
    AccessAllowedCallback = 9,
    /// Access denied (callback)
    AccessDeniedCallback = 10,
    /// Access allowed (callback, object-specific)
    AccessAllowedCallbackObject = 11,
    /// Access denied (callback, object-specific)
    AccessDeniedCallbackObject = 12,
    /// System audit (callback)
    SystemAuditCallback = 13,
    /// System alarm (callback)
    SystemAlarmCallback = 14,
    /// System audit (callback, object-specific)
    SystemAuditCallbackObject = 15,
    /// System alarm (callback, object-specific)
    SystemAlarmCallbackObject = 16,
    /// Mandatory label
    SystemMandatoryLabel = 17,
}

impl AceType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let ace_type = match value {
            0 => Self::AccessAllowed,
            1 => Self::AccessDenied,
            2 => Self::SystemAudit,
            3 => Self::SystemAlarm,
            4 => Self::AccessAllowedCompound,
            5 => Self::AccessAllowedObject,
            6 => Self::AccessDeniedObject,
            7 => Self::SystemAuditObject,
            8 => Self::SystemAlarmObject,
            9 => Self::AccessAllowedCallback,
            10 => Self::AccessDeniedCallback,
            11 => Self::AccessAllowedCallbackObject,
            12 => Self::AccessDeniedCallbackObject,
            13 => Self::SystemAuditCallback,
            14 => Self::SystemAlarmCallback,
            15 => Self::SystemAuditCallbackObject,
            16 => Self::SystemAlarmCallbackObject,
            17 => Self::SystemMandatoryLabel,
            _ => return None,
        };
        Some(ace_type)
    }

    /// Split into (qualifier, is_callback, is_object)
    ///
    /// Compound and mandatory-label entries have no rule representation.
    pub fn decompose(self) -> Option<(AceQualifier, bool, bool)> {
        use AceQualifier::*;
        let parts = match self {
            Self::AccessAllowed => (AccessAllowed, false, false),
            Self::AccessDenied => (AccessDenied, false, false),
            Self::SystemAudit => (SystemAudit, false, false),
            Self::SystemAlarm => (SystemAlarm, false, false),
            Self::AccessAllowedObject => (AccessAllowed, false, true),
            Self::AccessDeniedObject => (AccessDenied, false, true),
            Self::SystemAuditObject => (SystemAudit, false, true),
            Self::SystemAlarmObject => (SystemAlarm, false, true),
            Self::AccessAllowedCallback => (AccessAllowed, true, false),
            Self::AccessDeniedCallback => (AccessDenied, true, false),
            Self::AccessAllowedCallbackObject => (AccessAllowed, true, true),
            Self::AccessDeniedCallbackObject => (AccessDenied, true, true),
            Self::SystemAuditCallback => (SystemAudit, true, false),
            Self::SystemAlarmCallback => (SystemAlarm, true, false),
            Self::SystemAuditCallbackObject => (SystemAudit, true, true),
            Self::SystemAlarmCallbackObject => (SystemAlarm, true, true),
            Self::AccessAllowedCompound | Self::SystemMandatoryLabel => return None,
        };
        Some(parts)
    }

    /// Inverse of [`AceType::decompose`]
    pub fn compose(qualifier: AceQualifier, is_callback: bool, is_object: bool) -> Self {
        use AceQualifier::*;
        match (qualifier, is_callback, is_object) {
            (AccessAllowed, false, false) => Self::AccessAllowed,
            (AccessDenied, false, false) => Self::AccessDenied,
            (SystemAudit, false, false) => Self::SystemAudit,
            (SystemAlarm, false, false) => Self::SystemAlarm,
            (AccessAllowed, false, true) => Self::AccessAllowedObject,
            (AccessDenied, false, true) => Self::AccessDeniedObject,
            (SystemAudit, false, true) => Self::SystemAuditObject,
            (SystemAlarm, false, true) => Self::SystemAlarmObject,
            (AccessAllowed, true, false) => Self::AccessAllowedCallback,
            (AccessDenied, true, false) => Self::AccessDeniedCallback,
            (AccessAllowed, true, true) => Self::AccessAllowedCallbackObject,
            (AccessDenied, true, true) => Self::AccessDeniedCallbackObject,
            (SystemAudit, true, false) => Self::SystemAuditCallback,
            (SystemAlarm, true, false) => Self::SystemAlarmCallback,
            (SystemAudit, true, true) => Self::SystemAuditCallbackObject,
            (SystemAlarm, true, true) => Self::SystemAlarmCallbackObject,
        }
    }
}

/// Purpose of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AceQualifier {
    AccessAllowed,
    AccessDenied,
    SystemAudit,
    SystemAlarm,
}

bitflags::bitflags! {
    /// ACE header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AceFlags: u8 {
        /// Inherited by child leaf objects
        const OBJECT_INHERIT = 0x01;
        /// Inherited by sub-containers
        const CONTAINER_INHERIT = 0x02;
        /// Don't propagate inherit flags
        const NO_PROPAGATE_INHERIT = 0x04;
        /// Applies only to inherited objects
        const INHERIT_ONLY = 0x08;
        /// Entry was inherited
        const INHERITED = 0x10;
        /// Audit on successful access
        const SUCCESSFUL_ACCESS = 0x40;
        /// Audit on failed access
        const FAILED_ACCESS = 0x80;

        const INHERITANCE = 0x0F;
        const AUDIT = 0xC0;
    }
}

impl AceFlags {
    /// Encode rule-level flags. Propagation is meaningless without inheritance
    /// and is dropped in that case.
    pub fn from_rule_flags(
        inheritance: InheritanceFlags,
        propagation: PropagationFlags,
        audit: AuditFlags,
    ) -> Self {
        let mut flags = Self::empty();
        if inheritance.contains(InheritanceFlags::CONTAINER_INHERIT) {
            flags |= Self::CONTAINER_INHERIT;
        }
        if inheritance.contains(InheritanceFlags::OBJECT_INHERIT) {
            flags |= Self::OBJECT_INHERIT;
        }
        if !inheritance.is_empty() {
            if propagation.contains(PropagationFlags::NO_PROPAGATE_INHERIT) {
                flags |= Self::NO_PROPAGATE_INHERIT;
            }
            if propagation.contains(PropagationFlags::INHERIT_ONLY) {
                flags |= Self::INHERIT_ONLY;
            }
        }
        if audit.contains(AuditFlags::SUCCESS) {
            flags |= Self::SUCCESSFUL_ACCESS;
        }
        if audit.contains(AuditFlags::FAILURE) {
            flags |= Self::FAILED_ACCESS;
        }
        flags
    }

    pub fn inheritance_flags(self) -> InheritanceFlags {
        let mut flags = InheritanceFlags::empty();
        if self.contains(Self::CONTAINER_INHERIT) {
            flags |= InheritanceFlags::CONTAINER_INHERIT;
        }
        if self.contains(Self::OBJECT_INHERIT) {
            flags |= InheritanceFlags::OBJECT_INHERIT;
        }
        flags
    }

    pub fn propagation_flags(self) -> PropagationFlags {
        let mut flags = PropagationFlags::empty();
        if self.contains(Self::NO_PROPAGATE_INHERIT) {
            flags |= PropagationFlags::NO_PROPAGATE_INHERIT;
        }
        if self.contains(Self::INHERIT_ONLY) {
            flags |= PropagationFlags::INHERIT_ONLY;
        }
        flags
    }

    pub fn audit_flags(self) -> AuditFlags {
        let mut flags = AuditFlags::empty();
        if self.contains(Self::SUCCESSFUL_ACCESS) {
            flags |= AuditFlags::SUCCESS;
        }
        if self.contains(Self::FAILED_ACCESS) {
            flags |= AuditFlags::FAILURE;
        }
        flags
    }
}

bitflags::bitflags! {
    /// Which GUIDs an object ACE carries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ObjectAceFlags: u32 {
        const OBJECT_TYPE_PRESENT = 0x1;
        const INHERITED_OBJECT_TYPE_PRESENT = 0x2;
    }
}

/// Access control entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ace {
    pub qualifier: AceQualifier,
    pub flags: AceFlags,
    pub access_mask: u32,
    pub sid: Sid,
    pub is_callback: bool,
    pub object_type: Option<Guid>,
    pub inherited_object_type: Option<Guid>,
    /// Callback application data (empty for non-callback entries)
    pub application_data: Vec<u8>,
}

impl Ace {
    /// Generic, non-callback entry
    pub fn new(qualifier: AceQualifier, sid: Sid, access_mask: u32, flags: AceFlags) -> Self {
        Self {
            qualifier,
            flags,
            access_mask,
            sid,
            is_callback: false,
            object_type: None,
            inherited_object_type: None,
            application_data: Vec::new(),
        }
    }

    pub fn with_object_types(mut self, object_type: Option<Guid>, inherited_object_type: Option<Guid>) -> Self {
        self.object_type = object_type;
        self.inherited_object_type = inherited_object_type;
        self
    }

    /// Mark the entry as a callback entry
    ///
    /// The data is zero-padded to a DWORD boundary, the form it takes on the
    /// wire, so an encode/decode cycle leaves the entry unchanged.
    pub fn with_callback_data(mut self, mut data: Vec<u8>) -> Self {
        let padded = (data.len() + 3) & !3;
        data.resize(padded, 0);
        self.is_callback = true;
        self.application_data = data;
        self
    }

    pub fn object_flags(&self) -> ObjectAceFlags {
        let mut flags = ObjectAceFlags::empty();
        if self.object_type.is_some() {
            flags |= ObjectAceFlags::OBJECT_TYPE_PRESENT;
        }
        if self.inherited_object_type.is_some() {
            flags |= ObjectAceFlags::INHERITED_OBJECT_TYPE_PRESENT;
        }
        flags
    }

    /// Object-typed entries carry at least one GUID
    pub fn is_object(&self) -> bool {
        !self.object_flags().is_empty()
    }

    pub fn is_inherited(&self) -> bool {
        self.flags.contains(AceFlags::INHERITED)
    }

    pub fn ace_type(&self) -> AceType {
        AceType::compose(self.qualifier, self.is_callback, self.is_object())
    }

    /// Same principal, qualifier, flags and object scope (mask ignored)
    pub fn same_shape(&self, other: &Ace) -> bool {
        self.qualifier == other.qualifier &&
        self.sid == other.sid &&
        self.flags == other.flags &&
        self.object_type == other.object_type &&
        self.inherited_object_type == other.inherited_object_type
    }

    /// Explicit entries that rule modifications may touch
    pub fn is_editable(&self) -> bool {
        !self.is_callback && !self.is_inherited()
    }

    /// Encoded size in bytes
    pub fn binary_length(&self) -> usize {
        let mut length = ACE_HEADER_LENGTH + 4 + self.sid.length();
        if self.is_object() {
            length += 4;
            if self.object_type.is_some() {
                length += GUID_LENGTH;
            }
            if self.inherited_object_type.is_some() {
                length += GUID_LENGTH;
            }
        }
        if self.is_callback {
            length += (self.application_data.len() + 3) & !3;
        }
        length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::se::sid::SID_WORLD;
    use alloc::vec;

    #[test]
    fn test_ace_type_round_trip() {
        for raw in 0u8..=17 {
            let ace_type = AceType::from_u8(raw).unwrap();
            assert_eq!(ace_type as u8, raw);
            if let Some((qualifier, callback, object)) = ace_type.decompose() {
                assert_eq!(AceType::compose(qualifier, callback, object), ace_type);
            }
        }
        assert_eq!(AceType::from_u8(18), None);
        assert_eq!(AceType::SystemMandatoryLabel.decompose(), None);
    }

    #[test]
    fn test_rule_flag_encoding() {
        let flags = AceFlags::from_rule_flags(
            InheritanceFlags::CONTAINER_INHERIT | InheritanceFlags::OBJECT_INHERIT,
            PropagationFlags::INHERIT_ONLY,
            AuditFlags::FAILURE,
        );
        assert_eq!(flags.bits(), 0x02 | 0x01 | 0x08 | 0x80);
        assert_eq!(flags.propagation_flags(), PropagationFlags::INHERIT_ONLY);
        assert_eq!(flags.audit_flags(), AuditFlags::FAILURE);

        // Propagation without inheritance is dropped
        let bare = AceFlags::from_rule_flags(
            InheritanceFlags::empty(),
            PropagationFlags::NO_PROPAGATE_INHERIT,
            AuditFlags::empty(),
        );
        assert!(bare.is_empty());
    }

    #[test]
    fn test_object_and_callback_lengths() {
        let ace = Ace::new(AceQualifier::AccessAllowed, SID_WORLD, 0x1, AceFlags::empty());
        assert_eq!(ace.binary_length(), 4 + 4 + 12);
        assert_eq!(ace.ace_type(), AceType::AccessAllowed);

        let object = ace.clone().with_object_types(Some(Guid::new(1, 2, 3, [4; 8])), None);
        assert!(object.is_object());
        assert_eq!(object.object_flags(), ObjectAceFlags::OBJECT_TYPE_PRESENT);
        assert_eq!(object.binary_length(), 4 + 4 + 4 + 16 + 12);
        assert_eq!(object.ace_type(), AceType::AccessAllowedObject);

        let callback = ace.with_callback_data(vec![1, 2, 3, 4, 5]);
        assert_eq!(callback.application_data, vec![1, 2, 3, 4, 5, 0, 0, 0]);
        assert_eq!(callback.binary_length(), 4 + 4 + 12 + 8);
        assert_eq!(callback.ace_type(), AceType::AccessAllowedCallback);
        assert!(!callback.is_editable());
    }
}
