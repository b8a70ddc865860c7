//! Access Control List (ACL) Implementation
//!
//! ACLs contain Access Control Entries (ACEs) that specify access rights
//! for security principals (users, groups).
//!
//! # ACL Types
//! - DACL (Discretionary ACL): Controls access to an object
//! - SACL (System ACL): Controls auditing
//!
//! # ACE Ordering
//! ACEs are processed in order. Denied ACEs should come before allowed.
//! The canonical order is:
//! 1. Explicit deny ACEs
//! 2. Explicit allow ACEs
//! 3. Inherited ACEs, in the order the parent supplied them
//!
//! A SACL only distinguishes explicit from inherited entries.
//!
//! The editing primitives below only ever touch explicit, non-callback
//! entries. New entries go to the end of their canonical group and a
//! replacement takes the slot of the entry it replaces, so the relative
//! order of existing entries never changes.
//!
//! # Revisions
//! Object-typed ACEs are only legal in an ACL at `ACL_REVISION_DS`. The
//! revision is raised by re-deriving the list from its binary form with the
//! revision byte patched (see [`Acl::rebuild_with_revision`]).

use alloc::vec::Vec;

use super::ace::{Ace, AceQualifier};
use super::codec::AclCodec;
use super::error::{Result, SecurityError};
use super::sid::Sid;

/// ACL revision
pub const ACL_REVISION: u8 = 2;
pub const ACL_REVISION_DS: u8 = 4;

/// Size of the ACL header
pub const ACL_HEADER_LENGTH: usize = 8;

/// Maximum ACL size (16-bit size field, DWORD aligned)
pub const MAX_ACL_SIZE: usize = 0xFFFC;

/// Canonical group of an entry: explicit deny, explicit allow/audit, inherited
fn canonical_rank(ace: &Ace) -> u8 {
    if ace.is_inherited() {
        return 2;
    }
    match ace.qualifier {
        AceQualifier::AccessDenied => 0,
        AceQualifier::AccessAllowed | AceQualifier::SystemAudit | AceQualifier::SystemAlarm => 1,
    }
}

/// Access Control List
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    revision: u8,
    is_container: bool,
    is_directory_service: bool,
    aces: Vec<Ace>,
}

impl Acl {
    /// Empty ACL at `ACL_REVISION`
    pub fn new(is_container: bool, is_directory_service: bool) -> Self {
        Self {
            revision: ACL_REVISION,
            is_container,
            is_directory_service,
            aces: Vec::new(),
        }
    }

    /// Assemble an ACL from decoded parts
    pub fn from_parts(
        revision: u8,
        is_container: bool,
        is_directory_service: bool,
        aces: Vec<Ace>,
    ) -> Result<Self> {
        if !Self::is_valid_revision(revision) {
            return Err(SecurityError::InvalidAcl("unknown ACL revision"));
        }
        if revision < ACL_REVISION_DS && aces.iter().any(Ace::is_object) {
            return Err(SecurityError::RevisionTooLow { required: ACL_REVISION_DS, found: revision });
        }

        Ok(Self {
            revision,
            is_container,
            is_directory_service,
            aces,
        })
    }

    pub fn is_valid_revision(revision: u8) -> bool {
        (ACL_REVISION..=ACL_REVISION_DS).contains(&revision)
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn is_container(&self) -> bool {
        self.is_container
    }

    pub fn is_directory_service(&self) -> bool {
        self.is_directory_service
    }

    pub fn aces(&self) -> &[Ace] {
        &self.aces
    }

    pub fn len(&self) -> usize {
        self.aces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aces.is_empty()
    }

    /// Encoded size in bytes
    pub fn binary_length(&self) -> usize {
        ACL_HEADER_LENGTH + self.aces.iter().map(Ace::binary_length).sum::<usize>()
    }

    /// Re-derive this list at a different revision
    ///
    /// The list is encoded, the revision byte patched and the result decoded
    /// into a fresh ACL. `self` is left untouched.
    pub fn rebuild_with_revision(&self, codec: &dyn AclCodec, revision: u8) -> Result<Self> {
        let mut bytes = codec.encode(self)?;
        match bytes.first_mut() {
            Some(byte) => *byte = revision,
            None => return Err(SecurityError::InvalidAcl("codec produced an empty buffer")),
        }

        log::debug!("[SE] Rebuilding ACL at revision {} (was {})", revision, self.revision);

        codec.decode(&bytes, self.is_container, self.is_directory_service)
    }

    /// Whether entries follow the canonical grouping
    pub fn is_canonical(&self) -> bool {
        self.aces
            .windows(2)
            .all(|pair| canonical_rank(&pair[0]) <= canonical_rank(&pair[1]))
    }

    // ========================================================================
    // Editing primitives
    // ========================================================================

    /// Check that an explicit entry may be stored in this list
    pub fn validate(&self, ace: &Ace) -> Result<()> {
        if ace.is_callback {
            return Err(SecurityError::InvalidArgument("callback entries cannot be edited as rules"));
        }
        if ace.is_inherited() {
            return Err(SecurityError::InvalidArgument("only explicit entries can be added"));
        }
        if ace.access_mask == 0 {
            return Err(SecurityError::InvalidArgument("access mask must be non-zero"));
        }
        if ace.qualifier == AceQualifier::SystemAudit && ace.flags.audit_flags().is_empty() {
            return Err(SecurityError::InvalidArgument("audit flags must not be empty"));
        }
        if !self.is_container && !ace.flags.inheritance_flags().is_empty() {
            return Err(SecurityError::InvalidArgument("inheritance flags must be empty on a leaf object"));
        }
        if ace.is_object() && self.revision < ACL_REVISION_DS {
            return Err(SecurityError::RevisionTooLow {
                required: ACL_REVISION_DS,
                found: self.revision,
            });
        }
        Ok(())
    }

    /// Merge an explicit entry into the list
    ///
    /// An existing explicit entry with the same principal, qualifier, flags
    /// and object scope absorbs the mask. Otherwise the entry is appended to
    /// the end of its canonical group.
    pub fn add(&mut self, ace: Ace) -> Result<()> {
        self.validate(&ace)?;

        if let Some(existing) = self.aces.iter_mut().find(|e| e.is_editable() && e.same_shape(&ace)) {
            existing.access_mask |= ace.access_mask;
            return Ok(());
        }

        if self.binary_length() + ace.binary_length() > MAX_ACL_SIZE {
            return Err(SecurityError::InvalidAcl("ACL exceeds maximum size"));
        }

        let rank = canonical_rank(&ace);
        let position = self
            .aces
            .iter()
            .rposition(|e| canonical_rank(e) <= rank)
            .map_or(0, |i| i + 1);
        self.aces.insert(position, ace);
        Ok(())
    }

    /// Replace every explicit entry of the same qualifier for the principal
    ///
    /// The new entry takes the slot of the first entry it replaces, so its
    /// neighbours keep their order. With nothing to replace it is added.
    pub fn set(&mut self, ace: Ace) -> Result<()> {
        self.validate(&ace)?;

        let slot = self
            .aces
            .iter()
            .position(|e| e.is_editable() && e.qualifier == ace.qualifier && e.sid == ace.sid);
        let Some(slot) = slot else {
            return self.add(ace);
        };

        let mut replaced = self.clone();
        replaced.remove_all(ace.qualifier, &ace.sid);
        if replaced.binary_length() + ace.binary_length() > MAX_ACL_SIZE {
            return Err(SecurityError::InvalidAcl("ACL exceeds maximum size"));
        }

        replaced.aces.insert(slot, ace);
        *self = replaced;
        Ok(())
    }

    /// Clear the entry's rights from matching explicit entries
    ///
    /// Entries left with an empty mask are dropped. Returns false if no
    /// entry shared any of the rights.
    pub fn remove(&mut self, ace: &Ace) -> bool {
        let mut matched = false;
        for entry in self.aces.iter_mut().filter(|e| e.is_editable() && e.same_shape(ace)) {
            if entry.access_mask & ace.access_mask != 0 {
                entry.access_mask &= !ace.access_mask;
                matched = true;
            }
        }

        if matched {
            self.aces
                .retain(|e| !(e.access_mask == 0 && e.is_editable() && e.same_shape(ace)));
        }
        matched
    }

    /// Remove explicit entries equal to `ace` in mask, flags and object scope
    pub fn remove_specific(&mut self, ace: &Ace) -> bool {
        let before = self.aces.len();
        self.aces
            .retain(|e| !(e.is_editable() && e.same_shape(ace) && e.access_mask == ace.access_mask));
        self.aces.len() != before
    }

    /// Remove every explicit entry with this qualifier for the principal
    pub fn remove_all(&mut self, qualifier: AceQualifier, sid: &Sid) -> usize {
        let before = self.aces.len();
        self.aces
            .retain(|e| !(e.is_editable() && e.qualifier == qualifier && e.sid == *sid));
        before - self.aces.len()
    }

    /// Remove every explicit entry for the principal
    pub fn purge(&mut self, sid: &Sid) -> usize {
        let before = self.aces.len();
        self.aces.retain(|e| !(e.is_editable() && e.sid == *sid));
        before - self.aces.len()
    }

    /// Drop every inherited entry
    pub fn remove_inherited(&mut self) -> usize {
        let before = self.aces.len();
        self.aces.retain(|e| !e.is_inherited());
        before - self.aces.len()
    }

    /// Turn inherited entries into explicit ones, keeping their positions
    pub fn make_inherited_explicit(&mut self) {
        for ace in self.aces.iter_mut() {
            ace.flags.remove(super::ace::AceFlags::INHERITED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtl::Guid;
    use crate::se::ace::AceFlags;
    use crate::se::codec::BinaryAclCodec;
    use crate::se::sid::{SID_BUILTIN_USERS, SID_LOCAL_SYSTEM, SID_WORLD};

    fn allow(sid: Sid, mask: u32) -> Ace {
        Ace::new(AceQualifier::AccessAllowed, sid, mask, AceFlags::empty())
    }

    fn deny(sid: Sid, mask: u32) -> Ace {
        Ace::new(AceQualifier::AccessDenied, sid, mask, AceFlags::empty())
    }

    #[test]
    fn test_new_acl_revision() {
        assert_eq!(Acl::new(true, false).revision(), ACL_REVISION);
        assert_eq!(Acl::new(true, true).revision(), ACL_REVISION);
        assert!(Acl::new(true, true).is_directory_service());
        assert!(Acl::new(false, false).is_empty());
    }

    #[test]
    fn test_add_places_deny_first() {
        let mut acl = Acl::new(true, false);
        acl.add(allow(SID_WORLD, 0x1)).unwrap();
        acl.add(allow(SID_BUILTIN_USERS, 0x2)).unwrap();
        acl.add(deny(SID_LOCAL_SYSTEM, 0x4)).unwrap();

        let order: Vec<u32> = acl.aces().iter().map(|a| a.access_mask).collect();
        assert_eq!(order, [0x4, 0x1, 0x2]);
        assert!(acl.is_canonical());
    }

    #[test]
    fn test_add_keeps_inherited_last() {
        let mut inherited = allow(SID_WORLD, 0x10);
        inherited.flags = AceFlags::INHERITED;
        let mut acl = Acl::from_parts(ACL_REVISION, true, false, alloc::vec![inherited]).unwrap();

        acl.add(allow(SID_BUILTIN_USERS, 0x1)).unwrap();
        assert_eq!(acl.aces()[0].sid, SID_BUILTIN_USERS);
        assert!(acl.aces()[1].is_inherited());
    }

    #[test]
    fn test_add_merges_masks() {
        let mut acl = Acl::new(true, false);
        acl.add(allow(SID_WORLD, 0x1)).unwrap();
        acl.add(allow(SID_WORLD, 0x2)).unwrap();
        assert_eq!(acl.len(), 1);
        assert_eq!(acl.aces()[0].access_mask, 0x3);
    }

    #[test]
    fn test_add_validation() {
        let mut leaf = Acl::new(false, false);
        let mut inheritable = allow(SID_WORLD, 0x1);
        inheritable.flags = AceFlags::CONTAINER_INHERIT;
        assert!(matches!(leaf.add(inheritable), Err(SecurityError::InvalidArgument(_))));
        assert!(matches!(leaf.add(allow(SID_WORLD, 0)), Err(SecurityError::InvalidArgument(_))));

        let object = allow(SID_WORLD, 0x1).with_object_types(Some(Guid::new(1, 1, 1, [1; 8])), None);
        assert_eq!(
            leaf.add(object),
            Err(SecurityError::RevisionTooLow { required: ACL_REVISION_DS, found: ACL_REVISION })
        );
        assert!(leaf.is_empty());
    }

    #[test]
    fn test_remove_clears_bits() {
        let mut acl = Acl::new(true, false);
        acl.add(allow(SID_WORLD, 0x7)).unwrap();

        assert!(acl.remove(&allow(SID_WORLD, 0x1)));
        assert_eq!(acl.aces()[0].access_mask, 0x6);

        assert!(!acl.remove(&allow(SID_WORLD, 0x8)));
        assert!(!acl.remove(&deny(SID_WORLD, 0x6)));

        assert!(acl.remove(&allow(SID_WORLD, 0x6)));
        assert!(acl.is_empty());
    }

    #[test]
    fn test_remove_specific_needs_exact_mask() {
        let mut acl = Acl::new(true, false);
        acl.add(allow(SID_WORLD, 0x3)).unwrap();
        assert!(!acl.remove_specific(&allow(SID_WORLD, 0x1)));
        assert!(acl.remove_specific(&allow(SID_WORLD, 0x3)));
        assert!(acl.is_empty());
    }

    #[test]
    fn test_set_and_remove_all() {
        let mut acl = Acl::new(true, false);
        acl.add(allow(SID_WORLD, 0x1)).unwrap();
        let mut inheritable = allow(SID_WORLD, 0x2);
        inheritable.flags = AceFlags::OBJECT_INHERIT;
        acl.add(inheritable).unwrap();
        acl.add(deny(SID_WORLD, 0x4)).unwrap();
        assert_eq!(acl.len(), 3);

        acl.set(allow(SID_WORLD, 0x8)).unwrap();
        assert_eq!(acl.len(), 2);
        assert_eq!(acl.aces()[1].access_mask, 0x8);

        assert_eq!(acl.remove_all(AceQualifier::AccessDenied, &SID_WORLD), 1);
        assert_eq!(acl.remove_all(AceQualifier::AccessDenied, &SID_WORLD), 0);
    }

    #[test]
    fn test_set_keeps_slot() {
        let mut acl = Acl::new(true, false);
        acl.add(allow(SID_WORLD, 0x1)).unwrap();
        acl.add(allow(SID_BUILTIN_USERS, 0x2)).unwrap();
        acl.add(allow(SID_LOCAL_SYSTEM, 0x8)).unwrap();

        acl.set(allow(SID_BUILTIN_USERS, 0x4)).unwrap();
        let order: Vec<(Sid, u32)> = acl.aces().iter().map(|a| (a.sid, a.access_mask)).collect();
        assert_eq!(order, [(SID_WORLD, 0x1), (SID_BUILTIN_USERS, 0x4), (SID_LOCAL_SYSTEM, 0x8)]);

        acl.set(deny(SID_WORLD, 0x10)).unwrap();
        assert_eq!(acl.aces()[0].qualifier, AceQualifier::AccessDenied);
        assert_eq!(acl.len(), 4);
    }

    #[test]
    fn test_primitives_skip_callback_and_inherited() {
        let callback = allow(SID_WORLD, 0x1).with_callback_data(alloc::vec![0xAA; 4]);
        let mut inherited = allow(SID_WORLD, 0x1);
        inherited.flags = AceFlags::INHERITED;
        let mut acl = Acl::from_parts(ACL_REVISION, true, false, alloc::vec![callback, inherited]).unwrap();

        assert_eq!(acl.purge(&SID_WORLD), 0);
        assert!(!acl.remove(&allow(SID_WORLD, 0x1)));
        acl.add(allow(SID_WORLD, 0x1)).unwrap();
        assert_eq!(acl.len(), 3);
    }

    #[test]
    fn test_rebuild_with_revision() {
        let mut acl = Acl::new(true, false);
        acl.add(deny(SID_LOCAL_SYSTEM, 0x2)).unwrap();
        acl.add(allow(SID_WORLD, 0x1)).unwrap();

        let upgraded = acl.rebuild_with_revision(&BinaryAclCodec, ACL_REVISION_DS).unwrap();
        assert_eq!(upgraded.revision(), ACL_REVISION_DS);
        assert_eq!(upgraded.aces(), acl.aces());
        assert_eq!(acl.revision(), ACL_REVISION);
    }

    #[test]
    fn test_inheritance_protection_helpers() {
        let mut inherited = allow(SID_WORLD, 0x1);
        inherited.flags = AceFlags::INHERITED;
        let mut acl = Acl::from_parts(ACL_REVISION, true, false, alloc::vec![inherited.clone()]).unwrap();
        acl.make_inherited_explicit();
        assert!(!acl.aces()[0].is_inherited());

        let mut acl = Acl::from_parts(ACL_REVISION, true, false, alloc::vec![inherited]).unwrap();
        assert_eq!(acl.remove_inherited(), 1);
    }
}
