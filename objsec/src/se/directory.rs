//! Directory Security
//!
//! The concrete securable object for file-system directories. Rights are
//! expressed as [`FileSystemRights`], rules as [`FileSystemAccessRule`] and
//! [`FileSystemAuditRule`]. Directories are containers, so rules may carry
//! inheritance flags. They are never directory-service objects, so their
//! factories have no object-typed variant.

use core::ops::Deref;

use super::descriptor::SecurityOptions;
use super::error::Result;
use super::identity::IdentityReference;
use super::object::ObjectSecurity;
use super::rule::{
    AccessControlModification,
    AccessControlType,
    AccessRule,
    AuditFlags,
    AuditRule,
    InheritanceFlags,
    PropagationFlags,
    RuleFactory,
};

bitflags::bitflags! {
    /// File and directory access rights
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileSystemRights: u32 {
        const READ_DATA = 0x0000_0001;
        const LIST_DIRECTORY = 0x0000_0001;
        const WRITE_DATA = 0x0000_0002;
        const CREATE_FILES = 0x0000_0002;
        const APPEND_DATA = 0x0000_0004;
        const CREATE_DIRECTORIES = 0x0000_0004;
        const READ_EXTENDED_ATTRIBUTES = 0x0000_0008;
        const WRITE_EXTENDED_ATTRIBUTES = 0x0000_0010;
        const EXECUTE_FILE = 0x0000_0020;
        const TRAVERSE = 0x0000_0020;
        const DELETE_SUBDIRECTORIES_AND_FILES = 0x0000_0040;
        const READ_ATTRIBUTES = 0x0000_0080;
        const WRITE_ATTRIBUTES = 0x0000_0100;
        const DELETE = 0x0001_0000;
        const READ_PERMISSIONS = 0x0002_0000;
        const CHANGE_PERMISSIONS = 0x0004_0000;
        const TAKE_OWNERSHIP = 0x0008_0000;
        const SYNCHRONIZE = 0x0010_0000;

        const READ = Self::READ_DATA.bits()
            | Self::READ_EXTENDED_ATTRIBUTES.bits()
            | Self::READ_ATTRIBUTES.bits()
            | Self::READ_PERMISSIONS.bits();
        const WRITE = Self::WRITE_DATA.bits()
            | Self::APPEND_DATA.bits()
            | Self::WRITE_EXTENDED_ATTRIBUTES.bits()
            | Self::WRITE_ATTRIBUTES.bits();
        const READ_AND_EXECUTE = Self::READ.bits() | Self::EXECUTE_FILE.bits();
        const MODIFY = Self::WRITE.bits() | Self::READ_AND_EXECUTE.bits() | Self::DELETE.bits();
        const FULL_CONTROL = 0x001F_01FF;
    }
}

/// Access rule over file-system rights
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemAccessRule {
    rule: AccessRule,
}

impl FileSystemAccessRule {
    pub fn new(
        identity: impl Into<IdentityReference>,
        rights: FileSystemRights,
        inheritance_flags: InheritanceFlags,
        propagation_flags: PropagationFlags,
        access_control_type: AccessControlType,
    ) -> Self {
        Self {
            rule: AccessRule::new(identity, rights.bits(), inheritance_flags, propagation_flags, access_control_type),
        }
    }

    pub fn rights(&self) -> FileSystemRights {
        FileSystemRights::from_bits_retain(self.rule.access_mask)
    }
}

impl AsRef<AccessRule> for FileSystemAccessRule {
    fn as_ref(&self) -> &AccessRule {
        &self.rule
    }
}

impl Deref for FileSystemAccessRule {
    type Target = AccessRule;

    fn deref(&self) -> &AccessRule {
        &self.rule
    }
}

/// Audit rule over file-system rights
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemAuditRule {
    rule: AuditRule,
}

impl FileSystemAuditRule {
    pub fn new(
        identity: impl Into<IdentityReference>,
        rights: FileSystemRights,
        inheritance_flags: InheritanceFlags,
        propagation_flags: PropagationFlags,
        audit_flags: AuditFlags,
    ) -> Self {
        Self {
            rule: AuditRule::new(identity, rights.bits(), inheritance_flags, propagation_flags, audit_flags),
        }
    }

    pub fn rights(&self) -> FileSystemRights {
        FileSystemRights::from_bits_retain(self.rule.access_mask)
    }
}

impl AsRef<AuditRule> for FileSystemAuditRule {
    fn as_ref(&self) -> &AuditRule {
        &self.rule
    }
}

impl Deref for FileSystemAuditRule {
    type Target = AuditRule;

    fn deref(&self) -> &AuditRule {
        &self.rule
    }
}

/// Rule factories for directories
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryRules;

impl RuleFactory for DirectoryRules {
    type AccessRule = FileSystemAccessRule;
    type AuditRule = FileSystemAuditRule;

    fn access_rule_factory(&self, rule: AccessRule) -> Result<FileSystemAccessRule> {
        Ok(FileSystemAccessRule { rule })
    }

    fn audit_rule_factory(&self, rule: AuditRule) -> Result<FileSystemAuditRule> {
        Ok(FileSystemAuditRule { rule })
    }
}

/// Options every directory is created with
pub const DIRECTORY_OPTIONS: SecurityOptions = SecurityOptions::new(true, false);

/// Security state of one directory
#[derive(Debug)]
pub struct DirectorySecurity {
    inner: ObjectSecurity<DirectoryRules>,
}

impl DirectorySecurity {
    pub fn new() -> Self {
        Self { inner: ObjectSecurity::new(DirectoryRules, DIRECTORY_OPTIONS) }
    }

    pub fn from_binary_form(bytes: &[u8]) -> Result<Self> {
        Ok(Self { inner: ObjectSecurity::from_binary_form(DirectoryRules, DIRECTORY_OPTIONS, bytes)? })
    }

    pub fn add_access_rule(&self, rule: &FileSystemAccessRule) -> Result<()> {
        self.inner.modify_access(AccessControlModification::Add, rule.as_ref())?;
        Ok(())
    }

    pub fn set_access_rule(&self, rule: &FileSystemAccessRule) -> Result<()> {
        self.inner.modify_access(AccessControlModification::Set, rule.as_ref())?;
        Ok(())
    }

    pub fn reset_access_rule(&self, rule: &FileSystemAccessRule) -> Result<()> {
        self.inner.modify_access(AccessControlModification::Reset, rule.as_ref())?;
        Ok(())
    }

    /// Returns false if no entry held any of the rule's rights
    pub fn remove_access_rule(&self, rule: &FileSystemAccessRule) -> Result<bool> {
        let result = self.inner.modify_access(AccessControlModification::Remove, rule.as_ref())?;
        Ok(result.succeeded)
    }

    pub fn remove_access_rule_all(&self, rule: &FileSystemAccessRule) -> Result<()> {
        self.inner.modify_access(AccessControlModification::RemoveAll, rule.as_ref())?;
        Ok(())
    }

    pub fn remove_access_rule_specific(&self, rule: &FileSystemAccessRule) -> Result<()> {
        self.inner.modify_access(AccessControlModification::RemoveSpecific, rule.as_ref())?;
        Ok(())
    }

    pub fn add_audit_rule(&self, rule: &FileSystemAuditRule) -> Result<()> {
        self.inner.modify_audit(AccessControlModification::Add, rule.as_ref())?;
        Ok(())
    }

    pub fn set_audit_rule(&self, rule: &FileSystemAuditRule) -> Result<()> {
        self.inner.modify_audit(AccessControlModification::Set, rule.as_ref())?;
        Ok(())
    }

    pub fn reset_audit_rule(&self, rule: &FileSystemAuditRule) -> Result<()> {
        self.inner.modify_audit(AccessControlModification::Reset, rule.as_ref())?;
        Ok(())
    }

    /// Returns false if no entry held any of the rule's rights
    pub fn remove_audit_rule(&self, rule: &FileSystemAuditRule) -> Result<bool> {
        let result = self.inner.modify_audit(AccessControlModification::Remove, rule.as_ref())?;
        Ok(result.succeeded)
    }

    pub fn remove_audit_rule_all(&self, rule: &FileSystemAuditRule) -> Result<()> {
        self.inner.modify_audit(AccessControlModification::RemoveAll, rule.as_ref())?;
        Ok(())
    }

    pub fn remove_audit_rule_specific(&self, rule: &FileSystemAuditRule) -> Result<()> {
        self.inner.modify_audit(AccessControlModification::RemoveSpecific, rule.as_ref())?;
        Ok(())
    }
}

impl Deref for DirectorySecurity {
    type Target = ObjectSecurity<DirectoryRules>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use crate::rtl::Guid;
    use crate::se::error::SecurityError;
    use crate::se::identity::{IdentityKind, NtAccount};
    use crate::se::sid::{SID_AUTHENTICATED_USERS, SID_BUILTIN_ADMINISTRATORS, SID_BUILTIN_USERS};

    fn subtree() -> InheritanceFlags {
        InheritanceFlags::CONTAINER_INHERIT | InheritanceFlags::OBJECT_INHERIT
    }

    #[test]
    fn test_composite_rights() {
        assert_eq!(FileSystemRights::READ.bits(), 0x0002_0089);
        assert_eq!(FileSystemRights::WRITE.bits(), 0x0000_0116);
        assert_eq!(FileSystemRights::READ_AND_EXECUTE.bits(), 0x0002_00A9);
        assert_eq!(FileSystemRights::MODIFY.bits(), 0x0003_01BF);
        assert!(FileSystemRights::FULL_CONTROL.contains(FileSystemRights::MODIFY | FileSystemRights::SYNCHRONIZE));
    }

    #[test]
    fn test_typical_directory_acl() {
        let dir = DirectorySecurity::new();
        let admins = FileSystemAccessRule::new(
            SID_BUILTIN_ADMINISTRATORS,
            FileSystemRights::FULL_CONTROL,
            subtree(),
            PropagationFlags::empty(),
            AccessControlType::Allow,
        );
        let users = FileSystemAccessRule::new(
            SID_BUILTIN_USERS,
            FileSystemRights::READ_AND_EXECUTE,
            subtree(),
            PropagationFlags::empty(),
            AccessControlType::Allow,
        );
        dir.add_access_rule(&admins).unwrap();
        dir.add_access_rule(&users).unwrap();

        let rules = dir.get_access_rules(true, true, IdentityKind::Sid).unwrap();
        assert_eq!(rules, [admins, users.clone()]);
        assert_eq!(rules[1].rights(), FileSystemRights::READ_AND_EXECUTE);

        let names = dir.get_access_rules(true, false, IdentityKind::NtAccount).unwrap();
        assert_eq!(names[0].identity.to_string(), "BUILTIN\\Administrators");

        assert!(dir.remove_access_rule(&users).unwrap());
        assert_eq!(dir.get_access_rules(true, true, IdentityKind::Sid).unwrap().len(), 1);
    }

    #[test]
    fn test_rule_by_account_name() {
        let dir = DirectorySecurity::new();
        let rule = FileSystemAccessRule::new(
            NtAccount::new(Some("NT AUTHORITY"), "Authenticated Users"),
            FileSystemRights::MODIFY,
            InheritanceFlags::empty(),
            PropagationFlags::empty(),
            AccessControlType::Deny,
        );
        dir.set_access_rule(&rule).unwrap();

        let rules = dir.get_access_rules(true, false, IdentityKind::Sid).unwrap();
        assert_eq!(rules[0].identity, IdentityReference::Sid(SID_AUTHENTICATED_USERS));
        assert_eq!(rules[0].rights(), FileSystemRights::MODIFY);

        dir.remove_access_rule_all(&rule).unwrap();
        assert!(dir.get_access_rules(true, true, IdentityKind::Sid).unwrap().is_empty());
        assert_eq!(dir.remove_access_rule_all(&rule), Err(SecurityError::RemoveFailed));
    }

    #[test]
    fn test_audit_wrappers() {
        let dir = DirectorySecurity::new();
        let rule = FileSystemAuditRule::new(
            SID_BUILTIN_USERS,
            FileSystemRights::DELETE,
            InheritanceFlags::empty(),
            PropagationFlags::empty(),
            AuditFlags::FAILURE,
        );
        dir.add_audit_rule(&rule).unwrap();
        assert_eq!(dir.get_audit_rules(true, true, IdentityKind::Sid).unwrap(), [rule.clone()]);

        let both = FileSystemAuditRule::new(
            SID_BUILTIN_USERS,
            FileSystemRights::DELETE,
            InheritanceFlags::empty(),
            PropagationFlags::empty(),
            AuditFlags::SUCCESS | AuditFlags::FAILURE,
        );
        dir.set_audit_rule(&both).unwrap();
        dir.reset_audit_rule(&rule).unwrap();
        assert_eq!(dir.get_audit_rules(true, true, IdentityKind::Sid).unwrap(), [rule.clone()]);
        assert!(!dir.remove_audit_rule(&both).unwrap());
        assert!(dir.audit_rules_modified());

        dir.remove_audit_rule_specific(&rule).unwrap();
        assert!(dir.get_audit_rules(true, true, IdentityKind::Sid).unwrap().is_empty());
    }

    #[test]
    fn test_object_typed_entries_have_no_directory_rule() {
        let dir = DirectorySecurity::new();
        let scoped = AccessRule::new(
            SID_BUILTIN_USERS,
            FileSystemRights::READ.bits(),
            InheritanceFlags::empty(),
            PropagationFlags::empty(),
            AccessControlType::Allow,
        )
        .with_object_types(Some(Guid::new(1, 2, 3, [4; 8])), None);
        dir.modify_access(AccessControlModification::Add, &scoped).unwrap();

        assert_eq!(
            dir.get_access_rules(true, true, IdentityKind::Sid),
            Err(SecurityError::NotImplemented("object access rule factory"))
        );
    }

    #[test]
    fn test_binary_form_reload() {
        let dir = DirectorySecurity::new();
        dir.add_access_rule(&FileSystemAccessRule::new(
            SID_BUILTIN_ADMINISTRATORS,
            FileSystemRights::FULL_CONTROL,
            subtree(),
            PropagationFlags::empty(),
            AccessControlType::Allow,
        ))
        .unwrap();
        dir.set_access_rule_protection(true, false);

        let copy = DirectorySecurity::from_binary_form(&dir.binary_form().unwrap()).unwrap();
        assert!(copy.are_access_rules_protected());
        assert_eq!(
            copy.get_access_rules(true, true, IdentityKind::Sid).unwrap(),
            dir.get_access_rules(true, true, IdentityKind::Sid).unwrap()
        );
    }
}
