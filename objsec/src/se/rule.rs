//! Access and Audit Rules
//!
//! A rule is the caller-facing projection of one ACE: an identity, a rights
//! mask, inheritance settings and either an allow/deny decision (access
//! rules) or a success/failure selection (audit rules). Rules are transient
//! values. The engine produces them fresh on every query through the
//! object type's [`RuleFactory`] and consumes them on every modification.

use core::fmt;

use super::error::{Result, SecurityError};
use super::identity::IdentityReference;
use crate::rtl::Guid;

bitflags::bitflags! {
    /// How an entry is inherited by child objects
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InheritanceFlags: u32 {
        /// Inherited by child containers
        const CONTAINER_INHERIT = 0x1;
        /// Inherited by child leaf objects
        const OBJECT_INHERIT = 0x2;
    }
}

bitflags::bitflags! {
    /// How inheritance propagates below the immediate children
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropagationFlags: u32 {
        /// Inherited entries lose their inheritance flags on the child
        const NO_PROPAGATE_INHERIT = 0x1;
        /// Entry applies to children only, not to the object itself
        const INHERIT_ONLY = 0x2;
    }
}

bitflags::bitflags! {
    /// Which access outcomes an audit rule logs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AuditFlags: u32 {
        const SUCCESS = 0x1;
        const FAILURE = 0x2;
    }
}

/// Allow or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AccessControlType {
    Allow = 0,
    Deny = 1,
}

impl AccessControlType {
    /// The other polarity
    pub fn opposite(self) -> Self {
        match self {
            Self::Allow => Self::Deny,
            Self::Deny => Self::Allow,
        }
    }
}

impl TryFrom<i32> for AccessControlType {
    type Error = SecurityError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Allow),
            1 => Ok(Self::Deny),
            _ => Err(SecurityError::InvalidArgument("unrecognized access control type")),
        }
    }
}

/// The six modification verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AccessControlModification {
    /// Merge the rule into the list
    Add = 0,
    /// Replace every entry of the same kind for the identity
    Set = 1,
    /// Clear conflicting entries for the identity, then Set
    Reset = 2,
    /// Remove the rule's rights from matching entries
    Remove = 3,
    /// Remove every entry of the same kind for the identity
    RemoveAll = 4,
    /// Remove entries matching the rule exactly
    RemoveSpecific = 5,
}

impl AccessControlModification {
    /// Verbs that only ever take entries away
    pub fn is_removal(self) -> bool {
        matches!(self, Self::Remove | Self::RemoveAll | Self::RemoveSpecific)
    }

    /// Verbs that may insert new entries
    pub fn is_additive(self) -> bool {
        !self.is_removal()
    }
}

impl TryFrom<i32> for AccessControlModification {
    type Error = SecurityError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Add),
            1 => Ok(Self::Set),
            2 => Ok(Self::Reset),
            3 => Ok(Self::Remove),
            4 => Ok(Self::RemoveAll),
            5 => Ok(Self::RemoveSpecific),
            _ => Err(SecurityError::OutOfRange {
                what: "access control modification",
                value: value as i64,
            }),
        }
    }
}

/// Outcome of a modification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modification {
    /// False only when Remove found nothing to remove
    pub succeeded: bool,
    /// Whether the underlying list changed
    pub modified: bool,
}

impl Modification {
    pub const fn unchanged() -> Self {
        Self { succeeded: true, modified: false }
    }
}

/// Access rule (allow or deny)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub identity: IdentityReference,
    pub access_mask: u32,
    pub is_inherited: bool,
    pub inheritance_flags: InheritanceFlags,
    pub propagation_flags: PropagationFlags,
    pub access_control_type: AccessControlType,
    /// Object class or property set the rule is scoped to
    pub object_type: Option<Guid>,
    /// Child object class that inherits the rule
    pub inherited_object_type: Option<Guid>,
}

impl AccessRule {
    /// Explicit, non-object-typed rule
    pub fn new(
        identity: impl Into<IdentityReference>,
        access_mask: u32,
        inheritance_flags: InheritanceFlags,
        propagation_flags: PropagationFlags,
        access_control_type: AccessControlType,
    ) -> Self {
        Self {
            identity: identity.into(),
            access_mask,
            is_inherited: false,
            inheritance_flags,
            propagation_flags,
            access_control_type,
            object_type: None,
            inherited_object_type: None,
        }
    }

    /// Scope the rule to object types
    pub fn with_object_types(mut self, object_type: Option<Guid>, inherited_object_type: Option<Guid>) -> Self {
        self.object_type = object_type;
        self.inherited_object_type = inherited_object_type;
        self
    }

    /// Whether storing this rule needs an object-typed ACE
    pub fn is_object(&self) -> bool {
        self.object_type.is_some() || self.inherited_object_type.is_some()
    }
}

/// Audit rule (success and/or failure)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRule {
    pub identity: IdentityReference,
    pub access_mask: u32,
    pub is_inherited: bool,
    pub inheritance_flags: InheritanceFlags,
    pub propagation_flags: PropagationFlags,
    pub audit_flags: AuditFlags,
    pub object_type: Option<Guid>,
    pub inherited_object_type: Option<Guid>,
}

impl AuditRule {
    /// Explicit, non-object-typed rule
    pub fn new(
        identity: impl Into<IdentityReference>,
        access_mask: u32,
        inheritance_flags: InheritanceFlags,
        propagation_flags: PropagationFlags,
        audit_flags: AuditFlags,
    ) -> Self {
        Self {
            identity: identity.into(),
            access_mask,
            is_inherited: false,
            inheritance_flags,
            propagation_flags,
            audit_flags,
            object_type: None,
            inherited_object_type: None,
        }
    }

    /// Scope the rule to object types
    pub fn with_object_types(mut self, object_type: Option<Guid>, inherited_object_type: Option<Guid>) -> Self {
        self.object_type = object_type;
        self.inherited_object_type = inherited_object_type;
        self
    }

    /// Whether storing this rule needs an object-typed ACE
    pub fn is_object(&self) -> bool {
        self.object_type.is_some() || self.inherited_object_type.is_some()
    }
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} {:#010x}", self.access_control_type, self.identity, self.access_mask)
    }
}

/// Per-object-type rule construction
///
/// The query engine hands every surfaced entry to one of these factories.
/// Object kinds that have no object-typed rules leave the object factories
/// at their defaults, which fail with [`SecurityError::NotImplemented`].
pub trait RuleFactory {
    /// Concrete access rule type of this object kind
    type AccessRule;
    /// Concrete audit rule type of this object kind
    type AuditRule;

    fn access_rule_factory(&self, rule: AccessRule) -> Result<Self::AccessRule> {
        let _ = rule;
        Err(SecurityError::NotImplemented("access rule factory"))
    }

    fn object_access_rule_factory(&self, rule: AccessRule) -> Result<Self::AccessRule> {
        let _ = rule;
        Err(SecurityError::NotImplemented("object access rule factory"))
    }

    fn audit_rule_factory(&self, rule: AuditRule) -> Result<Self::AuditRule> {
        let _ = rule;
        Err(SecurityError::NotImplemented("audit rule factory"))
    }

    fn object_audit_rule_factory(&self, rule: AuditRule) -> Result<Self::AuditRule> {
        let _ = rule;
        Err(SecurityError::NotImplemented("object audit rule factory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::se::sid::SID_WORLD;

    struct Bare;

    impl RuleFactory for Bare {
        type AccessRule = AccessRule;
        type AuditRule = AuditRule;
    }

    #[test]
    fn test_raw_values() {
        assert_eq!(AccessControlModification::try_from(4), Ok(AccessControlModification::RemoveAll));
        assert_eq!(
            AccessControlModification::try_from(6),
            Err(SecurityError::OutOfRange { what: "access control modification", value: 6 })
        );
        assert_eq!(AccessControlType::try_from(1), Ok(AccessControlType::Deny));
        assert!(matches!(AccessControlType::try_from(2), Err(SecurityError::InvalidArgument(_))));
    }

    #[test]
    fn test_verb_classes() {
        assert!(AccessControlModification::Reset.is_additive());
        assert!(AccessControlModification::RemoveSpecific.is_removal());
        assert!(!AccessControlModification::Set.is_removal());
    }

    #[test]
    fn test_default_factories_fail() {
        let rule = AccessRule::new(
            SID_WORLD,
            0x1,
            InheritanceFlags::empty(),
            PropagationFlags::empty(),
            AccessControlType::Allow,
        );
        assert_eq!(
            Bare.access_rule_factory(rule.clone()),
            Err(SecurityError::NotImplemented("access rule factory"))
        );
        assert!(Bare.object_access_rule_factory(rule).is_err());
    }

    #[test]
    fn test_object_scope() {
        let rule = AuditRule::new(
            SID_WORLD,
            0x1,
            InheritanceFlags::empty(),
            PropagationFlags::empty(),
            AuditFlags::FAILURE,
        );
        assert!(!rule.is_object());
        assert!(rule.with_object_types(None, Some(Guid::new(1, 2, 3, [0; 8]))).is_object());
    }
}
