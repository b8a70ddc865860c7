//! Object Security
//!
//! [`ObjectSecurity`] owns one object's security descriptor and exposes it
//! as rules:
//!
//! - Queries walk the DACL or SACL twice under a read lock. The first walk
//!   filters entries and batches their SIDs for translation, the second
//!   builds rules through the object's [`RuleFactory`] in list order.
//! - Modifications run under the write lock against a working copy of the
//!   list. The copy replaces the stored list only when the verb succeeds
//!   and something actually changed, so a failed verb leaves no trace.
//!
//! The `access_rules_modified` / `audit_rules_modified` flags are sticky:
//! once a modification changes a list they stay set for the life of the
//! object.

use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use spin::RwLock;

use super::ace::{Ace, AceFlags, AceQualifier};
use super::acl::{Acl, ACL_REVISION_DS};
use super::codec::{AclCodec, BinaryAclCodec};
use super::descriptor::{SecurityDescriptor, SecurityOptions};
use super::error::{Result, SecurityError};
use super::identity::{resolve_sid, AccountTable, IdentityKind, IdentityReference, IdentityTranslator};
use super::rule::{
    AccessControlModification,
    AccessControlType,
    AccessRule,
    AuditFlags,
    AuditRule,
    Modification,
    RuleFactory,
};
use super::sid::Sid;

/// Which of the two lists an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AclKind {
    Discretionary,
    System,
}

impl AclKind {
    /// Qualifiers surfaced as rules from this list
    fn surfaces(self, qualifier: AceQualifier) -> bool {
        match self {
            Self::Discretionary => {
                matches!(qualifier, AceQualifier::AccessAllowed | AceQualifier::AccessDenied)
            }
            Self::System => qualifier == AceQualifier::SystemAudit,
        }
    }
}

impl fmt::Display for AclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discretionary => write!(f, "DACL"),
            Self::System => write!(f, "SACL"),
        }
    }
}

/// Everything guarded by the object lock
#[derive(Debug)]
struct ObjectState {
    descriptor: SecurityDescriptor,
    access_rules_modified: bool,
    audit_rules_modified: bool,
}

impl ObjectState {
    fn acl(&self, kind: AclKind) -> Option<&Acl> {
        match kind {
            AclKind::Discretionary => self.descriptor.dacl(),
            AclKind::System => self.descriptor.sacl(),
        }
    }

    fn mark_modified(&mut self, kind: AclKind) {
        match kind {
            AclKind::Discretionary => self.access_rules_modified = true,
            AclKind::System => self.audit_rules_modified = true,
        }
    }

    fn install(&mut self, kind: AclKind, acl: Acl) {
        match kind {
            AclKind::Discretionary => self.descriptor.set_dacl(Some(acl)),
            AclKind::System => self.descriptor.set_sacl(Some(acl)),
        }
        self.mark_modified(kind);
    }

    fn is_protected(&self, kind: AclKind) -> bool {
        match kind {
            AclKind::Discretionary => self.descriptor.is_dacl_protected(),
            AclKind::System => self.descriptor.is_sacl_protected(),
        }
    }
}

fn access_qualifier(access_control_type: AccessControlType) -> AceQualifier {
    match access_control_type {
        AccessControlType::Allow => AceQualifier::AccessAllowed,
        AccessControlType::Deny => AceQualifier::AccessDenied,
    }
}

/// RemoveAll must remove something once it reaches an existing list
fn remove_all_or_fail(acl: &mut Acl, qualifier: AceQualifier, sid: &Sid) -> Result<bool> {
    if acl.remove_all(qualifier, sid) == 0 {
        log::warn!("[SE] RemoveAll found no {:?} entries for {}", qualifier, sid);
        return Err(SecurityError::RemoveFailed);
    }
    Ok(true)
}

/// Security state of one securable object
pub struct ObjectSecurity<F: RuleFactory> {
    factory: F,
    translator: Arc<dyn IdentityTranslator>,
    codec: Arc<dyn AclCodec>,
    state: RwLock<ObjectState>,
}

impl<F: RuleFactory> ObjectSecurity<F> {
    /// Empty descriptor with the built-in account table and binary codec
    pub fn new(factory: F, options: SecurityOptions) -> Self {
        Self::with_collaborators(
            factory,
            options,
            Arc::new(AccountTable::with_well_known()),
            Arc::new(BinaryAclCodec),
        )
    }

    /// Empty descriptor with caller-supplied translation and codec services
    pub fn with_collaborators(
        factory: F,
        options: SecurityOptions,
        translator: Arc<dyn IdentityTranslator>,
        codec: Arc<dyn AclCodec>,
    ) -> Self {
        Self {
            factory,
            translator,
            codec,
            state: RwLock::new(ObjectState {
                descriptor: SecurityDescriptor::new(options),
                access_rules_modified: false,
                audit_rules_modified: false,
            }),
        }
    }

    /// Object initialized from a self-relative descriptor
    pub fn from_binary_form(factory: F, options: SecurityOptions, bytes: &[u8]) -> Result<Self> {
        let object = Self::new(factory, options);
        object.set_binary_form(bytes)?;
        Ok(object)
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn options(&self) -> SecurityOptions {
        self.state.read().descriptor.options()
    }

    pub fn access_rules_modified(&self) -> bool {
        self.state.read().access_rules_modified
    }

    pub fn audit_rules_modified(&self) -> bool {
        self.state.read().audit_rules_modified
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Access rules in DACL order
    pub fn get_access_rules(
        &self,
        include_explicit: bool,
        include_inherited: bool,
        target: IdentityKind,
    ) -> Result<Vec<F::AccessRule>> {
        self.query(AclKind::Discretionary, include_explicit, include_inherited, target, |ace, identity| {
            let rule = AccessRule {
                identity,
                access_mask: ace.access_mask,
                is_inherited: ace.is_inherited(),
                inheritance_flags: ace.flags.inheritance_flags(),
                propagation_flags: ace.flags.propagation_flags(),
                access_control_type: match ace.qualifier {
                    AceQualifier::AccessDenied => AccessControlType::Deny,
                    _ => AccessControlType::Allow,
                },
                object_type: ace.object_type,
                inherited_object_type: ace.inherited_object_type,
            };
            if ace.is_object() {
                self.factory.object_access_rule_factory(rule)
            } else {
                self.factory.access_rule_factory(rule)
            }
        })
    }

    /// Audit rules in SACL order
    pub fn get_audit_rules(
        &self,
        include_explicit: bool,
        include_inherited: bool,
        target: IdentityKind,
    ) -> Result<Vec<F::AuditRule>> {
        self.query(AclKind::System, include_explicit, include_inherited, target, |ace, identity| {
            let rule = AuditRule {
                identity,
                access_mask: ace.access_mask,
                is_inherited: ace.is_inherited(),
                inheritance_flags: ace.flags.inheritance_flags(),
                propagation_flags: ace.flags.propagation_flags(),
                audit_flags: ace.flags.audit_flags(),
                object_type: ace.object_type,
                inherited_object_type: ace.inherited_object_type,
            };
            if ace.is_object() {
                self.factory.object_audit_rule_factory(rule)
            } else {
                self.factory.audit_rule_factory(rule)
            }
        })
    }

    fn query<R>(
        &self,
        kind: AclKind,
        include_explicit: bool,
        include_inherited: bool,
        target: IdentityKind,
        build: impl Fn(&Ace, IdentityReference) -> Result<R>,
    ) -> Result<Vec<R>> {
        let state = self.state.read();
        let acl = match state.acl(kind) {
            Some(acl) => acl,
            None => return Ok(Vec::new()),
        };

        // Pass 1: filter and translate identities in one batch
        let entries: Vec<&Ace> = acl
            .aces()
            .iter()
            .filter(|ace| !ace.is_callback && kind.surfaces(ace.qualifier))
            .collect();
        let raw: Vec<IdentityReference> = entries.iter().map(|ace| IdentityReference::Sid(ace.sid)).collect();

        let identities = if target == IdentityKind::Sid {
            raw
        } else {
            let translated = self.translator.translate_batch(&raw, target)?;
            if translated.len() != raw.len() {
                return Err(SecurityError::IdentityNotMapped(format!(
                    "batch of {} identities came back with {}",
                    raw.len(),
                    translated.len()
                )));
            }
            translated
        };

        // Pass 2: project in list order
        let mut rules = Vec::new();
        for (ace, identity) in entries.into_iter().zip(identities) {
            let wanted = if ace.is_inherited() { include_inherited } else { include_explicit };
            if wanted {
                rules.push(build(ace, identity)?);
            }
        }

        log::trace!("[SE] {} query returned {} of {} entries", kind, rules.len(), acl.len());
        Ok(rules)
    }

    // ========================================================================
    // Modifications
    // ========================================================================

    /// Apply a modification verb to the DACL
    pub fn modify_access(&self, verb: AccessControlModification, rule: &AccessRule) -> Result<Modification> {
        let qualifier = access_qualifier(rule.access_control_type);
        let opposite = access_qualifier(rule.access_control_type.opposite());
        let flags = AceFlags::from_rule_flags(rule.inheritance_flags, rule.propagation_flags, AuditFlags::empty());

        self.modify_acl(AclKind::Discretionary, verb, &rule.identity, rule.is_object(), |acl, sid| {
            let ace = Ace::new(qualifier, sid, rule.access_mask, flags)
                .with_object_types(rule.object_type, rule.inherited_object_type);

            match verb {
                AccessControlModification::Add => acl.add(ace).map(|()| true),
                AccessControlModification::Set => acl.set(ace).map(|()| true),
                AccessControlModification::Reset => {
                    acl.remove_all(opposite, &sid);
                    acl.set(ace).map(|()| true)
                }
                AccessControlModification::Remove => Ok(acl.remove(&ace)),
                AccessControlModification::RemoveAll => remove_all_or_fail(acl, qualifier, &sid),
                AccessControlModification::RemoveSpecific => {
                    acl.remove_specific(&ace);
                    Ok(true)
                }
            }
        })
    }

    /// Apply a modification verb to the SACL
    pub fn modify_audit(&self, verb: AccessControlModification, rule: &AuditRule) -> Result<Modification> {
        let qualifier = AceQualifier::SystemAudit;
        let flags = AceFlags::from_rule_flags(rule.inheritance_flags, rule.propagation_flags, rule.audit_flags);

        self.modify_acl(AclKind::System, verb, &rule.identity, rule.is_object(), |acl, sid| {
            let ace = Ace::new(qualifier, sid, rule.access_mask, flags)
                .with_object_types(rule.object_type, rule.inherited_object_type);

            match verb {
                AccessControlModification::Add => acl.add(ace).map(|()| true),
                AccessControlModification::Set | AccessControlModification::Reset => {
                    acl.set(ace).map(|()| true)
                }
                AccessControlModification::Remove => Ok(acl.remove(&ace)),
                AccessControlModification::RemoveAll => remove_all_or_fail(acl, qualifier, &sid),
                AccessControlModification::RemoveSpecific => {
                    acl.remove_specific(&ace);
                    Ok(true)
                }
            }
        })
    }

    fn modify_acl(
        &self,
        kind: AclKind,
        verb: AccessControlModification,
        identity: &IdentityReference,
        is_object: bool,
        apply: impl FnOnce(&mut Acl, Sid) -> Result<bool>,
    ) -> Result<Modification> {
        let mut state = self.state.write();

        let mut working = match state.acl(kind) {
            Some(acl) => acl.clone(),
            None if verb.is_removal() => return Ok(Modification::unchanged()),
            None => {
                log::debug!("[SE] Creating {} for first {:?}", kind, verb);
                state.descriptor.new_acl()
            }
        };

        if verb.is_additive() && is_object && working.revision() < ACL_REVISION_DS {
            working = working.rebuild_with_revision(&*self.codec, ACL_REVISION_DS)?;
        }

        let sid = resolve_sid(identity, &*self.translator)?;
        let succeeded = apply(&mut working, sid)?;

        let modified = state.acl(kind) != Some(&working);
        if modified {
            state.install(kind, working);
        }

        log::debug!(
            "[SE] {:?} {} rule for {}: succeeded={}, modified={}",
            verb,
            kind,
            sid,
            succeeded,
            modified
        );

        Ok(Modification { succeeded, modified })
    }

    /// Remove every explicit DACL entry for the identity
    pub fn purge_access_rules(&self, identity: &IdentityReference) -> Result<()> {
        self.purge(AclKind::Discretionary, identity)
    }

    /// Remove every explicit SACL entry for the identity
    pub fn purge_audit_rules(&self, identity: &IdentityReference) -> Result<()> {
        self.purge(AclKind::System, identity)
    }

    fn purge(&self, kind: AclKind, identity: &IdentityReference) -> Result<()> {
        let sid = resolve_sid(identity, &*self.translator)?;
        let mut state = self.state.write();

        if let Some(mut working) = state.acl(kind).cloned() {
            let removed = working.purge(&sid);
            if removed > 0 {
                log::debug!("[SE] Purged {} {} entries for {}", removed, kind, sid);
                state.install(kind, working);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Inheritance protection
    // ========================================================================

    /// Block or restore DACL inheritance from the parent
    ///
    /// When protecting, inherited entries are either kept as explicit entries
    /// (`preserve_inheritance`) or dropped.
    pub fn set_access_rule_protection(&self, is_protected: bool, preserve_inheritance: bool) {
        self.set_protection(AclKind::Discretionary, is_protected, preserve_inheritance);
    }

    /// Block or restore SACL inheritance from the parent
    pub fn set_audit_rule_protection(&self, is_protected: bool, preserve_inheritance: bool) {
        self.set_protection(AclKind::System, is_protected, preserve_inheritance);
    }

    fn set_protection(&self, kind: AclKind, is_protected: bool, preserve_inheritance: bool) {
        let mut state = self.state.write();

        if is_protected {
            if let Some(mut working) = state.acl(kind).cloned() {
                if preserve_inheritance {
                    working.make_inherited_explicit();
                } else {
                    working.remove_inherited();
                }
                if state.acl(kind) != Some(&working) {
                    state.install(kind, working);
                }
            }
        }

        if state.is_protected(kind) != is_protected {
            match kind {
                AclKind::Discretionary => state.descriptor.set_dacl_protected(is_protected),
                AclKind::System => state.descriptor.set_sacl_protected(is_protected),
            }
            state.mark_modified(kind);
        }
    }

    pub fn are_access_rules_protected(&self) -> bool {
        self.state.read().is_protected(AclKind::Discretionary)
    }

    pub fn are_audit_rules_protected(&self) -> bool {
        self.state.read().is_protected(AclKind::System)
    }

    /// Absent lists count as canonical
    pub fn are_access_rules_canonical(&self) -> bool {
        self.state.read().acl(AclKind::Discretionary).map_or(true, Acl::is_canonical)
    }

    pub fn are_audit_rules_canonical(&self) -> bool {
        self.state.read().acl(AclKind::System).map_or(true, Acl::is_canonical)
    }

    // ========================================================================
    // Owner and group
    // ========================================================================

    pub fn owner(&self, target: IdentityKind) -> Result<Option<IdentityReference>> {
        let owner = self.state.read().descriptor.owner().copied();
        owner
            .map(|sid| IdentityReference::Sid(sid).translate(target, &*self.translator))
            .transpose()
    }

    pub fn set_owner(&self, identity: &IdentityReference) -> Result<()> {
        let sid = resolve_sid(identity, &*self.translator)?;
        self.state.write().descriptor.set_owner(Some(sid));
        Ok(())
    }

    pub fn group(&self, target: IdentityKind) -> Result<Option<IdentityReference>> {
        let group = self.state.read().descriptor.group().copied();
        group
            .map(|sid| IdentityReference::Sid(sid).translate(target, &*self.translator))
            .transpose()
    }

    pub fn set_group(&self, identity: &IdentityReference) -> Result<()> {
        let sid = resolve_sid(identity, &*self.translator)?;
        self.state.write().descriptor.set_group(Some(sid));
        Ok(())
    }

    // ========================================================================
    // Binary form
    // ========================================================================

    /// Self-relative descriptor bytes
    pub fn binary_form(&self) -> Result<Vec<u8>> {
        self.state.read().descriptor.to_self_relative(&*self.codec)
    }

    /// Replace the whole descriptor from self-relative bytes
    pub fn set_binary_form(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        let options = state.descriptor.options();
        state.descriptor = SecurityDescriptor::from_self_relative(bytes, options, &*self.codec)?;
        state.access_rules_modified = true;
        state.audit_rules_modified = true;
        Ok(())
    }
}

impl<F: RuleFactory> fmt::Debug for ObjectSecurity<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ObjectSecurity")
            .field("descriptor", &state.descriptor)
            .field("access_rules_modified", &state.access_rules_modified)
            .field("audit_rules_modified", &state.audit_rules_modified)
            .finish()
    }
}
