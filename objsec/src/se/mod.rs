//! Security (se)
//!
//! Rule bookkeeping for securable objects:
//!
//! - **Security Identifiers (SIDs)**: User/group identification
//! - **Identities**: SIDs or account names, and translation between them
//! - **Access Control Entries/Lists**: The stored permission and audit lists
//! - **Security Descriptors**: Owner, group, DACL and SACL of one object
//! - **Rules**: Caller-facing projections of ACEs
//! - **Object Security**: Rule queries and modifications under a lock
//!
//! # Security Descriptor
//!
//! Each object can have:
//! - Owner SID
//! - Group SID
//! - DACL (Discretionary ACL) - who can access
//! - SACL (System ACL) - auditing
//!
//! Both lists start out absent and are created by the first modification
//! that needs them.

pub mod error;
pub mod sid;
pub mod identity;
pub mod rule;
pub mod ace;
pub mod acl;
pub mod codec;
pub mod descriptor;
pub mod object;
pub mod directory;

// Re-export error types
pub use error::{status, Result, SecurityError};

// Re-export SID types
pub use sid::{
    Sid,
    SID_MAX_SUB_AUTHORITIES,
    SID_REVISION,
    identifier_authority,
    well_known_rids,
    // Well-known SIDs
    SID_NULL,
    SID_WORLD,
    SID_CREATOR_OWNER,
    SID_LOCAL_SYSTEM,
    SID_LOCAL_SERVICE,
    SID_NETWORK_SERVICE,
    SID_AUTHENTICATED_USERS,
    SID_BUILTIN_ADMINISTRATORS,
    SID_BUILTIN_USERS,
};

// Re-export identity types
pub use identity::{
    AccountTable,
    IdentityKind,
    IdentityReference,
    IdentityTranslator,
    NtAccount,
    resolve_sid,
};

// Re-export rule types
pub use rule::{
    AccessControlModification,
    AccessControlType,
    AccessRule,
    AuditFlags,
    AuditRule,
    InheritanceFlags,
    Modification,
    PropagationFlags,
    RuleFactory,
};

// Re-export ACE/ACL types
pub use ace::{Ace, AceFlags, AceQualifier, AceType, ObjectAceFlags};
pub use acl::{
    Acl,
    ACL_REVISION,
    ACL_REVISION_DS,
    MAX_ACL_SIZE,
};
pub use codec::{AclCodec, BinaryAclCodec};

// Re-export descriptor types
pub use descriptor::{
    SdControl,
    SecurityDescriptor,
    SecurityOptions,
    SECURITY_DESCRIPTOR_REVISION,
};

// Re-export object security
pub use object::ObjectSecurity;
pub use directory::{
    DirectoryRules,
    DirectorySecurity,
    FileSystemAccessRule,
    FileSystemAuditRule,
    FileSystemRights,
    DIRECTORY_OPTIONS,
};
