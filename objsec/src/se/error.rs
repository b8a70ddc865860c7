//! Security Error Types
//!
//! Every fallible operation in the security subsystem returns
//! [`SecurityError`]. Each variant maps onto the NTSTATUS code the NT
//! security routines report for the same condition.

use alloc::string::String;
use thiserror::Error;

/// NTSTATUS codes reported by [`SecurityError::status`]
pub mod status {
    pub const STATUS_UNSUCCESSFUL: u32 = 0xC0000001;
    pub const STATUS_NOT_IMPLEMENTED: u32 = 0xC0000002;
    pub const STATUS_INVALID_PARAMETER: u32 = 0xC000000D;
    pub const STATUS_ACCESS_DENIED: u32 = 0xC0000022;
    pub const STATUS_REVISION_MISMATCH: u32 = 0xC0000059;
    pub const STATUS_NONE_MAPPED: u32 = 0xC0000073;
    pub const STATUS_INVALID_ACL: u32 = 0xC0000077;
    pub const STATUS_INVALID_SID: u32 = 0xC0000078;
    pub const STATUS_INVALID_SECURITY_DESCR: u32 = 0xC0000079;
}

/// Security subsystem errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// A rule, flag combination or identity kind was rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A raw enumeration value is outside its defined set
    #[error("{what} value {value} is out of range")]
    OutOfRange { what: &'static str, value: i64 },

    /// RemoveAll was invoked but no entry was removed
    #[error("removal of the matching entries failed")]
    RemoveFailed,

    /// The securable object type did not supply this operation
    #[error("{0} is not implemented by this object type")]
    NotImplemented(&'static str),

    /// The identity translation service could not map an identity
    #[error("identity {0} could not be translated")]
    IdentityNotMapped(String),

    /// Malformed or oversized ACL
    #[error("invalid ACL: {0}")]
    InvalidAcl(&'static str),

    /// Malformed SID
    #[error("invalid SID")]
    InvalidSid,

    /// Malformed security descriptor
    #[error("invalid security descriptor: {0}")]
    InvalidSecurityDescriptor(&'static str),

    /// Object-typed entries need a directory-service revision ACL
    #[error("ACL revision {found} is below the required revision {required}")]
    RevisionTooLow { required: u8, found: u8 },
}

impl SecurityError {
    /// NTSTATUS code for this error
    pub fn status(&self) -> u32 {
        match self {
            Self::InvalidArgument(_) | Self::OutOfRange { .. } => status::STATUS_INVALID_PARAMETER,
            Self::RemoveFailed => status::STATUS_UNSUCCESSFUL,
            Self::NotImplemented(_) => status::STATUS_NOT_IMPLEMENTED,
            Self::IdentityNotMapped(_) => status::STATUS_NONE_MAPPED,
            Self::InvalidAcl(_) => status::STATUS_INVALID_ACL,
            Self::InvalidSid => status::STATUS_INVALID_SID,
            Self::InvalidSecurityDescriptor(_) => status::STATUS_INVALID_SECURITY_DESCR,
            Self::RevisionTooLow { .. } => status::STATUS_REVISION_MISMATCH,
        }
    }
}

/// Result alias for security operations
pub type Result<T> = core::result::Result<T, SecurityError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SecurityError::RemoveFailed.status(), status::STATUS_UNSUCCESSFUL);
        assert_eq!(
            SecurityError::OutOfRange { what: "modification", value: 9 }.status(),
            status::STATUS_INVALID_PARAMETER
        );
        assert_eq!(
            SecurityError::RevisionTooLow { required: 4, found: 2 }.status(),
            status::STATUS_REVISION_MISMATCH
        );
    }

    #[test]
    fn test_display() {
        let err = SecurityError::IdentityNotMapped("CONTOSO\\nobody".to_string());
        assert_eq!(err.to_string(), "identity CONTOSO\\nobody could not be translated");
    }
}
