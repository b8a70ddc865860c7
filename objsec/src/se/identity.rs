//! Identity References and Translation
//!
//! Rules name their principal either by SID or by account name
//! (`DOMAIN\user`). ACEs only ever hold SIDs; account names are produced on
//! the way out of a query and resolved on the way into a modification, both
//! through an [`IdentityTranslator`].
//!
//! [`AccountTable`] is a self-contained translator in the spirit of the LSA
//! lookup tables: a list of SID/account pairs, pre-seeded with the
//! well-known principals.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;
use spin::RwLock;

use super::error::{Result, SecurityError};
use super::sid::{
    Sid,
    SID_AUTHENTICATED_USERS,
    SID_BUILTIN_ADMINISTRATORS,
    SID_BUILTIN_USERS,
    SID_CREATOR_OWNER,
    SID_LOCAL_SERVICE,
    SID_LOCAL_SYSTEM,
    SID_NETWORK_SERVICE,
    SID_WORLD,
};

/// Account name, optionally qualified by a domain
#[derive(Debug, Clone, Eq)]
pub struct NtAccount {
    pub domain: Option<String>,
    pub name: String,
}

impl NtAccount {
    pub fn new(domain: Option<&str>, name: &str) -> Self {
        Self {
            domain: domain.map(String::from),
            name: String::from(name),
        }
    }
}

impl PartialEq for NtAccount {
    /// Account names compare case-insensitively
    fn eq(&self, other: &Self) -> bool {
        let domains_match = match (&self.domain, &other.domain) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        domains_match && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl fmt::Display for NtAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "{}\\{}", domain, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for NtAccount {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self> {
        let account = match s.split_once('\\') {
            Some((domain, name)) => NtAccount::new(Some(domain), name),
            None => NtAccount::new(None, s),
        };
        if account.name.is_empty() || account.name.contains('\\') {
            return Err(SecurityError::InvalidArgument("malformed account name"));
        }
        Ok(account)
    }
}

/// The two identity representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// Raw security identifier
    Sid,
    /// Friendly account name
    NtAccount,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sid => write!(f, "SecurityIdentifier"),
            Self::NtAccount => write!(f, "NTAccount"),
        }
    }
}

impl FromStr for IdentityKind {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("SecurityIdentifier") || s.eq_ignore_ascii_case("Sid") {
            Ok(Self::Sid)
        } else if s.eq_ignore_ascii_case("NTAccount") {
            Ok(Self::NtAccount)
        } else {
            Err(SecurityError::InvalidArgument("target identity kind must be SecurityIdentifier or NTAccount"))
        }
    }
}

/// Identity named by SID or account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityReference {
    Sid(Sid),
    Account(NtAccount),
}

impl IdentityReference {
    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::Sid(_) => IdentityKind::Sid,
            Self::Account(_) => IdentityKind::NtAccount,
        }
    }

    pub fn as_sid(&self) -> Option<&Sid> {
        match self {
            Self::Sid(sid) => Some(sid),
            Self::Account(_) => None,
        }
    }

    /// Translate into `target` using `translator`
    pub fn translate(&self, target: IdentityKind, translator: &dyn IdentityTranslator) -> Result<Self> {
        if self.kind() == target {
            return Ok(self.clone());
        }
        translator.translate(self, target)
    }
}

impl From<Sid> for IdentityReference {
    fn from(sid: Sid) -> Self {
        Self::Sid(sid)
    }
}

impl From<NtAccount> for IdentityReference {
    fn from(account: NtAccount) -> Self {
        Self::Account(account)
    }
}

impl fmt::Display for IdentityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sid(sid) => write!(f, "{}", sid),
            Self::Account(account) => write!(f, "{}", account),
        }
    }
}

/// Identity translation service
///
/// Implementations must be order-preserving and one-to-one for batches.
pub trait IdentityTranslator: Send + Sync {
    fn translate(&self, identity: &IdentityReference, target: IdentityKind) -> Result<IdentityReference>;

    fn translate_batch(&self, identities: &[IdentityReference], target: IdentityKind) -> Result<Vec<IdentityReference>> {
        identities
            .iter()
            .map(|identity| {
                if identity.kind() == target {
                    Ok(identity.clone())
                } else {
                    self.translate(identity, target)
                }
            })
            .collect()
    }
}

/// One SID/account pairing
#[derive(Debug, Clone)]
struct AccountEntry {
    sid: Sid,
    account: NtAccount,
}

/// In-memory SID/account table
pub struct AccountTable {
    entries: RwLock<Vec<AccountEntry>>,
}

impl AccountTable {
    /// Empty table
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }

    /// Table seeded with the well-known principals
    pub fn with_well_known() -> Self {
        let table = Self::new();
        table.register(SID_WORLD, NtAccount::new(None, "Everyone"));
        table.register(SID_CREATOR_OWNER, NtAccount::new(None, "CREATOR OWNER"));
        table.register(SID_LOCAL_SYSTEM, NtAccount::new(Some("NT AUTHORITY"), "SYSTEM"));
        table.register(SID_LOCAL_SERVICE, NtAccount::new(Some("NT AUTHORITY"), "LOCAL SERVICE"));
        table.register(SID_NETWORK_SERVICE, NtAccount::new(Some("NT AUTHORITY"), "NETWORK SERVICE"));
        table.register(SID_AUTHENTICATED_USERS, NtAccount::new(Some("NT AUTHORITY"), "Authenticated Users"));
        table.register(SID_BUILTIN_ADMINISTRATORS, NtAccount::new(Some("BUILTIN"), "Administrators"));
        table.register(SID_BUILTIN_USERS, NtAccount::new(Some("BUILTIN"), "Users"));
        table
    }

    /// Add or replace the account for a SID
    pub fn register(&self, sid: Sid, account: NtAccount) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.sid == sid) {
            Some(entry) => entry.account = account,
            None => entries.push(AccountEntry { sid, account }),
        }
    }

    pub fn lookup_sid(&self, sid: &Sid) -> Option<NtAccount> {
        let entries = self.entries.read();
        entries.iter().find(|e| e.sid == *sid).map(|e| e.account.clone())
    }

    /// Unqualified names match any domain
    pub fn lookup_account(&self, account: &NtAccount) -> Option<Sid> {
        let entries = self.entries.read();
        entries
            .iter()
            .find(|e| match account.domain {
                Some(_) => e.account == *account,
                None => e.account.name.eq_ignore_ascii_case(&account.name),
            })
            .map(|e| e.sid)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityTranslator for AccountTable {
    fn translate(&self, identity: &IdentityReference, target: IdentityKind) -> Result<IdentityReference> {
        let translated = match (identity, target) {
            (IdentityReference::Sid(_), IdentityKind::Sid) |
            (IdentityReference::Account(_), IdentityKind::NtAccount) => Some(identity.clone()),
            (IdentityReference::Sid(sid), IdentityKind::NtAccount) => {
                self.lookup_sid(sid).map(IdentityReference::Account)
            }
            (IdentityReference::Account(account), IdentityKind::Sid) => {
                self.lookup_account(account).map(IdentityReference::Sid)
            }
        };

        translated.ok_or_else(|| SecurityError::IdentityNotMapped(identity.to_string()))
    }
}

/// Resolve any identity to the SID stored in ACEs
pub fn resolve_sid(identity: &IdentityReference, translator: &dyn IdentityTranslator) -> Result<Sid> {
    match identity.translate(IdentityKind::Sid, translator)? {
        IdentityReference::Sid(sid) => Ok(sid),
        IdentityReference::Account(account) => Err(SecurityError::IdentityNotMapped(format!(
            "{} (translator returned an account)",
            account
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_account_parse_and_display() {
        let account: NtAccount = "BUILTIN\\Administrators".parse().unwrap();
        assert_eq!(account.domain.as_deref(), Some("BUILTIN"));
        assert_eq!(account.to_string(), "BUILTIN\\Administrators");
        assert_eq!(account, NtAccount::new(Some("builtin"), "ADMINISTRATORS"));
        assert!("a\\b\\c".parse::<NtAccount>().is_err());
        assert!("DOMAIN\\".parse::<NtAccount>().is_err());
    }

    #[test]
    fn test_identity_kind_names() {
        assert_eq!("NTAccount".parse::<IdentityKind>(), Ok(IdentityKind::NtAccount));
        assert_eq!("SecurityIdentifier".parse::<IdentityKind>(), Ok(IdentityKind::Sid));
        assert!(matches!("Principal".parse::<IdentityKind>(), Err(SecurityError::InvalidArgument(_))));
    }

    #[test]
    fn test_table_translation() {
        let table = AccountTable::with_well_known();
        let system = IdentityReference::Sid(SID_LOCAL_SYSTEM);

        let named = system.translate(IdentityKind::NtAccount, &table).unwrap();
        assert_eq!(named.to_string(), "NT AUTHORITY\\SYSTEM");

        let back = resolve_sid(&named, &table).unwrap();
        assert_eq!(back, SID_LOCAL_SYSTEM);

        let bare = IdentityReference::Account(NtAccount::new(None, "administrators"));
        assert_eq!(resolve_sid(&bare, &table), Ok(SID_BUILTIN_ADMINISTRATORS));
    }

    #[test]
    fn test_unmapped_identity() {
        let table = AccountTable::new();
        let unknown: Sid = "S-1-5-21-1-2-3-1001".parse().unwrap();
        let err = IdentityReference::Sid(unknown)
            .translate(IdentityKind::NtAccount, &table)
            .unwrap_err();
        assert_eq!(err, SecurityError::IdentityNotMapped("S-1-5-21-1-2-3-1001".to_string()));
    }

    #[test]
    fn test_batch_preserves_order() {
        let table = AccountTable::with_well_known();
        let batch = vec![
            IdentityReference::Sid(SID_BUILTIN_USERS),
            IdentityReference::Sid(SID_WORLD),
        ];
        let names = table.translate_batch(&batch, IdentityKind::NtAccount).unwrap();
        assert_eq!(names[0].to_string(), "BUILTIN\\Users");
        assert_eq!(names[1].to_string(), "Everyone");
    }

    #[test]
    fn test_register_replaces() {
        let table = AccountTable::new();
        let sid: Sid = "S-1-5-21-7-7-7-500".parse().unwrap();
        table.register(sid, NtAccount::new(Some("LAB"), "admin"));
        table.register(sid, NtAccount::new(Some("LAB"), "Administrator"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup_sid(&sid).unwrap().name, "Administrator");
    }
}
