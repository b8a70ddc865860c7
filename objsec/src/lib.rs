//! Nostalgia OS Object Security
//!
//! Rule bookkeeping for securable objects, following the NT security
//! descriptor model: a discretionary ACL (who may access the object) and a
//! system ACL (which accesses get audited), each an ordered list of ACEs.
//!
//! # Subsystems
//!
//! - **se** - Security: SIDs, ACEs, ACLs, security descriptors, and the
//!   rule query/modification engine built on top of them
//! - **rtl** - Runtime Library: GUIDs used by object-typed ACEs
//! - **svc** - Service Control: detection of service-hosted processes
//!
//! # Rule Model
//!
//! Callers never touch ACEs directly. They describe an access or audit rule
//! (identity, rights, inheritance, allow/deny or success/failure) and hand it
//! to [`se::ObjectSecurity`] together with a modification verb. Queries come
//! back as freshly built rule values produced by the object type's
//! [`se::RuleFactory`].

#![no_std]
#![allow(clippy::new_without_default)]
#![allow(clippy::manual_ignore_case_cmp)]

extern crate alloc;

pub mod rtl;
pub mod se;
pub mod svc;

pub use se::{Result, SecurityError};
