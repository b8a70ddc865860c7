//! Runtime Library (rtl)
//!
//! Small value types shared by the security subsystem:
//!
//! - **GUID**: 128-bit identifiers naming object types and property sets in
//!   object-typed ACEs

pub mod uuid;

pub use uuid::Guid;
