//! Service Control (svc)
//!
//! Detection of processes hosted by the Service Control Manager (SCM).
//!
//! A process counts as a service when either:
//! - its parent is the SCM itself (`services.exe`), or
//! - its process id is the one the SCM reports for some running service
//!
//! The process and service queries sit behind [`ServiceHost`] so the check
//! can run against the live system or a test double.

pub mod detect;

pub use detect::{is_running_as_service, ServiceHost, SCM_IMAGE_NAME};
