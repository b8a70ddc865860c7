//! Service process detection

use alloc::string::String;
use alloc::vec::Vec;

/// Image name of the Service Control Manager
pub const SCM_IMAGE_NAME: &str = "services.exe";

/// Process and service queries
///
/// Failing queries report an NTSTATUS code, typically
/// `STATUS_ACCESS_DENIED` for services the caller may not inspect.
pub trait ServiceHost {
    /// Services only exist on Windows-family systems
    fn is_supported_platform(&self) -> bool {
        cfg!(windows)
    }

    fn current_process_id(&self) -> u32;

    fn parent_process_id(&self) -> Result<u32, u32>;

    /// Image path or file name of a process
    fn process_image_name(&self, process_id: u32) -> Result<String, u32>;

    /// Names of all installed services
    fn service_names(&self) -> Result<Vec<String>, u32>;

    /// Process id of a running service, `None` when it is stopped
    fn service_process_id(&self, service_name: &str) -> Result<Option<u32>, u32>;
}

/// Whether an image path names the SCM
fn is_scm_image(image: &str) -> bool {
    let file_name = image.rsplit(['\\', '/']).next().unwrap_or(image);
    file_name.eq_ignore_ascii_case(SCM_IMAGE_NAME)
}

/// Whether the current process is running as a service
///
/// Query failures never abort the check. A service whose process id cannot
/// be read is skipped.
pub fn is_running_as_service(host: &dyn ServiceHost) -> bool {
    if !host.is_supported_platform() {
        return false;
    }

    match host.parent_process_id().and_then(|ppid| host.process_image_name(ppid)) {
        Ok(image) if is_scm_image(&image) => return true,
        Ok(_) => {}
        Err(status) => {
            log::debug!("[SVC] Parent process query failed: {:#010x}", status);
        }
    }

    let names = match host.service_names() {
        Ok(names) => names,
        Err(status) => {
            log::debug!("[SVC] Service enumeration failed: {:#010x}", status);
            return false;
        }
    };

    let pid = host.current_process_id();
    for name in &names {
        match host.service_process_id(name) {
            Ok(Some(service_pid)) if service_pid == pid => {
                log::debug!("[SVC] Process {} hosts service {}", pid, name);
                return true;
            }
            Ok(_) => {}
            Err(status) => {
                log::debug!("[SVC] Skipping service {}: {:#010x}", name, status);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::se::status::STATUS_ACCESS_DENIED;
    use alloc::string::ToString;

    struct FakeHost {
        supported: bool,
        pid: u32,
        parent_image: Result<String, u32>,
        services: Vec<(String, Result<Option<u32>, u32>)>,
    }

    impl FakeHost {
        fn new(pid: u32, parent_image: &str) -> Self {
            Self {
                supported: true,
                pid,
                parent_image: Ok(parent_image.to_string()),
                services: Vec::new(),
            }
        }

        fn service(mut self, name: &str, pid: Result<Option<u32>, u32>) -> Self {
            self.services.push((name.to_string(), pid));
            self
        }
    }

    impl ServiceHost for FakeHost {
        fn is_supported_platform(&self) -> bool {
            self.supported
        }

        fn current_process_id(&self) -> u32 {
            self.pid
        }

        fn parent_process_id(&self) -> Result<u32, u32> {
            Ok(4)
        }

        fn process_image_name(&self, _process_id: u32) -> Result<String, u32> {
            self.parent_image.clone()
        }

        fn service_names(&self) -> Result<Vec<String>, u32> {
            Ok(self.services.iter().map(|(name, _)| name.clone()).collect())
        }

        fn service_process_id(&self, service_name: &str) -> Result<Option<u32>, u32> {
            self.services
                .iter()
                .find(|(name, _)| name == service_name)
                .map_or(Ok(None), |(_, pid)| pid.clone())
        }
    }

    #[test]
    fn test_parent_is_scm() {
        let host = FakeHost::new(1200, "C:\\Windows\\System32\\SERVICES.EXE");
        assert!(is_running_as_service(&host));
        assert!(!is_running_as_service(&FakeHost::new(1200, "C:\\Windows\\explorer.exe")));
    }

    #[test]
    fn test_pid_matches_service() {
        let host = FakeHost::new(1200, "cmd.exe")
            .service("Spooler", Ok(Some(800)))
            .service("W32Time", Ok(None))
            .service("MyService", Ok(Some(1200)));
        assert!(is_running_as_service(&host));
    }

    #[test]
    fn test_inaccessible_services_are_skipped() {
        let host = FakeHost::new(1200, "cmd.exe")
            .service("Locked", Err(STATUS_ACCESS_DENIED))
            .service("MyService", Ok(Some(1200)));
        assert!(is_running_as_service(&host));

        let host = FakeHost::new(1200, "cmd.exe").service("Locked", Err(STATUS_ACCESS_DENIED));
        assert!(!is_running_as_service(&host));
    }

    #[test]
    fn test_parent_query_failure_falls_through() {
        let mut host = FakeHost::new(1200, "").service("MyService", Ok(Some(1200)));
        host.parent_image = Err(STATUS_ACCESS_DENIED);
        assert!(is_running_as_service(&host));
    }

    #[test]
    fn test_unsupported_platform() {
        let mut host = FakeHost::new(1200, "services.exe");
        host.supported = false;
        assert!(!is_running_as_service(&host));
    }
}
