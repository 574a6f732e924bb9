//! Live process name lookup
use sysinfo::{Pid, PidExt, ProcessExt, ProcessStatus, System, SystemExt};

use crate::error::ResolveFailure;
use crate::sources::traits::ProcessResolver;

/// Resolves pids against the system process table.
pub struct SysinfoResolver {
    system: System,
}

impl SysinfoResolver {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessResolver for SysinfoResolver {
    fn refresh(&mut self) {
        self.system.refresh_processes();
    }

    fn lookup(&self, pid: Option<u32>) -> Result<String, ResolveFailure> {
        let pid = pid.ok_or(ResolveFailure::NoPid)?;
        let process = self
            .system
            .process(Pid::from_u32(pid))
            .ok_or(ResolveFailure::Exited)?;

        if matches!(process.status(), ProcessStatus::Zombie) {
            return Err(ResolveFailure::Zombie);
        }

        let name = process.name();
        if name.is_empty() {
            // The table lists the pid but its name could not be read.
            return Err(ResolveFailure::AccessDenied);
        }
        Ok(name.to_string())
    }
}
