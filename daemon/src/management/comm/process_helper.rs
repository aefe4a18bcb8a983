use std::io;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(windows)]
use winapi::shared::minwindef::FALSE;
#[cfg(windows)]
use winapi::um::handleapi::CloseHandle;
#[cfg(windows)]
use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
#[cfg(windows)]
use winapi::um::winnt::PROCESS_TERMINATE;

/// Signals a server process by pid, outside of the `Child` that owns it.
pub struct ProcessHelper;

impl ProcessHelper {
    /// Sends SIGTERM on Unix. Windows has no such signal for console processes, so it terminates.
    pub fn stop(pid: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            Self::signal(pid, Signal::SIGTERM)
        }
        #[cfg(windows)]
        {
            Self::terminate(pid)
        }
    }

    #[cfg(unix)]
    fn signal(pid: u32, signal: Signal) -> io::Result<()> {
        if pid == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "unknown pid"));
        }
        let pid = Pid::from_raw(pid as i32);
        kill(pid, signal).map_err(io::Error::from)
    }

    #[cfg(windows)]
    fn terminate(pid: u32) -> io::Result<()> {
        let handle = unsafe { OpenProcess(PROCESS_TERMINATE, FALSE, pid) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        let result = unsafe { TerminateProcess(handle, 1) };
        unsafe { CloseHandle(handle) };
        if result == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn stop_delivers_sigterm() {
        let mut child = std::process::Command::new("/bin/sh")
            .args(["-c", "read line"])
            .stdin(std::process::Stdio::piped())
            .spawn()
            .unwrap();
        ProcessHelper::stop(child.id()).unwrap();
        assert_eq!(child.wait().unwrap().signal(), Some(Signal::SIGTERM as i32));
    }

    #[test]
    fn zero_pid_is_rejected() {
        assert!(ProcessHelper::stop(0).is_err());
    }
}
