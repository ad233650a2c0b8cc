//! Server-process supervision for the shell.
//!
//! [`ServerProcess`] owns the `forcectl-server` child.  It is killed and
//! reaped when the handle is dropped, so leaving the shell by any route
//! (`exit`, `/quit`, EOF, Ctrl-C, an error or a panic) never leaves an
//! orphaned listener on the command port.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use tracing::{debug, info, warn};

pub struct ServerProcess {
    program: PathBuf,
    child: Option<Child>,
}

impl ServerProcess {
    /// Start `program` with `args`.  The child inherits stderr so its logs
    /// remain visible; stdin is detached from the shell's terminal.
    pub fn spawn<I, S>(program: impl AsRef<Path>, args: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref().to_path_buf();
        let child = Command::new(&program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;
        info!(program = %program.display(), pid = child.id(), "Server process started");
        Ok(Self {
            program,
            child: Some(child),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `true` while the child has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | None => false,
            Some(Err(e)) => {
                warn!(error = %e, "Could not poll server process");
                false
            }
        }
    }

    /// Terminate the child if it is still running and wait for it.
    ///
    /// Returns the exit status, or `None` if the handle was already released.
    pub fn shutdown(mut self) -> io::Result<Option<ExitStatus>> {
        self.terminate()
    }

    fn terminate(&mut self) -> io::Result<Option<ExitStatus>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        if let Some(status) = child.try_wait()? {
            debug!(%status, "Server process already exited");
            return Ok(Some(status));
        }
        match child.kill() {
            Ok(()) => {}
            // Exited between try_wait and kill.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e),
        }
        let status = child.wait()?;
        info!(%status, "Server process stopped");
        Ok(Some(status))
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!(program = %self.program.display(), error = %e, "Failed to stop server process");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn spawn_of_missing_program_fails() {
        let err = ServerProcess::spawn("/nonexistent/forcectl-server", std::iter::empty::<&str>())
            .err()
            .expect("spawn must fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn shutdown_kills_a_running_child() {
        let mut server = ServerProcess::spawn("sleep", ["30"]).expect("spawn sleep");
        assert!(server.is_running());
        assert!(server.id().is_some());

        let started = Instant::now();
        let status = server.shutdown().expect("shutdown").expect("status");
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn shutdown_reports_status_of_exited_child() {
        let mut server =
            ServerProcess::spawn("true", std::iter::empty::<&str>()).expect("spawn true");
        let deadline = Instant::now() + Duration::from_secs(5);
        while server.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        let status = server.shutdown().expect("shutdown").expect("status");
        assert!(status.success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn drop_reaps_the_child() {
        let server = ServerProcess::spawn("sleep", ["30"]).expect("spawn sleep");
        let pid = server.id().expect("pid");
        let proc_entry = PathBuf::from(format!("/proc/{pid}"));
        assert!(proc_entry.exists());

        drop(server);
        assert!(!proc_entry.exists(), "child {pid} survived the handle");
    }
}
