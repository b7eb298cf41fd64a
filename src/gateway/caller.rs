// Sealbox — Peer Identity Resolution
//
// Resolves the caller identity of a process connecting over the Unix
// domain socket from its SO_PEERCRED credentials. The uid is what the
// identity derives from; pid and executable path are captured for log
// lines only and carry no authority.

use std::fmt;
use std::path::PathBuf;

use crate::store::Identity;

/// Credentials of the process on the other end of the socket.
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    pub uid: u32,
    pub pid: Option<u32>,
    exe_path: Option<PathBuf>,
}

impl PeerIdentity {
    /// Build peer info from socket credentials. On Linux the peer's
    /// executable path is resolved via `/proc/<pid>/exe` when readable.
    pub fn new(uid: u32, pid: Option<u32>) -> Self {
        let exe_path =
            pid.and_then(|p| std::fs::read_link(format!("/proc/{}/exe", p)).ok());
        Self { uid, pid, exe_path }
    }

    /// The identity that gates store operations. Uses the same derivation
    /// the CLI applies to the invoking user, so one user is one principal
    /// on both surfaces.
    pub fn identity(&self) -> Identity {
        Identity::from_uid(self.uid)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.uid)?;
        if let Some(pid) = self.pid {
            write!(f, " pid:{}", pid)?;
        }
        if let Some(ref exe) = self.exe_path {
            write!(f, " exe:{}", exe.display())?;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
