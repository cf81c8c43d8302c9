//! Optional journald forwarding via systemd-cat.
//!
//! Best-effort: a missing or failing `systemd-cat` never fails a reconciliation.

use std::io::Write;
use std::process::{Command, Stdio};

/// Forward a single audit line to journald under `tag`.
pub fn forward_line(tag: &str, line: &str) {
    let mut child = match Command::new("systemd-cat")
        .arg("-t")
        .arg(tag)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "systemd-cat unavailable; journald forwarding skipped");
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(line.as_bytes()).and_then(|_| stdin.write_all(b"\n")) {
            tracing::warn!(error = %e, "failed to forward audit entry to journald");
        }
    }

    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "systemd-cat did not exit cleanly");
    }
}
