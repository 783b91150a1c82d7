//! Waiting for the engine's control socket to appear.
//!
//! The socket file is the only externally observable readiness signal of
//! the engine. Creation is observed through filesystem notifications on the
//! parent directory.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::context::CallContext;
use crate::error::{Error, Result};

// ============================================================================
// wait_for_socket
// ============================================================================

/// Completes once `path` exists.
///
/// Returns immediately if it already does. The watch is dropped on every
/// exit path.
///
/// # Errors
///
/// - [`Error::Cancelled`] if `cx` ends first
/// - [`Error::SocketWaitFailed`] if the watch cannot be set up or the
///   notification subsystem reports an error
pub(crate) async fn wait_for_socket(cx: &CallContext, path: &Path) -> Result<()> {
    if path.exists() {
        trace!(path = %path.display(), "Socket already present");
        return Ok(());
    }
    if cx.is_done() {
        return Err(Error::cancelled("wait for socket"));
    }

    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::socket_wait_failed(path, "path has no file name"))?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = event_tx.send(res);
    })
    .map_err(|e| Error::socket_wait_failed(path, e.to_string()))?;

    watcher
        .watch(parent, RecursiveMode::NonRecursive)
        .map_err(|e| Error::socket_wait_failed(path, e.to_string()))?;

    debug!(path = %path.display(), "Waiting for socket creation");

    // Created between the first check and the watch
    if path.exists() {
        return Ok(());
    }

    loop {
        tokio::select! {
            () = cx.done() => return Err(Error::cancelled("wait for socket")),

            event = event_rx.recv() => match event {
                Some(Ok(event)) => {
                    let creates_target = is_creation(&event.kind)
                        && event
                            .paths
                            .iter()
                            .any(|candidate| candidate.file_name() == Some(file_name));

                    if creates_target && path.exists() {
                        debug!(path = %path.display(), "Socket created");
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(Error::socket_wait_failed(path, e.to_string())),
                None => {
                    return Err(Error::socket_wait_failed(
                        path,
                        "notification channel closed",
                    ));
                }
            },
        }
    }
}

/// Returns `true` for events that can bring a new directory entry into
/// existence.
fn is_creation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any
    )
}

// ============================================================================
// Tests
// ============================================================================
