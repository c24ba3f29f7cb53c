// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message door.
//!
//! The door serializes concurrent callers into arrival order over a tokio
//! channel; the kernel behind it stays single-threaded. Closing the last
//! door handle ends the session and hands the kernel back to the host, with
//! its replay set and telemetry intact. In-flight invokes at close are
//! dropped by channel closure, never answered ambiently.

use crate::{InvokeMsg, InvokeOutcome, Kernel};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Channel capacity of the door.
const DOOR_CAPACITY: usize = 64;

struct DoorRequest {
    msg: InvokeMsg,
    reply: oneshot::Sender<InvokeOutcome>,
}

/// A cloneable handle to a kernel session. The only I/O path into the
/// kernel; there is no synchronous back door.
#[derive(Clone)]
pub struct KernelDoor {
    tx: mpsc::Sender<DoorRequest>,
}

impl std::fmt::Debug for KernelDoor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelDoor").finish_non_exhaustive()
    }
}

impl KernelDoor {
    /// Spawn a kernel session. Returns the door and the join handle that
    /// yields the kernel back once every door handle is dropped.
    #[must_use]
    pub fn spawn(mut kernel: Kernel) -> (Self, JoinHandle<Kernel>) {
        let (tx, mut rx) = mpsc::channel::<DoorRequest>(DOOR_CAPACITY);
        let task = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let outcome = kernel.invoke(&request.msg);
                // A caller that went away mid-flight is dropped, not retried.
                let _ = request.reply.send(outcome);
            }
            kernel
        });
        (Self { tx }, task)
    }

    /// Send one invocation and await the verdict.
    ///
    /// Returns `None` when the session is closed (cancellation).
    pub async fn invoke(&self, msg: InvokeMsg) -> Option<InvokeOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(DoorRequest {
                msg,
                reply: reply_tx,
            })
            .await
            .ok()?;
        reply_rx.await.ok()
    }
}
