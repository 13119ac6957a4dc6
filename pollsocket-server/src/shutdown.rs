//! Shutdown coordination
//!
//! A [`ShutdownToken`] is checked by the loop once per iteration. Cancelling
//! it from any thread also wakes a blocked readiness wait, so the loop
//! notices without waiting for the poll interval to run out.

use polling::Poller;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cloneable request to stop a running server
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    signals_installed: AtomicBool,
    waker: Mutex<Option<Arc<Poller>>>,
}

impl ShutdownToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request shutdown and wake the loop
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        if let Ok(waker) = self.inner.waker.lock() {
            if let Some(poller) = waker.as_ref() {
                let _ = poller.notify();
            }
        }
    }

    /// Clear a previous cancellation so the server can run again
    pub(crate) fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::Release);
    }

    pub(crate) fn attach(&self, poller: Arc<Poller>) {
        if let Ok(mut waker) = self.inner.waker.lock() {
            *waker = Some(poller);
        }
    }

    pub(crate) fn detach(&self) {
        if let Ok(mut waker) = self.inner.waker.lock() {
            *waker = None;
        }
    }
}

/// Cancel `token` when the process receives SIGINT or SIGTERM
///
/// Installs the handlers at most once per token; later calls return
/// `Ok(false)`. The handlers are in place before this returns, and the wait
/// runs on a dedicated thread with a single-threaded runtime.
#[cfg(feature = "signals")]
pub fn listen_for_signals(token: &ShutdownToken) -> io::Result<bool> {
    use tokio::signal::unix::{signal, SignalKind};

    if token.inner.signals_installed.swap(true, Ordering::AcqRel) {
        return Ok(false);
    }

    let install = || -> io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (mut interrupt, mut terminate) = runtime.block_on(async {
            Ok::<_, io::Error>((
                signal(SignalKind::interrupt())?,
                signal(SignalKind::terminate())?,
            ))
        })?;

        let token = token.clone();
        std::thread::Builder::new()
            .name("pollsocket-signals".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    loop {
                        let name = tokio::select! {
                            Some(()) = interrupt.recv() => "SIGINT",
                            Some(()) = terminate.recv() => "SIGTERM",
                            else => break,
                        };
                        crate::log_info!("received {}, shutting down", name);
                        token.cancel();
                    }
                });
            })?;
        Ok(())
    };

    match install() {
        Ok(()) => Ok(true),
        Err(e) => {
            token.inner.signals_installed.store(false, Ordering::Release);
            Err(e)
        }
    }
}

/// Signal handling is compiled out; shutdown relies on the token alone
#[cfg(not(feature = "signals"))]
pub fn listen_for_signals(_token: &ShutdownToken) -> io::Result<bool> {
    crate::log_debug!("signal handling disabled at compile time");
    Ok(false)
}
