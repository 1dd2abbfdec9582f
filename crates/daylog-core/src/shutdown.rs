//! Process-lifetime shutdown coordination.
//!
//! Loggers register their writers with a [`ShutdownCoordinator`] and
//! deregister them when they close. A coordinator shuts down once: every
//! writer still registered is flushed and closed.
//!
//! Every coordinator is also shut down by a process exit hook, installed once
//! per process, so loggers that are never dropped (held in a `static`, for
//! instance) still reach disk when `main` returns or `exit` is called.
//!
//! Interrupt handling is a single process-wide listener thread. Coordinators
//! enlist with it; on Ctrl-C it shuts down every enlisted coordinator and
//! then exits the process with [`INTERRUPT_EXIT_CODE`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Once, OnceLock, Weak};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::console::report_failure;
use crate::error::LogResult;
use crate::writer::AppendWriter;

/// Exit status used after an interrupt (128 + SIGINT).
pub const INTERRUPT_EXIT_CODE: i32 = 130;

static GLOBAL: OnceLock<Arc<ShutdownCoordinator>> = OnceLock::new();
static LISTENER: Once = Once::new();
static EXIT_HOOK: Once = Once::new();
static ENLISTED: Mutex<Vec<Weak<ShutdownCoordinator>>> = Mutex::new(Vec::new());
static LIVE: Mutex<Vec<Weak<ShutdownCoordinator>>> = Mutex::new(Vec::new());

/// Handle returned by [`ShutdownCoordinator::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(u64);

/// Registry of live writers that are closed together at shutdown.
///
/// Created through [`new`](Self::new) or [`global`](Self::global), which also
/// hook it into process exit.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    writers: Mutex<HashMap<WriterId, Weak<AppendWriter>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
    enlisted: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Arc<Self> {
        let coordinator = Arc::new(Self {
            writers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
            enlisted: AtomicBool::new(false),
        });
        push_live(&mut LIVE.lock(), &coordinator);
        EXIT_HOOK.call_once(install_exit_hook);
        coordinator
    }

    /// The coordinator loggers use unless given another one.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(Self::new))
    }

    /// Track `writer` until it is deregistered or shutdown runs.
    ///
    /// Only a weak reference is kept. After shutdown the writer is closed
    /// right away instead.
    pub fn register(&self, writer: &Arc<AppendWriter>) -> WriterId {
        let id = WriterId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut writers = self.writers.lock();
        if self.shut_down.load(Ordering::Acquire) {
            drop(writers);
            debug!(path = %writer.path().display(), "registered after shutdown, closing");
            close_writer(writer);
            return id;
        }
        writers.insert(id, Arc::downgrade(writer));
        id
    }

    pub fn deregister(&self, id: WriterId) {
        self.writers.lock().remove(&id);
    }

    /// Number of registered writers that are still open.
    pub fn live_writers(&self) -> usize {
        self.writers
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .filter(|w| !w.is_closed())
            .count()
    }

    pub fn has_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Close every registered writer, blocking until each is flushed.
    ///
    /// Runs once; returns how many writers it closed (0 on later calls).
    pub fn shutdown(&self) -> usize {
        let writers: Vec<_> = {
            let mut writers = self.writers.lock();
            if self.shut_down.swap(true, Ordering::AcqRel) {
                return 0;
            }
            writers.drain().map(|(_, writer)| writer).collect()
        };

        let mut closed = 0;
        for writer in writers.iter().filter_map(Weak::upgrade) {
            if !writer.is_closed() {
                close_writer(&writer);
                closed += 1;
            }
        }

        debug!(closed, "log writers shut down");
        closed
    }

    /// Have the process-wide interrupt listener shut this coordinator down
    /// on Ctrl-C. The listener is started on first use.
    pub fn enlist_for_interrupt(self: &Arc<Self>) {
        if self.enlisted.swap(true, Ordering::AcqRel) {
            return;
        }
        push_live(&mut ENLISTED.lock(), self);
        LISTENER.call_once(start_listener);
    }

    /// Wait for Ctrl-C on the caller's tokio runtime, then shut down.
    pub async fn wait_for_interrupt(&self) -> LogResult<usize> {
        tokio::signal::ctrl_c().await?;
        Ok(self.shutdown())
    }
}

/// Add `coordinator` to `list`, dropping entries whose coordinator is gone.
fn push_live(list: &mut Vec<Weak<ShutdownCoordinator>>, coordinator: &Arc<ShutdownCoordinator>) {
    list.retain(|w| w.strong_count() > 0);
    list.push(Arc::downgrade(coordinator));
}

/// Shut down every coordinator in `list`, emptying it.
fn shutdown_all(list: &Mutex<Vec<Weak<ShutdownCoordinator>>>) -> usize {
    let coordinators: Vec<_> = list.lock().drain(..).filter_map(|w| w.upgrade()).collect();
    coordinators.iter().map(|coordinator| coordinator.shutdown()).sum()
}

#[cfg(unix)]
fn install_exit_hook() {
    extern "C" fn on_exit() {
        let closed = shutdown_all(&LIVE);
        debug!(closed, "process exiting, log writers shut down");
    }

    // SAFETY: `on_exit` is a plain function that lives as long as the process
    if unsafe { nix::libc::atexit(on_exit) } != 0 {
        warn!("cannot register exit hook, records still queued at exit may be lost");
    }
}

// No exit hook: loggers are closed on drop or by an explicit `shutdown()`.
#[cfg(not(unix))]
fn install_exit_hook() {}

fn close_writer(writer: &AppendWriter) {
    if let Err(e) = writer.close() {
        error!(path = %writer.path().display(), error = %e, "failed to close log writer");
        report_failure("failed to close log writer", writer.path(), &e);
    }
}

fn start_listener() {
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    let spawned = thread::Builder::new()
        .name("daylog-interrupt".into())
        .spawn(move || listen(ready_tx));
    if let Err(e) = spawned {
        warn!(error = %e, "cannot start interrupt listener");
        return;
    }

    // Wait until the signal handler is installed. An error means the
    // listener gave up and already reported why.
    let _ = ready_rx.recv();
}

fn listen(ready: mpsc::SyncSender<()>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(error = %e, "cannot start interrupt listener runtime");
            return;
        }
    };

    let result = runtime.block_on(async move {
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        // The first poll installs the OS handler
        tokio::select! {
            biased;
            result = &mut interrupted => return result,
            _ = async {} => {}
        }
        let _ = ready.send(());

        interrupted.await
    });

    if let Err(e) = result {
        warn!(error = %e, "interrupt listener failed");
        return;
    }

    let closed = shutdown_all(&ENLISTED);
    debug!(closed, "interrupted, exiting");

    std::process::exit(INTERRUPT_EXIT_CODE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer(temp: &TempDir, name: &str) -> Arc<AppendWriter> {
        Arc::new(AppendWriter::open(temp.path().join(name)).unwrap())
    }

    #[test]
    fn test_shutdown_closes_registered_writers() {
        let temp = TempDir::new().unwrap();
        let coordinator = ShutdownCoordinator::new();

        let a = writer(&temp, "a.csv");
        let b = writer(&temp, "b.csv");
        coordinator.register(&a);
        coordinator.register(&b);
        a.write("pending\n").unwrap();

        assert_eq!(coordinator.live_writers(), 2);
        assert_eq!(coordinator.shutdown(), 2);

        assert!(a.is_closed());
        assert!(b.is_closed());
        assert_eq!(std::fs::read_to_string(a.path()).unwrap(), "pending\n");
        assert_eq!(coordinator.live_writers(), 0);
    }

    #[test]
    fn test_shutdown_runs_once() {
        let temp = TempDir::new().unwrap();
        let coordinator = ShutdownCoordinator::new();
        let a = writer(&temp, "a.csv");
        coordinator.register(&a);

        assert_eq!(coordinator.shutdown(), 1);
        assert!(coordinator.has_shut_down());
        assert_eq!(coordinator.shutdown(), 0);
    }

    #[test]
    fn test_deregistered_writers_are_left_alone() {
        let temp = TempDir::new().unwrap();
        let coordinator = ShutdownCoordinator::new();

        let a = writer(&temp, "a.csv");
        let id = coordinator.register(&a);
        coordinator.deregister(id);

        assert_eq!(coordinator.shutdown(), 0);
        assert!(!a.is_closed());
    }

    #[test]
    fn test_dropped_writers_are_not_counted() {
        let temp = TempDir::new().unwrap();
        let coordinator = ShutdownCoordinator::new();

        let a = writer(&temp, "a.csv");
        coordinator.register(&a);
        drop(a);

        assert_eq!(coordinator.live_writers(), 0);
        assert_eq!(coordinator.shutdown(), 0);
    }

    #[test]
    fn test_register_after_shutdown_closes_immediately() {
        let temp = TempDir::new().unwrap();
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown();

        let late = writer(&temp, "late.csv");
        coordinator.register(&late);

        assert!(late.is_closed());
        assert_eq!(coordinator.live_writers(), 0);
    }

    #[test]
    fn test_global_is_shared() {
        let a = ShutdownCoordinator::global();
        let b = ShutdownCoordinator::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_enlist_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.enlist_for_interrupt();
        coordinator.enlist_for_interrupt();

        let enlisted = ENLISTED
            .lock()
            .iter()
            .filter(|w| w.as_ptr() == Arc::as_ptr(&coordinator))
            .count();
        assert_eq!(enlisted, 1);
    }

    #[test]
    fn test_push_live_drops_dead_entries() {
        let mut list = Vec::new();

        let gone = ShutdownCoordinator::new();
        push_live(&mut list, &gone);
        drop(gone);

        let kept = ShutdownCoordinator::new();
        push_live(&mut list, &kept);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].as_ptr(), Arc::as_ptr(&kept));
    }

    #[test]
    fn test_coordinators_are_tracked_for_exit() {
        let coordinator = ShutdownCoordinator::new();
        let tracked = LIVE
            .lock()
            .iter()
            .any(|w| w.as_ptr() == Arc::as_ptr(&coordinator));
        assert!(tracked);
        assert!(EXIT_HOOK.is_completed());
    }

    #[test]
    fn test_shutdown_all_empties_list() {
        let temp = TempDir::new().unwrap();
        let coordinator = ShutdownCoordinator::new();
        let a = writer(&temp, "a.csv");
        coordinator.register(&a);

        let list = Mutex::new(Vec::new());
        push_live(&mut list.lock(), &coordinator);

        assert_eq!(shutdown_all(&list), 1);
        assert!(a.is_closed());
        assert!(list.lock().is_empty());
    }
}
