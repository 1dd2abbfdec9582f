//! Append-only file writer.
//!
//! Each writer owns one file opened in append mode and one background
//! thread that performs the actual I/O. Callers enqueue whole payloads over
//! a channel, so a `write` returns immediately and payloads from concurrent
//! callers land in the file contiguously, in the order they were queued.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::console::report_failure;
use crate::error::{LogError, LogResult};

enum Command {
    Write(Vec<u8>),
    Flush(mpsc::SyncSender<io::Result<()>>),
}

/// Writer that appends byte payloads to a single file.
///
/// Once [`close`](Self::close) has run, `write` and `flush` fail with
/// [`LogError::WriterClosed`] and the file is left untouched.
pub struct AppendWriter {
    /// Path to the target file
    path: PathBuf,

    /// Queue into the writer thread; `None` once closed
    sender: Mutex<Option<Sender<Command>>>,

    /// Writer thread, joined on close
    worker: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl AppendWriter {
    /// Open `path` for append, creating the file if needed.
    ///
    /// The parent directory must already exist.
    pub fn open(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogError::OpenFile {
                path: path.clone(),
                source,
            })?;

        let (sender, receiver) = mpsc::channel();
        let thread_path = path.clone();
        let worker = thread::Builder::new()
            .name("daylog-writer".into())
            .spawn(move || run_worker(BufWriter::new(file), receiver, &thread_path))
            .map_err(|_| LogError::WriterThread { path: path.clone() })?;

        debug!(path = %path.display(), "opened log writer");

        Ok(Self {
            path,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Get the path to the target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Queue `bytes` for appending.
    ///
    /// Returns as soon as the payload is queued. I/O errors hit later by the
    /// writer thread are reported through `tracing` and stderr, not here.
    pub fn write(&self, bytes: impl Into<Vec<u8>>) -> LogResult<()> {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or_else(|| self.closed())?;
        sender
            .send(Command::Write(bytes.into()))
            .map_err(|_| LogError::WriterThread {
                path: self.path.clone(),
            })
    }

    /// Block until every payload queued so far is written and flushed.
    pub fn flush(&self) -> LogResult<()> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        {
            let sender = self.sender.lock();
            let sender = sender.as_ref().ok_or_else(|| self.closed())?;
            sender
                .send(Command::Flush(ack_tx))
                .map_err(|_| LogError::WriterThread {
                    path: self.path.clone(),
                })?;
        }

        match ack_rx.recv() {
            Ok(result) => result.map_err(LogError::Io),
            Err(_) => Err(LogError::WriterThread {
                path: self.path.clone(),
            }),
        }
    }

    /// Flush everything queued and release the file.
    ///
    /// Safe to call more than once; only the first call does any work.
    pub fn close(&self) -> LogResult<()> {
        // Held across the join so a concurrent close waits for the flush
        let mut worker = self.worker.lock();

        // Dropping the sender ends the worker loop once the queue is drained
        drop(self.sender.lock().take());

        let Some(worker) = worker.take() else {
            return Ok(());
        };

        match worker.join() {
            Ok(result) => {
                debug!(path = %self.path.display(), "closed log writer");
                result.map_err(LogError::Io)
            }
            Err(_) => Err(LogError::WriterThread {
                path: self.path.clone(),
            }),
        }
    }

    fn closed(&self) -> LogError {
        LogError::WriterClosed {
            path: self.path.clone(),
        }
    }
}

impl Drop for AppendWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(path = %self.path.display(), error = %e, "failed to close log writer");
            report_failure("failed to close log writer", &self.path, &e);
        }
    }
}

impl std::fmt::Debug for AppendWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendWriter")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn run_worker(mut out: BufWriter<File>, receiver: Receiver<Command>, path: &Path) -> io::Result<()> {
    while let Ok(command) = receiver.recv() {
        handle(&mut out, command, path);

        // Drain whatever else is queued, then flush once for the batch
        while let Ok(command) = receiver.try_recv() {
            handle(&mut out, command, path);
        }
        if let Err(e) = out.flush() {
            error!(path = %path.display(), error = %e, "failed to flush log file");
            report_failure("failed to flush log file", path, &e);
        }
    }

    out.flush()
}

fn handle(out: &mut BufWriter<File>, command: Command, path: &Path) {
    match command {
        Command::Write(bytes) => {
            if let Err(e) = out.write_all(&bytes) {
                error!(path = %path.display(), error = %e, "failed to append log record");
                report_failure("failed to append log record", path, &e);
            }
        }
        Command::Flush(ack) => {
            let _ = ack.send(out.flush());
        }
    }
}
