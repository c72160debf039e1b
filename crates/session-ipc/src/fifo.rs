//! Named-pipe channel between the session leader and the session monitor.
//!
//! Both ends are opened with close-on-exec (std always passes `O_CLOEXEC`)
//! on the blocking pool, since opening a FIFO waits for the peer to open
//! the other end. The descriptor is then checked with `fstat` and switched
//! to non-blocking mode for registration with the reactor.

use crate::FifoError;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::{debug, trace};

/// Byte written by the leader to request shutdown. Only its presence matters.
pub const SENTINEL: u8 = b'S';

/// Permissions for a newly created FIFO (before umask)
const FIFO_MODE: u32 = 0o666;

/// Path of the leader FIFO inside a runtime directory
pub fn fifo_path(runtime_dir: &Path, name: &str) -> PathBuf {
    runtime_dir.join(name)
}

/// Create the FIFO. An existing object at `path` is not an error; its type
/// is checked when an end is opened.
pub fn create(path: &Path) -> Result<(), FifoError> {
    match mkfifo(path, Mode::from_bits_truncate(FIFO_MODE)) {
        Ok(()) => {
            debug!(path = %path.display(), "Created leader FIFO");
            Ok(())
        }
        Err(Errno::EEXIST) => {
            trace!(path = %path.display(), "Leader FIFO already exists");
            Ok(())
        }
        Err(source) => Err(FifoError::Create {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Check that an open descriptor refers to a named pipe
pub fn verify_fifo(file: &File, path: &Path) -> Result<(), FifoError> {
    let metadata = file.metadata()?;
    if metadata.file_type().is_fifo() {
        Ok(())
    } else {
        Err(FifoError::NotAFifo(path.to_path_buf()))
    }
}

fn set_nonblocking(file: &File) -> Result<(), FifoError> {
    let fd = file.as_raw_fd();
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}

/// Blocking open of one end, followed by the type check
fn open_end(path: &Path, write: bool) -> Result<File, FifoError> {
    let file = OpenOptions::new()
        .read(!write)
        .write(write)
        .open(path)
        .map_err(|source| FifoError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    verify_fifo(&file, path)?;
    set_nonblocking(&file)?;

    Ok(file)
}

async fn open_end_async(path: &Path, write: bool) -> Result<File, FifoError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || open_end(&owned, write))
        .await
        .map_err(|e| FifoError::Io(io::Error::other(e)))?
}

/// Leader side: write end of the FIFO
pub struct FifoWriter {
    fd: AsyncFd<File>,
}

impl FifoWriter {
    /// Open the write end. Waits until a reader has opened the FIFO.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, FifoError> {
        let path = path.as_ref();
        let file = open_end_async(path, true).await?;
        let fd = AsyncFd::with_interest(file, Interest::WRITABLE)?;

        debug!(path = %path.display(), "Opened leader FIFO for writing");

        Ok(Self { fd })
    }

    /// Write the sentinel byte. Never retried.
    pub fn signal_terminate(&self) -> Result<(), FifoError> {
        let mut file = self.fd.get_ref();
        match file.write(&[SENTINEL]) {
            Ok(1) => Ok(()),
            Ok(_) => Err(FifoError::ShortWrite),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve once the reader has closed its end.
    pub async fn hangup(&self) -> Result<(), FifoError> {
        loop {
            let mut guard = self.fd.writable().await?;
            if guard.ready().is_write_closed() {
                return Ok(());
            }
            guard.clear_ready();
        }
    }
}

/// What woke the monitor's FIFO watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoEvent {
    /// Data is waiting; the leader wrote the sentinel
    Readable,
    /// The leader closed its end. Reported in preference to `Readable`
    /// when both conditions hold.
    HangUp,
}

/// Monitor side: read end of the FIFO
pub struct FifoReader {
    fd: AsyncFd<File>,
}

impl FifoReader {
    /// Open the read end. Waits until a writer has opened the FIFO.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, FifoError> {
        let path = path.as_ref();
        let file = open_end_async(path, false).await?;
        let fd = AsyncFd::with_interest(file, Interest::READABLE)?;

        debug!(path = %path.display(), "Opened leader FIFO for reading");

        Ok(Self { fd })
    }

    /// Wait for the next hang-up or read-ready condition
    pub async fn next_event(&self) -> Result<FifoEvent, FifoError> {
        loop {
            let mut guard = self.fd.readable().await?;
            let ready = guard.ready();
            if ready.is_read_closed() {
                return Ok(FifoEvent::HangUp);
            }
            if ready.is_readable() {
                return Ok(FifoEvent::Readable);
            }
            guard.clear_ready();
        }
    }

    /// Consume at most one byte. Returns whether a byte was read.
    pub fn drain_sentinel(&self) -> Result<bool, FifoError> {
        let mut buf = [0u8; 1];
        let mut file = self.fd.get_ref();
        match file.read(&mut buf) {
            Ok(1) => Ok(true),
            Ok(_) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
