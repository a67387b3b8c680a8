//! Named pipe (FIFO) plumbing for the inbound channel and the per-requester
//! reply channels.

use crate::domain::ports::ReplyTransport;
use async_trait::async_trait;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tokio::net::unix::pipe;

/// Creates a FIFO at `path`. An existing FIFO is reused.
pub fn create_fifo(path: &Path) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "fifo path contains NUL"))?;

    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::AlreadyExists {
        if std::fs::metadata(path)?.file_type().is_fifo() {
            return Ok(());
        }
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a FIFO", path.display()),
        ));
    }
    Err(err)
}

/// A FIFO this process created and removes again when dropped.
#[derive(Debug)]
pub struct OwnedFifo {
    path: PathBuf,
}

impl OwnedFifo {
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        create_fifo(&path)?;
        tracing::debug!("FIFO ready at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the read end. The handle also holds a write end, so the reader
    /// never blocks on open and does not see end-of-data between writers.
    pub fn open_receiver(&self) -> io::Result<pipe::Receiver> {
        pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(&self.path)
    }
}

impl Drop for OwnedFifo {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed FIFO {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove FIFO {}: {}", self.path.display(), e),
        }
    }
}

/// Opens the write end of an existing FIFO. Fails with `ENXIO` while nobody
/// has it open for reading.
pub fn open_writer(path: &Path) -> io::Result<pipe::Sender> {
    pipe::OpenOptions::new().open_sender(path)
}

/// Reply channels are FIFOs named `<prefix><requesterId>` inside one directory.
#[derive(Debug, Clone)]
pub struct FifoTransport {
    dir: PathBuf,
}

impl FifoTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ReplyTransport for FifoTransport {
    type Writer = pipe::Sender;

    async fn open(&self, channel: &str) -> io::Result<Self::Writer> {
        open_writer(&self.dir.join(channel))
    }
}
