use std::fmt::Debug;

/// Result type returned by connection calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Diagnostic produced by a storage backend.
///
/// Streams never inspect these beyond embedding them as the source of the
/// error they return to the caller.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no such file: {0}")]
    NotFound(String),

    #[error("offset {offset} out of range for file of {size} bytes")]
    OutOfRange { offset: u64, size: u64 },

    #[error("unexpected response status {status}, expected {expected}")]
    UnexpectedStatus { status: u16, expected: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Metadata for a single file as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Size of the file in bytes.
    pub size: u64,
}

/// A pre-established connection to some storage backend.
///
/// A single connection may back many open streams at once, each stream
/// exclusively owning the handle it got from `open`. Implementations must
/// therefore be safe to call concurrently from multiple streams.
pub trait Connection: Debug + Sync + Send + 'static {
    /// Backend specific handle to an open file.
    type Handle: Debug + Send + 'static;

    /// Open a file for sequential/positional reading.
    fn open(&self, path: &str) -> BackendResult<Self::Handle>;

    /// Read from the handle's current position into `buf`, advancing the
    /// position by the number of bytes returned.
    ///
    /// May return fewer bytes than requested. A return of Ok(0) for a
    /// non-empty buffer indicates end of file.
    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> BackendResult<usize>;

    /// Reposition the handle to an absolute offset.
    fn seek(&self, handle: &mut Self::Handle, offset: u64) -> BackendResult<()>;

    /// Get the handle's current absolute position.
    ///
    /// None indicates the handle is broken.
    fn tell(&self, handle: &Self::Handle) -> Option<u64>;

    /// Look up metadata for a path. Always a round trip to the backend.
    fn stat(&self, path: &str) -> BackendResult<FileInfo>;

    /// Release the handle.
    fn close(&self, handle: Self::Handle) -> BackendResult<()>;

    /// Returns if this connection is able to handle the provided path.
    fn can_handle_path(&self, path: &str) -> bool;
}
