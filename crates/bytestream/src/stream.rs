use std::fmt::Debug;
use std::sync::Arc;

use bytestream_error::{ErrorKind, Result, StreamError};
use tracing::{debug, trace, warn};

use crate::connection::{BackendError, Connection};
use crate::metrics::MetricsSink;
use crate::options::{ByteCounting, ByteStreamOptions};

/// Sequential/positional reads over some byte source.
///
/// Lifecycle is `open`, then any number of `read`/`seek`/`get_position`/`eof`
/// calls, then `close`. Calling anything other than `open` or `close` on a
/// stream that isn't open is a bug in the caller and panics.
pub trait ByteStream: Debug + Send {
    /// Bind this stream to a location and acquire a handle.
    ///
    /// May only be called once per stream, even if the first call failed.
    fn open(&mut self, location: &str) -> Result<()>;

    /// Read into `buf`, returning the number of bytes delivered.
    ///
    /// Fills the entire buffer unless end of file is reached first, in which
    /// case the bytes remaining in the file are delivered (possibly zero).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the read cursor to an absolute offset.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current absolute offset of the read cursor.
    fn get_position(&mut self) -> Result<u64>;

    /// Returns true if the cursor is at or past the end of the file.
    ///
    /// This looks up the file size every call. Prefer checking for short
    /// reads when possible.
    fn eof(&mut self) -> Result<bool>;

    /// Size in bytes of the underlying file. Looked up every call.
    fn size(&mut self) -> Result<u64>;

    /// Release the handle. Safe to call more than once, or without a
    /// successful open.
    fn close(&mut self) -> Result<()>;

    /// Location this stream was opened against.
    fn location(&self) -> Option<&str>;

    /// Bytes counted so far in this session.
    fn total_bytes_read(&self) -> u64;

    fn is_open(&self) -> bool;

    /// Read exactly `buf.len()` bytes, erroring if end of file is reached
    /// first.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.read(buf)?;
        if n != buf.len() {
            return Err(StreamError::with_kind(
                ErrorKind::Read,
                "Unexpected end of file during exact read",
            )
            .with_field("location", self.location().unwrap_or_default())
            .with_field("requested", buf.len())
            .with_field("delivered", n));
        }
        Ok(())
    }
}

impl ByteStream for Box<dyn ByteStream + '_> {
    fn open(&mut self, location: &str) -> Result<()> {
        self.as_mut().open(location)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.as_mut().read(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.as_mut().seek(offset)
    }

    fn get_position(&mut self) -> Result<u64> {
        self.as_mut().get_position()
    }

    fn eof(&mut self) -> Result<bool> {
        self.as_mut().eof()
    }

    fn size(&mut self) -> Result<u64> {
        self.as_mut().size()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }

    fn location(&self) -> Option<&str> {
        self.as_ref().location()
    }

    fn total_bytes_read(&self) -> u64 {
        self.as_ref().total_bytes_read()
    }

    fn is_open(&self) -> bool {
        self.as_ref().is_open()
    }
}

#[derive(Debug)]
enum StreamState<H> {
    Created,
    Open(H),
    Closed,
}

/// A byte stream backed by a handle from a shared connection.
#[derive(Debug)]
pub struct ConnectionByteStream<C: Connection> {
    connection: Arc<C>,
    metrics: Option<Arc<dyn MetricsSink>>,
    options: ByteStreamOptions,
    /// Set on the first open attempt, successful or not.
    location: Option<String>,
    state: StreamState<C::Handle>,
    total_bytes_read: u64,
}

impl<C> ConnectionByteStream<C>
where
    C: Connection,
{
    pub fn new(connection: Arc<C>, metrics: Option<Arc<dyn MetricsSink>>) -> Self {
        Self::with_options(connection, metrics, ByteStreamOptions::default())
    }

    pub fn with_options(
        connection: Arc<C>,
        metrics: Option<Arc<dyn MetricsSink>>,
        options: ByteStreamOptions,
    ) -> Self {
        ConnectionByteStream {
            connection,
            metrics,
            options,
            location: None,
            state: StreamState::Created,
            total_bytes_read: 0,
        }
    }

    fn assert_open(&self, op: &str) {
        assert!(
            matches!(self.state, StreamState::Open(_)),
            "byte stream must be open to {op}"
        );
    }
}

fn backend_error(kind: ErrorKind, msg: &str, location: &str, err: BackendError) -> StreamError {
    StreamError::with_source(kind, msg, Box::new(err)).with_field("location", location)
}

impl<C> ByteStream for ConnectionByteStream<C>
where
    C: Connection,
{
    fn open(&mut self, location: &str) -> Result<()> {
        assert!(
            self.location.is_none() && matches!(self.state, StreamState::Created),
            "byte stream already opened or closed (location: {location})"
        );
        self.location = Some(location.to_string());

        let handle = self
            .connection
            .open(location)
            .map_err(|e| backend_error(ErrorKind::Open, "Failed to open file", location, e))?;
        self.state = StreamState::Open(handle);
        debug!(%location, "opened byte stream");

        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let handle = match &mut self.state {
            StreamState::Open(handle) => handle,
            _ => panic!("byte stream must be open to read"),
        };
        let location = self.location.as_deref().unwrap_or_default();

        let mut n_read = 0;
        while n_read < buf.len() {
            let last_read = self
                .connection
                .read(handle, &mut buf[n_read..])
                .map_err(|e| {
                    backend_error(ErrorKind::Read, "Failed to read from file", location, e)
                })?;
            trace!(%location, requested = buf.len() - n_read, last_read, "backend read");

            if last_read == 0 {
                if self.options.byte_counting == ByteCounting::AllDelivered {
                    self.total_bytes_read += n_read as u64;
                }
                return Ok(n_read);
            }

            debug_assert!(last_read <= buf.len() - n_read);
            n_read += last_read;
        }

        self.total_bytes_read += n_read as u64;
        Ok(n_read)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let handle = match &mut self.state {
            StreamState::Open(handle) => handle,
            _ => panic!("byte stream must be open to seek"),
        };
        let location = self.location.as_deref().unwrap_or_default();

        self.connection.seek(handle, offset).map_err(|e| {
            backend_error(ErrorKind::Seek, "Failed to seek file", location, e)
                .with_field("offset", offset)
        })?;
        debug!(%location, %offset, "seeked byte stream");

        Ok(())
    }

    fn get_position(&mut self) -> Result<u64> {
        let handle = match &self.state {
            StreamState::Open(handle) => handle,
            _ => panic!("byte stream must be open to get position"),
        };
        match self.connection.tell(handle) {
            Some(pos) => Ok(pos),
            None => panic!(
                "backend returned no position for open handle (location: {})",
                self.location.as_deref().unwrap_or_default()
            ),
        }
    }

    fn eof(&mut self) -> Result<bool> {
        let pos = self.get_position()?;
        let size = self.size()?;
        Ok(pos >= size)
    }

    fn size(&mut self) -> Result<u64> {
        self.assert_open("stat");
        let location = self.location.as_deref().unwrap_or_default();
        let info = self
            .connection
            .stat(location)
            .map_err(|e| backend_error(ErrorKind::Stat, "Failed to stat file", location, e))?;
        Ok(info.size)
    }

    fn close(&mut self) -> Result<()> {
        let handle = match std::mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Open(handle) => handle,
            _ => return Ok(()),
        };
        let location = self.location.as_deref().unwrap_or_default();

        // Handle is considered released even if the backend errors.
        self.connection
            .close(handle)
            .map_err(|e| backend_error(ErrorKind::Close, "Failed to close file", location, e))?;
        debug!(%location, total_bytes_read = self.total_bytes_read, "closed byte stream");

        if let Some(metrics) = &self.metrics {
            metrics.add_bytes_read(self.total_bytes_read);
        }

        Ok(())
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    fn total_bytes_read(&self) -> u64 {
        self.total_bytes_read
    }

    fn is_open(&self) -> bool {
        matches!(self.state, StreamState::Open(_))
    }
}

impl<C> Drop for ConnectionByteStream<C>
where
    C: Connection,
{
    fn drop(&mut self) {
        if let StreamState::Open(handle) = std::mem::replace(&mut self.state, StreamState::Closed)
        {
            let location = self.location.as_deref().unwrap_or_default();
            warn!(%location, "byte stream dropped while open, releasing handle");
            if let Err(e) = self.connection.close(handle) {
                warn!(%location, %e, "failed to release handle on drop");
            }
        }
    }
}
