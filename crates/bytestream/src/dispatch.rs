use std::fmt::Debug;
use std::sync::Arc;

use bytestream_error::{ErrorKind, Result, StreamError};

use crate::connection::Connection;
use crate::metrics::MetricsSink;
use crate::options::ByteStreamOptions;
use crate::stream::{ByteStream, ConnectionByteStream};

/// Object safe view of a connection, able to create streams for itself.
trait AnyConnection: Debug + Sync + Send {
    fn can_handle_path(&self, path: &str) -> bool;

    fn new_stream(
        self: Arc<Self>,
        metrics: Option<Arc<dyn MetricsSink>>,
        options: ByteStreamOptions,
    ) -> Box<dyn ByteStream>;
}

impl<C> AnyConnection for C
where
    C: Connection,
{
    fn can_handle_path(&self, path: &str) -> bool {
        Connection::can_handle_path(self, path)
    }

    fn new_stream(
        self: Arc<Self>,
        metrics: Option<Arc<dyn MetricsSink>>,
        options: ByteStreamOptions,
    ) -> Box<dyn ByteStream> {
        Box::new(ConnectionByteStream::with_options(self, metrics, options))
    }
}

/// Routes locations to the connection able to serve them.
///
/// Connections are checked in registration order, first match wins.
#[derive(Debug, Default)]
pub struct ConnectionDispatch {
    connections: Vec<Arc<dyn AnyConnection>>,
    options: ByteStreamOptions,
}

impl ConnectionDispatch {
    pub fn new(options: ByteStreamOptions) -> Self {
        ConnectionDispatch {
            connections: Vec::new(),
            options,
        }
    }

    /// Register a new connection with the dispatcher.
    pub fn register_connection<C>(&mut self, conn: Arc<C>)
    where
        C: Connection,
    {
        self.connections.push(conn);
    }

    pub fn options(&self) -> &ByteStreamOptions {
        &self.options
    }

    /// Create an unopened stream for `location`.
    pub fn stream_for_path(
        &self,
        location: &str,
        metrics: Option<Arc<dyn MetricsSink>>,
    ) -> Result<Box<dyn ByteStream>> {
        let conn = self
            .connections
            .iter()
            .find(|conn| conn.can_handle_path(location))
            .ok_or_else(|| {
                StreamError::with_kind(
                    ErrorKind::Open,
                    "Could not find a connection to handle location",
                )
                .with_field("location", location)
            })?;

        Ok(conn.clone().new_stream(metrics, self.options))
    }

    /// Create and open a stream for `location`.
    pub fn open_stream(
        &self,
        location: &str,
        metrics: Option<Arc<dyn MetricsSink>>,
    ) -> Result<Box<dyn ByteStream>> {
        let mut stream = self.stream_for_path(location, metrics)?;
        stream.open(location)?;
        Ok(stream)
    }
}
