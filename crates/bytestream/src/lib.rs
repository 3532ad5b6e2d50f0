//! Uniform streaming reads over local, remote, and in-memory storage.
//!
//! Scan operators hold a [`ByteStream`] and don't care where the bytes come
//! from. Storage backends plug in by implementing [`Connection`], and
//! [`ConnectionDispatch`] picks the right one for a location.

pub mod connection;
pub mod dispatch;
pub mod memory;
pub mod metrics;
pub mod options;
pub mod reader;
pub mod stream;

pub use connection::{BackendError, BackendResult, Connection, FileInfo};
pub use dispatch::ConnectionDispatch;
pub use metrics::{MetricsSink, ScanCounters};
pub use options::{ByteCounting, ByteStreamOptions};
pub use reader::StreamReader;
pub use stream::{ByteStream, ConnectionByteStream};
