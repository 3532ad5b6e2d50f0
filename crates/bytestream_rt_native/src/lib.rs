//! Connections for native (non-wasm) environments.

pub mod filesystem;
pub mod http;

use std::sync::Arc;

use bytestream::{ByteStreamOptions, ConnectionDispatch};

pub use self::filesystem::LocalConnection;
pub use self::http::HttpConnection;

/// Create a dispatch with all native connections registered.
///
/// Http is registered first since the local connection will accept any
/// string without a `scheme://` prefix.
pub fn native_dispatch(options: ByteStreamOptions) -> ConnectionDispatch {
    let mut dispatch = ConnectionDispatch::new(options);
    dispatch.register_connection(Arc::new(HttpConnection::default()));
    dispatch.register_connection(Arc::new(LocalConnection::new()));
    dispatch
}

#[cfg(test)]
mod tests {
    use bytestream::ByteStream;

    use super::*;

    #[test]
    fn dispatch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();

        let dispatch = native_dispatch(ByteStreamOptions::default());
        let mut stream = dispatch
            .open_stream(&path.to_string_lossy(), None)
            .unwrap();

        let mut buf = [0; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(b"hello", &buf);
        assert!(stream.eof().unwrap());
        stream.close().unwrap();
    }

    #[test]
    fn dispatch_unsupported_scheme() {
        let dispatch = native_dispatch(ByteStreamOptions::default());
        let err = dispatch.open_stream("s3://bucket/key", None).unwrap_err();
        assert_eq!(bytestream_error::ErrorKind::Open, err.kind());
    }
}
