use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;

use bytestream::connection::{BackendError, BackendResult, Connection, FileInfo};
use tracing::trace;
use url::Url;

#[derive(Debug)]
pub struct LocalFileHandle {
    path: PathBuf,
    file: File,
}

/// Connection to the local filesystem.
#[derive(Debug, Default)]
pub struct LocalConnection {}

impl LocalConnection {
    pub fn new() -> Self {
        LocalConnection {}
    }
}

/// Get the local path for a location, accepting either plain paths or
/// `file://` urls.
///
/// Anything else with a `scheme://` prefix belongs to some other connection.
/// Paths that merely contain a colon (`data:2024.csv`) are local.
fn local_path(path: &str) -> Option<PathBuf> {
    match Url::parse(path) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(_) if path.contains("://") => None,
        _ => Some(PathBuf::from(path)),
    }
}

fn map_io_error(path: &str, err: std::io::Error) -> BackendError {
    if err.kind() == ErrorKind::NotFound {
        BackendError::NotFound(path.to_string())
    } else {
        BackendError::Io(err)
    }
}

impl Connection for LocalConnection {
    type Handle = LocalFileHandle;

    fn open(&self, path: &str) -> BackendResult<Self::Handle> {
        let local = local_path(path)
            .ok_or_else(|| BackendError::Message(format!("Not a local path: {path}")))?;

        let file = File::open(&local).map_err(|e| map_io_error(path, e))?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(BackendError::Message(format!("{path} is a directory")));
        }

        Ok(LocalFileHandle { path: local, file })
    }

    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> BackendResult<usize> {
        loop {
            match handle.file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    trace!(path = %handle.path.display(), "local read interrupted, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn seek(&self, handle: &mut Self::Handle, offset: u64) -> BackendResult<()> {
        let size = handle.file.metadata()?.len();
        if offset > size {
            return Err(BackendError::OutOfRange { offset, size });
        }
        handle.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn tell(&self, handle: &Self::Handle) -> Option<u64> {
        let mut file = &handle.file;
        file.stream_position().ok()
    }

    fn stat(&self, path: &str) -> BackendResult<FileInfo> {
        let local = local_path(path)
            .ok_or_else(|| BackendError::Message(format!("Not a local path: {path}")))?;
        let metadata = fs::metadata(local).map_err(|e| map_io_error(path, e))?;
        Ok(FileInfo {
            size: metadata.len(),
        })
    }

    fn close(&self, handle: Self::Handle) -> BackendResult<()> {
        trace!(path = %handle.path.display(), "closing local file");
        std::mem::drop(handle);
        Ok(())
    }

    fn can_handle_path(&self, path: &str) -> bool {
        local_path(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytestream::{ByteStream, ConnectionByteStream, ScanCounters};
    use bytestream_error::ErrorKind as StreamErrorKind;

    use super::*;

    fn ten_byte_file() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, (0..10).collect::<Vec<u8>>()).unwrap();
        (dir, path.to_string_lossy().to_string())
    }

    #[test]
    fn handles_paths_and_file_urls() {
        let conn = LocalConnection::new();
        assert!(conn.can_handle_path("/tmp/data.csv"));
        assert!(conn.can_handle_path("relative/data.csv"));
        assert!(conn.can_handle_path("file:///tmp/data.csv"));
        assert!(!conn.can_handle_path("https://example.com/data.csv"));
        assert!(!conn.can_handle_path("s3://bucket/data.csv"));
    }

    #[test]
    fn colon_in_plain_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data:2024.csv");
        std::fs::write(&path, [1, 2, 3]).unwrap();

        // Relative form looks like a url with a "data" scheme.
        let conn = LocalConnection::new();
        assert!(conn.can_handle_path("data:2024.csv"));

        let path = path.to_string_lossy().to_string();
        assert!(conn.can_handle_path(&path));
        assert_eq!(3, conn.stat(&path).unwrap().size);
    }

    #[test]
    fn stream_scenarios() {
        let (_dir, path) = ten_byte_file();
        let counters = Arc::new(ScanCounters::new());
        let mut stream =
            ConnectionByteStream::new(Arc::new(LocalConnection::new()), Some(counters.clone()));
        stream.open(&path).unwrap();

        let mut buf = [0; 4];
        assert_eq!(4, stream.read(&mut buf).unwrap());
        assert_eq!([0, 1, 2, 3], buf);
        assert_eq!(4, stream.get_position().unwrap());

        let mut buf = [0; 10];
        assert_eq!(6, stream.read(&mut buf).unwrap());
        assert_eq!([4, 5, 6, 7, 8, 9], buf[..6]);
        assert!(stream.eof().unwrap());

        stream.seek(2).unwrap();
        let mut buf = [0; 3];
        assert_eq!(3, stream.read(&mut buf).unwrap());
        assert_eq!([2, 3, 4], buf);

        stream.close().unwrap();
        stream.close().unwrap();
        assert_eq!(7, counters.bytes_read());
        assert_eq!(1, counters.updates());
    }

    #[test]
    fn open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").to_string_lossy().to_string();

        let mut stream = ConnectionByteStream::new(Arc::new(LocalConnection::new()), None);
        let err = stream.open(&path).unwrap_err();
        assert_eq!(StreamErrorKind::Open, err.kind());
        assert!(err.to_string().contains("missing"), "{err}");
    }

    #[test]
    fn open_directory() {
        let dir = tempfile::tempdir().unwrap();
        let conn = LocalConnection::new();
        let err = conn.open(&dir.path().to_string_lossy()).unwrap_err();
        assert!(err.to_string().contains("is a directory"), "{err}");
    }

    #[test]
    fn seek_out_of_range() {
        let (_dir, path) = ten_byte_file();
        let conn = LocalConnection::new();
        let mut handle = conn.open(&path).unwrap();

        conn.seek(&mut handle, 10).unwrap();
        assert_eq!(Some(10), conn.tell(&handle));

        let err = conn.seek(&mut handle, 11).unwrap_err();
        assert!(matches!(err, BackendError::OutOfRange { offset: 11, size: 10 }));
    }

    #[test]
    fn stat_tracks_file_growth() {
        let (_dir, path) = ten_byte_file();
        let mut stream = ConnectionByteStream::new(Arc::new(LocalConnection::new()), None);
        stream.open(&path).unwrap();
        stream.seek(10).unwrap();
        assert!(stream.eof().unwrap());

        std::fs::write(&path, [0; 20]).unwrap();
        assert!(!stream.eof().unwrap());
    }

    #[test]
    fn open_via_file_url() {
        let (_dir, path) = ten_byte_file();
        let url = Url::from_file_path(&path).unwrap();
        let conn = LocalConnection::new();
        assert_eq!(10, conn.stat(url.as_str()).unwrap().size);
    }
}
