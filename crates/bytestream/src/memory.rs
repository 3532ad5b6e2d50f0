use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use bytestream_error::{ErrorKind, Result, StreamError};
use parking_lot::Mutex;

use crate::connection::{BackendError, BackendResult, Connection, FileInfo};

/// Memory-backed connection.
///
/// This provides a flat structure where every "file" exists at the root.
/// Mostly useful for tests, where short reads and backend failures can be
/// forced on demand.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    /// A simple file name -> file bytes mapping.
    files: Mutex<HashMap<String, Bytes>>,
    /// Max bytes returned from a single read call.
    max_chunk: Option<usize>,
    /// Reads starting at or after this offset fail.
    read_failure_at: Option<u64>,
    fail_close: bool,
    open_handles: AtomicUsize,
    read_calls: AtomicU64,
    close_calls: AtomicU64,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of bytes returned from each backend read.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        assert_ne!(0, max_chunk, "max chunk must be non-zero");
        self.max_chunk = Some(max_chunk);
        self
    }

    /// Fail any read that starts at or after `offset`.
    pub fn with_read_failure_at(mut self, offset: u64) -> Self {
        self.read_failure_at = Some(offset);
        self
    }

    /// Fail every close, releasing the handle anyways.
    pub fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn register_file(&self, path: impl AsRef<Path>, content: impl Into<Bytes>) -> Result<()> {
        let name = get_normalized_file_name(path.as_ref())?;
        self.files.lock().insert(name.to_string(), content.into());
        Ok(())
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let name = get_normalized_file_name(path.as_ref())?;
        match self.files.lock().remove(name) {
            Some(_) => Ok(()),
            None => Err(StreamError::with_kind(
                ErrorKind::InvalidInput,
                format!("Missing file for '{name}'"),
            )),
        }
    }

    pub fn list_files(&self) -> Vec<String> {
        let mut files: Vec<_> = self.files.lock().keys().cloned().collect();
        files.sort();
        files
    }

    /// Number of handles opened but not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Relaxed)
    }

    /// Number of backend read calls made through this connection.
    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Number of backend close calls made through this connection.
    pub fn close_calls(&self) -> u64 {
        self.close_calls.load(Ordering::Relaxed)
    }

    fn lookup(&self, path: &str) -> BackendResult<Bytes> {
        let name = get_normalized_file_name(Path::new(path))
            .map_err(|e| BackendError::Message(e.to_string()))?;
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(path.to_string()))
    }
}

#[derive(Debug)]
pub struct MemoryFileHandle {
    pos: u64,
    content: Bytes,
}

impl Connection for MemoryConnection {
    type Handle = MemoryFileHandle;

    fn open(&self, path: &str) -> BackendResult<Self::Handle> {
        let content = self.lookup(path)?;
        self.open_handles.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryFileHandle { pos: 0, content })
    }

    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> BackendResult<usize> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(offset) = self.read_failure_at {
            if handle.pos >= offset {
                return Err(BackendError::Message(format!(
                    "injected read failure at offset {}",
                    handle.pos
                )));
            }
        }

        let len = handle.content.len() as u64;
        let rem = (len - u64::min(handle.pos, len)) as usize;
        let mut count = usize::min(buf.len(), rem);
        if let Some(max_chunk) = self.max_chunk {
            count = usize::min(count, max_chunk);
        }

        let start = handle.pos as usize;
        buf[..count].copy_from_slice(&handle.content[start..(start + count)]);
        handle.pos += count as u64;

        Ok(count)
    }

    fn seek(&self, handle: &mut Self::Handle, offset: u64) -> BackendResult<()> {
        let size = handle.content.len() as u64;
        if offset > size {
            return Err(BackendError::OutOfRange { offset, size });
        }
        handle.pos = offset;
        Ok(())
    }

    fn tell(&self, handle: &Self::Handle) -> Option<u64> {
        Some(handle.pos)
    }

    fn stat(&self, path: &str) -> BackendResult<FileInfo> {
        let content = self.lookup(path)?;
        Ok(FileInfo {
            size: content.len() as u64,
        })
    }

    fn close(&self, _handle: Self::Handle) -> BackendResult<()> {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        self.open_handles.fetch_sub(1, Ordering::Relaxed);
        if self.fail_close {
            return Err(BackendError::Message("injected close failure".to_string()));
        }
        Ok(())
    }

    fn can_handle_path(&self, path: &str) -> bool {
        !path.contains("://") && get_normalized_file_name(Path::new(path)).is_ok()
    }
}

/// Gets a normalized file name that works with our in-memory connection.
///
/// - No directories permitted other than root or curr dir.
/// - Assume that current directory is the root directory.
fn get_normalized_file_name(path: &Path) -> Result<&str> {
    let invalid = |msg: &str| {
        StreamError::with_kind(ErrorKind::InvalidInput, msg.to_string())
            .with_field("path", path.display())
    };

    let mut components = path.components();
    match components.next() {
        Some(Component::RootDir) | Some(Component::CurDir) => (),
        Some(Component::Normal(s)) => {
            if components.next().is_some() {
                return Err(invalid("Directories not supported in memory connection"));
            }

            return s
                .to_str()
                .ok_or_else(|| invalid("Unable to convert os string to string"));
        }
        Some(_) => return Err(invalid("Invalid component in path")),
        None => return Err(invalid("Path is empty")),
    }

    // We're either in '/' or './' (same thing)
    match components.next() {
        Some(Component::Normal(s)) => {
            if components.next().is_some() {
                return Err(invalid("Directories not supported in memory connection"));
            }

            s.to_str()
                .ok_or_else(|| invalid("Unable to convert os string to string"))
        }
        _ => Err(invalid("Invalid path component")),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn valid_file_names() {
        assert_eq!(
            "test.parquet",
            get_normalized_file_name(&PathBuf::from("test.parquet")).unwrap()
        );
        assert_eq!(
            "test.parquet",
            get_normalized_file_name(&PathBuf::from("/test.parquet")).unwrap()
        );
        assert_eq!(
            "test.parquet",
            get_normalized_file_name(&PathBuf::from("./test.parquet")).unwrap()
        );
    }

    #[test]
    fn invalid_file_names() {
        get_normalized_file_name(&PathBuf::from("../test.parquet")).unwrap_err();
        get_normalized_file_name(&PathBuf::from("dir/test.parquet")).unwrap_err();
        get_normalized_file_name(&PathBuf::from("./dir/test.parquet")).unwrap_err();
        get_normalized_file_name(&PathBuf::from("/dir/test.parquet")).unwrap_err();
        get_normalized_file_name(&PathBuf::from("")).unwrap_err();
    }

    #[test]
    fn handle_read_partial() {
        let conn = MemoryConnection::new();
        conn.register_file("hello.txt", "hello").unwrap();

        let mut handle = conn.open("/hello.txt").unwrap();
        let mut out = vec![0; 4];

        assert_eq!(4, conn.read(&mut handle, &mut out).unwrap());
        assert_eq!(b"hell", &out[0..4]);
        assert_eq!(1, conn.read(&mut handle, &mut out).unwrap());
        assert_eq!(b"o", &out[0..1]);
        assert_eq!(0, conn.read(&mut handle, &mut out).unwrap());
    }

    #[test]
    fn handle_read_max_chunk() {
        let conn = MemoryConnection::new().with_max_chunk(2);
        conn.register_file("hello.txt", "hello").unwrap();

        let mut handle = conn.open("hello.txt").unwrap();
        let mut out = vec![0; 10];
        assert_eq!(2, conn.read(&mut handle, &mut out).unwrap());
        assert_eq!(Some(2), conn.tell(&handle));
    }

    #[test]
    fn seek_past_end() {
        let conn = MemoryConnection::new();
        conn.register_file("hello.txt", "hello").unwrap();

        let mut handle = conn.open("hello.txt").unwrap();
        conn.seek(&mut handle, 5).unwrap();
        let err = conn.seek(&mut handle, 6).unwrap_err();
        assert!(matches!(err, BackendError::OutOfRange { offset: 6, size: 5 }));
    }

    #[test]
    fn open_missing() {
        let conn = MemoryConnection::new();
        let err = conn.open("nope").unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
        assert_eq!(0, conn.open_handles());
    }

    #[test]
    fn stat_sees_replaced_content() {
        let conn = MemoryConnection::new();
        conn.register_file("a", "abc").unwrap();
        assert_eq!(3, conn.stat("a").unwrap().size);

        conn.register_file("a", "abcdef").unwrap();
        assert_eq!(6, conn.stat("a").unwrap().size);
    }

    #[test]
    fn list_and_remove() {
        let conn = MemoryConnection::new();
        conn.register_file("b", "1").unwrap();
        conn.register_file("a", "2").unwrap();
        assert_eq!(vec!["a".to_string(), "b".to_string()], conn.list_files());

        conn.remove_file("a").unwrap();
        conn.remove_file("a").unwrap_err();
        assert_eq!(vec!["b".to_string()], conn.list_files());
    }

    #[test]
    fn handles_plain_paths_only() {
        let conn = MemoryConnection::new();
        assert!(conn.can_handle_path("data.csv"));
        assert!(conn.can_handle_path("/data.csv"));
        assert!(!conn.can_handle_path("dir/data.csv"));
        assert!(!conn.can_handle_path("http://example.com/data.csv"));
    }
}
