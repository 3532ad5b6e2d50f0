use bytestream::connection::{BackendError, BackendResult, Connection, FileInfo};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct HttpFileHandle {
    url: Url,
    /// Size as of open. Used for bounding range requests.
    size: u64,
    pos: u64,
}

/// Connection reading remote files using http range requests.
#[derive(Debug, Clone, Default)]
pub struct HttpConnection {
    client: Client,
}

impl HttpConnection {
    pub fn new(client: Client) -> Self {
        HttpConnection { client }
    }

    fn head(&self, url: &Url) -> BackendResult<u64> {
        debug!(%url, "http head");
        let resp = self
            .client
            .head(url.as_str())
            .send()
            .map_err(|e| BackendError::Other(Box::new(e)))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(url.to_string()));
        }
        expect_status(&resp, StatusCode::OK)?;

        content_length(&resp)
    }
}

fn parse_url(path: &str) -> BackendResult<Url> {
    Url::parse(path).map_err(|e| BackendError::Message(format!("Invalid url '{path}': {e}")))
}

fn expect_status(resp: &Response, expected: StatusCode) -> BackendResult<()> {
    if resp.status() != expected {
        return Err(BackendError::UnexpectedStatus {
            status: resp.status().as_u16(),
            expected: expected.as_u16(),
        });
    }
    Ok(())
}

fn content_length(resp: &Response) -> BackendResult<u64> {
    // Note that `Response::content_length` reports the body size which is zero
    // for HEAD requests, read the header directly.
    resp.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| BackendError::Message("Missing or invalid content length".to_string()))
}

pub(crate) fn format_range_header(start: u64, end: u64) -> String {
    format!("bytes={start}-{end}")
}

impl Connection for HttpConnection {
    type Handle = HttpFileHandle;

    fn open(&self, path: &str) -> BackendResult<Self::Handle> {
        let url = parse_url(path)?;
        let size = self.head(&url)?;
        Ok(HttpFileHandle { url, size, pos: 0 })
    }

    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> BackendResult<usize> {
        if buf.is_empty() || handle.pos >= handle.size {
            return Ok(0);
        }

        let start = handle.pos;
        let end = u64::min(start + buf.len() as u64, handle.size) - 1;
        debug!(url = %handle.url, %start, %end, "http reading range");

        let resp = self
            .client
            .get(handle.url.as_str())
            .header(RANGE, format_range_header(start, end))
            .send()
            .map_err(|e| BackendError::Other(Box::new(e)))?;

        // Servers that don't support ranges send the whole body back.
        let skip = match resp.status() {
            StatusCode::PARTIAL_CONTENT => 0,
            StatusCode::OK => usize::try_from(start).map_err(|_| {
                BackendError::Message(format!("Range start {start} exceeds addressable memory"))
            })?,
            _ => {
                return Err(BackendError::UnexpectedStatus {
                    status: resp.status().as_u16(),
                    expected: StatusCode::PARTIAL_CONTENT.as_u16(),
                });
            }
        };

        let bytes = resp.bytes().map_err(|e| BackendError::Other(Box::new(e)))?;
        let available = bytes.get(skip..).unwrap_or_default();
        let count = usize::min(buf.len(), available.len());
        buf[..count].copy_from_slice(&available[..count]);
        handle.pos += count as u64;

        Ok(count)
    }

    fn seek(&self, handle: &mut Self::Handle, offset: u64) -> BackendResult<()> {
        if offset > handle.size {
            return Err(BackendError::OutOfRange {
                offset,
                size: handle.size,
            });
        }
        handle.pos = offset;
        Ok(())
    }

    fn tell(&self, handle: &Self::Handle) -> Option<u64> {
        Some(handle.pos)
    }

    fn stat(&self, path: &str) -> BackendResult<FileInfo> {
        let url = parse_url(path)?;
        let size = self.head(&url)?;
        Ok(FileInfo { size })
    }

    fn close(&self, _handle: Self::Handle) -> BackendResult<()> {
        Ok(())
    }

    fn can_handle_path(&self, path: &str) -> bool {
        path.starts_with("http://") || path.starts_with("https://")
    }
}
