use std::io::{self, Read, Seek, SeekFrom};

use crate::stream::ByteStream;

/// Adapts an open byte stream to `std::io::Read` and `std::io::Seek`.
#[derive(Debug)]
pub struct StreamReader<S> {
    stream: S,
}

impl<S> StreamReader<S>
where
    S: ByteStream,
{
    /// Wrap an already opened stream.
    pub fn new(stream: S) -> Self {
        assert!(stream.is_open(), "stream reader requires an open stream");
        StreamReader { stream }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Read for StreamReader<S>
where
    S: ByteStream,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.stream.read(buf)?)
    }
}

impl<S> Seek for StreamReader<S>
where
    S: ByteStream,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (offset, 0),
            SeekFrom::Current(delta) => (self.stream.get_position()?, delta),
            SeekFrom::End(delta) => (self.stream.size()?, delta),
        };

        let offset = base.checked_add_signed(delta).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid seek position (base: {base}, delta: {delta})"),
            )
        })?;

        self.stream.seek(offset)?;
        Ok(offset)
    }
}
