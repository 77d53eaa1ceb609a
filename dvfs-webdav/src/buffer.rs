//! FIFO byte queues between the transport and the file abstraction

use bytes::{Buf, Bytes, BytesMut};

const DEFAULT_CAPACITY: usize = 32 * 1024;

/// Bytes received from the server, awaiting consumption by the reader.
#[derive(Debug)]
pub struct ReadBuffer {
    bytes: BytesMut,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self {
            bytes: BytesMut::with_capacity(DEFAULT_CAPACITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Copies up to `dst.len()` bytes out and removes them from the front.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = self.size().min(dst.len());
        if n == 0 {
            return 0;
        }
        dst[..n].copy_from_slice(&self.bytes[..n]);
        self.bytes.advance(n);
        n
    }

    /// Removes up to `n` bytes from the front without copying them out.
    pub fn discard(&mut self, n: usize) -> usize {
        let n = self.size().min(n);
        self.bytes.advance(n);
        n
    }

    /// Drains the whole buffer into a string, replacing invalid UTF-8.
    pub fn read_all_as_string(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.bytes).into_owned();
        self.clear();
        out
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes produced by the writer, awaiting transmission to the server.
#[derive(Debug)]
pub struct WriteBuffer {
    bytes: BytesMut,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self {
            bytes: BytesMut::with_capacity(DEFAULT_CAPACITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = self.size().min(dst.len());
        if n == 0 {
            return 0;
        }
        dst[..n].copy_from_slice(&self.bytes[..n]);
        self.bytes.advance(n);
        n
    }

    pub fn discard(&mut self, n: usize) -> usize {
        let n = self.size().min(n);
        self.bytes.advance(n);
        n
    }

    /// Splits off up to `max` bytes from the front as a transport chunk.
    pub(crate) fn take_chunk(&mut self, max: usize) -> Bytes {
        let n = self.size().min(max);
        self.bytes.split_to(n).freeze()
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
