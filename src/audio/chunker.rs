/// Groups the encoded byte stream into fixed-size chunks.
///
/// Pending bytes live in one reusable arena: complete chunks are copied out
/// from a moving head, and the short remainder is compacted to the front once
/// per call, so the buffer never grows past one chunk plus one encoder block.
#[derive(Debug, Clone)]
pub struct ChunkAggregator {
    bytes_per_chunk: usize,
    pending: Vec<u8>,
}

impl ChunkAggregator {
    pub fn new(bytes_per_chunk: usize) -> Self {
        let bytes_per_chunk = bytes_per_chunk.max(1);
        Self {
            bytes_per_chunk,
            pending: Vec::with_capacity(bytes_per_chunk * 2),
        }
    }

    pub fn bytes_per_chunk(&self) -> usize {
        self.bytes_per_chunk
    }

    /// Bytes waiting for the next chunk. Always below `bytes_per_chunk` between calls.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append `bytes` and return every chunk they complete, oldest first.
    pub fn aggregate(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        self.aggregate_with(bytes, |chunk| chunks.push(chunk));
        chunks
    }

    /// Append `bytes` and hand each completed chunk to `emit`.
    /// Returns the number of chunks emitted.
    pub fn aggregate_with<F>(&mut self, bytes: &[u8], mut emit: F) -> usize
    where
        F: FnMut(Vec<u8>),
    {
        self.pending.extend_from_slice(bytes);

        let mut head = 0usize;
        while self.pending.len() - head >= self.bytes_per_chunk {
            let end = head + self.bytes_per_chunk;
            emit(self.pending[head..end].to_vec());
            head = end;
        }

        if head > 0 {
            let len = self.pending.len();
            self.pending.copy_within(head.., 0);
            self.pending.truncate(len - head);
        }
        head / self.bytes_per_chunk
    }

    /// Take the partial remainder as a final short chunk, if any.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// Discard the remainder without emitting it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
