use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::{DEFAULT_BLOCK_SIZE, TransferError};

/// Local byte source read in fixed-size blocks, with a seekable cursor.
pub struct LocalSource<R = File> {
    reader: R,
    block_size: usize,
    offset: u64,
    size: u64,
}

impl LocalSource<File> {
    /// Opens `path` for block reading.
    ///
    /// If `block_size` is 0, [`DEFAULT_BLOCK_SIZE`] (1 KiB) is used.
    pub fn open(path: &Path, block_size: usize) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self::new(file, size, block_size))
    }
}

impl<R: Read + Seek> LocalSource<R> {
    /// Wraps a reader whose total length is `size` bytes.
    pub fn new(reader: R, size: u64, block_size: usize) -> Self {
        let block_size = if block_size == 0 {
            DEFAULT_BLOCK_SIZE
        } else {
            block_size
        };
        Self {
            reader,
            block_size,
            offset: 0,
            size,
        }
    }

    /// Moves the read cursor to `offset` (for resume).
    pub fn seek_to(&mut self, offset: u64) -> Result<(), TransferError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }

    /// Reads the next block into `buf`. Returns 0 at EOF.
    ///
    /// `buf` must be at least [`block_size`](Self::block_size) long.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, TransferError> {
        let want = buf.len().min(self.block_size);
        let n = self.reader.read(&mut buf[..want])?;
        self.offset += n as u64;
        Ok(n)
    }

    /// Current cursor position.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.offset)
    }
}
