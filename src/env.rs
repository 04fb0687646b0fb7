//! The file interface the reader consumes. Opening files, locking, and
//! the choice between `pread` and `mmap` are filesystem/OS policy and
//! live outside this crate; `TableFile` is the narrow capability a table
//! reader actually needs.

use crate::error::{Result, Status, StatusCode};

/// Random-access, exact-length reads over an immutable byte range, plus a
/// size query and an explicit close. Short reads are only legal at EOF —
/// any other short read is an I/O error.
pub trait TableFile {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn size(&self) -> Result<u64>;
    fn close(self) -> Result<()>;
}

impl TableFile for std::fs::File {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::unix::fs::FileExt;
        FileExt::read_exact_at(self, buf, offset).map_err(Status::from)
    }

    fn size(&self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn close(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}

/// An in-memory table, useful for tests and for tables built in memory
/// before being handed off to real storage.
pub struct MemFile(pub Vec<u8>);

impl TableFile for MemFile {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let offset = offset as usize;
        let end = offset
            .checked_add(buf.len())
            .ok_or_else(|| Status::new(StatusCode::IO, "read range overflows"))?;
        if end > self.0.len() {
            return Err(Status::new(
                StatusCode::IO,
                "short read past end of in-memory table",
            ));
        }
        buf.copy_from_slice(&self.0[offset..end]);
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.0.len() as u64)
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
