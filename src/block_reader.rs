//! Reads one block's physical extent off a [`TableFile`] and hands back
//! its decoded body: `[body..., compression_type: u8, masked_crc: u32_le]`
//! on disk, `body` (decompressed if needed) in memory.

use crate::blockhandle::BlockHandle;
use crate::crc;
use crate::env::TableFile;
use crate::error::{Result, Status, StatusCode};

const TRAILER_LEN: usize = 5;

pub fn read_block<F: TableFile>(
    file: &F,
    handle: &BlockHandle,
    verify_checksums: bool,
) -> Result<Vec<u8>> {
    let body_len = handle.length as usize;
    let mut buf = vec![0u8; body_len + TRAILER_LEN];
    file.read_exact_at(handle.offset, &mut buf)?;

    let (body, trailer) = buf.split_at(body_len);
    let compression_type = trailer[0];

    if verify_checksums {
        let stored = u32::from_le_bytes(trailer[1..5].try_into().unwrap());
        let mut hashed = Vec::with_capacity(body_len + 1);
        hashed.extend_from_slice(body);
        hashed.push(compression_type);
        let computed = crc::mask(crc::crc32c(&hashed));
        if computed != stored {
            return Err(Status::new(
                StatusCode::Corruption,
                &format!("checksum mismatch for block at offset {}", handle.offset),
            ));
        }
    }

    match compression_type {
        0 => Ok(body.to_vec()),
        1 => Ok(snap::raw::Decoder::new().decompress_vec(body)?),
        other => Err(Status::new(
            StatusCode::Corruption,
            &format!("unknown compression type {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MemFile;

    fn wrap(body: &[u8], compression_type: u8, checksum: u32) -> MemFile {
        let mut bytes = body.to_vec();
        bytes.push(compression_type);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        MemFile(bytes)
    }

    #[test]
    fn reads_uncompressed_block() {
        let body = b"hello world";
        let checksum = crc::mask(crc::crc32c(&[body.as_slice(), &[0]].concat()));
        let file = wrap(body, 0, checksum);
        let handle = BlockHandle::new(0, body.len() as u64);
        let decoded = read_block(&file, &handle, true).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn decompresses_snappy_block() {
        let body = b"some body to compress, some body to compress";
        let compressed = snap::raw::Encoder::new().compress_vec(body).unwrap();
        let checksum = crc::mask(crc::crc32c(&[compressed.as_slice(), &[1]].concat()));
        let file = wrap(&compressed, 1, checksum);
        let handle = BlockHandle::new(0, compressed.len() as u64);
        let decoded = read_block(&file, &handle, true).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn rejects_bad_checksum() {
        let body = b"hello world";
        let file = wrap(body, 0, 0xdeadbeef);
        let handle = BlockHandle::new(0, body.len() as u64);
        let err = read_block(&file, &handle, true).unwrap_err();
        assert_eq!(err.code, StatusCode::Corruption);
    }

    #[test]
    fn unverified_checksum_is_skipped() {
        let body = b"hello world";
        let file = wrap(body, 0, 0xdeadbeef);
        let handle = BlockHandle::new(0, body.len() as u64);
        assert!(read_block(&file, &handle, false).is_ok());
    }

    #[test]
    fn unknown_compression_type_is_corruption() {
        let body = b"hello world";
        let checksum = crc::mask(crc::crc32c(&[body.as_slice(), &[2]].concat()));
        let file = wrap(body, 2, checksum);
        let handle = BlockHandle::new(0, body.len() as u64);
        let err = read_block(&file, &handle, false).unwrap_err();
        assert_eq!(err.code, StatusCode::Corruption);
        assert!(err.message.contains('2'));
    }
}
