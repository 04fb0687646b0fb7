//! Test-only fixtures that encode the on-disk bytes this crate reads.
//!
//! Building tables is out of scope for the public API (the writer is a
//! separate collaborator this crate doesn't implement), but the test
//! suite still needs a way to produce valid — and deliberately invalid —
//! table bytes to exercise the reader against. This module is private
//! and only compiled for tests.

#![cfg(test)]

use crate::blockhandle::BlockHandle;
use crate::crc;
use crate::footer::Footer;
use crate::varint::encode_varint64;

/// Encodes a sequence of (key, value) pairs into a block body: restart
/// points every `restart_interval` entries, mirroring how a real block
/// builder works (a restart point is implicitly present at offset 0 even
/// for an empty block).
pub(crate) fn build_block_body<'a>(
    entries: impl Iterator<Item = (&'a [u8], &'a [u8])>,
    restart_interval: usize,
) -> Vec<u8> {
    let mut data = Vec::new();
    let mut restarts = vec![0u32];
    let mut last_key: Vec<u8> = Vec::new();
    let mut counter = 0usize;

    for (key, value) in entries {
        let shared = if counter < restart_interval {
            common_prefix_len(&last_key, key)
        } else {
            restarts.push(data.len() as u32);
            counter = 0;
            0
        };
        let unshared = &key[shared..];

        encode_varint64(shared as u64, &mut data);
        encode_varint64(unshared.len() as u64, &mut data);
        encode_varint64(value.len() as u64, &mut data);
        data.extend_from_slice(unshared);
        data.extend_from_slice(value);

        last_key = key.to_vec();
        counter += 1;
    }

    for r in &restarts {
        data.extend_from_slice(&r.to_le_bytes());
    }
    data.extend_from_slice(&(restarts.len() as u32).to_le_bytes());
    data
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

pub(crate) struct BlockFixture;

impl BlockFixture {
    pub(crate) fn build(entries: &[(&str, &str)], restart_interval: usize) -> Vec<u8> {
        build_block_body(
            entries.iter().map(|(k, v)| (k.as_bytes(), v.as_bytes())),
            restart_interval,
        )
    }
}

/// Appends a block (body + compression byte + masked CRC) to `out` and
/// returns its handle. `compress` selects Snappy (type 1) vs none (type 0).
fn write_block(out: &mut Vec<u8>, body: &[u8], compress: bool) -> BlockHandle {
    let offset = out.len() as u64;
    let (stored_body, compression_type): (Vec<u8>, u8) = if compress {
        let compressed = snap::raw::Encoder::new().compress_vec(body).unwrap();
        (compressed, 1)
    } else {
        (body.to_vec(), 0)
    };

    let mut hasher_input = stored_body.clone();
    hasher_input.push(compression_type);
    let checksum = crc::mask(crc::crc32c(&hasher_input));

    out.extend_from_slice(&stored_body);
    out.push(compression_type);
    out.extend_from_slice(&checksum.to_le_bytes());

    BlockHandle::new(offset, stored_body.len() as u64)
}

pub(crate) struct BuildOptions {
    pub(crate) block_size: usize,
    pub(crate) restart_interval: usize,
    pub(crate) compress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            block_size: 4096,
            restart_interval: 16,
            compress: false,
        }
    }
}

/// A fully encoded table plus the handles of its data blocks, so tests can
/// locate and corrupt specific bytes.
pub(crate) struct BuiltTable {
    pub(crate) bytes: Vec<u8>,
    pub(crate) data_block_handles: Vec<BlockHandle>,
}

pub(crate) struct TableFixture;

impl TableFixture {
    pub(crate) fn build(entries: &[(Vec<u8>, Vec<u8>)], opts: BuildOptions) -> BuiltTable {
        let mut out = Vec::new();
        let mut index_entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut data_handles = Vec::new();

        let mut pending: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut pending_size = 0usize;

        let flush = |out: &mut Vec<u8>,
                     index_entries: &mut Vec<(Vec<u8>, Vec<u8>)>,
                     data_handles: &mut Vec<BlockHandle>,
                     pending: &[(Vec<u8>, Vec<u8>)]| {
            if pending.is_empty() {
                return;
            }
            let body = build_block_body(
                pending.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
                opts.restart_interval,
            );
            let handle = write_block(out, &body, opts.compress);
            let separator = pending.last().unwrap().0.clone();
            let mut encoded_handle = Vec::new();
            handle.encode(&mut encoded_handle);
            index_entries.push((separator, encoded_handle));
            data_handles.push(handle);
        };

        for (k, v) in entries {
            pending.push((k.clone(), v.clone()));
            pending_size += k.len() + v.len() + 12;
            if pending_size >= opts.block_size {
                flush(&mut out, &mut index_entries, &mut data_handles, &pending);
                pending.clear();
                pending_size = 0;
            }
        }
        flush(&mut out, &mut index_entries, &mut data_handles, &pending);

        let metaindex_body = build_block_body(std::iter::empty(), opts.restart_interval);
        let metaindex_handle = write_block(&mut out, &metaindex_body, false);

        let index_body = build_block_body(
            index_entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
            opts.restart_interval,
        );
        let index_handle = write_block(&mut out, &index_body, false);

        let footer = Footer {
            metaindex: metaindex_handle,
            index: index_handle,
        };
        out.extend_from_slice(&footer.encode());

        BuiltTable {
            bytes: out,
            data_block_handles: data_handles,
        }
    }
}
