//! The `Reader`: opens a table file, validates its footer, and serves
//! point lookups and ordered iteration backed by the index and data
//! blocks it describes.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::block::{Block, BlockIter};
use crate::block_reader;
use crate::blockhandle::BlockHandle;
use crate::cache::CacheKey;
use crate::capability::KvReader;
use crate::env::TableFile;
use crate::error::{Result, Status};
use crate::footer::{Footer, FOOTER_LEN};
use crate::log;
use crate::options::{Options, ReadOptions};

fn next_file_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A handle on an open, read-only table.
pub struct Reader<F: TableFile> {
    file: F,
    options: Options,
    footer: Footer,
    index_block: Arc<Block>,
    file_id: u64,
}

impl<F: TableFile> Reader<F> {
    /// Opens a table: reads and validates the footer, structurally
    /// validates the metaindex block, and loads the index block.
    pub fn open(file: F, options: Options) -> Result<Reader<F>> {
        let size = file.size()?;
        if size < FOOTER_LEN as u64 {
            return Err(Status::corruption("file too small to contain a table footer"));
        }

        let mut footer_buf = vec![0u8; FOOTER_LEN];
        file.read_exact_at(size - FOOTER_LEN as u64, &mut footer_buf)?;
        let footer = Footer::decode(&footer_buf)?;

        // The metaindex block may carry filter metadata this reader
        // doesn't interpret; validate its framing only.
        let metaindex_data =
            block_reader::read_block(&file, &footer.metaindex, options.verify_checksums)?;
        Block::new(metaindex_data)?;

        let index_data =
            block_reader::read_block(&file, &footer.index, options.verify_checksums)?;
        let index_block = Arc::new(Block::new(index_data)?);

        let file_id = next_file_id();

        if let Some(logger) = &options.logger {
            let mut logger = logger.lock().unwrap();
            log!(
                logger,
                "opened table: index block at offset {}, length {}",
                footer.index.offset,
                footer.index.length
            );
        }

        Ok(Reader {
            file,
            options,
            footer,
            index_block,
            file_id,
        })
    }

    /// Looks up `key` under the default read options, returning its value
    /// on an exact match.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.get_opt(key, &ReadOptions::default())
    }

    /// Looks up `key`, honoring the given per-read overrides.
    pub fn get_opt(&self, key: &[u8], read_opts: &ReadOptions) -> Result<Vec<u8>> {
        let mut it = self.find_opt(key, read_opts);
        if it.next() && self.options.comparator.cmp(it.key(), key) == Ordering::Equal {
            let value = it.value().to_vec();
            it.close()?;
            Ok(value)
        } else {
            it.close()?;
            Err(Status::not_found("key not found in table"))
        }
    }

    /// Returns an iterator, under the default read options, positioned so
    /// that its first `next()` reveals the first entry whose key compares
    /// `>=` `key`.
    pub fn find(&self, key: &[u8]) -> TableIterator<'_, F> {
        self.find_opt(key, &ReadOptions::default())
    }

    /// Like `find`, honoring the given per-read overrides.
    pub fn find_opt(&self, key: &[u8], read_opts: &ReadOptions) -> TableIterator<'_, F> {
        let index_iter = self
            .index_block
            .seek(self.options.comparator.as_ref(), key);
        let mut it = TableIterator {
            reader: self,
            index_iter,
            data_iter: None,
            error: None,
            done: false,
            read_opts: read_opts.clone(),
        };
        it.next_block(key);
        it
    }

    fn read_data_block(&self, handle: &BlockHandle, read_opts: &ReadOptions) -> Result<Arc<Block>> {
        let verify_checksums = self.options.verify_checksums_for(read_opts);
        if let Some(cache) = &self.options.cache {
            let key = CacheKey::new(self.file_id, handle);
            if let Some(block) = cache.get(&key) {
                return Ok(block);
            }
            let data = block_reader::read_block(&self.file, handle, verify_checksums)?;
            let block = Arc::new(Block::new(data)?);
            if read_opts.fill_cache {
                cache.insert(key, Arc::clone(&block));
            }
            Ok(block)
        } else {
            let data = block_reader::read_block(&self.file, handle, verify_checksums)?;
            Ok(Arc::new(Block::new(data)?))
        }
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}

impl<F: TableFile> KvReader for Reader<F> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        Reader::get(self, key)
    }
}

/// Two-level iterator: an index-block iterator picks the data block, a
/// data-block iterator walks its entries. Errors latch: once one occurs,
/// the iterator reports exhausted until `close()` surfaces it.
pub struct TableIterator<'a, F: TableFile> {
    reader: &'a Reader<F>,
    index_iter: BlockIter,
    data_iter: Option<BlockIter>,
    error: Option<Status>,
    done: bool,
    read_opts: ReadOptions,
}

impl<'a, F: TableFile> TableIterator<'a, F> {
    /// Advances to the next data block and seeks it to `target`.
    fn next_block(&mut self, target: &[u8]) {
        if !self.index_iter.next() {
            if let Some(e) = self.index_iter.error() {
                self.error = Some(e);
            }
            self.done = true;
            self.data_iter = None;
            return;
        }

        let value = self.index_iter.value();
        let handle = match BlockHandle::decode(value) {
            Ok((handle, consumed)) if consumed == value.len() => handle,
            Ok(_) => {
                self.error = Some(Status::corruption("index entry value not fully consumed"));
                self.done = true;
                self.data_iter = None;
                return;
            }
            Err(e) => {
                self.error = Some(e);
                self.done = true;
                self.data_iter = None;
                return;
            }
        };

        match self.reader.read_data_block(&handle, &self.read_opts) {
            Ok(block) => {
                self.data_iter = Some(block.seek(self.reader.options.comparator.as_ref(), target));
            }
            Err(e) => {
                self.error = Some(e);
                self.done = true;
                self.data_iter = None;
            }
        }
    }

    /// Advances the iterator by one entry.
    pub fn next(&mut self) -> bool {
        loop {
            if self.done {
                return false;
            }
            if let Some(data_iter) = self.data_iter.as_mut() {
                if data_iter.next() {
                    return true;
                }
                if let Some(e) = data_iter.error() {
                    self.error = Some(e);
                    self.done = true;
                    return false;
                }
            }
            self.next_block(&[]);
        }
    }

    pub fn valid(&self) -> bool {
        self.data_iter.as_ref().is_some_and(|d| d.valid())
    }

    pub fn key(&self) -> &[u8] {
        self.data_iter.as_ref().expect("key() on an invalid iterator").key()
    }

    pub fn value(&self) -> &[u8] {
        self.data_iter
            .as_ref()
            .expect("value() on an invalid iterator")
            .value()
    }

    /// Releases the iterator, surfacing any error latched during
    /// iteration.
    pub fn close(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MemFile;
    use crate::error::StatusCode;
    use crate::test_support::{BuildOptions, TableFixture};

    fn table(entries: &[(&str, &str)], opts: BuildOptions) -> Reader<MemFile> {
        let owned: Vec<(Vec<u8>, Vec<u8>)> = entries
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        let built = TableFixture::build(&owned, opts);
        Reader::open(MemFile(built.bytes), Options::default()).unwrap()
    }

    #[test]
    fn empty_table_is_not_found_and_scans_empty() {
        let reader = table(&[], BuildOptions::default());
        assert_eq!(reader.get(b"anything").unwrap_err().code, StatusCode::NotFound);

        let mut it = reader.find(b"");
        assert!(!it.next());
        it.close().unwrap();
    }

    #[test]
    fn single_entry_round_trips() {
        let reader = table(&[("k", "v")], BuildOptions::default());
        assert_eq!(reader.get(b"k").unwrap(), b"v");
        assert_eq!(reader.get(b"z").unwrap_err().code, StatusCode::NotFound);
        assert_eq!(reader.get(b"a").unwrap_err().code, StatusCode::NotFound);
    }

    #[test]
    fn multi_block_table_round_trips() {
        let entries: Vec<(String, String)> = (0..10_000)
            .map(|i| {
                let k = format!("k{i:05}");
                let v: String = k.chars().rev().collect();
                (k, v)
            })
            .collect();
        let owned: Vec<(Vec<u8>, Vec<u8>)> = entries
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        let built = TableFixture::build(
            &owned,
            BuildOptions {
                block_size: 4096,
                restart_interval: 16,
                compress: false,
            },
        );
        assert!(built.data_block_handles.len() > 1, "fixture should span multiple blocks");

        let reader = Reader::open(MemFile(built.bytes), Options::default()).unwrap();

        for i in [0usize, 1, 4999, 9999] {
            let (k, v) = &entries[i];
            assert_eq!(reader.get(k.as_bytes()).unwrap(), v.as_bytes());
        }
        assert_eq!(
            reader.get(b"not-a-key").unwrap_err().code,
            StatusCode::NotFound
        );

        let mut it = reader.find(b"");
        let mut count = 0;
        while it.next() {
            count += 1;
        }
        it.close().unwrap();
        assert_eq!(count, entries.len());
    }

    #[test]
    fn seek_lands_in_the_next_block_when_key_falls_between() {
        let entries: Vec<(String, String)> = (0..50)
            .map(|i| (format!("k{i:05}"), "v".to_string()))
            .collect();
        let owned: Vec<(Vec<u8>, Vec<u8>)> = entries
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        // A block size of 1 forces every entry into its own data block, so
        // any "between two keys" target necessarily crosses a block
        // boundary.
        let built = TableFixture::build(
            &owned,
            BuildOptions {
                block_size: 1,
                restart_interval: 1,
                compress: false,
            },
        );
        assert_eq!(built.data_block_handles.len(), entries.len());

        let reader = Reader::open(MemFile(built.bytes), Options::default()).unwrap();
        // "k00005x" sorts strictly between "k00005" and "k00006".
        let mut it = reader.find(b"k00005x");
        assert!(it.next());
        assert_eq!(it.key(), b"k00006");
        it.close().unwrap();
    }

    #[test]
    fn corrupted_checksum_is_detected() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())];
        let built = TableFixture::build(&entries, BuildOptions::default());
        let mut bytes = built.bytes;
        let handle = built.data_block_handles[0];
        // Flip a byte inside the first data block's body.
        let idx = handle.offset as usize;
        bytes[idx] ^= 0xff;

        let options = Options {
            verify_checksums: true,
            ..Options::default()
        };
        let reader = Reader::open(MemFile(bytes), options).unwrap();
        let err = reader.get(b"a").unwrap_err();
        assert_eq!(err.code, StatusCode::Corruption);
    }

    #[test]
    fn unknown_compression_type_is_detected() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())];
        let built = TableFixture::build(&entries, BuildOptions::default());
        let mut bytes = built.bytes;
        let handle = built.data_block_handles[0];
        let type_byte_idx = handle.offset as usize + handle.length as usize;
        bytes[type_byte_idx] = 0x02;
        // Recompute the checksum over the now-rewritten type byte so this
        // test isolates the compression-type check from the checksum check.
        let checksum_input = &bytes[handle.offset as usize..type_byte_idx + 1];
        let checksum = crate::crc::mask(crate::crc::crc32c(checksum_input));
        bytes[type_byte_idx + 1..type_byte_idx + 5].copy_from_slice(&checksum.to_le_bytes());

        let options = Options {
            verify_checksums: true,
            ..Options::default()
        };
        let reader = Reader::open(MemFile(bytes), options).unwrap();
        let err = reader.get(b"a").unwrap_err();
        assert_eq!(err.code, StatusCode::Corruption);
    }

    #[test]
    fn close_after_clean_iteration_is_ok() {
        let reader = table(&[("a", "1"), ("b", "2")], BuildOptions::default());
        let mut it = reader.find(b"");
        while it.next() {}
        assert!(it.close().is_ok());
    }

    #[test]
    fn fill_cache_false_skips_caching_the_block() {
        use crate::cache::{BlockCache as _, CacheKey, LruBlockCache};
        use crate::options::ReadOptions;

        let owned: Vec<(Vec<u8>, Vec<u8>)> = vec![(b"k".to_vec(), b"v".to_vec())];
        let built = TableFixture::build(&owned, BuildOptions::default());
        let data_handle = built.data_block_handles[0];

        let cache = Arc::new(LruBlockCache::new(8));
        let cache_handle: Arc<dyn crate::cache::BlockCache> = cache.clone();
        let options = Options {
            cache: Some(cache_handle),
            ..Options::default()
        };
        let reader = Reader::open(MemFile(built.bytes), options).unwrap();

        let no_fill = ReadOptions {
            fill_cache: false,
            ..ReadOptions::default()
        };
        assert_eq!(reader.get_opt(b"k", &no_fill).unwrap(), b"v");
        let key = CacheKey::new(reader.file_id, &data_handle);
        assert!(cache.get(&key).is_none());

        // The default (fill_cache: true) does populate the cache.
        assert_eq!(reader.get(b"k").unwrap(), b"v");
        assert!(cache.get(&key).is_some());
    }
}
