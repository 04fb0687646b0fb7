//! A block is a sequence of prefix-compressed key/value ENTRIES followed
//! by a RESTART array and a trailing `num_restarts` count.
//!
//! An ENTRY is three varints `shared, unshared, value_len`, then
//! `unshared` bytes of key suffix, then `value_len` bytes of value. The
//! full key is `prev_key[..shared] ++ suffix`. A RESTART is a fixed `u32`
//! byte offset of an entry whose `shared == 0`.

use std::cmp::Ordering;
use std::sync::Arc;

use integer_encoding::FixedInt;

use crate::cmp::Cmp;
use crate::error::{Result, Status};
use crate::varint::decode_varint64;

/// Raw bytes of a decoded block body (decompressed, checksum already
/// verified by the caller if requested).
pub type BlockContents = Vec<u8>;

/// A parsed block: the entry bytes plus where the restart array begins.
pub struct Block {
    data: BlockContents,
    restart_off: usize,
    num_restarts: usize,
}

impl Block {
    /// Parses a block body. Rejects blocks too short to hold a restart
    /// array, and blocks claiming zero restart points.
    pub fn new(data: BlockContents) -> Result<Block> {
        if data.len() < 4 {
            return Err(Status::corruption("block shorter than restart count field"));
        }
        let num_restarts = u32::decode_fixed(&data[data.len() - 4..]) as usize;
        if num_restarts == 0 {
            return Err(Status::corruption("block has zero restart points"));
        }
        let restart_section_len = 4 * (num_restarts + 1);
        if data.len() < restart_section_len {
            return Err(Status::corruption("restart array overruns block"));
        }
        let restart_off = data.len() - restart_section_len;
        Ok(Block {
            data,
            restart_off,
            num_restarts,
        })
    }

    fn restart_point(&self, idx: usize) -> usize {
        let off = self.restart_off + 4 * idx;
        u32::decode_fixed(&self.data[off..off + 4]) as usize
    }

    /// Decodes the entry at `offset`, extending `prev_key`'s shared
    /// prefix. Returns the full key, the value's `(start, len)` range,
    /// and the offset of the following entry.
    fn decode_entry(&self, offset: usize, prev_key: &[u8]) -> Result<(Vec<u8>, (usize, usize), usize)> {
        let window = &self.data[offset..self.restart_off];

        let (shared, n1) = decode_varint64(window);
        if n1 == 0 {
            return Err(Status::corruption("truncated entry header"));
        }
        let (unshared, n2) = decode_varint64(&window[n1..]);
        if n2 == 0 {
            return Err(Status::corruption("truncated entry header"));
        }
        let (value_len, n3) = decode_varint64(&window[n1 + n2..]);
        if n3 == 0 {
            return Err(Status::corruption("truncated entry header"));
        }

        let shared = shared as usize;
        let unshared = unshared as usize;
        let value_len = value_len as usize;

        if shared > prev_key.len() {
            return Err(Status::corruption(
                "entry shares more bytes than the current key has",
            ));
        }

        let key_start = offset + n1 + n2 + n3;
        let key_end = key_start + unshared;
        let value_end = key_end + value_len;
        if value_end > self.restart_off {
            return Err(Status::corruption("entry runs past the restart section"));
        }

        let mut key = Vec::with_capacity(shared + unshared);
        key.extend_from_slice(&prev_key[..shared]);
        key.extend_from_slice(&self.data[key_start..key_end]);

        Ok((key, (key_end, value_len), value_end))
    }

    /// Decodes the key at restart point `idx`. Restart-point entries
    /// always have `shared == 0`, so the decoded suffix is the whole key.
    fn restart_key(&self, idx: usize) -> Result<&[u8]> {
        let off = self.restart_point(idx);
        let window = &self.data[off..self.restart_off];

        let (shared, n1) = decode_varint64(window);
        if n1 == 0 || shared != 0 {
            return Err(Status::corruption("restart point is not a shared=0 entry"));
        }
        let (unshared, n2) = decode_varint64(&window[n1..]);
        if n2 == 0 {
            return Err(Status::corruption("truncated restart entry header"));
        }
        let (_value_len, n3) = decode_varint64(&window[n1 + n2..]);
        if n3 == 0 {
            return Err(Status::corruption("truncated restart entry header"));
        }

        let key_start = off + n1 + n2 + n3;
        let key_end = key_start + unshared as usize;
        if key_end > self.restart_off {
            return Err(Status::corruption("restart entry runs past its block"));
        }
        Ok(&self.data[key_start..key_end])
    }

    /// Binary-searches the restart array for the smallest index `i` whose
    /// key compares strictly greater than `target`.
    fn first_restart_greater(&self, cmp: &dyn Cmp, target: &[u8]) -> Result<usize> {
        let mut lo = 0usize;
        let mut hi = self.num_restarts;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let key = self.restart_key(mid)?;
            if cmp.cmp(key, target) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }

    /// Seeks to the first entry whose key compares `>=` `target`.
    ///
    /// The returned iterator is positioned so that the caller's *first*
    /// `next()` call reveals that matched entry, not the one after it —
    /// see the module-level note on `BlockIter`'s state machine. If no
    /// such entry exists, the iterator is already at end.
    pub fn seek(self: &Arc<Block>, cmp: &dyn Cmp, target: &[u8]) -> BlockIter {
        if self.restart_off == 0 {
            // No entries at all: the lone restart point at offset 0 is a
            // bookkeeping artifact of an empty block builder, not a real
            // entry to decode.
            return BlockIter {
                block: Arc::clone(self),
                next_offset: 0,
                key: Vec::new(),
                value: (0, 0),
                state: State::End,
                primed: false,
            };
        }
        let first_greater = match self.first_restart_greater(cmp, target) {
            Ok(i) => i,
            Err(e) => return BlockIter::errored(Arc::clone(self), e),
        };
        let restart_idx = if first_greater > 0 { first_greater - 1 } else { 0 };
        let offset = self.restart_point(restart_idx);

        let mut it = BlockIter {
            block: Arc::clone(self),
            next_offset: offset,
            key: Vec::new(),
            value: (0, 0),
            state: State::Start,
            primed: false,
        };

        loop {
            if !it.decode_and_advance() {
                // Hit the end of the block, or corruption: leave the
                // iterator in that terminal state as-is.
                return it;
            }
            if cmp.cmp(&it.key, target) != Ordering::Less {
                break;
            }
        }

        // Rewind to Start without discarding the decoded key/value, so the
        // external caller's next `next()` reveals this exact entry.
        it.state = State::Start;
        it.primed = true;
        it
    }
}

#[derive(Debug)]
enum State {
    Start,
    Valid,
    End,
    Errored(Status),
}

/// Forward iterator over a [`Block`]'s entries, produced by [`Block::seek`].
///
/// The current key is rebuilt in place on every `next()` call (prefix
/// compression means it shares memory with the previous entry); borrow it
/// via [`BlockIter::key`] but don't hold that borrow across a subsequent
/// `next()`.
pub struct BlockIter {
    block: Arc<Block>,
    next_offset: usize,
    key: Vec<u8>,
    value: (usize, usize),
    state: State,
    primed: bool,
}

impl BlockIter {
    fn errored(block: Arc<Block>, e: Status) -> BlockIter {
        BlockIter {
            block,
            next_offset: 0,
            key: Vec::new(),
            value: (0, 0),
            state: State::Errored(e),
            primed: false,
        }
    }

    fn decode_and_advance(&mut self) -> bool {
        if self.next_offset >= self.block.restart_off {
            self.state = State::End;
            return false;
        }
        match self.block.decode_entry(self.next_offset, &self.key) {
            Ok((key, value, next_offset)) => {
                self.key = key;
                self.value = value;
                self.next_offset = next_offset;
                self.state = State::Valid;
                true
            }
            Err(e) => {
                self.state = State::Errored(e);
                false
            }
        }
    }

    /// Advances the iterator. See the type-level docs for the
    /// start/valid/end/errored state machine.
    pub fn next(&mut self) -> bool {
        match self.state {
            State::End | State::Errored(_) => false,
            State::Start => {
                if self.primed {
                    self.state = State::Valid;
                    true
                } else {
                    self.decode_and_advance()
                }
            }
            State::Valid => self.decode_and_advance(),
        }
    }

    /// The current entry's key. Only meaningful when [`BlockIter::valid`].
    pub fn key(&self) -> &[u8] {
        debug_assert!(self.valid(), "key() called on a non-valid BlockIter");
        &self.key
    }

    /// The current entry's value. Only meaningful when [`BlockIter::valid`].
    pub fn value(&self) -> &[u8] {
        debug_assert!(self.valid(), "value() called on a non-valid BlockIter");
        let (start, len) = self.value;
        &self.block.data[start..start + len]
    }

    pub fn valid(&self) -> bool {
        matches!(self.state, State::Valid)
    }

    /// Releases the iterator, surfacing any error latched during iteration.
    pub fn close(self) -> Result<()> {
        match self.state {
            State::Errored(e) => Err(e),
            _ => Ok(()),
        }
    }

    pub(crate) fn error(&self) -> Option<Status> {
        match &self.state {
            State::Errored(e) => Some(e.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmp::DefaultCmp;
    use crate::test_support::BlockFixture;

    fn build(entries: &[(&str, &str)], restart_interval: usize) -> Arc<Block> {
        let fixture = BlockFixture::build(entries, restart_interval);
        Arc::new(Block::new(fixture).unwrap())
    }

    #[test]
    fn seek_finds_exact_and_lower_bound_matches() {
        let block = build(
            &[("abc", "1"), ("abd", "2"), ("bcd", "3"), ("bsr", "4")],
            2,
        );
        let cmp = DefaultCmp;

        let mut it = block.seek(&cmp, b"abd");
        assert!(!it.valid());
        assert!(it.next());
        assert_eq!(it.key(), b"abd");
        assert_eq!(it.value(), b"2");

        let mut it = block.seek(&cmp, b"abc5");
        assert!(it.next());
        assert_eq!(it.key(), b"bcd");
    }

    #[test]
    fn seek_past_last_key_is_end() {
        let block = build(&[("a", "1"), ("b", "2")], 2);
        let mut it = block.seek(&DefaultCmp, b"z");
        assert!(!it.next());
        assert!(!it.valid());
    }

    #[test]
    fn seek_empty_target_yields_first_entry() {
        let block = build(&[("a", "1"), ("b", "2")], 2);
        let mut it = block.seek(&DefaultCmp, b"");
        assert!(it.next());
        assert_eq!(it.key(), b"a");
    }

    #[test]
    fn full_scan_is_increasing_and_complete() {
        let entries: Vec<(String, String)> = (0..50).map(|i| (format!("k{i:04}"), i.to_string())).collect();
        let refs: Vec<(&str, &str)> = entries.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let block = build(&refs, 3);

        let mut it = block.seek(&DefaultCmp, b"");
        let mut seen = Vec::new();
        while it.next() {
            seen.push((it.key().to_vec(), it.value().to_vec()));
        }
        assert_eq!(seen.len(), refs.len());
        for w in seen.windows(2) {
            assert_eq!(DefaultCmp.cmp(&w[0].0, &w[1].0), Ordering::Less);
        }
        assert_eq!(seen[10].0, b"k0010");
    }

    #[test]
    fn zero_restarts_is_corruption() {
        let mut data = BlockFixture::build(&[], 16);
        assert_eq!(data.len(), 4);
        data[0..4].copy_from_slice(&0u32.to_le_bytes());
        assert!(Block::new(data).is_err());
    }
}
