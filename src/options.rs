//! Knobs that govern how a table is opened and read.

use std::sync::{Arc, Mutex};

use crate::cache::BlockCache;
use crate::cmp::{Cmp, DefaultCmp};
use crate::infolog::Logger;

/// Options controlling how a `Reader` opens and reads a table.
#[derive(Clone)]
pub struct Options {
    /// Key ordering. Must match the order the table was built with.
    pub comparator: Arc<dyn Cmp>,
    /// Verify each block's CRC-32C before trusting its contents.
    pub verify_checksums: bool,
    /// Where to write diagnostic messages, if anywhere.
    pub logger: Option<Arc<Mutex<Logger>>>,
    /// An optional shared cache of decoded data blocks.
    pub cache: Option<Arc<dyn BlockCache>>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            comparator: Arc::new(DefaultCmp),
            verify_checksums: false,
            logger: None,
            cache: None,
        }
    }
}

/// Per-read overrides layered on top of `Options`.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Overrides `Options::verify_checksums` for this read when `Some`.
    pub verify_checksums: Option<bool>,
    /// Whether a served data block should be offered to the cache.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            verify_checksums: None,
            fill_cache: true,
        }
    }
}

impl Options {
    /// Resolves whether a given read should verify checksums, applying a
    /// `ReadOptions` override if present.
    pub fn verify_checksums_for(&self, read_opts: &ReadOptions) -> bool {
        read_opts.verify_checksums.unwrap_or(self.verify_checksums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_permissive() {
        let opts = Options::default();
        assert!(!opts.verify_checksums);
        assert!(opts.logger.is_none());
        assert!(opts.cache.is_none());
    }

    #[test]
    fn read_options_override_default() {
        let opts = Options::default();
        let ro = ReadOptions {
            verify_checksums: Some(true),
            fill_cache: true,
        };
        assert!(opts.verify_checksums_for(&ro));
    }

    #[test]
    fn read_options_fall_back_to_default() {
        let opts = Options {
            verify_checksums: true,
            ..Options::default()
        };
        let ro = ReadOptions::default();
        assert!(opts.verify_checksums_for(&ro));
    }

    #[test]
    fn read_options_default_fills_cache() {
        assert!(ReadOptions::default().fill_cache);
    }
}
