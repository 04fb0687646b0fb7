//! A read-only table is a proper subset of a read-write key/value store:
//! splitting the capability into traits lets `Reader` expose exactly what
//! it can do, instead of implementing a wider `set`/`delete` surface that
//! would only ever return an error.

use crate::error::{Result, Status};

pub trait KvReader {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;
}

/// A store capable of mutation. Anything implementing this also
/// implements `KvReader`.
pub trait KvWriter: KvReader {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&mut self, key: &[u8]) -> Result<()>;
}

/// Adapts any `KvReader` to the wider `KvWriter` shape, so code written
/// against a read-write store can run unmodified against a read-only
/// table — every mutation simply reports `StatusCode::ReadOnly`.
pub struct ReadOnlyHandle<R: KvReader>(pub R);

impl<R: KvReader> KvReader for ReadOnlyHandle<R> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.0.get(key)
    }
}

impl<R: KvReader> KvWriter for ReadOnlyHandle<R> {
    fn set(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(Status::read_only())
    }

    fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(Status::read_only())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;

    struct FakeReader;
    impl KvReader for FakeReader {
        fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
            if key == b"k" {
                Ok(b"v".to_vec())
            } else {
                Err(Status::not_found("no such key"))
            }
        }
    }

    #[test]
    fn reads_pass_through() {
        let handle = ReadOnlyHandle(FakeReader);
        assert_eq!(handle.get(b"k").unwrap(), b"v");
    }

    #[test]
    fn writes_are_rejected() {
        let mut handle = ReadOnlyHandle(FakeReader);
        let err = handle.set(b"k", b"v2").unwrap_err();
        assert_eq!(err.code, StatusCode::ReadOnly);
        let err = handle.delete(b"k").unwrap_err();
        assert_eq!(err.code, StatusCode::ReadOnly);
    }
}
