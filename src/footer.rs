use crate::blockhandle::BlockHandle;
use crate::error::{Result, Status};

/// Size in bytes of the trailing footer: two block handles (up to 20
/// bytes each), zero padding, and the 8-byte magic number. Format-fixed,
/// inherited from the source format.
pub const FOOTER_LEN: usize = 48;

const MAGIC: [u8; 8] = [0x57, 0xfb, 0x80, 0x8b, 0x24, 0x75, 0x47, 0xdb];

/// The fixed-size trailer at the end of every table file: pointers to the
/// metaindex and index blocks, plus the magic constant that identifies
/// the file as a table.
#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub metaindex: BlockHandle,
    pub index: BlockHandle,
}

impl Footer {
    /// Decodes a footer from exactly `FOOTER_LEN` bytes.
    pub fn decode(buf: &[u8]) -> Result<Footer> {
        debug_assert_eq!(buf.len(), FOOTER_LEN);
        if buf[FOOTER_LEN - 8..] != MAGIC {
            return Err(Status::corruption("bad table footer magic"));
        }

        let (metaindex, n1) = BlockHandle::decode(buf)?;
        let (index, _) = BlockHandle::decode(&buf[n1..])?;

        if metaindex.length == 0 || index.length == 0 {
            return Err(Status::corruption(
                "zero-length block handle in table footer",
            ));
        }

        Ok(Footer { metaindex, index })
    }

    #[cfg(test)]
    pub(crate) fn encode(&self) -> [u8; FOOTER_LEN] {
        let mut body = Vec::with_capacity(FOOTER_LEN - 8);
        self.metaindex.encode(&mut body);
        self.index.encode(&mut body);
        body.resize(FOOTER_LEN - 8, 0);

        let mut out = [0u8; FOOTER_LEN];
        out[..FOOTER_LEN - 8].copy_from_slice(&body);
        out[FOOTER_LEN - 8..].copy_from_slice(&MAGIC);
        out
    }
}
