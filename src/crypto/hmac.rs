use alloc::boxed::Box;

/// HMAC for one fixed hash function.
///
/// The accept-confirmation derivation runs HKDF-Expand over this
/// interface, keyed with the TLS 1.3 handshake secret.  The hash function
/// is chosen by whichever object implements the trait; there is one
/// implementation per hash in [`super::ring`].
pub trait Hmac: Send + Sync {
    /// Schedule `key` for repeated signing.
    fn with_key(&self, key: &[u8]) -> Box<dyn Key>;

    /// The output length of the underlying hash function, which is also
    /// the tag length.
    fn hash_output_len(&self) -> usize;
}

/// An HMAC output, held inline.
///
/// HKDF-Expand feeds each tag back into the next block's computation, so
/// tags are plain values rather than borrowed state.
#[derive(Clone)]
pub struct Tag {
    buf: [u8; Self::MAX_LEN],
    used: usize,
}

impl Tag {
    /// Copy `bytes` (at most [`Tag::MAX_LEN`] of them) into a tag.
    pub fn new(bytes: &[u8]) -> Self {
        let mut tag = Self {
            buf: [0u8; Self::MAX_LEN],
            used: bytes.len(),
        };
        tag.buf[..bytes.len()].copy_from_slice(bytes);
        tag
    }

    /// Enough room for any supported hash, up to SHA-512.
    pub const MAX_LEN: usize = 64;
}

impl AsRef<[u8]> for Tag {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.used]
    }
}

/// A scheduled HMAC key.
///
/// Which hash it signs with was fixed by the [`Hmac`] that built it.
pub trait Key: Send + Sync {
    /// Sign `data`, given as a sequence of chunks.
    fn sign(&self, data: &[&[u8]]) -> Tag {
        self.sign_concat(&[], data, &[])
    }

    /// Sign the concatenation `first || middle[0] || .. || last`.
    ///
    /// This shape is what HKDF-Expand wants: the previous block, the
    /// info chunks, and the block counter octet, without assembling a
    /// contiguous buffer.
    fn sign_concat(&self, first: &[u8], middle: &[&[u8]], last: &[u8]) -> Tag;

    /// The length of tags this key produces.
    fn tag_len(&self) -> usize;
}
