use alloc::boxed::Box;

/// One cryptographic hash function.
///
/// The engine hashes two kinds of things: handshake transcripts (which
/// grow message by message, so need the incremental [`Hash::start()`]
/// path) and one-shot inputs like key-store buffer digests
/// ([`Hash::hash()`]).
pub trait Hash: Send + Sync {
    /// Begin hashing incrementally.
    fn start(&self) -> Box<dyn Context>;

    /// Hash `data` in one call.
    fn hash(&self, data: &[u8]) -> Output;

    /// How many bytes this function outputs.
    fn output_len(&self) -> usize;
}

/// A hash result, held inline.
#[derive(Clone)]
pub struct Output {
    buf: [u8; Self::MAX_LEN],
    used: usize,
}

impl Output {
    /// Copy `bytes` (at most [`Output::MAX_LEN`] of them) into an output.
    pub fn new(bytes: &[u8]) -> Self {
        let mut output = Self {
            buf: [0u8; Self::MAX_LEN],
            used: bytes.len(),
        };
        debug_assert!(bytes.len() <= Self::MAX_LEN);
        output.buf[..bytes.len()].copy_from_slice(bytes);
        output
    }

    /// Enough room for any supported hash, up to SHA-512.
    pub const MAX_LEN: usize = 64;
}

impl AsRef<[u8]> for Output {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.used]
    }
}

/// An in-progress incremental hash.
///
/// Transcript handling needs to take a hash mid-handshake and keep
/// going afterwards (the confirmation transcript is a snapshot of a
/// live transcript), hence the forking operations.
pub trait Context: Send + Sync {
    /// Emit the hash of everything fed in so far, without disturbing the
    /// computation: more input may still be added afterwards.
    fn fork_finish(&self) -> Output;

    /// Duplicate the computation, yielding an independent continuation
    /// with the same input prefix.
    fn fork(&self) -> Box<dyn Context>;

    /// Consume the computation and emit its hash.
    fn finish(self: Box<Self>) -> Output;

    /// Feed `data` into the computation.
    fn update(&mut self, data: &[u8]);
}
