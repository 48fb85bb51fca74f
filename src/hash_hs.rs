use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::crypto::hash;
use crate::msgs::enums::HandshakeType;

/// Early stage buffering of handshake payloads.
///
/// Before the hash algorithm to use for the transcript is known, messages
/// are kept verbatim.  The ECH context swap also happens at this stage: the
/// buffered outer ClientHello is replaced wholesale by the reconstructed
/// inner one before any hashing has been committed to.
#[derive(Clone, Default)]
pub struct HandshakeHashBuffer {
    buffer: Vec<u8>,
}

impl HandshakeHashBuffer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Buffer a handshake message (or any raw transcript bytes).
    pub fn add_raw(&mut self, buf: &[u8]) {
        self.buffer.extend_from_slice(buf);
    }

    /// The bytes buffered so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Replace the ClientHello at the front of the buffer with
    /// `inner_message`, keeping whatever follows it.
    ///
    /// If the buffer starts with a ClientHello whose length is plausible,
    /// only that message is replaced; a ServerHello already buffered after
    /// it survives.  Otherwise the whole buffer is restarted from the inner
    /// message.
    pub fn replace_client_hello(&mut self, inner_message: &[u8]) {
        let outer_len = match self.buffer.first() {
            Some(&typ) if typ == u8::from(HandshakeType::ClientHello) && self.buffer.len() >= 4 => {
                let len = u32::from_be_bytes([0, self.buffer[1], self.buffer[2], self.buffer[3]]);
                4 + len as usize
            }
            _ => self.buffer.len(),
        };

        if outer_len <= self.buffer.len() {
            let mut new_buffer = Vec::with_capacity(inner_message.len() + self.buffer.len() - outer_len);
            new_buffer.extend_from_slice(inner_message);
            new_buffer.extend_from_slice(&self.buffer[outer_len..]);
            self.buffer = new_buffer;
        } else {
            self.buffer = inner_message.to_vec();
        }
    }

    /// Get the hash value if we were to hash `extra` too.
    pub fn hash_given(&self, provider: &'static dyn hash::Hash, extra: &[u8]) -> hash::Output {
        let mut ctx = provider.start();
        ctx.update(&self.buffer);
        ctx.update(extra);
        ctx.finish()
    }

    /// We now know what hash function the transcript will use.
    pub fn start_hash(self, provider: &'static dyn hash::Hash) -> HandshakeHash {
        let mut ctx = provider.start();
        ctx.update(&self.buffer);
        HandshakeHash { provider, ctx }
    }
}

/// A running hash of the handshake transcript.
pub struct HandshakeHash {
    provider: &'static dyn hash::Hash,
    ctx: Box<dyn hash::Context>,
}

impl HandshakeHash {
    /// Hash additional transcript bytes.
    pub fn update_raw(&mut self, buf: &[u8]) {
        self.ctx.update(buf);
    }

    /// Get the current transcript hash.
    pub fn current_hash(&self) -> hash::Output {
        self.ctx.fork_finish()
    }

    /// Fork the current state into an independent transcript.
    pub fn fork(&self) -> Self {
        Self {
            provider: self.provider,
            ctx: self.ctx.fork(),
        }
    }

    /// The length of this transcript's hash output.
    pub fn output_len(&self) -> usize {
        self.provider.output_len()
    }
}
