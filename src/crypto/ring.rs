//! Hashing, HMAC and secure randomness backed by *ring*.

use alloc::boxed::Box;

use ring::rand::SecureRandom as _;

use crate::crypto;
use crate::crypto::{GetRandomFailed, SecureRandom};

/// A [`SecureRandom`] sourced from the platform via *ring*.
#[derive(Debug)]
pub struct Ring;

/// The default source of secure random bytes.
pub static SECURE_RANDOM: &dyn SecureRandom = &Ring;

impl SecureRandom for Ring {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed> {
        ring::rand::SystemRandom::new()
            .fill(buf)
            .map_err(|_| GetRandomFailed)
    }
}

pub(crate) static SHA256: Hash = Hash(&ring::digest::SHA256);
pub(crate) static SHA384: Hash = Hash(&ring::digest::SHA384);

pub(crate) struct Hash(&'static ring::digest::Algorithm);

impl crypto::hash::Hash for Hash {
    fn start(&self) -> Box<dyn crypto::hash::Context> {
        Box::new(Context(ring::digest::Context::new(self.0)))
    }

    fn hash(&self, data: &[u8]) -> crypto::hash::Output {
        let mut ctx = ring::digest::Context::new(self.0);
        ctx.update(data);
        convert(ctx.finish())
    }

    fn output_len(&self) -> usize {
        self.0.output_len()
    }
}

struct Context(ring::digest::Context);

impl crypto::hash::Context for Context {
    fn fork_finish(&self) -> crypto::hash::Output {
        convert(self.0.clone().finish())
    }

    fn fork(&self) -> Box<dyn crypto::hash::Context> {
        Box::new(Self(self.0.clone()))
    }

    fn finish(self: Box<Self>) -> crypto::hash::Output {
        convert(self.0.finish())
    }

    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }
}

fn convert(val: ring::digest::Digest) -> crypto::hash::Output {
    crypto::hash::Output::new(val.as_ref())
}

pub(crate) static HMAC_SHA256: Hmac = Hmac(&ring::hmac::HMAC_SHA256);
pub(crate) static HMAC_SHA384: Hmac = Hmac(&ring::hmac::HMAC_SHA384);

pub(crate) struct Hmac(&'static ring::hmac::Algorithm);

impl crypto::hmac::Hmac for Hmac {
    fn with_key(&self, key: &[u8]) -> Box<dyn crypto::hmac::Key> {
        Box::new(Key(ring::hmac::Key::new(*self.0, key)))
    }

    fn hash_output_len(&self) -> usize {
        self.0.digest_algorithm().output_len()
    }
}

struct Key(ring::hmac::Key);

impl crypto::hmac::Key for Key {
    fn sign_concat(&self, first: &[u8], middle: &[&[u8]], last: &[u8]) -> crypto::hmac::Tag {
        let mut ctx = ring::hmac::Context::with_key(&self.0);
        ctx.update(first);
        for d in middle {
            ctx.update(d);
        }
        ctx.update(last);
        crypto::hmac::Tag::new(ctx.sign().as_ref())
    }

    fn tag_len(&self) -> usize {
        self.0
            .algorithm()
            .digest_algorithm()
            .output_len()
    }
}

/// One-shot SHA-256, as used for naming key buffers in the key store.
pub(crate) fn sha256(data: &[u8]) -> crypto::hash::Output {
    use crypto::hash::Hash as _;
    SHA256.hash(data)
}
