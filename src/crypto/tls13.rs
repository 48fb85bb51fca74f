use alloc::vec::Vec;

use crate::crypto::hmac;
use crate::msgs::codec::Codec;

/// `HKDF-Expand(PRK, info, L)` implemented via [`hmac::Key`].
///
/// The PRK is the key material the `hmac::Key` was built with.  `info` is a
/// slice of byte slices, processed sequentially.  `L` is `output.len()`,
/// which must not exceed `255 * HashLen`.
pub(crate) struct HkdfExpander<'a>(&'a dyn hmac::Key);

impl<'a> HkdfExpander<'a> {
    pub(crate) fn new(key: &'a dyn hmac::Key) -> Self {
        Self(key)
    }

    pub(crate) fn expand(&self, info: &[&[u8]], output: &mut [u8]) {
        debug_assert!(output.len() <= 255 * self.0.tag_len());
        let mut term = hmac::Tag::new(b"");

        for (n, chunk) in output
            .chunks_mut(self.0.tag_len())
            .enumerate()
        {
            term = self
                .0
                .sign_concat(term.as_ref(), info, &[(n + 1) as u8]);
            chunk.copy_from_slice(&term.as_ref()[..chunk.len()]);
        }
    }
}

/// `HKDF-Expand-Label` from [RFC 8446 Section 7.1], with `secret` used
/// directly as the expand PRK.
///
/// [RFC 8446 Section 7.1]: <https://datatracker.ietf.org/doc/html/rfc8446#section-7.1>
pub(crate) fn hkdf_expand_label(
    hmac_provider: &dyn hmac::Hmac,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    output: &mut [u8],
) {
    const LABEL_PREFIX: &[u8] = b"tls13 ";

    let key = hmac_provider.with_key(secret);
    let mut hkdf_label = Vec::with_capacity(2 + 1 + LABEL_PREFIX.len() + label.len() + 1 + context.len());
    (output.len() as u16).encode(&mut hkdf_label);
    ((label.len() + LABEL_PREFIX.len()) as u8).encode(&mut hkdf_label);
    hkdf_label.extend_from_slice(LABEL_PREFIX);
    hkdf_label.extend_from_slice(label);
    (context.len() as u8).encode(&mut hkdf_label);
    hkdf_label.extend_from_slice(context);

    HkdfExpander::new(key.as_ref()).expand(&[&hkdf_label], output);
}
