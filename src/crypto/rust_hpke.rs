//! HPKE provider backed by the pure-rust *hpke* crate.
//!
//! One static per supported suite, collected in [`ALL_SUPPORTED_SUITES`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;

use hpke::aead::{Aead, AeadCtxR, AeadCtxS, AesGcm128, AesGcm256, ChaCha20Poly1305};
use hpke::kdf::{HkdfSha256, Kdf};
use hpke::kem::{DhP256HkdfSha256, Kem, X25519HkdfSha256};
use hpke::{Deserializable, OpModeR, OpModeS, Serializable};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::crypto::hpke::{
    EncapsulatedSecret, Hpke, HpkeOpener, HpkePrivateKey, HpkePublicKey, HpkeSealer, HpkeSuite,
};
use crate::error::{EncryptedClientHelloError, Error};
use crate::msgs::enums::{HpkeAead, HpkeKdf, HpkeKem, HpkeSymmetricCipherSuite};

/// The HPKE suites supported by this provider.
///
/// This covers the ciphersuite profile required for ECH (DHKEM(X25519,
/// HKDF-SHA256) with HKDF-SHA256/AES-128-GCM) and the other suites
/// commonly published in the wild.
pub static ALL_SUPPORTED_SUITES: &[&dyn Hpke] = &[
    DH_KEM_X25519_HKDF_SHA256_AES_128,
    DH_KEM_X25519_HKDF_SHA256_AES_256,
    DH_KEM_X25519_HKDF_SHA256_CHACHA20_POLY1305,
    DH_KEM_P256_HKDF_SHA256_AES_128,
    DH_KEM_P256_HKDF_SHA256_AES_256,
    DH_KEM_P256_HKDF_SHA256_CHACHA20_POLY1305,
];

/// HPKE suite using DHKEM(X25519, HKDF-SHA256), HKDF-SHA256 and AES-128-GCM.
pub static DH_KEM_X25519_HKDF_SHA256_AES_128: &HpkeRustCrypto<
    X25519HkdfSha256,
    HkdfSha256,
    AesGcm128,
> = &HpkeRustCrypto {
    suite: HpkeSuite {
        kem: HpkeKem::DHKEM_X25519_HKDF_SHA256,
        sym: HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::AES_128_GCM,
        },
    },
    _phantom: PhantomData,
};

/// HPKE suite using DHKEM(X25519, HKDF-SHA256), HKDF-SHA256 and AES-256-GCM.
pub static DH_KEM_X25519_HKDF_SHA256_AES_256: &HpkeRustCrypto<
    X25519HkdfSha256,
    HkdfSha256,
    AesGcm256,
> = &HpkeRustCrypto {
    suite: HpkeSuite {
        kem: HpkeKem::DHKEM_X25519_HKDF_SHA256,
        sym: HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::AES_256_GCM,
        },
    },
    _phantom: PhantomData,
};

/// HPKE suite using DHKEM(X25519, HKDF-SHA256), HKDF-SHA256 and CHACHA20-POLY-1305.
pub static DH_KEM_X25519_HKDF_SHA256_CHACHA20_POLY1305: &HpkeRustCrypto<
    X25519HkdfSha256,
    HkdfSha256,
    ChaCha20Poly1305,
> = &HpkeRustCrypto {
    suite: HpkeSuite {
        kem: HpkeKem::DHKEM_X25519_HKDF_SHA256,
        sym: HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::CHACHA20_POLY_1305,
        },
    },
    _phantom: PhantomData,
};

/// HPKE suite using DHKEM(P-256, HKDF-SHA256), HKDF-SHA256 and AES-128-GCM.
pub static DH_KEM_P256_HKDF_SHA256_AES_128: &HpkeRustCrypto<
    DhP256HkdfSha256,
    HkdfSha256,
    AesGcm128,
> = &HpkeRustCrypto {
    suite: HpkeSuite {
        kem: HpkeKem::DHKEM_P256_HKDF_SHA256,
        sym: HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::AES_128_GCM,
        },
    },
    _phantom: PhantomData,
};

/// HPKE suite using DHKEM(P-256, HKDF-SHA256), HKDF-SHA256 and AES-256-GCM.
pub static DH_KEM_P256_HKDF_SHA256_AES_256: &HpkeRustCrypto<
    DhP256HkdfSha256,
    HkdfSha256,
    AesGcm256,
> = &HpkeRustCrypto {
    suite: HpkeSuite {
        kem: HpkeKem::DHKEM_P256_HKDF_SHA256,
        sym: HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::AES_256_GCM,
        },
    },
    _phantom: PhantomData,
};

/// HPKE suite using DHKEM(P-256, HKDF-SHA256), HKDF-SHA256 and CHACHA20-POLY-1305.
pub static DH_KEM_P256_HKDF_SHA256_CHACHA20_POLY1305: &HpkeRustCrypto<
    DhP256HkdfSha256,
    HkdfSha256,
    ChaCha20Poly1305,
> = &HpkeRustCrypto {
    suite: HpkeSuite {
        kem: HpkeKem::DHKEM_P256_HKDF_SHA256,
        sym: HpkeSymmetricCipherSuite {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::CHACHA20_POLY_1305,
        },
    },
    _phantom: PhantomData,
};

/// Find a supported instance matching the given KEM and symmetric suite.
pub fn suite_for(
    kem: HpkeKem,
    sym: HpkeSymmetricCipherSuite,
) -> Option<&'static dyn Hpke> {
    ALL_SUPPORTED_SUITES
        .iter()
        .find(|hpke| {
            let suite = hpke.suite();
            suite.kem == kem && suite.sym == sym
        })
        .copied()
}

/// An [`Hpke`] implemented with the *hpke* crate, for one fixed choice of
/// KEM, KDF and AEAD.
pub struct HpkeRustCrypto<KemT, KdfT, AeadT> {
    suite: HpkeSuite,
    _phantom: PhantomData<fn() -> (KemT, KdfT, AeadT)>,
}

impl<KemT, KdfT, AeadT> Hpke for HpkeRustCrypto<KemT, KdfT, AeadT>
where
    KemT: Kem + 'static + Send + Sync,
    KdfT: Kdf + 'static,
    AeadT: Aead + 'static,
    <AeadT as Aead>::AeadImpl: Send + Sync,
{
    fn setup_sealer(
        &self,
        info: &[u8],
        pub_key: &HpkePublicKey,
    ) -> Result<(EncapsulatedSecret, Box<dyn HpkeSealer>), Error> {
        let pub_key = KemT::PublicKey::from_bytes(&pub_key.0).map_err(hpke_error)?;
        let mut csprng = StdRng::from_entropy();
        let (enc, context) =
            hpke::setup_sender::<AeadT, KdfT, KemT, _>(&OpModeS::Base, &pub_key, info, &mut csprng)
                .map_err(hpke_error)?;

        Ok((
            EncapsulatedSecret(enc.to_bytes().to_vec()),
            Box::new(RustCryptoSealer::<KemT, KdfT, AeadT> { context }),
        ))
    }

    fn setup_opener(
        &self,
        enc: &EncapsulatedSecret,
        info: &[u8],
        secret_key: &HpkePrivateKey,
    ) -> Result<Box<dyn HpkeOpener>, Error> {
        let secret_key = KemT::PrivateKey::from_bytes(secret_key.secret_bytes())
            .map_err(hpke_error)?;
        let enc = KemT::EncappedKey::from_bytes(&enc.0).map_err(hpke_error)?;
        let context =
            hpke::setup_receiver::<AeadT, KdfT, KemT>(&OpModeR::Base, &secret_key, &enc, info)
                .map_err(hpke_error)?;

        Ok(Box::new(RustCryptoOpener::<KemT, KdfT, AeadT> { context }))
    }

    fn generate_key_pair(&self) -> Result<(HpkePublicKey, HpkePrivateKey), Error> {
        let mut csprng = StdRng::from_entropy();
        let (private_key, public_key) = KemT::gen_keypair(&mut csprng);
        Ok((
            HpkePublicKey(public_key.to_bytes().to_vec()),
            HpkePrivateKey::from(private_key.to_bytes().to_vec()),
        ))
    }

    fn suite(&self) -> HpkeSuite {
        self.suite
    }
}

impl<KemT, KdfT, AeadT> Debug for HpkeRustCrypto<KemT, KdfT, AeadT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.suite.fmt(f)
    }
}

struct RustCryptoSealer<KemT: Kem, KdfT: Kdf, AeadT: Aead> {
    context: AeadCtxS<AeadT, KdfT, KemT>,
}

impl<KemT, KdfT, AeadT> HpkeSealer for RustCryptoSealer<KemT, KdfT, AeadT>
where
    KemT: Kem + 'static + Send + Sync,
    KdfT: Kdf + 'static,
    AeadT: Aead + 'static,
    <AeadT as Aead>::AeadImpl: Send + Sync,
{
    fn seal(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.context
            .seal(plaintext, aad)
            .map_err(hpke_error)
    }
}

impl<KemT: Kem, KdfT: Kdf, AeadT: Aead> Debug for RustCryptoSealer<KemT, KdfT, AeadT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustCryptoSealer").finish()
    }
}

struct RustCryptoOpener<KemT: Kem, KdfT: Kdf, AeadT: Aead> {
    context: AeadCtxR<AeadT, KdfT, KemT>,
}

impl<KemT, KdfT, AeadT> HpkeOpener for RustCryptoOpener<KemT, KdfT, AeadT>
where
    KemT: Kem + 'static + Send + Sync,
    KdfT: Kdf + 'static,
    AeadT: Aead + 'static,
    <AeadT as Aead>::AeadImpl: Send + Sync,
{
    fn open(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        self.context
            .open(ciphertext, aad)
            .map_err(hpke_error)
    }
}

impl<KemT: Kem, KdfT: Kdf, AeadT: Aead> Debug for RustCryptoOpener<KemT, KdfT, AeadT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustCryptoOpener").finish()
    }
}

fn hpke_error(_: hpke::HpkeError) -> Error {
    EncryptedClientHelloError::HpkeFailure.into()
}
