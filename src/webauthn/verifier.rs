//! # Credential Verifier
//!
//! The one signature check both ceremonies share. Pure: no state, no I/O, same
//! answer for the same input.
//!
//! - ES256: ECDSA P-256 over SHA-256, signature ASN.1 DER encoded
//! - RS256: RSASSA-PKCS1-v1_5 over SHA-256

use crate::codec::{CoseAlgorithm, CoseKey, CosePublicKey};
use p256::ecdsa::signature::Verifier as _;
use sha2::Sha256;

/// Verify `signature` over `message` with `public_key`.
///
/// `algorithm` is the algorithm the caller expects; a key bound to a different
/// algorithm never verifies.
pub fn verify_signature(
    public_key: &CoseKey,
    algorithm: CoseAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> bool {
    // The key is bound to the algorithm it was registered with
    if public_key.algorithm != algorithm {
        return false;
    }

    // Dispatch on key shape and algorithm together
    match (&public_key.key, algorithm) {
        (CosePublicKey::Ec2P256 { .. }, CoseAlgorithm::Es256) => {
            verify_es256(public_key, message, signature)
        }
        (CosePublicKey::Rsa { n, e }, CoseAlgorithm::Rs256) => {
            verify_rs256(n, e, message, signature)
        }
        _ => false,
    }
}

fn verify_es256(public_key: &CoseKey, message: &[u8], signature: &[u8]) -> bool {
    // Uncompressed point 0x04 || x || y; rejects points off the curve
    let Some(sec1) = public_key.sec1_bytes() else {
        return false;
    };
    let Ok(key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1) else {
        return false;
    };

    // WebAuthn ES256 signatures are ASN.1 DER, not raw r || s
    let Ok(sig) = p256::ecdsa::Signature::from_der(signature) else {
        return false;
    };
    key.verify(message, &sig).is_ok()
}

fn verify_rs256(n: &[u8], e: &[u8], message: &[u8], signature: &[u8]) -> bool {
    // Rebuild the public key from big-endian modulus and exponent
    let Ok(key) = rsa::RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(n),
        rsa::BigUint::from_bytes_be(e),
    ) else {
        return false;
    };
    // PKCS#1 v1.5 with SHA-256 (the DigestInfo prefix is added by the crate)
    let key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key);
    let Ok(sig) = rsa::pkcs1v15::Signature::try_from(signature) else {
        return false;
    };
    key.verify(message, &sig).is_ok()
}
