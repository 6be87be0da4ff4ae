//! COSE_Key public keys (RFC 9052 / RFC 9053 labels).
//!
//! Only the two algorithms the relying party offers are understood. Anything
//! else fails to decode instead of being carried along as an opaque blob.

use super::{cbor_exact, cbor_map, take_entry, MapKey};
use crate::error::DecodeError;
use ciborium::value::Value;
use rsa::traits::PublicKeyParts;
use std::fmt;
use std::str::FromStr;

const LABEL_KTY: i128 = 1;
const LABEL_ALG: i128 = 3;
const LABEL_CRV_OR_N: i128 = -1;
const LABEL_X_OR_E: i128 = -2;
const LABEL_Y: i128 = -3;

const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;
const CRV_P256: i128 = 1;

/// Most entries a COSE_Key may carry; ES256 needs 5, RS256 needs 4.
const MAX_KEY_ENTRIES: usize = 16;

/// Smallest RSA modulus accepted for RS256 credentials.
const MIN_RSA_BITS: usize = 2048;

/// Signature algorithms a credential may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    /// ECDSA over P-256 with SHA-256 (COSE -7)
    Es256,
    /// RSASSA-PKCS1-v1_5 with SHA-256 (COSE -257)
    Rs256,
}

impl CoseAlgorithm {
    pub fn id(self) -> i64 {
        match self {
            CoseAlgorithm::Es256 => -7,
            CoseAlgorithm::Rs256 => -257,
        }
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = DecodeError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            -7 => Ok(CoseAlgorithm::Es256),
            -257 => Ok(CoseAlgorithm::Rs256),
            other => Err(DecodeError::UnsupportedAlgorithm(other)),
        }
    }
}

impl fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoseAlgorithm::Es256 => f.write_str("ES256"),
            CoseAlgorithm::Rs256 => f.write_str("RS256"),
        }
    }
}

/// Accepts the JOSE name (`ES256`) or the COSE identifier (`-7`).
impl FromStr for CoseAlgorithm {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ES256") {
            return Ok(CoseAlgorithm::Es256);
        }
        if s.eq_ignore_ascii_case("RS256") {
            return Ok(CoseAlgorithm::Rs256);
        }
        let id: i64 = s.parse().map_err(|_| DecodeError::UnsupportedAlgorithm(0))?;
        CoseAlgorithm::try_from(id)
    }
}

/// Key material, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosePublicKey {
    /// Uncompressed P-256 point.
    Ec2P256 { x: [u8; 32], y: [u8; 32] },
    /// Big-endian modulus and public exponent, leading zeros stripped.
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

/// A credential public key together with the algorithm it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub algorithm: CoseAlgorithm,
    pub key: CosePublicKey,
}

impl CoseKey {
    /// SEC1 uncompressed encoding (`0x04 || x || y`) for EC2 keys.
    pub fn sec1_bytes(&self) -> Option<Vec<u8>> {
        match &self.key {
            CosePublicKey::Ec2P256 { x, y } => {
                let mut out = Vec::with_capacity(65);
                out.push(0x04);
                out.extend_from_slice(x);
                out.extend_from_slice(y);
                Some(out)
            }
            CosePublicKey::Rsa { .. } => None,
        }
    }

    /// Encode back into a COSE_Key CBOR map, used to persist the key.
    pub fn to_cbor(&self) -> Result<Vec<u8>, DecodeError> {
        let int = |i: i64| Value::Integer(i.into());
        let mut entries = vec![];
        match &self.key {
            CosePublicKey::Ec2P256 { x, y } => {
                entries.push((int(1), int(2)));
                entries.push((int(3), int(self.algorithm.id())));
                entries.push((int(-1), int(1)));
                entries.push((int(-2), Value::Bytes(x.to_vec())));
                entries.push((int(-3), Value::Bytes(y.to_vec())));
            }
            CosePublicKey::Rsa { n, e } => {
                entries.push((int(1), int(3)));
                entries.push((int(3), int(self.algorithm.id())));
                entries.push((int(-1), Value::Bytes(n.clone())));
                entries.push((int(-2), Value::Bytes(e.clone())));
            }
        }
        let mut buf = Vec::new();
        ciborium::into_writer(&Value::Map(entries), &mut buf)
            .map_err(|e| DecodeError::Cbor(e.to_string()))?;
        Ok(buf)
    }
}

/// Decode a COSE_Key that occupies `bytes` exactly.
pub fn decode_cose_key(bytes: &[u8]) -> Result<CoseKey, DecodeError> {
    cose_key_from_value(cbor_exact(bytes)?)
}

/// Build a `CoseKey` from an already decoded CBOR item.
pub(crate) fn cose_key_from_value(value: Value) -> Result<CoseKey, DecodeError> {
    let mut entries = cbor_map(value, "credentialPublicKey", MAX_KEY_ENTRIES)?;

    let alg = take_entry(&mut entries, &MapKey::Int(LABEL_ALG))
        .ok_or(DecodeError::MissingField("alg"))?;
    let alg = integer(&alg, "alg")?;
    let alg = i64::try_from(alg).map_err(|_| DecodeError::UnexpectedType("alg"))?;
    let algorithm = CoseAlgorithm::try_from(alg)?;

    let kty = take_entry(&mut entries, &MapKey::Int(LABEL_KTY))
        .ok_or(DecodeError::MissingField("kty"))?;
    let kty = integer(&kty, "kty")?;

    let key = match algorithm {
        CoseAlgorithm::Es256 => {
            if kty != KTY_EC2 {
                return Err(DecodeError::InvalidKey("ES256 requires an EC2 key"));
            }
            let crv = take_entry(&mut entries, &MapKey::Int(LABEL_CRV_OR_N))
                .ok_or(DecodeError::MissingField("crv"))?;
            if integer(&crv, "crv")? != CRV_P256 {
                return Err(DecodeError::InvalidKey("ES256 requires curve P-256"));
            }
            let x = coordinate(take_entry(&mut entries, &MapKey::Int(LABEL_X_OR_E)), "x")?;
            let y = coordinate(take_entry(&mut entries, &MapKey::Int(LABEL_Y)), "y")?;
            validate_point(&x, &y)?;
            CosePublicKey::Ec2P256 { x, y }
        }
        CoseAlgorithm::Rs256 => {
            if kty != KTY_RSA {
                return Err(DecodeError::InvalidKey("RS256 requires an RSA key"));
            }
            let n = bytes(take_entry(&mut entries, &MapKey::Int(LABEL_CRV_OR_N)), "n")?;
            let e = bytes(take_entry(&mut entries, &MapKey::Int(LABEL_X_OR_E)), "e")?;
            let (n, e) = validate_rsa(&n, &e)?;
            CosePublicKey::Rsa { n, e }
        }
    };

    Ok(CoseKey { algorithm, key })
}

fn integer(value: &Value, field: &'static str) -> Result<i128, DecodeError> {
    match value {
        Value::Integer(i) => Ok(i128::from(*i)),
        _ => Err(DecodeError::UnexpectedType(field)),
    }
}

fn bytes(value: Option<Value>, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    match value {
        Some(Value::Bytes(b)) => Ok(b),
        Some(_) => Err(DecodeError::UnexpectedType(field)),
        None => Err(DecodeError::MissingField(field)),
    }
}

fn coordinate(value: Option<Value>, field: &'static str) -> Result<[u8; 32], DecodeError> {
    let raw = bytes(value, field)?;
    raw.try_into()
        .map_err(|_| DecodeError::InvalidKey("P-256 coordinates must be 32 bytes"))
}

fn validate_point(x: &[u8; 32], y: &[u8; 32]) -> Result<(), DecodeError> {
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..33].copy_from_slice(x);
    sec1[33..].copy_from_slice(y);
    p256::PublicKey::from_sec1_bytes(&sec1)
        .map(|_| ())
        .map_err(|_| DecodeError::InvalidKey("point is not on P-256"))
}

fn validate_rsa(n: &[u8], e: &[u8]) -> Result<(Vec<u8>, Vec<u8>), DecodeError> {
    let key = rsa::RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(n),
        rsa::BigUint::from_bytes_be(e),
    )
    .map_err(|_| DecodeError::InvalidKey("RSA modulus or exponent out of range"))?;

    if key.n().bits() < MIN_RSA_BITS {
        return Err(DecodeError::InvalidKey("RSA modulus shorter than 2048 bits"));
    }
    Ok((key.n().to_bytes_be(), key.e().to_bytes_be()))
}
