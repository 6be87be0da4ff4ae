//! Software authenticator and relying-party fixtures shared by the
//! integration tests.
#![allow(dead_code)]

use ciborium::value::Value;
use passkey_rp::codec::base64url_encode;
use passkey_rp::db::MemoryCredentialStore;
use passkey_rp::session::MemorySessionStore;
use passkey_rp::webauthn::types::*;
use passkey_rp::{RelyingParty, RpConfig};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use serde_json::{json, Value as Json};
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const RP_ID: &str = "localhost";
pub const ORIGIN: &str = "https://localhost:8000";

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_AT: u8 = 0x40;

pub fn rp_config() -> RpConfig {
    RpConfig::new(RP_ID, "WebAuthn Demo", ORIGIN)
        .validate()
        .unwrap()
}

/// Relying party over in-memory stores; the credential store is returned so
/// tests can inspect what was persisted.
pub fn relying_party(config: RpConfig) -> (RelyingParty, Arc<MemoryCredentialStore>) {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let rp = RelyingParty::new(
        Arc::new(config),
        Arc::new(MemorySessionStore::new()),
        credentials.clone(),
    );
    (rp, credentials)
}

enum Key {
    Es256(p256::ecdsa::SigningKey),
    Rs256(rsa::pkcs1v15::SigningKey<Sha256>, rsa::RsaPublicKey),
}

/// A platform authenticator in software.
///
/// Fields are public so a test can make it misbehave: report another origin,
/// drop the UV flag, rewind its counter.
pub struct SoftAuthenticator {
    key: Key,
    pub credential_id: Vec<u8>,
    pub rp_id: String,
    pub origin: String,
    pub flags: u8,
    pub sign_count: u32,
    /// Never increments the counter (reports 0 forever).
    pub counterless: bool,
    /// User handle received at registration.
    pub user_handle: Vec<u8>,
}

impl SoftAuthenticator {
    fn with_key(key: Key) -> Self {
        let mut credential_id = vec![0u8; 16];
        OsRng.fill_bytes(&mut credential_id);
        Self {
            key,
            credential_id,
            rp_id: RP_ID.to_string(),
            origin: ORIGIN.to_string(),
            flags: FLAG_UP | FLAG_UV,
            sign_count: 0,
            counterless: false,
            user_handle: Vec::new(),
        }
    }

    pub fn es256() -> Self {
        Self::with_key(Key::Es256(p256::ecdsa::SigningKey::random(&mut OsRng)))
    }

    pub fn rs256() -> Self {
        let private = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public = private.to_public_key();
        Self::with_key(Key::Rs256(rsa::pkcs1v15::SigningKey::new(private), public))
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.key {
            Key::Es256(key) => {
                let sig: p256::ecdsa::Signature = key.sign(message);
                sig.to_der().as_bytes().to_vec()
            }
            Key::Rs256(key, _) => key.sign(message).to_vec(),
        }
    }

    /// COSE_Key encoding of the public key.
    pub fn cose_key(&self) -> Vec<u8> {
        let map = match &self.key {
            Key::Es256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                Value::Map(vec![
                    (Value::Integer(1i64.into()), Value::Integer(2i64.into())),
                    (Value::Integer(3i64.into()), Value::Integer((-7i64).into())),
                    (Value::Integer((-1i64).into()), Value::Integer(1i64.into())),
                    (
                        Value::Integer((-2i64).into()),
                        Value::Bytes(point.x().unwrap().to_vec()),
                    ),
                    (
                        Value::Integer((-3i64).into()),
                        Value::Bytes(point.y().unwrap().to_vec()),
                    ),
                ])
            }
            Key::Rs256(_, public) => Value::Map(vec![
                (Value::Integer(1i64.into()), Value::Integer(3i64.into())),
                (Value::Integer(3i64.into()), Value::Integer((-257i64).into())),
                (
                    Value::Integer((-1i64).into()),
                    Value::Bytes(public.n().to_bytes_be()),
                ),
                (
                    Value::Integer((-2i64).into()),
                    Value::Bytes(public.e().to_bytes_be()),
                ),
            ]),
        };
        cbor(&map)
    }

    pub fn client_data_json(&self, type_: &str, challenge: &[u8]) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": type_,
            "challenge": base64url_encode(challenge),
            "origin": self.origin,
            "crossOrigin": false,
        }))
        .unwrap()
    }

    /// authenticatorData; with attested credential data when `attested`.
    pub fn authenticator_data(&self, attested: bool) -> Vec<u8> {
        let mut out = Sha256::digest(self.rp_id.as_bytes()).to_vec();
        let flags = if attested { self.flags | FLAG_AT } else { self.flags };
        out.push(flags);
        out.extend_from_slice(&self.sign_count.to_be_bytes());
        if attested {
            out.extend_from_slice(&[0u8; 16]);
            out.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
            out.extend_from_slice(&self.credential_id);
            out.extend_from_slice(&self.cose_key());
        }
        out
    }

    /// Attestation object with a `none` statement.
    pub fn attestation_none(&self, auth_data: Vec<u8>) -> Vec<u8> {
        attestation_object("none", Vec::new(), auth_data)
    }

    /// Attestation object with a packed self-attestation statement.
    pub fn attestation_packed_self(&self, auth_data: Vec<u8>, client_data_json: &[u8]) -> Vec<u8> {
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&Sha256::digest(client_data_json));
        let alg: i64 = match self.key {
            Key::Es256(_) => -7,
            Key::Rs256(..) => -257,
        };
        let statement = vec![
            (Value::Text("alg".into()), Value::Integer(alg.into())),
            (Value::Text("sig".into()), Value::Bytes(self.sign(&signed))),
        ];
        attestation_object("packed", statement, auth_data)
    }

    fn registration_credential(
        &self,
        client_data_json: Vec<u8>,
        attestation_object: Vec<u8>,
    ) -> RegistrationCredential {
        RegistrationCredential {
            id: base64url_encode(&self.credential_id),
            raw_id: self.credential_id.clone().into(),
            type_: "public-key".to_string(),
            response: AttestationResponse {
                client_data_json: client_data_json.into(),
                attestation_object: attestation_object.into(),
            },
        }
    }

    /// Answer registration options with a `none` attestation.
    pub fn register(&mut self, options: &RegistrationOptions) -> RegistrationCredential {
        self.register_with(options.challenge.as_slice(), options.user.id.0.clone())
    }

    /// Same as `register`, from the raw challenge and user handle.
    pub fn register_with(&mut self, challenge: &[u8], user_handle: Vec<u8>) -> RegistrationCredential {
        self.user_handle = user_handle;
        let client_data_json = self.client_data_json("webauthn.create", challenge);
        let attestation = self.attestation_none(self.authenticator_data(true));
        self.registration_credential(client_data_json, attestation)
    }

    /// Answer registration options with a packed self attestation.
    pub fn register_packed(&mut self, options: &RegistrationOptions) -> RegistrationCredential {
        self.user_handle = options.user.id.0.clone();
        let client_data_json = self.client_data_json("webauthn.create", options.challenge.as_slice());
        let attestation =
            self.attestation_packed_self(self.authenticator_data(true), &client_data_json);
        self.registration_credential(client_data_json, attestation)
    }

    /// Answer assertion options: bump the counter and sign.
    pub fn assert(&mut self, options: &AssertionOptions) -> AssertionCredential {
        self.assert_with(options.challenge.as_slice())
    }

    /// Same as `assert`, from the raw challenge.
    pub fn assert_with(&mut self, challenge: &[u8]) -> AssertionCredential {
        if !self.counterless {
            self.sign_count += 1;
        }
        let client_data_json = self.client_data_json("webauthn.get", challenge);
        let auth_data = self.authenticator_data(false);
        self.assertion_credential(client_data_json, auth_data)
    }

    /// Sign `auth_data || SHA-256(client_data_json)` into an assertion.
    pub fn assertion_credential(
        &self,
        client_data_json: Vec<u8>,
        auth_data: Vec<u8>,
    ) -> AssertionCredential {
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature = self.sign(&signed);
        AssertionCredential {
            id: base64url_encode(&self.credential_id),
            raw_id: self.credential_id.clone().into(),
            type_: "public-key".to_string(),
            response: AssertionResponse {
                client_data_json: client_data_json.into(),
                authenticator_data: auth_data.into(),
                signature: signature.into(),
                user_handle: Some(self.user_handle.clone().into()),
            },
        }
    }
}

pub fn cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).unwrap();
    out
}

pub fn attestation_object(
    fmt: &str,
    statement: Vec<(Value, Value)>,
    auth_data: Vec<u8>,
) -> Vec<u8> {
    cbor(&Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text(fmt.into())),
        (Value::Text("attStmt".into()), Value::Map(statement)),
        (Value::Text("authData".into()), Value::Bytes(auth_data)),
    ]))
}

/// Browser JSON for `POST /wa/register`.
pub fn registration_body(credential: &RegistrationCredential) -> Json {
    json!({
        "credential": {
            "id": credential.id,
            "rawId": base64url_encode(credential.raw_id.as_slice()),
            "type": credential.type_,
            "response": {
                "clientDataJSON": base64url_encode(credential.response.client_data_json.as_slice()),
                "attestationObject": base64url_encode(credential.response.attestation_object.as_slice()),
            }
        }
    })
}

/// Browser JSON for `POST /wa/authenticate`.
pub fn assertion_body(credential: &AssertionCredential) -> Json {
    json!({
        "credential": {
            "id": credential.id,
            "rawId": base64url_encode(credential.raw_id.as_slice()),
            "type": credential.type_,
            "response": {
                "clientDataJSON": base64url_encode(credential.response.client_data_json.as_slice()),
                "authenticatorData": base64url_encode(credential.response.authenticator_data.as_slice()),
                "signature": base64url_encode(credential.response.signature.as_slice()),
                "userHandle": credential.response.user_handle.as_ref().map(|h| base64url_encode(h.as_slice())),
            }
        }
    })
}
