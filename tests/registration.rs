mod common;

use common::*;
use passkey_rp::codec::{AttestationFormat, CoseAlgorithm};
use passkey_rp::db::CredentialStore;
use passkey_rp::error::{AppError, ChallengeError, RegistrationError};
use passkey_rp::webauthn::types::RegistrationCredential;
use passkey_rp::{ChallengePolicy, RelyingParty, UserVerification};

const TOKEN: &str = "S1";

async fn expect_rejected(rp: &RelyingParty, credential: &RegistrationCredential) -> RegistrationError {
    match rp.verify_registration(TOKEN, credential).await {
        Err(AppError::Registration(e)) => e,
        other => panic!("expected a registration error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_none_attestation() {
    let (rp, store) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    assert_eq!(options.challenge.as_slice().len(), 64);
    assert_eq!(options.user.id.as_slice().len(), 32);
    assert_eq!(options.rp.id, RP_ID);
    let algs: Vec<i64> = options.pub_key_cred_params.iter().map(|p| p.alg).collect();
    assert_eq!(algs, vec![-7, -257]);

    let credential = auth.register(&options);
    let record = rp.verify_registration(TOKEN, &credential).await.unwrap();

    assert_eq!(record.credential_id, auth.credential_id);
    assert_eq!(record.user_handle, options.user.id.0);
    assert_eq!(record.sign_count, 0);
    assert_eq!(record.public_key.algorithm, CoseAlgorithm::Es256);
    assert_eq!(record.attestation_format, AttestationFormat::None);

    let stored = store
        .find_by_credential_id(&auth.credential_id)
        .await
        .unwrap()
        .expect("credential persisted");
    assert_eq!(stored.public_key, record.public_key);
}

#[tokio::test]
async fn test_register_packed_self_attestation() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register_packed(&options);
    let record = rp.verify_registration(TOKEN, &credential).await.unwrap();
    assert_eq!(record.attestation_format, AttestationFormat::Packed);
}

#[tokio::test]
async fn test_packed_self_attestation_bad_signature() {
    let (rp, store) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register_packed(&options);
    // Sign over a different clientDataJSON than the one sent.
    let other = auth.client_data_json("webauthn.create", b"not the challenge");
    credential.response.attestation_object = auth
        .attestation_packed_self(auth.authenticator_data(true), &other)
        .into();

    assert!(matches!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::AttestationInvalid(_)
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_none_attestation_with_statement_rejected() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register(&options);
    credential.response.attestation_object = attestation_object(
        "none",
        vec![(
            ciborium::value::Value::Text("sig".into()),
            ciborium::value::Value::Bytes(vec![1, 2, 3]),
        )],
        auth.authenticator_data(true),
    )
    .into();

    assert!(matches!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::AttestationInvalid(_)
    ));
}

#[tokio::test]
async fn test_wrong_origin() {
    let (rp, store) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();
    auth.origin = "https://evil.example".to_string();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::OriginMismatch("https://evil.example".to_string())
    );
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_wrong_client_data_type() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register(&options);
    credential.response.client_data_json = auth
        .client_data_json("webauthn.get", options.challenge.as_slice())
        .into();

    assert!(matches!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::BadClientData(_)
    ));

    // The rejected response spent the challenge
    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::ChallengeInvalid(ChallengeError::NotFound)
    );
}

#[tokio::test]
async fn test_unparseable_client_data_spends_challenge() {
    let (rp, store) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register(&options);
    credential.response.client_data_json = b"{not json".to_vec().into();
    assert!(matches!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::BadClientData(_)
    ));

    let mut credential = auth.register(&options);
    credential.type_ = "password".to_string();
    assert!(matches!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::BadClientData(_)
    ));

    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::ChallengeInvalid(ChallengeError::NotFound)
    );
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_retry_policy_keeps_challenge_after_bad_client_data() {
    let mut config = rp_config();
    config.challenge_policy = ChallengePolicy::RetryUntilExpiry;
    let (rp, _) = relying_party(config);
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register(&options);
    credential.response.client_data_json = auth
        .client_data_json("webauthn.get", options.challenge.as_slice())
        .into();
    assert!(matches!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::BadClientData(_)
    ));

    let credential = auth.register(&options);
    assert!(rp.verify_registration(TOKEN, &credential).await.is_ok());
}

#[tokio::test]
async fn test_wrong_challenge() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register(&options);
    let mut challenge = options.challenge.0.clone();
    challenge[0] ^= 0xff;
    credential.response.client_data_json =
        auth.client_data_json("webauthn.create", &challenge).into();

    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::ChallengeInvalid(ChallengeError::Mismatch)
    );
}

#[tokio::test]
async fn test_no_pending_challenge() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options("another-session").await;
    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::ChallengeInvalid(ChallengeError::NotFound)
    );
}

#[tokio::test]
async fn test_authentication_challenge_cannot_register() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    // A newer assertion challenge replaces the pending registration.
    rp.assertion_options(TOKEN, &[]).await;

    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::ChallengeInvalid(ChallengeError::NotFound)
    );
}

#[tokio::test]
async fn test_rp_id_hash_mismatch() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();
    auth.rp_id = "example.com".to_string();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::RpIdMismatch
    );
}

#[tokio::test]
async fn test_user_verification_required() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();
    auth.flags = FLAG_UP;

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::UserNotVerified
    );
}

#[tokio::test]
async fn test_user_verification_preferred_accepts_presence() {
    let mut config = rp_config();
    config.user_verification = UserVerification::Preferred;
    let (rp, _) = relying_party(config);
    let mut auth = SoftAuthenticator::es256();
    auth.flags = FLAG_UP;

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    assert!(rp.verify_registration(TOKEN, &credential).await.is_ok());
}

#[tokio::test]
async fn test_user_presence_always_required() {
    let mut config = rp_config();
    config.user_verification = UserVerification::Discouraged;
    let (rp, _) = relying_party(config);
    let mut auth = SoftAuthenticator::es256();
    auth.flags = 0;

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::UserNotVerified
    );
}

#[tokio::test]
async fn test_missing_attested_credential() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register(&options);
    credential.response.attestation_object =
        auth.attestation_none(auth.authenticator_data(false)).into();

    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::NoCredentialData
    );
}

#[tokio::test]
async fn test_algorithm_not_allowed() {
    let mut config = rp_config();
    config.algorithms = vec![CoseAlgorithm::Es256];
    let (rp, _) = relying_party(config);
    let mut auth = SoftAuthenticator::rs256();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::AlgorithmNotAllowed(-257)
    );
}

#[tokio::test]
async fn test_malformed_attestation_object() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let mut credential = auth.register(&options);
    let mut truncated = credential.response.attestation_object.0.clone();
    truncated.truncate(truncated.len() - 10);
    credential.response.attestation_object = truncated.into();

    assert!(matches!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::Malformed(_)
    ));
}

#[tokio::test]
async fn test_challenge_is_single_use() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    rp.verify_registration(TOKEN, &credential).await.unwrap();

    assert_eq!(
        expect_rejected(&rp, &credential).await,
        RegistrationError::ChallengeInvalid(ChallengeError::NotFound)
    );
}

#[tokio::test]
async fn test_duplicate_credential_id_is_a_store_error() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::es256();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    rp.verify_registration(TOKEN, &credential).await.unwrap();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register(&options);
    assert!(matches!(
        rp.verify_registration(TOKEN, &credential).await,
        Err(AppError::Store(_))
    ));
}

#[tokio::test]
async fn test_register_rs256() {
    let (rp, _) = relying_party(rp_config());
    let mut auth = SoftAuthenticator::rs256();

    let options = rp.registration_options(TOKEN).await;
    let credential = auth.register_packed(&options);
    let record = rp.verify_registration(TOKEN, &credential).await.unwrap();
    assert_eq!(record.public_key.algorithm, CoseAlgorithm::Rs256);
}
