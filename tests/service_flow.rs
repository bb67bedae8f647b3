mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{TestAuthenticator, ORIGIN, RP_ID};
use keyproof::challenge::ChallengeStore;
use keyproof::codec::base64url;
use keyproof::error::Error;
use keyproof::service::AssertionService;
use keyproof::store::{CredentialRecord, CredentialStore};
use keyproof::{RejectReason, VerificationOutcome};

const STORE_KEY: [u8; 32] = [0x3c; 32];

struct Fixture {
    _dir: tempfile::TempDir,
    dir_path: std::path::PathBuf,
    credentials: Arc<Mutex<CredentialStore>>,
    service: AssertionService,
    auth: TestAuthenticator,
}

fn fixture_with(challenges: ChallengeStore, sign_count: u32) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let auth = TestAuthenticator::new(0x42);
    let mut store = CredentialStore::load(STORE_KEY, dir.path().to_path_buf()).unwrap();
    store
        .add(CredentialRecord::new(&auth.stored(sign_count), RP_ID, 1_700_000_000))
        .unwrap();
    let credentials = Arc::new(Mutex::new(store));
    let service = AssertionService::new(credentials.clone(), Arc::new(Mutex::new(challenges)));
    Fixture {
        dir_path: dir.path().to_path_buf(),
        _dir: dir,
        credentials,
        service,
        auth,
    }
}

fn fixture(sign_count: u32) -> Fixture {
    fixture_with(ChallengeStore::default(), sign_count)
}

/// Begin a ceremony; returns the session token and the decoded challenge.
fn begin(f: &Fixture) -> (String, Vec<u8>) {
    let issued = f.service.begin(RP_ID, ORIGIN, false, None).unwrap();
    (issued.session_token, base64url::decode(&issued.challenge).unwrap())
}

fn stored_count(f: &Fixture) -> u32 {
    f.credentials
        .lock()
        .unwrap()
        .get_by_id(&f.auth.credential_id)
        .unwrap()
        .sign_count
}

#[test]
fn test_begin_finish_persists_counter() {
    let f = fixture(5);
    let (token, challenge) = begin(&f);
    let response = f.auth.assertion(&challenge, 6).build();

    let outcome = f.service.finish(&token, &response).unwrap();
    assert_eq!(outcome, VerificationOutcome::Accepted { counter: 6 });
    assert_eq!(stored_count(&f), 6);

    let reloaded = CredentialStore::load(STORE_KEY, f.dir_path.clone()).unwrap();
    assert_eq!(
        reloaded.get_by_id(&f.auth.credential_id).unwrap().sign_count,
        6,
        "counter must reach disk"
    );
}

#[test]
fn test_begin_lists_user_credentials() {
    let f = fixture(0);
    let issued = f
        .service
        .begin(RP_ID, ORIGIN, true, Some(&f.auth.user_handle))
        .unwrap();
    assert_eq!(issued.rp_id, RP_ID);
    assert_eq!(issued.user_verification, "required");
    assert_eq!(issued.allow_credentials, vec![base64url::encode(&f.auth.credential_id)]);
    assert_eq!(base64url::decode(&issued.challenge).unwrap().len(), 32);

    let anonymous = f.service.begin(RP_ID, ORIGIN, false, None).unwrap();
    assert!(anonymous.allow_credentials.is_empty());
    assert_eq!(anonymous.user_verification, "preferred");
    assert_ne!(anonymous.session_token, issued.session_token);
    assert_ne!(anonymous.challenge, issued.challenge);
}

#[test]
fn test_session_is_single_use() {
    let f = fixture(5);
    let (token, challenge) = begin(&f);
    let response = f.auth.assertion(&challenge, 6).build();
    f.service.finish(&token, &response).unwrap();

    let replay = f.auth.assertion(&challenge, 7).build();
    assert!(matches!(
        f.service.finish(&token, &replay),
        Err(Error::UnknownSession)
    ));
    assert_eq!(stored_count(&f), 6);
}

#[test]
fn test_rejection_spends_session() {
    let f = fixture(5);
    let (token, challenge) = begin(&f);
    let mut builder = f.auth.assertion(&challenge, 6);
    builder.origin = "https://evil.example".into();

    assert_eq!(
        f.service.finish(&token, &builder.build()).unwrap(),
        VerificationOutcome::Rejected(RejectReason::OriginMismatch)
    );
    let good = f.auth.assertion(&challenge, 6).build();
    assert!(matches!(
        f.service.finish(&token, &good),
        Err(Error::UnknownSession)
    ));
    assert_eq!(stored_count(&f), 5);
}

#[test]
fn test_unknown_and_expired_sessions() {
    let f = fixture_with(ChallengeStore::new(Duration::ZERO), 0);
    let response = f.auth.assertion(&[0u8; 32], 1).build();
    assert!(matches!(
        f.service.finish("no-such-session", &response),
        Err(Error::UnknownSession)
    ));

    let (token, challenge) = begin(&f);
    let response = f.auth.assertion(&challenge, 1).build();
    assert!(matches!(
        f.service.finish(&token, &response),
        Err(Error::UnknownSession)
    ));
}

#[test]
fn test_cloned_authenticator_is_disabled() {
    let f = fixture(10);
    let (token, challenge) = begin(&f);
    let stale = f.auth.assertion(&challenge, 3).build();
    assert_eq!(
        f.service.finish(&token, &stale).unwrap(),
        VerificationOutcome::Rejected(RejectReason::PossibleClonedAuthenticator {
            stored: 10,
            observed: 3
        })
    );
    assert!(f
        .credentials
        .lock()
        .unwrap()
        .get_by_id(&f.auth.credential_id)
        .unwrap()
        .disabled);

    // Even a well-formed, advancing assertion is refused afterwards.
    let (token, challenge) = begin(&f);
    let fresh = f.auth.assertion(&challenge, 11).build();
    assert_eq!(
        f.service.finish(&token, &fresh).unwrap(),
        VerificationOutcome::Rejected(RejectReason::UnknownCredential)
    );
    let issued = f
        .service
        .begin(RP_ID, ORIGIN, false, Some(&f.auth.user_handle))
        .unwrap();
    assert!(issued.allow_credentials.is_empty());
}

#[test]
fn test_non_counting_authenticator() {
    let f = fixture(0);
    for _ in 0..3 {
        let (token, challenge) = begin(&f);
        let response = f.auth.assertion(&challenge, 0).build();
        assert_eq!(
            f.service.finish(&token, &response).unwrap(),
            VerificationOutcome::Accepted { counter: 0 }
        );
    }
    assert_eq!(stored_count(&f), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_counter_accepts_once() {
    let f = fixture(0);
    let mut tasks = Vec::new();
    for _ in 0..4 {
        let (token, challenge) = begin(&f);
        let response = f.auth.assertion(&challenge, 1).build();
        let service = f.service.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            service.finish(&token, &response)
        }));
    }

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            VerificationOutcome::Accepted { counter } => {
                assert_eq!(counter, 1);
                accepted += 1;
            }
            VerificationOutcome::Rejected(reason) => assert!(
                matches!(
                    reason,
                    RejectReason::PossibleClonedAuthenticator { .. }
                        | RejectReason::UnknownCredential
                ),
                "unexpected rejection {reason:?}"
            ),
        }
    }
    assert_eq!(accepted, 1, "exactly one assertion may consume counter 1");
    assert_eq!(stored_count(&f), 1);
}
