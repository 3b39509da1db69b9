//! Behaviour every `CheckinStore` adapter must share.
//!
//! Each check starts from an empty store and leaves it in an arbitrary state;
//! callers hand in a fresh store per check.

#![allow(dead_code)]

use std::sync::Arc;

use checkin_tracker::digest::digest_secret;
use checkin_tracker::model::RawSnapshot;
use checkin_tracker::{CheckinStore, TrackerError};

pub fn raw(json: &str) -> RawSnapshot {
    serde_json::from_str(json).expect("valid snapshot JSON")
}

pub async fn accounts_are_unique(store: &dyn CheckinStore) {
    let created = store.create_account("alice", &digest_secret("a")).await.unwrap();
    assert_eq!(created.username, "alice");

    let err = store.create_account("alice", &digest_secret("other")).await.unwrap_err();
    assert!(matches!(err, TrackerError::AlreadyExists(_)), "got {:?}", err);

    // The original digest survives the rejected create
    let account = store.find_account("alice").await.unwrap().unwrap();
    assert_eq!(account.credential_digest, digest_secret("a"));

    assert!(store.verify_credential("alice", &digest_secret("a")).await.unwrap());
    assert!(!store.verify_credential("alice", &digest_secret("other")).await.unwrap());
    assert!(matches!(
        store.verify_credential("nobody", &digest_secret("a")).await,
        Err(TrackerError::NotFound(_))
    ));

    // Case matters
    store.create_account("Alice", &digest_secret("b")).await.unwrap();
    assert!(store.find_account("ALICE").await.unwrap().is_none());
}

pub async fn checkin_lifecycle(store: &dyn CheckinStore) {
    store.create_account("alice", &digest_secret("a")).await.unwrap();

    store.add_checkin("alice", "2024-03-01", "paper").await.unwrap();
    store.add_checkin("alice", "2024-03-01", "fitness").await.unwrap();

    let err = store.add_checkin("alice", "2024-03-01", "paper").await.unwrap_err();
    assert!(matches!(err, TrackerError::Conflict(_)), "got {:?}", err);

    let checkins = store.user_checkins("alice").await.unwrap();
    assert_eq!(checkins.len(), 1);
    assert_eq!(checkins["2024-03-01"].len(), 2);

    store.remove_checkin("alice", "2024-03-01", "paper").await.unwrap();
    // Removing again is not an error
    store.remove_checkin("alice", "2024-03-01", "paper").await.unwrap();

    // Removing the last activity removes the day
    store.remove_checkin("alice", "2024-03-01", "fitness").await.unwrap();
    assert!(store.user_checkins("alice").await.unwrap().is_empty());

    let exported = store.export_snapshot().await.unwrap();
    assert!(exported["alice"].checkins.is_empty());
}

pub async fn checkin_requires_account(store: &dyn CheckinStore) {
    let err = store.add_checkin("ghost", "2024-03-01", "paper").await.unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)), "got {:?}", err);

    assert!(store.user_checkins("ghost").await.unwrap().is_empty());
    store.remove_checkin("ghost", "2024-03-01", "paper").await.unwrap();
}

pub async fn delete_cascades(store: &dyn CheckinStore) {
    store.create_account("alice", &digest_secret("a")).await.unwrap();
    store.create_account("bob", &digest_secret("b")).await.unwrap();
    store.add_checkin("alice", "2024-03-01", "quant").await.unwrap();
    store.add_checkin("bob", "2024-03-01", "algorithm").await.unwrap();

    store.delete_account("alice").await.unwrap();

    assert!(store.find_account("alice").await.unwrap().is_none());
    assert!(store.user_checkins("alice").await.unwrap().is_empty());

    let day = store.checkins_for_date("2024-03-01").await.unwrap();
    assert_eq!(day.keys().collect::<Vec<_>>(), vec!["bob"]);

    let err = store.delete_account("alice").await.unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)), "got {:?}", err);

    // A re-registered name starts with no history
    store.create_account("alice", &digest_secret("new")).await.unwrap();
    assert!(store.user_checkins("alice").await.unwrap().is_empty());
}

pub async fn date_view_ordered_by_username(store: &dyn CheckinStore) {
    for name in ["carol", "Bob", "alice"] {
        store.create_account(name, &digest_secret(name)).await.unwrap();
    }
    store.add_checkin("carol", "2024-03-02", "paper").await.unwrap();
    store.add_checkin("alice", "2024-03-02", "fitness").await.unwrap();
    store.add_checkin("Bob", "2024-03-02", "quant").await.unwrap();
    store.add_checkin("alice", "2024-03-03", "paper").await.unwrap();

    let day = store.checkins_for_date("2024-03-02").await.unwrap();
    let names: Vec<_> = day.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Bob", "alice", "carol"]);
    assert!(day["alice"].contains("fitness"));

    assert!(store.checkins_for_date("2024-01-01").await.unwrap().is_empty());
}

pub async fn import_normalizes_legacy_days(store: &dyn CheckinStore) {
    let digest = digest_secret("b");
    store
        .import_snapshot(raw(&format!(
            r#"{{
                "bob": {{"password": "{}", "checkins": {{
                    "2024-03-01": "fitness",
                    "2024-03-02": ["paper", "quant"],
                    "2024-03-03": []
                }}}},
                "carol": {{"password": "{}"}}
            }}"#,
            digest, digest
        )))
        .await
        .unwrap();

    let snapshot = store.export_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);

    let bob = &snapshot["bob"];
    assert_eq!(bob.password, digest);
    assert_eq!(bob.checkins.len(), 2);
    assert_eq!(
        bob.checkins["2024-03-01"].iter().collect::<Vec<_>>(),
        vec!["fitness"]
    );
    assert!(snapshot["carol"].checkins.is_empty());

    let checkins = store.user_checkins("bob").await.unwrap();
    assert!(checkins["2024-03-01"].contains("fitness"));
    let day = store.checkins_for_date("2024-03-01").await.unwrap();
    assert_eq!(day["bob"].len(), 1);

    // Exports always use the list form
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json["bob"]["checkins"]["2024-03-01"].is_array());
}

pub async fn import_replaces_everything(store: &dyn CheckinStore) {
    store.create_account("alice", &digest_secret("a")).await.unwrap();
    store.add_checkin("alice", "2024-03-01", "paper").await.unwrap();

    let digest = digest_secret("b");
    store
        .import_snapshot(raw(&format!(
            r#"{{"bob": {{"password": "{}", "checkins": {{"2024-03-05": ["algorithm"]}}}}}}"#,
            digest
        )))
        .await
        .unwrap();

    let snapshot = store.export_snapshot().await.unwrap();
    assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["bob"]);
    assert!(store.find_account("alice").await.unwrap().is_none());
}

pub async fn export_import_round_trip(store: &dyn CheckinStore) {
    store.create_account("alice", &digest_secret("a")).await.unwrap();
    store.create_account("bob", &digest_secret("b")).await.unwrap();
    store.add_checkin("alice", "2024-03-01", "paper").await.unwrap();
    store.add_checkin("alice", "2024-03-01", "quant").await.unwrap();
    store.add_checkin("bob", "2024-02-29", "fitness").await.unwrap();

    let before = store.export_snapshot().await.unwrap();
    store.import_snapshot(RawSnapshot::from(before.clone())).await.unwrap();
    let after = store.export_snapshot().await.unwrap();
    assert_eq!(after, before);
    assert_eq!(
        serde_json::to_string(&after).unwrap(),
        serde_json::to_string(&before).unwrap()
    );
}

pub async fn writes_follow_import_rules(store: &dyn CheckinStore) {
    let digest = digest_secret("a");
    for (username, password) in [("", digest.as_str()), ("alice", "")] {
        let err = store.create_account(username, password).await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidInput(_)), "got {:?}", err);
    }

    store.create_account("alice", &digest).await.unwrap();
    for (date, activity) in [("2024-3-1", "paper"), ("2024-02-30", "paper"), ("2024-03-01", "")] {
        let err = store.add_checkin("alice", date, activity).await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidInput(_)), "{} {:?} gave {:?}", date, activity, err);
    }

    // Everything the store holds survives a round trip
    let before = store.export_snapshot().await.unwrap();
    store.import_snapshot(RawSnapshot::from(before.clone())).await.unwrap();
    assert_eq!(store.export_snapshot().await.unwrap(), before);
}

pub async fn dot_usernames_stay_distinct(store: &dyn CheckinStore) {
    for name in [".", "..", "checkins"] {
        store.create_account(name, &digest_secret(name)).await.unwrap();
    }
    store.add_checkin("..", "2024-03-01", "paper").await.unwrap();
    store.add_checkin("checkins", "2024-03-01", "quant").await.unwrap();

    let checkins = store.user_checkins("..").await.unwrap();
    assert_eq!(checkins["2024-03-01"].iter().collect::<Vec<_>>(), vec!["paper"]);
    assert!(store.user_checkins(".").await.unwrap().is_empty());

    let account = store.find_account("..").await.unwrap().unwrap();
    assert_eq!(account.credential_digest, digest_secret(".."));

    store.delete_account("..").await.unwrap();
    assert!(store.find_account("..").await.unwrap().is_none());
    assert!(store.find_account(".").await.unwrap().is_some());
    assert!(store.find_account("checkins").await.unwrap().is_some());
}

/// Racing adds of one (user, date, activity): exactly one lands
pub async fn concurrent_duplicate_adds(store: Arc<dyn CheckinStore>) {
    const WRITERS: usize = 8;
    store.create_account("alice", &digest_secret("a")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.add_checkin("alice", "2024-03-01", "paper").await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(TrackerError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(accepted, 1);

    let checkins = store.user_checkins("alice").await.unwrap();
    assert_eq!(checkins.len(), 1);
    assert_eq!(checkins["2024-03-01"].iter().collect::<Vec<_>>(), vec!["paper"]);
}

pub async fn first_day_scenario(store: &dyn CheckinStore) {
    assert!(store.login("alice", &digest_secret("pw")).await.unwrap().created);

    store.add_checkin("alice", "2024-03-01", "paper").await.unwrap();
    store.add_checkin("alice", "2024-03-01", "fitness").await.unwrap();
    let checkins = store.user_checkins("alice").await.unwrap();
    assert_eq!(checkins["2024-03-01"].iter().collect::<Vec<_>>(), vec!["fitness", "paper"]);

    store.remove_checkin("alice", "2024-03-01", "paper").await.unwrap();
    let checkins = store.user_checkins("alice").await.unwrap();
    assert_eq!(checkins["2024-03-01"].iter().collect::<Vec<_>>(), vec!["fitness"]);

    store.remove_checkin("alice", "2024-03-01", "fitness").await.unwrap();
    assert!(store.user_checkins("alice").await.unwrap().is_empty());
}

pub async fn invalid_import_changes_nothing(store: &dyn CheckinStore) {
    store.create_account("alice", &digest_secret("a")).await.unwrap();
    store.add_checkin("alice", "2024-03-01", "paper").await.unwrap();
    let before = store.export_snapshot().await.unwrap();

    let digest = digest_secret("b");
    let bad_payloads = [
        format!(r#"{{"bob": {{"password": "{}", "checkins": {{"03/01/2024": ["paper"]}}}}}}"#, digest),
        r#"{"bob": {"password": "", "checkins": {}}}"#.to_string(),
        format!(r#"{{"": {{"password": "{}"}}}}"#, digest),
        format!(r#"{{"bob": {{"password": "{}", "checkins": {{"2024-03-01": ""}}}}}}"#, digest),
    ];

    for payload in bad_payloads {
        let err = store.import_snapshot(raw(&payload)).await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidInput(_)), "{} gave {:?}", payload, err);
        assert_eq!(store.export_snapshot().await.unwrap(), before);
    }
}

pub async fn empty_import_clears(store: &dyn CheckinStore) {
    store.create_account("alice", &digest_secret("a")).await.unwrap();
    store.add_checkin("alice", "2024-03-01", "paper").await.unwrap();

    store.import_snapshot(raw("{}")).await.unwrap();
    assert!(store.export_snapshot().await.unwrap().is_empty());

    store.create_account("bob", &digest_secret("b")).await.unwrap();
    store.clear_all().await.unwrap();
    assert!(store.export_snapshot().await.unwrap().is_empty());
}

pub async fn login_registers_then_verifies(store: &dyn CheckinStore) {
    let digest = digest_secret("pw");

    let first = store.login("dana", &digest).await.unwrap();
    assert!(first.created);
    assert_eq!(first.username, "dana");

    let second = store.login("dana", &digest).await.unwrap();
    assert!(!second.created);

    let err = store.login("dana", &digest_secret("wrong")).await.unwrap_err();
    assert!(matches!(err, TrackerError::InvalidCredential), "got {:?}", err);

    let err = store.login("", &digest).await.unwrap_err();
    assert!(matches!(err, TrackerError::InvalidInput(_)), "got {:?}", err);
}

/// Every check above, each on its own fresh store. `$make` yields the store
/// plus whatever must outlive it (a temp dir, a server handle).
macro_rules! store_conformance {
    ($make:expr) => {
        #[tokio::test]
        async fn accounts_are_unique() {
            let (store, _guard) = $make;
            common::accounts_are_unique(&store).await;
        }

        #[tokio::test]
        async fn checkin_lifecycle() {
            let (store, _guard) = $make;
            common::checkin_lifecycle(&store).await;
        }

        #[tokio::test]
        async fn checkin_requires_account() {
            let (store, _guard) = $make;
            common::checkin_requires_account(&store).await;
        }

        #[tokio::test]
        async fn delete_cascades() {
            let (store, _guard) = $make;
            common::delete_cascades(&store).await;
        }

        #[tokio::test]
        async fn date_view_ordered_by_username() {
            let (store, _guard) = $make;
            common::date_view_ordered_by_username(&store).await;
        }

        #[tokio::test]
        async fn import_normalizes_legacy_days() {
            let (store, _guard) = $make;
            common::import_normalizes_legacy_days(&store).await;
        }

        #[tokio::test]
        async fn import_replaces_everything() {
            let (store, _guard) = $make;
            common::import_replaces_everything(&store).await;
        }

        #[tokio::test]
        async fn export_import_round_trip() {
            let (store, _guard) = $make;
            common::export_import_round_trip(&store).await;
        }

        #[tokio::test]
        async fn writes_follow_import_rules() {
            let (store, _guard) = $make;
            common::writes_follow_import_rules(&store).await;
        }

        #[tokio::test]
        async fn dot_usernames_stay_distinct() {
            let (store, _guard) = $make;
            common::dot_usernames_stay_distinct(&store).await;
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_duplicate_adds() {
            let (store, _guard) = $make;
            common::concurrent_duplicate_adds(std::sync::Arc::new(store)).await;
        }

        #[tokio::test]
        async fn first_day_scenario() {
            let (store, _guard) = $make;
            common::first_day_scenario(&store).await;
        }

        #[tokio::test]
        async fn invalid_import_changes_nothing() {
            let (store, _guard) = $make;
            common::invalid_import_changes_nothing(&store).await;
        }

        #[tokio::test]
        async fn empty_import_clears() {
            let (store, _guard) = $make;
            common::empty_import_clears(&store).await;
        }

        #[tokio::test]
        async fn login_registers_then_verifies() {
            let (store, _guard) = $make;
            common::login_registers_then_verifies(&store).await;
        }
    };
}
