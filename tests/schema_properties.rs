//! Provisioning properties checked end to end against the in-memory store

use bson::doc;
use repo_init::initializer::{Initializer, Outcome};
use repo_init::schema::{AdminPrincipal, RoleGrant, COLLECTIONS};
use repo_init::seed::{password::verify_password, SeedFile, Seeder};
use repo_init::store::{CollectionKind, MemoryStore, SchemaStore};
use repo_init::verify::verify_all;

async fn provisioned() -> (MemoryStore, AdminPrincipal) {
    let store = MemoryStore::new("zbiRepo");
    let admin = AdminPrincipal::new("zbiadmin", "s3cret", "zbiRepo");
    Initializer::new(&store)
        .with_principal(Some(&admin))
        .run()
        .await
        .expect("first run");
    (store, admin)
}

#[tokio::test]
async fn test_every_collection_has_exactly_one_unique_index() {
    let (store, _) = provisioned().await;

    for spec in COLLECTIONS {
        assert_eq!(
            store.collection_kind(spec.name).await.unwrap(),
            Some(CollectionKind::Collection),
            "{} missing",
            spec.name
        );

        let unique: Vec<_> = store
            .list_indexes(spec.name)
            .await
            .unwrap()
            .into_iter()
            .filter(|i| !i.is_id_index() && i.unique)
            .collect();
        assert_eq!(unique.len(), 1, "{}", spec.name);
        assert!(spec.matches_keys(&unique[0].keys), "{}", spec.name);
        assert_eq!(unique[0].name, spec.index_name());
    }
}

#[tokio::test]
async fn test_rerun_leaves_schema_unchanged() {
    let (store, admin) = provisioned().await;

    let mut before = Vec::new();
    for spec in COLLECTIONS {
        before.push(store.list_indexes(spec.name).await.unwrap());
    }

    let report = Initializer::new(&store)
        .with_principal(Some(&admin))
        .run()
        .await
        .expect("second run");
    assert!(report.steps.iter().all(|s| s.outcome == Outcome::Existing));

    for (spec, indexes) in COLLECTIONS.iter().zip(before) {
        assert_eq!(store.list_indexes(spec.name).await.unwrap(), indexes);
    }
}

#[tokio::test]
async fn test_identical_key_tuple_is_rejected_in_every_collection() {
    let (store, _) = provisioned().await;

    for spec in COLLECTIONS {
        let mut record = bson::Document::new();
        for field in spec.unique_keys {
            record.insert(*field, format!("{}-value", field));
        }
        record.insert("payload", 1);

        store.insert(spec.name, record.clone()).await.unwrap();

        record.insert("payload", 2);
        let err = store.insert(spec.name, record).await.unwrap_err();
        assert!(err.is_duplicate(), "{} accepted a duplicate", spec.name);
    }
}

#[tokio::test]
async fn test_tuples_differing_in_one_field_are_accepted() {
    let (store, _) = provisioned().await;

    for spec in COLLECTIONS {
        let last = spec.unique_keys.len() - 1;
        for variant in ["a", "b"] {
            let mut record = bson::Document::new();
            for (i, field) in spec.unique_keys.iter().enumerate() {
                let value = if i == last {
                    format!("{}-{}", field, variant)
                } else {
                    format!("{}-shared", field)
                };
                record.insert(*field, value);
            }
            store.insert(spec.name, record).await.unwrap();
        }
        assert_eq!(store.count(spec.name).await.unwrap(), 2, "{}", spec.name);
    }
}

#[tokio::test]
async fn test_apikey_uniqueness_example() {
    let (store, _) = provisioned().await;

    store
        .insert("apikeys", doc! { "key": "abc", "userid": "u1" })
        .await
        .unwrap();
    let err = store
        .insert("apikeys", doc! { "key": "abc", "userid": "u1" })
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    store
        .insert("apikeys", doc! { "key": "abc", "userid": "u2" })
        .await
        .unwrap();
    assert_eq!(store.count("apikeys").await.unwrap(), 2);
}

#[tokio::test]
async fn test_principal_is_read_write_on_target_database_only() {
    let (store, _) = provisioned().await;

    let info = store.find_principal("zbiadmin").await.unwrap().unwrap();
    assert_eq!(info.roles, vec![RoleGrant::new("readWrite", "zbiRepo")]);
}

#[tokio::test]
async fn test_verify_is_clean_after_init() {
    let (store, _) = provisioned().await;
    assert!(verify_all(&store, Some("zbiadmin")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_seed_twice_inserts_once() {
    let (store, _) = provisioned().await;
    let seed = SeedFile::from_yaml_str(
        r#"
users:
  - userid: admin
    email: admin@example.com
passwords:
  admin: changeme
keys:
  - key: k1
    userid: admin
teams:
  - teamid: t1
    owner: admin
members:
  - teamid: t1
    email: admin@example.com
    key: owner
"#,
    )
    .unwrap();

    let first = Seeder::new(&store).load(&seed).await.unwrap();
    // users, passwords, user_policy, apikeys, apikey_policy, teams, team_members
    assert_eq!(first.created(), 7);

    let second = Seeder::new(&store).load(&seed).await.unwrap();
    assert_eq!(second.created(), 0);
    assert_eq!(second.existing(), 7);
    assert_eq!(store.count("users").await.unwrap(), 1);
}

#[tokio::test]
async fn test_seeded_password_is_hashed() {
    let store = MemoryStore::new("zbiRepo");
    Initializer::new(&store).run().await.unwrap();

    let seed = SeedFile::from_yaml_str(
        "users:\n  - userid: u1\n    email: u1@example.com\npasswords:\n  u1: plain\n",
    )
    .unwrap();
    Seeder::new(&store).load(&seed).await.unwrap();

    let records = store.records("passwords").await;
    assert_eq!(records.len(), 1);
    let hash = records[0].get_str("password").unwrap();
    assert!(hash.starts_with("$argon2id"));
    assert!(verify_password("plain", hash).unwrap());
    assert!(!verify_password("other", hash).unwrap());
}
