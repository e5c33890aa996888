//! End-to-end tests for the data layer: migrations, CRUD, visibility, auth.

use quorum_db::auth::{AuthStore, RegisterRequest};
use quorum_db::migrations::Migrator;
use quorum_db::{Database, ListOptions, RecordStore};
use serde_json::{json, Map, Value};

async fn fresh_store() -> (Database, RecordStore) {
    let db = Database::open_in_memory().await.unwrap();
    Migrator::builtin().up(&db).await.unwrap();
    (db.clone(), RecordStore::new(db))
}

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().unwrap().clone()
}

async fn register(auth: &AuthStore, username: &str) -> String {
    auth.register(&RegisterRequest {
        username: username.to_string(),
        email: format!("{username}@example.org"),
        password: "correct horse".to_string(),
        name: username.to_string(),
    })
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn migrations_apply_once_and_roll_back() {
    let db = Database::open_in_memory().await.unwrap();
    let migrator = Migrator::builtin();

    let ran = migrator.up(&db).await.unwrap();
    assert_eq!(ran, migrator.migrations().len());
    assert_eq!(migrator.up(&db).await.unwrap(), 0, "up must be idempotent");

    let schema = db.load_schema().await.unwrap();
    assert!(schema.collection("profiles").unwrap().has_field("research_interests"));

    // seed a profile, then roll back the rename/remove step
    let store = RecordStore::new(db.clone());
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;
    let profiles = store.list("profiles", Some(&alice), &ListOptions::default()).await.unwrap();
    let profile_id = profiles.items[0].id.clone();
    store
        .update(
            "profiles",
            &profile_id,
            obj(json!({ "research_interests": ["genomics"] })),
            Some(&alice),
        )
        .await
        .unwrap();

    let reverted = migrator.down(&db).await.unwrap();
    assert_eq!(reverted.as_deref(), Some("0008_profile_cleanup"));

    let schema = db.load_schema().await.unwrap();
    let profiles_schema = schema.collection("profiles").unwrap();
    assert!(profiles_schema.has_field("interests"));
    assert!(profiles_schema.has_field("email"));
    assert!(!profiles_schema.has_field("research_interests"));

    // the stored document was rewritten along with the schema
    let rec = store.get("profiles", &profile_id, Some(&alice)).await.unwrap();
    assert_eq!(rec.fields.get("interests"), Some(&json!(["genomics"])));
    assert!(rec.fields.get("research_interests").is_none());

    // and re-applying brings the current shape back
    assert_eq!(migrator.up(&db).await.unwrap(), 1);
    let rec = store.get("profiles", &profile_id, Some(&alice)).await.unwrap();
    assert_eq!(rec.fields.get("research_interests"), Some(&json!(["genomics"])));
}

#[tokio::test]
async fn creator_is_always_a_collaborator() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;

    let project = store
        .create(
            "research_projects",
            obj(json!({ "title": "Pan-genome atlas" })),
            Some(&alice),
        )
        .await
        .unwrap();
    assert_eq!(project.fields["collaborators"], json!([&alice]));

    // an explicit collaborator list still gets the creator added, once
    let bob = register(&auth, "bob").await;
    let project = store
        .create(
            "research_projects",
            obj(json!({ "title": "Folding", "collaborators": [&bob, &alice] })),
            Some(&alice),
        )
        .await
        .unwrap();
    let collabs = project.fields["collaborators"].as_array().unwrap();
    assert_eq!(collabs.iter().filter(|v| v.as_str() == Some(alice.as_str())).count(), 1);
}

#[tokio::test]
async fn visibility_rules() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;
    let bob = register(&auth, "bob").await;

    let private = store
        .create(
            "research_projects",
            obj(json!({ "title": "Secret", "public": false })),
            Some(&alice),
        )
        .await
        .unwrap();

    // collaborator sees it, others don't (get reports NotFound, not Forbidden)
    assert!(store.get("research_projects", &private.id, Some(&alice)).await.is_ok());
    assert!(store.get("research_projects", &private.id, Some(&bob)).await.is_err());
    assert!(store.get("research_projects", &private.id, None).await.is_err());

    let listed = store
        .list("research_projects", Some(&bob), &ListOptions::default())
        .await
        .unwrap();
    assert_eq!(listed.total_items, 0);

    // flipping public makes it visible to everyone
    store
        .update("research_projects", &private.id, obj(json!({ "public": true })), Some(&alice))
        .await
        .unwrap();
    assert!(store.get("research_projects", &private.id, Some(&bob)).await.is_ok());

    // but still only writable by collaborators
    let err = store
        .update("research_projects", &private.id, obj(json!({ "title": "Hijack" })), Some(&bob))
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;

    for title in ["Genome atlas", "Genome browser", "Protein folding"] {
        store
            .create(
                "research_projects",
                obj(json!({ "title": title, "public": true })),
                Some(&alice),
            )
            .await
            .unwrap();
    }

    let hits = store
        .list(
            "research_projects",
            None,
            &ListOptions { filter: Some("title ~ 'genome'".into()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(hits.total_items, 2);

    let page = store
        .list(
            "research_projects",
            None,
            &ListOptions { page: Some(2), per_page: Some(2), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(page.total_items, 3);
    assert_eq!(page.items.len(), 1);

    let bad = store
        .list(
            "research_projects",
            None,
            &ListOptions { filter: Some("title ~".into()), ..Default::default() },
        )
        .await;
    assert!(bad.is_err());

    // absurd page numbers read as an empty page, never a panic
    let far = store
        .list(
            "research_projects",
            None,
            &ListOptions { page: Some(u32::MAX), per_page: Some(200), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(far.total_items, 3);
    assert!(far.items.is_empty());
}

#[tokio::test]
async fn delete_is_hard() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;

    let m = store
        .create("models", obj(json!({ "name": "resnet-lite" })), Some(&alice))
        .await
        .unwrap();
    store.delete("models", &m.id, Some(&alice)).await.unwrap();
    assert!(store.get("models", &m.id, Some(&alice)).await.is_err());
}

#[tokio::test]
async fn expand_embeds_relation_records_and_skips_dangling() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;

    let project = store
        .create(
            "research_projects",
            obj(json!({
                "title": "Atlas",
                "public": true,
                "related_projects": ["doesnotexist0000"]
            })),
            Some(&alice),
        )
        .await
        .unwrap();

    let expanded = store
        .expand(
            "research_projects",
            &project,
            &["collaborators", "related_projects"],
            Some(&alice),
        )
        .await
        .unwrap();
    let collabs = expanded["collaborators"].as_array().unwrap();
    assert_eq!(collabs.len(), 1);
    assert_eq!(collabs[0]["username"], json!("alice"));
    assert_eq!(expanded["related_projects"], json!([]));
}

#[tokio::test]
async fn auth_flow() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;

    // registration created the 1:1 profile
    let profiles = store.list("profiles", Some(&alice), &ListOptions::default()).await.unwrap();
    assert_eq!(profiles.total_items, 1);
    assert_eq!(profiles.items[0].fields["user"], json!(&alice));

    assert!(auth.login("alice", "wrong password").await.is_err());
    let session = auth.login("alice", "correct horse").await.unwrap();
    let user = auth.verify(&session.token).await.unwrap();
    assert_eq!(user.id, alice);

    // email works as identity too
    assert!(auth.login("alice@example.org", "correct horse").await.is_ok());

    auth.logout(&session.token).await.unwrap();
    assert!(auth.verify(&session.token).await.is_err());

    // duplicate registration is rejected
    let dup = auth
        .register(&RegisterRequest {
            username: "alice".into(),
            email: "other@example.org".into(),
            password: "long enough".into(),
            name: String::new(),
        })
        .await;
    assert!(dup.is_err());
}

#[tokio::test]
async fn quoted_identities_cannot_break_login() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());

    // a legal email containing a quote registers and logs in fine
    auth.register(&RegisterRequest {
        username: "quoter".into(),
        email: "a'b@example.org".into(),
        password: "correct horse".into(),
        name: String::new(),
    })
    .await
    .unwrap();
    assert!(auth.login("a'b@example.org", "correct horse").await.is_ok());

    // operator-shaped identities are plain mismatches, not parse errors
    // and never match someone else's account
    assert!(auth.login("x' || username != '", "correct horse").await.is_err());
}

#[tokio::test]
async fn a_user_has_at_most_one_profile() {
    let (_db, store) = fresh_store().await;
    let auth = AuthStore::new(store.clone());
    let alice = register(&auth, "alice").await;

    // registration already created the profile; another create must fail
    let implicit = store.create("profiles", obj(json!({})), Some(&alice)).await;
    assert!(implicit.is_err());
    let explicit = store
        .create("profiles", obj(json!({ "user": &alice })), Some(&alice))
        .await;
    assert!(explicit.is_err());

    let profiles = store.list("profiles", Some(&alice), &ListOptions::default()).await.unwrap();
    assert_eq!(profiles.total_items, 1);
}

#[tokio::test]
async fn failed_migration_keeps_earlier_steps_persisted() {
    use quorum_db::migrations::{Migration, SchemaOp};
    use quorum_db::schema::{CollectionSchema, Field, FieldType};

    let db = Database::open_in_memory().await.unwrap();
    let migrator = Migrator::new(vec![
        Migration::new(
            "0001_widgets",
            vec![SchemaOp::CreateCollection {
                collection: CollectionSchema::new(
                    "widgets",
                    vec![Field::new("name", FieldType::Text)],
                ),
            }],
        ),
        Migration::new(
            "0002_broken",
            vec![SchemaOp::AddField {
                collection: "missing".into(),
                field: Field::new("x", FieldType::Text),
            }],
        ),
    ]);
    assert!(migrator.up(&db).await.is_err());

    // the step that ran is persisted, schema and log in agreement
    let schema = db.load_schema().await.unwrap();
    assert!(schema.collection("widgets").is_some());
    let store = RecordStore::new(db);
    assert!(store
        .create("widgets", obj(json!({ "name": "w" })), None)
        .await
        .is_ok());
}

#[tokio::test]
async fn reopening_a_file_database_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quorum.db");

    let id = {
        let db = Database::open(&path).await.unwrap();
        Migrator::builtin().up(&db).await.unwrap();
        let store = RecordStore::new(db.clone());
        let auth = AuthStore::new(store.clone());
        let alice = register(&auth, "alice").await;
        store
            .create("models", obj(json!({ "name": "resnet", "public": true })), Some(&alice))
            .await
            .unwrap()
            .id
    };

    let db = Database::open(&path).await.unwrap();
    assert_eq!(Migrator::builtin().up(&db).await.unwrap(), 0);
    let store = RecordStore::new(db);
    let rec = store.get("models", &id, None).await.unwrap();
    assert_eq!(rec.fields["name"], json!("resnet"));
}
