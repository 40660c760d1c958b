#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{account, add_all, docs, id, member, module};
use family_context::domain::DomainError;
use family_context::infra::storage::family_db::{database_name, schema};
use serde_json::json;

#[tokio::test]
async fn fresh_process_has_no_active_family() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    assert!(!ctx.is_active());
    assert!(ctx.active_family_id().is_none());
    assert!(matches!(
        ctx.active_db().await,
        Err(DomainError::NoActiveFamily)
    ));
}

#[test]
fn database_names_are_deterministic() {
    let a = database_name("gp-family-finance", &id("family-a"));
    assert_eq!(a, database_name("gp-family-finance", &id("family-a")));
    assert_ne!(a, database_name("gp-family-finance", &id("family-b")));
    assert_eq!(a, "gp-family-finance-family-a");
}

#[tokio::test]
async fn writes_under_one_family_are_invisible_to_another() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    let a = ctx.create_family("Family A").await.unwrap();
    let db = ctx.active_db().await.unwrap();
    schema::GOALS
        .add(db.conn(), &json!({ "id": "goal-1", "memberId": "m1", "targetAmount": 1000 }))
        .await
        .unwrap();

    let b = ctx.create_family("Family B").await.unwrap();
    assert!(db.is_closed(), "switching must close the previous handle");
    let db = ctx.active_db().await.unwrap();
    assert!(docs(&db, schema::GOALS).await.is_empty());

    ctx.activate(&a.id).await.unwrap().unwrap();
    let db = ctx.active_db().await.unwrap();
    let goals = docs(&db, schema::GOALS).await;
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["targetAmount"], 1000);

    assert_ne!(a.id, b.id);
    assert!(dir.path().join(format!("gp-family-finance-{}.db", a.id)).exists());
    assert!(dir.path().join(format!("gp-family-finance-{}.db", b.id)).exists());
}

#[tokio::test]
async fn rapid_switching_neither_loses_nor_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    let a = ctx.create_family("A").await.unwrap();
    let db = ctx.active_db().await.unwrap();
    add_all(&db, schema::ACCOUNTS, &[account("acc-a", "m1", 10)]).await;
    let b = ctx.create_family("B").await.unwrap();
    let db = ctx.active_db().await.unwrap();
    add_all(&db, schema::ACCOUNTS, &[account("acc-b", "m2", 20)]).await;

    for _ in 0..10 {
        for (family, expected) in [(&a, "acc-a"), (&b, "acc-b")] {
            ctx.activate(&family.id).await.unwrap().unwrap();
            let db = ctx.active_db().await.unwrap();
            let accounts = docs(&db, schema::ACCOUNTS).await;
            assert_eq!(accounts.len(), 1);
            assert_eq!(accounts[0]["id"], expected);
        }
    }
}

#[tokio::test]
async fn two_families_keep_members_and_accounts_apart() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    let greg_family = ctx.create_family("Greg Family").await.unwrap();
    let db = ctx.active_db().await.unwrap();
    add_all(
        &db,
        schema::FAMILY_MEMBERS,
        &[
            member("m-greg", "Greg", "owner", Some("greg@example.com")),
            member("m-sophia", "Sophia", "member", Some("sophia@example.com")),
        ],
    )
    .await;
    add_all(&db, schema::ACCOUNTS, &[account("acc-greg", "m-greg", 5000)]).await;

    let test_family = ctx.create_family("Test User Family").await.unwrap();
    let db = ctx.active_db().await.unwrap();
    add_all(
        &db,
        schema::FAMILY_MEMBERS,
        &[member("m-test", "Test User", "owner", Some("test@example.com"))],
    )
    .await;

    ctx.activate(&test_family.id).await.unwrap().unwrap();
    let db = ctx.active_db().await.unwrap();
    let members = docs(&db, schema::FAMILY_MEMBERS).await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["name"], "Test User");
    assert!(docs(&db, schema::ACCOUNTS).await.is_empty());

    ctx.activate(&greg_family.id).await.unwrap().unwrap();
    let db = ctx.active_db().await.unwrap();
    assert_eq!(docs(&db, schema::FAMILY_MEMBERS).await.len(), 2);
    let accounts = docs(&db, schema::ACCOUNTS).await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["balance"], 5000);

    let by_member = schema::ACCOUNTS
        .get_all_by_index(db.conn(), "by_member_id", "m-greg")
        .await
        .unwrap();
    assert_eq!(by_member.len(), 1);
}

#[tokio::test]
async fn member_email_is_unique_within_a_family_only() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    ctx.create_family("One").await.unwrap();
    let db = ctx.active_db().await.unwrap();
    add_all(
        &db,
        schema::FAMILY_MEMBERS,
        &[member("m1", "Greg", "owner", Some("greg@example.com"))],
    )
    .await;
    let err = schema::FAMILY_MEMBERS
        .add(db.conn(), &member("m2", "Other", "member", Some("greg@example.com")))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key());

    ctx.create_family("Two").await.unwrap();
    let db = ctx.active_db().await.unwrap();
    schema::FAMILY_MEMBERS
        .add(db.conn(), &member("m1", "Greg", "owner", Some("greg@example.com")))
        .await
        .unwrap();
}
