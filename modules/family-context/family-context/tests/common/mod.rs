#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test utilities for family-context integration tests

use family_context::FamilyContextConfig;
use family_context::FamilyContextModule;
use family_context::infra::storage::family_db::{open_with_schema, schema};
use family_context_sdk::FamilyId;
use finance_db::{CollectionSpec, DbHandle, Document};
use serde_json::{Value, json};

pub fn config(dir: &tempfile::TempDir) -> FamilyContextConfig {
    FamilyContextConfig::with_data_dir(dir.path())
}

pub fn module(dir: &tempfile::TempDir) -> FamilyContextModule {
    FamilyContextModule::new(config(dir))
}

pub fn id(s: &str) -> FamilyId {
    FamilyId::new(s).unwrap()
}

pub fn member(id: &str, name: &str, role: &str, email: Option<&str>) -> Value {
    let mut doc = json!({ "id": id, "name": name, "role": role });
    if let Some(email) = email {
        doc["email"] = json!(email);
    }
    doc
}

pub fn account(id: &str, member_id: &str, balance: i64) -> Value {
    json!({
        "id": id,
        "memberId": member_id,
        "name": format!("Account {id}"),
        "type": "checking",
        "currency": "USD",
        "balance": balance,
        "isActive": true
    })
}

/// Open the legacy single-family file with the current collection layout.
pub async fn open_legacy(dir: &tempfile::TempDir) -> DbHandle {
    let cfg = config(dir);
    open_with_schema(&cfg.data_dir, &cfg.legacy_db_name, &cfg.database.connect_opts())
        .await
        .unwrap()
}

pub async fn add_all(db: &DbHandle, spec: CollectionSpec, docs: &[Value]) {
    for doc in docs {
        spec.add(db.conn(), doc).await.unwrap();
    }
}

/// A legacy file owned by Greg with one more member, accounts and a
/// transaction, plus dark-theme app settings.
pub async fn seed_legacy(dir: &tempfile::TempDir) -> Vec<Value> {
    let db = open_legacy(dir).await;
    let members = vec![
        member("m-greg", "Greg", "owner", Some("greg@example.com")),
        member("m-sophia", "Sophia", "member", Some("sophia@example.com")),
    ];
    add_all(&db, schema::FAMILY_MEMBERS, &members).await;
    add_all(
        &db,
        schema::ACCOUNTS,
        &[account("acc-1", "m-greg", 5000), account("acc-2", "m-sophia", 120)],
    )
    .await;
    add_all(
        &db,
        schema::TRANSACTIONS,
        &[json!({
            "id": "tx-1",
            "accountId": "acc-1",
            "type": "expense",
            "amount": 42.5,
            "category": "groceries",
            "date": "2026-01-03"
        })],
    )
    .await;
    schema::SETTINGS
        .add(
            db.conn(),
            &json!({
                "id": "app_settings",
                "theme": "dark",
                "language": "uk",
                "baseCurrency": "USD",
                "exchangeRates": [{ "from": "USD", "to": "EUR", "rate": 0.92 }],
                "exchangeRateAutoUpdate": false
            }),
        )
        .await
        .unwrap();
    db.close().await;
    members
}

pub async fn docs(db: &DbHandle, spec: CollectionSpec) -> Vec<Document> {
    spec.get_all(db.conn()).await.unwrap()
}
