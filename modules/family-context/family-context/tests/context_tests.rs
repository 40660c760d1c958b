#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{id, module};
use family_context::domain::DomainError;
use family_context::domain::MigrationStatus;
use family_context_sdk::{FamilyContextError, FamilyRole, GlobalSettingsPatch, Theme};

#[tokio::test]
async fn create_family_activates_and_remembers_it() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    let family = ctx.create_family("  My Family ").await.unwrap();
    assert_eq!(family.name, "My Family");
    assert_eq!(family.created_at, family.updated_at);
    assert!(ctx.is_active());
    assert_eq!(ctx.active_family_id(), Some(family.id.clone()));
    assert_eq!(
        ctx.global_settings().await.unwrap().last_active_family_id,
        Some(family.id)
    );
}

#[tokio::test]
async fn last_active_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let b = {
        let m = module(&dir);
        m.context().create_family("A").await.unwrap();
        let b = m.context().create_family("B").await.unwrap();
        m.shutdown().await;
        b
    };

    let m = module(&dir);
    let last = m.context().last_active().await.unwrap().unwrap();
    assert_eq!(last.id, b.id);
    assert_eq!(last.name, "B");
    assert!(!m.context().is_active());

    let active = m.start().await.unwrap().unwrap();
    assert_eq!(active.id, b.id);
    assert_eq!(m.state().active().unwrap().id, b.id);
    assert_eq!(m.state().families().len(), 2);
}

#[tokio::test]
async fn dangling_last_active_resolves_to_none() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    ctx.save_global_settings(GlobalSettingsPatch {
        last_active_family_id: Some(Some(id("gone"))),
        ..GlobalSettingsPatch::default()
    })
    .await
    .unwrap();
    assert!(ctx.last_active().await.unwrap().is_none());
}

#[tokio::test]
async fn create_with_id_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();
    let fid = id("auth-family-1");

    let first = ctx.create_family_with_id(&fid, "X").await.unwrap();
    ctx.create_family("Elsewhere").await.unwrap();
    let second = ctx.create_family_with_id(&fid, "Y").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.name, "X");
    assert_eq!(ctx.active_family_id(), Some(fid.clone()));
    assert_eq!(
        ctx.list_families()
            .await
            .unwrap()
            .iter()
            .filter(|f| f.id == fid)
            .count(),
        1
    );
}

#[tokio::test]
async fn activate_unknown_family_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    let known = ctx.create_family("Known").await.unwrap();
    assert!(ctx.activate(&id("missing")).await.unwrap().is_none());
    assert_eq!(ctx.active_family_id(), Some(known.id.clone()));
    assert_eq!(ctx.last_active().await.unwrap().unwrap().id, known.id);
}

#[tokio::test]
async fn rename_updates_name_and_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    let family = ctx.create_family("Old").await.unwrap();
    let renamed = ctx.rename(&family.id, "New").await.unwrap().unwrap();
    assert_eq!(renamed.name, "New");
    assert_eq!(renamed.created_at, family.created_at);
    assert!(renamed.updated_at >= family.updated_at);
    assert_eq!(
        ctx.get_family(&family.id).await.unwrap().unwrap().name,
        "New"
    );

    assert!(ctx.rename(&id("missing"), "Name").await.unwrap().is_none());
}

#[tokio::test]
async fn names_are_validated() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    assert!(matches!(
        ctx.create_family("   ").await,
        Err(DomainError::Validation { field: "name", .. })
    ));
    assert!(matches!(
        ctx.create_family(&"x".repeat(256)).await,
        Err(DomainError::Validation { .. })
    ));
    assert!(ctx.create_family(&"x".repeat(255)).await.is_ok());
}

#[tokio::test]
async fn unknown_email_has_no_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();

    assert!(
        ctx.find_mappings_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        ctx.resolve_family_for_email("nobody@example.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn link_user_updates_existing_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let ctx = m.context();
    let family = ctx.create_family("Greg Family").await.unwrap();

    let first = ctx
        .link_user("greg@example.com", &family.id, FamilyRole::Member, "m1")
        .await
        .unwrap();
    let second = ctx
        .link_user("greg@example.com", &family.id, FamilyRole::Owner, "m1")
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let mappings = ctx.find_mappings_by_email("greg@example.com").await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].family_role, FamilyRole::Owner);
    assert_eq!(
        ctx.find_mappings_by_family_id(&family.id).await.unwrap().len(),
        1
    );
    assert_eq!(
        ctx.resolve_family_for_email("greg@example.com")
            .await
            .unwrap()
            .unwrap()
            .id,
        family.id
    );

    assert!(matches!(
        ctx.link_user("greg@example.com", &id("ghost"), FamilyRole::Member, "m1")
            .await,
        Err(DomainError::FamilyNotFound(_))
    ));
}

#[tokio::test]
async fn fresh_start_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);

    assert_eq!(
        m.migration().check().await.unwrap(),
        MigrationStatus::NothingToMigrate
    );
    assert!(m.start().await.unwrap().is_none());
    assert!(m.context().last_active().await.unwrap().is_none());

    let family = m.state().create_family("My Family").await.unwrap();
    assert_eq!(m.state().active().unwrap().id, family.id);
    assert_eq!(m.context().active_family_id(), Some(family.id.clone()));
    assert_eq!(
        m.context().last_active().await.unwrap().unwrap().id,
        family.id
    );
}

#[tokio::test]
async fn state_tracks_switches_and_renames() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let state = m.state();

    let a = state.create_family("A").await.unwrap();
    let b = state.create_family("B").await.unwrap();
    assert_eq!(state.families().len(), 2);
    assert_eq!(state.active().unwrap().id, b.id);

    state.switch_family(&a.id).await.unwrap();
    let renamed = state.rename_active("A prime").await.unwrap();
    assert_eq!(renamed.id, a.id);
    assert_eq!(state.active().unwrap().name, "A prime");
    assert!(
        state
            .families()
            .iter()
            .any(|f| f.id == a.id && f.name == "A prime")
    );

    assert!(matches!(
        state.switch_family(&id("missing")).await,
        Err(DomainError::FamilyNotFound(_))
    ));
    assert_eq!(state.active().unwrap().id, a.id);

    state.reload().await.unwrap();
    assert_eq!(state.active().unwrap().name, "A prime");
}

#[tokio::test]
async fn client_maps_errors_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    let m = module(&dir);
    let client = m.client();

    assert!(client.initialize().await.unwrap().is_none());
    assert!(matches!(
        client.switch_family(&id("missing")).await,
        Err(FamilyContextError::FamilyNotFound { family_id }) if family_id == "missing"
    ));
    assert!(matches!(
        client.create_family("").await,
        Err(FamilyContextError::Validation { .. })
    ));

    let family = client.create_family("Family").await.unwrap();
    assert_eq!(client.active_family_id(), Some(family.id.clone()));

    let settings = client
        .save_global_settings(GlobalSettingsPatch {
            theme: Some(Theme::Light),
            ..GlobalSettingsPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.theme, Theme::Light);
    assert_eq!(settings.last_active_family_id, Some(family.id));
}
