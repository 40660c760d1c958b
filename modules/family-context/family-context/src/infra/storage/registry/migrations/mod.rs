use sea_orm_migration::MigrationTrait;

pub mod m20260101_000001_create_registry;
pub mod m20260215_000002_drop_cached_sessions;

/// Registry schema, oldest first.
#[must_use]
pub fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
        Box::new(m20260101_000001_create_registry::Migration),
        Box::new(m20260215_000002_drop_cached_sessions::Migration),
    ]
}
