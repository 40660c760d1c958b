use sea_orm_migration::MigrationTrait;

pub mod m20260101_000001_create_family_collections;
pub mod m20260120_000002_add_recurring_items;
pub mod m20260201_000003_add_translations;

/// Family database schema, oldest first.
#[must_use]
pub fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
        Box::new(m20260101_000001_create_family_collections::Migration),
        Box::new(m20260120_000002_add_recurring_items::Migration),
        Box::new(m20260201_000003_add_translations::Migration),
    ]
}
