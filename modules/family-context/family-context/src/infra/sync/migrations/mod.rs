use sea_orm_migration::MigrationTrait;

pub mod m20260101_000001_create_handles;

#[must_use]
pub fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![Box::new(m20260101_000001_create_handles::Migration)]
}
