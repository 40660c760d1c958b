use sea_orm_migration::prelude::*;

use crate::infra::storage::family_db::schema::RECURRING_ITEMS;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        RECURRING_ITEMS.create(manager.get_connection()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        RECURRING_ITEMS.drop_table(manager.get_connection()).await
    }
}
