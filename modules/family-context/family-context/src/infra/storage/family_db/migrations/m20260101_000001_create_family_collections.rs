use sea_orm_migration::prelude::*;

use crate::infra::storage::family_db::schema::{
    ACCOUNTS, ASSETS, FAMILY_MEMBERS, GOALS, SETTINGS, SYNC_QUEUE, TRANSACTIONS,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

const INITIAL: [finance_db::CollectionSpec; 7] = [
    FAMILY_MEMBERS,
    ACCOUNTS,
    TRANSACTIONS,
    ASSETS,
    GOALS,
    SETTINGS,
    SYNC_QUEUE,
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for collection in &INITIAL {
            collection.create(manager.get_connection()).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for collection in &INITIAL {
            collection.drop_table(manager.get_connection()).await?;
        }
        Ok(())
    }
}
