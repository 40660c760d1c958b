use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Handles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Handles::Key).string().not_null().primary_key())
                    .col(ColumnDef::new(Handles::Value).json().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Handles::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Handles {
    Table,
    Key,
    Value,
}
