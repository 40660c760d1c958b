use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Families::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Families::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Families::Name).string().not_null())
                    .col(ColumnDef::new(Families::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Families::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserFamilyMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserFamilyMappings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserFamilyMappings::Email).string().not_null())
                    .col(ColumnDef::new(UserFamilyMappings::FamilyId).string().not_null())
                    .col(ColumnDef::new(UserFamilyMappings::FamilyRole).string().not_null())
                    .col(ColumnDef::new(UserFamilyMappings::MemberId).string().not_null())
                    .col(
                        ColumnDef::new(UserFamilyMappings::LastActiveAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserFamilyMappings::IsLocalOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_family_mappings_email")
                    .table(UserFamilyMappings::Table)
                    .col(UserFamilyMappings::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_family_mappings_family_id")
                    .table(UserFamilyMappings::Table)
                    .col(UserFamilyMappings::FamilyId)
                    .to_owned(),
            )
            .await?;

        // Offline-login session cache; superseded in the next schema version.
        manager
            .create_table(
                Table::create()
                    .table(CachedSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CachedSessions::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CachedSessions::Email).string().not_null())
                    .col(ColumnDef::new(CachedSessions::IdToken).text().not_null())
                    .col(ColumnDef::new(CachedSessions::AccessToken).text().not_null())
                    .col(ColumnDef::new(CachedSessions::RefreshToken).text())
                    .col(ColumnDef::new(CachedSessions::ExpiresAt).big_integer().not_null())
                    .col(ColumnDef::new(CachedSessions::FamilyId).string())
                    .col(ColumnDef::new(CachedSessions::CachedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_cached_sessions_family_id")
                    .table(CachedSessions::Table)
                    .col(CachedSessions::FamilyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GlobalSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GlobalSettings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GlobalSettings::Theme).string().not_null())
                    .col(ColumnDef::new(GlobalSettings::Language).string().not_null())
                    .col(ColumnDef::new(GlobalSettings::LastActiveFamilyId).string())
                    .col(ColumnDef::new(GlobalSettings::ExchangeRates).json().not_null())
                    .col(
                        ColumnDef::new(GlobalSettings::ExchangeRateAutoUpdate)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(GlobalSettings::ExchangeRateLastFetch)
                            .timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GlobalSettings::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CachedSessions::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserFamilyMappings::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Families::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Families {
    Table,
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserFamilyMappings {
    Table,
    Id,
    Email,
    FamilyId,
    FamilyRole,
    MemberId,
    LastActiveAt,
    IsLocalOnly,
}

#[derive(DeriveIden)]
pub(super) enum CachedSessions {
    Table,
    UserId,
    Email,
    IdToken,
    AccessToken,
    RefreshToken,
    ExpiresAt,
    FamilyId,
    CachedAt,
}

#[derive(DeriveIden)]
enum GlobalSettings {
    Table,
    Id,
    Theme,
    Language,
    LastActiveFamilyId,
    ExchangeRates,
    ExchangeRateAutoUpdate,
    ExchangeRateLastFetch,
}
