//! Initial schema migration.
//!
//! - `currencies`: registry of currency codes
//! - `obligations`: money owed, with its settlement balance and version
//! - `transfers`: payments applied against an obligation

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Currencies {
    Table,
    Code,
}

#[derive(Iden)]
enum Obligations {
    Table,
    Id,
    Currency,
    TotalAmountMinor,
    SettledMinor,
    ToSettleMinor,
    IsSettled,
    RequiresVat,
    Owner,
    Version,
}

#[derive(Iden)]
enum Transfers {
    Table,
    Id,
    ObligationId,
    Currency,
    NettoMinor,
    VatMinor,
    BruttoMinor,
    IsVat,
    SentAt,
    IsBooked,
    Owner,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Currencies
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Currencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Currencies::Code)
                            .string_len(15)
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Obligations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Obligations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Obligations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Obligations::Currency).string_len(15).not_null())
                    .col(
                        ColumnDef::new(Obligations::TotalAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Obligations::SettledMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Obligations::ToSettleMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Obligations::IsSettled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Obligations::RequiresVat)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Obligations::Owner).string().not_null())
                    .col(
                        ColumnDef::new(Obligations::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-obligations-currency")
                            .from(Obligations::Table, Obligations::Currency)
                            .to(Currencies::Table, Currencies::Code)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-obligations-owner")
                    .table(Obligations::Table)
                    .col(Obligations::Owner)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transfers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transfers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transfers::ObligationId).string().not_null())
                    .col(ColumnDef::new(Transfers::Currency).string_len(15).not_null())
                    .col(ColumnDef::new(Transfers::NettoMinor).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::VatMinor).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::BruttoMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Transfers::IsVat)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transfers::SentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transfers::IsBooked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Transfers::Owner).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-obligation_id")
                            .from(Transfers::Table, Transfers::ObligationId)
                            .to(Obligations::Table, Obligations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-currency")
                            .from(Transfers::Table, Transfers::Currency)
                            .to(Currencies::Table, Currencies::Code)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-obligation_id")
                    .table(Transfers::Table)
                    .col(Transfers::ObligationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-owner")
                    .table(Transfers::Table)
                    .col(Transfers::Owner)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Obligations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Currencies::Table).to_owned())
            .await?;
        Ok(())
    }
}
