//! Create charge_points table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChargePoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChargePoints::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChargePoints::SerialNumber).string().not_null())
                    .col(ColumnDef::new(ChargePoints::Vendor).string())
                    .col(ColumnDef::new(ChargePoints::Model).string())
                    .col(ColumnDef::new(ChargePoints::PasswordHash).string())
                    .col(
                        ColumnDef::new(ChargePoints::Status)
                            .string()
                            .not_null()
                            .default("Unavailable"),
                    )
                    .col(ColumnDef::new(ChargePoints::LastActivity).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ChargePoints::RegisteredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_charge_points_serial_number")
                    .table(ChargePoints::Table)
                    .col(ChargePoints::SerialNumber)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChargePoints::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ChargePoints {
    Table,
    Id,
    SerialNumber,
    Vendor,
    Model,
    PasswordHash,
    Status,
    LastActivity,
    RegisteredAt,
}
