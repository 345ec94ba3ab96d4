use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customers::Name).string().not_null())
                    .col(
                        ColumnDef::new(Customers::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Customers::Age).integer().not_null())
                    .col(ColumnDef::new(Customers::Gender).string().not_null())
                    .col(ColumnDef::new(Customers::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Customers::Role).string().not_null())
                    .col(
                        ColumnDef::new(Customers::ProfileImageId)
                            .string()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Customers::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Customers::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    Id,
    Name,
    Email,
    Age,
    Gender,
    PasswordHash,
    Role,
    ProfileImageId,
    CreatedAt,
    UpdatedAt,
}
