//! Create bucket and bucket access tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bucket::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bucket::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bucket::AccountId).string_len(32).not_null())
                    .col(ColumnDef::new(Bucket::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Bucket::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Bucket::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bucket_account_id")
                    .table(Bucket::Table)
                    .col(Bucket::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BucketAccess::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BucketAccess::BucketId).string_len(32).not_null())
                    .col(ColumnDef::new(BucketAccess::UserId).string_len(32).not_null())
                    .primary_key(
                        Index::create()
                            .col(BucketAccess::BucketId)
                            .col(BucketAccess::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bucket_access_bucket")
                            .from(BucketAccess::Table, BucketAccess::BucketId)
                            .to(Bucket::Table, Bucket::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bucket_access_user")
                            .from(BucketAccess::Table, BucketAccess::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: user_id (accessible bubbles lookup)
        manager
            .create_index(
                Index::create()
                    .name("idx_bucket_access_user_id")
                    .table(BucketAccess::Table)
                    .col(BucketAccess::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BucketAccess::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bucket::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Bucket {
    Table,
    Id,
    AccountId,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum BucketAccess {
    Table,
    BucketId,
    UserId,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
