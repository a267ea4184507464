//! Create filter and filter join tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Filter::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Filter::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Filter::CreatorId).string_len(32).not_null())
                    .col(ColumnDef::new(Filter::Params).json_binary().not_null().default("{}"))
                    .col(
                        ColumnDef::new(Filter::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Filter::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_filter_creator")
                            .from(Filter::Table, Filter::CreatorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (creator_id, params). Filter creation relies on this
        // exact shape to detect a concurrent equal insert.
        manager
            .create_index(
                Index::create()
                    .name("idx_filter_creator_params")
                    .table(Filter::Table)
                    .col(Filter::CreatorId)
                    .col(Filter::Params)
                    .unique()
                    .to_owned(),
            )
            .await?;

        create_join_table(manager, "filter_bucket", "bucket_id", "bucket").await?;
        create_join_table(manager, "filter_tag", "tag_id", "tag").await?;
        create_join_table(manager, "filter_assignee", "assignee_id", "user").await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("filter_assignee")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("filter_tag")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("filter_bucket")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Filter::Table).to_owned())
            .await
    }
}

/// Create a `(filter_id, <resource>_id)` join table with cascading foreign keys
/// and an index on the resource side (used when a resource is removed).
async fn create_join_table(
    manager: &SchemaManager<'_>,
    name: &str,
    resource_col: &str,
    resource_table: &str,
) -> Result<(), DbErr> {
    let table = Alias::new(name);
    let filter_col = Alias::new("filter_id");
    let resource_col = Alias::new(resource_col);

    manager
        .create_table(
            Table::create()
                .table(table.clone())
                .if_not_exists()
                .col(ColumnDef::new(filter_col.clone()).string_len(32).not_null())
                .col(ColumnDef::new(resource_col.clone()).string_len(32).not_null())
                .primary_key(
                    Index::create()
                        .col(filter_col.clone())
                        .col(resource_col.clone()),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name(format!("fk_{name}_filter"))
                        .from(table.clone(), filter_col)
                        .to(Filter::Table, Filter::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name(format!("fk_{name}_resource"))
                        .from(table.clone(), resource_col.clone())
                        .to(Alias::new(resource_table), Alias::new("id"))
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name(format!("idx_{name}_resource"))
                .table(table)
                .col(resource_col)
                .to_owned(),
        )
        .await
}

#[derive(Iden)]
enum Filter {
    Table,
    Id,
    CreatorId,
    Params,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
