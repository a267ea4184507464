//! Create bubble, tagging and assignment tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bubble::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bubble::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Bubble::BucketId).string_len(32).not_null())
                    .col(ColumnDef::new(Bubble::CreatorId).string_len(32).not_null())
                    .col(ColumnDef::new(Bubble::Title).string_len(512).not_null())
                    .col(ColumnDef::new(Bubble::ActivityScore).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Bubble::CommentsCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Bubble::BoostsCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Bubble::PoppedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Bubble::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Bubble::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bubble_bucket")
                            .from(Bubble::Table, Bubble::BucketId)
                            .to(Bucket::Table, Bucket::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: bucket_id (bucket membership and accessibility)
        manager
            .create_index(
                Index::create()
                    .name("idx_bubble_bucket_id")
                    .table(Bubble::Table)
                    .col(Bubble::BucketId)
                    .to_owned(),
            )
            .await?;

        // Index: popped_at (active/popped split)
        manager
            .create_index(
                Index::create()
                    .name("idx_bubble_popped_at")
                    .table(Bubble::Table)
                    .col(Bubble::PoppedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tagging::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tagging::BubbleId).string_len(32).not_null())
                    .col(ColumnDef::new(Tagging::TagId).string_len(32).not_null())
                    .primary_key(Index::create().col(Tagging::BubbleId).col(Tagging::TagId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tagging_bubble")
                            .from(Tagging::Table, Tagging::BubbleId)
                            .to(Bubble::Table, Bubble::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tagging_tag")
                            .from(Tagging::Table, Tagging::TagId)
                            .to(Tag::Table, Tag::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tagging_tag_id")
                    .table(Tagging::Table)
                    .col(Tagging::TagId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Assignment::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Assignment::BubbleId).string_len(32).not_null())
                    .col(ColumnDef::new(Assignment::AssigneeId).string_len(32).not_null())
                    .primary_key(
                        Index::create()
                            .col(Assignment::BubbleId)
                            .col(Assignment::AssigneeId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignment_bubble")
                            .from(Assignment::Table, Assignment::BubbleId)
                            .to(Bubble::Table, Bubble::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignment_assignee")
                            .from(Assignment::Table, Assignment::AssigneeId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_assignment_assignee_id")
                    .table(Assignment::Table)
                    .col(Assignment::AssigneeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Assignment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tagging::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bubble::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Bubble {
    Table,
    Id,
    BucketId,
    CreatorId,
    Title,
    ActivityScore,
    CommentsCount,
    BoostsCount,
    PoppedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tagging {
    Table,
    BubbleId,
    TagId,
}

#[derive(Iden)]
enum Assignment {
    Table,
    BubbleId,
    AssigneeId,
}

#[derive(Iden)]
enum Bucket {
    Table,
    Id,
}

#[derive(Iden)]
enum Tag {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
