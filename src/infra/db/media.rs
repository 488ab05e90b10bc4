use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{MediaRepo, RepoError},
    domain::media::{MediaFolder, MediaId, MediaItem},
};

use super::{PostgresRepositories, map_sqlx_error};

const MEDIA_COLUMNS: &str = "m.id, m.url, m.alt_text, m.active, m.tags, m.folder_id, m.created_at";

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: Uuid,
    url: String,
    alt_text: Option<String>,
    active: bool,
    tags: Vec<String>,
    folder_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl From<MediaRow> for MediaItem {
    fn from(row: MediaRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            alt_text: row.alt_text,
            active: row.active,
            tags: row.tags,
            folder_id: row.folder_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FolderRow {
    id: Uuid,
    name: String,
}

impl PostgresRepositories {
    async fn fetch_media<'q>(
        &self,
        query: sqlx::query::QueryAs<'q, sqlx::Postgres, MediaRow, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<MediaItem>, RepoError> {
        let rows = query.fetch_all(self.pool()).await.map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(MediaItem::from).collect())
    }
}

#[async_trait]
impl MediaRepo for PostgresRepositories {
    async fn find_media(&self, id: MediaId) -> Result<Option<MediaItem>, RepoError> {
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media_items m WHERE m.id = $1");
        let row = sqlx::query_as::<_, MediaRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(MediaItem::from))
    }

    async fn list_active_by_tag(
        &self,
        tag: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items m \
             WHERE m.active AND $1 = ANY(m.tags) \
             ORDER BY m.created_at DESC LIMIT $2"
        );
        self.fetch_media(
            sqlx::query_as::<_, MediaRow>(&sql)
                .bind(tag)
                .bind(Self::limit(limit)),
        )
        .await
    }

    async fn list_active_by_folder(
        &self,
        folder_id: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items m \
             WHERE m.active AND m.folder_id::text = $1 \
             ORDER BY m.created_at DESC LIMIT $2"
        );
        self.fetch_media(
            sqlx::query_as::<_, MediaRow>(&sql)
                .bind(folder_id)
                .bind(Self::limit(limit)),
        )
        .await
    }

    async fn find_folder_by_name(&self, name: &str) -> Result<Option<MediaFolder>, RepoError> {
        let row = sqlx::query_as::<_, FolderRow>(
            r#"
            SELECT id, name
            FROM media_folders
            WHERE name = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| MediaFolder {
            id: row.id,
            name: row.name,
        }))
    }

    async fn list_folder_by_any_tag(
        &self,
        folder_id: Uuid,
        tags: &[&str],
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        let tags: Vec<String> = tags.iter().map(|tag| tag.to_string()).collect();
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items m \
             WHERE m.active AND m.folder_id = $1 AND m.tags && $2::text[] \
             ORDER BY m.created_at DESC LIMIT $3"
        );
        self.fetch_media(
            sqlx::query_as::<_, MediaRow>(&sql)
                .bind(folder_id)
                .bind(tags)
                .bind(Self::limit(limit)),
        )
        .await
    }

    async fn list_gallery_media(
        &self,
        gallery_id: &str,
        limit: u32,
    ) -> Result<Vec<MediaItem>, RepoError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM gallery_items gi \
             INNER JOIN media_items m ON m.id = gi.media_id \
             WHERE gi.gallery_id::text = $1 AND m.active \
             ORDER BY gi.position LIMIT $2"
        );
        self.fetch_media(
            sqlx::query_as::<_, MediaRow>(&sql)
                .bind(gallery_id)
                .bind(Self::limit(limit)),
        )
        .await
    }
}
