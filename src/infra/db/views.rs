use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{BackgroundViewsRepo, RepoError},
    domain::media::MediaId,
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl BackgroundViewsRepo for PostgresRepositories {
    async fn recent_background_views(
        &self,
        page_key: &str,
        limit: u32,
    ) -> Result<Vec<MediaId>, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT media_id
            FROM background_views
            WHERE page_key = $1
            GROUP BY media_id
            ORDER BY MAX(viewed_at) DESC
            LIMIT $2
            "#,
        )
        .bind(page_key)
        .bind(Self::limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn record_background_view(
        &self,
        page_key: &str,
        media_id: MediaId,
        session_id: Uuid,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO background_views (page_key, media_id, session_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(page_key)
        .bind(media_id)
        .bind(session_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
