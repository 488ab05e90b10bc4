use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::application::repos::{RepoError, ZoneConfigRepo, ZoneConfigRow};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SiteZoneRow {
    key: String,
    randomization_enabled: Option<bool>,
    static_media_id: Option<Uuid>,
    config_json: Value,
}

impl From<SiteZoneRow> for ZoneConfigRow {
    fn from(row: SiteZoneRow) -> Self {
        Self {
            key: row.key,
            randomization_enabled: row.randomization_enabled,
            static_media_id: row.static_media_id,
            config_json: row.config_json,
        }
    }
}

#[async_trait]
impl ZoneConfigRepo for PostgresRepositories {
    async fn find_zone_config(&self, key: &str) -> Result<Option<ZoneConfigRow>, RepoError> {
        let row = sqlx::query_as::<_, SiteZoneRow>(
            r#"
            SELECT key, randomization_enabled, static_media_id, config_json
            FROM site_zones
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ZoneConfigRow::from))
    }
}
