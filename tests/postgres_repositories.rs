use std::collections::HashSet;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use vitrine::{
    application::repos::{BackgroundViewsRepo, MediaRepo, ZoneConfigRepo},
    infra::db::PostgresRepositories,
};

async fn insert_folder(pool: &PgPool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO media_folders (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .expect("insert folder");
    id
}

async fn insert_media(pool: &PgPool, tags: &[&str], folder_id: Option<Uuid>, active: bool) -> Uuid {
    let id = Uuid::new_v4();
    let tags: Vec<String> = tags.iter().map(|tag| tag.to_string()).collect();
    sqlx::query(
        "INSERT INTO media_items (id, url, tags, folder_id, active) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(format!("https://cdn.example/{id}.jpg"))
    .bind(tags)
    .bind(folder_id)
    .bind(active)
    .execute(pool)
    .await
    .expect("insert media");
    id
}

fn ids(items: &[vitrine::domain::media::MediaItem]) -> HashSet<Uuid> {
    items.iter().map(|item| item.id).collect()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn zone_rows_round_trip_their_columns(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    sqlx::query(
        "INSERT INTO site_zones (key, randomization_enabled, config_json) VALUES ($1, $2, $3)",
    )
    .bind("page.about.background")
    .bind(Some(false))
    .bind(json!({ "carousel_enabled": true, "limit": 4 }))
    .execute(&pool)
    .await
    .expect("insert zone");

    let row = repos
        .find_zone_config("page.about.background")
        .await
        .expect("query zone")
        .expect("zone row");
    assert_eq!(row.randomization_enabled, Some(false));
    assert_eq!(row.static_media_id, None);
    assert_eq!(row.config_json["limit"], json!(4));

    assert!(
        repos
            .find_zone_config("page.missing.background")
            .await
            .expect("query zone")
            .is_none()
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn candidate_queries_only_return_active_matches(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let folder = insert_folder(&pool, "backgrounds").await;
    let tagged = insert_media(&pool, &["homebg", "landscape"], None, true).await;
    insert_media(&pool, &["homebg"], None, false).await;
    let in_folder = insert_media(&pool, &["about"], Some(folder), true).await;
    let generic = insert_media(&pool, &["background"], Some(folder), true).await;
    insert_media(&pool, &["contact"], Some(folder), true).await;

    let by_tag = repos.list_active_by_tag("homebg", 10).await.expect("by tag");
    assert_eq!(ids(&by_tag), HashSet::from([tagged]));

    let by_folder = repos
        .list_active_by_folder(&folder.to_string(), 10)
        .await
        .expect("by folder");
    assert_eq!(by_folder.len(), 3);

    let limited = repos
        .list_active_by_folder(&folder.to_string(), 1)
        .await
        .expect("limited");
    assert_eq!(limited.len(), 1);

    let found = repos
        .find_folder_by_name("backgrounds")
        .await
        .expect("folder lookup")
        .expect("folder");
    assert_eq!(found.id, folder);

    let any_tag = repos
        .list_folder_by_any_tag(folder, &["about", "background"], 10)
        .await
        .expect("any tag");
    assert_eq!(ids(&any_tag), HashSet::from([in_folder, generic]));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn gallery_media_follow_gallery_order(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let first = insert_media(&pool, &[], None, true).await;
    let second = insert_media(&pool, &[], None, true).await;
    let gallery = Uuid::new_v4();
    sqlx::query("INSERT INTO galleries (id, title) VALUES ($1, 'Coast')")
        .bind(gallery)
        .execute(&pool)
        .await
        .expect("insert gallery");
    for (media_id, position) in [(second, 2), (first, 1)] {
        sqlx::query("INSERT INTO gallery_items (gallery_id, media_id, position) VALUES ($1, $2, $3)")
            .bind(gallery)
            .bind(media_id)
            .bind(position)
            .execute(&pool)
            .await
            .expect("insert gallery item");
    }

    let media = repos
        .list_gallery_media(&gallery.to_string(), 10)
        .await
        .expect("gallery media");
    let order: Vec<Uuid> = media.iter().map(|item| item.id).collect();
    assert_eq!(order, vec![first, second]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn recent_views_are_distinct_and_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let a = insert_media(&pool, &[], None, true).await;
    let b = insert_media(&pool, &[], None, true).await;
    let c = insert_media(&pool, &[], None, true).await;
    let session = Uuid::new_v4();

    for (media_id, minutes_ago) in [(a, 30), (b, 20), (a, 10), (c, 5)] {
        sqlx::query(
            "INSERT INTO background_views (page_key, media_id, session_id, viewed_at) \
             VALUES ('home', $1, $2, now() - make_interval(mins => $3))",
        )
        .bind(media_id)
        .bind(session)
        .bind(minutes_ago)
        .execute(&pool)
        .await
        .expect("insert view");
    }
    repos
        .record_background_view("about", b, session)
        .await
        .expect("record view");

    let recent = repos
        .recent_background_views("home", 2)
        .await
        .expect("recent views");
    assert_eq!(recent, vec![c, a]);

    let about = repos
        .recent_background_views("about", 5)
        .await
        .expect("recent views");
    assert_eq!(about, vec![b]);
}
