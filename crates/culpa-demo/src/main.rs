use std::path::Path;

use culpa_core::{ActiveUser, BlameConfig, BlameInterceptor, session};
use culpa_db::entities::{posts, users};
use sea_orm::{ActiveModelTrait, Set};
use sea_orm_migration::MigratorTrait;

/// Identity used when `users.active_user = "console"` is configured.
fn console_user() -> Option<ActiveUser> {
    let id = std::env::var("CULPA_CONSOLE_USER_ID").ok()?;
    id.trim().parse().ok().map(|id| ActiveUser::named(id, "console"))
}

const DEFAULT_CONFIG: &str = "config/culpa.toml";

fn load_config() -> anyhow::Result<BlameConfig> {
    let config = match std::env::var("CULPA_CONFIG") {
        Ok(path) => BlameConfig::load(path)?,
        Err(_) if Path::new(DEFAULT_CONFIG).exists() => BlameConfig::load(DEFAULT_CONFIG)?,
        Err(_) => BlameConfig::standard(),
    };
    Ok(config.with_env_overrides())
}

fn acting(user: &users::Model) -> Option<ActiveUser> {
    Some(ActiveUser::named(i64::from(user.id), user.name.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?;
    let config = load_config()?;

    let db = culpa_db::connect(&database_url).await?;

    // Apply migrations on boot (idempotent).
    culpa_migration::Migrator::up(&db, None).await?;

    culpa_db::observe(
        BlameInterceptor::builder(config)
            .register_provider("console", console_user)
            .build()?,
    );

    let author = users::ActiveModel {
        name: Set("author".to_string()),
        ..Default::default()
    }
    .insert(&db)
    .await?;
    let editor = users::ActiveModel {
        name: Set("editor".to_string()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    let draft = posts::ActiveModel {
        title: Set("Hello".to_string()),
        ..Default::default()
    };
    let post = session::act_as(acting(&author), draft.insert(&db)).await?;
    tracing::info!(
        post_id = post.id,
        created_by = ?post.created_by,
        updated_by = ?post.updated_by,
        "created post"
    );

    let mut edit: posts::ActiveModel = post.into();
    edit.title = Set("Hello, again".to_string());
    let post = session::act_as(acting(&editor), edit.update(&db)).await?;
    tracing::info!(
        post_id = post.id,
        created_by = ?post.created_by,
        updated_by = ?post.updated_by,
        "updated post"
    );

    let post_id = post.id;
    let doomed: posts::ActiveModel = post.into();
    let res = session::act_as(acting(&editor), doomed.delete(&db)).await?;
    tracing::info!(post_id, rows = res.rows_affected, "deleted post");

    Ok(())
}
