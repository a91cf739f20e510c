//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables come from `Schema::create_table_from_entity`, so the schema always
//! matches the entity definitions. Composite indexes are not expressible on the
//! entities and are created here explicitly; the unique index on draft changes
//! is what makes the draft upsert an `INSERT ... ON CONFLICT DO UPDATE`.

use crate::entities::{
    DraftChange, Product, Project, ProjectInput, ProjectProduct, ProjectProductGroup, Task,
    draft_change, project_input, project_product, project_product_group,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::{env::VarError, path::Path};

/// Default database location when neither `DATABASE_URL` nor `config.toml` name one
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/roof_offer.sqlite?mode=rwc";

/// Gets the database URL from the environment, falling back to `configured`
/// and finally to [`DEFAULT_DATABASE_URL`].
///
/// # Errors
/// Returns `Error::EnvVar` if `DATABASE_URL` is set but not valid unicode.
pub fn get_database_url(configured: Option<&str>) -> Result<String> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => Ok(url),
        Err(VarError::NotPresent) => Ok(configured.map_or_else(
            || DEFAULT_DATABASE_URL.to_string(),
            str::to_string,
        )),
        Err(e) => Err(e.into()),
    }
}

/// Creates the parent directory of a file-backed `SQLite` URL. Other URLs,
/// in-memory ones included, are left alone.
pub fn ensure_database_dir(url: &str) -> Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Establishes a connection to the database at `url`.
pub async fn create_connection(url: &str) -> Result<DatabaseConnection> {
    tracing::debug!("Connecting to database at {}", url);
    Database::connect(url).await.map_err(Into::into)
}

/// Creates all tables and indexes if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(Project),
        schema.create_table_from_entity(ProjectInput),
        schema.create_table_from_entity(ProjectProduct),
        schema.create_table_from_entity(ProjectProductGroup),
        schema.create_table_from_entity(DraftChange),
        schema.create_table_from_entity(Task),
    ];
    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    let indexes = [
        Index::create()
            .name("ux_draft_changes_key")
            .table(DraftChange)
            .col(draft_change::Column::ProjectId)
            .col(draft_change::Column::ProductId)
            .col(draft_change::Column::Category)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_project_inputs_key")
            .table(ProjectInput)
            .col(project_input::Column::ProjectId)
            .col(project_input::Column::MapperKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        // Not unique: legacy duplicates are tolerated and resolved on read.
        Index::create()
            .name("ix_project_products_key")
            .table(ProjectProduct)
            .col(project_product::Column::ProjectId)
            .col(project_product::Column::ProductId)
            .col(project_product::Column::Category)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ix_project_product_groups_project")
            .table(ProjectProductGroup)
            .col(project_product_group::Column::ProjectId)
            .col(project_product_group::Column::Category)
            .if_not_exists()
            .to_owned(),
    ];
    for index in &indexes {
        db.execute(builder.build(index)).await?;
    }

    tracing::info!("Database schema is up to date");
    Ok(())
}
