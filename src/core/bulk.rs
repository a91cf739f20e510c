//! Bulk I/O primitives shared by the draft store, the reconciliation engine and
//! the catalog import.
//!
//! Small batches go out row by row. Above [`BatchOptions::threshold`] rows are
//! written as multi-row `INSERT`s of [`BatchOptions::chunk_size`], each chunk
//! flushed before the next one is built, which bounds both memory and
//! statement size. A failing statement is returned as-is; callers run inside a
//! transaction, so the whole unit of work rolls back.
//!
//! Also home of [`keep_newest`], the single place where duplicate-keyed rows
//! are resolved.

use crate::{
    entities::{
        DraftChange, ProjectInput, ProjectProduct, ProjectProductGroup, Task, draft_change,
        project_input, project_product, project_product_group, task,
    },
    errors::{Error, Result},
    models::Category,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, sea_query::OnConflict,
};
use std::{collections::HashMap, hash::Hash};

/// Rows per multi-row statement
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Batches up to this many rows are written row by row
pub const DEFAULT_THRESHOLD: usize = 50;

/// Tuning for [`insert_chunked`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Rows per multi-row statement
    pub chunk_size: usize,
    /// Row count above which multi-row statements are used
    pub threshold: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl BatchOptions {
    /// Rows per statement for a batch of `total` rows
    #[must_use]
    pub fn rows_per_statement(&self, total: usize) -> usize {
        if total > self.threshold {
            self.chunk_size.max(1)
        } else {
            1
        }
    }
}

/// Inserts `rows`, optionally with an `ON CONFLICT` clause, and returns the
/// number of affected rows.
///
/// Every active model in one call must set the same columns.
pub async fn insert_chunked<C, A>(
    db: &C,
    rows: Vec<A>,
    on_conflict: Option<&OnConflict>,
    options: &BatchOptions,
) -> Result<u64>
where
    C: ConnectionTrait,
    A: ActiveModelTrait + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    if rows.is_empty() {
        return Ok(0);
    }

    let total = rows.len();
    let per_statement = options.rows_per_statement(total);
    let mut affected = 0;
    let mut statements = 0;
    let mut rows = rows.into_iter().peekable();

    while rows.peek().is_some() {
        let chunk: Vec<A> = rows.by_ref().take(per_statement).collect();
        let mut insert = <A::Entity as EntityTrait>::insert_many(chunk);
        if let Some(clause) = on_conflict {
            insert = insert.on_conflict(clause.clone());
        }
        affected += insert.exec_without_returning(db).await?;
        statements += 1;
    }

    tracing::debug!(
        total,
        statements,
        affected,
        "Flushed batch insert in {} statement(s)",
        statements
    );
    Ok(affected)
}

/// Keeps one row per key, the one with the largest id ("newest wins").
pub fn keep_newest<T, K, FK, FI>(
    rows: impl IntoIterator<Item = T>,
    key_fn: FK,
    id_fn: FI,
) -> HashMap<K, T>
where
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FI: Fn(&T) -> i64,
{
    let mut newest: HashMap<K, T> = HashMap::new();
    for row in rows {
        let key = key_fn(&row);
        match newest.get(&key) {
            Some(existing) if id_fn(existing) >= id_fn(&row) => {}
            _ => {
                newest.insert(key, row);
            }
        }
    }
    newest
}

/// Tables whose rows are owned by a project, optionally scoped by category.
pub trait ProjectScoped: EntityTrait {
    /// Primary key column, used for stable ordering
    fn id_column() -> Self::Column;
    /// Foreign key to the project
    fn project_column() -> Self::Column;
    /// Category column, if the table has one
    fn category_column() -> Option<Self::Column>;
}

fn scoped_filter<E: ProjectScoped>(
    project_id: i64,
    category: Option<Category>,
) -> Result<sea_orm::Condition> {
    let mut condition = sea_orm::Condition::all().add(E::project_column().eq(project_id));
    if let Some(category) = category {
        let column = E::category_column()
            .ok_or_else(|| Error::validation("this table cannot be filtered by category"))?;
        condition = condition.add(column.eq(category.as_str()));
    }
    Ok(condition)
}

/// `SELECT * WHERE project_id = ? [AND category = ?] ORDER BY id`
pub async fn find_for_project<E, C>(
    db: &C,
    project_id: i64,
    category: Option<Category>,
) -> Result<Vec<E::Model>>
where
    E: ProjectScoped,
    C: ConnectionTrait,
{
    E::find()
        .filter(scoped_filter::<E>(project_id, category)?)
        .order_by_asc(E::id_column())
        .all(db)
        .await
        .map_err(Into::into)
}

/// `DELETE WHERE project_id = ? [AND category = ?]`, returns rows deleted
pub async fn delete_for_project<E, C>(
    db: &C,
    project_id: i64,
    category: Option<Category>,
) -> Result<u64>
where
    E: ProjectScoped,
    C: ConnectionTrait,
{
    let result = E::delete_many()
        .filter(scoped_filter::<E>(project_id, category)?)
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

impl ProjectScoped for DraftChange {
    fn id_column() -> Self::Column {
        draft_change::Column::Id
    }
    fn project_column() -> Self::Column {
        draft_change::Column::ProjectId
    }
    fn category_column() -> Option<Self::Column> {
        Some(draft_change::Column::Category)
    }
}

impl ProjectScoped for ProjectProduct {
    fn id_column() -> Self::Column {
        project_product::Column::Id
    }
    fn project_column() -> Self::Column {
        project_product::Column::ProjectId
    }
    fn category_column() -> Option<Self::Column> {
        Some(project_product::Column::Category)
    }
}

impl ProjectScoped for ProjectProductGroup {
    fn id_column() -> Self::Column {
        project_product_group::Column::Id
    }
    fn project_column() -> Self::Column {
        project_product_group::Column::ProjectId
    }
    fn category_column() -> Option<Self::Column> {
        Some(project_product_group::Column::Category)
    }
}

impl ProjectScoped for ProjectInput {
    fn id_column() -> Self::Column {
        project_input::Column::Id
    }
    fn project_column() -> Self::Column {
        project_input::Column::ProjectId
    }
    fn category_column() -> Option<Self::Column> {
        None
    }
}

impl ProjectScoped for Task {
    fn id_column() -> Self::Column {
        task::Column::Id
    }
    fn project_column() -> Self::Column {
        task::Column::ProjectId
    }
    fn category_column() -> Option<Self::Column> {
        None
    }
}
