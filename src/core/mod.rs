pub mod archive;
pub mod delete;
pub mod duplicates;
pub mod filters;
pub mod model;
pub mod rowfmt;

pub use archive::ArchiveEngine;
pub use delete::DeleteEngine;
pub use model::{table_def, ArchiveOutcome, DeleteOutcome, OperationFilters, TableDef, ACTIVITIES, TRANSACTIONS};

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::{AppError, AppResult};

// Shared by get_table_stats and the job-summary aggregate, neither of
// which needs ArchiveEngine/DeleteEngine's duplicate/insert machinery.
pub async fn count_rows(
    pool: &PgPool,
    physical_table: &str,
    def: TableDef,
    filters: &OperationFilters,
) -> AppResult<i64> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT COUNT(*) FROM {physical_table} WHERE 1=1"));
    filters::push_date_filter(&mut builder, def, filters);
    let (count,): (i64,) = builder
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(AppError::from)?;
    Ok(count)
}
