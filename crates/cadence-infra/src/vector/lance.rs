//! Opening the single-table LanceDB databases behind the memory and
//! knowledge indices.
//!
//! Each index directory is its own LanceDB database holding one table, so
//! the two stores can be moved or wiped independently.

use std::path::Path;

use arrow_schema::SchemaRef;

use cadence_types::error::RepositoryError;

/// Connect to the database at `dir` and open `table`, creating the directory
/// and an empty table with `schema` as needed.
pub async fn open_table(
    dir: &Path,
    table: &str,
    schema: SchemaRef,
) -> Result<lancedb::Table, RepositoryError> {
    let fail = |what: &str, e: &dyn std::fmt::Display| {
        RepositoryError::Query(format!("Failed to {what} '{table}' at {}: {e}", dir.display()))
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| fail("create directory for", &e))?;
    let uri = dir
        .to_str()
        .ok_or_else(|| fail("open", &"path is not valid UTF-8"))?;
    let db = lancedb::connect(uri)
        .execute()
        .await
        .map_err(|e| fail("connect to", &e))?;

    match db.open_table(table).execute().await {
        Ok(handle) => Ok(handle),
        Err(lancedb::Error::TableNotFound { .. }) => db
            .create_empty_table(table, schema)
            .execute()
            .await
            .map_err(|e| fail("create", &e)),
        Err(e) => Err(fail("open", &e)),
    }
}
