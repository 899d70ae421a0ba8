//! Read-only access to the product table.

use std::path::Path;

use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool};

use crate::core::errors::AppError;

/// Column name → value for one product row, in table column order.
pub type ProductInfo = Map<String, Value>;

/// Outcome of resolving a product code.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductLookup {
    Found(ProductInfo),
    NotFound,
    Ambiguous { matches: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

pub struct ProductCatalog {
    pool: SqlitePool,
    table: String,
    code_column: String,
}

impl ProductCatalog {
    /// Opens an existing product database. `table` and `code_column` must
    /// already be validated identifiers.
    pub async fn open(db_path: &Path, table: &str, code_column: &str) -> Result<Self, AppError> {
        if !db_path.exists() {
            return Err(AppError::NotFound(format!(
                "product database {}",
                db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            table: table.to_string(),
            code_column: code_column.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Exact match on the product code column.
    pub async fn lookup(&self, code: &str) -> Result<ProductLookup, AppError> {
        let Ok(code) = code.trim().parse::<i64>() else {
            return Ok(ProductLookup::NotFound);
        };

        let query = format!(
            "SELECT * FROM \"{}\" WHERE \"{}\" = ?1",
            self.table, self.code_column
        );
        let rows = sqlx::query(&query).bind(code).fetch_all(&self.pool).await?;

        Ok(match rows.len() {
            0 => ProductLookup::NotFound,
            1 => ProductLookup::Found(row_to_info(&rows[0])),
            n => ProductLookup::Ambiguous { matches: n },
        })
    }

    pub async fn table_names(&self) -> Result<Vec<String>, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    pub async fn columns(&self) -> Result<Vec<ColumnInfo>, AppError> {
        let query = format!("PRAGMA table_info(\"{}\")", self.table);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get("name"),
                declared_type: row.get("type"),
            })
            .collect())
    }
}

fn row_to_info(row: &SqliteRow) -> ProductInfo {
    let mut info = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        info.insert(column.name().to_string(), decode_column(row, idx));
    }
    info
}

/// SQLite is dynamically typed, so each cell is tried as integer, real, text
/// and finally blob.
fn decode_column(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(idx) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(idx) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(idx) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return Value::String(String::from_utf8_lossy(&bytes).into_owned());
    }
    Value::Null
}
