use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};
use tracing::info;

use crate::records::{Category, ExtractedRecord, RecordSet, Shape};

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// `scraping_<category>`, lowercased.
pub fn table_name(category: Category) -> String {
    format!("scraping_{}", category.as_str().to_lowercase())
}

/// Replace one table per non-empty category with its records, in a single
/// transaction. Returns rows written per category.
pub fn save_record_set(conn: &Connection, set: &RecordSet) -> Result<Vec<(Category, usize)>> {
    let tx = conn.unchecked_transaction()?;
    let mut saved = Vec::new();

    for (category, records) in set.non_empty() {
        let Some(shape) = category.shape() else {
            continue;
        };
        let table = table_name(category);
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;

        let rows = match shape {
            Shape::Text => save_text(&tx, &table, records)?,
            Shape::Fields => save_fields(&tx, &table, records)?,
            Shape::Table => save_tables(&tx, &table, records)?,
        };
        saved.push((category, rows));
    }

    tx.commit()?;
    let total: usize = saved.iter().map(|(_, n)| n).sum();
    info!("Saved {} rows across {} tables", total, saved.len());
    Ok(saved)
}

fn save_text(conn: &Connection, table: &str, records: &[ExtractedRecord]) -> Result<usize> {
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (id INTEGER PRIMARY KEY, value TEXT);"
    ))?;
    let mut stmt = conn.prepare(&format!("INSERT INTO {table} (value) VALUES (?1)"))?;
    for record in records {
        stmt.execute([record.as_text().unwrap_or_default()])?;
    }
    Ok(records.len())
}

/// Columns come from the first record; later records fill missing ones with
/// empty strings and drop extras.
fn save_fields(conn: &Connection, table: &str, records: &[ExtractedRecord]) -> Result<usize> {
    let columns: Vec<&str> = records
        .first()
        .map(|r| r.fields().into_iter().map(|(k, _)| k).collect())
        .unwrap_or_default();
    if columns.is_empty() {
        return Ok(0);
    }

    let defs = columns
        .iter()
        .map(|c| format!("\"{c}\" TEXT"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (id INTEGER PRIMARY KEY, {defs});"
    ))?;

    let names = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} ({names}) VALUES ({placeholders})"
    ))?;

    for record in records {
        let fields = record.fields();
        let values = columns.iter().map(|col| {
            fields
                .iter()
                .find(|(name, _)| name == col)
                .map(|(_, v)| *v)
                .unwrap_or("")
        });
        stmt.execute(params_from_iter(values))?;
    }
    Ok(records.len())
}

/// One row per table row: `(table_index, row_index, cells)` with cells as JSON.
fn save_tables(conn: &Connection, table: &str, records: &[ExtractedRecord]) -> Result<usize> {
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (
            id          INTEGER PRIMARY KEY,
            table_index INTEGER NOT NULL,
            row_index   INTEGER NOT NULL,
            cells       TEXT NOT NULL
        );"
    ))?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (table_index, row_index, cells) VALUES (?1, ?2, ?3)"
    ))?;

    let mut written = 0;
    let tables = records.iter().filter_map(|r| match r {
        ExtractedRecord::Table { rows } => Some(rows),
        _ => None,
    });
    for (t, rows) in tables.enumerate() {
        for (r, row) in rows.iter().enumerate() {
            let cells = serde_json::to_string(row)?;
            stmt.execute(rusqlite::params![t as i64, r as i64, cells])?;
            written += 1;
        }
    }
    Ok(written)
}
