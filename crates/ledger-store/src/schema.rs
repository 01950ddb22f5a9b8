//! SQLite DDL and row<->domain-model mapping.
//!
//! Decimal amounts are stored as `TEXT` holding the canonical
//! `rust_decimal::Decimal` string representation, never as SQLite's native
//! floating-point `REAL`, so arithmetic checks in the Audit Engine never
//! drift from what was actually stored.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use ledger_core::{AuditFlags, LineItem, Receipt};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

use crate::error::StoreError;

pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS receipts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor          TEXT NOT NULL,
    vendor_key      TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    total_amount    TEXT NOT NULL,
    tax_amount      TEXT NOT NULL,
    currency        TEXT NOT NULL,
    category        TEXT,
    payment_method  TEXT,
    receipt_number  TEXT,
    image_ref       TEXT,
    flag_duplicate  INTEGER NOT NULL DEFAULT 0,
    flag_suspicious INTEGER NOT NULL DEFAULT 0,
    flag_missing_vat INTEGER NOT NULL DEFAULT 0,
    flag_math_error INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS line_items (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    receipt_id      INTEGER NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
    description     TEXT NOT NULL,
    quantity        INTEGER NOT NULL,
    unit_price      TEXT NOT NULL,
    line_total      TEXT NOT NULL,
    vat_percent     TEXT
);

CREATE INDEX IF NOT EXISTS idx_receipts_vendor ON receipts(vendor);
CREATE INDEX IF NOT EXISTS idx_receipts_vendor_key ON receipts(vendor_key);
CREATE INDEX IF NOT EXISTS idx_receipts_category ON receipts(category);
CREATE INDEX IF NOT EXISTS idx_receipts_timestamp ON receipts(timestamp);
CREATE INDEX IF NOT EXISTS idx_line_items_receipt ON line_items(receipt_id);

CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);
";

pub fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.execute_batch(CREATE_TABLES)?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))?;
    if count == 0 {
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }
    Ok(())
}

fn parse_decimal(s: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(s).map_err(|e| StoreError::Decimal(e.to_string()))
}

pub fn row_to_receipt(row: &Row) -> rusqlite::Result<Receipt> {
    let timestamp: String = row.get("timestamp")?;
    let total_amount: String = row.get("total_amount")?;
    let tax_amount: String = row.get("tax_amount")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Receipt {
        id: Some(row.get("id")?),
        vendor: row.get("vendor")?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        total_amount: parse_decimal(&total_amount).unwrap_or_default(),
        tax_amount: parse_decimal(&tax_amount).unwrap_or_default(),
        currency: row.get("currency")?,
        category: row.get("category")?,
        payment_method: row.get("payment_method")?,
        receipt_number: row.get("receipt_number")?,
        image_ref: row.get("image_ref")?,
        line_items: Vec::new(),
        flags: AuditFlags {
            duplicate: row.get::<_, i64>("flag_duplicate")? != 0,
            suspicious_category: row.get::<_, i64>("flag_suspicious")? != 0,
            missing_vat: row.get::<_, i64>("flag_missing_vat")? != 0,
            math_error: row.get::<_, i64>("flag_math_error")? != 0,
        },
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
    })
}

pub fn row_to_line_item(row: &Row) -> rusqlite::Result<LineItem> {
    let unit_price: String = row.get("unit_price")?;
    let line_total: String = row.get("line_total")?;
    let vat_percent: Option<String> = row.get("vat_percent")?;

    Ok(LineItem {
        id: Some(row.get("id")?),
        description: row.get("description")?,
        quantity: row.get::<_, i64>("quantity")? as u32,
        unit_price: parse_decimal(&unit_price).unwrap_or_default(),
        line_total: parse_decimal(&line_total).unwrap_or_default(),
        vat_percent: vat_percent.and_then(|v| parse_decimal(&v).ok()),
    })
}

pub fn insert_line_items(
    conn: &Connection,
    receipt_id: i64,
    items: &[LineItem],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT INTO line_items (receipt_id, description, quantity, unit_price, line_total, vat_percent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for item in items {
        stmt.execute(params![
            receipt_id,
            item.description,
            item.quantity as i64,
            item.unit_price.to_string(),
            item.line_total.to_string(),
            item.vat_percent.map(|v| v.to_string()),
        ])?;
    }
    Ok(())
}

pub fn load_line_items(conn: &Connection, receipt_id: i64) -> Result<Vec<LineItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, description, quantity, unit_price, line_total, vat_percent
         FROM line_items WHERE receipt_id = ?1 ORDER BY id ASC",
    )?;
    let items = stmt
        .query_map(params![receipt_id], row_to_line_item)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}
