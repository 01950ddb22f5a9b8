//! The Relational Store (§4.1): typed CRUD, filtered listing, and the three
//! aggregations, all atomic at receipt+line-items granularity.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{normalize_vendor_key, DuplicateProbe, LedgerResult, Receipt};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::schema::{ensure_schema, insert_line_items, load_line_items, row_to_receipt};

/// Filter applied by `list_receipts`. All fields are optional conjunctions.
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Only receipts carrying at least one audit flag (used by `GET /api/audit`).
    pub flagged_only: bool,
}

/// One bucket of an aggregation: a name (month/vendor/category) and a total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountTotal {
    pub name: String,
    pub total: Decimal,
}

/// SQLite-backed implementation of the Relational Store. Safe to share
/// across handler tasks: every operation serializes through one connection
/// via a blocking-task dispatch, so async handlers never block on file I/O.
#[derive(Clone)]
pub struct RelationalStore {
    conn: Arc<Mutex<Connection>>,
}

impl RelationalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().expect("store mutex poisoned");
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Insert a new receipt and its line items in one transaction.
    pub async fn insert_receipt(&self, mut receipt: Receipt) -> Result<Receipt, StoreError> {
        receipt.normalize();
        self.with_conn(move |conn| {
            let now = Utc::now();
            let vendor_key = normalize_vendor_key(&receipt.vendor);
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO receipts (
                    vendor, vendor_key, timestamp, total_amount, tax_amount, currency,
                    category, payment_method, receipt_number, image_ref,
                    flag_duplicate, flag_suspicious, flag_missing_vat, flag_math_error,
                    created_at, updated_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
                params![
                    receipt.vendor,
                    vendor_key,
                    receipt.timestamp.to_rfc3339(),
                    receipt.total_amount.to_string(),
                    receipt.tax_amount.to_string(),
                    receipt.currency,
                    receipt.category,
                    receipt.payment_method,
                    receipt.receipt_number,
                    receipt.image_ref,
                    receipt.flags.duplicate as i64,
                    receipt.flags.suspicious_category as i64,
                    receipt.flags.missing_vat as i64,
                    receipt.flags.math_error as i64,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;
            let id = tx.last_insert_rowid();
            insert_line_items(&tx, id, &receipt.line_items)?;
            tx.commit()?;

            receipt.id = Some(id);
            receipt.created_at = Some(now);
            receipt.updated_at = Some(now);
            Ok(receipt)
        })
        .await
    }

    /// Full-replacement update: re-validates nothing itself (the Ingestor
    /// does that) but replaces every field and every line item, then bumps
    /// `updated_at`. `created_at` is preserved from the existing row.
    pub async fn update_receipt(
        &self,
        id: i64,
        mut receipt: Receipt,
    ) -> Result<Receipt, StoreError> {
        receipt.normalize();
        self.with_conn(move |conn| {
            let now = Utc::now();
            let vendor_key = normalize_vendor_key(&receipt.vendor);
            let tx = conn.transaction()?;

            let created_at: String = tx
                .query_row(
                    "SELECT created_at FROM receipts WHERE id = ?1",
                    params![id],
                    |r| r.get(0),
                )
                .map_err(|_| StoreError::NotFound(id))?;

            let updated = tx.execute(
                "UPDATE receipts SET
                    vendor = ?1, vendor_key = ?2, timestamp = ?3, total_amount = ?4,
                    tax_amount = ?5, currency = ?6, category = ?7, payment_method = ?8,
                    receipt_number = ?9, image_ref = ?10, flag_duplicate = ?11,
                    flag_suspicious = ?12, flag_missing_vat = ?13, flag_math_error = ?14,
                    updated_at = ?15
                 WHERE id = ?16",
                params![
                    receipt.vendor,
                    vendor_key,
                    receipt.timestamp.to_rfc3339(),
                    receipt.total_amount.to_string(),
                    receipt.tax_amount.to_string(),
                    receipt.currency,
                    receipt.category,
                    receipt.payment_method,
                    receipt.receipt_number,
                    receipt.image_ref,
                    receipt.flags.duplicate as i64,
                    receipt.flags.suspicious_category as i64,
                    receipt.flags.missing_vat as i64,
                    receipt.flags.math_error as i64,
                    now.to_rfc3339(),
                    id,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(id));
            }

            tx.execute("DELETE FROM line_items WHERE receipt_id = ?1", params![id])?;
            insert_line_items(&tx, id, &receipt.line_items)?;
            tx.commit()?;

            receipt.id = Some(id);
            receipt.created_at = DateTime::parse_from_rfc3339(&created_at)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
            receipt.updated_at = Some(now);
            Ok(receipt)
        })
        .await
    }

    /// Delete a receipt; its line items cascade via the foreign key.
    pub async fn delete_receipt(&self, id: i64) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM receipts WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    pub async fn get_receipt(&self, id: i64) -> Result<Option<Receipt>, StoreError> {
        self.with_conn(move |conn| {
            let receipt = conn
                .query_row("SELECT * FROM receipts WHERE id = ?1", params![id], |row| {
                    row_to_receipt(row)
                })
                .ok();
            match receipt {
                Some(mut r) => {
                    r.line_items = load_line_items(conn, id)?;
                    Ok(Some(r))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// List receipts matching `filter`, descending timestamp, ties broken
    /// by descending identifier.
    pub async fn list_receipts(&self, filter: ReceiptFilter) -> Result<Vec<Receipt>, StoreError> {
        self.with_conn(move |conn| {
            let (where_clause, bound) = build_where(&filter);
            let sql = format!(
                "SELECT * FROM receipts {where_clause} ORDER BY timestamp DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                bound.iter().map(|b| b.as_ref() as &dyn rusqlite::ToSql).collect();
            let mut receipts = stmt
                .query_map(params_refs.as_slice(), row_to_receipt)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for receipt in &mut receipts {
                receipt.line_items = load_line_items(conn, receipt.id.unwrap())?;
            }
            Ok(receipts)
        })
        .await
    }

    pub async fn monthly_totals(&self) -> Result<Vec<AmountTotal>, StoreError> {
        let receipts = self.list_receipts(ReceiptFilter::default()).await?;
        let mut buckets: std::collections::BTreeMap<String, Decimal> = Default::default();
        for r in &receipts {
            let key = r.timestamp.format("%Y-%m").to_string();
            *buckets.entry(key).or_insert(Decimal::ZERO) += r.total_amount;
        }
        Ok(sort_desc_amount_asc_name(buckets))
    }

    pub async fn vendor_totals(&self) -> Result<Vec<AmountTotal>, StoreError> {
        let receipts = self.list_receipts(ReceiptFilter::default()).await?;
        let mut buckets: std::collections::BTreeMap<String, Decimal> = Default::default();
        for r in &receipts {
            *buckets.entry(r.vendor.clone()).or_insert(Decimal::ZERO) += r.total_amount;
        }
        Ok(sort_desc_amount_asc_name(buckets))
    }

    pub async fn category_totals(&self) -> Result<Vec<AmountTotal>, StoreError> {
        let receipts = self.list_receipts(ReceiptFilter::default()).await?;
        let mut buckets: std::collections::BTreeMap<String, Decimal> = Default::default();
        for r in &receipts {
            let key = r
                .category
                .clone()
                .unwrap_or_else(|| "uncategorized".to_string());
            *buckets.entry(key).or_insert(Decimal::ZERO) += r.total_amount;
        }
        Ok(sort_desc_amount_asc_name(buckets))
    }

}

fn sort_desc_amount_asc_name(
    buckets: std::collections::BTreeMap<String, Decimal>,
) -> Vec<AmountTotal> {
    let mut totals: Vec<AmountTotal> = buckets
        .into_iter()
        .map(|(name, total)| AmountTotal { name, total })
        .collect();
    totals.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    totals
}

fn build_where(filter: &ReceiptFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut clauses = Vec::new();
    let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(vendor) = &filter.vendor {
        clauses.push("vendor_key = ?".to_string());
        bound.push(Box::new(normalize_vendor_key(vendor)));
    }
    if let Some(category) = &filter.category {
        clauses.push("category = ?".to_string());
        bound.push(Box::new(category.clone()));
    }
    if let Some(start) = filter.start_date {
        clauses.push("timestamp >= ?".to_string());
        bound.push(Box::new(start.to_rfc3339()));
    }
    if let Some(end) = filter.end_date {
        clauses.push("timestamp <= ?".to_string());
        bound.push(Box::new(end.to_rfc3339()));
    }
    if filter.flagged_only {
        clauses.push(
            "(flag_duplicate = 1 OR flag_suspicious = 1 OR flag_missing_vat = 1 OR flag_math_error = 1)"
                .to_string(),
        );
    }

    if clauses.is_empty() {
        (String::new(), bound)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), bound)
    }
}

#[async_trait]
impl DuplicateProbe for RelationalStore {
    async fn find_same_day_same_vendor(
        &self,
        vendor_key: &str,
        date: NaiveDate,
        exclude_id: Option<i64>,
    ) -> LedgerResult<Vec<Receipt>> {
        let vendor_key = vendor_key.to_string();
        let receipts = self
            .with_conn(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT * FROM receipts WHERE vendor_key = ?1")?;
                let receipts = stmt
                    .query_map(params![vendor_key], row_to_receipt)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(receipts)
            })
            .await?;

        Ok(receipts
            .into_iter()
            .filter(|r| r.calendar_date() == date)
            .filter(|r| exclude_id.map(|ex| r.id != Some(ex)).unwrap_or(true))
            .collect())
    }
}
