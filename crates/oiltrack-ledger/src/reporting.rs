//! # Reporting Service
//!
//! Read side of the ledger: enriched activity lists, daily totals, the CSV
//! export and the photo archive.
//!
//! ## Export Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  deliveries ──┐                                                         │
//! │               ├──► ReferenceIndex (users, branches, oil types)          │
//! │  transactions ┘         │                                               │
//! │                         ▼                                               │
//! │              unified entries (no de-duplication)                        │
//! │                         │                                               │
//! │           ┌─────────────┴─────────────┐                                 │
//! │           ▼                           ▼                                 │
//! │   render_csv (local time)    daily totals (deliveries only)             │
//! │                                                                         │
//! │  transactions in [start, end 23:59:59.999]                              │
//! │           │  fetch each photo, skip failures                            │
//! │           ▼                                                             │
//! │   photos_<start>_to_<end>.zip (Deflated)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::ZipWriter;

use oiltrack_core::export::{
    csv_filename, photo_archive_name, photo_entry_name, pick_timestamp, render_csv, DateRange,
    CSV_MIME, ZIP_MIME,
};
use oiltrack_core::report::{
    daily_totals_by_oil_type, delivery_entries, transaction_entries, unified_entries,
    DashboardSummary, LedgerEntry, PhotoStatistics, ReferenceIndex,
};
use oiltrack_core::{CoreError, Transaction};

use crate::context::LedgerContext;
use crate::error::LedgerResult;

/// A rendered CSV download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvExport {
    pub filename: String,
    pub mime: &'static str,
    pub content: String,
}

/// A zipped photo download.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoArchive {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub photo_count: usize,
}

pub struct ReportingService<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> ReportingService<'a> {
    pub(crate) fn new(ctx: &'a LedgerContext) -> Self {
        ReportingService { ctx }
    }

    /// Every ledger entry, newest first.
    pub async fn all_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.ctx.db().transactions().list_all().await?)
    }

    /// Lookup tables for enrichment. Every user counts as a possible driver.
    pub async fn reference_index(&self) -> LedgerResult<ReferenceIndex> {
        let db = self.ctx.db();
        Ok(ReferenceIndex::new(
            db.drivers().list_users().await?,
            db.branches().list().await?,
            db.oil_types().list().await?,
        ))
    }

    /// Latest deliveries as enriched entries.
    pub async fn recent_deliveries(&self, limit: usize) -> LedgerResult<Vec<LedgerEntry>> {
        let index = self.reference_index().await?;
        let mut deliveries = self.ctx.db().deliveries().list().await?;
        deliveries.truncate(limit);
        Ok(delivery_entries(&deliveries, &index))
    }

    /// Latest loading and supply entries, enriched.
    pub async fn recent_transactions(&self, limit: usize) -> LedgerResult<Vec<LedgerEntry>> {
        let index = self.reference_index().await?;
        let mut transactions = self.all_transactions().await?;
        transactions.truncate(limit);
        Ok(transaction_entries(&transactions, &index))
    }

    /// Deliveries followed by transactions. A supply shows up once per stream.
    pub async fn unified_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        let index = self.reference_index().await?;
        let deliveries = self.ctx.db().deliveries().list().await?;
        let transactions = self.all_transactions().await?;
        Ok(unified_entries(&deliveries, &transactions, &index))
    }

    // =========================================================================
    // CSV
    // =========================================================================

    /// ## Errors
    /// `NothingToExport` when both streams are empty.
    pub async fn export_csv(&self) -> LedgerResult<CsvExport> {
        let entries = self.unified_entries().await?;
        let content = render_csv(&entries, &self.ctx.tz())?;
        let export = CsvExport {
            filename: csv_filename(Utc::now().date_naive()),
            mime: CSV_MIME,
            content,
        };
        info!(rows = entries.len(), filename = %export.filename, "CSV export rendered");
        Ok(export)
    }

    // =========================================================================
    // Totals
    // =========================================================================

    /// Liters supplied today (local calendar day) per oil type.
    pub async fn daily_totals(&self) -> LedgerResult<BTreeMap<String, f64>> {
        let today = Utc::now().with_timezone(&self.ctx.tz()).date_naive();
        self.daily_totals_on(today).await
    }

    /// Totals come from the delivery stream alone; counting the mirrored
    /// supply entries too would double every figure.
    pub async fn daily_totals_on(&self, day: NaiveDate) -> LedgerResult<BTreeMap<String, f64>> {
        let index = self.reference_index().await?;
        let deliveries = self.ctx.db().deliveries().list().await?;
        let entries = delivery_entries(&deliveries, &index);
        Ok(daily_totals_by_oil_type(&entries, day, &self.ctx.tz()))
    }

    pub async fn dashboard_summary(&self) -> LedgerResult<DashboardSummary> {
        let db = self.ctx.db();
        Ok(DashboardSummary::compute(
            &db.deliveries().list().await?,
            &db.load_sessions().list().await?,
            &db.complaints().list().await?,
            &db.tasks().list().await?,
            &db.drivers().list().await?,
        ))
    }

    // =========================================================================
    // Photos
    // =========================================================================

    pub async fn photo_statistics(&self, range: DateRange) -> LedgerResult<PhotoStatistics> {
        let transactions = self.transactions_in(&range).await?;
        Ok(PhotoStatistics {
            photo_count: transactions.iter().map(|t| t.photos.len()).sum(),
            transaction_count: transactions.len(),
        })
    }

    /// Zips every photo of every entry in the range.
    ///
    /// ## Errors
    /// - `NothingToExport("transactions")` when the range is empty
    /// - `NothingToExport("photos")` when no photo could be added
    pub async fn export_photos(&self, range: DateRange) -> LedgerResult<PhotoArchive> {
        let transactions = self.transactions_in(&range).await?;
        if transactions.is_empty() {
            return Err(CoreError::NothingToExport {
                what: "transactions".into(),
            }
            .into());
        }

        let mut files = Vec::new();
        for tx in &transactions {
            let Some(at) = pick_timestamp(Some(tx.timestamp), Some(tx.created_at), None) else {
                continue;
            };
            let branch = tx.supply().map(|s| s.branch_name.as_str());
            for (photo_type, url) in tx.photos.iter() {
                match self.ctx.photos().fetch(url).await {
                    Ok(bytes) => files.push((
                        photo_entry_name(at.date_naive(), branch, photo_type, &tx.id),
                        bytes,
                    )),
                    Err(e) => {
                        warn!(transaction_id = %tx.id, photo_type, error = %e, "Skipping photo")
                    }
                }
            }
        }

        if files.is_empty() {
            return Err(CoreError::NothingToExport {
                what: "photos".into(),
            }
            .into());
        }

        let photo_count = files.len();
        let bytes = write_archive(files)?;
        let archive = PhotoArchive {
            filename: photo_archive_name(&range),
            mime: ZIP_MIME,
            bytes,
            photo_count,
        };
        info!(
            filename = %archive.filename,
            photos = photo_count,
            size = archive.bytes.len(),
            "Photo archive built"
        );
        Ok(archive)
    }

    async fn transactions_in(&self, range: &DateRange) -> LedgerResult<Vec<Transaction>> {
        let transactions = self
            .ctx
            .db()
            .transactions()
            .list_between(range.start_instant(), range.end_instant())
            .await?;
        debug!(start = %range.start, end = %range.end, count = transactions.len(), "Transactions in range");
        Ok(transactions)
    }
}

fn write_archive(files: Vec<(String, Vec<u8>)>) -> LedgerResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in files {
            zip.start_file(name, options)?;
            zip.write_all(&data)?;
        }
        zip.finish()?;
    }
    Ok(buf.into_inner())
}
