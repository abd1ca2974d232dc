//! # Export Formats
//!
//! CSV rendering for the combined ledger export, plus the naming and
//! date-range rules of the photo archive.
//!
//! ## CSV Layout
//! ```text
//! "Transaction ID","Type","Date",...,"Status"        ← header
//! "d-1","Supply","03/10/2024, 10:30:00 PM",...       ← from deliveries[]
//! "t-1","supply","03/10/2024, 10:30:00 PM",...       ← from transactions[]
//! ```
//! Every cell is wrapped in double quotes; embedded quotes are written as-is.
//! Rows are joined with `\n`.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::report::LedgerEntry;
use crate::types::photo_keys;

/// MIME type of the CSV download.
pub const CSV_MIME: &str = "text/csv;charset=utf-8";

/// MIME type of the photo archive.
pub const ZIP_MIME: &str = "application/zip";

pub const CSV_HEADERS: [&str; 14] = [
    "Transaction ID",
    "Type",
    "Date",
    "Driver Name",
    "Oil Type",
    "Quantity (L)",
    "Branch",
    "Start Meter",
    "End Meter",
    "Delivery Order",
    "Tank Level Photo",
    "Hose Connection Photo",
    "Final Tank Photo",
    "Status",
];

/// en-US style `MM/DD/YYYY, hh:mm:ss AM`.
const CSV_DATE_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

// =============================================================================
// CSV
// =============================================================================

/// Download filename for a CSV generated on `date`.
pub fn csv_filename(date: NaiveDate) -> String {
    format!("oil_transactions_{}.csv", date.format("%Y-%m-%d"))
}

/// Blank for missing and zero values, like the dashboard export.
fn number_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 => v.to_string(),
        _ => String::new(),
    }
}

fn csv_row<Tz: TimeZone>(entry: &LedgerEntry, tz: &Tz) -> [String; 14]
where
    Tz::Offset: std::fmt::Display,
{
    let photos = &entry.photos;
    [
        entry.id.clone(),
        entry.type_label().to_string(),
        entry
            .timestamp
            .with_timezone(tz)
            .format(CSV_DATE_FORMAT)
            .to_string(),
        entry.driver_name.clone(),
        entry.oil_type_name.clone(),
        number_cell(Some(entry.quantity)),
        entry.branch_name.clone().unwrap_or_default(),
        number_cell(entry.start_meter_reading),
        number_cell(entry.end_meter_reading),
        entry.delivery_order_id.clone().unwrap_or_default(),
        photos
            .get(photo_keys::TANK_LEVEL_BEFORE)
            .unwrap_or_default()
            .to_string(),
        photos
            .get(photo_keys::HOSE_CONNECTION)
            .unwrap_or_default()
            .to_string(),
        photos
            .get(photo_keys::TANK_LEVEL_AFTER)
            .unwrap_or_default()
            .to_string(),
        if entry.status.is_empty() {
            "completed".to_string()
        } else {
            entry.status.clone()
        },
    ]
}

fn quote_row<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cells
        .into_iter()
        .map(|c| format!("\"{}\"", c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders the combined export. Dates are printed in `tz`.
///
/// ## Errors
/// `NothingToExport` when `entries` is empty.
pub fn render_csv<Tz: TimeZone>(entries: &[LedgerEntry], tz: &Tz) -> CoreResult<String>
where
    Tz::Offset: std::fmt::Display,
{
    if entries.is_empty() {
        return Err(CoreError::NothingToExport {
            what: "transactions".into(),
        });
    }

    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(quote_row(CSV_HEADERS));
    lines.extend(entries.iter().map(|e| quote_row(csv_row(e, tz))));
    Ok(lines.join("\n"))
}

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive calendar-date range. The end day runs through 23:59:59.999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(DateRange { start, end })
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        let end_of_day =
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        self.end.and_time(end_of_day).and_utc()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start_instant() && at <= self.end_instant()
    }
}

/// First timestamp present among a record's time fields, in priority order:
/// `timestamp`, `createdAt`, `actualDeliveryStartTime`.
pub fn pick_timestamp(
    timestamp: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    actual_delivery_start: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    timestamp.or(created_at).or(actual_delivery_start)
}

// =============================================================================
// Photo Archive Naming
// =============================================================================

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Archive entry name: `<YYYY-MM-DD>_<branch>_<photoType>_<transactionId>.jpg`.
pub fn photo_entry_name(
    date: NaiveDate,
    branch_name: Option<&str>,
    photo_type: &str,
    transaction_id: &str,
) -> String {
    let branch = branch_name
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or("Unknown");
    sanitize_file_name(&format!(
        "{}_{}_{}_{}.jpg",
        date.format("%Y-%m-%d"),
        branch,
        photo_type,
        transaction_id
    ))
}

/// Archive filename for a date range.
pub fn photo_archive_name(range: &DateRange) -> String {
    format!(
        "photos_{}_to_{}.zip",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d")
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Delivery, DeliveryRecord, Transaction};
    use crate::report::{unified_entries, ReferenceIndex};
    use crate::types::Photos;

    fn delivery(liters: f64) -> Delivery {
        DeliveryRecord {
            load_session_id: "LS_1_AAAA".into(),
            delivery_order_id: "DO_1".into(),
            branch_id: "b1".into(),
            branch_name: "North".into(),
            oil_type_id: "diesel".into(),
            oil_type_name: "Diesel".into(),
            delivered_liters: liters,
            start_meter_reading: Some(10.0),
            end_meter_reading: Some(10.0 + liters),
            photos: Photos::new().with(photo_keys::HOSE_CONNECTION, "https://cdn/h.jpg"),
            ..Default::default()
        }
        .into_delivery(String::new(), Utc.with_ymd_and_hms(2024, 3, 10, 22, 30, 5).unwrap())
    }

    #[test]
    fn test_csv_has_one_row_per_stream_entry() {
        let deliveries = vec![delivery(100.0), delivery(200.0)];
        let transactions: Vec<Transaction> =
            deliveries.iter().map(Delivery::supply_transaction).collect();
        let entries = unified_entries(&deliveries, &transactions, &ReferenceIndex::default());

        let csv = render_csv(&entries, &Utc).unwrap();
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("\"Transaction ID\",\"Type\",\"Date\""));
        assert!(lines[1].contains("\"Supply\""));
        assert!(lines[3].contains("\"supply\""));
    }

    #[test]
    fn test_csv_row_format() {
        let entries = unified_entries(&[delivery(12.5)], &[], &ReferenceIndex::default());
        let csv = render_csv(&entries, &Utc).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"03/10/2024, 10:30:05 PM\""));
        assert!(row.contains("\"12.5\""));
        assert!(row.contains("\"North\""));
        assert!(row.contains("\"https://cdn/h.jpg\""));
        assert!(row.ends_with("\"completed\""));
        assert_eq!(row.matches("\",\"").count(), 13);
    }

    #[test]
    fn test_csv_does_not_escape_quotes() {
        let mut d = delivery(1.0);
        d.branch_name = "Say \"hi\"".into();
        let entries = unified_entries(&[d], &[], &ReferenceIndex::default());
        let csv = render_csv(&entries, &Utc).unwrap();
        assert!(csv.contains("\"Say \"hi\"\""));
    }

    #[test]
    fn test_empty_export_is_error() {
        assert!(matches!(
            render_csv(&[], &Utc),
            Err(CoreError::NothingToExport { .. })
        ));
    }

    #[test]
    fn test_csv_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(csv_filename(date), "oil_transactions_2024-01-05.csv");
    }

    #[test]
    fn test_date_range_end_is_inclusive() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let range = DateRange::new(day, day).unwrap();
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 59).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap()));
        assert!(DateRange::new(day, day.pred_opt().unwrap()).is_err());
    }

    #[test]
    fn test_photo_entry_name_sanitized() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            photo_entry_name(date, Some("Main St. #2"), "tankLevelBefore", "abc-1"),
            "2024-01-05_Main_St.__2_tankLevelBefore_abc-1.jpg"
        );
        assert_eq!(
            photo_entry_name(date, None, "hoseConnection", "x"),
            "2024-01-05_Unknown_hoseConnection_x.jpg"
        );
    }

    #[test]
    fn test_pick_timestamp_order() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(pick_timestamp(None, Some(a), Some(b)), Some(a));
        assert_eq!(pick_timestamp(None, None, Some(b)), Some(b));
        assert_eq!(pick_timestamp(None, None, None), None);
    }
}
