//! CSV export of flagged customers and interventions

use chrono::NaiveDate;
use serde_json::Value;

use finguard_store::Document;

/// Header row of every export.
pub const CSV_HEADER: &str = "Type,Customer ID,Name,Details,Date";

/// Row emitted when there is nothing else to export.
pub const CSV_PLACEHOLDER_ROW: &str =
    "Demo,N/A,System Ready,Backend initialized but no data found,N/A";

const MISSING: &str = "N/A";

/// Which collections an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportKind {
    /// Flagged customers and interventions
    #[default]
    All,
    /// Flagged customers only
    Flagged,
    /// Interventions only
    Interventions,
}

impl ExportKind {
    /// Parse the `type` query parameter. Unknown values export everything.
    #[must_use]
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(|p| p.trim().to_lowercase()).as_deref() {
            Some("flagged" | "alerts") => Self::Flagged,
            Some("interventions") => Self::Interventions,
            _ => Self::All,
        }
    }

    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Flagged => "flagged",
            Self::Interventions => "interventions",
        }
    }

    /// True when flagged customers are included.
    #[must_use]
    pub fn includes_flagged(&self) -> bool {
        matches!(self, Self::All | Self::Flagged)
    }

    /// True when interventions are included.
    #[must_use]
    pub fn includes_interventions(&self) -> bool {
        matches!(self, Self::All | Self::Interventions)
    }
}

/// Attachment filename for an export made on `date`.
#[must_use]
pub fn export_filename(date: NaiveDate) -> String {
    format!("finguard-export-{}.csv", date.format("%Y-%m-%d"))
}

/// Build the CSV text. Flagged rows come first, then interventions, each in
/// the order given. With no data rows a single placeholder row is emitted.
#[must_use]
pub fn build_csv(flagged: &[Document], interventions: &[Document]) -> String {
    let mut rows: Vec<String> = Vec::with_capacity(flagged.len() + interventions.len() + 2);
    rows.push(CSV_HEADER.to_string());

    rows.extend(flagged.iter().map(|doc| {
        csv_row(&[
            "Flag",
            &text(doc, "customerId"),
            &text(doc, "name"),
            &text(doc, "reason"),
            &text(doc, "flaggedAt"),
        ])
    }));
    rows.extend(interventions.iter().map(|doc| {
        csv_row(&[
            "Intervention",
            &text(doc, "customerId"),
            &text(doc, "customerName"),
            &text(doc, "intervention"),
            &text(doc, "approvedAt"),
        ])
    }));

    if rows.len() == 1 {
        rows.push(CSV_PLACEHOLDER_ROW.to_string());
    }

    // Postcondition
    assert!(rows.len() >= 2, "export must have a header and a data row");

    let mut csv = rows.join("\n");
    csv.push('\n');
    csv
}

/// Field as display text; absent or empty fields read `N/A`.
fn text(doc: &Document, field: &str) -> String {
    match doc.get(field) {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) if s.is_empty() => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_row(cells: &[&str]) -> String {
    cells
        .iter()
        .map(|cell| escape(cell))
        .collect::<Vec<_>>()
        .join(",")
}

/// Quote a cell when it contains a delimiter, quote or line break.
fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(fields) => Document::new(id, fields),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_empty_export_has_placeholder() {
        let csv = build_csv(&[], &[]);
        assert_eq!(csv, format!("{CSV_HEADER}\n{CSV_PLACEHOLDER_ROW}\n"));
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_rows_in_order() {
        let flagged = [doc(
            "f1",
            json!({"customerId": "CUST-1", "name": "Asha", "reason": "Late", "flaggedAt": "2025-03-01T10:00:00.000Z"}),
        )];
        let interventions = [doc(
            "i1",
            json!({"customerId": "CUST-1", "customerName": "Asha", "intervention": "Call", "approvedAt": "2025-03-02T10:00:00.000Z"}),
        )];

        let csv = build_csv(&flagged, &interventions);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                CSV_HEADER,
                "Flag,CUST-1,Asha,Late,2025-03-01T10:00:00.000Z",
                "Intervention,CUST-1,Asha,Call,2025-03-02T10:00:00.000Z",
            ]
        );
    }

    #[test]
    fn test_missing_fields_and_quoting() {
        let flagged = [doc(
            "f1",
            json!({"customerId": 1042, "reason": "Missed payment, twice \"again\""}),
        )];
        let csv = build_csv(&flagged, &[]);
        assert_eq!(
            csv.lines().nth(1),
            Some("Flag,1042,N/A,\"Missed payment, twice \"\"again\"\"\",N/A")
        );
    }

    #[test]
    fn test_export_kind_param() {
        assert_eq!(ExportKind::from_param(None), ExportKind::All);
        assert_eq!(ExportKind::from_param(Some("Flagged")), ExportKind::Flagged);
        assert_eq!(ExportKind::from_param(Some("interventions")), ExportKind::Interventions);
        assert_eq!(ExportKind::from_param(Some("pdf")), ExportKind::All);
        assert!(!ExportKind::Flagged.includes_interventions());
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).expect("valid date");
        assert_eq!(export_filename(date), "finguard-export-2025-03-07.csv");
    }
}
