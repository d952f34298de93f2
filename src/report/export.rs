use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::Observer;
use crate::error::{Error, Result};
use crate::stats::SessionSummary;
use crate::transport::EchoReply;

/// Name of the only worksheet in the export
const SHEET: &str = "Sheet1";

/// Column titles, in column order
const HEADER: [&str; 4] = ["Sequence", "Duration", "Bytes", "IP Address"];

/// One row of the export table
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub sequence: u16,
    pub duration: Duration,
    pub bytes: usize,
    pub addr: IpAddr,
}

impl ExportRow {
    /// Round-trip time in milliseconds, rounded to four decimals
    pub fn millis(&self) -> f64 {
        (self.duration.as_secs_f64() * 1000f64 * 10_000f64).round() / 10_000f64
    }
}

impl From<&EchoReply> for ExportRow {
    fn from(reply: &EchoReply) -> Self {
        Self {
            sequence: reply.sequence,
            duration: reply.rtt,
            bytes: reply.bytes,
            addr: reply.source,
        }
    }
}

/// Spreadsheet export with one row per accepted reply
///
/// Rows are collected while the session runs and written as an `.xlsx` workbook once it
/// finishes. Duplicates never make it into the table. The header occupies row 1, so the first
/// reply lands in row 2.
#[derive(Debug)]
pub struct ExportReport {
    path: PathBuf,
    rows: Vec<ExportRow>,
    next_row: u32,
}

impl ExportReport {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            rows: Vec::new(),
            next_row: 2,
        }
    }

    /// Lay out header and all rows collected so far on a single worksheet
    ///
    /// Sheet rows are zero-based, row 1 of the table is sheet row 0.
    fn workbook(&self) -> std::result::Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let millis = Format::new().set_num_format("0.0000");

        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET)?;
        for (col, title) in (0u16..).zip(HEADER.iter()) {
            sheet.write_string(0, col, *title)?;
        }

        for (row, data) in (1u32..).zip(self.rows.iter()) {
            sheet.write_number(row, 0, data.sequence)?;
            sheet.write_number_with_format(row, 1, data.millis(), &millis)?;
            sheet.write_number(row, 2, data.bytes as f64)?;
            sheet.write_string(row, 3, data.addr.to_string())?;
        }

        Ok(workbook)
    }

    /// Write the table to the configured path, replacing any previous file
    fn save(&self) -> std::result::Result<(), XlsxError> {
        self.workbook()?.save(&self.path)
    }
}

impl Observer for ExportReport {
    fn on_reply(&mut self, reply: &EchoReply) {
        trace!("Export row {} for icmp_seq={}", self.next_row, reply.sequence);
        self.rows.push(ExportRow::from(reply));
        self.next_row += 1;
    }

    fn on_finish(&mut self, _summary: &SessionSummary) -> Result<()> {
        self.save().map_err(|source| Error::Export {
            path: self.path.clone(),
            source,
        })?;

        info!("Wrote {} rows to {}", self.next_row - 2, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));

    fn reply(seq: u16, micros: u64) -> EchoReply {
        EchoReply {
            sequence: seq,
            bytes: 64,
            rtt: Duration::from_micros(micros),
            source: ADDR,
            ttl: None,
            duplicate: false,
        }
    }

    fn summary() -> SessionSummary {
        SessionSummary {
            addr: ADDR,
            packets_sent: 0,
            packets_received: 0,
            packet_loss: 0.0,
            min_rtt: Duration::ZERO,
            avg_rtt: Duration::ZERO,
            max_rtt: Duration::ZERO,
            stddev_rtt: Duration::ZERO,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("seqping-{}-{}.xlsx", name, std::process::id()))
    }

    #[test]
    fn rows_follow_header() {
        let mut report = ExportReport::new("unused.xlsx");
        assert_eq!(report.next_row, 2);

        report.on_reply(&reply(1, 12_345));
        report.on_reply(&reply(2, 250));
        assert_eq!(report.next_row, 4);

        let sequences: Vec<_> = report.rows.iter().map(|row| row.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(report.rows[0].millis(), 12.345);
        assert_eq!(report.rows[1].millis(), 0.25);
        assert_eq!(report.rows[1].addr, ADDR);
    }

    #[test]
    fn duration_keeps_four_decimals() {
        let row = ExportRow::from(&reply(0, 1_234_567));
        assert_eq!(row.millis(), 1234.567);

        let row = ExportRow {
            duration: Duration::from_nanos(1_234_567),
            ..row
        };
        assert_eq!(row.millis(), 1.2346);
    }

    #[test]
    fn duplicates_are_not_exported() {
        let mut report = ExportReport::new("unused.xlsx");
        report.on_reply(&reply(1, 1_000));
        report.on_duplicate(&reply(1, 2_000));

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.next_row, 3);
    }

    #[test]
    fn empty_table_keeps_header() {
        let report = ExportReport::new("unused.xlsx");
        let mut workbook = report.workbook().expect("Header-only workbook");
        assert!(workbook.worksheet_from_name(SHEET).is_ok());

        let buf = workbook.save_to_buffer().expect("Saving to memory cannot fail");
        assert!(buf.starts_with(b"PK"));
    }

    #[test]
    fn finish_writes_workbook() {
        let path = temp_path("export");
        let mut report = ExportReport::new(&path);
        report.on_reply(&reply(0, 1_000));
        report.on_finish(&summary()).expect("Failed writing export");

        let written = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        // An xlsx workbook is a zip archive
        assert!(written.starts_with(b"PK\x03\x04"));
    }

    #[test]
    fn unwritable_path_is_export_error() {
        let path = std::env::temp_dir()
            .join("seqping-missing-directory")
            .join("nested")
            .join("out.xlsx");
        let mut report = ExportReport::new(&path);

        match report.on_finish(&summary()) {
            Err(Error::Export { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("Expected export error, got {:?}", other),
        }
    }
}
