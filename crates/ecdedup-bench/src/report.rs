//! Console and CSV output for run reports.

use crate::driver::RunReport;
use std::path::Path;

/// One human-readable line per run.
pub fn format_line(report: &RunReport) -> String {
    format!(
        "T={} N={} K={} policy={} unit={} rate={:.4} dedup={:.1}K total={:.1}K elapse={}ms",
        report.threshold,
        report.total,
        report.buckets,
        report.policy,
        report.unit,
        report.rate,
        report.dedup_bytes as f64 / 1024.0,
        report.total_bytes as f64 / 1024.0,
        report.elapsed_ms,
    )
}

pub fn print_reports(reports: &[RunReport]) {
    for report in reports {
        println!("{}", format_line(report));
    }
}

pub fn write_csv(path: &Path, reports: &[RunReport]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for report in reports {
        writer.serialize(report)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = reports.len(), "wrote CSV report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecdedup_core::{AssignmentPolicy, RoutingUnit};
    use tempfile::TempDir;

    fn sample_report() -> RunReport {
        RunReport {
            threshold: 2,
            total: 3,
            buckets: 3,
            policy: AssignmentPolicy::Optimal,
            unit: RoutingUnit::Share,
            piece_length: 1024,
            files: 10,
            batches: 10,
            total_bytes: 4096,
            dedup_bytes: 1024,
            rate: 0.25,
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_format_line() {
        let line = format_line(&sample_report());
        assert_eq!(
            line,
            "T=2 N=3 K=3 policy=optimal unit=share rate=0.2500 dedup=1.0K total=4.0K elapse=12ms"
        );
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        write_csv(&path, &[sample_report(), sample_report()]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "threshold");
        assert_eq!(&headers[4], "policy");
        let rows: Vec<RunReport> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], sample_report());
    }
}
