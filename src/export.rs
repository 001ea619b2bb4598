//! Export of recovery history as chart series

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

use crate::error::ExportError;
use crate::trend::ChartPoint;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat { format: s.to_string() }),
        }
    }
}

/// Write `points` to `writer`
///
/// CSV gets a header row and one row per point with an empty heart-rate cell
/// when none was recorded. JSON is a pretty-printed array.
pub fn export_history<W: Write>(points: &[ChartPoint], format: ExportFormat, writer: W) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            for point in points {
                csv_writer.serialize(point)?;
            }
            csv_writer.flush()?;
        }
        ExportFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, points)?;
            writeln!(writer)?;
        }
    }

    tracing::debug!(rows = points.len(), format = ?format, "History exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecoveryScoreRecord;
    use chrono::NaiveDate;

    fn points() -> Vec<ChartPoint> {
        let records = [
            RecoveryScoreRecord {
                date: NaiveDate::from_ymd_opt(2024, 10, 18).unwrap(),
                recovery_score: 73,
                pain_level: 3,
                mobility_scale: 7,
                mental_health_index: 8,
                heart_rate: Some(72),
            },
            RecoveryScoreRecord {
                date: NaiveDate::from_ymd_opt(2024, 10, 19).unwrap(),
                recovery_score: 50,
                pain_level: 5,
                mobility_scale: 5,
                mental_health_index: 5,
                heart_rate: None,
            },
        ];
        records.iter().map(ChartPoint::from).collect()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_csv_export() {
        let mut buffer = Vec::new();
        export_history(&points(), ExportFormat::Csv, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "date,formatted_date,recovery_score,pain_level,mobility_scale,mental_health_index,heart_rate"
        );
        assert_eq!(lines[1], "2024-10-18,Oct 18,73,3,7,8,72");
        assert_eq!(lines[2], "2024-10-19,Oct 19,50,5,5,5,");
    }

    #[test]
    fn test_json_export() {
        let mut buffer = Vec::new();
        export_history(&points(), ExportFormat::Json, &mut buffer).unwrap();

        let parsed: Vec<ChartPoint> = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed, points());
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_failure_is_reported() {
        let err = export_history(&points(), ExportFormat::Csv, ClosedPipe).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));

        let err = crate::error::RecoveryError::from(err);
        assert!(err.user_message().contains("closed"));
    }

    #[test]
    fn test_empty_csv_has_no_rows() {
        let mut buffer = Vec::new();
        export_history(&[], ExportFormat::Csv, &mut buffer).unwrap();
        assert!(buffer.is_empty());
    }
}
