//! OHLCV CSV input and output.
//!
//! Expected header: `timestamp,open,high,low,close[,volume]` (`date` and
//! `time` are accepted for the first column). Timestamps may be RFC 3339,
//! `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD` or unix seconds.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use permlab_core::{Bar, PriceSeries};

#[derive(Debug, Deserialize)]
struct CsvBar {
    #[serde(alias = "date", alias = "time", alias = "datetime")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date '{raw}'"));
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| anyhow!("unix timestamp out of range: {secs}"));
    }
    Err(anyhow!("unrecognized timestamp '{raw}'"))
}

/// Load a price series from CSV. The symbol defaults to the file stem.
pub fn load_csv(path: &Path, symbol: Option<&str>) -> Result<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut bars = Vec::new();
    for (i, record) in reader.deserialize::<CsvBar>().enumerate() {
        // Line numbers are 1-based and the header occupies line 1.
        let row =
            record.with_context(|| format!("{}: bad row at line {}", path.display(), i + 2))?;
        bars.push(Bar::new(
            parse_timestamp(&row.timestamp)
                .with_context(|| format!("{}: line {}", path.display(), i + 2))?,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume.unwrap_or(0.0),
        ));
    }

    let symbol = symbol.map(str::to_string).unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("SERIES")
            .to_string()
    });
    PriceSeries::new(symbol, bars).with_context(|| format!("invalid series in {}", path.display()))
}

/// Write `series` as CSV with the same header [`load_csv`] reads.
pub fn write_csv(series: &PriceSeries, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for bar in series.bars() {
        wtr.write_record([
            bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for raw in [
            "2024-03-01",
            "2024-03-01 00:00:00",
            "2024-03-01T00:00:00",
            "2024-03-01T00:00:00Z",
            "1709251200",
        ] {
            assert_eq!(parse_timestamp(raw).unwrap(), expected, "{raw}");
        }
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn loads_csv_with_optional_volume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY.csv");
        std::fs::write(
            &path,
            "date,open,high,low,close\n\
             2024-01-02,100,101,99,100.5\n\
             2024-01-03,100.5,102,100,101.5\n",
        )
        .unwrap();
        let series = load_csv(&path, None).unwrap();
        assert_eq!(series.symbol(), "SPY");
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[1].close, 101.5);
        assert_eq!(series.bars()[0].volume, 0.0);
    }

    #[test]
    fn rejects_malformed_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "timestamp,open,high,low,close\n\
             2024-01-03,100,101,99,100\n\
             2024-01-02,100,101,99,100\n",
        )
        .unwrap();
        assert!(load_csv(&path, None).is_err());
    }

    #[test]
    fn written_csv_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.csv");
        std::fs::write(
            &src,
            "timestamp,open,high,low,close,volume\n\
             2024-01-02 09:30:00,100,101,99,100.5,1200\n\
             2024-01-02 10:30:00,100.5,102,100,101.5,900\n",
        )
        .unwrap();
        let series = load_csv(&src, Some("X")).unwrap();
        let out = dir.path().join("out.csv");
        write_csv(&series, &out).unwrap();
        assert_eq!(load_csv(&out, Some("X")).unwrap(), series);
    }
}
