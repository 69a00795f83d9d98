// =============================================================================
// CSV export — candle history and MACD series sinks
// =============================================================================

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::indicators::IndicatorSeries;
use crate::types::Candle;

/// Write `candles` as `time,low,high,open,close,volume` rows.
pub fn write_candles_csv<W: Write>(writer: W, candles: &[Candle]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["time", "low", "high", "open", "close", "volume"])?;
    for c in candles {
        wtr.write_record([
            c.time.to_string(),
            c.low.to_string(),
            c.high.to_string(),
            c.open.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    wtr.flush().context("failed to flush candle CSV")?;
    Ok(())
}

/// Write `series` as `time,macd,signal,histogram` rows with RFC 3339 times.
pub fn write_macd_csv<W: Write>(writer: W, series: &IndicatorSeries) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["time", "macd", "signal", "histogram"])?;
    for p in series.points() {
        wtr.write_record([
            p.time.to_rfc3339(),
            p.macd.to_string(),
            p.signal.to_string(),
            p.hist.to_string(),
        ])?;
    }
    wtr.flush().context("failed to flush MACD CSV")?;
    Ok(())
}

pub fn export_candles(path: impl AsRef<Path>, candles: &[Candle]) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_candles_csv(file, candles)?;
    info!(path = %path.display(), rows = candles.len(), "candles exported");
    Ok(())
}

pub fn export_macd(path: impl AsRef<Path>, series: &IndicatorSeries) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_macd_csv(file, series)?;
    info!(path = %path.display(), rows = series.len(), "MACD exported");
    Ok(())
}
