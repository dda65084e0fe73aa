use std::io::{self, Write};

use fuel_cleaner::error::AppError;
use fuel_cleaner::workflows::cleaning::CleaningReport;

pub(crate) fn write_text<W: Write>(out: &mut W, report: &CleaningReport) -> io::Result<()> {
    let stats = &report.stats;
    let elapsed = report.finished_at - report.started_at;

    writeln!(out, "Fuel purchase cleaning complete")?;
    writeln!(out, "Input: {}", report.input.display())?;
    writeln!(
        out,
        "Rows read: {} ({} duplicates skipped, {} dropped)",
        stats.rows_read, stats.duplicates_skipped, stats.dropped
    )?;
    writeln!(
        out,
        "Cleaned: {} -> {}",
        stats.cleaned,
        report.cleaned_output.display()
    )?;
    writeln!(
        out,
        "Anomalies: {} -> {}",
        stats.anomalies,
        report.anomalies_output.display()
    )?;
    writeln!(
        out,
        "ZIPs filled using API: {}/{} ({} lookups left, city map entries: {})",
        stats.zips_resolved,
        report.lookup_budget,
        report.lookups_remaining,
        report.city_map_entries
    )?;
    writeln!(
        out,
        "Sentinel ZIPs: {}, defaulted prices: {}",
        stats.sentinel_zips, stats.prices_defaulted
    )?;
    writeln!(out, "Elapsed: {} ms", elapsed.num_milliseconds())
}

pub(crate) fn write_json<W: Write>(out: &mut W, report: &CleaningReport) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}
