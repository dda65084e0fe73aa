mod address;
mod normalizer;
mod parser;
mod writer;

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CleaningConfig, PathsConfig};
use crate::workflows::zip_lookup::ZipResolver;

pub use address::{AddressParser, CityStateZipPattern, ParsedAddress};
pub use normalizer::{DEFAULT_PRICE, SENTINEL_ZIP};
pub use parser::{
    load_table, InputTable, Record, Schema, CITY, FUEL_TYPE, FULL_ADDRESS, GROSS_PRICE, STATE,
    ZIP,
};

use normalizer::{is_placeholder_zip, normalize_fuel_type, normalize_price, pad_zip};
use writer::{write_table, write_table_to_path};

/// A failure confined to one input row. The row is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("row has {found} fields but the header has {expected}")]
    ExtraFields { expected: usize, found: usize },
    #[error("row could not be decoded: {0}")]
    Unreadable(String),
    #[error("column '{0}' is not part of the input header")]
    UnknownColumn(String),
}

/// Failures that stop the batch before both outputs exist.
#[derive(Debug, thiserror::Error)]
pub enum CleaningError {
    #[error("failed to open input {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read input table: {0}")]
    Input(#[from] csv::Error),
    #[error("failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Where a cleaned row's ZIP came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ZipSource {
    Existing,
    Address,
    Lookup,
    Sentinel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub rows_read: usize,
    pub duplicates_skipped: usize,
    pub anomalies: usize,
    pub cleaned: usize,
    pub dropped: usize,
    pub zips_resolved: usize,
    pub sentinel_zips: usize,
    pub prices_defaulted: usize,
}

/// Records routed by one pass over an input table, ready to be written.
#[derive(Debug, Clone)]
pub struct CleanedOutput {
    pub schema: Schema,
    pub cleaned: Vec<Record>,
    pub anomalies: Vec<Record>,
    pub stats: CleaningStats,
}

impl CleanedOutput {
    pub fn write<C: Write, A: Write>(&self, cleaned: C, anomalies: A) -> Result<(), csv::Error> {
        write_table(cleaned, &self.schema, &self.cleaned)?;
        write_table(anomalies, &self.schema, &self.anomalies)
    }

    pub fn write_to_paths(&self, cleaned: &Path, anomalies: &Path) -> Result<(), CleaningError> {
        info!(path = %cleaned.display(), rows = self.cleaned.len(), "writing cleaned data");
        write_table_to_path(cleaned, &self.schema, &self.cleaned).map_err(|source| {
            CleaningError::Output {
                path: cleaned.to_path_buf(),
                source,
            }
        })?;

        info!(path = %anomalies.display(), rows = self.anomalies.len(), "writing anomalies");
        write_table_to_path(anomalies, &self.schema, &self.anomalies).map_err(|source| {
            CleaningError::Output {
                path: anomalies.to_path_buf(),
                source,
            }
        })
    }
}

/// Summary of a file-to-file run.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub input: PathBuf,
    pub cleaned_output: PathBuf,
    pub anomalies_output: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub lookup_budget: usize,
    pub lookups_remaining: usize,
    pub city_map_entries: usize,
    #[serde(flatten)]
    pub stats: CleaningStats,
}

enum RowOutcome {
    Cleaned(Record),
    Anomaly(Record),
}

/// Deduplicates, routes and normalizes fuel purchase rows. One cleaner is one run: the
/// resolver's lookup budget is spent across every table it cleans.
#[derive(Debug)]
pub struct RowCleaner<P = CityStateZipPattern> {
    resolver: ZipResolver,
    parser: P,
    anomaly_marker: String,
}

impl RowCleaner {
    pub fn new(resolver: ZipResolver, config: &CleaningConfig) -> Self {
        Self::with_parser(resolver, CityStateZipPattern, config)
    }
}

impl<P: AddressParser> RowCleaner<P> {
    pub fn with_parser(resolver: ZipResolver, parser: P, config: &CleaningConfig) -> Self {
        Self {
            resolver,
            parser,
            anomaly_marker: config.anomaly_marker.to_lowercase(),
        }
    }

    pub fn resolver(&self) -> &ZipResolver {
        &self.resolver
    }

    /// Reads `paths.input`, then writes both outputs, even when either set is empty.
    pub fn run(&mut self, paths: &PathsConfig) -> Result<CleaningReport, CleaningError> {
        let started_at = Utc::now();
        info!(path = %paths.input.display(), "starting data cleaning");

        let file = File::open(&paths.input).map_err(|source| CleaningError::Open {
            path: paths.input.clone(),
            source,
        })?;
        let output = self.clean_reader(file)?;
        output.write_to_paths(&paths.cleaned, &paths.anomalies)?;

        let report = CleaningReport {
            input: paths.input.clone(),
            cleaned_output: paths.cleaned.clone(),
            anomalies_output: paths.anomalies.clone(),
            started_at,
            finished_at: Utc::now(),
            lookup_budget: self.resolver.budget().limit(),
            lookups_remaining: self.resolver.budget().remaining(),
            city_map_entries: self.resolver.map().len(),
            stats: output.stats,
        };
        info!(
            cleaned = report.stats.cleaned,
            anomalies = report.stats.anomalies,
            dropped = report.stats.dropped,
            zips_resolved = report.stats.zips_resolved,
            "cleaning complete"
        );
        Ok(report)
    }

    pub fn clean_reader<R: Read>(&mut self, reader: R) -> Result<CleanedOutput, CleaningError> {
        let table = load_table(reader)?;
        Ok(self.clean_table(table))
    }

    pub fn clean_table(&mut self, table: InputTable) -> CleanedOutput {
        let InputTable { schema, rows } = table;
        let mut stats = CleaningStats::default();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut cleaned = Vec::new();
        let mut anomalies = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            stats.rows_read += 1;
            let row_number = index + 1;

            let fields = match row {
                Ok(fields) => fields,
                Err(err) => {
                    warn!(row_number, error = %err, "dropping unreadable row");
                    stats.dropped += 1;
                    continue;
                }
            };

            if !seen.insert(fields.clone()) {
                stats.duplicates_skipped += 1;
                continue;
            }

            match self.process_row(&schema, &fields, &mut stats) {
                Ok(RowOutcome::Cleaned(record)) => {
                    stats.cleaned += 1;
                    cleaned.push(record);
                }
                Ok(RowOutcome::Anomaly(record)) => {
                    stats.anomalies += 1;
                    anomalies.push(record);
                }
                Err(err) => {
                    warn!(row_number, row = ?fields, error = %err, "dropping row that failed to process");
                    stats.dropped += 1;
                }
            }
        }

        CleanedOutput {
            schema,
            cleaned,
            anomalies,
            stats,
        }
    }

    fn process_row(
        &mut self,
        schema: &Schema,
        fields: &[String],
        stats: &mut CleaningStats,
    ) -> Result<RowOutcome, RowError> {
        let mut record = Record::from_fields(schema, fields)?;

        let fuel_type = normalize_fuel_type(record.get(schema, FUEL_TYPE));
        if fuel_type.contains(&self.anomaly_marker) {
            return Ok(RowOutcome::Anomaly(record));
        }

        let address = self.parser.parse(record.get(schema, FULL_ADDRESS));
        let existing_zip = record.get(schema, ZIP).trim().to_string();
        let (zip, source) = self.resolve_zip(&existing_zip, &address);
        // Budget spent on a lookup stays spent even if the row is dropped below.
        if source == ZipSource::Lookup {
            stats.zips_resolved += 1;
        }

        let price = normalize_price(record.get(schema, GROSS_PRICE));
        let price_defaulted = price.is_none();

        let ParsedAddress { city, state, .. } = address;
        record.set(schema, CITY, city)?;
        record.set(schema, STATE, state)?;
        record.set(schema, ZIP, pad_zip(&zip))?;
        record.set(
            schema,
            GROSS_PRICE,
            price.unwrap_or_else(|| DEFAULT_PRICE.to_string()),
        )?;

        if source == ZipSource::Sentinel {
            stats.sentinel_zips += 1;
        }
        if price_defaulted {
            stats.prices_defaulted += 1;
        }
        Ok(RowOutcome::Cleaned(record))
    }

    /// A real ZIP on the row wins, then one written in the address. Only when both are
    /// missing does the city map get a turn, and a failed lookup lands on the sentinel
    /// exactly like a row without enough address to look up.
    fn resolve_zip(&mut self, existing: &str, address: &ParsedAddress) -> (String, ZipSource) {
        if !is_placeholder_zip(existing) {
            return (existing.to_string(), ZipSource::Existing);
        }
        if !address.zip.is_empty() {
            return (address.zip.clone(), ZipSource::Address);
        }

        let lookup_allowed = !address.city.is_empty()
            && !address.state.is_empty()
            && !self.resolver.budget().is_exhausted();
        if lookup_allowed {
            debug!(city = %address.city, state = %address.state, "looking up ZIP");
            if let Some(zip) = self.resolver.lookup_zip(&address.city, &address.state) {
                return (zip, ZipSource::Lookup);
            }
            debug!(city = %address.city, "no ZIP found for city; using sentinel");
        }

        (SENTINEL_ZIP.to_string(), ZipSource::Sentinel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::zip_lookup::{CityZipMap, LookupBudget};
    use std::io::Cursor;

    const HEADER: &str = "Transaction Date,Full Address,Zip,Fuel Type,Gross Price";

    fn cleaner_with(map: CityZipMap, budget: usize) -> RowCleaner {
        RowCleaner::new(
            ZipResolver::new(map, LookupBudget::new(budget)),
            &CleaningConfig::default(),
        )
    }

    fn clean(csv: &str) -> CleanedOutput {
        cleaner_with(CityZipMap::default(), 5)
            .clean_reader(Cursor::new(csv.to_string()))
            .expect("clean")
    }

    fn field<'a>(output: &'a CleanedOutput, record: &'a Record, column: &str) -> &'a str {
        record.get(&output.schema, column)
    }

    #[test]
    fn fills_city_state_and_zip_from_address() {
        let output = clean(&format!(
            "{HEADER}\n2025-04-01,\"Cincinnati, OH 45255\",,Regular,3.5\n"
        ));
        assert_eq!(output.cleaned.len(), 1);
        let row = &output.cleaned[0];
        assert_eq!(field(&output, row, CITY), "Cincinnati");
        assert_eq!(field(&output, row, STATE), "OH");
        assert_eq!(field(&output, row, ZIP), "45255");
        assert_eq!(field(&output, row, GROSS_PRICE), "3.50");
    }

    #[test]
    fn blank_address_and_bad_price_fall_back_to_defaults() {
        let output = clean(&format!("{HEADER}\n2025-04-01,,0,Diesel,abc\n"));
        let row = &output.cleaned[0];
        assert_eq!(field(&output, row, CITY), "");
        assert_eq!(field(&output, row, STATE), "");
        assert_eq!(field(&output, row, ZIP), "00000");
        assert_eq!(field(&output, row, GROSS_PRICE), "0.00");
        assert_eq!(output.stats.sentinel_zips, 1);
        assert_eq!(output.stats.prices_defaulted, 1);
    }

    #[test]
    fn existing_zip_is_kept_and_padded() {
        let output = clean(&format!(
            "{HEADER}\n2025-04-01,\"Boston, MA 02134\", 2134 ,Regular,4\n"
        ));
        let row = &output.cleaned[0];
        assert_eq!(field(&output, row, ZIP), "02134");
        assert_eq!(field(&output, row, CITY), "Boston");
    }

    #[test]
    fn anomalies_are_routed_unchanged() {
        let output = clean(&format!(
            "{HEADER}\n2025-04-01,\"Dayton, OH\",,  PEPSI Cola ,1.5\n"
        ));
        assert!(output.cleaned.is_empty());
        assert_eq!(output.anomalies.len(), 1);
        assert_eq!(
            output.anomalies[0].values(),
            ["2025-04-01", "Dayton, OH", "", "  PEPSI Cola ", "1.5", "", ""]
        );
    }

    #[test]
    fn duplicates_are_dropped_after_first_occurrence() {
        let row = "2025-04-01,\"Cincinnati, OH 45255\",,Regular,3.5";
        let pepsi = "2025-04-02,,,Pepsi,1";
        let output = clean(&format!("{HEADER}\n{row}\n{pepsi}\n{row}\n{pepsi}\n"));
        assert_eq!(output.cleaned.len(), 1);
        assert_eq!(output.anomalies.len(), 1);
        assert_eq!(output.stats.duplicates_skipped, 2);
        assert_eq!(output.stats.rows_read, 4);
    }

    #[test]
    fn lookup_fills_missing_zip_from_city_map() {
        let map: CityZipMap = [("Milford", "45150")].into_iter().collect();
        let mut cleaner = cleaner_with(map, 5);
        let output = cleaner
            .clean_reader(Cursor::new(format!(
                "{HEADER}\n2025-04-01,\"Milford, OH\",,Regular,3\n2025-04-01,\"Dayton, OH\",,Regular,3\n"
            )))
            .expect("clean");

        assert_eq!(field(&output, &output.cleaned[0], ZIP), "45150");
        assert_eq!(field(&output, &output.cleaned[1], ZIP), "00000");
        assert_eq!(output.stats.zips_resolved, 1);
        assert_eq!(cleaner.resolver().budget().used(), 1);
    }

    #[test]
    fn lookup_requires_state() {
        let map: CityZipMap = [("Milford", "45150")].into_iter().collect();
        let mut cleaner = cleaner_with(map, 5);
        let output = cleaner
            .clean_reader(Cursor::new(format!(
                "{HEADER}\n2025-04-01,Milford,,Regular,3\n"
            )))
            .expect("clean");
        assert_eq!(field(&output, &output.cleaned[0], ZIP), "00000");
        assert_eq!(cleaner.resolver().budget().used(), 0);
    }

    #[test]
    fn lookups_stop_at_budget() {
        let map: CityZipMap = [("Milford", "45150")].into_iter().collect();
        let mut cleaner = cleaner_with(map, 2);
        let rows: String = (0..4)
            .map(|n| format!("2025-04-0{n},\"Milford, OH\",,Regular,3\n"))
            .collect();
        let output = cleaner
            .clean_reader(Cursor::new(format!("{HEADER}\n{rows}")))
            .expect("clean");

        let zips: Vec<&str> = output
            .cleaned
            .iter()
            .map(|row| field(&output, row, ZIP))
            .collect();
        assert_eq!(zips, ["45150", "45150", "00000", "00000"]);
        assert_eq!(output.stats.zips_resolved, 2);
    }

    #[test]
    fn wide_rows_are_dropped_without_stopping_the_run() {
        let output = clean(&format!(
            "{HEADER}\n2025-04-01,,,Regular,3,extra\n2025-04-02,,,Regular,4\n"
        ));
        assert_eq!(output.stats.dropped, 1);
        assert_eq!(output.cleaned.len(), 1);
        assert_eq!(field(&output, &output.cleaned[0], GROSS_PRICE), "4.00");
    }

    #[test]
    fn missing_price_column_drops_cleaned_rows_but_keeps_anomalies() {
        let output = clean("Full Address,Fuel Type\n\"Dayton, OH\",Regular\n,Pepsi\n");
        assert!(output.cleaned.is_empty());
        assert_eq!(output.anomalies.len(), 1);
        assert_eq!(output.stats.dropped, 1);
    }

    #[test]
    fn custom_address_parser_can_be_substituted() {
        struct FixedParser;
        impl AddressParser for FixedParser {
            fn parse(&self, _address: &str) -> ParsedAddress {
                ParsedAddress {
                    city: "Loveland".to_string(),
                    state: "OH".to_string(),
                    zip: "45140".to_string(),
                }
            }
        }

        let mut cleaner = RowCleaner::with_parser(
            ZipResolver::offline(LookupBudget::new(5)),
            FixedParser,
            &CleaningConfig::default(),
        );
        let output = cleaner
            .clean_reader(Cursor::new(format!("{HEADER}\n2025-04-01,anything,,Regular,1\n")))
            .expect("clean");
        assert_eq!(field(&output, &output.cleaned[0], CITY), "Loveland");
        assert_eq!(field(&output, &output.cleaned[0], ZIP), "45140");
    }

    #[test]
    fn outputs_share_the_unified_schema() {
        let output = clean(&format!(
            "{HEADER}\n2025-04-01,,,Regular,3\n2025-04-01,,,pepsi,3\n"
        ));
        let mut cleaned = Vec::new();
        let mut anomalies = Vec::new();
        output.write(&mut cleaned, &mut anomalies).expect("write");

        let header = format!("{HEADER},City,State\r\n");
        assert!(String::from_utf8(cleaned).expect("utf8").starts_with(&header));
        assert!(String::from_utf8(anomalies).expect("utf8").starts_with(&header));
    }
}
