use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::parser::{Record, Schema};

pub(crate) fn write_table<W: Write>(
    writer: W,
    schema: &Schema,
    records: &[Record],
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    csv_writer.write_record(schema.columns())?;
    for record in records {
        csv_writer.write_record(record.values())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Creates missing parent directories before writing.
pub(crate) fn write_table_to_path(
    path: &Path,
    schema: &Schema,
    records: &[Record],
) -> Result<(), csv::Error> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_table(file, schema, records)
}
