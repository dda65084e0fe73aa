use std::io::Read;

use super::normalizer::normalize_header;
use super::RowError;

pub const FULL_ADDRESS: &str = "Full Address";
pub const FUEL_TYPE: &str = "Fuel Type";
pub const GROSS_PRICE: &str = "Gross Price";
pub const CITY: &str = "City";
pub const STATE: &str = "State";
pub const ZIP: &str = "Zip";

/// Ordered column list shared by every record of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    input_width: usize,
}

impl Schema {
    /// Input header plus whichever of `City`, `State`, `Zip` it lacks.
    pub fn from_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns: Vec<String> = header
            .into_iter()
            .map(|name| normalize_header(name.as_ref()))
            .collect();
        let input_width = columns.len();
        for computed in [CITY, STATE, ZIP] {
            if !columns.iter().any(|column| column == computed) {
                columns.push(computed.to_string());
            }
        }
        Self {
            columns,
            input_width,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of columns the input header itself declared.
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }
}

/// One row's values, positionally aligned with the run's [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    /// Short rows are padded with empty values; rows wider than the header are rejected.
    pub fn from_fields(schema: &Schema, fields: &[String]) -> Result<Self, RowError> {
        if fields.len() > schema.input_width() {
            return Err(RowError::ExtraFields {
                expected: schema.input_width(),
                found: fields.len(),
            });
        }
        let mut values = fields.to_vec();
        values.resize(schema.len(), String::new());
        Ok(Self { values })
    }

    /// Missing columns read as empty.
    pub fn get<'a>(&'a self, schema: &Schema, column: &str) -> &'a str {
        schema
            .position(column)
            .and_then(|index| self.values.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set(&mut self, schema: &Schema, column: &str, value: String) -> Result<(), RowError> {
        let index = schema
            .position(column)
            .ok_or_else(|| RowError::UnknownColumn(column.to_string()))?;
        self.values[index] = value;
        Ok(())
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Raw rows in input order. A row that could not be decoded stays in place as an error so
/// the pipeline can report and drop it alongside rows that fail later.
#[derive(Debug)]
pub struct InputTable {
    pub schema: Schema,
    pub rows: Vec<Result<Vec<String>, RowError>>,
}

/// Reads the whole table into memory. Only I/O failures abort the load.
pub fn load_table<R: Read>(reader: R) -> Result<InputTable, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let schema = Schema::from_header(csv_reader.headers()?.iter());
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        match record {
            Ok(record) => rows.push(Ok(record.iter().map(str::to_string).collect())),
            Err(err) if is_io(&err) => return Err(err),
            Err(err) => rows.push(Err(RowError::Unreadable(err.to_string()))),
        }
    }

    Ok(InputTable { schema, rows })
}

fn is_io(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn schema_appends_missing_location_columns() {
        let schema = Schema::from_header(["Full Address", "Fuel Type", "Gross Price"]);
        assert_eq!(
            schema.columns(),
            ["Full Address", "Fuel Type", "Gross Price", "City", "State", "Zip"]
        );
    }

    #[test]
    fn schema_keeps_existing_zip_column_in_place() {
        let schema = Schema::from_header(["Zip", "Full Address", "Gross Price"]);
        assert_eq!(
            schema.columns(),
            ["Zip", "Full Address", "Gross Price", "City", "State"]
        );
    }

    #[test]
    fn schema_strips_byte_order_mark() {
        let schema = Schema::from_header(["\u{feff}Full Address", "Zip"]);
        assert_eq!(schema.position(FULL_ADDRESS), Some(0));
    }

    #[test]
    fn short_rows_are_padded() {
        let schema = Schema::from_header(["A", "B", "City", "State", "Zip"]);
        let record = Record::from_fields(&schema, &["x".to_string()]).expect("record");
        assert_eq!(record.values(), ["x", "", "", "", ""]);
        assert_eq!(record.get(&schema, "B"), "");
        assert_eq!(record.get(&schema, "Missing"), "");
    }

    #[test]
    fn wide_rows_are_rejected() {
        let schema = Schema::from_header(["City", "State", "Zip"]);
        let fields: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert!(matches!(
            Record::from_fields(&schema, &fields),
            Err(RowError::ExtraFields {
                expected: 3,
                found: 4
            })
        ));
    }

    #[test]
    fn set_rejects_unknown_columns() {
        let schema = Schema::from_header(["City", "State", "Zip"]);
        let mut record = Record::from_fields(&schema, &[]).expect("record");
        record.set(&schema, CITY, "Dayton".to_string()).expect("known column");
        assert_eq!(record.get(&schema, CITY), "Dayton");
        assert!(matches!(
            record.set(&schema, GROSS_PRICE, "1.00".to_string()),
            Err(RowError::UnknownColumn(ref column)) if column == GROSS_PRICE
        ));
    }

    #[test]
    fn load_keeps_raw_rows_and_flags_bad_encoding() {
        let mut bytes = b"Full Address,Fuel Type\n\"Dayton, OH\",Regular\n".to_vec();
        bytes.extend_from_slice(b"\xff\xfe,Diesel\n");
        bytes.extend_from_slice(b"Akron,\n");
        let table = load_table(Cursor::new(bytes)).expect("load");

        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.rows[0].as_ref().expect("first row"),
            &vec!["Dayton, OH".to_string(), "Regular".to_string()]
        );
        assert!(matches!(table.rows[1], Err(RowError::Unreadable(_))));
        assert_eq!(
            table.rows[2].as_ref().expect("third row"),
            &vec!["Akron".to_string(), String::new()]
        );
    }

    #[test]
    fn empty_input_yields_only_location_columns() {
        let table = load_table(Cursor::new("")).expect("load");
        assert_eq!(table.schema.columns(), ["City", "State", "Zip"]);
        assert!(table.rows.is_empty());
    }
}
