//! CSV export.
//!
//! Writes the header line then one line per row, each cell as its display
//! text. Fields containing the delimiter, a quote or a line break are quoted
//! with embedded quotes doubled. Every line ends with `\n`.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::api::logs::log_success;
use crate::error::{ExportError, ExportResult};
use crate::models::Table;

/// Serialize `table` to CSV into any writer.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> ExportResult<()> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(writer);

    wtr.write_record(table.columns())?;

    let width = table.column_count();
    for row in table.rows() {
        wtr.write_record((0..width).map(|i| row.get(i).to_string()))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Serialize `table` to a CSV string.
pub fn to_csv_string(table: &Table) -> ExportResult<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|_| ExportError::Utf8)
}

/// Write `table` as CSV to `path`, replacing any existing file.
pub fn write_csv_file<P: AsRef<Path>>(table: &Table, path: P) -> ExportResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_csv(table, file)?;
    log_success(format!("Wrote {} rows to {}", table.row_count(), path.display()));
    Ok(())
}
