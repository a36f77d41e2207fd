//! Grain statistics CSV ingest.
//!
//! Turns a phase input table into `GrainRow`s. Unlike a screening tool we cannot
//! skip bad rows: a missing grain changes the microstructure, so any malformed
//! row aborts the run with a configuration error naming the line.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::GrainRow;
use crate::error::AppError;

const REQUIRED_COLUMNS: [&str; 4] = ["a", "b", "c", "alpha"];

/// Read a grain statistics table from disk.
pub fn read_grain_rows(path: &Path) -> Result<Vec<GrainRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::configuration(format!("Failed to open grain table '{}': {e}", path.display())))?;
    read_grain_rows_from(file)
        .map_err(|e| AppError::configuration(format!("{} ({})", e.message(), path.display())))
}

/// Read a grain statistics table from any reader.
pub fn read_grain_rows_from<R: Read>(reader: R) -> Result<Vec<GrainRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::configuration(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for name in REQUIRED_COLUMNS {
        if !header_map.contains_key(name) {
            return Err(AppError::configuration(format!("Missing required column: `{name}`")));
        }
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; CSV lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::configuration(format!("CSV parse error on line {line}: {e}")))?;
        let row = parse_row(&record, &header_map)
            .map_err(|e| AppError::configuration(format!("Line {line}: {e}")))?;
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(AppError::configuration("Grain table contains no rows."));
    }
    Ok(rows)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<GrainRow, String> {
    let a = parse_positive(get_required(record, header_map, "a")?, "a")?;
    let b = parse_positive(get_required(record, header_map, "b")?, "b")?;
    let c = parse_positive(get_required(record, header_map, "c")?, "c")?;
    let alpha = parse_finite(get_required(record, header_map, "alpha")?, "alpha")?;
    let volume = get_optional(record, header_map, "volume")
        .map(|s| parse_positive(s, "volume"))
        .transpose()?;

    Ok(GrainRow { a, b, c, alpha, volume })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_finite(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{s}'."))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite `{name}` value."))
    }
}

fn parse_positive(s: &str, name: &str) -> Result<f64, String> {
    let v = parse_finite(s, name)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(format!("`{name}` must be > 0 (got {v})."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn reads_rows_with_bom_and_mixed_case_headers() {
        let csv = "\u{feff}A,b,C,Alpha\n5,4,3,10\n2.5, 2.5, 2.5, 0\n";
        let rows = read_grain_rows_from(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], GrainRow { a: 5.0, b: 4.0, c: 3.0, alpha: 10.0, volume: None });
        assert_eq!(rows[1].a, 2.5);
    }

    #[test]
    fn optional_volume_column() {
        let csv = "a,b,c,alpha,volume\n5,4,3,10,250\n5,4,3,10,\n";
        let rows = read_grain_rows_from(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].volume, Some(250.0));
        assert_eq!(rows[1].volume, None);
    }

    #[test]
    fn missing_column_is_configuration_error() {
        let err = read_grain_rows_from("a,b,alpha\n1,2,3\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("`c`"));
    }

    #[test]
    fn malformed_value_names_the_line() {
        let csv = "a,b,c,alpha\n1,1,1,0\n1,x,1,0\n";
        let err = read_grain_rows_from(csv.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().starts_with("Line 3"));
    }

    #[test]
    fn non_positive_axis_is_rejected() {
        let csv = "a,b,c,alpha\n1,0,1,0\n";
        assert!(read_grain_rows_from(csv.as_bytes()).is_err());
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(read_grain_rows_from("a,b,c,alpha\n".as_bytes()).is_err());
    }
}
