//! Spreadsheet codec
//!
//! Converts between interchange files and flat key-value rows. The shipped
//! codec reads and writes CSV; anything else plugs in behind [`SheetCodec`].

use std::collections::HashMap;
use warga_common::{Error, Result};

/// One decoded data row, keyed by header name
pub type SheetRow = HashMap<String, String>;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub trait SheetCodec: Send + Sync {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    fn content_type(&self) -> &'static str;

    /// Encode a header row followed by data rows
    fn encode(&self, headers: &[&str], rows: &[Vec<String>]) -> Result<Vec<u8>>;

    /// Decode every data row of a file; fails with `Decode` on unreadable input
    fn decode(&self, bytes: &[u8]) -> Result<Vec<SheetRow>>;
}

/// Comma-separated values, first row is the header
///
/// Cells are trimmed. Rows may be shorter or longer than the header; cells
/// past the last header are dropped and missing cells are absent from the
/// row map.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvCodec;

impl SheetCodec for CsvCodec {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn encode(&self, headers: &[&str], rows: &[Vec<String>]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(Vec::new());

        writer.write_record(headers).map_err(encode_error)?;
        for row in rows {
            writer.write_record(row).map_err(encode_error)?;
        }

        writer
            .into_inner()
            .map_err(|e| Error::Store(format!("Failed to finish spreadsheet: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<SheetRow>> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(decode_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(Error::Decode("Berkas tidak memiliki baris judul.".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(decode_error)?;
            let row: SheetRow = headers
                .iter()
                .zip(record.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell.to_string()))
                .collect();
            rows.push(row);
        }

        Ok(rows)
    }
}

fn decode_error(err: csv::Error) -> Error {
    Error::Decode(err.to_string())
}

fn encode_error(err: csv::Error) -> Error {
    Error::Store(format!("Failed to write spreadsheet: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tolerates_bom_whitespace_and_ragged_rows() {
        let input = "\u{FEFF}noKK, alamat ,nama\n 123 ,Blok A\n456,Blok B,Ani,extra\n";
        let rows = CsvCodec.decode(input.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["noKK"], "123");
        assert_eq!(rows[0]["alamat"], "Blok A");
        assert!(!rows[0].contains_key("nama"));
        assert_eq!(rows[1]["nama"], "Ani");
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_header_only_encodes_single_line() {
        let bytes = CsvCodec.encode(&["noKK", "alamat"], &[]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "noKK,alamat\n");
    }

    #[test]
    fn test_cells_with_commas_are_quoted() {
        let bytes = CsvCodec
            .encode(&["alamat"], &[vec!["Jl. Merdeka 1, RT 02".to_string()]])
            .unwrap();
        let rows = CsvCodec.decode(&bytes).unwrap();
        assert_eq!(rows[0]["alamat"], "Jl. Merdeka 1, RT 02");
    }

    #[test]
    fn test_unreadable_input_is_decode_error() {
        assert!(matches!(CsvCodec.decode(b""), Err(Error::Decode(_))));
        assert!(matches!(
            CsvCodec.decode(b"noKK,nama\n\xFF\xFE,x\n"),
            Err(Error::Decode(_))
        ));
    }
}
