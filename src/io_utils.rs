//! CSV input plumbing: delimiter and encoding resolution, reader construction,
//! and decoding of raw byte records.
//!
//! A path of `-` reads from stdin. Delimiters default from the file extension
//! (`.tsv` is tab, everything else comma). Input is transcoded to UTF-8 before
//! CSV parsing: a byte-order mark decides the encoding when present, then the
//! `--input-encoding` label, then UTF-8.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// `None` leaves the choice to BOM sniffing, falling back to UTF-8.
pub fn resolve_encoding(label: Option<&str>) -> Result<Option<&'static Encoding>> {
    label
        .map(|value| {
            Encoding::for_label(value.trim().as_bytes())
                .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
        })
        .transpose()
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Opens `path` (or stdin for `-`) as a headed CSV reader over UTF-8 text.
/// Ragged rows are tolerated so that a preview of a messy upload does not
/// abort.
pub fn open_csv_reader(
    path: &Path,
    delimiter: u8,
    encoding: Option<&'static Encoding>,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let raw: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    // a BOM overrides the label and is stripped; no BOM and no label passes bytes through
    let reader: Box<dyn Read> = Box::new(
        DecodeReaderBytesBuilder::new()
            .encoding(encoding)
            .bom_override(true)
            .build(raw),
    );
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Decodes a record read through [`open_csv_reader`], which is already UTF-8.
pub fn decode_record(record: &csv::ByteRecord) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, UTF_8))
        .collect()
}

pub fn reader_headers<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    let headers = reader
        .byte_headers()
        .context("Reading CSV header row")?
        .clone();
    decode_record(&headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read_all(path: &Path, encoding: Option<&'static Encoding>) -> Vec<Vec<String>> {
        let mut reader = open_csv_reader(path, b',', encoding).expect("open");
        let mut rows = vec![reader_headers(&mut reader).expect("headers")];
        let mut record = csv::ByteRecord::new();
        while reader.read_byte_record(&mut record).expect("read") {
            rows.push(decode_record(&record).expect("decode"));
        }
        rows
    }

    #[test]
    fn tsv_extension_selects_tab() {
        assert_eq!(resolve_input_delimiter(Path::new("x.TSV"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("x.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("x.tsv"), Some(b';')), b';');
    }

    #[test]
    fn unknown_encoding_label_is_an_error() {
        assert!(resolve_encoding(Some("not-a-charset")).is_err());
        assert_eq!(resolve_encoding(Some("latin1")).unwrap(), Some(WINDOWS_1252));
        assert_eq!(resolve_encoding(None).unwrap(), None);
    }

    #[test]
    fn labelled_single_byte_input_is_transcoded() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"drink,price\ncaf\xe9,2\n").unwrap();
        let rows = read_all(file.path(), Some(WINDOWS_1252));
        assert_eq!(rows[1], vec!["caf\u{e9}".to_string(), "2".to_string()]);

        assert!(decode_record(&csv::ByteRecord::from(vec![&b"caf\xe9"[..]])).is_err());
    }

    #[test]
    fn byte_order_mark_selects_encoding_and_is_stripped() {
        let mut utf16 = NamedTempFile::new().expect("temp file");
        utf16.write_all(&[0xFF, 0xFE]).unwrap();
        for unit in "id,name\n1,Zo\u{eb}\n".encode_utf16() {
            utf16.write_all(&unit.to_le_bytes()).unwrap();
        }
        let rows = read_all(utf16.path(), None);
        assert_eq!(rows[0], vec!["id".to_string(), "name".to_string()]);
        assert_eq!(rows[1], vec!["1".to_string(), "Zo\u{eb}".to_string()]);

        // the mark wins over a mismatched label
        let mut utf8 = NamedTempFile::new().expect("temp file");
        utf8.write_all(b"\xEF\xBB\xBFid,name\n1,x\n").unwrap();
        let rows = read_all(utf8.path(), Some(WINDOWS_1252));
        assert_eq!(rows[0], vec!["id".to_string(), "name".to_string()]);
    }
}
