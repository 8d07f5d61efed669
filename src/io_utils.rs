//! CSV reading and writing helpers shared by the table store and the
//! import/export commands.
//!
//! - Delimiters resolve from an explicit flag, else from the file extension
//!   (`.tsv` → tab, anything else → comma).
//! - Input bytes decode through `encoding_rs`; output is transcoded the same
//!   way, defaulting to UTF-8.
//! - `-` as a path means stdin/stdout.

use std::{
    fs::File,
    io::{BufReader, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    if let Some(delimiter) = provided {
        return delimiter;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter, has_headers))
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

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers().context("Reading CSV headers")?.clone();
    decode_record(&headers, encoding)
}

/// Reads the header row and all records of a CSV source as decoded text.
pub fn read_text_records(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = open_csv_reader_from_path(path, delimiter, true)?;
    let headers = reader_headers(&mut reader, encoding)?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
        rows.push(decode_record(&record, encoding)?);
    }
    Ok((headers, rows))
}

/// Serializes a header row and text rows as CSV with every field quoted.
pub fn render_csv(headers: &[String], rows: &[Vec<String>], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .from_writer(Vec::new());
    writer.write_record(headers).context("Writing CSV headers")?;
    for (idx, row) in rows.iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("Writing CSV row {}", idx + 1))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV buffer: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Writes `text` to `path` (stdout for `None` or `-`) in `encoding`.
pub fn write_encoded(path: Option<&Path>, text: &str, encoding: &'static Encoding) -> Result<()> {
    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(anyhow!(
            "Output contains characters not representable in {}",
            encoding.name()
        ));
    }
    match path {
        Some(p) if !is_dash(p) => {
            std::fs::write(p, &encoded).with_context(|| format!("Writing output file {p:?}"))
        }
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&encoded).context("Writing to stdout")?;
            stdout.flush().context("Flushing stdout")
        }
    }
}
