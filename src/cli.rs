use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{compare::ReportFormat, warehouse::SaveMode};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Compare table schemas, align columns, and upsert-merge keyed tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report columns missing from either table or typed differently
    Compare(CompareArgs),
    /// Add the first table's extra columns to the second as nulls
    Harmonize(HarmonizeArgs),
    /// Upsert an update table into a main table by key columns
    Merge(MergeArgs),
    /// Load a CSV file into the warehouse as a table
    Import(ImportArgs),
    /// Write a table out as CSV
    Export(ExportArgs),
    /// Print a table's rows (and optionally its schema)
    Show(ShowArgs),
    /// List or drop warehouse tables
    Tables(TablesArgs),
    /// Build the example tables, then compare, harmonize and merge them
    Demo(DemoArgs),
}

#[derive(Debug, Clone, Args)]
pub struct WarehouseArgs {
    /// Directory holding the tables
    #[arg(short = 'w', long = "warehouse", default_value = "warehouse")]
    pub warehouse: PathBuf,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
    /// First table
    #[arg(long = "first")]
    pub first: String,
    /// Second table
    #[arg(long = "second")]
    pub second: String,
    /// Report format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: ReportFormat,
    /// Exit with an error when any discrepancy is found
    #[arg(long = "fail-on-discrepancy")]
    pub fail_on_discrepancy: bool,
}

#[derive(Debug, Args)]
pub struct HarmonizeArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
    /// Table whose columns are copied
    #[arg(long = "first")]
    pub first: String,
    /// Table widened with the first table's missing columns
    #[arg(long = "second")]
    pub second: String,
    /// Also widen the first table with the second table's extra columns
    #[arg(long = "symmetric")]
    pub symmetric: bool,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
    /// Table receiving the updates
    #[arg(long = "main")]
    pub main: String,
    /// Table supplying new and changed rows
    #[arg(long = "update")]
    pub update: String,
    /// Comma-separated key columns present in both tables
    #[arg(short = 'k', long = "key", required = true, value_delimiter = ',')]
    pub keys: Vec<String>,
    /// Destination table (defaults to the main table)
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,
    /// Sort the result by these comma-separated columns before writing
    #[arg(long = "order-by", value_delimiter = ',')]
    pub order_by: Vec<String>,
    /// Harmonize the update table with the main table before merging
    #[arg(long = "harmonize")]
    pub harmonize: bool,
    /// How to treat an existing destination table
    #[arg(long = "mode", value_enum, default_value = "overwrite")]
    pub mode: SaveMode,
    /// Union the destination's stored schema with the result's schema
    #[arg(long = "merge-schema")]
    pub merge_schema: bool,
    /// Replace the destination's stored schema with the result's schema
    #[arg(long = "overwrite-schema", conflicts_with = "merge_schema")]
    pub overwrite_schema: bool,
    /// Print the merged rows after writing
    #[arg(long = "preview")]
    pub preview: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
    /// Destination table
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// CSV file to import (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Schema file describing the input's columns
    #[arg(short = 's', long = "schema", conflicts_with = "columns")]
    pub schema: Option<PathBuf>,
    /// Column definitions such as `id:integer,name:string`
    #[arg(short = 'c', long = "column", action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Rows sampled when inferring column types (0 means full scan)
    #[arg(long = "sample-rows", default_value_t = 2000)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// How to treat an existing table
    #[arg(long = "mode", value_enum, default_value = "error-if-exists")]
    pub mode: SaveMode,
    /// Union an existing table's schema with the imported schema
    #[arg(long = "merge-schema")]
    pub merge_schema: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
    /// Table to export
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character for the output
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for the output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
    /// Table to display
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Number of rows to display
    #[arg(long, default_value_t = 20)]
    pub rows: usize,
    /// Print the table's schema instead of its rows
    #[arg(long = "schema")]
    pub schema: bool,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
    /// Drop this table instead of listing
    #[arg(long = "drop")]
    pub drop: Option<String>,
}

#[derive(Debug, Args)]
pub struct DemoArgs {
    #[command(flatten)]
    pub warehouse: WarehouseArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
