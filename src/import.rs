use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    cli::{ExportArgs, ImportArgs},
    dataset::Dataset,
    io_utils,
    schema::{self, Schema},
    warehouse::{Warehouse, WriteOptions},
};

pub fn execute(args: &ImportArgs) -> Result<()> {
    let delimiter = io_utils::resolve_delimiter(Some(&args.input), args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;

    let schema = resolve_schema(args, delimiter, encoding)?;
    debug!("Import schema: {:?}", schema.headers());

    let (headers, records) = io_utils::read_text_records(&args.input, delimiter, encoding)?;
    schema
        .validate_headers(&headers)
        .with_context(|| format!("Validating headers for {:?}", args.input))?;
    let dataset = Dataset::from_text_rows(schema, records)
        .with_context(|| format!("Parsing rows of {:?}", args.input))?;

    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    let options = WriteOptions {
        mode: args.mode,
        merge_schema: args.merge_schema,
        overwrite_schema: false,
    };
    warehouse.save_table(&args.table, &dataset, &options)?;
    info!(
        "Imported {} row(s) from {:?} into '{}' ({})",
        dataset.row_count(),
        args.input,
        args.table,
        dataset.describe_columns()
    );
    Ok(())
}

fn resolve_schema(
    args: &ImportArgs,
    delimiter: u8,
    encoding: &'static encoding_rs::Encoding,
) -> Result<Schema> {
    if let Some(path) = &args.schema {
        return Schema::load(path).with_context(|| format!("Loading schema from {path:?}"));
    }
    if !args.columns.is_empty() {
        let columns = schema::parse_column_definitions(&args.columns)
            .context("Parsing --column definitions")?;
        return Schema::new(columns);
    }
    anyhow::ensure!(
        !io_utils::is_dash(&args.input),
        "Importing from stdin requires --schema or --column definitions"
    );
    schema::infer_schema(&args.input, args.sample_rows, delimiter, encoding)
        .with_context(|| format!("Inferring schema from {:?}", args.input))
}

pub fn export(args: &ExportArgs) -> Result<()> {
    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    let dataset = warehouse
        .load_table(&args.table)
        .with_context(|| format!("Loading table '{}'", args.table))?;
    let delimiter = io_utils::resolve_delimiter(args.output.as_deref(), args.delimiter);
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let rendered = io_utils::render_csv(&dataset.column_names(), &dataset.text_rows(), delimiter)?;
    io_utils::write_encoded(args.output.as_deref(), &rendered, encoding)?;
    info!(
        "Exported {} row(s) from '{}'",
        dataset.row_count(),
        args.table
    );
    Ok(())
}
