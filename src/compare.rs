use std::fmt;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use log::info;
use serde::Serialize;

use crate::{
    cli::CompareArgs,
    schema::{ColumnType, Schema},
    warehouse::Warehouse,
};

/// One way in which two schemas disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    MissingInFirst {
        column: String,
    },
    MissingInSecond {
        column: String,
    },
    TypeMismatch {
        column: String,
        first: ColumnType,
        second: ColumnType,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::MissingInFirst { column } => {
                write!(f, "Column {column} is missing in first schema")
            }
            Discrepancy::MissingInSecond { column } => {
                write!(f, "Column {column} is missing in second schema")
            }
            Discrepancy::TypeMismatch {
                column,
                first,
                second,
            } => write!(f, "Column {column} has different types: {first} vs {second}"),
        }
    }
}

/// Reports every column missing from one side or typed differently on each.
///
/// Columns are visited in the first schema's order, followed by the columns
/// only the second schema has.
pub fn compare_schemas(first: &Schema, second: &Schema) -> Vec<Discrepancy> {
    let mut discrepancies = Vec::new();
    for column in &first.columns {
        match second.datatype(&column.name) {
            None => discrepancies.push(Discrepancy::MissingInSecond {
                column: column.name.clone(),
            }),
            Some(other) if *other != column.datatype => {
                discrepancies.push(Discrepancy::TypeMismatch {
                    column: column.name.clone(),
                    first: column.datatype.clone(),
                    second: other.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for column in &second.columns {
        if !first.has_column(&column.name) {
            discrepancies.push(Discrepancy::MissingInFirst {
                column: column.name.clone(),
            });
        }
    }
    discrepancies
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

pub fn render_report(discrepancies: &[Discrepancy], format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(discrepancies
            .iter()
            .map(|d| format!("{d}\n"))
            .collect::<String>()),
        ReportFormat::Json => {
            let mut rendered = serde_json::to_string_pretty(discrepancies)
                .context("Serializing discrepancies to JSON")?;
            rendered.push('\n');
            Ok(rendered)
        }
    }
}

pub fn execute(args: &CompareArgs) -> Result<()> {
    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    let first = warehouse
        .load_schema(&args.first)
        .with_context(|| format!("Loading schema of table '{}'", args.first))?;
    let second = warehouse
        .load_schema(&args.second)
        .with_context(|| format!("Loading schema of table '{}'", args.second))?;

    let discrepancies = compare_schemas(&first, &second);
    print!("{}", render_report(&discrepancies, args.format)?);
    info!(
        "Compared '{}' with '{}': {} discrepancy(ies)",
        args.first,
        args.second,
        discrepancies.len()
    );
    if args.fail_on_discrepancy && !discrepancies.is_empty() {
        bail!(
            "Schemas of '{}' and '{}' differ in {} place(s)",
            args.first,
            args.second,
            discrepancies.len()
        );
    }
    Ok(())
}
