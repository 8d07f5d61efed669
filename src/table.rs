use std::borrow::Cow;
use std::fmt::Write as _;

use crate::dataset::Dataset;

const NULL_MARKER: &str = "null";

/// Renders up to `limit` rows as an aligned text table. Numeric columns are
/// right aligned and nulls print as `null`.
pub fn render_dataset(dataset: &Dataset, limit: Option<usize>) -> String {
    let headers = dataset.column_names();
    let right_align = dataset
        .schema()
        .columns
        .iter()
        .map(|c| c.datatype.is_numeric())
        .collect::<Vec<_>>();
    let rows = dataset
        .rows()
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Some(value) => sanitize_cell(&value.as_display()).into_owned(),
                    None => NULL_MARKER.to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let no_alignment = vec![false; headers.len()];
    let _ = writeln!(output, "{}", format_row(&headers, &widths, &no_alignment));
    let separators = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separators, &widths, &no_alignment));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &right_align));
    }
    let hidden = dataset.row_count().saturating_sub(rows.len());
    if hidden > 0 {
        let _ = writeln!(output, "... {hidden} more row(s)");
    }
    output
}

pub fn print_dataset(dataset: &Dataset, limit: Option<usize>) {
    print!("{}", render_dataset(dataset, limit));
}

fn format_row(cells: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .zip(right_align)
        .map(|((cell, width), right)| {
            let width = *width;
            if *right {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
