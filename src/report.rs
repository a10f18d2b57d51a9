use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregator::Aggregator;
use crate::models::{ChartKind, Intent, MessageLevel, QueryResult, DEFAULT_TOP_N};

/// Renders a query result as markdown for the terminal.
pub fn render_markdown(result: &QueryResult) -> String {
    let mut output = String::new();
    render_into(&mut output, result, 2);
    output
}

fn render_into(output: &mut String, result: &QueryResult, level: usize) {
    let heading = "#".repeat(level.min(6));

    match result {
        QueryResult::Table {
            title,
            columns,
            rows,
        } => {
            let _ = writeln!(output, "{heading} {title}");
            let _ = writeln!(output);
            if rows.is_empty() {
                let _ = writeln!(output, "No matching students.");
            } else {
                write_row(output, columns.iter().map(String::as_str));
                write_row(output, columns.iter().map(|_| "---"));
                for row in rows {
                    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                    write_row(output, cells.iter().map(String::as_str));
                }
            }
        }
        QueryResult::Metric { label, value, unit } => {
            let _ = writeln!(output, "{heading} {label}");
            let _ = writeln!(output);
            let _ = writeln!(output, "**{value:.2}{unit}**");
        }
        QueryResult::Series {
            title,
            chart,
            labels,
            values,
        } => {
            let _ = writeln!(output, "{heading} {title}");
            let _ = writeln!(output);
            if labels.is_empty() {
                let _ = writeln!(output, "No data to chart.");
            }
            let sum: f64 = values.iter().sum();
            for (label, value) in labels.iter().zip(values) {
                match chart {
                    ChartKind::Pie if sum > 0.0 => {
                        let share = value / sum * 100.0;
                        let _ = writeln!(output, "- {label}: {value:.2} ({share:.1}%)");
                    }
                    _ => {
                        let _ = writeln!(output, "- {label}: {value:.2}");
                    }
                }
            }
        }
        QueryResult::Matrix {
            title,
            labels,
            values,
        } => {
            let _ = writeln!(output, "{heading} {title}");
            let _ = writeln!(output);
            write_row(
                output,
                std::iter::once("").chain(labels.iter().map(String::as_str)),
            );
            write_row(output, std::iter::repeat("---").take(labels.len() + 1));
            for (label, row) in labels.iter().zip(values) {
                let cells: Vec<String> = row
                    .iter()
                    .map(|value| {
                        if value.is_nan() {
                            "n/a".to_string()
                        } else {
                            format!("{value:.2}")
                        }
                    })
                    .collect();
                write_row(
                    output,
                    std::iter::once(label.as_str()).chain(cells.iter().map(String::as_str)),
                );
            }
        }
        QueryResult::Composite { title, parts } => {
            let _ = writeln!(output, "{heading} {title}");
            for part in parts {
                let _ = writeln!(output);
                render_into(output, part, level + 1);
            }
        }
        QueryResult::Message { level: severity, text } => match severity {
            MessageLevel::Info => {
                let _ = writeln!(output, "{text}");
            }
            MessageLevel::Warning => {
                let _ = writeln!(output, "Warning: {text}");
            }
        },
    }
}

fn write_row<'a>(output: &mut String, cells: impl Iterator<Item = &'a str>) {
    let cells: Vec<&str> = cells.collect();
    let _ = writeln!(output, "| {} |", cells.join(" | "));
}

pub fn build_report(aggregator: &Aggregator, source: &str, generated_on: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Performance Report");
    let _ = writeln!(
        output,
        "Generated on {} from {} ({} students)",
        generated_on,
        source,
        aggregator.table().len()
    );

    for intent in [Intent::Summary, Intent::TopN(DEFAULT_TOP_N), Intent::FailedAny] {
        let _ = writeln!(output);
        render_into(&mut output, &aggregator.execute(intent), 2);
    }

    output
}
