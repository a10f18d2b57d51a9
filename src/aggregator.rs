use std::rc::Rc;

use tracing::{debug, warn};

use crate::classifier::classify;
use crate::error::StoreError;
use crate::models::{Cell, ChartKind, Field, Intent, QueryResult, StudentRecord, Subject};
use crate::store::RecordTable;

pub const HELP_TEXT: &str = "Sorry, I didn't understand. Try asking things like:
- 'show top 5 students'
- 'who are the failed students'
- 'show subject averages'
- 'pass percentage'
- 'subject toppers'
- 'show correlation'
- 'overall summary'";

pub const PROMPT_TEXT: &str =
    "Type a question like 'show top 5 students' or 'overall summary' to begin.";

pub const DISTRIBUTION_BINS: usize = 10;

/// Answers dashboard queries against a shared, read-only record table.
pub struct Aggregator {
    table: Rc<RecordTable>,
}

impl Aggregator {
    pub fn new(table: Rc<RecordTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RecordTable {
        &self.table
    }

    /// Classifies raw input and computes the matching view. Blank input
    /// gets the getting-started prompt rather than the help warning.
    pub fn answer(&self, text: &str) -> QueryResult {
        if text.trim().is_empty() {
            return QueryResult::info(PROMPT_TEXT);
        }
        self.execute(classify(text))
    }

    pub fn execute(&self, intent: Intent) -> QueryResult {
        debug!(intent = intent.name(), records = self.table.len(), "executing intent");
        let result = match intent {
            Intent::TopN(n) => Ok(self.top_students(n)),
            Intent::FailedAny => Ok(self.failed_students()),
            Intent::SubjectAverages => self.subject_averages(),
            Intent::SubjectToppers => self.subject_toppers(),
            Intent::PassPercentage => self.pass_percentage(),
            Intent::Correlation => self.correlation(),
            Intent::ShowAll => Ok(self.all_students()),
            Intent::Summary => self.summary(),
            Intent::Unknown => Ok(QueryResult::warning(HELP_TEXT)),
        };

        result.unwrap_or_else(|err| {
            warn!(intent = intent.name(), error = %err, "query produced no result");
            no_data(&err)
        })
    }

    pub fn top_students(&self, n: usize) -> QueryResult {
        let top = self.table.sort_descending_by(Field::Total).head(n);
        let rows = top
            .records()
            .iter()
            .map(|record| {
                vec![
                    Cell::Text(record.roll_no().to_string()),
                    Cell::Text(record.name().to_string()),
                    Cell::Int(record.total()),
                    Cell::Float(record.average()),
                ]
            })
            .collect();

        QueryResult::Composite {
            title: format!("Top {n} Students"),
            parts: vec![
                QueryResult::Table {
                    title: format!("Top {n} Students"),
                    columns: columns(&["Roll No", "Name", "Total", "Average"]),
                    rows,
                },
                QueryResult::Series {
                    title: "Share of Total Marks".to_string(),
                    chart: ChartKind::Pie,
                    labels: top.records().iter().map(|r| r.name().to_string()).collect(),
                    values: top.records().iter().map(|r| r.total() as f64).collect(),
                },
            ],
        }
    }

    pub fn failed_students(&self) -> QueryResult {
        let failed = self.table.filter(StudentRecord::failed_any);
        let mut headings = vec!["Roll No", "Name"];
        headings.extend(Subject::ALL.iter().map(|subject| subject.name()));

        let rows = failed
            .records()
            .iter()
            .map(|record| {
                let mut row = vec![
                    Cell::Text(record.roll_no().to_string()),
                    Cell::Text(record.name().to_string()),
                ];
                row.extend(Subject::ALL.iter().map(|s| Cell::Int(record.score(*s))));
                row
            })
            .collect();

        QueryResult::Table {
            title: "Students Who Failed in Any Subject".to_string(),
            columns: columns(&headings),
            rows,
        }
    }

    pub fn subject_averages(&self) -> Result<QueryResult, StoreError> {
        let values = Subject::ALL
            .iter()
            .map(|subject| self.table.mean_of(Field::Subject(*subject)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryResult::Series {
            title: "Subject-wise Average Marks".to_string(),
            chart: ChartKind::Bar,
            labels: subject_labels(),
            values,
        })
    }

    pub fn subject_toppers(&self) -> Result<QueryResult, StoreError> {
        let mut rows = Vec::with_capacity(Subject::ALL.len());
        for subject in Subject::ALL {
            let topper = self.table.argmax(Field::Subject(subject))?;
            rows.push(vec![
                Cell::Text(subject.name().to_string()),
                Cell::Text(topper.name().to_string()),
            ]);
        }

        Ok(QueryResult::Table {
            title: "Subject Toppers".to_string(),
            columns: columns(&["Subject", "Topper"]),
            rows,
        })
    }

    /// Counts of students who passed every subject and those who did not.
    pub fn pass_fail_counts(&self) -> (usize, usize) {
        let passed = self
            .table
            .records()
            .iter()
            .filter(|record| record.passed_all())
            .count();
        (passed, self.table.len() - passed)
    }

    pub fn pass_percentage(&self) -> Result<QueryResult, StoreError> {
        if self.table.is_empty() {
            return Err(StoreError::EmptyTable);
        }
        let (passed, _) = self.pass_fail_counts();
        let percentage = passed as f64 / self.table.len() as f64 * 100.0;

        Ok(QueryResult::Metric {
            label: "Pass Percentage".to_string(),
            value: (percentage * 100.0).round() / 100.0,
            unit: "%".to_string(),
        })
    }

    /// Pairwise Pearson coefficients; NaN marks a subject without variance.
    pub fn correlation(&self) -> Result<QueryResult, StoreError> {
        if self.table.is_empty() {
            return Err(StoreError::EmptyTable);
        }
        let values = Subject::ALL
            .iter()
            .map(|a| {
                Subject::ALL
                    .iter()
                    .map(|b| {
                        self.table
                            .pearson_correlation(Field::Subject(*a), Field::Subject(*b))
                    })
                    .collect()
            })
            .collect();

        Ok(QueryResult::Matrix {
            title: "Correlation between Subjects".to_string(),
            labels: subject_labels(),
            values,
        })
    }

    pub fn all_students(&self) -> QueryResult {
        let mut headings = vec!["Roll No", "Name"];
        headings.extend(Subject::ALL.iter().map(|subject| subject.name()));
        headings.extend(["Total", "Average"]);

        QueryResult::Table {
            title: "All Students Data".to_string(),
            columns: columns(&headings),
            rows: self.table.records().iter().map(full_row).collect(),
        }
    }

    pub fn summary(&self) -> Result<QueryResult, StoreError> {
        Ok(QueryResult::Composite {
            title: "Overall Summary".to_string(),
            parts: vec![
                self.pass_percentage()?,
                self.subject_averages()?,
                self.subject_toppers()?,
            ],
        })
    }

    /// Histogram of total marks over equal-width bins spanning the observed
    /// range. A table where every total is equal gets a unit-wide range
    /// centred on that total.
    pub fn marks_distribution(&self, bins: usize) -> Result<QueryResult, StoreError> {
        let totals: Vec<f64> = self
            .table
            .records()
            .iter()
            .map(|record| record.total() as f64)
            .collect();
        let bins = bins.max(1);
        let (mut low, mut high) = totals
            .iter()
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .ok_or(StoreError::EmptyTable)?;
        if low == high {
            low -= 0.5;
            high += 0.5;
        }

        let width = (high - low) / bins as f64;
        let mut counts = vec![0usize; bins];
        for total in &totals {
            let idx = (((total - low) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let labels = (0..bins)
            .map(|i| {
                let start = low + width * i as f64;
                format!("{:.1}-{:.1}", start, start + width)
            })
            .collect();

        Ok(QueryResult::Series {
            title: "Marks Distribution".to_string(),
            chart: ChartKind::Bar,
            labels,
            values: counts.into_iter().map(|c| c as f64).collect(),
        })
    }

    pub fn pass_vs_fail(&self) -> QueryResult {
        let (passed, failed) = self.pass_fail_counts();
        QueryResult::Series {
            title: "Pass vs Fail Count".to_string(),
            chart: ChartKind::Bar,
            labels: columns(&["Passed", "Failed"]),
            values: vec![passed as f64, failed as f64],
        }
    }

    /// The supplementary views: distribution, correlation, pass vs fail.
    pub fn extras(&self) -> QueryResult {
        QueryResult::Composite {
            title: "Extra Visualizations".to_string(),
            parts: vec![
                self.marks_distribution(DISTRIBUTION_BINS)
                    .unwrap_or_else(|err| no_data(&err)),
                self.correlation().unwrap_or_else(|err| no_data(&err)),
                self.pass_vs_fail(),
            ],
        }
    }
}

fn no_data(err: &StoreError) -> QueryResult {
    QueryResult::info(format!("No data available: {err}."))
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn subject_labels() -> Vec<String> {
    Subject::ALL.iter().map(|s| s.name().to_string()).collect()
}

fn full_row(record: &StudentRecord) -> Vec<Cell> {
    let mut row = vec![
        Cell::Text(record.roll_no().to_string()),
        Cell::Text(record.name().to_string()),
    ];
    row.extend(Subject::ALL.iter().map(|s| Cell::Int(record.score(*s))));
    row.push(Cell::Int(record.total()));
    row.push(Cell::Float(record.average()));
    row
}
