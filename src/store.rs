use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Field, StudentRecord, Subject};

const ROLL_NO: &str = "Roll No";
const NAME: &str = "Name";
const TOTAL: &str = "Total";
const AVERAGE: &str = "Average";

/// Ordered, immutable set of student records loaded from the data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    records: Vec<StudentRecord>,
}

impl RecordTable {
    pub fn from_records(records: Vec<StudentRecord>) -> Self {
        Self { records }
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = std::fs::File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file)?;
        info!(path = %path.display(), records = table.len(), "loaded student records");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = canonical_headers(reader.headers()?)?;
        reader.set_headers(headers);

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<StudentRow>().enumerate() {
            // Line 1 is the header row.
            records.push(row?.into_record(idx as u64 + 2)?);
        }

        Ok(Self { records })
    }

    /// Keeps only students whose total is at least `min_total`; zero keeps
    /// the whole table.
    pub fn with_min_total(self, min_total: u32) -> Self {
        if min_total == 0 {
            return self;
        }
        let before = self.len();
        let filtered = self.filter(|record| record.total() >= min_total);
        info!(min_total, kept = filtered.len(), of = before, "applied minimum total");
        filtered
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn filter<P>(&self, predicate: P) -> RecordTable
    where
        P: Fn(&StudentRecord) -> bool,
    {
        let records = self
            .records
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect();
        Self { records }
    }

    /// Stable: records with equal values keep their table order.
    pub fn sort_descending_by(&self, field: Field) -> RecordTable {
        let mut records = self.records.clone();
        records.sort_by(|a, b| {
            b.value(field)
                .partial_cmp(&a.value(field))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { records }
    }

    pub fn head(&self, n: usize) -> RecordTable {
        Self {
            records: self.records.iter().take(n).cloned().collect(),
        }
    }

    pub fn mean_of(&self, field: Field) -> Result<f64, StoreError> {
        if self.records.is_empty() {
            return Err(StoreError::EmptyTable);
        }
        let sum: f64 = self.records.iter().map(|record| record.value(field)).sum();
        Ok(sum / self.records.len() as f64)
    }

    /// Returns the first record holding the maximum value of `field`.
    pub fn argmax(&self, field: Field) -> Result<&StudentRecord, StoreError> {
        let mut best: Option<&StudentRecord> = None;
        for record in &self.records {
            match best {
                Some(current) if record.value(field) <= current.value(field) => {}
                _ => best = Some(record),
            }
        }
        best.ok_or(StoreError::EmptyTable)
    }

    /// Sample Pearson correlation between two fields.
    ///
    /// Returns `f64::NAN` when either field has zero variance or the table
    /// holds fewer than two records, since the coefficient is undefined there.
    pub fn pearson_correlation(&self, a: Field, b: Field) -> f64 {
        if self.records.len() < 2 {
            return f64::NAN;
        }
        let (mean_a, mean_b) = match (self.mean_of(a), self.mean_of(b)) {
            (Ok(mean_a), Ok(mean_b)) => (mean_a, mean_b),
            _ => return f64::NAN,
        };

        let mut covariance = 0.0;
        let mut variance_a = 0.0;
        let mut variance_b = 0.0;
        for record in &self.records {
            let da = record.value(a) - mean_a;
            let db = record.value(b) - mean_b;
            covariance += da * db;
            variance_a += da * da;
            variance_b += db * db;
        }

        if variance_a == 0.0 || variance_b == 0.0 {
            return f64::NAN;
        }
        (covariance / (variance_a.sqrt() * variance_b.sqrt())).clamp(-1.0, 1.0)
    }
}

/// Trims a heading and title-cases each alphabetic run, so " roll no" and
/// "ROLL NO" both become "Roll No".
pub fn normalize_heading(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

fn lookup_key(heading: &str) -> String {
    heading
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Renames the source headings to the canonical column names the row
/// struct expects. A repeated column keeps only its first occurrence.
fn canonical_headers(raw: &csv::StringRecord) -> Result<csv::StringRecord, StoreError> {
    let headings: Vec<String> = raw.iter().map(normalize_heading).collect();
    let mut required: Vec<&str> = vec![ROLL_NO, NAME];
    required.extend(Subject::ALL.iter().map(|subject| subject.name()));
    required.extend([TOTAL, AVERAGE]);

    let mut seen = HashSet::new();
    let canonical: Vec<String> = headings
        .iter()
        .enumerate()
        .map(|(idx, heading)| {
            let key = lookup_key(heading);
            match required.iter().find(|column| lookup_key(column) == key) {
                Some(column) if seen.insert(*column) => column.to_string(),
                Some(_) => format!("{heading} #{idx}"),
                None => heading.clone(),
            }
        })
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|column| !seen.contains(*column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::Schema { missing });
    }
    debug!(?headings, "resolved data source columns");

    Ok(csv::StringRecord::from(canonical))
}

#[derive(Debug, Deserialize)]
struct StudentRow {
    #[serde(rename = "Roll No")]
    roll_no: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "English")]
    english: Option<f64>,
    #[serde(rename = "Maths")]
    maths: Option<f64>,
    #[serde(rename = "Science")]
    science: Option<f64>,
    #[serde(rename = "Social")]
    social: Option<f64>,
    #[serde(rename = "Computer")]
    computer: Option<f64>,
    #[serde(rename = "Total")]
    total: Option<f64>,
    #[serde(rename = "Average")]
    average: Option<f64>,
}

impl StudentRow {
    fn into_record(self, line: u64) -> Result<StudentRecord, StoreError> {
        let roll_no = required_text(self.roll_no, ROLL_NO, line)?;
        let name = required_text(self.name, NAME, line)?;

        let raw_scores = [self.english, self.maths, self.science, self.social, self.computer];
        let mut scores = [0u32; 5];
        for ((slot, subject), raw) in scores.iter_mut().zip(Subject::ALL).zip(raw_scores) {
            *slot = checked_score(raw, subject.name(), line)?;
        }

        let record = StudentRecord::new(roll_no, name, scores);

        let stored_total = required_number(self.total, TOTAL, line)?;
        let stored_average = required_number(self.average, AVERAGE, line)?;
        if (stored_total - record.total() as f64).abs() > 0.5
            || (stored_average - record.average()).abs() > 0.01
        {
            warn!(
                line,
                roll_no = record.roll_no(),
                stored_total,
                stored_average,
                derived_total = record.total(),
                derived_average = record.average(),
                "stored totals disagree with subject scores; using derived values"
            );
        }

        Ok(record)
    }
}

fn required_text(value: String, column: &str, line: u64) -> Result<String, StoreError> {
    if value.is_empty() {
        return Err(StoreError::MissingValue {
            line,
            column: column.to_string(),
        });
    }
    Ok(value)
}

fn required_number(value: Option<f64>, column: &str, line: u64) -> Result<f64, StoreError> {
    match value {
        Some(value) if value.is_finite() => Ok(value),
        Some(value) => Err(StoreError::InvalidValue {
            line,
            column: column.to_string(),
            value: value.to_string(),
        }),
        None => Err(StoreError::MissingValue {
            line,
            column: column.to_string(),
        }),
    }
}

/// Scores are whole numbers, though spreadsheet exports often write them
/// as "85.0".
fn checked_score(value: Option<f64>, column: &str, line: u64) -> Result<u32, StoreError> {
    let value = required_number(value, column, line)?;
    if value.fract() != 0.0 || value < 0.0 {
        return Err(StoreError::InvalidValue {
            line,
            column: column.to_string(),
            value: value.to_string(),
        });
    }
    if value > 100.0 {
        return Err(StoreError::ScoreOutOfRange {
            line,
            column: column.to_string(),
            value,
        });
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
Roll No,Name,English,Maths,Science,Social,Computer,Total,Average
1,Avery Lee,80,70,90,60,100,400,80
2,Jules Moreno,35,50,45,60,70,260,52
3,Kiara Patel,90,70,85,75,80,400,80
";

    fn sample() -> RecordTable {
        RecordTable::from_reader(SAMPLE.as_bytes()).expect("sample loads")
    }

    #[test]
    fn normalizes_headings_like_title_case() {
        assert_eq!(normalize_heading("  roll no "), "Roll No");
        assert_eq!(normalize_heading("MATHS"), "Maths");
        assert_eq!(normalize_heading("rollNo"), "Rollno");
    }

    #[test]
    fn loads_with_messy_headings() {
        let csv = "\
 ROLLNO , name ,english,MATHS, Science ,social,computer,total,AVERAGE
1,Avery Lee,80,70,90,60,100,400,80.0
";
        let table = RecordTable::from_reader(csv.as_bytes()).expect("loads");
        assert_eq!(table.len(), 1);
        let record = &table.records()[0];
        assert_eq!(record.roll_no(), "1");
        assert_eq!(record.name(), "Avery Lee");
        assert_eq!(record.score(Subject::Computer), 100);
    }

    #[test]
    fn missing_maths_column_is_a_schema_error() {
        let csv = "\
Roll No,Name,English,Science,Social,Computer,Total,Average
1,Avery Lee,80,90,60,100,330,82.5
";
        match RecordTable::from_reader(csv.as_bytes()) {
            Err(StoreError::Schema { missing }) => assert_eq!(missing, vec!["Maths"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn derived_totals_win_over_stored_values() {
        let csv = "\
Roll No,Name,English,Maths,Science,Social,Computer,Total,Average
1,Avery Lee,80,70,90,60,100,999,12
";
        let table = RecordTable::from_reader(csv.as_bytes()).expect("loads");
        assert_eq!(table.records()[0].total(), 400);
        assert!((table.records()[0].average() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_and_non_numeric_scores() {
        let too_high = "\
Roll No,Name,English,Maths,Science,Social,Computer,Total,Average
1,Avery Lee,180,70,90,60,100,500,100
";
        match RecordTable::from_reader(too_high.as_bytes()) {
            Err(StoreError::ScoreOutOfRange {
                line,
                column,
                value,
            }) => {
                assert_eq!(line, 2);
                assert_eq!(column, "English");
                assert_eq!(value, 180.0);
            }
            other => panic!("expected out-of-range score, got {other:?}"),
        }

        let fractional = "\
Roll No,Name,English,Maths,Science,Social,Computer,Total,Average
1,Avery Lee,80.5,70,90,60,100,400.5,80.1
";
        assert!(matches!(
            RecordTable::from_reader(fractional.as_bytes()),
            Err(StoreError::InvalidValue { line: 2, .. })
        ));

        let garbage = "\
Roll No,Name,English,Maths,Science,Social,Computer,Total,Average
1,Avery Lee,eighty,70,90,60,100,400,80
";
        assert!(matches!(
            RecordTable::from_reader(garbage.as_bytes()),
            Err(StoreError::Csv(_))
        ));
    }

    #[test]
    fn empty_cells_are_missing_values() {
        let blank_score = "\
Roll No,Name,English,Maths,Science,Social,Computer,Total,Average
1,Avery Lee,80,70,90,60,100,400,80
2,Jules Moreno,35,,45,60,70,260,52
";
        match RecordTable::from_reader(blank_score.as_bytes()) {
            Err(StoreError::MissingValue { line, column }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "Maths");
            }
            other => panic!("expected missing value, got {other:?}"),
        }

        let blank_name = "\
Roll No,Name,English,Maths,Science,Social,Computer,Total,Average
1,,80,70,90,60,100,400,80
";
        assert!(matches!(
            RecordTable::from_reader(blank_name.as_bytes()),
            Err(StoreError::MissingValue { line: 2, .. })
        ));
    }

    #[test]
    fn extra_and_repeated_columns_are_ignored() {
        let csv = "\
Roll No,Name,Section,English,Maths,Science,Social,Computer,Total,Average,maths
1,Avery Lee,B,80,70,90,60,100,400,80,12
";
        let table = RecordTable::from_reader(csv.as_bytes()).expect("loads");
        assert_eq!(table.records()[0].score(Subject::Maths), 70);
    }

    #[test]
    fn min_total_drops_lower_totals() {
        let kept = sample().with_min_total(300);
        let names: Vec<&str> = kept.records().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Avery Lee", "Kiara Patel"]);

        assert_eq!(sample().with_min_total(0), sample());
        assert!(sample().with_min_total(401).is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write sample");

        let table = RecordTable::load(file.path()).expect("loads");
        assert_eq!(table.len(), 3);

        let missing = RecordTable::load(Path::new("/nonexistent/student_marks.csv"));
        assert!(matches!(missing, Err(StoreError::Io { .. })));
    }

    #[test]
    fn filter_preserves_order() {
        let failed = sample().filter(StudentRecord::failed_any);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed.records()[0].name(), "Jules Moreno");

        let high = sample().filter(|record| record.total() >= 300);
        let names: Vec<&str> = high.records().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Avery Lee", "Kiara Patel"]);
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let sorted = sample().sort_descending_by(Field::Total);
        let names: Vec<&str> = sorted.records().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Avery Lee", "Kiara Patel", "Jules Moreno"]);
    }

    #[test]
    fn mean_and_argmax() {
        let table = sample();
        let mean = table.mean_of(Field::Subject(Subject::English)).expect("mean");
        assert!((mean - 205.0 / 3.0).abs() < 1e-9);

        // Avery and Kiara tie on Maths; the earlier row wins.
        let topper = table.argmax(Field::Subject(Subject::Maths)).expect("argmax");
        assert_eq!(topper.name(), "Avery Lee");

        let empty = RecordTable::default();
        assert!(matches!(empty.mean_of(Field::Total), Err(StoreError::EmptyTable)));
        assert!(matches!(empty.argmax(Field::Total), Err(StoreError::EmptyTable)));
    }

    #[test]
    fn pearson_handles_perfect_and_degenerate_inputs() {
        let table = RecordTable::from_records(vec![
            StudentRecord::new("1", "A", [10, 20, 50, 90, 50]),
            StudentRecord::new("2", "B", [20, 40, 50, 80, 60]),
            StudentRecord::new("3", "C", [30, 60, 50, 70, 40]),
        ]);
        let english = Field::Subject(Subject::English);
        let maths = Field::Subject(Subject::Maths);
        let science = Field::Subject(Subject::Science);
        let social = Field::Subject(Subject::Social);

        assert!((table.pearson_correlation(english, maths) - 1.0).abs() < 1e-12);
        assert!((table.pearson_correlation(english, social) + 1.0).abs() < 1e-12);
        assert!(table.pearson_correlation(english, science).is_nan());
        assert!(table.head(1).pearson_correlation(english, maths).is_nan());
    }
}
