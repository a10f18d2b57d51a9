use std::fmt;

use serde::Serialize;

/// Minimum score in every subject for a student to count as passed.
pub const PASS_MARK: u32 = 40;

/// Row count for a "top" query that names no number.
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Subject {
    English,
    Maths,
    Science,
    Social,
    Computer,
}

impl Subject {
    pub const ALL: [Subject; 5] = [
        Subject::English,
        Subject::Maths,
        Subject::Science,
        Subject::Social,
        Subject::Computer,
    ];

    /// Position of the subject in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Subject::English => "English",
            Subject::Maths => "Maths",
            Subject::Science => "Science",
            Subject::Social => "Social",
            Subject::Computer => "Computer",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric column of a student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Total,
    Average,
    Subject(Subject),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    roll_no: String,
    name: String,
    scores: [u32; 5],
    total: u32,
    average: f64,
}

impl StudentRecord {
    /// Builds a record, deriving total and average from the scores, which
    /// are given in `Subject::ALL` order.
    pub fn new(roll_no: impl Into<String>, name: impl Into<String>, scores: [u32; 5]) -> Self {
        let total: u32 = scores.iter().sum();
        let average = total as f64 / Subject::ALL.len() as f64;

        Self {
            roll_no: roll_no.into(),
            name: name.into(),
            scores,
            total,
            average,
        }
    }

    pub fn roll_no(&self) -> &str {
        &self.roll_no
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self, subject: Subject) -> u32 {
        self.scores[subject.index()]
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Total => self.total as f64,
            Field::Average => self.average,
            Field::Subject(subject) => self.score(subject) as f64,
        }
    }

    pub fn failed_any(&self) -> bool {
        Subject::ALL
            .iter()
            .any(|subject| self.score(*subject) < PASS_MARK)
    }

    pub fn passed_all(&self) -> bool {
        !self.failed_any()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    TopN(usize),
    FailedAny,
    SubjectAverages,
    SubjectToppers,
    PassPercentage,
    Correlation,
    ShowAll,
    Summary,
    Unknown,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::TopN(_) => "top_n",
            Intent::FailedAny => "failed_any",
            Intent::SubjectAverages => "subject_averages",
            Intent::SubjectToppers => "subject_toppers",
            Intent::PassPercentage => "pass_percentage",
            Intent::Correlation => "correlation",
            Intent::ShowAll => "show_all",
            Intent::Summary => "summary",
            Intent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(u32),
    Float(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(value) => f.write_str(value),
            Cell::Int(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value:.2}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Pie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Warning,
}

/// A computed view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResult {
    Table {
        title: String,
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    },
    Metric {
        label: String,
        value: f64,
        unit: String,
    },
    Series {
        title: String,
        chart: ChartKind,
        labels: Vec<String>,
        values: Vec<f64>,
    },
    Matrix {
        title: String,
        labels: Vec<String>,
        values: Vec<Vec<f64>>,
    },
    Composite {
        title: String,
        parts: Vec<QueryResult>,
    },
    Message {
        level: MessageLevel,
        text: String,
    },
}

impl QueryResult {
    pub fn info(text: impl Into<String>) -> Self {
        QueryResult::Message {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        QueryResult::Message {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_total_and_average_from_scores() {
        let record = StudentRecord::new("7", "Avery Lee", [80, 70, 90, 60, 100]);
        assert_eq!(record.total(), 400);
        assert!((record.average() - 80.0).abs() < f64::EPSILON);
        assert_eq!(record.value(Field::Subject(Subject::Science)), 90.0);
    }

    #[test]
    fn scores_are_indexed_in_subject_order() {
        let record = StudentRecord::new("3", "Kiara Patel", [11, 22, 33, 44, 55]);
        let scores: Vec<u32> = Subject::ALL.iter().map(|s| record.score(*s)).collect();
        assert_eq!(scores, vec![11, 22, 33, 44, 55]);
        assert_eq!(Subject::Computer.index(), 4);
    }

    #[test]
    fn pass_mark_is_inclusive() {
        let borderline = StudentRecord::new("1", "Jules Moreno", [40, 40, 40, 40, 40]);
        let failing = StudentRecord::new("2", "Kiara Patel", [95, 95, 39, 95, 95]);
        assert!(borderline.passed_all());
        assert!(failing.failed_any());
    }
}
