//! Keyword classification of free-text dashboard queries.
//!
//! Rules are plain substring tests on the lowercased query, checked in
//! order; the first rule that matches decides the intent. Reordering the
//! table changes how overlapping phrases ("show all" vs "overall") resolve.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{Intent, DEFAULT_TOP_N};

static COUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("count pattern is valid"));

struct Rule {
    keywords: &'static [&'static str],
    /// Words removed from the query before this rule's keywords are tested.
    masked: &'static [&'static str],
    build: fn(&str) -> Intent,
}

impl Rule {
    fn matches(&self, query: &str) -> bool {
        let mut haystack = Cow::Borrowed(query);
        for word in self.masked {
            if haystack.contains(word) {
                haystack = Cow::Owned(haystack.replace(word, " "));
            }
        }
        self.keywords.iter().any(|keyword| haystack.contains(keyword))
    }
}

static RULES: [Rule; 8] = [
    Rule {
        keywords: &["top"],
        masked: &[],
        build: |query| Intent::TopN(extract_count(query)),
    },
    Rule {
        keywords: &["fail"],
        masked: &[],
        build: |_| Intent::FailedAny,
    },
    Rule {
        keywords: &["average"],
        masked: &[],
        build: |_| Intent::SubjectAverages,
    },
    Rule {
        keywords: &["toppers", "subject topper"],
        masked: &[],
        build: |_| Intent::SubjectToppers,
    },
    Rule {
        keywords: &["pass"],
        masked: &[],
        build: |_| Intent::PassPercentage,
    },
    Rule {
        keywords: &["correlation", "relation"],
        masked: &[],
        build: |_| Intent::Correlation,
    },
    // "overall" is a summary keyword, so its embedded "all" does not count.
    Rule {
        keywords: &["all", "show all"],
        masked: &["overall"],
        build: |_| Intent::ShowAll,
    },
    Rule {
        keywords: &["summary", "overall"],
        masked: &[],
        build: |_| Intent::Summary,
    },
];

pub fn classify(text: &str) -> Intent {
    let query = text.to_lowercase();
    let intent = RULES
        .iter()
        .find(|rule| rule.matches(&query))
        .map(|rule| (rule.build)(&query))
        .unwrap_or(Intent::Unknown);

    debug!(query = %text, intent = intent.name(), "classified query");
    intent
}

/// First run of digits in the query, or the default when there is none or
/// it does not fit in a `usize`.
fn extract_count(query: &str) -> usize {
    COUNT_PATTERN
        .find(query)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_TOP_N)
}
