//! Read-side statistics over stored results. Everything here is recomputed
//! from source rows on each request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub(crate) enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub(crate) fn from_percentage(percentage: f64) -> Self {
        match percentage {
            p if p >= 90.0 => Self::A,
            p if p >= 80.0 => Self::B,
            p if p >= 70.0 => Self::C,
            p if p >= 60.0 => Self::D,
            _ => Self::F,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "F" => Some(Self::F),
            _ => None,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `score / total * 100`, rounded to two decimals; zero when `total` is zero.
pub(crate) fn percentage(score: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round2(f64::from(score) / f64::from(total) * 100.0)
}

pub(crate) fn is_pass(percentage: f64, pass_percentage: i32) -> bool {
    percentage >= f64::from(pass_percentage)
}

/// One stored result reduced to what aggregation needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Sample {
    pub(crate) percentage: f64,
    pub(crate) time_taken: i32,
    pub(crate) passed: bool,
}

impl Sample {
    pub(crate) fn new(score: i32, total: i32, time_taken: i32, pass_percentage: i32) -> Self {
        let percentage = percentage(score, total);
        Self { percentage, time_taken, passed: is_pass(percentage, pass_percentage) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Aggregate {
    pub(crate) attempts: i64,
    pub(crate) average: f64,
    pub(crate) highest: f64,
    pub(crate) lowest: f64,
    pub(crate) passed: i64,
    pub(crate) failed: i64,
    pub(crate) pass_rate: f64,
    pub(crate) average_time: f64,
}

pub(crate) fn summarize<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Aggregate {
    let mut aggregate = Aggregate::default();
    let mut sum = 0.0;
    let mut time_sum = 0i64;

    for sample in samples {
        if aggregate.attempts == 0 {
            aggregate.highest = sample.percentage;
            aggregate.lowest = sample.percentage;
        } else {
            aggregate.highest = aggregate.highest.max(sample.percentage);
            aggregate.lowest = aggregate.lowest.min(sample.percentage);
        }
        aggregate.attempts += 1;
        sum += sample.percentage;
        time_sum += i64::from(sample.time_taken);
        if sample.passed {
            aggregate.passed += 1;
        }
    }

    if aggregate.attempts > 0 {
        let count = aggregate.attempts as f64;
        aggregate.failed = aggregate.attempts - aggregate.passed;
        aggregate.average = round2(sum / count);
        aggregate.pass_rate = round2(aggregate.passed as f64 / count * 100.0);
        aggregate.average_time = round2(time_sum as f64 / count);
    }

    aggregate
}

/// Groups rows by `key` and summarizes each group; keys come back sorted.
pub(crate) fn group_by<T, K, F>(rows: &[T], key: F, sample: impl Fn(&T) -> Sample) -> BTreeMap<K, Aggregate>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<Sample>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(row)).or_default().push(sample(row));
    }

    groups.into_iter().map(|(group, samples)| (group, summarize(&samples))).collect()
}

/// Counts per grade band, always listing all five bands.
pub(crate) fn grade_distribution<'a>(
    samples: impl IntoIterator<Item = &'a Sample>,
) -> BTreeMap<&'static str, i64> {
    let mut distribution: BTreeMap<&'static str, i64> =
        [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F]
            .into_iter()
            .map(|grade| (grade.as_str(), 0))
            .collect();

    for sample in samples {
        *distribution.entry(Grade::from_percentage(sample.percentage).as_str()).or_default() += 1;
    }
    distribution
}
