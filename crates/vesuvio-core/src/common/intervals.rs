//! Sets of non-negative integers stored as canonical closed ranges.
//!
//! Used for spectrum IDs, detector groupings and run numbers. The canonical
//! form is a list of `(lo, hi)` pairs sorted by `lo` where no two ranges
//! overlap or touch, so structural equality is set equality.

use crate::domain::ReductionError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("invalid range {lo}-{hi}: lower bound exceeds upper bound")]
    InvalidRange { lo: u32, hi: u32 },
    #[error("cannot parse range token '{token}' in '{source_text}': {reason}")]
    Parse {
        token: String,
        source_text: String,
        reason: &'static str,
    },
    #[error("index {index} is out of range for an interval set of {len} values")]
    IndexOutOfRange { index: usize, len: usize },
}

impl From<IntervalError> for ReductionError {
    fn from(error: IntervalError) -> Self {
        let placeholder = match &error {
            IntervalError::InvalidRange { .. } => "INPUT.INVALID_RANGE",
            IntervalError::Parse { .. } => "INPUT.RANGE_PARSE",
            IntervalError::IndexOutOfRange { .. } => "INPUT.INDEX_OUT_OF_RANGE",
        };
        ReductionError::input_validation(placeholder, error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct IntervalSet {
    ranges: Vec<(u32, u32)>,
}

impl IntervalSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_ranges<I>(ranges: I) -> Result<Self, IntervalError>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut ranges = ranges.into_iter().collect::<Vec<_>>();
        if let Some(&(lo, hi)) = ranges.iter().find(|(lo, hi)| lo > hi) {
            return Err(IntervalError::InvalidRange { lo, hi });
        }

        ranges.sort_unstable();
        Ok(Self {
            ranges: merge_sorted(ranges),
        })
    }

    /// Union of several range strings, e.g. `["3-5", "9"]`.
    pub fn from_strings<S: AsRef<str>>(sources: &[S]) -> Result<Self, IntervalError> {
        sources
            .iter()
            .try_fold(Self::empty(), |set, source| -> Result<Self, IntervalError> {
                Ok(set.union(&source.as_ref().parse::<Self>()?))
            })
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut ranges = Vec::with_capacity(self.ranges.len() + other.ranges.len());
        let (mut lhs, mut rhs) = (self.ranges.iter().peekable(), other.ranges.iter().peekable());
        loop {
            let next = match (lhs.peek(), rhs.peek()) {
                (Some(a), Some(b)) if a <= b => lhs.next(),
                (Some(_), Some(_)) => rhs.next(),
                (Some(_), None) => lhs.next(),
                (None, Some(_)) => rhs.next(),
                (None, None) => break,
            };
            if let Some(&range) = next {
                ranges.push(range);
            }
        }

        Self {
            ranges: merge_sorted(ranges),
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        self.ranges
            .iter()
            .any(|&(lo, hi)| lo <= value && value <= hi)
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(lo, hi)| (hi - lo) as usize + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|&(lo, hi)| lo..=hi)
    }

    pub fn values(&self) -> Vec<u32> {
        self.iter().collect()
    }

    pub fn at(&self, index: usize) -> Result<u32, IntervalError> {
        let mut remaining = index;
        for &(lo, hi) in &self.ranges {
            let width = (hi - lo) as usize + 1;
            if remaining < width {
                return Ok(lo + remaining as u32);
            }
            remaining -= width;
        }

        Err(IntervalError::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.ranges.iter().all(|&(lo, hi)| {
            other
                .ranges
                .iter()
                .any(|&(other_lo, other_hi)| other_lo <= lo && hi <= other_hi)
        })
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.ranges.iter().any(|&(lo, hi)| {
            other
                .ranges
                .iter()
                .any(|&(other_lo, other_hi)| lo <= other_hi && other_lo <= hi)
        })
    }
}

/// Merges `(lo, hi)` pairs already sorted by `lo`, joining overlapping and adjacent ranges.
fn merge_sorted(sorted: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
    for (lo, hi) in sorted {
        match merged.last_mut() {
            Some(last) if u64::from(lo) <= u64::from(last.1) + 1 => {
                last.1 = last.1.max(hi);
            }
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

impl FromStr for IntervalSet {
    type Err = IntervalError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let ranges = source
            .split(',')
            .map(|token| parse_token(token, source))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_ranges(ranges)
    }
}

fn parse_token(token: &str, source: &str) -> Result<(u32, u32), IntervalError> {
    let parse_error = |reason| IntervalError::Parse {
        token: token.trim().to_string(),
        source_text: source.to_string(),
        reason,
    };

    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(parse_error("empty token"));
    }

    let parts = trimmed.split('-').map(str::trim).collect::<Vec<_>>();
    let parse_bound = |part: &str| {
        if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(parse_error("expected a non-negative integer"));
        }
        part.parse::<u32>()
            .map_err(|_| parse_error("value does not fit in 32 bits"))
    };

    match parts.as_slice() {
        [single] => {
            let value = parse_bound(single)?;
            Ok((value, value))
        }
        [lo, hi] => Ok((parse_bound(lo)?, parse_bound(hi)?)),
        _ => Err(parse_error("more than one '-' in token")),
    }
}

impl Display for IntervalSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (position, &(lo, hi)) in self.ranges.iter().enumerate() {
            if position > 0 {
                f.write_str(",")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        Ok(())
    }
}
