//! Per-column, per-row-group statistics and their merge algebra.
//!
//! Every writer produces one [`ColumnStatistics`] per row group; stripe
//! statistics are the merge of the row-group history. The merge is
//! associative and commutative: counts add, ordered aggregates take
//! elementwise min/max, sums add. An aggregate is absent whenever the
//! group held no non-null values, and stays absent once poisoned (integer
//! sum overflow, floating-point NaN) so pruning never trusts a bad bound.

use serde::{Deserialize, Serialize};

/// Aggregate bounds for an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerStatistics {
    /// Smallest non-null value.
    pub min: i64,
    /// Largest non-null value.
    pub max: i64,
    /// Sum of non-null values; absent after overflow.
    pub sum: Option<i64>,
}

/// Aggregate bounds for a floating-point column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoubleStatistics {
    /// Smallest non-null value.
    pub min: f64,
    /// Largest non-null value.
    pub max: f64,
}

/// Aggregate bounds for a binary or string column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryStatistics {
    /// Lexicographically smallest non-null value.
    pub min: Vec<u8>,
    /// Lexicographically largest non-null value.
    pub max: Vec<u8>,
    /// Total payload bytes across non-null values.
    pub total_length: u64,
}

/// Aggregate for a boolean column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanStatistics {
    /// Count of `true` values.
    pub true_count: u64,
}

/// Aggregate bounds for a timestamp column, in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampStatistics {
    /// Earliest non-null value.
    pub min: i64,
    /// Latest non-null value.
    pub max: i64,
}

/// The type-specific part of a column's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedStatistics {
    /// Integer min/max/sum.
    Integer(IntegerStatistics),
    /// Floating-point min/max.
    Double(DoubleStatistics),
    /// Binary/string min/max and total length.
    Binary(BinaryStatistics),
    /// Boolean true count.
    Boolean(BooleanStatistics),
    /// Timestamp min/max.
    Timestamp(TimestampStatistics),
}

impl TypedStatistics {
    /// Combines two aggregates of the same kind. Mismatched kinds cannot
    /// happen within one column; the result degrades to `None` rather than
    /// producing bounds that mix types.
    fn merge(a: &TypedStatistics, b: &TypedStatistics) -> Option<TypedStatistics> {
        match (a, b) {
            (TypedStatistics::Integer(x), TypedStatistics::Integer(y)) => {
                Some(TypedStatistics::Integer(IntegerStatistics {
                    min: x.min.min(y.min),
                    max: x.max.max(y.max),
                    sum: match (x.sum, y.sum) {
                        (Some(p), Some(q)) => p.checked_add(q),
                        _ => None,
                    },
                }))
            }
            (TypedStatistics::Double(x), TypedStatistics::Double(y)) => {
                Some(TypedStatistics::Double(DoubleStatistics {
                    min: x.min.min(y.min),
                    max: x.max.max(y.max),
                }))
            }
            (TypedStatistics::Binary(x), TypedStatistics::Binary(y)) => {
                Some(TypedStatistics::Binary(BinaryStatistics {
                    min: x.min.clone().min(y.min.clone()),
                    max: x.max.clone().max(y.max.clone()),
                    total_length: x.total_length + y.total_length,
                }))
            }
            (TypedStatistics::Boolean(x), TypedStatistics::Boolean(y)) => {
                Some(TypedStatistics::Boolean(BooleanStatistics {
                    true_count: x.true_count + y.true_count,
                }))
            }
            (TypedStatistics::Timestamp(x), TypedStatistics::Timestamp(y)) => {
                Some(TypedStatistics::Timestamp(TimestampStatistics {
                    min: x.min.min(y.min),
                    max: x.max.max(y.max),
                }))
            }
            _ => {
                debug_assert!(false, "mismatched statistics kinds in one column");
                None
            }
        }
    }

    /// Heap bytes retained by this aggregate.
    fn heap_bytes(&self) -> u64 {
        match self {
            TypedStatistics::Binary(binary) => {
                (binary.min.capacity() + binary.max.capacity()) as u64
            }
            _ => 0,
        }
    }
}

/// Statistics for one column over one row group (or, after merging, one
/// stripe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Rows covered, including nulls.
    pub total_count: u64,
    /// Rows with a non-null value. Always `<= total_count`.
    pub non_null_count: u64,
    /// Type-specific aggregate; `None` when every row was null or the
    /// aggregate was poisoned.
    pub aggregate: Option<TypedStatistics>,
}

impl ColumnStatistics {
    /// Statistics covering zero rows.
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            non_null_count: 0,
            aggregate: None,
        }
    }

    /// Count-only statistics, used by composite writers whose aggregates
    /// live in their children.
    pub fn of_counts(non_null_count: u64, total_count: u64) -> Self {
        debug_assert!(non_null_count <= total_count);
        Self {
            total_count,
            non_null_count,
            aggregate: None,
        }
    }

    /// Merges two statistics values. Associative and commutative.
    pub fn merge(a: &ColumnStatistics, b: &ColumnStatistics) -> ColumnStatistics {
        // A side with zero non-null rows contributes counts but carries no
        // aggregate information, so the other side's aggregate survives.
        let aggregate = if a.non_null_count == 0 {
            b.aggregate.clone()
        } else if b.non_null_count == 0 {
            a.aggregate.clone()
        } else {
            match (&a.aggregate, &b.aggregate) {
                (Some(x), Some(y)) => TypedStatistics::merge(x, y),
                _ => None,
            }
        };
        ColumnStatistics {
            total_count: a.total_count + b.total_count,
            non_null_count: a.non_null_count + b.non_null_count,
            aggregate,
        }
    }

    /// Left-folds a whole history of row-group statistics into one value.
    /// Tolerates an empty history and all-null histories.
    pub fn merge_all<'a>(history: impl IntoIterator<Item = &'a ColumnStatistics>) -> ColumnStatistics {
        history
            .into_iter()
            .fold(ColumnStatistics::empty(), |acc, next| {
                ColumnStatistics::merge(&acc, next)
            })
    }

    /// Approximate memory retained by this value, for `retained_bytes`
    /// accounting of the row-group history.
    pub fn retained_bytes(&self) -> u64 {
        std::mem::size_of::<ColumnStatistics>() as u64
            + self.aggregate.as_ref().map_or(0, TypedStatistics::heap_bytes)
    }
}

/// Accumulator for an integer column's row group.
#[derive(Debug, Default)]
pub struct IntegerStatisticsBuilder {
    non_null_count: u64,
    min: i64,
    max: i64,
    sum: Option<i64>,
}

impl IntegerStatisticsBuilder {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one non-null value.
    pub fn add(&mut self, value: i64) {
        if self.non_null_count == 0 {
            self.min = value;
            self.max = value;
            self.sum = Some(value);
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.sum = self.sum.and_then(|sum| sum.checked_add(value));
        }
        self.non_null_count += 1;
    }

    /// Number of values folded in since the last `finish`.
    pub fn non_null_count(&self) -> u64 {
        self.non_null_count
    }

    /// Produces the row group's statistics and resets the accumulator.
    pub fn finish(&mut self, total_count: u64) -> ColumnStatistics {
        let aggregate = (self.non_null_count > 0).then(|| {
            TypedStatistics::Integer(IntegerStatistics {
                min: self.min,
                max: self.max,
                sum: self.sum,
            })
        });
        let statistics = ColumnStatistics {
            total_count,
            non_null_count: self.non_null_count,
            aggregate,
        };
        *self = Self::default();
        statistics
    }
}

/// Accumulator for a floating-point column's row group. A NaN poisons the
/// aggregate for the whole group.
#[derive(Debug, Default)]
pub struct DoubleStatisticsBuilder {
    non_null_count: u64,
    min: f64,
    max: f64,
    saw_nan: bool,
}

impl DoubleStatisticsBuilder {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one non-null value.
    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            self.saw_nan = true;
        } else if self.non_null_count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.non_null_count += 1;
    }

    /// Number of values folded in since the last `finish`.
    pub fn non_null_count(&self) -> u64 {
        self.non_null_count
    }

    /// Produces the row group's statistics and resets the accumulator.
    pub fn finish(&mut self, total_count: u64) -> ColumnStatistics {
        let aggregate = (self.non_null_count > 0 && !self.saw_nan).then(|| {
            TypedStatistics::Double(DoubleStatistics {
                min: self.min,
                max: self.max,
            })
        });
        let statistics = ColumnStatistics {
            total_count,
            non_null_count: self.non_null_count,
            aggregate,
        };
        *self = Self::default();
        statistics
    }
}

/// Accumulator for a binary or string column's row group.
#[derive(Debug, Default)]
pub struct BinaryStatisticsBuilder {
    non_null_count: u64,
    min: Vec<u8>,
    max: Vec<u8>,
    total_length: u64,
}

impl BinaryStatisticsBuilder {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one non-null value.
    pub fn add(&mut self, value: &[u8]) {
        if self.non_null_count == 0 {
            self.min = value.to_vec();
            self.max = value.to_vec();
        } else {
            if value < self.min.as_slice() {
                self.min = value.to_vec();
            }
            if value > self.max.as_slice() {
                self.max = value.to_vec();
            }
        }
        self.total_length += value.len() as u64;
        self.non_null_count += 1;
    }

    /// Number of values folded in since the last `finish`.
    pub fn non_null_count(&self) -> u64 {
        self.non_null_count
    }

    /// Produces the row group's statistics and resets the accumulator.
    pub fn finish(&mut self, total_count: u64) -> ColumnStatistics {
        let aggregate = (self.non_null_count > 0).then(|| {
            TypedStatistics::Binary(BinaryStatistics {
                min: std::mem::take(&mut self.min),
                max: std::mem::take(&mut self.max),
                total_length: self.total_length,
            })
        });
        let statistics = ColumnStatistics {
            total_count,
            non_null_count: self.non_null_count,
            aggregate,
        };
        *self = Self::default();
        statistics
    }
}

/// Accumulator for a boolean column's row group.
#[derive(Debug, Default)]
pub struct BooleanStatisticsBuilder {
    non_null_count: u64,
    true_count: u64,
}

impl BooleanStatisticsBuilder {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one non-null value.
    pub fn add(&mut self, value: bool) {
        if value {
            self.true_count += 1;
        }
        self.non_null_count += 1;
    }

    /// Number of values folded in since the last `finish`.
    pub fn non_null_count(&self) -> u64 {
        self.non_null_count
    }

    /// Produces the row group's statistics and resets the accumulator.
    pub fn finish(&mut self, total_count: u64) -> ColumnStatistics {
        let aggregate = (self.non_null_count > 0).then(|| {
            TypedStatistics::Boolean(BooleanStatistics {
                true_count: self.true_count,
            })
        });
        let statistics = ColumnStatistics {
            total_count,
            non_null_count: self.non_null_count,
            aggregate,
        };
        *self = Self::default();
        statistics
    }
}

/// Accumulator for a timestamp column's row group, tracking milliseconds.
#[derive(Debug, Default)]
pub struct TimestampStatisticsBuilder {
    non_null_count: u64,
    min: i64,
    max: i64,
}

impl TimestampStatisticsBuilder {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one non-null value in epoch milliseconds.
    pub fn add(&mut self, millis: i64) {
        if self.non_null_count == 0 {
            self.min = millis;
            self.max = millis;
        } else {
            self.min = self.min.min(millis);
            self.max = self.max.max(millis);
        }
        self.non_null_count += 1;
    }

    /// Number of values folded in since the last `finish`.
    pub fn non_null_count(&self) -> u64 {
        self.non_null_count
    }

    /// Produces the row group's statistics and resets the accumulator.
    pub fn finish(&mut self, total_count: u64) -> ColumnStatistics {
        let aggregate = (self.non_null_count > 0).then(|| {
            TypedStatistics::Timestamp(TimestampStatistics {
                min: self.min,
                max: self.max,
            })
        });
        let statistics = ColumnStatistics {
            total_count,
            non_null_count: self.non_null_count,
            aggregate,
        };
        *self = Self::default();
        statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn integer_stats(total: u64, non_null: u64, min: i64, max: i64, sum: Option<i64>) -> ColumnStatistics {
        ColumnStatistics {
            total_count: total,
            non_null_count: non_null,
            aggregate: (non_null > 0)
                .then(|| TypedStatistics::Integer(IntegerStatistics { min, max, sum })),
        }
    }

    #[test]
    fn merge_of_empty_history_is_empty() {
        assert_eq!(ColumnStatistics::merge_all([]), ColumnStatistics::empty());
    }

    #[test]
    fn merge_takes_elementwise_bounds_and_adds_counts() {
        let a = integer_stats(10, 8, -5, 40, Some(100));
        let b = integer_stats(6, 6, -9, 12, Some(30));
        let merged = ColumnStatistics::merge(&a, &b);
        assert_eq!(merged.total_count, 16);
        assert_eq!(merged.non_null_count, 14);
        assert_eq!(
            merged.aggregate,
            Some(TypedStatistics::Integer(IntegerStatistics {
                min: -9,
                max: 40,
                sum: Some(130),
            }))
        );
    }

    #[test]
    fn all_null_side_keeps_other_aggregate() {
        let a = integer_stats(4, 0, 0, 0, None);
        let b = integer_stats(3, 3, 1, 2, Some(4));
        assert_eq!(ColumnStatistics::merge(&a, &b).aggregate, b.aggregate);
        assert_eq!(ColumnStatistics::merge(&b, &a).aggregate, b.aggregate);
    }

    #[test]
    fn sum_overflow_poisons_merged_sum_only() {
        let a = integer_stats(1, 1, i64::MAX, i64::MAX, Some(i64::MAX));
        let b = integer_stats(1, 1, 1, 1, Some(1));
        let merged = ColumnStatistics::merge(&a, &b);
        assert_eq!(
            merged.aggregate,
            Some(TypedStatistics::Integer(IntegerStatistics {
                min: 1,
                max: i64::MAX,
                sum: None,
            }))
        );
    }

    #[test]
    fn nan_poisons_double_aggregate() {
        let mut builder = DoubleStatisticsBuilder::new();
        builder.add(1.0);
        builder.add(f64::NAN);
        builder.add(2.0);
        let statistics = builder.finish(3);
        assert_eq!(statistics.non_null_count, 3);
        assert!(statistics.aggregate.is_none());
    }

    #[test]
    fn builders_reset_after_finish() {
        let mut builder = IntegerStatisticsBuilder::new();
        builder.add(5);
        let first = builder.finish(1);
        assert_eq!(first.non_null_count, 1);
        let second = builder.finish(0);
        assert_eq!(second, ColumnStatistics::of_counts(0, 0));
    }

    #[test]
    fn binary_builder_tracks_lexicographic_bounds() {
        let mut builder = BinaryStatisticsBuilder::new();
        builder.add(b"pear");
        builder.add(b"apple");
        builder.add(b"plum");
        let statistics = builder.finish(3);
        match statistics.aggregate {
            Some(TypedStatistics::Binary(binary)) => {
                assert_eq!(binary.min, b"apple");
                assert_eq!(binary.max, b"plum");
                assert_eq!(binary.total_length, 13);
            }
            other => panic!("unexpected aggregate: {other:?}"),
        }
    }

    prop_compose! {
        fn arb_integer_stats()(
            non_null in 0u64..100,
            extra_nulls in 0u64..100,
            min in -1000i64..1000,
            span in 0i64..1000,
            sum in proptest::option::of(-100_000i64..100_000),
        ) -> ColumnStatistics {
            integer_stats(non_null + extra_nulls, non_null, min, min + span, sum)
        }
    }

    proptest! {
        #[test]
        fn merge_is_associative(
            a in arb_integer_stats(),
            b in arb_integer_stats(),
            c in arb_integer_stats(),
        ) {
            let left = ColumnStatistics::merge(&ColumnStatistics::merge(&a, &b), &c);
            let right = ColumnStatistics::merge(&a, &ColumnStatistics::merge(&b, &c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn merge_is_commutative(a in arb_integer_stats(), b in arb_integer_stats()) {
            prop_assert_eq!(
                ColumnStatistics::merge(&a, &b),
                ColumnStatistics::merge(&b, &a)
            );
        }
    }
}
