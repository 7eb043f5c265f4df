//! Numeric rollup accumulation.
//!
//! The accumulator keeps the narrowest numeric kind that can represent every
//! value seen so far. It starts at the kind of the first value and widens
//! uint -> int -> double when a wider value arrives or an integer sum
//! overflows. Once widened it never narrows again.

use ta_common::{Number, Rollup};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Acc {
    UInt { min: u64, max: u64, sum: u64 },
    Int { min: i64, max: i64, sum: i64 },
    Double { min: f64, max: f64, sum: f64 },
}

impl Acc {
    fn start(n: Number) -> Self {
        match n {
            Number::UInt(v) => Acc::UInt {
                min: v,
                max: v,
                sum: v,
            },
            Number::Int(v) => Acc::Int {
                min: v,
                max: v,
                sum: v,
            },
            Number::Double(v) => Acc::Double {
                min: v,
                max: v,
                sum: v,
            },
        }
    }

    fn to_double(self) -> Self {
        match self {
            Acc::UInt { min, max, sum } => Acc::Double {
                min: min as f64,
                max: max as f64,
                sum: sum as f64,
            },
            Acc::Int { min, max, sum } => Acc::Double {
                min: min as f64,
                max: max as f64,
                sum: sum as f64,
            },
            d @ Acc::Double { .. } => d,
        }
    }

    /// `None` when some unsigned state does not fit an i64.
    fn to_int(self) -> Option<Self> {
        match self {
            Acc::UInt { min, max, sum } => Some(Acc::Int {
                min: i64::try_from(min).ok()?,
                max: i64::try_from(max).ok()?,
                sum: i64::try_from(sum).ok()?,
            }),
            other => Some(other),
        }
    }

    fn absorb(self, n: Number) -> Self {
        match (self, n) {
            (Acc::UInt { min, max, sum }, Number::UInt(v)) => match sum.checked_add(v) {
                Some(sum) => Acc::UInt {
                    min: min.min(v),
                    max: max.max(v),
                    sum,
                },
                None => self.to_double().absorb(n),
            },
            (Acc::UInt { .. }, Number::Int(_)) => match self.to_int() {
                Some(widened) => widened.absorb(n),
                None => self.to_double().absorb(n),
            },
            (Acc::Int { .. }, Number::UInt(v)) => match i64::try_from(v) {
                Ok(v) => self.absorb(Number::Int(v)),
                Err(_) => self.to_double().absorb(n),
            },
            (Acc::Int { min, max, sum }, Number::Int(v)) => match sum.checked_add(v) {
                Some(sum) => Acc::Int {
                    min: min.min(v),
                    max: max.max(v),
                    sum,
                },
                None => self.to_double().absorb(n),
            },
            (Acc::Double { min, max, sum }, n) => {
                let v = n.as_f64();
                Acc::Double {
                    min: min.min(v),
                    max: max.max(v),
                    sum: sum + v,
                }
            }
            (_, Number::Double(_)) => self.to_double().absorb(n),
        }
    }

    fn parts(self) -> (Number, Number, Number) {
        match self {
            Acc::UInt { min, max, sum } => (Number::UInt(min), Number::UInt(max), Number::UInt(sum)),
            Acc::Int { min, max, sum } => (Number::Int(min), Number::Int(max), Number::Int(sum)),
            Acc::Double { min, max, sum } => {
                (Number::Double(min), Number::Double(max), Number::Double(sum))
            }
        }
    }
}

/// Weight/min/max/sum over the raw values of one field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RollupAccumulator {
    weight: u64,
    acc: Option<Acc>,
}

impl RollupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw value into the summary.
    pub fn push(&mut self, value: Number) {
        self.weight += 1;
        self.acc = Some(match self.acc {
            None => Acc::start(value),
            Some(acc) => acc.absorb(value),
        });
    }

    /// Number of values pushed so far.
    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn is_empty(&self) -> bool {
        self.weight == 0
    }

    /// The summary. `min`, `max` and `sum` stay `None` when nothing was pushed.
    pub fn finish(&self) -> Rollup {
        match self.acc {
            None => Rollup::empty(),
            Some(acc) => {
                let (min, max, sum) = acc.parts();
                Rollup {
                    weight: self.weight,
                    min: Some(min),
                    max: Some(max),
                    sum: Some(sum),
                }
            }
        }
    }
}

impl Extend<Number> for RollupAccumulator {
    fn extend<I: IntoIterator<Item = Number>>(&mut self, iter: I) {
        for n in iter {
            self.push(n);
        }
    }
}

impl FromIterator<Number> for RollupAccumulator {
    fn from_iter<I: IntoIterator<Item = Number>>(iter: I) -> Self {
        let mut acc = Self::new();
        acc.extend(iter);
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rollup(values: &[Number]) -> Rollup {
        values.iter().copied().collect::<RollupAccumulator>().finish()
    }

    #[test]
    fn test_unsigned_summary() {
        let r = rollup(&[Number::UInt(10), Number::UInt(20), Number::UInt(30)]);
        assert_eq!(r.weight, 3);
        assert_eq!(r.min, Some(Number::UInt(10)));
        assert_eq!(r.max, Some(Number::UInt(30)));
        assert_eq!(r.sum, Some(Number::UInt(60)));
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = RollupAccumulator::new();
        assert!(acc.is_empty());
        assert_eq!(acc.finish(), Rollup::empty());
    }

    #[test]
    fn test_single_value() {
        let r = rollup(&[Number::Int(-4)]);
        assert_eq!(r.weight, 1);
        assert_eq!(r.min, r.max);
        assert_eq!(r.sum, Some(Number::Int(-4)));
    }

    #[test]
    fn test_widen_to_signed() {
        let r = rollup(&[Number::UInt(5), Number::Int(-7)]);
        assert_eq!(r.min, Some(Number::Int(-7)));
        assert_eq!(r.max, Some(Number::Int(5)));
        assert_eq!(r.sum, Some(Number::Int(-2)));

        let r = rollup(&[Number::Int(-1), Number::UInt(3)]);
        assert_eq!(r.sum, Some(Number::Int(2)));
    }

    #[test]
    fn test_widen_to_double() {
        let r = rollup(&[Number::UInt(1), Number::Double(0.5)]);
        assert_eq!(r.min, Some(Number::Double(0.5)));
        assert_eq!(r.max, Some(Number::Double(1.0)));
        assert_eq!(r.sum, Some(Number::Double(1.5)));

        // Stays double after widening.
        let r = rollup(&[Number::Double(0.5), Number::UInt(2)]);
        assert_eq!(r.sum, Some(Number::Double(2.5)));
    }

    #[test]
    fn test_overflow_widens_to_double() {
        let r = rollup(&[Number::UInt(u64::MAX), Number::UInt(1)]);
        assert_eq!(r.weight, 2);
        assert_eq!(r.sum, Some(Number::Double(u64::MAX as f64 + 1.0)));
        assert_eq!(r.max, Some(Number::Double(u64::MAX as f64)));

        let r = rollup(&[Number::Int(i64::MIN), Number::Int(-1)]);
        assert!(matches!(r.sum, Some(Number::Double(_))));
    }

    #[test]
    fn test_large_unsigned_with_signed_goes_double() {
        let r = rollup(&[Number::UInt(u64::MAX), Number::Int(-1)]);
        assert!(matches!(r.min, Some(Number::Double(v)) if v == -1.0));
    }
}
