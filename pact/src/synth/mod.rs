//! Value Synthesis
//!
//! Turns a parameter's bound record into a deterministic list of literal
//! values: boundary values first, then pseudo-random draws from a fixed-seed
//! xorshift64 stream. Each list restarts its stream from the seed, so equal
//! records always give byte-identical lists.

use std::fmt;

use tracing::trace;

use crate::ast::Type;
use crate::config::GenConfig;
use crate::constraint::{Bound, ParamConstraint};
use crate::util::str_literal;

/// Fixed pool of string inputs
pub const STRING_POOL: [&str; 5] = ["", "a", "abc", "hello world", "ZZZ"];

/// One xorshift64 step
pub fn xorshift64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

/// A synthesized input, rendered as a Rust literal by `Display`
#[derive(Debug, Clone, PartialEq)]
pub enum SynthValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntSeq(Vec<i64>),
}

impl fmt::Display for SynthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthValue::Int(n) => write!(f, "{}", int_text(*n)),
            SynthValue::Float(x) => write!(f, "{}", float_text(*x)),
            SynthValue::Bool(b) => write!(f, "{b}"),
            SynthValue::Str(s) => write!(f, "String::from({})", str_literal(s)),
            SynthValue::IntSeq(items) => {
                let parts: Vec<String> = items.iter().map(|n| int_text(*n)).collect();
                write!(f, "vec![{}]", parts.join(", "))
            }
        }
    }
}

fn int_text(n: i64) -> String {
    if n == i64::MIN {
        "i64::MIN".to_string()
    } else {
        n.to_string()
    }
}

fn float_text(x: f64) -> String {
    if x.is_finite() {
        format!("{x:?}")
    } else if x.is_nan() {
        "f64::NAN".to_string()
    } else if x > 0.0 {
        "f64::INFINITY".to_string()
    } else {
        "f64::NEG_INFINITY".to_string()
    }
}

/// Whether values of `ty` can be synthesized
pub fn supports(ty: &Type) -> bool {
    match ty {
        Type::Int | Type::Float | Type::Bool | Type::Str => true,
        Type::Seq(elem) => **elem == Type::Int,
        _ => false,
    }
}

/// Generator settings plus the per-type generators
pub struct Synthesizer<'c> {
    config: &'c GenConfig,
}

impl<'c> Synthesizer<'c> {
    pub fn new(config: &'c GenConfig) -> Self {
        Self { config }
    }

    /// Value list for a parameter of type `ty`; `None` if the type has no
    /// generator. An empty list means the bounds admit no value.
    pub fn values(&self, ty: &Type, c: &ParamConstraint) -> Option<Vec<SynthValue>> {
        let values = match ty {
            Type::Int => self.ints(c).into_iter().map(SynthValue::Int).collect(),
            Type::Float => self.floats(c).into_iter().map(SynthValue::Float).collect(),
            Type::Bool => vec![SynthValue::Bool(false), SynthValue::Bool(true)],
            Type::Str => STRING_POOL.iter().map(|s| SynthValue::Str(s.to_string())).collect(),
            Type::Seq(elem) if **elem == Type::Int => {
                self.int_seqs(c).into_iter().map(SynthValue::IntSeq).collect()
            }
            _ => return None,
        };
        trace!(param = %c.param, ty = %ty, count = values.len(), "synthesized values");
        Some(values)
    }

    /// Effective inclusive integer range, `None` if empty
    pub fn int_range(&self, c: &ParamConstraint) -> Option<(i64, i64)> {
        widen(
            c.lower.map(Bound::as_i64),
            c.upper.map(Bound::as_i64),
            self.config.int_range,
        )
    }

    /// Effective inclusive element range of an integer sequence
    pub fn elem_range(&self, c: &ParamConstraint) -> Option<(i64, i64)> {
        widen(c.elem_lower, c.elem_upper, self.config.elem_range)
    }

    /// Effective inclusive float range
    pub fn float_range(&self, c: &ParamConstraint) -> Option<(f64, f64)> {
        let (dlo, dhi) = self.config.float_range;
        let width = dhi - dlo;
        let mut lo = c.lower.map_or(dlo, Bound::as_f64);
        let mut hi = c.upper.map_or(dhi, Bound::as_f64);
        if c.upper.is_none() && lo > hi {
            hi = lo + width;
        }
        if c.lower.is_none() && lo > hi {
            lo = hi - width;
        }
        (lo <= hi).then_some((lo, hi))
    }

    pub fn ints(&self, c: &ParamConstraint) -> Vec<i64> {
        let Some((lo, hi)) = self.int_range(c) else {
            return Vec::new();
        };
        let excluded = |v: i64| c.excluded.iter().any(|b| b.as_i64() == v);

        let mut out = self.int_boundaries(c);
        let span = hi as i128 - lo as i128 + 1;
        let mut state = self.config.int_seed;
        for _ in 0..self.config.random_samples {
            let x = xorshift64(&mut state);
            let v = (lo as i128 + (x as i128 % span)) as i64;
            if !excluded(v) {
                out.push(v);
            }
        }
        out
    }

    /// The boundary part of `ints`, without the random draws
    pub fn int_boundaries(&self, c: &ParamConstraint) -> Vec<i64> {
        let Some((lo, hi)) = self.int_range(c) else {
            return Vec::new();
        };
        let excluded = |v: i64| c.excluded.iter().any(|b| b.as_i64() == v);

        let mut out: Vec<i64> = Vec::new();
        let boundary = [
            lo,
            lo.saturating_add(1),
            0,
            1,
            hi.saturating_sub(1),
            hi,
        ];
        for v in boundary {
            if (lo..=hi).contains(&v) && !out.contains(&v) && !excluded(v) {
                out.push(v);
            }
        }
        out
    }

    pub fn floats(&self, c: &ParamConstraint) -> Vec<f64> {
        let Some((lo, hi)) = self.float_range(c) else {
            return Vec::new();
        };
        let excluded = |v: f64| c.excluded.iter().any(|b| b.as_f64() == v);

        let mut out: Vec<f64> = Vec::new();
        for v in [0.0, 1.0, -1.0, lo, hi] {
            if v >= lo && v <= hi && !out.contains(&v) && !excluded(v) {
                out.push(v);
            }
        }

        let mut state = self.config.float_seed;
        for _ in 0..self.config.random_samples {
            let x = xorshift64(&mut state);
            let t = x as f64 / u64::MAX as f64;
            let v = (lo + t * (hi - lo)).clamp(lo, hi);
            if !excluded(v) {
                out.push(v);
            }
        }
        out
    }

    pub fn int_seqs(&self, c: &ParamConstraint) -> Vec<Vec<i64>> {
        let Some((elo, ehi)) = self.elem_range(c) else {
            return Vec::new();
        };
        let min = c.min_len.unwrap_or(0);
        let max = self.config.max_seq_len;

        let mut lengths = vec![min];
        if min < max {
            lengths.push(min + 1);
        }
        if 5 >= min && !lengths.contains(&5) {
            lengths.push(5);
        }

        let span = ehi as i128 - elo as i128 + 1;
        let mut state = self.config.seq_seed;
        let draw = |state: &mut u64| (elo as i128 + (xorshift64(state) as i128 % span)) as i64;

        let mut out: Vec<Vec<i64>> = lengths
            .into_iter()
            .map(|len| (0..len).map(|_| draw(&mut state)).collect())
            .collect();
        for _ in 0..self.config.random_seqs {
            let len = min + (xorshift64(&mut state) % 5) as usize;
            out.push((0..len).map(|_| draw(&mut state)).collect());
        }
        out
    }

    /// One bound-satisfying value, used for base instances and workflow calls
    pub fn default_value(&self, ty: &Type, c: &ParamConstraint) -> Option<SynthValue> {
        match ty {
            Type::Int => {
                let (lo, hi) = self.int_range(c)?;
                let excluded = |v: i64| c.excluded.iter().any(|b| b.as_i64() == v);
                let start = 1i64.clamp(lo, hi);
                let up = (start..=hi).take(64);
                let down = (lo..start).rev().take(64);
                up.chain(down).find(|v| !excluded(*v)).map(SynthValue::Int)
            }
            Type::Float => {
                let (lo, hi) = self.float_range(c)?;
                let excluded = |v: f64| c.excluded.iter().any(|b| b.as_f64() == v);
                [1.0f64.clamp(lo, hi), lo, hi, (lo + hi) / 2.0]
                    .into_iter()
                    .find(|v| !excluded(*v))
                    .map(SynthValue::Float)
            }
            Type::Bool => Some(SynthValue::Bool(true)),
            Type::Str => Some(SynthValue::Str("a".to_string())),
            Type::Seq(elem) if **elem == Type::Int => {
                let (elo, ehi) = self.elem_range(c)?;
                let len = c.min_len.unwrap_or(0).max(1);
                Some(SynthValue::IntSeq(vec![1i64.clamp(elo, ehi); len]))
            }
            _ => None,
        }
    }
}

/// Fill in a missing bound from the default range. A one-sided bound outside
/// the default range slides the default window to start (or end) at it.
fn widen(lower: Option<i64>, upper: Option<i64>, default: (i64, i64)) -> Option<(i64, i64)> {
    let width = default.1.saturating_sub(default.0);
    let mut lo = lower.unwrap_or(default.0);
    let mut hi = upper.unwrap_or(default.1);
    if upper.is_none() && lo > hi {
        hi = lo.saturating_add(width);
    }
    if lower.is_none() && lo > hi {
        lo = hi.saturating_sub(width);
    }
    (lo <= hi).then_some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bounded(lo: i64, hi: i64) -> ParamConstraint {
        ParamConstraint {
            lower: Some(Bound::Int(lo)),
            upper: Some(Bound::Int(hi)),
            ..ParamConstraint::unconstrained("x")
        }
    }

    #[test]
    fn test_xorshift_first_steps() {
        let mut state = 1u64;
        assert_eq!(xorshift64(&mut state), 1082269761);
        assert_eq!(xorshift64(&mut state), 1152992998833853505);
    }

    #[test]
    fn test_boundaries_included_and_in_range() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        let values = synth.ints(&bounded(0, 10));
        for v in [0, 1, 9, 10] {
            assert!(values.contains(&v), "missing boundary {v}");
        }
        assert!(values.iter().all(|v| (0..=10).contains(v)));
        assert_eq!(&values[..4], &[0, 1, 9, 10]);
        assert_eq!(values.len(), 4 + config.random_samples);
    }

    #[test]
    fn test_exclusion_is_never_generated() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        let c = ParamConstraint {
            excluded: vec![Bound::Int(5)],
            ..bounded(0, 10)
        };
        assert!(!synth.ints(&c).contains(&5));
    }

    #[test]
    fn test_min_length_floor() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        let c = ParamConstraint {
            min_len: Some(3),
            ..ParamConstraint::unconstrained("xs")
        };
        let seqs = synth.int_seqs(&c);
        assert!(seqs.iter().all(|s| s.len() >= 3));
        assert_eq!(seqs[0].len(), 3);
        assert_eq!(seqs[1].len(), 4);
        assert_eq!(seqs[2].len(), 5);
        assert_eq!(seqs.len(), 3 + config.random_seqs);
        assert!(seqs.iter().flatten().all(|v| (1..=100).contains(v)));
    }

    #[test]
    fn test_empty_range_gives_no_values() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        assert!(synth.ints(&bounded(5, 4)).is_empty());
        assert_eq!(synth.default_value(&Type::Int, &bounded(5, 4)), None);
    }

    #[test]
    fn test_one_sided_bound_slides_default_window() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        let c = ParamConstraint {
            lower: Some(Bound::Int(500)),
            ..ParamConstraint::unconstrained("x")
        };
        assert_eq!(synth.int_range(&c), Some((500, 700)));
    }

    #[test]
    fn test_single_point_range() {
        let config = GenConfig::default().random_samples(3);
        let synth = Synthesizer::new(&config);
        assert_eq!(synth.ints(&bounded(7, 7)), vec![7, 7, 7, 7]);
    }

    #[test]
    fn test_float_fixed_values_come_first() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        let c = ParamConstraint {
            lower: Some(Bound::Float(0.5)),
            upper: Some(Bound::Float(2.0)),
            ..ParamConstraint::unconstrained("r")
        };
        let values = synth.floats(&c);
        assert_eq!(&values[..3], &[1.0, 0.5, 2.0]);
        assert!(values.iter().all(|v| (0.5..=2.0).contains(v)));
    }

    #[test]
    fn test_default_value_skips_exclusion() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        let c = ParamConstraint {
            excluded: vec![Bound::Int(1)],
            ..bounded(-3, 3)
        };
        assert_eq!(synth.default_value(&Type::Int, &c), Some(SynthValue::Int(2)));
        assert_eq!(
            synth.default_value(&Type::Int, &bounded(10, 20)),
            Some(SynthValue::Int(10))
        );
    }

    #[test]
    fn test_unsupported_types_have_no_generator() {
        let config = GenConfig::default();
        let synth = Synthesizer::new(&config);
        let c = ParamConstraint::unconstrained("p");
        assert!(synth.values(&Type::Named("Point".into()), &c).is_none());
        assert!(synth.values(&Type::seq(Type::Str), &c).is_none());
        assert!(!supports(&Type::Result(Box::new(Type::Int), Box::new(Type::Str))));
    }

    #[test]
    fn test_values_render_as_rust_literals() {
        let rendered: Vec<String> = [
            SynthValue::Int(-4),
            SynthValue::Int(i64::MIN),
            SynthValue::Float(-1.0),
            SynthValue::Bool(true),
            SynthValue::Str("hello world".into()),
            SynthValue::IntSeq(vec![1, -2]),
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        insta::assert_snapshot!(rendered.join(" | "), @r#"-4 | i64::MIN | -1.0 | true | String::from("hello world") | vec![1, -2]"#);
    }

    proptest! {
        #[test]
        fn synthesis_is_deterministic(lo in -1000i64..1000, width in 0i64..500) {
            let config = GenConfig::default();
            let synth = Synthesizer::new(&config);
            let c = bounded(lo, lo + width);
            prop_assert_eq!(synth.ints(&c), synth.ints(&c));
            prop_assert_eq!(synth.int_seqs(&c), synth.int_seqs(&c));
        }

        #[test]
        fn ints_stay_in_bounds(lo in i64::MIN / 2..i64::MAX / 2, width in 0i64..1_000_000, skip in any::<i64>()) {
            let config = GenConfig::default();
            let synth = Synthesizer::new(&config);
            let c = ParamConstraint {
                excluded: vec![Bound::Int(skip)],
                ..bounded(lo, lo + width)
            };
            for v in synth.ints(&c) {
                prop_assert!(v >= lo && v <= lo + width);
                prop_assert_ne!(v, skip);
            }
        }
    }
}
