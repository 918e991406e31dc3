use serde::{Serialize, Serializer};
use std::fmt;

/// One-decimal rounding used for every displayed mark and percentage:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn format_1_decimal(x: f64) -> String {
    format!("{:.1}", x)
}

/// Raw mark text to a number. Blank or non-numeric text counts as 0.
pub fn parse_mark(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Unrounded percentage of `out_of`; a non-positive maximum yields 0.
pub fn percent_of(mark: f64, out_of: f64) -> f64 {
    if out_of > 0.0 {
        100.0 * mark / out_of
    } else {
        0.0
    }
}

/// Band on the 1..7 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GradeCode(u8);

const CODE_LABELS: [&str; 7] = ["1", "2", "3", "4", "5", "6", "7"];

/// Lower bound (inclusive) of codes 7 down to 2.
const CODE_THRESHOLDS: [(f64, u8); 6] = [
    (80.0, 7),
    (70.0, 6),
    (60.0, 5),
    (50.0, 4),
    (40.0, 3),
    (30.0, 2),
];

impl GradeCode {
    pub const LOWEST: GradeCode = GradeCode(1);

    pub fn all() -> impl Iterator<Item = GradeCode> {
        (1..=7).map(GradeCode)
    }

    /// Zero-based slot for per-code tallies.
    pub fn slot(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn as_str(self) -> &'static str {
        CODE_LABELS[self.slot()]
    }
}

impl fmt::Display for GradeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GradeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn code_of(percentage: f64) -> GradeCode {
    for (floor, code) in CODE_THRESHOLDS {
        if percentage >= floor {
            return GradeCode(code);
        }
    }
    GradeCode::LOWEST
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub mark: f64,
    pub percentage: f64,
    pub code: GradeCode,
}

/// Banding uses the unrounded percentage so that 79.99..% never lands in code 7;
/// the reported percentage is rounded to one decimal.
pub fn score_of(raw: &str, out_of: f64) -> Score {
    let mark = parse_mark(raw);
    let exact = percent_of(mark, out_of);
    Score {
        mark,
        percentage: round_off_1_decimal(exact),
        code: code_of(exact),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassAverage {
    pub avg_raw: f64,
    pub avg_percent: f64,
    pub count: usize,
}

/// Mean of `marks` against `out_of`. The mean is rounded first and the
/// percentage is taken from the rounded mean. `None` when there are no marks.
pub fn class_average<I>(marks: I, out_of: f64) -> Option<ClassAverage>
where
    I: IntoIterator<Item = f64>,
{
    let mut count: usize = 0;
    let mut sum_raw: f64 = 0.0;
    for m in marks {
        count += 1;
        sum_raw += m;
    }
    if count == 0 {
        return None;
    }

    let avg_raw = round_off_1_decimal(sum_raw / (count as f64));
    Some(ClassAverage {
        avg_raw,
        avg_percent: round_off_1_decimal(percent_of(avg_raw, out_of)),
        count,
    })
}

/// Learner counts per code, indexed by `GradeCode::slot`.
pub fn code_counts<I>(codes: I) -> [usize; 7]
where
    I: IntoIterator<Item = GradeCode>,
{
    let mut counts = [0usize; 7];
    for c in codes {
        counts[c.slot()] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_off_half_up() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(66.666_666), 66.7);
        assert_eq!(format_1_decimal(80.0), "80.0");
    }

    #[test]
    fn parse_mark_degrades_to_zero() {
        assert_eq!(parse_mark(""), 0.0);
        assert_eq!(parse_mark("   "), 0.0);
        assert_eq!(parse_mark("abc"), 0.0);
        assert_eq!(parse_mark("inf"), 0.0);
        assert_eq!(parse_mark(" 7.5 "), 7.5);
    }

    #[test]
    fn code_thresholds_are_inclusive() {
        assert_eq!(code_of(100.0).as_str(), "7");
        assert_eq!(code_of(80.0).as_str(), "7");
        assert_eq!(code_of(79.9999).as_str(), "6");
        assert_eq!(code_of(70.0).as_str(), "6");
        assert_eq!(code_of(60.0).as_str(), "5");
        assert_eq!(code_of(50.0).as_str(), "4");
        assert_eq!(code_of(40.0).as_str(), "3");
        assert_eq!(code_of(30.0).as_str(), "2");
        assert_eq!(code_of(29.9).as_str(), "1");
        assert_eq!(code_of(0.0).as_str(), "1");
        assert_eq!(code_of(-5.0).as_str(), "1");
    }

    #[test]
    fn boundary_ratio_bands() {
        assert_eq!(score_of("8", 10.0).code.as_str(), "7");
        assert_eq!(score_of("0.799999", 1.0).code.as_str(), "6");
        assert_eq!(score_of("24", 30.0).code.as_str(), "7");
    }

    #[test]
    fn code_is_monotonic_in_mark() {
        let highest = GradeCode::all().last().expect("seven codes");
        for out_of in [10.0, 20.0, 30.0] {
            let mut prev = GradeCode::LOWEST;
            let steps = (out_of as usize) * 10;
            for i in 0..=steps {
                let mark = (i as f64) / 10.0;
                let s = score_of(&mark.to_string(), out_of);
                assert!(s.code >= prev, "code dropped at mark {mark}/{out_of}");
                assert!(s.code >= GradeCode::LOWEST && s.code <= highest);
                prev = s.code;
            }
            assert_eq!(prev, highest);
        }
    }

    #[test]
    fn blank_mark_scores_zero() {
        let s = score_of("", 30.0);
        assert_eq!(s.mark, 0.0);
        assert_eq!(format_1_decimal(s.percentage), "0.0");
        assert_eq!(s.code.as_str(), "1");
    }

    #[test]
    fn class_average_rounds_mean_before_percent() {
        let avg = class_average([10.0, 8.0, 6.0], 10.0).expect("average");
        assert_eq!(avg.avg_raw, 8.0);
        assert_eq!(format_1_decimal(avg.avg_percent), "80.0");
        assert_eq!(avg.count, 3);

        // 7.25 -> 7.3 -> 24.3% of 30
        let avg = class_average([7.0, 7.5], 30.0).expect("average");
        assert_eq!(avg.avg_raw, 7.3);
        assert_eq!(avg.avg_percent, 24.3);
    }

    #[test]
    fn class_average_of_nothing_is_none() {
        assert!(class_average(std::iter::empty(), 10.0).is_none());
    }

    #[test]
    fn code_counts_tally_by_code() {
        let counts = code_counts([code_of(95.0), code_of(81.0), code_of(10.0)]);
        assert_eq!(counts, [1, 0, 0, 0, 0, 0, 2]);
        assert_eq!(GradeCode::all().count(), 7);
    }

    #[test]
    fn code_serializes_as_string() {
        let v = serde_json::to_value(code_of(55.0)).expect("serialize");
        assert_eq!(v, serde_json::json!("4"));
    }
}
