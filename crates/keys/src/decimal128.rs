use std::cmp::Ordering;
use std::fmt;

/// A 128-bit decimal value. Unlike IEEE-754 floats, `Decimal128` has a
/// single canonical NaN and decimal (not binary) ordering: every NaN
/// compares equal to every other NaN and greater than every finite value
/// (spec §4.7), so `Decimal128` participates in a total order where
/// `Float`/`Double` only have a partial one.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum Decimal128 {
    Nan,
    Finite {
        negative: bool,
        // Unscaled coefficient; the represented value is
        // `coefficient * 10^exponent`, negated if `negative`.
        coefficient: u128,
        exponent: i16,
    },
}

impl Decimal128 {
    pub fn zero() -> Decimal128 {
        Decimal128::Finite {
            negative: false,
            coefficient: 0,
            exponent: 0,
        }
    }

    pub fn is_nan(self) -> bool {
        matches!(self, Decimal128::Nan)
    }

    /// A lossy `f64` approximation, for cross-kind numeric comparison
    /// against `Int`/`Float`/`Double` (spec §4.1's numeric comparability
    /// table). Exact decimal ordering within `Decimal128` itself never
    /// goes through this -- only [`Ord`] does.
    pub fn to_f64_approx(self) -> f64 {
        match self {
            Decimal128::Nan => f64::NAN,
            Decimal128::Finite { negative, coefficient, exponent } => {
                let magnitude = coefficient as f64 * 10f64.powi(exponent as i32);
                if negative {
                    -magnitude
                } else {
                    magnitude
                }
            }
        }
    }

    /// Parses decimal syntax (`"1.23e45"`) or the symbolic constants
    /// `+inf`/`-inf`/`nan` (spec §4.1). `Decimal128` has no signed
    /// infinities of its own, so `+inf`/`-inf` are rejected here; only
    /// `nan` maps onto the canonical `Decimal128::Nan`.
    pub fn parse(text: &str) -> Option<Decimal128> {
        if text.eq_ignore_ascii_case("nan") {
            return Some(Decimal128::Nan);
        }
        if text.eq_ignore_ascii_case("+inf") || text.eq_ignore_ascii_case("-inf") {
            return None;
        }

        let (negative, text) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (mantissa, exponent) = match text.split_once(['e', 'E']) {
            Some((m, e)) => (m, e.parse::<i16>().ok()?),
            None => (text, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let digits: String = format!("{int_part}{frac_part}");
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let coefficient: u128 = if digits.is_empty() {
            0
        } else {
            digits.parse().ok()?
        };
        let exponent = exponent - frac_part.len() as i16;

        Some(Decimal128::Finite {
            negative,
            coefficient,
            exponent,
        })
    }
}

impl PartialEq for Decimal128 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Decimal128 {}

impl PartialOrd for Decimal128 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal128 {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Decimal128::Nan, Decimal128::Nan) => Ordering::Equal,
            (Decimal128::Nan, _) => Ordering::Greater,
            (_, Decimal128::Nan) => Ordering::Less,
            (
                Decimal128::Finite {
                    negative: ln,
                    coefficient: lc,
                    exponent: le,
                },
                Decimal128::Finite {
                    negative: rn,
                    coefficient: rc,
                    exponent: re,
                },
            ) => {
                // Normalize zero sign so -0 == 0.
                let lz = *lc == 0;
                let rz = *rc == 0;
                let ln = *ln && !lz;
                let rn = *rn && !rz;

                match (ln, rn) {
                    (false, true) => Ordering::Greater,
                    (true, false) => Ordering::Less,
                    (false, false) => cmp_magnitude(*lc, *le, *rc, *re),
                    (true, true) => cmp_magnitude(*lc, *le, *rc, *re).reverse(),
                }
            }
        }
    }
}

// Compares two non-negative (coefficient, exponent) magnitudes by scaling
// the smaller exponent up to match the larger, within u128 headroom. Since
// Decimal128's realistic coefficient range fits comfortably under 10^34,
// this never overflows for values this store will actually compare.
fn cmp_magnitude(lc: u128, le: i16, rc: u128, re: i16) -> Ordering {
    match le.cmp(&re) {
        Ordering::Equal => lc.cmp(&rc),
        Ordering::Less => {
            let scale = (re - le) as u32;
            match 10u128.checked_pow(scale).and_then(|f| rc.checked_mul(f)) {
                Some(scaled) => lc.cmp(&scaled),
                None => Ordering::Less,
            }
        }
        Ordering::Greater => {
            let scale = (le - re) as u32;
            match 10u128.checked_pow(scale).and_then(|f| lc.checked_mul(f)) {
                Some(scaled) => scaled.cmp(&rc),
                None => Ordering::Greater,
            }
        }
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decimal128::Nan => write!(f, "NaN"),
            Decimal128::Finite {
                negative,
                coefficient,
                exponent,
            } => {
                if *negative {
                    write!(f, "-")?;
                }
                write!(f, "{coefficient}e{exponent}")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_and_order() {
        let a = Decimal128::parse("1.23e45").unwrap();
        let b = Decimal128::parse("1.24e45").unwrap();
        assert!(a < b);

        let c = Decimal128::parse("123e43").unwrap();
        assert_eq!(a.cmp(&c), Ordering::Equal);
    }

    #[test]
    fn test_nan_is_canonical_and_greatest() {
        let nan = Decimal128::parse("NaN").unwrap();
        let finite = Decimal128::parse("0").unwrap();
        assert_eq!(nan, Decimal128::Nan);
        assert!(nan > finite);
        assert_eq!(nan.cmp(&nan), Ordering::Equal);
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        let neg_zero = Decimal128::Finite {
            negative: true,
            coefficient: 0,
            exponent: 0,
        };
        assert_eq!(neg_zero, Decimal128::zero());
    }
}
