//! Resource quantity comparison.
//!
//! `Quantity` is a plain string on the wire, so `"1"`, `"1000m"` and `"1.0"` are
//! different values for `PartialEq` although the API server treats them as the
//! same amount. Quantities are parsed into `mantissa * 10^exponent` with the
//! mantissa stripped of trailing zeros, which makes equal amounts compare equal.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Canonical numeric value of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canonical {
    mantissa: i128,
    exponent: i32,
}

impl Canonical {
    /// `None` if stripping trailing zeros overflows the exponent.
    fn new(mantissa: i128, exponent: i32) -> Option<Self> {
        if mantissa == 0 {
            return Some(Self {
                mantissa: 0,
                exponent: 0,
            });
        }
        let mut mantissa = mantissa;
        let mut exponent = exponent;
        while mantissa % 10 == 0 {
            mantissa /= 10;
            exponent = exponent.checked_add(1)?;
        }
        Some(Self { mantissa, exponent })
    }
}

enum Suffix {
    Decimal(i32),
    Binary(u32),
}

fn parse_suffix(suffix: &str) -> Option<Suffix> {
    let suffix = match suffix {
        "" => Suffix::Decimal(0),
        "n" => Suffix::Decimal(-9),
        "u" => Suffix::Decimal(-6),
        "m" => Suffix::Decimal(-3),
        "k" => Suffix::Decimal(3),
        "M" => Suffix::Decimal(6),
        "G" => Suffix::Decimal(9),
        "T" => Suffix::Decimal(12),
        "P" => Suffix::Decimal(15),
        "E" => Suffix::Decimal(18),
        "Ki" => Suffix::Binary(1),
        "Mi" => Suffix::Binary(2),
        "Gi" => Suffix::Binary(3),
        "Ti" => Suffix::Binary(4),
        "Pi" => Suffix::Binary(5),
        "Ei" => Suffix::Binary(6),
        // Decimal exponent: "1e3", "1E-3"
        s if s.starts_with(['e', 'E']) => Suffix::Decimal(s[1..].parse().ok()?),
        _ => return None,
    };
    Some(suffix)
}

/// Parse a quantity string. Returns `None` if it is not a valid quantity or
/// does not fit the canonical representation.
pub fn parse(s: &str) -> Option<Canonical> {
    let s = s.trim();
    let (negative, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let split = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(split);

    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut mantissa: i128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        let digit = c.to_digit(10)?;
        mantissa = mantissa.checked_mul(10)?.checked_add(i128::from(digit))?;
    }
    let mut exponent = -i32::try_from(frac_part.len()).ok()?;

    match parse_suffix(suffix)? {
        Suffix::Decimal(e) => exponent = exponent.checked_add(e)?,
        Suffix::Binary(power) => {
            mantissa = mantissa.checked_mul(1024i128.checked_pow(power)?)?;
        }
    }

    if negative {
        mantissa = -mantissa;
    }
    Canonical::new(mantissa, exponent)
}

/// Compare two quantities by amount. Unparseable quantities compare by their raw text.
pub fn equal(a: &Quantity, b: &Quantity) -> bool {
    match (parse(&a.0), parse(&b.0)) {
        (Some(a), Some(b)) => a == b,
        _ => a.0 == b.0,
    }
}
