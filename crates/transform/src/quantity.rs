//! Exact comparison of resource quantities (`1000m`, `1024Mi`, `1.5`, `2e3`).
//!
//! Values are normalized to an integer count of nano-units; anything finer is
//! rounded up, matching the precision the cluster itself keeps.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

const NANO_EXP: i64 = 9;
// 10^38 is the largest power of ten an i128 holds.
const MAX_POW10: i64 = 38;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity '{0}'")]
    Invalid(String),
    #[error("quantity '{0}' out of range")]
    Overflow(String),
}

/// A quantity expressed in nano-units (10^-9 of the base unit).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NanoQuantity(i128);

impl NanoQuantity {
    pub const ZERO: NanoQuantity = NanoQuantity(0);

    pub fn nanos(self) -> i128 { self.0 }

    pub fn parse(q: &Quantity) -> Result<Self, QuantityError> { q.0.parse() }
}

impl fmt::Display for NanoQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}n", self.0)
    }
}

enum Scale {
    Decimal(i64),
    Binary(u32),
}

fn parse_suffix(suffix: &str) -> Option<Scale> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(10),
        "Mi" => Scale::Binary(20),
        "Gi" => Scale::Binary(30),
        "Ti" => Scale::Binary(40),
        "Pi" => Scale::Binary(50),
        "Ei" => Scale::Binary(60),
        _ => {
            let exp = suffix.strip_prefix('e').or_else(|| suffix.strip_prefix('E'))?;
            let digits = exp.strip_prefix(&['+', '-'][..]).unwrap_or(exp);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            Scale::Decimal(exp.parse::<i32>().ok()? as i64)
        }
    };
    Some(scale)
}

fn ceil_div(n: i128, d: i128) -> i128 {
    n / d + i128::from(n % d != 0)
}

impl FromStr for NanoQuantity {
    type Err = QuantityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }
        let invalid = || QuantityError::Invalid(raw.to_string());
        let overflow = || QuantityError::Overflow(raw.to_string());

        let (negative, body) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };
        let num_end = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (number, suffix) = body.split_at(num_end);
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if frac_part.contains('.') {
            return Err(invalid());
        }
        let scale = parse_suffix(suffix).ok_or_else(invalid)?;

        let mut mantissa: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(b - b'0')))
                .ok_or_else(overflow)?;
        }
        let frac_digits = frac_part.len() as i64;

        let nanos = match scale {
            Scale::Decimal(exp) => {
                let pow = exp + NANO_EXP - frac_digits;
                if pow >= 0 {
                    if pow > MAX_POW10 && mantissa != 0 {
                        return Err(overflow());
                    }
                    let factor = 10i128.checked_pow(pow.min(MAX_POW10) as u32).ok_or_else(overflow)?;
                    mantissa.checked_mul(factor).ok_or_else(overflow)?
                } else if -pow > MAX_POW10 {
                    i128::from(mantissa != 0)
                } else {
                    ceil_div(mantissa, 10i128.pow((-pow) as u32))
                }
            }
            Scale::Binary(shift) => {
                let scaled = mantissa
                    .checked_mul(1i128 << shift)
                    .and_then(|m| m.checked_mul(10i128.pow(NANO_EXP as u32)))
                    .ok_or_else(overflow)?;
                if frac_digits > MAX_POW10 {
                    return Err(invalid());
                }
                ceil_div(scaled, 10i128.pow(frac_digits as u32))
            }
        };
        Ok(NanoQuantity(if negative { -nanos } else { nanos }))
    }
}
