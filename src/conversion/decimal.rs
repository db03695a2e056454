//! Fixed-point decimal values

use std::fmt;
use std::str::FromStr;

use crate::api::{ConnectorError, ConnectorResult};

/// Largest precision representable in a 16-byte mantissa
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// `mantissa * 10^-scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    pub mantissa: i128,
    pub scale: u8,
}

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self { mantissa, scale }
    }

    /// Re-expresses the value at `scale`, rounding half away from zero when
    /// digits are dropped.
    pub fn rescale(&self, scale: u8) -> Option<Decimal> {
        if scale >= self.scale {
            let factor = pow10(u32::from(scale - self.scale))?;
            let mantissa = self.mantissa.checked_mul(factor)?;
            return Some(Decimal { mantissa, scale });
        }

        let factor = pow10(u32::from(self.scale - scale))?;
        let quotient = self.mantissa / factor;
        let remainder = self.mantissa % factor;
        let mantissa = if remainder.abs() * 2 >= factor {
            quotient + self.mantissa.signum()
        } else {
            quotient
        };
        Some(Decimal { mantissa, scale })
    }

    /// Number of significant decimal digits of the mantissa
    pub fn digits(&self) -> u32 {
        let mut n = self.mantissa.unsigned_abs();
        let mut digits = 1;
        while n >= 10 {
            n /= 10;
            digits += 1;
        }
        digits
    }

    /// 16-byte little-endian two's complement mantissa
    pub fn to_le_bytes(&self) -> [u8; 16] {
        self.mantissa.to_le_bytes()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = usize::from(self.scale);
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

impl FromStr for Decimal {
    type Err = ConnectorError;

    fn from_str(s: &str) -> ConnectorResult<Self> {
        let malformed = || ConnectorError::Conversion(format!("malformed decimal '{}'", s));
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let scale = u8::try_from(frac_part.len()).map_err(|_| malformed())?;
        let digits = format!("{}{}", int_part, frac_part);
        let magnitude: i128 = digits.parse().map_err(|_| {
            ConnectorError::ValueOutOfTypeBounds(format!("decimal '{}' exceeds 128 bits", s))
        })?;
        let mantissa = if negative { -magnitude } else { magnitude };
        Ok(Decimal { mantissa, scale })
    }
}
