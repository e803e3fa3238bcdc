use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Participant identity. The treasury is an ordinary account.
pub type PlayerId = uuid::Uuid;

/// Base units per whole unit (9 decimal places).
pub const UNITS_PER_COIN: u64 = 1_000_000_000;

/// Funds in base units.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_base(base: u64) -> Self {
        Amount(base)
    }

    pub const fn to_base(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Floor half, used to split a fee between two refunds.
    pub const fn half(self) -> Amount {
        Amount(self.0 / 2)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_COIN;
        let frac = self.0 % UNITS_PER_COIN;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let frac = format!("{:09}", frac);
        write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = String;

    /// Parses a decimal amount like "0.01" with at most 9 fractional digits.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 9 {
            return Err(format!("at most 9 fractional digits supported: {}", s));
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| format!("invalid amount: {}", s))?
        };
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<9}", frac);
            padded.parse().map_err(|_| format!("invalid amount: {}", s))?
        };
        whole
            .checked_mul(UNITS_PER_COIN)
            .and_then(|w| w.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(|| format!("amount out of range: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::from_base(10_000_000).to_string(), "0.01");
        assert_eq!(Amount::from_base(19_000_000).to_string(), "0.019");
        assert_eq!(Amount::from_base(UNITS_PER_COIN).to_string(), "1");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn test_amount_parse() {
        assert_eq!("0.01".parse::<Amount>().unwrap(), Amount::from_base(10_000_000));
        assert_eq!("1".parse::<Amount>().unwrap(), Amount::from_base(UNITS_PER_COIN));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount::from_base(500_000_000));
        assert!("0.0000000001".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_checked_math() {
        let a = Amount::from_base(u64::MAX);
        assert!(a.checked_add(Amount::from_base(1)).is_none());
        assert!(a.checked_mul(2).is_none());
        assert_eq!(
            Amount::from_base(3).checked_sub(Amount::from_base(5)),
            None
        );
        assert_eq!(Amount::from_base(5).half(), Amount::from_base(2));
    }
}
