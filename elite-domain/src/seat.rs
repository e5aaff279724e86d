use thiserror::Error;

/// Capacity assumed when the bus row is unknown.
pub const DEFAULT_CAPACITY: i64 = 50;

/// Columns per lettered row in the legacy seat scheme (A1..A10, B1..B10, ...).
const LEGACY_ROW_WIDTH: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeatError {
    #[error("Invalid seat number: {0}")]
    Invalid(String),

    #[error("Seat {seat} is outside 1..{capacity}")]
    OutOfRange { seat: i64, capacity: i64 },
}

/// A seat identifier reduced to its canonical number.
///
/// Accepted wire forms, trimmed and upper-cased: bare decimal (`38`, `038`),
/// `L`-prefixed decimal (`L38`), and the legacy `<row letter><column>` scheme
/// where `D8` means row D (zero-based 3), column 8, i.e. seat 38. Old rows may
/// still carry the legacy spelling, so equality checks against the store must
/// match both [`SeatKey::canonical`] and [`SeatKey::legacy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeatKey {
    number: i64,
}

impl SeatKey {
    pub fn parse(raw: &str, capacity: i64) -> Result<Self, SeatError> {
        let s = raw.trim().to_ascii_uppercase();

        let number = if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse::<i64>()
                .map_err(|_| SeatError::Invalid(raw.to_string()))?
        } else if let Some(rest) = s.strip_prefix('L') {
            if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SeatError::Invalid(raw.to_string()));
            }
            rest.parse::<i64>()
                .map_err(|_| SeatError::Invalid(raw.to_string()))?
        } else {
            Self::parse_legacy(&s).ok_or_else(|| SeatError::Invalid(raw.to_string()))?
        };

        if number < 1 || number > capacity {
            return Err(SeatError::OutOfRange {
                seat: number,
                capacity,
            });
        }

        Ok(Self { number })
    }

    pub fn parse_default(raw: &str) -> Result<Self, SeatError> {
        Self::parse(raw, DEFAULT_CAPACITY)
    }

    fn parse_legacy(s: &str) -> Option<i64> {
        let mut chars = s.chars();
        let row = chars.next()?;
        let cols = chars.as_str();

        if !row.is_ascii_uppercase() || cols.is_empty() || cols.len() > 2 {
            return None;
        }
        if !cols.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let col: i64 = cols.parse().ok()?;
        if !(1..=LEGACY_ROW_WIDTH).contains(&col) {
            return None;
        }

        Some((row as i64 - 'A' as i64) * LEGACY_ROW_WIDTH + col)
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    /// Canonical wire/store spelling: the bare decimal string.
    pub fn canonical(&self) -> String {
        self.number.to_string()
    }

    /// Legacy `<row letter><column>` spelling, used when comparing against
    /// rows written before canonicalization. None past row Z.
    pub fn legacy(&self) -> Option<String> {
        let row = (self.number - 1) / LEGACY_ROW_WIDTH;
        if !(0..26).contains(&row) {
            return None;
        }
        let col = (self.number - 1) % LEGACY_ROW_WIDTH + 1;
        Some(format!("{}{}", (b'A' + row as u8) as char, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_decimal() {
        assert_eq!(SeatKey::parse("38", 50).unwrap().canonical(), "38");
        assert_eq!(SeatKey::parse("038", 50).unwrap().canonical(), "38");
        assert_eq!(SeatKey::parse(" 7 ", 50).unwrap().canonical(), "7");
    }

    #[test]
    fn test_l_prefixed() {
        assert_eq!(SeatKey::parse("L38", 50).unwrap().canonical(), "38");
        assert_eq!(SeatKey::parse("l05", 50).unwrap().canonical(), "5");
    }

    #[test]
    fn test_legacy_rows() {
        assert_eq!(SeatKey::parse("A1", 50).unwrap().canonical(), "1");
        assert_eq!(SeatKey::parse("d8", 50).unwrap().canonical(), "38");
        assert_eq!(SeatKey::parse("D10", 50).unwrap().canonical(), "40");
        assert_eq!(SeatKey::parse("E1", 50).unwrap().canonical(), "41");
    }

    #[test]
    fn test_rejects_garbage() {
        for raw in ["", "  ", "seat-9", "A0", "A11", "1A", "L", "-3", "D100"] {
            assert!(
                matches!(SeatKey::parse(raw, 50), Err(SeatError::Invalid(_))),
                "expected Invalid for {raw:?}"
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(
            SeatKey::parse("51", 50),
            Err(SeatError::OutOfRange {
                seat: 51,
                capacity: 50
            })
        );
        assert_eq!(
            SeatKey::parse("0", 50),
            Err(SeatError::OutOfRange {
                seat: 0,
                capacity: 50
            })
        );
        // Wider bus accepts the same seat.
        assert!(SeatKey::parse("51", 60).is_ok());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in ["38", "038", "L38", "D8"] {
            let once = SeatKey::parse(raw, 50).unwrap().canonical();
            let twice = SeatKey::parse(&once, 50).unwrap().canonical();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_legacy_round_trip() {
        for n in 1..=50 {
            let key = SeatKey::parse(&n.to_string(), 50).unwrap();
            let legacy = key.legacy().unwrap();
            assert_eq!(SeatKey::parse(&legacy, 50).unwrap().number(), n);
        }
    }
}
