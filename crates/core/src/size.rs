//! Human-readable byte sizes (spec §4.7), ground truth in
//! `examples/original_source/units/size/filesize.go`.
//!
//! IEC-style units: `1 KB = 1024 B`, and so on through `PB`. Parsing accepts
//! an optional unit suffix with optional whitespace before it; no suffix
//! means bytes. Negative and fractional values are rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;
const PB: u64 = TB * 1024;

const UNITS: [(u64, &str); 6] = [
    (PB, "PB"),
    (TB, "TB"),
    (GB, "GB"),
    (MB, "MB"),
    (KB, "KB"),
    (1, "B"),
];

/// A byte count with IEC-unit parsing and formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Size(pub u64);

impl Size {
    pub const fn bytes(n: u64) -> Self {
        Size(n)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Error returned when a string cannot be parsed as a [`Size`].
#[derive(Debug, thiserror::Error)]
#[error("could not parse '{0}' as a size")]
pub struct ParseSizeError(pub String);

impl FromStr for Size {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // KB/MB/GB/TB/PB before the bare "B" suffix, so "10 KB" isn't
        // mistaken for a malformed "10 K" + "B".
        for (mult, suffix) in UNITS.iter().filter(|(_, s)| *s != "B") {
            if let Some(rest) = trimmed.strip_suffix(suffix) {
                let n = parse_unsigned_int(rest.trim_end())?;
                return Ok(Size(n * mult));
            }
        }
        if let Some(rest) = trimmed.strip_suffix('B') {
            let n = parse_unsigned_int(rest.trim_end())?;
            return Ok(Size(n));
        }
        let n = parse_unsigned_int(trimmed)?;
        Ok(Size(n))
    }
}

fn parse_unsigned_int(s: &str) -> Result<u64, ParseSizeError> {
    if s.is_empty() || s.starts_with('-') || s.contains('.') {
        return Err(ParseSizeError(s.to_string()));
    }
    s.parse::<u64>().map_err(|_| ParseSizeError(s.to_string()))
}

impl TryFrom<String> for Size {
    type Error = ParseSizeError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Size> for String {
    fn from(s: Size) -> Self {
        s.to_string()
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n == 0 {
            return write!(f, "0 B");
        }
        for (unit, name) in UNITS {
            if n >= unit {
                return if n % unit == 0 {
                    write!(f, "{} {}", n / unit, name)
                } else {
                    write!(f, "{:.2} {}", n as f64 / unit as f64, name)
                };
            }
        }
        unreachable!("1 B always matches n >= 1 for n > 0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_bytes() {
        assert_eq!("1024".parse::<Size>().unwrap(), Size(1024));
        assert_eq!("0".parse::<Size>().unwrap(), Size(0));
    }

    #[test]
    fn parses_each_suffix() {
        assert_eq!("10 KB".parse::<Size>().unwrap(), Size(10 * KB));
        assert_eq!("10MB".parse::<Size>().unwrap(), Size(10 * MB));
        assert_eq!("1GB".parse::<Size>().unwrap(), Size(GB));
        assert_eq!("2 TB".parse::<Size>().unwrap(), Size(2 * TB));
        assert_eq!("1PB".parse::<Size>().unwrap(), Size(PB));
        assert_eq!("5B".parse::<Size>().unwrap(), Size(5));
    }

    #[test]
    fn rejects_negative_and_fractional() {
        assert!("-10".parse::<Size>().is_err());
        assert!("-10MB".parse::<Size>().is_err());
        assert!("10.5".parse::<Size>().is_err());
        assert!("10.5MB".parse::<Size>().is_err());
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert!("10XB".parse::<Size>().is_err());
        assert!("abc".parse::<Size>().is_err());
    }

    #[test]
    fn formats_exact_and_fractional() {
        assert_eq!(Size(0).to_string(), "0 B");
        assert_eq!(Size(512).to_string(), "512 B");
        assert_eq!(Size(10 * KB).to_string(), "10 KB");
        assert_eq!(Size(10 * KB + 512).to_string(), "10.50 KB");
        assert_eq!(Size(GB).to_string(), "1 GB");
    }

    #[test]
    fn parse_format_round_trips_on_exact_units() {
        for n in [0u64, 1, 512, 1024, 10 * MB, 3 * GB, PB] {
            let s = Size(n).to_string();
            assert_eq!(s.parse::<Size>().unwrap(), Size(n), "round trip for {n}");
        }
    }
}
