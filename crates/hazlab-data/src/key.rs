//! Composite cache keys.
//!
//! A hazard curve is addressed by intensity measure type, location code, and
//! a selector that is either a realization index or an aggregate statistic
//! label. The string form is `"{imt}:{location}:{selector}"` with realization
//! indices zero padded to five digits, e.g. `PGA:-41.300~174.780:00003`.

use crate::{HazardError, Result};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Field delimiter in encoded keys.
pub const DELIMITER: char = ':';

/// Width realization indices are zero padded to.
pub const REALIZATION_WIDTH: usize = 5;

/// Which family of curves a selector addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectorKind {
    /// Individual logic-tree realizations.
    Realization,
    /// Aggregate statistics across realizations.
    Aggregate,
}

impl SelectorKind {
    /// Lowercase name, used in logs and metric labels.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Realization => "realization",
            SelectorKind::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A realization index of any magnitude.
///
/// Held as its decimal digits without leading zeros, so every digit string
/// is a valid index. Ordering is numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealizationIndex(String);

impl RealizationIndex {
    /// Parse a string of ASCII digits. Leading zeros are dropped.
    pub fn parse(s: &str) -> Option<Self> {
        if !is_digits(s) {
            return None;
        }
        let trimmed = s.trim_start_matches('0');
        Some(Self(if trimmed.is_empty() { "0" } else { trimmed }.to_string()))
    }

    /// Decimal digits without padding.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// The index as a `u32`, if it fits.
    pub fn as_u32(&self) -> Option<u32> {
        self.0.parse().ok()
    }
}

impl Ord for RealizationIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for RealizationIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RealizationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0>width$}", self.0, width = REALIZATION_WIDTH)
    }
}

impl From<u32> for RealizationIndex {
    fn from(idx: u32) -> Self {
        Self(idx.to_string())
    }
}

impl From<u64> for RealizationIndex {
    fn from(idx: u64) -> Self {
        Self(idx.to_string())
    }
}

/// Third key field: a realization index or an aggregate label.
///
/// Classification happens once, when the selector is built. A string made
/// up entirely of ASCII digits is a realization index; anything else
/// (including `""`) is an aggregate label such as `"mean"` or `"0.9"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selector {
    /// Realization index.
    Realization(RealizationIndex),
    /// Aggregate statistic label.
    Aggregate(String),
}

impl Selector {
    /// Classify a selector string. Never fails.
    pub fn parse(s: &str) -> Self {
        match RealizationIndex::parse(s) {
            Some(idx) => Selector::Realization(idx),
            None => Selector::Aggregate(s.to_string()),
        }
    }

    /// Create a realization selector.
    pub fn realization(idx: impl Into<RealizationIndex>) -> Self {
        Selector::Realization(idx.into())
    }

    /// Create an aggregate selector without classification.
    pub fn aggregate(label: impl Into<String>) -> Self {
        Selector::Aggregate(label.into())
    }

    /// The family this selector belongs to.
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::Realization(_) => SelectorKind::Realization,
            Selector::Aggregate(_) => SelectorKind::Aggregate,
        }
    }

    /// Returns true for realization indices.
    pub fn is_realization(&self) -> bool {
        matches!(self, Selector::Realization(_))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Realization(idx) => fmt::Display::fmt(idx, f),
            Selector::Aggregate(label) => f.write_str(label),
        }
    }
}

impl From<u32> for Selector {
    fn from(idx: u32) -> Self {
        Selector::realization(idx)
    }
}

impl From<u64> for Selector {
    fn from(idx: u64) -> Self {
        Selector::realization(idx)
    }
}

impl From<RealizationIndex> for Selector {
    fn from(idx: RealizationIndex) -> Self {
        Selector::Realization(idx)
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Selector::parse(s)
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::parse(&s)
    }
}

impl From<&Selector> for Selector {
    fn from(s: &Selector) -> Self {
        s.clone()
    }
}

impl FromStr for Selector {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Infallible> {
        Ok(Selector::parse(s))
    }
}

/// A decoded cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    /// Intensity measure type, e.g. `PGA` or `SA(0.5)`.
    pub imt: String,
    /// Location code, e.g. `-41.300~174.780`.
    pub location: String,
    /// Realization index or aggregate label.
    pub selector: Selector,
}

impl Key {
    /// Build a key from its parts.
    pub fn new(
        imt: impl Into<String>,
        location: impl Into<String>,
        selector: impl Into<Selector>,
    ) -> Self {
        Self {
            imt: imt.into(),
            location: location.into(),
            selector: selector.into(),
        }
    }

    /// The fetch group this key belongs to.
    pub fn group(&self) -> GroupKey {
        GroupKey {
            location: self.location.clone(),
            kind: self.selector.kind(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.imt,
            self.location,
            self.selector,
            d = DELIMITER
        )
    }
}

impl FromStr for Key {
    type Err = HazardError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

/// Batch granularity of remote fetches: one location, one selector family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    /// Location code.
    pub location: String,
    /// Selector family.
    pub kind: SelectorKind,
}

/// Encode a key string from its parts.
pub fn encode(imt: &str, location: &str, selector: impl Into<Selector>) -> String {
    Key::new(imt, location, selector).to_string()
}

/// Decode a key string into its parts.
pub fn decode(key: &str) -> Result<Key> {
    let malformed = || HazardError::MalformedKey { key: key.to_string() };

    let mut parts = key.split(DELIMITER);
    let fields = (parts.next(), parts.next(), parts.next(), parts.next());
    let (imt, location, selector) = match fields {
        (Some(imt), Some(location), Some(selector), None) => (imt, location, selector),
        _ => return Err(malformed()),
    };

    Ok(Key {
        imt: imt.to_string(),
        location: location.to_string(),
        selector: Selector::parse(selector),
    })
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_realization() {
        assert_eq!(encode("PGA", "-41.300~174.780", 3u32), "PGA:-41.300~174.780:00003");
        assert_eq!(encode("PGA", "-41.300~174.780", "3"), "PGA:-41.300~174.780:00003");
        assert_eq!(encode("PGA", "-41.300~174.780", "00003"), "PGA:-41.300~174.780:00003");
    }

    #[test]
    fn test_encode_aggregate_verbatim() {
        let loc = "-36.870~174.770";
        assert_eq!(encode("SA(0.5)", loc, "mean"), "SA(0.5):-36.870~174.770:mean");
        assert_eq!(encode("SA(0.5)", loc, "0.9"), "SA(0.5):-36.870~174.770:0.9");
    }

    #[test]
    fn test_decode() {
        let key = decode("PGA:-41.300~174.780:00003").unwrap();
        assert_eq!(key.imt, "PGA");
        assert_eq!(key.location, "-41.300~174.780");
        assert_eq!(key.selector, Selector::from(3u32));
        assert_eq!(key.selector.to_string(), "00003");
    }

    #[test]
    fn test_decode_wrong_field_count() {
        for bad in ["PGA", "PGA:-41.300~174.780", "PGA:a:b:c", ""] {
            match decode(bad) {
                Err(HazardError::MalformedKey { key }) => assert_eq!(key, bad),
                other => panic!("expected MalformedKey for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_long_realization_index_round_trips() {
        let encoded = encode("PGA", "-41.300~174.780", "99999999999");
        assert_eq!(encoded, "PGA:-41.300~174.780:99999999999");

        let key = decode(&encoded).unwrap();
        assert!(key.selector.is_realization());
        assert_eq!(key.selector, Selector::from(99_999_999_999u64));
        assert_eq!(key.to_string(), encoded);

        let huge = "123456789012345678901234567890";
        let key = decode(&encode("PGA", "loc", huge)).unwrap();
        assert_eq!(key.selector.kind(), SelectorKind::Realization);
        assert_eq!(key.selector.to_string(), huge);
    }

    #[test]
    fn test_realization_index() {
        let idx = RealizationIndex::parse("00042").unwrap();
        assert_eq!(idx.digits(), "42");
        assert_eq!(idx.as_u32(), Some(42));
        assert_eq!(idx.to_string(), "00042");
        assert_eq!(RealizationIndex::parse("0000").unwrap().digits(), "0");
        assert_eq!(RealizationIndex::parse("99999999999").unwrap().as_u32(), None);
        assert!(RealizationIndex::parse("4a").is_none());
        assert!(RealizationIndex::parse("").is_none());

        // Numeric, not lexicographic, order.
        assert!(RealizationIndex::from(9u32) < RealizationIndex::from(10u32));
        assert!(RealizationIndex::from(u32::MAX) < RealizationIndex::from(u64::MAX));
    }

    #[test]
    fn test_selector_classification() {
        assert_eq!(Selector::parse("12"), Selector::realization(12u32));
        assert_eq!(Selector::parse("012"), Selector::realization(12u32));
        assert_eq!(Selector::parse("mean"), Selector::aggregate("mean"));
        assert_eq!(Selector::parse("0.5"), Selector::aggregate("0.5"));
        assert_eq!(Selector::parse(""), Selector::aggregate(""));
        assert_eq!(Selector::parse("-1"), Selector::aggregate("-1"));
        assert_eq!(Selector::from("cov").kind(), SelectorKind::Aggregate);
        assert!(Selector::from(7u32).is_realization());
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            ("PGA", "-41.300~174.780", "mean", "mean"),
            ("SA(3.0)", "-43.530~172.630", "0.995", "0.995"),
            ("SA(0.2)", "-45.870~170.500", "42", "00042"),
            ("PGA", "-36.870~174.770", "123456", "123456"),
            ("PGA", "-36.870~174.770", "4294967296", "4294967296"),
        ];
        for (imt, loc, sel, expected) in cases {
            let key = decode(&encode(imt, loc, sel)).unwrap();
            assert_eq!(key.imt, imt);
            assert_eq!(key.location, loc);
            assert_eq!(key.selector.to_string(), expected);
        }
    }

    #[test]
    fn test_group_ignores_imt() {
        let a = Key::new("PGA", "-41.300~174.780", 1u32);
        let b = Key::new("SA(0.5)", "-41.300~174.780", 2u32);
        let c = Key::new("PGA", "-41.300~174.780", "mean");
        assert_eq!(a.group(), b.group());
        assert_ne!(a.group(), c.group());
    }
}
