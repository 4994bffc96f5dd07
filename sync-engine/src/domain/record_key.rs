//! Record keys and the sortable key generator.
//!
//! Generated keys are 13 characters of a base-32 alphabet whose byte order
//! matches its numeric order, so lexical order of the encoded string equals
//! creation order. The encoded value is a 54-bit microsecond timestamp
//! followed by a 10-bit clock identifier.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use mockable::Clock;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sort-preserving base-32 alphabet.
const ALPHABET: &[u8; 32] = b"234567abcdefghijklmnopqrstuvwxyz";

/// Length of a generated timestamp key.
pub const TIMESTAMP_KEY_LEN: usize = 13;

/// Maximum length accepted for any record key.
pub const MAX_RECORD_KEY_LEN: usize = 512;

const CLOCK_ID_BITS: u32 = 10;
const CLOCK_ID_MASK: u64 = (1 << CLOCK_ID_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 54) - 1;

/// Validation errors returned by [`RecordKey::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKeyValidationError {
    /// The key was the empty string.
    Empty,
    /// The key exceeded [`MAX_RECORD_KEY_LEN`].
    TooLong { max: usize },
    /// The key was `.` or `..`.
    Reserved,
    /// The key held a character other than ASCII alphanumerics or `.-_:~`.
    InvalidCharacter { character: char },
}

impl fmt::Display for RecordKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "record key must not be empty"),
            Self::TooLong { max } => write!(f, "record key must be at most {max} characters"),
            Self::Reserved => write!(f, "record key must not be `.` or `..`"),
            Self::InvalidCharacter { character } => {
                write!(f, "record key contains invalid character `{character}`")
            }
        }
    }
}

impl std::error::Error for RecordKeyValidationError {}

/// Key identifying one record within a remote collection.
///
/// Keys minted by [`RecordKeyGenerator`] are timestamp keys; keys parsed from
/// remote URIs may use any syntactically valid form.
///
/// # Examples
/// ```
/// use sync_engine::domain::RecordKey;
///
/// let key = RecordKey::parse("3jzfcijpj2z2a").expect("valid key");
/// assert!(key.is_timestamp_key());
/// assert!(RecordKey::parse("..").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordKey(String);

impl RecordKey {
    /// Validate a record key string.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, RecordKeyValidationError> {
        Self::from_owned(raw.as_ref().to_owned())
    }

    fn from_owned(raw: String) -> Result<Self, RecordKeyValidationError> {
        if raw.is_empty() {
            return Err(RecordKeyValidationError::Empty);
        }
        if raw.len() > MAX_RECORD_KEY_LEN {
            return Err(RecordKeyValidationError::TooLong {
                max: MAX_RECORD_KEY_LEN,
            });
        }
        if raw == "." || raw == ".." {
            return Err(RecordKeyValidationError::Reserved);
        }
        if let Some(character) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '~')))
        {
            return Err(RecordKeyValidationError::InvalidCharacter { character });
        }
        Ok(Self(raw))
    }

    fn from_raw_value(value: u64) -> Self {
        let mut encoded = String::with_capacity(TIMESTAMP_KEY_LEN);
        for index in 0..TIMESTAMP_KEY_LEN {
            let shift = 5 * (TIMESTAMP_KEY_LEN - 1 - index);
            let digit = (value >> shift) & 0x1f;
            encoded.push(char::from(ALPHABET[digit as usize]));
        }
        Self(encoded)
    }

    /// Whether this key has the 13-character sortable timestamp shape.
    pub fn is_timestamp_key(&self) -> bool {
        self.0.len() == TIMESTAMP_KEY_LEN
            && self.0.bytes().all(|b| ALPHABET.contains(&b))
            && self.0.bytes().next().is_some_and(|b| b <= b'j')
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RecordKey> for String {
    fn from(value: RecordKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for RecordKey {
    type Error = RecordKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Process-local generator of strictly increasing timestamp keys.
///
/// When the clock has not advanced (or went backwards) since the previous
/// call, the next value is taken from the clock-identifier space of the last
/// emitted key before time is allowed to move on, so output never repeats or
/// decreases within one generator.
pub struct RecordKeyGenerator {
    clock: Arc<dyn Clock>,
    clock_id: u64,
    last: Mutex<u64>,
}

impl RecordKeyGenerator {
    /// Build a generator with a random clock identifier.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let clock_id = rand::thread_rng().gen_range(0..=CLOCK_ID_MASK);
        Self::with_clock_id(clock, clock_id)
    }

    /// Build a generator with a fixed clock identifier (masked to 10 bits).
    pub fn with_clock_id(clock: Arc<dyn Clock>, clock_id: u64) -> Self {
        Self {
            clock,
            clock_id: clock_id & CLOCK_ID_MASK,
            last: Mutex::new(0),
        }
    }

    /// Mint the next key.
    pub fn next_key(&self) -> RecordKey {
        let micros = u64::try_from(self.clock.utc().timestamp_micros()).unwrap_or(0) & TIMESTAMP_MASK;
        let candidate = (micros << CLOCK_ID_BITS) | self.clock_id;

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = if candidate > *last {
            candidate
        } else {
            last.saturating_add(1)
        };
        *last = next;
        RecordKey::from_raw_value(next)
    }
}

#[cfg(test)]
mod tests {
    //! Ordering and format coverage for generated keys.

    use super::*;
    use crate::test_support::MutableClock;
    use chrono::{TimeZone, Utc};
    use mockable::DefaultClock;
    use rstest::rstest;
    use std::time::Duration;

    fn fixed_clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
                .single()
                .expect("valid fixed time"),
        ))
    }

    #[rstest]
    fn ten_thousand_keys_are_strictly_increasing() {
        let generator = RecordKeyGenerator::new(Arc::new(DefaultClock));
        let keys: Vec<RecordKey> = (0..10_000).map(|_| generator.next_key()).collect();

        for pair in keys.windows(2) {
            assert!(
                pair[0].as_str() < pair[1].as_str(),
                "{} must sort before {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[rstest]
    fn stalled_clock_still_yields_increasing_keys() {
        let generator = RecordKeyGenerator::with_clock_id(fixed_clock(), 7);
        let first = generator.next_key();
        let second = generator.next_key();
        let third = generator.next_key();

        assert!(first < second);
        assert!(second < third);
    }

    #[rstest]
    fn clock_moving_backwards_does_not_reorder_keys() {
        let clock = fixed_clock();
        let generator = RecordKeyGenerator::with_clock_id(clock.clone(), 1);
        let before = generator.next_key();
        clock.rewind(Duration::from_secs(60));
        let after = generator.next_key();

        assert!(before < after);
    }

    #[rstest]
    fn generated_keys_have_timestamp_shape() {
        let generator = RecordKeyGenerator::new(Arc::new(DefaultClock));
        let key = generator.next_key();

        assert_eq!(key.as_str().len(), TIMESTAMP_KEY_LEN);
        assert!(key.is_timestamp_key(), "{key} should be a timestamp key");
        assert_eq!(RecordKey::parse(key.as_str()), Ok(key));
    }

    #[rstest]
    fn later_clock_sorts_later_across_generators() {
        let clock = fixed_clock();
        let high_id = RecordKeyGenerator::with_clock_id(clock.clone(), CLOCK_ID_MASK);
        let low_id = RecordKeyGenerator::with_clock_id(clock.clone(), 0);

        let earlier = high_id.next_key();
        clock.advance(Duration::from_micros(1));
        let later = low_id.next_key();

        assert!(earlier < later);
    }

    #[rstest]
    #[case::empty("", RecordKeyValidationError::Empty)]
    #[case::dot(".", RecordKeyValidationError::Reserved)]
    #[case::dot_dot("..", RecordKeyValidationError::Reserved)]
    #[case::slash("a/b", RecordKeyValidationError::InvalidCharacter { character: '/' })]
    fn rejects_malformed_keys(#[case] raw: &str, #[case] expected: RecordKeyValidationError) {
        assert_eq!(RecordKey::parse(raw), Err(expected));
    }

    #[rstest]
    fn accepts_non_timestamp_keys_from_remote_uris() {
        let key = RecordKey::parse("self").expect("literal keys are valid");
        assert!(!key.is_timestamp_key());
    }
}
