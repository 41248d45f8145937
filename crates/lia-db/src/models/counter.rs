//! Base-36 odometer counter

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A short, ever-growing identifier: `0`, `1`, ..., `z`, `10`, `11`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    current: String,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            current: "0".to_string(),
        }
    }
}

impl Counter {
    /// Resume from a stored value. `None` if it contains anything other than
    /// lowercase base-36 digits.
    #[must_use]
    pub fn from_value(value: impl Into<String>) -> Option<Self> {
        let current = value.into();
        let valid = !current.is_empty()
            && current
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase());
        valid.then_some(Self { current })
    }

    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Advance by one and return the new value
    pub fn increment(&mut self) -> &str {
        self.current = next_value(&self.current);
        &self.current
    }
}

/// Successor of `value`, carrying from the rightmost digit leftwards
#[must_use]
pub fn next_value(value: &str) -> String {
    let mut digits: Vec<u8> = value.bytes().collect();

    for digit in digits.iter_mut().rev() {
        let index = DIGITS.iter().position(|d| *d == *digit).unwrap_or(0);
        if index + 1 < DIGITS.len() {
            *digit = DIGITS[index + 1];
            return String::from_utf8_lossy(&digits).into_owned();
        }
        *digit = b'0';
    }

    // every digit wrapped: grow by one
    let mut grown = Vec::with_capacity(digits.len() + 1);
    grown.push(b'1');
    grown.extend_from_slice(&digits);
    String::from_utf8_lossy(&grown).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_steps() {
        assert_eq!(next_value("0"), "1");
        assert_eq!(next_value("9"), "a");
        assert_eq!(next_value("y"), "z");
    }

    #[test]
    fn test_carry() {
        assert_eq!(next_value("z"), "10");
        assert_eq!(next_value("1z"), "20");
        assert_eq!(next_value("zz"), "100");
        assert_eq!(next_value("a9z"), "aa0");
    }

    #[test]
    fn test_long_values_do_not_recurse() {
        let value = "z".repeat(10_000);
        let next = next_value(&value);
        assert_eq!(next.len(), 10_001);
        assert!(next.starts_with('1'));
    }

    #[test]
    fn test_counter_sequence() {
        let mut counter = Counter::default();
        let seen: Vec<String> = (0..37).map(|_| counter.increment().to_string()).collect();
        assert_eq!(seen[0], "1");
        assert_eq!(seen[34], "z");
        assert_eq!(seen[35], "10");
        assert_eq!(counter.current(), "11");
    }

    #[test]
    fn test_from_value_validates() {
        assert_eq!(Counter::from_value("a1").unwrap().current(), "a1");
        assert!(Counter::from_value("").is_none());
        assert!(Counter::from_value("A1").is_none());
        assert!(Counter::from_value("a-1").is_none());
    }
}
