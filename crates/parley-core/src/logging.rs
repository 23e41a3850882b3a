//! Log formatting helpers.
//!
//! Public keys are 64 hex characters, which drowns structured log lines.
//! These wrappers print a recognisable prefix and suffix instead.

use std::fmt;

/// Shortened display of a hex key or address: first and last 4 characters.
pub struct ShortKey<'a>(pub &'a str);

impl<'a> fmt::Display for ShortKey<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        if s.len() > 12 && s.is_ascii() {
            write!(f, "{}...{}", &s[..4], &s[s.len() - 4..])
        } else {
            f.write_str(s)
        }
    }
}

impl<'a> fmt::Debug for ShortKey<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Display a byte payload as its length only.
pub struct ByteCount<'a>(pub &'a [u8]);

impl<'a> fmt::Display for ByteCount<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} bytes]", self.0.len())
    }
}

impl<'a> fmt::Debug for ByteCount<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key() {
        let key = "0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF";
        assert_eq!(format!("{}", ShortKey(key)), "0123...CDEF");
    }

    #[test]
    fn test_short_key_passthrough() {
        assert_eq!(format!("{}", ShortKey("ABCD")), "ABCD");
    }

    #[test]
    fn test_byte_count() {
        assert_eq!(format!("{:?}", ByteCount(&[1, 2, 3])), "[3 bytes]");
    }
}
