//! One-time passcode detection.
//!
//! # Example
//!
//! ```
//! use otp_forwarder::otp::find_otp;
//!
//! assert_eq!(find_otp("Your code is 123456.").unwrap(), "123456");
//! assert!(find_otp("Order #1234567 shipped").is_none());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Number of digits in a passcode.
pub const OTP_LEN: usize = 6;

// `\b` keeps longer digit runs (and codes glued to letters) from matching.
// Digits are ASCII only on purpose: `\d` would also accept other scripts.
static SIX_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{6})\b").expect("valid OTP regex"));

/// A passcode of exactly six ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OtpCode(String);

impl OtpCode {
    /// Validates `code` as a passcode.
    ///
    /// Returns `None` unless `code` is exactly six ASCII digits.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        (code.len() == OTP_LEN && code.bytes().all(|b| b.is_ascii_digit()))
            .then(|| Self(code.to_owned()))
    }

    /// Returns the digits as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OtpCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for OtpCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for OtpCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Finds the first six-digit passcode in `text`, scanning left to right.
///
/// The six digits must stand alone: a longer digit run does not match at any offset,
/// and neither do digits joined to letters or underscores.
#[must_use]
pub fn find_otp(text: &str) -> Option<OtpCode> {
    SIX_DIGITS
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| OtpCode::parse(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_code_in_sentence() {
        assert_eq!(find_otp("Your code is 123456.").unwrap(), "123456");
        assert_eq!(find_otp("Your code is 123456").unwrap(), "123456");
        assert_eq!(find_otp("123456").unwrap(), "123456");
    }

    #[test]
    fn test_output_is_a_fixed_point() {
        let code = find_otp("Code: 482913 (valid 5 min)").unwrap();
        assert_eq!(find_otp(code.as_str()), Some(code));
    }

    #[test]
    fn test_rejects_other_lengths() {
        assert!(find_otp("Code: 12345").is_none());
        assert!(find_otp("Order #1234567 shipped").is_none());
        assert!(find_otp("Card 4111111111111111").is_none());
    }

    #[test]
    fn test_rejects_split_digits() {
        assert!(find_otp("ids 12 3456").is_none());
        assert!(find_otp("123 456").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            find_otp("ref 9999999, code 111111, backup 222222").unwrap(),
            "111111"
        );
    }

    #[test]
    fn test_word_boundaries_around_letters() {
        assert!(find_otp("ABC123456").is_none());
        assert!(find_otp("123456_x").is_none());
        assert_eq!(find_otp("code:123456;").unwrap(), "123456");
        assert_eq!(find_otp("(123456)").unwrap(), "123456");
        assert_eq!(find_otp("12.3456789 then 654321").unwrap(), "654321");
    }

    #[test]
    fn test_non_ascii_digits_are_ignored() {
        // Arabic-Indic digits
        assert!(find_otp("\u{661}\u{662}\u{663}\u{664}\u{665}\u{666}").is_none());
    }

    #[test]
    fn test_code_next_to_non_breaking_space() {
        assert_eq!(find_otp("Code:\u{a0}246810").unwrap(), "246810");
    }

    #[test]
    fn test_parse_validates() {
        assert!(OtpCode::parse("123456").is_some());
        assert!(OtpCode::parse("12345").is_none());
        assert!(OtpCode::parse("1234567").is_none());
        assert!(OtpCode::parse("12345a").is_none());
        assert_eq!(OtpCode::parse("000042").unwrap().to_string(), "000042");
    }
}
