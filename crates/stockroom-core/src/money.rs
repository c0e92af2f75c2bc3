//! # Money Module
//!
//! Provides the `Money` and `Markup` types for price arithmetic.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  basePrice 19.99 × (1 + 15/100) in f64 = 22.988499999999998            │
//! │  rounded to 2 decimals                 = 22.99 (or 22.98 on a bad day)  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer cents + basis-point markup                       │
//! │    1999 × (10000 + 1500) / 10000 = 2298.85 → 2299 cents                 │
//! │    Rounding happens exactly once, on an exact rational value           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Spreadsheet cells and JSON inputs are parsed with [`Money::parse_decimal`],
//! which reads the decimal string directly and never goes through `f64`.
//!
//! ## Usage
//! ```rust
//! use stockroom_core::money::{Markup, Money};
//!
//! let base = Money::parse_decimal("19,99").unwrap();
//! let price = base.apply_markup(Markup::from_bps(1500)); // +15%
//! assert_eq!(price.cents(), 2299);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// The currency itself lives on the product; `Money` is currency-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the value as a decimal number of major units.
    ///
    /// For the JSON wire format only. Never feed the result back into
    /// arithmetic.
    pub fn as_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parses a decimal string such as `"12"`, `"12.5"`, `"12,50"` or `"-0.995"`.
    ///
    /// ## Rules
    /// - `,` is accepted as the decimal separator (spreadsheets from EU locales)
    /// - surrounding and inner whitespace is ignored
    /// - more than two fraction digits round half away from zero
    /// - anything else (letters, two separators, empty) yields `None`
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("12,5").unwrap().cents(), 1250);
    /// assert_eq!(Money::parse_decimal("0.125").unwrap().cents(), 13);
    /// assert!(Money::parse_decimal("twelve").is_none());
    /// ```
    pub fn parse_decimal(input: &str) -> Option<Money> {
        let cleaned: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == ',' { '.' } else { c })
            .collect();

        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };

        let mut parts = digits.split('.');
        let int_part = parts.next().unwrap_or_default();
        let frac_part = parts.next().unwrap_or_default();
        if parts.next().is_some() || (int_part.is_empty() && frac_part.is_empty()) {
            return None;
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };

        let frac_bytes = frac_part.as_bytes();
        let digit = |i: usize| frac_bytes.get(i).map(|b| (b - b'0') as i64).unwrap_or(0);
        let mut cents = whole.checked_mul(100)?.checked_add(digit(0) * 10 + digit(1))?;
        if digit(2) >= 5 {
            cents = cents.checked_add(1)?;
        }

        Some(Money(if negative { -cents } else { cents }))
    }

    /// Applies a markup and rounds to whole cents (half away from zero).
    ///
    /// `selling = base × (1 + markup%/100)` computed as
    /// `base_cents × (10000 + bps) / 10000`.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::{Markup, Money};
    ///
    /// let base = Money::from_cents(1000);
    /// assert_eq!(base.apply_markup(Markup::from_bps(2500)).cents(), 1250);
    /// assert_eq!(base.apply_markup(Markup::zero()).cents(), 1000);
    /// ```
    pub fn apply_markup(&self, markup: Markup) -> Money {
        let scaled = self.0 as i128 * (10_000 + markup.bps() as i128);
        let rounded = if scaled >= 0 {
            (scaled + 5_000) / 10_000
        } else {
            (scaled - 5_000) / 10_000
        };
        Money(rounded as i64)
    }
}

// =============================================================================
// Markup
// =============================================================================

/// Markup percentage in basis points (1 bps = 0.01%).
///
/// 2500 bps = 25% markup. Shares the basis-point convention of every other
/// rate in the system so percentages never pass through `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Markup(u32);

impl Markup {
    /// Creates a markup from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Markup(bps)
    }

    /// Zero markup (selling price equals base price).
    #[inline]
    pub const fn zero() -> Self {
        Markup(0)
    }

    /// Returns the markup in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the markup as a percentage (for display only).
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parses a percentage string (`"25"`, `"12,5"`, `"7.25"`).
    ///
    /// Negative or unreadable values yield `None`; callers fall back to the
    /// request default.
    pub fn parse_percent(input: &str) -> Option<Markup> {
        let hundredths = Money::parse_decimal(input)?.cents();
        u32::try_from(hundredths).ok().map(Markup)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering, e.g. `12.99` or `-5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
