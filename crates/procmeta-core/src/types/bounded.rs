//! Bounded, owned text fields.
//!
//! Every string that crosses the export boundary (module names, labels,
//! comments, section names) has a fixed capacity. The capacity `N` counts a
//! terminator slot the same way a fixed-size C buffer would, so a
//! `BoundedString<64>` holds at most 63 bytes of text.
//!
//! Two construction policies are available and callers pick one explicitly:
//!
//! - [`BoundedString::try_from_str`] rejects text that does not fit.
//! - [`BoundedString::from_str_truncated`] keeps the longest prefix that fits,
//!   cut on a UTF-8 character boundary.

use std::fmt;
use std::ops::Deref;

/// Capacity of a module name (name and extension together).
pub const MAX_MODULE_SIZE: usize = 64;
/// Capacity of a label.
pub const MAX_LABEL_SIZE: usize = 256;
/// Capacity of a comment.
pub const MAX_COMMENT_SIZE: usize = 512;
/// Capacity of a section name after escaping. One raw byte escapes to at most
/// four characters.
pub const MAX_SECTION_SIZE: usize = 50;

/// Owned string with a compile-time capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoundedString<const N: usize>
{
    text: String,
}

impl<const N: usize> BoundedString<N>
{
    /// Maximum number of text bytes this type can hold.
    pub const MAX_LEN: usize = N.saturating_sub(1);

    /// Empty string.
    #[must_use]
    pub const fn new() -> Self
    {
        Self { text: String::new() }
    }

    /// Copy `text` if it fits, `None` otherwise.
    ///
    /// ```rust
    /// use procmeta_core::types::BoundedString;
    ///
    /// assert!(BoundedString::<4>::try_from_str("abc").is_some());
    /// assert!(BoundedString::<4>::try_from_str("abcd").is_none());
    /// ```
    #[must_use]
    pub fn try_from_str(text: &str) -> Option<Self>
    {
        (text.len() <= Self::MAX_LEN).then(|| Self { text: text.to_owned() })
    }

    /// Copy the longest prefix of `text` that fits.
    ///
    /// ```rust
    /// use procmeta_core::types::BoundedString;
    ///
    /// let name = BoundedString::<4>::from_str_truncated("abcdef");
    /// assert_eq!(name.as_str(), "abc");
    /// ```
    #[must_use]
    pub fn from_str_truncated(text: &str) -> Self
    {
        let mut end = text.len().min(Self::MAX_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            text: text[..end].to_owned(),
        }
    }

    /// Whether `text` would be stored without truncation.
    #[must_use]
    pub fn fits(text: &str) -> bool
    {
        text.len() <= Self::MAX_LEN
    }

    #[must_use]
    pub fn as_str(&self) -> &str
    {
        &self.text
    }

    /// Reset to the defined empty state.
    pub fn clear(&mut self)
    {
        self.text.clear();
    }

    /// Replace the contents with `text`, truncating if needed.
    pub fn set_truncated(&mut self, text: &str)
    {
        *self = Self::from_str_truncated(text);
    }
}

impl<const N: usize> Deref for BoundedString<N>
{
    type Target = str;

    fn deref(&self) -> &str
    {
        &self.text
    }
}

impl<const N: usize> AsRef<str> for BoundedString<N>
{
    fn as_ref(&self) -> &str
    {
        &self.text
    }
}

impl<const N: usize> PartialEq<str> for BoundedString<N>
{
    fn eq(&self, other: &str) -> bool
    {
        self.text == other
    }
}

impl<const N: usize> PartialEq<&str> for BoundedString<N>
{
    fn eq(&self, other: &&str) -> bool
    {
        self.text == *other
    }
}

impl<const N: usize> fmt::Display for BoundedString<N>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.text)
    }
}
