use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Granularity, Result, Selector};

/// The representation an autonumbered field stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// The allocated integer, unchanged.
    Integer,
    /// The allocated integer behind an optional prefix and zero padding.
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::String => "string",
        })
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "integer" | "number" => Ok(Self::Integer),
            "string" => Ok(Self::String),
            other => Err(Error::config(format!(
                "unsupported autonumber value type `{other}` (expected integer or string)"
            ))),
        }
    }
}

/// How one field of an entity is numbered.
///
/// Built once per field when an entity is registered and never mutated
/// afterwards.
///
/// # Example
///
/// ```
/// use autonumber::{FieldSpec, Granularity, Selector};
///
/// let field = FieldSpec::string("number")
///     .group(Selector::path("customer.id"))
///     .period(Granularity::Year)
///     .prefix(Selector::literal("INV-"))
///     .leading_zeros(10);
/// assert!(field.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct FieldSpec {
    path: String,
    value_type: ValueType,
    numerator: Option<String>,
    group: Option<Selector>,
    period: Option<Granularity>,
    date: Option<Selector>,
    prefix: Option<Selector>,
    add_leading_zeros: bool,
    length: Option<usize>,
    max_length: Option<usize>,
}

impl FieldSpec {
    /// A field that receives the allocated integer as is.
    pub fn integer(path: impl Into<String>) -> Self {
        Self::new(path, ValueType::Integer)
    }

    /// A field that receives a formatted string.
    pub fn string(path: impl Into<String>) -> Self {
        Self::new(path, ValueType::String)
    }

    pub fn new(path: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            path: path.into(),
            value_type,
            numerator: None,
            group: None,
            period: None,
            date: None,
            prefix: None,
            add_leading_zeros: false,
            length: None,
            max_length: None,
        }
    }

    /// Overrides the default `"<entity>.<path>"` numerator.
    #[must_use]
    pub fn numerator(mut self, numerator: impl Into<String>) -> Self {
        self.numerator = Some(numerator.into());
        self
    }

    /// Partitions the sequence by the selected value.
    #[must_use]
    pub fn group(mut self, selector: Selector) -> Self {
        self.group = Some(selector);
        self
    }

    /// Restarts the sequence every `granularity`.
    #[must_use]
    pub const fn period(mut self, granularity: Granularity) -> Self {
        self.period = Some(granularity);
        self
    }

    /// Selects the date used for period bucketing. Defaults to now.
    #[must_use]
    pub fn date(mut self, selector: Selector) -> Self {
        self.date = Some(selector);
        self
    }

    /// Prepends the selected text. Does not partition the sequence.
    #[must_use]
    pub fn prefix(mut self, selector: Selector) -> Self {
        self.prefix = Some(selector);
        self
    }

    /// Left-pads the number with zeros up to `length` characters, prefix
    /// included.
    #[must_use]
    pub const fn leading_zeros(mut self, length: usize) -> Self {
        self.add_leading_zeros = true;
        self.length = Some(length);
        self
    }

    /// Enables zero padding, with the length taken from `length` or the
    /// declared maximum length.
    #[must_use]
    pub const fn add_leading_zeros(mut self, enabled: bool) -> Self {
        self.add_leading_zeros = enabled;
        self
    }

    #[must_use]
    pub const fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// The maximum length declared on the field, used when no explicit
    /// `length` is configured.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn numerator_override(&self) -> Option<&str> {
        self.numerator.as_deref()
    }

    pub const fn group_selector(&self) -> Option<&Selector> {
        self.group.as_ref()
    }

    pub const fn granularity(&self) -> Option<Granularity> {
        self.period
    }

    pub const fn date_selector(&self) -> Option<&Selector> {
        self.date.as_ref()
    }

    pub const fn prefix_selector(&self) -> Option<&Selector> {
        self.prefix.as_ref()
    }

    pub const fn pads_with_zeros(&self) -> bool {
        self.add_leading_zeros
    }

    /// The padded length: explicit `length`, else the declared maximum.
    pub fn total_length(&self) -> Option<usize> {
        self.length.or(self.max_length)
    }

    /// Checks the declaration for errors that would otherwise surface on
    /// every record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty path, a zero length, or string
    /// formatting options on an integer field.
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() || self.path.split('.').any(str::is_empty) {
            return Err(Error::config(format!(
                "invalid field path `{}`",
                self.path
            )));
        }
        if self.numerator.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::config(format!(
                "field `{}` has an empty numerator",
                self.path
            )));
        }
        if self.length == Some(0) {
            return Err(Error::config(format!(
                "field `{}` has a zero length",
                self.path
            )));
        }
        if self.value_type == ValueType::Integer
            && (self.add_leading_zeros || self.prefix.is_some())
        {
            return Err(Error::config(format!(
                "field `{}` is an integer and cannot take a prefix or leading zeros",
                self.path
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_falls_back_to_max_length() {
        let field = FieldSpec::string("code").add_leading_zeros(true).max_length(8);
        assert_eq!(field.total_length(), Some(8));

        let field = field.length(5);
        assert_eq!(field.total_length(), Some(5));
    }

    #[test]
    fn rejects_string_options_on_integers() {
        let field = FieldSpec::integer("number").leading_zeros(5);
        assert!(matches!(field.validate(), Err(Error::Config { .. })));

        let field = FieldSpec::integer("number").prefix(Selector::literal("A-"));
        assert!(matches!(field.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn rejects_degenerate_paths_and_lengths() {
        assert!(FieldSpec::integer("").validate().is_err());
        assert!(FieldSpec::integer("a..b").validate().is_err());
        assert!(FieldSpec::string("code").length(0).validate().is_err());
        assert!(FieldSpec::integer("n").numerator("  ").validate().is_err());
    }

    #[test]
    fn parses_value_types() {
        assert_eq!("integer".parse::<ValueType>().unwrap(), ValueType::Integer);
        assert_eq!("string".parse::<ValueType>().unwrap(), ValueType::String);
        assert!(matches!(
            "date".parse::<ValueType>(),
            Err(Error::Config { .. })
        ));
    }
}
