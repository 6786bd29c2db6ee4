//! Declarative field configuration.
//!
//! Entities are described in JSON, one schema per entity type:
//!
//! ```json
//! {
//!   "entity": "Order",
//!   "fields": [
//!     { "path": "number", "type": "string", "maxLength": 12,
//!       "autonumber": { "group": "customer.id", "period": "year",
//!                       "date": "issuedAt", "prefix": { "literal": "INV-" },
//!                       "addLeadingZeros": true } },
//!     { "path": "customer.id", "type": "string" }
//!   ]
//! }
//! ```
//!
//! A bare string selector is a dotted path into the record. Use
//! `{"literal": ...}` for constants; `{"path": ...}` is accepted as the
//! explicit spelling of a path. Function selectors can only be built in code
//! with [`crate::Selector::derive`].

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, FieldSpec, Granularity, Result, Selector, ValueType};

/// A selector as written in configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SelectorConfig {
    Path(String),
    Literal {
        literal: Value,
    },
    ExplicitPath {
        path: String,
    },
}

impl From<SelectorConfig> for Selector {
    fn from(config: SelectorConfig) -> Self {
        match config {
            SelectorConfig::Path(path) | SelectorConfig::ExplicitPath { path } => {
                Self::Path(path)
            }
            SelectorConfig::Literal { literal } => Self::Literal(literal),
        }
    }
}

/// The recognized per-field autonumber options. All are optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AutonumberOptions {
    pub numerator: Option<String>,
    pub group: Option<SelectorConfig>,
    pub period: Option<String>,
    pub date: Option<SelectorConfig>,
    pub prefix: Option<SelectorConfig>,
    #[serde(default)]
    pub add_leading_zeros: bool,
    pub length: Option<usize>,
}

/// `"autonumber": true` or `"autonumber": { ...options }`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AutonumberConfig {
    Enabled(bool),
    Options(AutonumberOptions),
}

/// One field of an entity schema.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDecl {
    pub path: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub max_length: Option<usize>,
    pub autonumber: Option<AutonumberConfig>,
}

impl FieldDecl {
    /// Builds the [`FieldSpec`] for an autonumbered field, or `None` if the
    /// field is not autonumbered.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unsupported value type, an unknown period,
    /// or any check in [`FieldSpec::validate`].
    pub fn to_spec(&self) -> Result<Option<FieldSpec>> {
        let options = match &self.autonumber {
            None | Some(AutonumberConfig::Enabled(false)) => return Ok(None),
            Some(AutonumberConfig::Enabled(true)) => AutonumberOptions::default(),
            Some(AutonumberConfig::Options(options)) => options.clone(),
        };

        let value_type = self.value_type.parse::<ValueType>().map_err(|_| {
            Error::config(format!(
                "field `{}` has unsupported autonumber type `{}` (expected integer or string)",
                self.path, self.value_type
            ))
        })?;
        let mut spec =
            FieldSpec::new(&self.path, value_type).add_leading_zeros(options.add_leading_zeros);

        if let Some(numerator) = options.numerator {
            spec = spec.numerator(numerator);
        }
        if let Some(group) = options.group {
            spec = spec.group(group.into());
        }
        if let Some(period) = options.period {
            spec = spec.period(period.parse::<Granularity>()?);
        }
        if let Some(date) = options.date {
            spec = spec.date(date.into());
        }
        if let Some(prefix) = options.prefix {
            spec = spec.prefix(prefix.into());
        }
        if let Some(length) = options.length {
            spec = spec.length(length);
        }
        if let Some(max_length) = self.max_length {
            spec = spec.max_length(max_length);
        }

        spec.validate()?;
        Ok(Some(spec))
    }
}

/// The declared fields of one entity type.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EntitySchema {
    pub entity: String,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl EntitySchema {
    /// The autonumbered fields, in declaration order.
    ///
    /// # Errors
    ///
    /// The first configuration error among the autonumbered fields.
    pub fn autonumber_fields(&self) -> Result<Vec<FieldSpec>> {
        self.fields
            .iter()
            .filter_map(|decl| decl.to_spec().transpose())
            .collect()
    }
}

/// Parses a JSON array of entity schemas.
///
/// # Errors
///
/// [`Error::Config`] if the document is not valid schema JSON.
pub fn parse_schemas(json: &str) -> Result<Vec<EntitySchema>> {
    serde_json::from_str(json).map_err(|e| Error::config(format!("malformed schema: {e}")))
}
