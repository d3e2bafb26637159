//! Wire records from the warehouse feed and their normalized form.
//!
//! The upstream ERP emits loosely typed flat records: any field may arrive as
//! a JSON string or number, with inconsistent surrounding whitespace.
//! Normalization trims and coerces into [`NormalizedRecord`], the only shape
//! the rest of the pipeline sees.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A scalar feed field that may be sent as either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Renders the value as a trimmed string.
    ///
    /// Integral numbers render without a fractional part (`5.0` → `"5"`) so
    /// that ids sent inconsistently as number or string compare equal.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            FieldValue::Text(s) => s.trim().to_string(),
        }
    }

    /// Coerces the value to a float, or `None` when the text does not parse.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Coerces the value to an [`ItemRef`], or `None` when blank.
    #[must_use]
    pub fn to_item(&self) -> Option<ItemRef> {
        match self {
            FieldValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                Some(ItemRef::Number(*n as i64))
            }
            FieldValue::Number(n) => Some(ItemRef::Text(format!("{n}"))),
            FieldValue::Text(s) => ItemRef::parse(s),
        }
    }
}

/// A line-item reference from the feed: an integer when the upstream sends a
/// numeric line number, otherwise the trimmed original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemRef {
    Number(i64),
    Text(String),
}

impl ItemRef {
    /// Parses trimmed text into an [`ItemRef`]; all-digit text becomes
    /// [`ItemRef::Number`]. Returns `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<i64>() {
                return Some(ItemRef::Number(n));
            }
        }
        Some(ItemRef::Text(trimmed.to_string()))
    }

    /// Returns the numeric line number, if this reference is numeric.
    #[must_use]
    pub fn line_no(&self) -> Option<i64> {
        match self {
            ItemRef::Number(n) => Some(*n),
            ItemRef::Text(_) => None,
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemRef::Number(n) => write!(f, "{n}"),
            ItemRef::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A raw pick-request record exactly as the feed delivers it.
///
/// Every field is optional at this layer; presence of the required subset is
/// checked by [`ExternalRecord::normalize`]. Records are transient — they are
/// never persisted in this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalRecord {
    pub client: Option<FieldValue>,
    pub depot: Option<FieldValue>,
    pub order: Option<FieldValue>,
    pub display_name: Option<FieldValue>,
    pub store: Option<FieldValue>,
    pub item: Option<FieldValue>,
    pub product: Option<FieldValue>,
    pub description: Option<FieldValue>,
    pub requested_qty: Option<FieldValue>,
    pub location_text: Option<FieldValue>,
}

/// A record rejected during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

impl ExternalRecord {
    /// Validates required fields and coerces the record into its canonical
    /// shape.
    ///
    /// Required: `client`, `depot`, `order`, `displayName`, `store`,
    /// `product`, `description`, `requestedQty`. `item` and `locationText`
    /// are optional. Coercion itself never fails — an unparsable
    /// `requestedQty` becomes `None` and is persisted as SQL NULL rather
    /// than rejected here.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] naming the first absent
    /// required field.
    pub fn normalize(&self) -> Result<NormalizedRecord, ValidationError> {
        let require = |field: &'static str,
                       value: &Option<FieldValue>|
         -> Result<String, ValidationError> {
            value
                .as_ref()
                .map(FieldValue::to_text)
                .ok_or(ValidationError::MissingField(field))
        };

        let client = require("client", &self.client)?;
        let depot = require("depot", &self.depot)?;
        let order_ref = require("order", &self.order)?;
        let display_name = require("displayName", &self.display_name)?;
        let store = require("store", &self.store)?;
        let product = require("product", &self.product)?;
        let description = require("description", &self.description)?;
        let requested_qty = self
            .requested_qty
            .as_ref()
            .ok_or(ValidationError::MissingField("requestedQty"))?
            .to_f64();

        // Locations are matched case-insensitively downstream; storing the
        // uppercased form keeps the detail natural key canonical.
        let location_text = self
            .location_text
            .as_ref()
            .map(FieldValue::to_text)
            .unwrap_or_default()
            .to_uppercase();

        Ok(NormalizedRecord {
            client,
            depot,
            order_ref,
            display_name,
            store,
            item: self.item.as_ref().and_then(FieldValue::to_item),
            product,
            description,
            requested_qty,
            location_text,
        })
    }
}

/// A validated, canonical pick-request record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub client: String,
    pub depot: String,
    pub order_ref: String,
    pub display_name: String,
    pub store: String,
    pub item: Option<ItemRef>,
    pub product: String,
    pub description: String,
    /// `None` when the feed sent a value that does not parse as a number.
    pub requested_qty: Option<f64>,
    /// Trimmed and uppercased; empty string when the feed omitted it.
    pub location_text: String,
}

impl NormalizedRecord {
    /// The numeric line number carried by `item`, if any.
    #[must_use]
    pub fn line_no(&self) -> Option<i64> {
        self.item.as_ref().and_then(ItemRef::line_no)
    }
}
