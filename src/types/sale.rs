//! Sale records as opaque field mappings

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single field value reported by the vendor
///
/// The native module reports every value in its string form. Scripted and
/// replayed sources may carry typed values.
///
/// Decimals compare by bit pattern, so a NaN equals itself and a reading is
/// always equal to an unchanged copy of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl FieldValue {
    /// Integer view of the value, parsing text when needed
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Decimal(_) | FieldValue::Bool(_) => None,
        }
    }

    /// Borrow the value as a string slice if it is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Decimal(a), FieldValue::Decimal(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Capability interface over a vendor sale object of unknown shape
///
/// Implementations enumerate whatever fields the vendor object exposes at
/// runtime. No schema is assumed.
pub trait SaleObject {
    /// Names of the fields available on this object
    fn field_names(&self) -> Vec<String>;

    /// Value of a named field, `None` if absent or null
    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// One sale as reported by the controller
///
/// An unstructured bag of fields, ordered by name. Equality is full equality
/// over the mapping, which is what the polling loop uses to detect new sales.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SaleRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl SaleRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every field a vendor object exposes, verbatim
    pub fn from_object(object: &dyn SaleObject) -> Self {
        let mut record = SaleRecord::new();
        for name in object.field_names() {
            if let Some(value) = object.field(&name) {
                record.fields.insert(name, value);
            }
        }
        record
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, returning the previous value
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    /// Look up a field by exact name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// First field present among several candidate names
    ///
    /// Vendor firmware revisions name the same field differently
    /// (`SaleNumber` vs `SaleId`), so lookups try candidates in order.
    pub fn first_of(&self, names: &[&str]) -> Option<&FieldValue> {
        names.iter().find_map(|name| self.fields.get(*name))
    }

    /// Field names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// A record without fields carries no sale
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consume the record and return the underlying mapping
    pub fn into_inner(self) -> BTreeMap<String, FieldValue> {
        self.fields
    }
}

impl SaleObject for SaleRecord {
    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for SaleRecord
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl From<BTreeMap<String, FieldValue>> for SaleRecord {
    fn from(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }
}

impl fmt::Display for SaleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Vendor object that exposes a field with a null value
    struct SparseObject;

    impl SaleObject for SparseObject {
        fn field_names(&self) -> Vec<String> {
            vec!["TransactionId".into(), "Grade".into(), "Operator".into()]
        }

        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "TransactionId" => Some("T-77".into()),
                "Grade" => Some(FieldValue::Integer(2)),
                _ => None,
            }
        }
    }

    #[test]
    fn from_object_copies_present_fields_verbatim() {
        let record = SaleRecord::from_object(&SparseObject);

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("TransactionId"), Some(&FieldValue::Text("T-77".into())));
        assert_eq!(record.get("Grade"), Some(&FieldValue::Integer(2)));
        assert!(record.get("Operator").is_none());
    }

    #[test]
    fn equality_is_over_the_whole_mapping() {
        let a = SaleRecord::new().with("TransactionId", 1).with("Volume", 10.5);
        let b = SaleRecord::new().with("Volume", 10.5).with("TransactionId", 1);
        let c = SaleRecord::new().with("TransactionId", 1).with("Volume", 11.0);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn nan_reading_equals_itself() {
        let record = SaleRecord::new().with("TransactionId", 5).with("Volume", f64::NAN);
        assert_eq!(record, record.clone());
        assert_eq!(FieldValue::Decimal(f64::NAN), FieldValue::Decimal(f64::NAN));
        assert_ne!(FieldValue::Decimal(1.0), FieldValue::Integer(1));
        assert_ne!(record, record.clone().with("Volume", 1.0));
    }

    #[test]
    fn first_of_respects_candidate_order() {
        let record = SaleRecord::new().with("SaleId", 9).with("SaleNumber", 12);
        assert_eq!(record.first_of(&["SaleNumber", "SaleId"]), Some(&FieldValue::Integer(12)));
        assert_eq!(record.first_of(&["SaleNr"]), None);
    }

    #[test]
    fn integer_view_parses_text() {
        assert_eq!(FieldValue::Text(" 42 ".into()).as_integer(), Some(42));
        assert_eq!(FieldValue::Integer(7).as_integer(), Some(7));
        assert_eq!(FieldValue::Decimal(1.5).as_integer(), None);
    }

    #[test]
    fn yaml_values_keep_their_types() {
        let record: SaleRecord =
            serde_yaml_ng::from_str("Pump: 3\nVolume: 12.5\nProduct: Diesel\nPaid: true\n")
                .unwrap();

        assert_eq!(record.get("Pump"), Some(&FieldValue::Integer(3)));
        assert_eq!(record.get("Volume"), Some(&FieldValue::Decimal(12.5)));
        assert_eq!(record.get("Product"), Some(&FieldValue::Text("Diesel".into())));
        assert_eq!(record.get("Paid"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn display_lists_fields() {
        let record = SaleRecord::new().with("A", 1).with("B", "x");
        assert_eq!(record.to_string(), "{A: 1, B: x}");
    }
}
