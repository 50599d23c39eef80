//! Structured metadata attached to records and handlers.

use std::{collections::BTreeMap, fmt};

/// Metadata keyed by name. Ordered so rendered output is deterministic.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A renderable metadata value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataValue {
    String(String),
    Array(Vec<MetadataValue>),
    Dictionary(Metadata),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => f.write_str(s),
            MetadataValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            MetadataValue::Dictionary(map) => {
                f.write_str("[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<Vec<MetadataValue>> for MetadataValue {
    fn from(items: Vec<MetadataValue>) -> Self {
        MetadataValue::Array(items)
    }
}

impl From<Metadata> for MetadataValue {
    fn from(map: Metadata) -> Self {
        MetadataValue::Dictionary(map)
    }
}

macro_rules! from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for MetadataValue {
                fn from(v: $t) -> Self {
                    MetadataValue::String(v.to_string())
                }
            }
        )*
    };
}

from_display!(bool, i32, i64, u32, u64, usize, f64);

/// Build a [`Metadata`] map from `key => value` pairs.
///
/// ```
/// let md = ltg_core::metadata! { "host" => "srv1", "attempt" => 3 };
/// assert_eq!(md.len(), 2);
/// ```
#[macro_export]
macro_rules! metadata {
    () => { $crate::metadata::Metadata::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::metadata::Metadata::new();
        $(
            map.insert(
                ::std::string::String::from($key),
                $crate::metadata::MetadataValue::from($value),
            );
        )+
        map
    }};
}

/// Combine persistent handler metadata with per-call metadata.
///
/// Per-call entries win on key collision. Values are replaced, never merged.
pub fn merged(persistent: &Metadata, per_call: Option<&Metadata>) -> Metadata {
    let Some(per_call) = per_call else {
        return persistent.clone();
    };
    let mut out = persistent.clone();
    for (k, v) in per_call {
        out.insert(k.clone(), v.clone());
    }
    out
}
