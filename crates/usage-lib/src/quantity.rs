//! Resource quantities and the set they are aggregated in
//!
//! Every amount is an integer in the stored unit of its resource kind:
//! nanocores for `cpu`, base units (bytes, counts) for everything else.
//! Scaling to cores or GiB happens only when a report is rendered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Resource name for CPU, stored in nanocores
pub const CPU: &str = "cpu";

/// Resource name for memory, stored in bytes
pub const MEMORY: &str = "memory";

const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Errors raised while parsing a Kubernetes quantity string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity '{0}'")]
    Invalid(String),

    #[error("unknown suffix '{suffix}' in quantity '{quantity}'")]
    UnknownSuffix { quantity: String, suffix: String },

    #[error("negative quantity '{0}'")]
    Negative(String),

    #[error("quantity '{0}' is out of range")]
    Overflow(String),
}

/// Mapping from resource name to amount
///
/// An absent name is the same as a zero amount. Zero amounts are never
/// stored, so two sets compare equal exactly when every resource has the
/// same amount in both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceSet(BTreeMap<String, u64>);

impl ResourceSet {
    /// The empty set (identity of [`ResourceSet::merge`])
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, summing with any existing amount
    pub fn with(mut self, name: impl Into<String>, amount: u64) -> Self {
        self.add(name, amount);
        self
    }

    fn add(&mut self, name: impl Into<String>, amount: u64) {
        if amount == 0 {
            return;
        }
        let entry = self.0.entry(name.into()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Amount for a resource, zero when absent
    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    /// CPU in nanocores
    pub fn cpu(&self) -> u64 {
        self.get(CPU)
    }

    /// Memory in bytes
    pub fn memory(&self) -> u64 {
        self.get(MEMORY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sum of two sets: the union of their resources, adding amounts for
    /// resources present in both. Neither input is modified.
    pub fn merge(&self, other: &ResourceSet) -> ResourceSet {
        let mut merged = self.clone();
        for (name, amount) in &other.0 {
            merged.add(name.clone(), *amount);
        }
        merged
    }

    /// Fold [`ResourceSet::merge`] over a sequence, starting from the empty set
    pub fn sum<'a>(sets: impl IntoIterator<Item = &'a ResourceSet>) -> ResourceSet {
        sets.into_iter()
            .fold(ResourceSet::new(), |total, set| total.merge(set))
    }

    /// Parse `(name, quantity)` pairs as found in a container spec or node
    /// status. Entries that fail to parse are left out of the set and
    /// returned alongside it.
    pub fn parse_list<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> (ResourceSet, Vec<(String, QuantityError)>) {
        let mut set = ResourceSet::new();
        let mut rejected = Vec::new();
        for (name, text) in entries {
            match parse_quantity(name, text) {
                Ok(amount) => set.add(name, amount),
                Err(e) => rejected.push((name.to_string(), e)),
            }
        }
        (set, rejected)
    }
}

/// Sum of two resource sets, see [`ResourceSet::merge`]
pub fn merge(a: &ResourceSet, b: &ResourceSet) -> ResourceSet {
    a.merge(b)
}

/// Parse a Kubernetes quantity into the stored unit for `resource`
///
/// CPU is returned in nanocores; every other resource in base units, with
/// any sub-unit remainder rounded up.
pub fn parse_quantity(resource: &str, text: &str) -> Result<u64, QuantityError> {
    let nanos = parse_nano_units(text)?;
    let amount = if resource == CPU {
        nanos
    } else {
        ceil_div(nanos, NANOS_PER_UNIT)
    };
    u64::try_from(amount).map_err(|_| QuantityError::Overflow(text.trim().to_string()))
}

/// Parse a quantity into billionths of its unit
fn parse_nano_units(text: &str) -> Result<i128, QuantityError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(QuantityError::Empty);
    }
    let invalid = || QuantityError::Invalid(text.to_string());
    let overflow = || QuantityError::Overflow(text.to_string());

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);

    let (negative, digits) = match number.as_bytes().first() {
        Some(b'-') => (true, &number[1..]),
        Some(b'+') => (false, &number[1..]),
        _ => (false, number),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let mantissa: i128 = format!("{whole}{fraction}")
        .parse()
        .map_err(|_| overflow())?;

    let (binary_power, decimal_exponent) =
        suffix_scale(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
            quantity: text.to_string(),
            suffix: suffix.to_string(),
        })?;
    let exponent = decimal_exponent.saturating_add(9 - fraction.len() as i64);

    let mut value = 1024_i128
        .checked_pow(binary_power)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(overflow)?;

    if exponent >= 0 {
        let factor = u32::try_from(exponent)
            .ok()
            .and_then(|e| 10_i128.checked_pow(e))
            .ok_or_else(overflow)?;
        value = value.checked_mul(factor).ok_or_else(overflow)?;
    } else {
        value = match exponent
            .checked_neg()
            .and_then(|e| u32::try_from(e).ok())
            .and_then(|e| 10_i128.checked_pow(e))
        {
            Some(divisor) => ceil_div(value, divisor),
            None => i128::from(value > 0),
        };
    }

    if negative && value != 0 {
        return Err(QuantityError::Negative(text.to_string()));
    }
    Ok(value)
}

/// Powers of 1024 and of 10 denoted by a quantity suffix
fn suffix_scale(suffix: &str) -> Option<(u32, i64)> {
    let scale = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (1, 0),
        "Mi" => (2, 0),
        "Gi" => (3, 0),
        "Ti" => (4, 0),
        "Pi" => (5, 0),
        "Ei" => (6, 0),
        _ => {
            let exponent = suffix.strip_prefix(|c: char| c == 'e' || c == 'E')?;
            return exponent.parse::<i64>().ok().map(|e| (0, e));
        }
    };
    Some(scale)
}

fn ceil_div(value: i128, divisor: i128) -> i128 {
    value / divisor + i128::from(value % divisor > 0)
}
