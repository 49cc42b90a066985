//! Named measurement values extracted from a simulation.

use std::collections::BTreeMap;

/// One measured quantity.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// A single number.
    Scalar(f64),

    /// An indexed series where some slots may have no data.
    Series(Vec<Option<f64>>),

    /// An unordered bag of per-entity observations.
    Samples(Vec<f64>),

    /// The measure was requested but could not be computed (e.g. no peers).
    Missing,
}

impl Measurement {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Measurement::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[Option<f64>]> {
        match self {
            Measurement::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn as_samples(&self) -> Option<&[f64]> {
        match self {
            Measurement::Samples(samples) => Some(samples),
            _ => None,
        }
    }
}

/// Measurements keyed by name, in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurements {
    values: BTreeMap<String, Measurement>,
}

impl Measurements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measurement, replacing any earlier value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: Measurement) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.values.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Measurement::as_scalar)
    }

    pub fn series(&self, name: &str) -> Option<&[Option<f64>]> {
        self.get(name).and_then(Measurement::as_series)
    }

    pub fn samples(&self, name: &str) -> Option<&[f64]> {
        self.get(name).and_then(Measurement::as_samples)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Measurement)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge `other` into `self`; values in `other` win on name clashes.
    pub fn extend(&mut self, other: Measurements) {
        self.values.extend(other.values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut m = Measurements::new();
        m.insert("fairness", Measurement::Scalar(0.0));
        m.insert("spreading", Measurement::Series(vec![Some(0.5), None]));
        m.insert("satisfaction", Measurement::Samples(vec![0.2, 0.4]));

        assert_eq!(m.scalar("fairness"), Some(0.0));
        assert_eq!(m.series("spreading"), Some(&[Some(0.5), None][..]));
        assert_eq!(m.samples("satisfaction"), Some(&[0.2, 0.4][..]));
        assert_eq!(m.scalar("spreading"), None);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_iteration_is_name_ordered() {
        let mut m = Measurements::new();
        m.insert("b", Measurement::Missing);
        m.insert("a", Measurement::Scalar(1.0));
        let names: Vec<_> = m.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
