use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key/value tags attached to a sample. Ordered by key so that the folded
/// representation of a set is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a label, returning the previous value for the key if any
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `key=value` pair as given on the command line.
    pub fn parse_pair(s: &str) -> Result<(String, String), String> {
        match s.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_owned(), v.to_owned())),
            _ => Err(format!("expected key=value, got `{s}`")),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Same `{k=v,k=v}` shape the decoder accepts at the head of a trace.
impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_sorted() {
        let labels: LabelSet = [("region", "eu"), ("app", "web")].into_iter().collect();
        assert_eq!(labels.to_string(), "{app=web,region=eu}");
        assert_eq!(LabelSet::new().to_string(), "{}");
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(LabelSet::parse_pair("env=prod"), Ok(("env".into(), "prod".into())));
        assert_eq!(LabelSet::parse_pair("empty="), Ok(("empty".into(), "".into())));
        assert!(LabelSet::parse_pair("=prod").is_err());
        assert!(LabelSet::parse_pair("noequals").is_err());
    }
}
