//! Optional nested-path lookup over raw JSON records.
//!
//! Every traversal step returns an `Option`; a missing intermediate object or
//! a non-object along the way ends the walk without failing.

use serde_json::Value;

/// Result of resolving a path against one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// Some segment along the path is missing
    Absent,
    /// The key exists but holds JSON null
    Null,
    /// The key exists with a non-null value
    Present(&'a Value),
}

impl<'a> Lookup<'a> {
    /// Whether the final key exists (null included)
    pub fn key_exists(&self) -> bool {
        !matches!(self, Lookup::Absent)
    }

    pub fn value(self) -> Option<&'a Value> {
        match self {
            Lookup::Present(v) => Some(v),
            _ => None,
        }
    }
}

/// A nested path into a record, e.g. `["rule", "level"]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath {
    segments: &'static [&'static str],
}

impl FieldPath {
    pub const fn new(segments: &'static [&'static str]) -> Self {
        Self { segments }
    }

    /// Walk the record one segment at a time
    pub fn lookup<'a>(&self, record: &'a Value) -> Lookup<'a> {
        let mut current = record;
        for segment in self.segments {
            match current.as_object().and_then(|map| map.get(*segment)) {
                Some(next) => current = next,
                None => return Lookup::Absent,
            }
        }
        if current.is_null() {
            Lookup::Null
        } else {
            Lookup::Present(current)
        }
    }
}

/// First candidate that is present and non-null.
///
/// A candidate that exists but holds null falls through to the next one.
pub fn coalesce<'a>(record: &'a Value, candidates: &[FieldPath]) -> Option<&'a Value> {
    candidates
        .iter()
        .find_map(|path| path.lookup(record).value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RULE_LEVEL: FieldPath = FieldPath::new(&["rule", "level"]);
    const RULE_MITRE: FieldPath = FieldPath::new(&["rule", "mitre_techniques"]);
    const SCA_MITRE: FieldPath =
        FieldPath::new(&["data", "sca", "check", "compliance", "mitre_techniques"]);

    #[test]
    fn test_nested_lookup() {
        let v = json!({"rule": {"level": 5}});
        assert_eq!(RULE_LEVEL.lookup(&v), Lookup::Present(&json!(5)));
    }

    #[test]
    fn test_missing_intermediate_is_absent() {
        assert_eq!(RULE_LEVEL.lookup(&json!({})), Lookup::Absent);
        assert_eq!(RULE_LEVEL.lookup(&json!({"rule": null})), Lookup::Absent);
        assert_eq!(RULE_LEVEL.lookup(&json!({"rule": "text"})), Lookup::Absent);
        assert_eq!(RULE_LEVEL.lookup(&json!({"rule": [1, 2]})), Lookup::Absent);
    }

    #[test]
    fn test_null_leaf() {
        let record = json!({"rule": {"level": null}});
        let lookup = RULE_LEVEL.lookup(&record);
        assert_eq!(lookup, Lookup::Null);
        assert!(lookup.key_exists());
        assert!(lookup.value().is_none());
    }

    #[test]
    fn test_coalesce_order() {
        let candidates = [RULE_MITRE, SCA_MITRE];
        let both = json!({
            "rule": {"mitre_techniques": ["T1110"]},
            "data": {"sca": {"check": {"compliance": {"mitre_techniques": "T1059"}}}}
        });
        assert_eq!(coalesce(&both, &candidates), Some(&json!(["T1110"])));

        let only_b = json!({
            "data": {"sca": {"check": {"compliance": {"mitre_techniques": "T1059"}}}}
        });
        assert_eq!(coalesce(&only_b, &candidates), Some(&json!("T1059")));

        let a_null = json!({
            "rule": {"mitre_techniques": null},
            "data": {"sca": {"check": {"compliance": {"mitre_techniques": "T1059"}}}}
        });
        assert_eq!(coalesce(&a_null, &candidates), Some(&json!("T1059")));

        assert_eq!(coalesce(&json!({"rule": {}}), &candidates), None);
    }
}
