use std::{fmt, sync::Arc};

use serde_json::{Map, Value};

// Chains deeper than this are flattened into a single layer on the next derive.
const MAX_DEPTH: usize = 16;

/// Structured context attached to a logger or sink.
///
/// A `Fields` value is never modified in place. [`Fields::derive`] returns a new store layered on
/// top of the current one, so clones handed out earlier keep seeing exactly what they saw before.
#[derive(Clone, Default)]
pub struct Fields {
    head: Option<Arc<Layer>>,
}

struct Layer {
    entries: Vec<(String, Value)>,
    parent: Option<Arc<Layer>>,
    depth: usize,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a store holding every key of `self` plus `fields`. Later contributions win on
    /// duplicate keys, both against `self` and within `fields`.
    pub fn derive<I, K>(&self, fields: I) -> Fields
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entries: Vec<(String, Value)> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();

        if entries.is_empty() {
            return self.clone();
        }

        let depth = self.head.as_ref().map_or(0, |layer| layer.depth);
        if depth >= MAX_DEPTH {
            let mut flat = self.to_map();
            for (k, v) in entries {
                flat.insert(k, v);
            }
            return Fields {
                head: Some(Arc::new(Layer {
                    entries: flat.into_iter().collect(),
                    parent: None,
                    depth: 1,
                })),
            };
        }

        Fields {
            head: Some(Arc::new(Layer {
                entries,
                parent: self.head.clone(),
                depth: depth + 1,
            })),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut layer = self.head.as_deref();
        while let Some(current) = layer {
            if let Some((_, v)) = current.entries.iter().rev().find(|(k, _)| k == key) {
                return Some(v);
            }
            layer = current.parent.as_deref();
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.to_map().len()
    }

    /// Flattens the layers into a single map, newest values winning.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut layers = Vec::new();
        let mut layer = self.head.as_deref();
        while let Some(current) = layer {
            layers.push(current);
            layer = current.parent.as_deref();
        }

        let mut map = Map::new();
        for current in layers.into_iter().rev() {
            for (k, v) in &current.entries {
                map.insert(k.clone(), v.clone());
            }
        }
        map
    }
}

impl fmt::Debug for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.to_map()).finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Fields {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Fields::new().derive(iter)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn derive_leaves_the_base_untouched() {
        let base = Fields::new().derive([("service", json!("api")), ("attempt", json!(1))]);
        let before = base.to_map();

        let derived = base.derive([("attempt", json!(2)), ("user", json!({"id": 7}))]);

        assert_eq!(base.to_map(), before);
        assert_eq!(derived.get("attempt"), Some(&json!(2)));
        assert_eq!(derived.get("service"), Some(&json!("api")));
        assert_eq!(derived.get("user"), Some(&json!({"id": 7})));
        assert_eq!(base.get("user"), None);
    }

    #[test]
    fn last_duplicate_in_one_call_wins() {
        let fields = Fields::new().derive([("k", json!("first")), ("k", json!("second"))]);
        assert_eq!(fields.get("k"), Some(&json!("second")));
        assert_eq!(fields.to_map().get("k"), Some(&json!("second")));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn siblings_do_not_see_each_other() {
        let root = Fields::new().derive([("shared", json!(true))]);
        let left = root.derive([("side", json!("left"))]);
        let right = root.derive([("side", json!("right"))]);

        assert_eq!(left.get("side"), Some(&json!("left")));
        assert_eq!(right.get("side"), Some(&json!("right")));
        assert_eq!(root.get("side"), None);
    }

    #[test]
    fn empty_contributions_share_the_store() {
        let base = Fields::new().derive([("a", json!(1))]);
        let same = base.derive(Vec::<(String, Value)>::new());
        assert_eq!(same.to_map(), base.to_map());
        assert!(Fields::new().is_empty());
    }

    #[test]
    fn deep_chains_are_compacted() {
        let mut fields = Fields::new();
        for i in 0..(MAX_DEPTH * 3) {
            fields = fields.derive([(format!("k{}", i % 5), json!(i))]);
        }

        let depth = fields.head.as_ref().map(|l| l.depth).unwrap();
        assert!(depth <= MAX_DEPTH);
        assert_eq!(fields.len(), 5);
        assert_eq!(fields.get("k2"), Some(&json!(MAX_DEPTH * 3 - 1)));
    }
}
