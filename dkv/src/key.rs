use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DResult, Error};

/// A hierarchical path identifier, e.g. `/Person/HerpDerp`. Every entity,
/// version and datastore entry is addressed by one.
///
/// Keys are stored in normalized form: always beginning with `/`, duplicate
/// slashes collapsed, trailing slash stripped (except for the root `/`).
/// Equality, ordering and hashing are over the normalized string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    s: String,
}

impl Key {
    pub fn new(path: impl AsRef<str>) -> Key {
        Key { s: normalize(path.as_ref()) }
    }

    /// A fresh unique key, for testing and anonymous entities.
    pub fn random() -> Key {
        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Key::new(format!("/{}", name))
    }

    pub fn as_str(&self) -> &str {
        &self.s
    }

    /// The last path segment. Empty for the root key.
    pub fn name(&self) -> &str {
        match self.s.rfind('/') {
            Some(idx) => &self.s[idx + 1..],
            None => &self.s,
        }
    }

    /// The second-to-last path segment, naming the entity's type. Keys with
    /// fewer than two segments carry no type.
    pub fn type_name(&self) -> DResult<&str> {
        let split: Vec<&str> = self.s.split('/').collect();
        if split.len() <= 2 {
            return Err(Error::Value(format!("key {} has no type", self.s)));
        }
        Ok(split[split.len() - 2])
    }

    /// The key one level up. Fails for the root and for top-level keys,
    /// whose parent would be the root.
    pub fn parent(&self) -> DResult<Key> {
        match self.s.rfind('/') {
            Some(idx) if idx > 0 => Ok(Key { s: self.s[..idx].to_string() }),
            _ => Err(Error::Value(format!("key {} has no parent", self.s))),
        }
    }

    pub fn child(&self, segment: impl std::fmt::Display) -> Key {
        Key::new(format!("{}/{}", self.s, segment))
    }

    /// True iff `other` lives strictly below this key.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        self != other && other.s.starts_with(&format!("{}/", self.s))
    }
}

/// Normalization is a pure function of the input string: force a leading
/// slash, collapse duplicate slashes until stable, strip the trailing slash
/// unless the result is the root.
fn normalize(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.s)
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self.s)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Key {
        Key::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Key {
        Key::new(s)
    }
}

impl Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.s)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Key, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Key::new(s))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalization() {
        assert_eq!(Key::new("/a//b///c/").as_str(), "/a/b/c");
        assert_eq!(Key::new("abcde").as_str(), "/abcde");
        assert_eq!(Key::new("").as_str(), "/");
        assert_eq!(Key::new("/").as_str(), "/");
        assert_eq!(Key::new("///").as_str(), "/");
        assert_eq!(Key::new("/fdisaha////fdsa////fd/fdsafdsa/").as_str(), "/fdisaha/fdsa/fd/fdsafdsa");

        // idempotent: normalizing a normalized key changes nothing
        for s in ["/a//b///c/", "abcde", "", "/A/B/C/D"] {
            let k = Key::new(s);
            assert_eq!(Key::new(k.as_str()), k);
        }
    }

    #[test]
    fn segments() {
        let k = Key::new("/a/b/c");
        assert_eq!(k.name(), "c");
        assert_eq!(k.type_name().unwrap(), "b");
        assert_eq!(k.parent().unwrap(), Key::new("/a/b"));

        assert_eq!(Key::new("/a").name(), "a");
        assert!(Key::new("/a").parent().is_err());
        assert!(Key::new("/a").type_name().is_err());
        assert!(Key::new("/").parent().is_err());
        assert!(Key::new("/").type_name().is_err());
    }

    #[test]
    fn ancestry() {
        let k1 = Key::new("/A/B/C");
        let k2 = Key::new("/A/B/C/D");

        assert_eq!(k1.as_str(), "/A/B/C");
        assert_eq!(k2.as_str(), "/A/B/C/D");
        assert!(k1.is_ancestor_of(&k2));
        assert!(!k2.is_ancestor_of(&k1));
        assert!(!k1.is_ancestor_of(&k1));
        assert_eq!(k1.child("D"), k2);
        assert_eq!(k1, k2.parent().unwrap());

        assert_eq!(k1.type_name().unwrap(), "B");
        assert_eq!(k2.type_name().unwrap(), "C");
        assert_eq!(k2.type_name().unwrap(), k1.name());
    }

    #[test]
    fn child_coerces_display_types() {
        let parent = Key::new("/nums");
        assert_eq!(parent.child(42), Key::new("/nums/42"));
    }

    #[test]
    fn hashing() {
        let mut keys = HashSet::new();
        for _ in 0..200 {
            let key = Key::new(format!("/herp/{}/derp", Key::random().name()));
            keys.insert(key);
        }
        for key in &keys {
            assert!(keys.contains(key));
        }
    }

    #[test]
    fn random_is_unique() {
        let mut keys = HashSet::new();
        for _ in 0..1000 {
            let key = Key::random();
            assert!(!keys.contains(&key));
            keys.insert(key);
        }
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn serde_string_form() {
        let k = Key::new("/a//b/");
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
    }
}
