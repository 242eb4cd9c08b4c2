//! Addressing of keyed store entries and the precedence chain of value sources.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::crd::{NamedValue, ValueSelector};

/// Kind of keyed store an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SinkKind {
    ConfigMap,
    Secret,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::ConfigMap => "ConfigMap",
            SinkKind::Secret => "Secret",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `key` inside one ConfigMap/Secret-like object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRef {
    pub kind: SinkKind,
    pub name: String,
    pub namespace: String,
    pub key: String,
}

impl KeyRef {
    pub fn new(kind: SinkKind, sel: &ValueSelector) -> Self {
        Self { kind, name: sel.name.clone(), namespace: sel.namespace.clone(), key: sel.key.clone() }
    }

    pub fn config_map(sel: &ValueSelector) -> Self { Self::new(SinkKind::ConfigMap, sel) }

    pub fn secret(sel: &ValueSelector) -> Self { Self::new(SinkKind::Secret, sel) }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}#{}", self.kind, self.namespace, self.name, self.key)
    }
}

/// A single candidate source for a named value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Lookup(KeyRef),
    Literal(String),
}

impl NamedValue {
    /// Declared sources in resolution order: ConfigMap, then Secret, then the
    /// inline literal. Absent sources are left out of the chain.
    pub fn sources(&self) -> SmallVec<[ValueSource; 3]> {
        let mut out = SmallVec::new();
        if let Some(sel) = &self.config_map_ref {
            out.push(ValueSource::Lookup(KeyRef::config_map(sel)));
        }
        if let Some(sel) = &self.secret_ref {
            out.push(ValueSource::Lookup(KeyRef::secret(sel)));
        }
        if let Some(v) = &self.value {
            out.push(ValueSource::Literal(v.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(name: &str) -> ValueSelector {
        ValueSelector { name: name.into(), namespace: "ns".into(), key: "k".into() }
    }

    #[test]
    fn chain_follows_precedence_regardless_of_declaration() {
        let nv = NamedValue {
            name: "token".into(),
            secret_ref: Some(sel("s")),
            config_map_ref: Some(sel("cm")),
            value: Some("lit".into()),
            format: None,
        };
        let chain = nv.sources();
        assert_eq!(chain.len(), 3);
        assert!(matches!(&chain[0], ValueSource::Lookup(k) if k.kind == SinkKind::ConfigMap && k.name == "cm"));
        assert!(matches!(&chain[1], ValueSource::Lookup(k) if k.kind == SinkKind::Secret && k.name == "s"));
        assert_eq!(chain[2], ValueSource::Literal("lit".into()));
    }

    #[test]
    fn chain_skips_absent_sources() {
        let nv = NamedValue { name: "q".into(), value: Some("x".into()), ..Default::default() };
        assert_eq!(nv.sources().as_slice(), &[ValueSource::Literal("x".into())]);
        let empty = NamedValue { name: "q".into(), ..Default::default() };
        assert!(empty.sources().is_empty());
    }

    #[test]
    fn key_ref_display() {
        let k = KeyRef::secret(&sel("creds"));
        assert_eq!(k.to_string(), "Secret ns/creds#k");
    }
}
