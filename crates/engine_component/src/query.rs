//! System signatures.
//!
//! A [`Signature`] lists the component types a system requires. Matching is
//! a logical AND over the listed types; the order only fixes the order in
//! which an entity's components are handed to the system.

use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

/// The ordered set of component types a system requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    types: Vec<String>,
}

impl Signature {
    /// Build a signature from component type names.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::InvalidSignature`] if the list is empty or
    /// names a component type twice.
    pub fn new<I, S>(types: I) -> Result<Self, ComponentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected: Vec<String> = Vec::new();
        for ty in types {
            let ty = ty.into();
            if collected.contains(&ty) {
                return Err(ComponentError::InvalidSignature(format!(
                    "component type '{ty}' listed twice"
                )));
            }
            collected.push(ty);
        }
        if collected.is_empty() {
            return Err(ComponentError::InvalidSignature(
                "a signature needs at least one component type".to_string(),
            ));
        }
        Ok(Self { types: collected })
    }

    /// The component types in declaration order.
    #[must_use]
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Position of `ty` in the signature.
    #[must_use]
    pub fn position(&self, ty: &str) -> Option<usize> {
        self.types.iter().position(|t| t == ty)
    }

    /// Returns `true` if the signature requires `ty`.
    #[must_use]
    pub fn contains(&self, ty: &str) -> bool {
        self.position(ty).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The required types sorted by name.
    ///
    /// Two signatures listing the same types in different orders match the
    /// same entities and share this key.
    #[must_use]
    pub fn match_key(&self) -> Vec<String> {
        let mut key = self.types.clone();
        key.sort_unstable();
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_keeps_order() {
        let sig = Signature::new(["VELOCITY", "POSITION"]).unwrap();
        assert_eq!(sig.types(), ["VELOCITY".to_string(), "POSITION".to_string()]);
        assert_eq!(sig.position("POSITION"), Some(1));
        assert!(sig.contains("VELOCITY"));
        assert!(!sig.contains("AGE"));
    }

    #[test]
    fn test_empty_signature_rejected() {
        let result = Signature::new(Vec::<String>::new());
        assert!(matches!(result, Err(ComponentError::InvalidSignature(_))));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let result = Signature::new(["POSITION", "POSITION"]);
        assert!(matches!(result, Err(ComponentError::InvalidSignature(_))));
    }

    #[test]
    fn test_match_key_ignores_order() {
        let a = Signature::new(["B", "A"]).unwrap();
        let b = Signature::new(["A", "B"]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.match_key(), b.match_key());
    }
}
