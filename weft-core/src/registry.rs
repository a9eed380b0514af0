//! In-memory collection of discovered packages keyed by name.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::package::{normalize_name, Package};

/// Owns the packages of one workspace snapshot, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: IndexMap<String, Arc<Package>>,
    normalized: IndexMap<String, String>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry, rejecting two packages whose names normalize to
    /// the same key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePackage`] on a name collision.
    pub fn from_packages(packages: impl IntoIterator<Item = Package>) -> Result<Self> {
        let mut registry = Self::new();
        for package in packages {
            registry.insert(package)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, package: Package) -> Result<()> {
        let key = package.normalized_name();
        if let Some(existing) = self.normalized.get(&key).and_then(|n| self.packages.get(n)) {
            return Err(Error::DuplicatePackage {
                name: package.name.clone(),
                first: existing.path.clone(),
                second: package.path.clone(),
            });
        }
        self.normalized.insert(key, package.name.clone());
        self.packages.insert(package.name.clone(), Arc::new(package));
        Ok(())
    }

    /// Looks up a package by exact or normalized name.
    pub fn find(&self, name: &str) -> Option<&Arc<Package>> {
        self.packages.get(name).or_else(|| {
            self.normalized
                .get(&normalize_name(name))
                .and_then(|real| self.packages.get(real))
        })
    }

    /// Looks up a package that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotFound`] listing the available names.
    pub fn get(&self, name: &str) -> Result<&Arc<Package>> {
        self.find(name).ok_or_else(|| Error::PackageNotFound {
            name: name.to_string(),
            available: self.available(),
        })
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.packages.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Shared handles to every package in discovery order.
    pub fn to_vec(&self) -> Vec<Arc<Package>> {
        self.packages.values().cloned().collect()
    }

    pub(crate) fn as_map(&self) -> &IndexMap<String, Arc<Package>> {
        &self.packages
    }

    fn available(&self) -> String {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str) -> Package {
        Package::new(name, format!("/ws/{}", name), "1.0.0")
    }

    #[test]
    fn test_lookup_by_normalized_name() {
        let registry = PackageRegistry::from_packages(vec![pkg("api-core"), pkg("web")]).unwrap();
        assert_eq!(registry.find("API_core").unwrap().name, "api-core");
        assert!(registry.contains("web"));
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_get_missing_lists_available() {
        let registry = PackageRegistry::from_packages(vec![pkg("b"), pkg("a")]).unwrap();
        let err = registry.get("zzz").unwrap_err();
        match err {
            Error::PackageNotFound { name, available } => {
                assert_eq!(name, "zzz");
                assert_eq!(available, "a, b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_normalized_names_rejected() {
        let result = PackageRegistry::from_packages(vec![pkg("my-pkg"), pkg("my_pkg")]);
        assert!(matches!(result, Err(Error::DuplicatePackage { .. })));
    }

    #[test]
    fn test_preserves_discovery_order() {
        let registry = PackageRegistry::from_packages(vec![pkg("c"), pkg("a"), pkg("b")]).unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
