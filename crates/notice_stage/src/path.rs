//! Scene paths
//!
//! A scene path addresses a prim (`/World/Chair`) or one of its properties
//! (`/World/Chair.size`). Paths are always absolute.

use crate::error::{Result, StageError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const ROOT: &str = "/";

/// An absolute path into the scene hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScenePath(String);

impl ScenePath {
    /// Parse and validate a path string
    pub fn parse(path: &str) -> Result<Self> {
        validate(path)?;
        Ok(Self(path.to_string()))
    }

    /// The pseudo-root `/`
    pub fn absolute_root() -> Self {
        Self(ROOT.to_string())
    }

    pub fn is_absolute_root(&self) -> bool {
        self.0 == ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path addresses a property rather than a prim
    pub fn is_property_path(&self) -> bool {
        self.0.contains('.')
    }

    /// The prim owning this path (itself for prim paths)
    pub fn prim_path(&self) -> ScenePath {
        match self.0.split_once('.') {
            Some((prim, _)) => Self(prim.to_string()),
            None => self.clone(),
        }
    }

    /// Last element of the path, empty for the root
    pub fn name(&self) -> &str {
        if let Some((_, property)) = self.0.split_once('.') {
            return property;
        }
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Parent path; a property's parent is its prim
    pub fn parent(&self) -> Option<ScenePath> {
        if self.is_absolute_root() {
            return None;
        }
        if self.is_property_path() {
            return Some(self.prim_path());
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::absolute_root()),
            Some(index) => Some(Self(self.0[..index].to_string())),
            None => None,
        }
    }

    /// All ancestors below the root, shallow-first, ending with this path
    pub fn prefixes(&self) -> Vec<ScenePath> {
        let mut prefixes = Vec::new();
        let mut current = Some(self.clone());
        while let Some(path) = current {
            if path.is_absolute_root() {
                break;
            }
            current = path.parent();
            prefixes.push(path);
        }
        prefixes.reverse();
        prefixes
    }

    /// True when `prefix` is this path or one of its ancestors
    pub fn has_prefix(&self, prefix: &ScenePath) -> bool {
        if prefix.is_absolute_root() || self == prefix {
            return true;
        }
        if prefix.is_property_path() {
            return false;
        }
        match self.0.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.starts_with('/') || rest.starts_with('.'),
            None => false,
        }
    }

    /// Append a child prim name
    pub fn append_child(&self, name: &str) -> Result<ScenePath> {
        if self.is_property_path() {
            return Err(invalid(&self.0, "cannot append a child to a property path"));
        }
        let path = if self.is_absolute_root() {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.0)
        };
        Self::parse(&path)
    }

    /// Append a property name
    pub fn append_property(&self, name: &str) -> Result<ScenePath> {
        if self.is_absolute_root() || self.is_property_path() {
            return Err(invalid(&self.0, "properties can only be appended to prim paths"));
        }
        Self::parse(&format!("{}.{name}", self.0))
    }

    /// Drop every path that has another listed path as ancestor, along
    /// with duplicates. Remaining paths keep their first-seen order.
    pub fn remove_descendant_paths(paths: &mut Vec<ScenePath>) {
        let snapshot = paths.clone();
        let mut seen = HashSet::new();
        paths.retain(|path| {
            let covered = snapshot
                .iter()
                .any(|other| other != path && path.has_prefix(other));
            !covered && seen.insert(path.clone())
        });
    }
}

fn invalid(path: &str, reason: &'static str) -> StageError {
    StageError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

fn validate(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(path, "path is empty"));
    }
    if !path.starts_with('/') {
        return Err(invalid(path, "path must be absolute"));
    }
    if path == ROOT {
        return Ok(());
    }

    let (prim, property) = match path.split_once('.') {
        Some((prim, property)) => (prim, Some(property)),
        None => (path, None),
    };

    for segment in prim[1..].split('/') {
        if segment.is_empty() {
            return Err(invalid(path, "path contains an empty element"));
        }
        if !segment.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid(path, "prim names may only contain letters, digits and '_'"));
        }
    }

    if let Some(property) = property {
        if prim == ROOT {
            return Err(invalid(path, "the root cannot own properties"));
        }
        if property.is_empty()
            || !property
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == ':')
        {
            return Err(invalid(path, "invalid property name"));
        }
    }

    Ok(())
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ScenePath {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ScenePath {
    type Error = StageError;

    fn try_from(value: String) -> Result<Self> {
        validate(&value)?;
        Ok(Self(value))
    }
}

impl From<ScenePath> for String {
    fn from(path: ScenePath) -> Self {
        path.0
    }
}

/// Anything a stage operation accepts as a path
pub trait AsScenePath {
    fn to_scene_path(&self) -> Result<ScenePath>;
}

impl AsScenePath for ScenePath {
    fn to_scene_path(&self) -> Result<ScenePath> {
        Ok(self.clone())
    }
}

impl AsScenePath for str {
    fn to_scene_path(&self) -> Result<ScenePath> {
        ScenePath::parse(self)
    }
}

impl AsScenePath for String {
    fn to_scene_path(&self) -> Result<ScenePath> {
        ScenePath::parse(self)
    }
}

impl<T: AsScenePath + ?Sized> AsScenePath for &T {
    fn to_scene_path(&self) -> Result<ScenePath> {
        (**self).to_scene_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ScenePath {
        ScenePath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for bad in ["", "Foo", "/Foo//Bar", "/Foo/", "/Foo.", "/.size", "/Fo o", "/Foo.a.b"] {
            assert!(ScenePath::parse(bad).is_err(), "{bad} should be rejected");
        }
        assert!(ScenePath::parse("/Foo/Bar.primvars:st").is_ok());
    }

    #[test]
    fn test_prim_path_and_parent() {
        let attr = path("/Foo/Bar.size");
        assert!(attr.is_property_path());
        assert_eq!(attr.prim_path(), path("/Foo/Bar"));
        assert_eq!(attr.parent(), Some(path("/Foo/Bar")));
        assert_eq!(attr.name(), "size");

        assert_eq!(path("/Foo/Bar").parent(), Some(path("/Foo")));
        assert_eq!(path("/Foo").parent(), Some(ScenePath::absolute_root()));
        assert_eq!(ScenePath::absolute_root().parent(), None);
        assert_eq!(path("/Foo/Bar").name(), "Bar");
    }

    #[test]
    fn test_prefixes_are_shallow_first() {
        assert_eq!(
            path("/A/B.c").prefixes(),
            vec![path("/A"), path("/A/B"), path("/A/B.c")]
        );
        assert!(ScenePath::absolute_root().prefixes().is_empty());
    }

    #[test]
    fn test_has_prefix() {
        assert!(path("/Foo/Bar").has_prefix(&path("/Foo")));
        assert!(path("/Foo.size").has_prefix(&path("/Foo")));
        assert!(path("/Foo").has_prefix(&path("/Foo")));
        assert!(path("/Foo").has_prefix(&ScenePath::absolute_root()));
        assert!(!path("/Foobar").has_prefix(&path("/Foo")));
        assert!(!path("/Foo").has_prefix(&path("/Foo/Bar")));
    }

    #[test]
    fn test_append() {
        let root = ScenePath::absolute_root();
        let foo = root.append_child("Foo").unwrap();
        assert_eq!(foo, path("/Foo"));
        assert_eq!(foo.append_property("size").unwrap(), path("/Foo.size"));
        assert!(root.append_property("size").is_err());
        assert!(path("/Foo.size").append_child("Bar").is_err());
    }

    #[test]
    fn test_remove_descendant_paths_keeps_order() {
        let mut paths = vec![path("/Foo/Bar"), path("/Baz"), path("/Foo"), path("/Baz"), path("/Foo/Bar.x")];
        ScenePath::remove_descendant_paths(&mut paths);
        assert_eq!(paths, vec![path("/Baz"), path("/Foo")]);
    }

    #[test]
    fn test_serde_validates() {
        let json = serde_json::to_string(&path("/Foo")).unwrap();
        assert_eq!(json, "\"/Foo\"");
        assert!(serde_json::from_str::<ScenePath>("\"relative\"").is_err());
    }
}
