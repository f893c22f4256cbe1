use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identity of a document within a session. In memory this is the absolute
/// on-disk path; the store converts it to a root-relative form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(PathBuf);

impl DocPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for DocPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<&str> for DocPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for DocPath {
    fn from(p: PathBuf) -> Self {
        Self(p)
    }
}

/// Split-pane slot an editor occupies. Hosts number columns from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewColumn(pub u32);

impl fmt::Display for ViewColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_path_display() {
        let p = DocPath::from("/work/src/main.rs");
        assert_eq!(p.to_string(), "/work/src/main.rs");
        assert_eq!(p.as_path(), Path::new("/work/src/main.rs"));
    }

    #[test]
    fn doc_paths_sort_lexically() {
        let mut paths = vec![DocPath::from("/b"), DocPath::from("/a/z"), DocPath::from("/a")];
        paths.sort();
        assert_eq!(paths, vec![DocPath::from("/a"), DocPath::from("/a/z"), DocPath::from("/b")]);
    }

    #[test]
    fn view_column_serde_is_bare_number() {
        let json = serde_json::to_string(&ViewColumn(2)).unwrap();
        assert_eq!(json, "2");
    }
}
