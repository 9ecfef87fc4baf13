//! Resolution outcome models.

use serde::{Deserialize, Serialize};

/// How a path was resolved to its canonical identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMethod {
    /// Identity-map hit on canonical or historical path.
    #[serde(rename = "exact")]
    Exact,
    /// Recovered by walking git rename history.
    #[serde(rename = "git-follow")]
    GitFollow,
    /// No history found; downstream queries use the literal path.
    #[serde(rename = "new-file")]
    NewFile,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Exact => "exact",
            ResolutionMethod::GitFollow => "git-follow",
            ResolutionMethod::NewFile => "new-file",
        }
    }
}

/// Resolution of one input path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResolution {
    /// The path as the caller supplied it.
    pub input_path: String,
    /// The file's path at HEAD of the default branch.
    pub canonical_path: String,
    /// Every known name in the rename chain, canonical included.
    pub historical_paths: Vec<String>,
    pub confidence: f64,
    pub method: ResolutionMethod,
}

impl PathResolution {
    pub fn new_file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            input_path: path.clone(),
            canonical_path: path.clone(),
            historical_paths: vec![path],
            confidence: 0.0,
            method: ResolutionMethod::NewFile,
        }
    }

    /// Whether any historical data can exist for this file.
    pub fn has_history(&self) -> bool {
        self.method != ResolutionMethod::NewFile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_resolution_shape() {
        let resolution = PathResolution::new_file("src/fresh.rs");
        assert_eq!(resolution.canonical_path, "src/fresh.rs");
        assert_eq!(resolution.confidence, 0.0);
        assert_eq!(resolution.method, ResolutionMethod::NewFile);
        assert!(!resolution.has_history());
    }
}
