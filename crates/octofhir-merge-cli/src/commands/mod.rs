pub mod config;
pub mod merge;
pub mod send;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// How a request file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFormat {
    /// Bare GraphQL query text.
    Graphql,
    /// Full GraphQL-over-HTTP JSON body.
    Json,
}

#[derive(Debug)]
pub struct RequestFile {
    pub path: PathBuf,
    pub format: RequestFormat,
    pub contents: String,
}

impl RequestFile {
    pub fn read(path: &Path) -> Result<Self> {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("graphql" | "gql") => RequestFormat::Graphql,
            Some("json") => RequestFormat::Json,
            _ => bail!(
                "Unsupported request file '{}': expected .graphql, .gql or .json",
                path.display()
            ),
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            contents,
        })
    }

    pub fn read_all(paths: &[PathBuf]) -> Result<Vec<Self>> {
        paths.iter().map(|p| Self::read(p)).collect()
    }

    pub fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}
