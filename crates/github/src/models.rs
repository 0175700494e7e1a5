// crates/github/src/models.rs
//! Response bodies for the endpoints the client uses

use repolens_core::Repository;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
}

impl RepositoryInfo {
    /// Domain repository with a fresh local id
    pub fn to_repository(&self) -> Repository {
        let mut repo = Repository::new(&self.owner.login, &self.name);
        repo.default_branch = self.default_branch.clone();
        repo.primary_language = self.language.clone();
        repo.description = self.description.clone();
        repo.stars = self.stargazers_count;
        repo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// One entry of `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ContentEntry {
    pub fn is_file(&self) -> bool {
        self.kind == ContentKind::File
    }
}

/// The contents endpoint returns an object for a file and an array for a
/// directory
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsResponse {
    Directory(Vec<ContentEntry>),
    File(Box<ContentEntry>),
}

impl ContentsResponse {
    pub(crate) fn into_entries(self) -> Vec<ContentEntry> {
        match self {
            Self::Directory(entries) => entries,
            Self::File(entry) => vec![*entry],
        }
    }
}

/// Error body GitHub sends with 4xx/5xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}
