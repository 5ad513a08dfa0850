//! The remote package registry: the only place where the client talks to the network
//!
use crate::identifier::Source;
use crate::package::{self, Package};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, io, str::FromStr};
use thiserror::Error;

mod http;

pub use http::HttpRegistry;

/// The remote steps a registry may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Profile,
    Push,
    Search,
    Open,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            Operation::Profile => "profile",
            Operation::Push => "push",
            Operation::Search => "search",
            Operation::Open => "open",
        };
        write!(f, "{}", result)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Serde JSON error. Response: {1}")]
    SerdeJSONError(#[source] serde_json::Error, String),
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("IO error")]
    IoError(#[from] io::Error),
    #[error("Package error")]
    PackageError(#[from] package::Error),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("The server answered {code}: {body}")]
    Status { code: u16, body: String },
    #[error("No local file to upload for `{0}`")]
    MissingData(String),
    #[error("The server rejected the package: {}", .0.join("; "))]
    Rejected(Vec<String>),
    #[error("The registry does not implement `{0}`.")]
    NotImplemented(Operation),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub join_date: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Findability {
    #[default]
    Published,
    Unlisted,
    Private,
}

impl fmt::Display for Findability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            Findability::Published => "published",
            Findability::Unlisted => "unlisted",
            Findability::Private => "private",
        };
        write!(f, "{}", result)
    }
}

impl FromStr for Findability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "published" | "public" => Ok(Findability::Published),
            "unlisted" => Ok(Findability::Unlisted),
            "private" => Ok(Findability::Private),
            other => Err(format!("unknown findability `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSummary {
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub findability: Option<Findability>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keywords: String,
    /// Restricts results to one owner, by [`Profile::id`] rather than username.
    pub owner_id: Option<String>,
    pub findability: Option<Findability>,
    pub page_size: usize,
}

impl SearchQuery {
    pub const DEFAULT_PAGE_SIZE: usize = 20;

    pub fn new(keywords: impl Into<String>) -> Self {
        SearchQuery {
            keywords: keywords.into(),
            owner_id: None,
            findability: None,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_findability(mut self, findability: Findability) -> Self {
        self.findability = Some(findability);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Total number of matches, when the server reports it.
    pub total: Option<usize>,
    pub results: Vec<PackageSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub dataset_id: String,
    pub files_uploaded: usize,
}

/// A remote package registry.
///
/// Every method defaults to [`Error::NotImplemented`] with its own [`Operation`], so a partial
/// registry (or a test fake) only overrides what it supports.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Resolves the user behind `token`.
    async fn profile(&self, _token: &str) -> Result<Profile, Error> {
        Err(Error::NotImplemented(Operation::Profile))
    }

    /// One page of search results starting at `offset`.
    async fn search_page(
        &self,
        _query: &SearchQuery,
        _offset: usize,
        _token: Option<&str>,
    ) -> Result<SearchPage, Error> {
        Err(Error::NotImplemented(Operation::Search))
    }

    /// Fetches the descriptor `source` points at. Identifiers always carry an owner here.
    async fn descriptor(&self, _source: &Source, _token: Option<&str>) -> Result<Package, Error> {
        Err(Error::NotImplemented(Operation::Open))
    }

    /// Uploads the package data and descriptor under `owner`.
    async fn push(
        &self,
        _package: &Package,
        _owner: &Profile,
        _findability: Findability,
        _token: &str,
    ) -> Result<PushOutcome, Error> {
        Err(Error::NotImplemented(Operation::Push))
    }
}

/// A registry that supports nothing; keeps `init` and `validate` usable offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

#[async_trait]
impl Registry for Unimplemented {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::PackageId;

    #[tokio::test]
    async fn unimplemented_registry_names_each_operation() {
        let registry = Unimplemented;
        let source = Source::Id(PackageId::new("core", "gdp"));

        let results = [
            registry.profile("token").await.err(),
            registry
                .search_page(&SearchQuery::new("gdp"), 0, None)
                .await
                .err(),
            registry.descriptor(&source, None).await.err(),
            registry
                .push(&Package::default(), &Profile::default(), Findability::Published, "t")
                .await
                .err(),
        ];
        let operations = results
            .into_iter()
            .map(|e| match e {
                Some(Error::NotImplemented(op)) => op,
                other => panic!("expected NotImplemented, got {other:?}"),
            })
            .collect::<Vec<_>>();

        assert_eq!(
            operations,
            [Operation::Profile, Operation::Search, Operation::Open, Operation::Push]
        );
    }

    #[test]
    fn findability_parses_and_serializes_lowercase() {
        assert_eq!("Private".parse::<Findability>(), Ok(Findability::Private));
        assert_eq!("public".parse::<Findability>(), Ok(Findability::Published));
        assert!("secret".parse::<Findability>().is_err());
        assert_eq!(
            serde_json::to_string(&Findability::Unlisted).unwrap(),
            "\"unlisted\""
        );
    }

    #[test]
    fn page_size_is_at_least_one() {
        assert_eq!(SearchQuery::new("x").with_page_size(0).page_size, 1);
        assert_eq!(SearchQuery::new("x").page_size, SearchQuery::DEFAULT_PAGE_SIZE);
    }
}
