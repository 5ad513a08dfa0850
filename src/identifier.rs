//! Package identifiers (`[owner/]name[/version]`) and the sources accepted by `open`
//!
use std::{fmt, str::FromStr};
use thiserror::Error;
use url::Url;

/// The owner used when neither the identifier nor the session names one.
pub const DEFAULT_OWNER: &str = "core";

pub const DESCRIPTOR_FILE: &str = "datapackage.json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("The package identifier is empty.")]
    Empty,
    #[error("The package identifier `{0}` has an empty segment.")]
    EmptySegment(String),
    #[error("The package identifier `{0}` has more than 3 segments.")]
    TooManySegments(String),
    #[error("`{0}` is not a valid version, versions are revision numbers.")]
    BadVersion(String),
    #[error("`{0}` contains characters outside [A-Za-z0-9._-].")]
    BadName(String),
    #[error("The URL `{0}` is neither a dataset URL nor a descriptor URL.")]
    UnsupportedUrl(String),
    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageId {
    pub owner: Option<String>,
    pub name: String,
    pub version: Option<u32>,
}

impl PackageId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        PackageId {
            owner: Some(owner.into()),
            name: name.into(),
            version: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Empty);
        }

        let segments = input.split('/').collect::<Vec<_>>();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::EmptySegment(input.to_owned()));
        }

        // `a/1` reads as name/version, `a/b` as owner/name
        let (owner, name, version) = match segments.as_slice() {
            [name] => (None, *name, None),
            [name, version] if is_revision(version) => (None, *name, Some(*version)),
            [owner, name] => (Some(*owner), *name, None),
            [owner, name, version] => (Some(*owner), *name, Some(*version)),
            _ => return Err(Error::TooManySegments(input.to_owned())),
        };

        if let Some(owner) = owner {
            check_name(owner)?;
        }
        check_name(name)?;
        let version = version.map(parse_version).transpose()?;

        Ok(PackageId {
            owner: owner.map(str::to_owned),
            name: name.to_owned(),
            version,
        })
    }

    pub fn owner_or<'a>(&'a self, default_owner: &'a str) -> &'a str {
        self.owner.as_deref().unwrap_or(default_owner)
    }

    /// The version segment used in store paths: the revision number or `latest`.
    pub fn version_segment(&self) -> String {
        self.version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "latest".to_owned())
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "{owner}/")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(version) = self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}

impl FromStr for PackageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageId::parse(s)
    }
}

/// What `open` accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `[owner/]name[/version]`
    Id(PackageId),
    /// `https://datahub.io/core/gdp[/v/10]`
    Dataset(Url, PackageId),
    /// `https://datahub.io/core/gdp/datapackage.json`
    Descriptor(Url),
}

impl Source {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();
        if input.starts_with("http://") || input.starts_with("https://") {
            let url = Url::parse(input)?;
            return Self::from_url(url);
        }
        Ok(Source::Id(PackageId::parse(input)?))
    }

    fn from_url(url: Url) -> Result<Self, Error> {
        let segments = url
            .path_segments()
            .map(|s| s.filter(|x| !x.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();

        if segments.last() == Some(&DESCRIPTOR_FILE) {
            return Ok(Source::Descriptor(url));
        }

        let id = match segments.as_slice() {
            [owner, name] => PackageId::new(*owner, *name),
            [owner, name, "v", version] => PackageId {
                version: Some(parse_version(version)?),
                ..PackageId::new(*owner, *name)
            },
            _ => return Err(Error::UnsupportedUrl(url.to_string())),
        };
        check_name(id.owner_or(DEFAULT_OWNER))?;
        check_name(&id.name)?;

        Ok(Source::Dataset(url, id))
    }

    /// Fills the owner of an identifier that does not name one.
    pub fn with_default_owner(self, owner: &str) -> Self {
        match self {
            Source::Id(mut id) => {
                if id.owner.is_none() {
                    id.owner = Some(owner.to_owned());
                }
                Source::Id(id)
            }
            other => other,
        }
    }

    pub fn package_id(&self) -> Option<&PackageId> {
        match self {
            Source::Id(id) | Source::Dataset(_, id) => Some(id),
            Source::Descriptor(_) => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Id(id) => write!(f, "{id}"),
            Source::Dataset(url, _) | Source::Descriptor(url) => write!(f, "{url}"),
        }
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::parse(s)
    }
}

fn is_revision(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_version(s: &str) -> Result<u32, Error> {
    if !is_revision(s) {
        return Err(Error::BadVersion(s.to_owned()));
    }
    s.parse().map_err(|_| Error::BadVersion(s.to_owned()))
}

fn check_name(s: &str) -> Result<(), Error> {
    let valid = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::BadName(s.to_owned()))
    }
}
