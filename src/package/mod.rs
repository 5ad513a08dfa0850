//! Frictionless data package model and descriptor I/O
//!
//! Spec: <https://frictionlessdata.io/docs/data-package/>
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use url::Url;

pub mod init;
pub mod validate;

pub use crate::identifier::DESCRIPTOR_FILE;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("Directory walk error: {0}")]
    WalkError(#[from] walkdir::Error),
    #[error("No such file or directory: {0:?}")]
    NotFound(PathBuf),
    #[error("The package has no local directory to be saved into.")]
    NotLocal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Properties this crate does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl License {
    pub fn named(name: impl Into<String>) -> Self {
        License {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<ResourcePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaSource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource {
    /// The path parts, empty for inline data.
    pub fn paths(&self) -> &[String] {
        self.path.as_ref().map(ResourcePath::parts).unwrap_or_default()
    }

    /// True when some part of the path is a file next to the descriptor rather than a URL.
    pub fn is_local(&self) -> bool {
        self.paths().iter().any(|p| !is_url(p))
    }

    /// The schema written in the descriptor, if it is not a reference.
    pub fn inline_schema(&self) -> Option<&Schema> {
        match &self.schema {
            Some(SchemaSource::Inline(schema)) => Some(schema),
            _ => None,
        }
    }
}

pub fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// A single file or the ordered parts of one file split in several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourcePath {
    Single(String),
    Multipart(Vec<String>),
}

impl ResourcePath {
    pub fn parts(&self) -> &[String] {
        match self {
            ResourcePath::Single(path) => std::slice::from_ref(path),
            ResourcePath::Multipart(parts) => parts,
        }
    }

    pub fn parts_mut(&mut self) -> &mut [String] {
        match self {
            ResourcePath::Single(path) => std::slice::from_mut(path),
            ResourcePath::Multipart(parts) => parts,
        }
    }
}

impl From<&str> for ResourcePath {
    fn from(path: &str) -> Self {
        ResourcePath::Single(path.to_owned())
    }
}

impl From<String> for ResourcePath {
    fn from(path: String) -> Self {
        ResourcePath::Single(path)
    }
}

/// A Table Schema written inline or the path/URL of a JSON file holding one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaSource {
    Inline(Schema),
    Reference(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            field_type: Some(field_type.into()),
            extra: Map::new(),
        }
    }
}

/// Where a package's resource paths are resolved from.
#[derive(Debug, Clone, PartialEq)]
pub enum Base {
    Local(PathBuf),
    Remote(Url),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Package {
    pub descriptor: Descriptor,
    pub base: Option<Base>,
}

impl Package {
    pub fn new(descriptor: Descriptor) -> Self {
        Package {
            descriptor,
            base: None,
        }
    }

    pub fn local(descriptor: Descriptor, root: impl Into<PathBuf>) -> Self {
        Package {
            descriptor,
            base: Some(Base::Local(root.into())),
        }
    }

    /// Reads a descriptor from a `datapackage.json` file or from the directory holding one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = if path.is_dir() {
            path.join(DESCRIPTOR_FILE)
        } else {
            path.to_owned()
        };
        if !file.is_file() {
            return Err(Error::NotFound(file));
        }

        let descriptor: Descriptor = serde_json::from_slice(&fs::read(&file)?)?;
        let root = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_owned)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Package::local(descriptor, root))
    }

    /// Parses a descriptor fetched from `url`; relative resource paths resolve against it.
    pub fn from_remote(body: &[u8], url: Url) -> Result<Self, Error> {
        let descriptor = serde_json::from_slice(body)?;
        Ok(Package {
            descriptor,
            base: Some(Base::Remote(url)),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.descriptor.name.as_deref()
    }

    pub fn root(&self) -> Option<&Path> {
        match &self.base {
            Some(Base::Local(root)) => Some(root),
            _ => None,
        }
    }

    /// The file a local path points at; `None` for URLs or without a package directory.
    pub fn local_file(&self, path: &str) -> Option<PathBuf> {
        let root = self.root().filter(|_| !is_url(path))?;
        Some(path.split('/').fold(root.to_owned(), |acc, seg| acc.join(seg)))
    }

    /// The files behind the local parts of a resource.
    pub fn resource_files(&self, resource: &Resource) -> Vec<PathBuf> {
        resource
            .paths()
            .iter()
            .filter_map(|p| self.local_file(p))
            .collect()
    }

    /// The URLs a resource is downloaded from, for packages opened from the registry.
    pub fn resource_urls(&self, resource: &Resource) -> Vec<Url> {
        resource
            .paths()
            .iter()
            .filter_map(|path| match &self.base {
                _ if is_url(path) => Url::parse(path).ok(),
                Some(Base::Remote(url)) => url.join(path).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(&self.descriptor)?)
    }

    /// Writes `datapackage.json` into the package directory.
    pub fn save(&self) -> Result<PathBuf, Error> {
        let root = self.root().ok_or(Error::NotLocal)?;
        let file = root.join(DESCRIPTOR_FILE);
        fs::write(&file, self.to_json()? + "\n")?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_properties_survive_a_round_trip() {
        let raw = json!({
            "name": "gdp",
            "homepage": "https://example.com",
            "resources": [{"name": "gdp", "path": "data/gdp.csv", "dialect": {"delimiter": ";"}}]
        });
        let descriptor: Descriptor = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(descriptor.extra["homepage"], "https://example.com");
        assert_eq!(serde_json::to_value(&descriptor).unwrap(), raw);
    }

    #[test]
    fn load_and_save_use_the_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut descriptor = Descriptor::default();
        descriptor.name = Some("demo".into());
        let package = Package::local(descriptor, dir.path());

        let saved = package.save().unwrap();
        assert_eq!(saved, dir.path().join(DESCRIPTOR_FILE));

        let loaded = Package::load(dir.path()).unwrap();
        assert_eq!(loaded.name(), Some("demo"));
        assert_eq!(loaded.root(), Some(dir.path()));

        assert!(matches!(
            Package::load(dir.path().join("missing")),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(Package::default().save(), Err(Error::NotLocal)));
    }

    #[test]
    fn resources_resolve_against_the_base() {
        let local = Resource {
            path: Some("data/a.csv".into()),
            ..Default::default()
        };
        let remote = Resource {
            path: Some("https://cdn.example.com/a.csv".into()),
            ..Default::default()
        };

        let package = Package::local(Descriptor::default(), "/tmp/pkg");
        assert_eq!(
            package.resource_files(&local),
            [PathBuf::from("/tmp/pkg").join("data").join("a.csv")]
        );
        assert!(package.resource_files(&remote).is_empty());
        assert!(Package::default().resource_files(&local).is_empty());

        let url = Url::parse("https://api.datahub.io/core/gdp/latest/datapackage.json").unwrap();
        let package = Package::from_remote(b"{\"name\": \"gdp\"}", url).unwrap();
        assert_eq!(
            package.resource_urls(&local)[0].as_str(),
            "https://api.datahub.io/core/gdp/latest/data/a.csv"
        );
        assert_eq!(
            package.resource_urls(&remote)[0].as_str(),
            "https://cdn.example.com/a.csv"
        );
    }

    #[test]
    fn multipart_paths_and_schema_references_open() {
        let body = json!({
            "name": "big",
            "resources": [
                {"name": "parts", "path": ["data/1.csv", "data/2.csv"], "schema": "schema.json"},
                {"name": "one", "path": "one.csv", "schema": {"fields": [{"name": "x"}]}}
            ]
        })
        .to_string();
        let url = Url::parse("https://api.datahub.io/core/big/latest/datapackage.json").unwrap();
        let package = Package::from_remote(body.as_bytes(), url).unwrap();

        let parts = &package.descriptor.resources[0];
        assert_eq!(parts.paths(), ["data/1.csv", "data/2.csv"]);
        assert_eq!(
            parts.schema,
            Some(SchemaSource::Reference("schema.json".into()))
        );
        assert!(parts.inline_schema().is_none());
        assert_eq!(
            package
                .resource_urls(parts)
                .iter()
                .map(Url::path)
                .collect::<Vec<_>>(),
            ["/core/big/latest/data/1.csv", "/core/big/latest/data/2.csv"]
        );

        let one = &package.descriptor.resources[1];
        assert_eq!(one.path, Some(ResourcePath::Single("one.csv".into())));
        assert_eq!(one.inline_schema().unwrap().fields[0].name, "x");

        let written: Value = serde_json::from_str(&package.to_json().unwrap()).unwrap();
        assert_eq!(written["resources"][0]["path"], json!(["data/1.csv", "data/2.csv"]));
        assert_eq!(written["resources"][0]["schema"], "schema.json");
    }
}
