//! DataHub HTTP API
//!
use super::*;
use crate::config::Config;
use crate::identifier::DEFAULT_OWNER;
use crate::package::ResourcePath;
use reqwest::{header::CONTENT_LENGTH, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use url::Url;

pub struct HttpRegistry {
    address: Url,
    client: Client,
}

impl HttpRegistry {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(HttpRegistry {
            address: config.api_address.clone(),
            client,
        })
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.address.join(path)?)
    }

    /// Where the descriptor of `source` lives.
    pub fn descriptor_url(&self, source: &Source) -> Result<Url, Error> {
        match source {
            Source::Descriptor(url) => Ok(url.clone()),
            Source::Id(id) | Source::Dataset(_, id) => self.endpoint(&format!(
                "{}/{}/{}/{}",
                id.owner_or(DEFAULT_OWNER),
                id.name,
                id.version_segment(),
                package::DESCRIPTOR_FILE
            )),
        }
    }

    async fn send(request: RequestBuilder) -> Result<(Url, String), Error> {
        let response = request.send().await?;
        let url = response.url().clone();
        let status = response.status();
        let body = response.text().await?;
        check_status(status, &url, body).map(|body| (url, body))
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Error> {
        let (_, body) = Self::send(request).await?;
        serde_json::from_str(&body).map_err(|e| Error::SerdeJSONError(e, body))
    }
}

fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Drops the request URL from transport errors, for requests carrying the token in the query.
fn without_url(e: Error) -> Error {
    match e {
        Error::ReqwestError(e) => Error::ReqwestError(e.without_url()),
        e => e,
    }
}

fn check_status(status: StatusCode, url: &Url, body: String) -> Result<String, Error> {
    match status {
        s if s.is_success() => Ok(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(Error::Unauthorized(url.path().to_owned()))
        }
        StatusCode::NOT_FOUND => Err(Error::NotFound(url.path().to_owned())),
        s => Err(Error::Status {
            code: s.as_u16(),
            body,
        }),
    }
}

#[derive(Deserialize)]
struct CheckResponse {
    #[serde(default)]
    authorized: bool,
    profile: Option<Profile>,
}

#[derive(Deserialize)]
struct SearchResponse {
    summary: Option<SearchSummary>,
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchSummary {
    total: usize,
}

#[derive(Deserialize)]
struct SearchItem {
    id: Option<String>,
    name: String,
    title: Option<String>,
    description: Option<String>,
    datahub: Option<SearchItemMeta>,
}

#[derive(Deserialize)]
struct SearchItemMeta {
    owner: Option<String>,
    findability: Option<Findability>,
}

impl From<SearchItem> for PackageSummary {
    fn from(item: SearchItem) -> Self {
        let (owner, findability) = item
            .datahub
            .map(|m| (m.owner, m.findability))
            .unwrap_or_default();
        let id = item.id.unwrap_or_else(|| match &owner {
            Some(owner) => format!("{owner}/{}", item.name),
            None => item.name.clone(),
        });

        PackageSummary {
            id,
            name: item.name,
            title: item.title,
            description: item.description,
            owner,
            findability,
        }
    }
}

#[derive(Deserialize)]
struct AuthorizeResponse {
    filedata: BTreeMap<String, UploadTarget>,
}

#[derive(Deserialize)]
struct UploadTarget {
    upload_url: String,
    remote_url: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

struct LocalFile {
    /// The path as written in the descriptor, also the upload key.
    path: String,
    name: String,
    file: PathBuf,
    length: u64,
    sha256: String,
}

async fn hash_file(file: &Path) -> Result<(u64, String), Error> {
    let mut reader = tokio::fs::File::open(file).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 64 * 1024];
    let mut length = 0;
    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        length += read as u64;
    }
    Ok((length, hex::encode(hasher.finalize())))
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn profile(&self, token: &str) -> Result<Profile, Error> {
        let url = self.endpoint("auth/check")?;
        tracing::debug!(path = url.path(), "checking token");

        let request = self.client.get(url).query(&[("jwt", token)]);
        let response: CheckResponse = Self::send_json(request).await.map_err(without_url)?;
        match response.profile {
            Some(profile) if response.authorized => Ok(profile),
            _ => Err(Error::Unauthorized("the token was rejected".to_owned())),
        }
    }

    async fn search_page(
        &self,
        query: &SearchQuery,
        offset: usize,
        token: Option<&str>,
    ) -> Result<SearchPage, Error> {
        let url = self.endpoint("metastore/search")?;
        let mut params = vec![
            ("q", query.keywords.clone()),
            ("size", query.page_size.to_string()),
            ("from", offset.to_string()),
        ];
        if let Some(owner_id) = &query.owner_id {
            params.push(("datahub.ownerid", owner_id.clone()));
        }
        if let Some(findability) = query.findability {
            params.push(("findability", findability.to_string()));
        }
        tracing::debug!(q = %query.keywords, offset, "searching");

        let request = with_token(self.client.get(url).query(&params), token);
        let response: SearchResponse = Self::send_json(request).await?;

        Ok(SearchPage {
            total: response.summary.map(|s| s.total),
            results: response.results.into_iter().map(Into::into).collect(),
        })
    }

    async fn descriptor(&self, source: &Source, token: Option<&str>) -> Result<Package, Error> {
        let url = self.descriptor_url(source)?;
        tracing::debug!(%url, "fetching descriptor");

        let (url, body) = Self::send(with_token(self.client.get(url), token)).await?;
        Package::from_remote(body.as_bytes(), url).map_err(|e| match e {
            package::Error::SerdeJSONError(e) => Error::SerdeJSONError(e, body),
            e => e.into(),
        })
    }

    async fn push(
        &self,
        package: &Package,
        owner: &Profile,
        findability: Findability,
        token: &str,
    ) -> Result<PushOutcome, Error> {
        let mut files: Vec<LocalFile> = vec![];
        for resource in &package.descriptor.resources {
            for part in resource.paths().iter().filter(|p| !package::is_url(p)) {
                if files.iter().any(|f| f.path == *part) {
                    continue;
                }
                let file = package
                    .local_file(part)
                    .ok_or_else(|| Error::MissingData(part.clone()))?;
                let (length, sha256) = hash_file(&file).await?;
                files.push(LocalFile {
                    path: part.clone(),
                    name: resource.name.clone().unwrap_or_else(|| part.clone()),
                    file,
                    length,
                    sha256,
                });
            }
        }

        let mut descriptor = package.descriptor.clone();
        if !files.is_empty() {
            let filedata = files
                .iter()
                .map(|f| {
                    let info = json!({
                        "length": f.length,
                        "sha256": f.sha256,
                        "name": f.name,
                    });
                    (f.path.clone(), info)
                })
                .collect::<serde_json::Map<_, _>>();
            let body = json!({
                "metadata": {"owner": owner.id, "findability": findability},
                "filedata": filedata,
            });

            let request = self
                .client
                .post(self.endpoint("rawstore/authorize")?)
                .bearer_auth(token)
                .json(&body);
            let mut authorized: AuthorizeResponse = Self::send_json(request).await?;

            for file in &files {
                let target = authorized.filedata.remove(&file.path).ok_or_else(|| {
                    Error::Rejected(vec![format!("no upload slot for {}", file.path)])
                })?;
                tracing::debug!(path = %file.path, bytes = file.length, "uploading");

                let data = tokio::fs::File::open(&file.file).await?;
                let request = self
                    .client
                    .put(target.upload_url.as_str())
                    .header(CONTENT_LENGTH, file.length)
                    .body(data);
                Self::send(request).await?;

                let parts = descriptor
                    .resources
                    .iter_mut()
                    .filter_map(|r| r.path.as_mut())
                    .flat_map(ResourcePath::parts_mut);
                for part in parts {
                    if *part == file.path {
                        *part = target.remote_url.clone();
                    }
                }
            }
        }

        let dataset = descriptor.name.clone().unwrap_or_default();
        let body = json!({
            "meta": {
                "owner": owner.username,
                "ownerid": owner.id,
                "dataset": dataset,
                "findability": findability,
            },
            "descriptor": descriptor,
        });
        let request = self
            .client
            .post(self.endpoint("source/upload")?)
            .bearer_auth(token)
            .json(&body);
        let response: UploadResponse = Self::send_json(request).await?;
        if !response.success {
            return Err(Error::Rejected(response.errors));
        }

        let dataset_id = response
            .id
            .unwrap_or_else(|| format!("{}/{}", owner.username, dataset));
        tracing::info!(dataset = %dataset_id, files = files.len(), "pushed package");

        Ok(PushOutcome {
            dataset_id,
            files_uploaded: files.len(),
        })
    }
}
