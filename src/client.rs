//! The DataHub client: one authenticated (or anonymous) session with a registry
//!
use crate::config::{self, Config};
use crate::identifier::{self, Source, DEFAULT_OWNER};
use crate::package::{
    self,
    init::{self, Defaults, Prompter, TerminalPrompter},
    validate::{self, Report},
    Package,
};
use crate::registry::{
    self, Findability, HttpRegistry, Operation, PackageSummary, Profile, PushOutcome, Registry,
    SearchQuery,
};
use crate::search;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::{path::Path, sync::Arc};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("The package is not valid: {0}")]
    Invalid(Report),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("The registry does not implement `{0}`.")]
    NotImplemented(Operation),
    #[error("Config error")]
    ConfigError(#[from] config::Error),
    #[error("Identifier error")]
    IdentifierError(#[from] identifier::Error),
    #[error("Package error")]
    PackageError(#[from] package::Error),
    #[error("Registry error")]
    RegistryError(#[source] registry::Error),
}

impl From<registry::Error> for Error {
    fn from(e: registry::Error) -> Self {
        match e {
            registry::Error::Unauthorized(reason) => Error::Unauthorized(reason),
            registry::Error::NotFound(what) => Error::NotFound(what),
            registry::Error::NotImplemented(operation) => Error::NotImplemented(operation),
            e => Error::RegistryError(e),
        }
    }
}

/// A session with DataHub.
///
/// The client works without a token or with an invalid one; it only fails when an operation
/// needs the user: pushing a package or opening a private one.
pub struct DataHub {
    config: Config,
    registry: Arc<dyn Registry>,
    profile: Option<Profile>,
}

impl DataHub {
    /// Connects to `config.api_address` over HTTP and resolves the user behind `config.token`.
    pub async fn connect(config: Config) -> Result<Self, Error> {
        let registry = HttpRegistry::new(&config)?;
        Ok(Self::with_registry(config, Arc::new(registry)).await)
    }

    /// An anonymous session with <https://api.datahub.io>. No request is sent.
    pub fn anonymous() -> Result<Self, Error> {
        let config = Config::default();
        let registry = HttpRegistry::new(&config)?;
        Ok(DataHub {
            config,
            registry: Arc::new(registry),
            profile: None,
        })
    }

    /// Uses `registry` for every remote operation. A missing or rejected token leaves the
    /// profile empty instead of failing.
    pub async fn with_registry(config: Config, registry: Arc<dyn Registry>) -> Self {
        let profile = resolve_profile(registry.as_ref(), config.token.as_deref()).await;
        DataHub {
            config,
            registry,
            profile,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api_address(&self) -> &Url {
        &self.config.api_address
    }

    pub fn token(&self) -> Option<&str> {
        self.config.token.as_deref()
    }

    /// The user behind the token, empty for anonymous sessions.
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }

    /// Replaces the token and resolves the user again. Returns whether the token was accepted.
    pub async fn authenticate(&mut self, token: impl Into<String>) -> bool {
        self.config.token = config::normalize_token(token.into());
        self.profile = resolve_profile(self.registry.as_ref(), self.token()).await;
        self.is_authenticated()
    }

    /// Inits a data package from a file or a directory and writes its `datapackage.json`.
    ///
    /// With `interactive`, name, title, description and license are asked on the terminal.
    pub fn init(&self, path: impl AsRef<Path>, interactive: bool) -> Result<Package, Error> {
        if interactive {
            self.init_with(path, &mut TerminalPrompter)
        } else {
            self.init_with(path, &mut Defaults)
        }
    }

    pub fn init_with(
        &self,
        path: impl AsRef<Path>,
        prompter: &mut dyn Prompter,
    ) -> Result<Package, Error> {
        let package = init::init(path, prompter)?;
        let saved = package.save()?;
        tracing::info!(
            descriptor = %saved.display(),
            resources = package.descriptor.resources.len(),
            "initialized package"
        );
        Ok(package)
    }

    pub fn validate(&self, package: &Package) -> Report {
        validate::validate(package)
    }

    /// Uploads `package` under the authenticated user.
    ///
    /// Fails with [`Error::Unauthorized`] without a valid token and with [`Error::Invalid`] when
    /// validation finds errors; nothing is sent in both cases.
    pub async fn push(
        &self,
        package: &Package,
        findability: Findability,
    ) -> Result<PushOutcome, Error> {
        let (token, owner) = match (self.token(), self.profile()) {
            (Some(token), Some(owner)) => (token, owner),
            _ => {
                return Err(Error::Unauthorized(
                    "a valid token is required to push".to_owned(),
                ))
            }
        };

        let report = self.validate(package);
        if !report.is_valid() {
            return Err(Error::Invalid(report));
        }

        let outcome = self
            .registry
            .push(package, owner, findability, token)
            .await?;
        Ok(outcome)
    }

    /// Streams the packages matching `query`, fetching pages as the stream is polled.
    pub fn search(&self, query: SearchQuery) -> BoxStream<'static, Result<PackageSummary, Error>> {
        search::paginate(self.registry.clone(), query, self.config.token.clone())
            .map_err(Error::from)
            .boxed()
    }

    /// Opens a package from one of:
    /// * `[owner/]name[/version]`, the owner defaulting to the current user, then to `core`
    /// * a dataset URL: `https://datahub.io/core/gdp[/v/10]`
    /// * a descriptor URL: `https://datahub.io/core/gdp/datapackage.json`
    ///
    /// Private packages open when the token grants access to them.
    pub async fn open(&self, source: impl AsRef<str>) -> Result<Package, Error> {
        let default_owner = self
            .profile
            .as_ref()
            .map(|p| p.username.as_str())
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_OWNER);
        let source = Source::parse(source.as_ref())?.with_default_owner(default_owner);

        let package = self.registry.descriptor(&source, self.token()).await?;
        tracing::info!(%source, name = ?package.name(), "opened package");
        Ok(package)
    }
}

async fn resolve_profile(registry: &dyn Registry, token: Option<&str>) -> Option<Profile> {
    let token = token?;
    match registry.profile(token).await {
        Ok(profile) => {
            tracing::debug!(username = %profile.username, "token accepted");
            Some(profile)
        }
        Err(registry::Error::NotImplemented(_)) => None,
        Err(e) => {
            tracing::warn!(error = %e, "could not resolve the user, continuing anonymously");
            None
        }
    }
}
