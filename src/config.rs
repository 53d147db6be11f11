//! NDR credential configuration
//!
//! The register client authenticates against a tenant-scoped OAuth2 endpoint
//! and addresses two SharePoint lists by GUID, so six values are required:
//! site id, client id, client secret, tenant id, and the project/file list
//! ids. All of them must be present and non-empty before a client is
//! constructed — a missing credential is a startup failure, not something to
//! discover on the first query.
//!
//! ## Loading order
//!
//! 1. `NDR_CREDENTIALS` environment variable (path to a TOML file)
//! 2. `ndr_credentials.toml` in the current working directory
//! 3. Individual `NDR_API_*` environment variables

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable names, one per credential.
const ENV_SITE_ID: &str = "NDR_API_SITE_ID";
const ENV_CLIENT_ID: &str = "NDR_API_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "NDR_API_CLIENT_SECRET";
const ENV_TENANT_ID: &str = "NDR_API_TENANT_ID";
const ENV_PROJECT_ID: &str = "NDR_API_PROJECT_ID";
const ENV_FILE_ID: &str = "NDR_API_FILE_ID";

/// Error raised while loading or validating credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// A credential is absent or empty. Carries the logical field name.
    #[error("expected {0} to be set")]
    Missing(&'static str),
    #[error("credentials file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("credentials file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

/// GUIDs of the two register lists the client queries.
#[derive(Debug, Clone, Deserialize)]
pub struct ListIds {
    /// The project list — one row per survey/project (`ptyp`, `quad`, `survid`).
    pub project_id: String,
    /// The file list — one row per deliverable file (`fnam`, `ffmt`, ...).
    pub file_id: String,
}

/// Complete credential set for the NDR register.
///
/// Immutable once constructed; validation happens here, eagerly, rather than
/// scattered through the request path.
#[derive(Debug, Clone, Deserialize)]
pub struct NdrCredentials {
    pub site_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub lists: ListIds,
}

impl NdrCredentials {
    /// Build a credential set from explicit values, validating every field.
    pub fn new(
        site_id: &str,
        client_id: &str,
        client_secret: &str,
        tenant_id: &str,
        project_id: &str,
        file_id: &str,
    ) -> Result<Self, CredentialsError> {
        let creds = Self {
            site_id: site_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            tenant_id: tenant_id.to_string(),
            lists: ListIds {
                project_id: project_id.to_string(),
                file_id: file_id.to_string(),
            },
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Load credentials using the standard search order:
    /// 1. `$NDR_CREDENTIALS` (path to a TOML file)
    /// 2. `./ndr_credentials.toml`
    /// 3. `NDR_API_*` environment variables
    ///
    /// A file that exists but fails to parse or validate is fatal — it does
    /// not fall through to the next source.
    pub fn load() -> Result<Self, CredentialsError> {
        if let Ok(path) = std::env::var("NDR_CREDENTIALS") {
            let p = PathBuf::from(&path);
            if p.exists() {
                let creds = Self::from_file(&p)?;
                info!(path = %p.display(), "Loaded NDR credentials from NDR_CREDENTIALS");
                return Ok(creds);
            }
            warn!(path = %path, "NDR_CREDENTIALS points to non-existent file, falling back");
        }

        let local = PathBuf::from("ndr_credentials.toml");
        if local.exists() {
            let creds = Self::from_file(&local)?;
            info!("Loaded NDR credentials from ./ndr_credentials.toml");
            return Ok(creds);
        }

        let creds = Self::from_env()?;
        info!("Loaded NDR credentials from environment variables");
        Ok(creds)
    }

    /// Load and validate credentials from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CredentialsError::Io(path.to_path_buf(), e))?;
        let creds: Self = toml::from_str(&contents)
            .map_err(|e| CredentialsError::Parse(path.to_path_buf(), e))?;
        creds.validate()?;
        Ok(creds)
    }

    /// Load and validate credentials from the `NDR_API_*` environment variables.
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CredentialsError> {
        let var = |name: &str| lookup(name).unwrap_or_default();
        let creds = Self {
            site_id: var(ENV_SITE_ID),
            client_id: var(ENV_CLIENT_ID),
            client_secret: var(ENV_CLIENT_SECRET),
            tenant_id: var(ENV_TENANT_ID),
            lists: ListIds {
                project_id: var(ENV_PROJECT_ID),
                file_id: var(ENV_FILE_ID),
            },
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Check that every credential, including the nested list ids, is non-empty.
    fn validate(&self) -> Result<(), CredentialsError> {
        let fields: [(&'static str, &str); 6] = [
            ("site id", &self.site_id),
            ("client id", &self.client_id),
            ("client secret", &self.client_secret),
            ("tenant id", &self.tenant_id),
            ("project id", &self.lists.project_id),
            ("file id", &self.lists.file_id),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(CredentialsError::Missing(name));
            }
        }
        Ok(())
    }
}
