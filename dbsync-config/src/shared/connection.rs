use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::config_error;
use crate::error::{ConfigResult, ErrorKind};
use crate::properties::{KEY_SEPARATOR, PropertySource};

/// Prefix of the target database connection keys.
pub const TARGET_PREFIX: &str = "target";

/// Prefix of the bookkeeping database connection keys.
pub const BOOKKEEPING_PREFIX: &str = "bookkeeping";

const URL: &str = "url";
const USER: &str = "user";
const PASSWD: &str = "passwd";

/// Connection settings for one database endpoint.
///
/// No field has a default; whether a missing field is an error is decided by the caller.
#[derive(Clone, Debug, Default)]
pub struct ConnectionConfig {
    pub jdbc_url: Option<String>,
    pub user: Option<String>,
    pub passwd: Option<SecretString>,
}

impl ConnectionConfig {
    /// Reads `<prefix>.url`, `<prefix>.user` and `<prefix>.passwd`.
    pub fn resolve<P>(properties: &P, prefix: &str) -> Self
    where
        P: PropertySource,
    {
        let connection = properties.subset(prefix);

        Self {
            jdbc_url: connection.get_string(URL),
            user: connection.get_string(USER),
            passwd: connection.get_string(PASSWD).map(SecretString::new),
        }
    }
}

impl PartialEq for ConnectionConfig {
    fn eq(&self, other: &Self) -> bool {
        let passwd = |config: &Self| config.passwd.as_ref().map(|p| p.expose_secret().clone());

        self.jdbc_url == other.jdbc_url && self.user == other.user && passwd(self) == passwd(other)
    }
}

/// Same as [`ConnectionConfig`] but without secrets. This type
/// implements [`Serialize`] because it does not contain secrets
/// so is safe to serialize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionConfigWithoutSecrets {
    pub jdbc_url: Option<String>,
    pub user: Option<String>,
}

impl From<ConnectionConfig> for ConnectionConfigWithoutSecrets {
    fn from(value: ConnectionConfig) -> Self {
        ConnectionConfigWithoutSecrets {
            jdbc_url: value.jdbc_url,
            user: value.user,
        }
    }
}

/// The `target` and `bookkeeping` database connections.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionsConfig {
    pub target: ConnectionConfig,
    pub bookkeeping: ConnectionConfig,
}

impl ConnectionsConfig {
    /// Resolves both connections.
    ///
    /// `target.url` is required. When `bookkeeping.url` is absent the whole bookkeeping
    /// connection is replaced by the target connection; fields are never merged.
    pub fn resolve<P>(properties: &P) -> ConfigResult<Self>
    where
        P: PropertySource,
    {
        let target = ConnectionConfig::resolve(properties, TARGET_PREFIX);
        if target.jdbc_url.is_none() {
            return Err(config_error!(
                ErrorKind::MissingRequiredField,
                "Missing url for the target database"
            )
            .with_key(format!("{TARGET_PREFIX}{KEY_SEPARATOR}{URL}")));
        }

        let bookkeeping = ConnectionConfig::resolve(properties, BOOKKEEPING_PREFIX);
        let bookkeeping = if bookkeeping.jdbc_url.is_none() {
            target.clone()
        } else {
            bookkeeping
        };

        Ok(Self {
            target,
            bookkeeping,
        })
    }
}
