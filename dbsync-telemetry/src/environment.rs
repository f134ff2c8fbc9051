use std::fmt;
use std::io::Error;

/// Environment variable selecting how the service logs.
const DBSYNC_ENVIRONMENT_ENV_NAME: &str = "DBSYNC_ENVIRONMENT";

const PROD_ENV_NAME: &str = "prod";
const DEV_ENV_NAME: &str = "dev";

/// Runtime environment of the dbsync service.
///
/// Production writes JSON logs to rotating files, development pretty-prints to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Prod,
    Dev,
}

impl Environment {
    /// Reads the environment from `DBSYNC_ENVIRONMENT`, defaulting to [`Environment::Prod`].
    pub fn load() -> Result<Environment, Error> {
        std::env::var(DBSYNC_ENVIRONMENT_ENV_NAME)
            .unwrap_or_else(|_| PROD_ENV_NAME.into())
            .try_into()
    }

    /// Stores this environment in `DBSYNC_ENVIRONMENT` for the current process.
    pub fn set(&self) {
        unsafe { std::env::set_var(DBSYNC_ENVIRONMENT_ENV_NAME, self.to_string()) }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Environment::Prod => f.write_str(PROD_ENV_NAME),
            Environment::Dev => f.write_str(DEV_ENV_NAME),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    /// Parses `dev` or `prod`, ignoring case.
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            PROD_ENV_NAME => Ok(Self::Prod),
            DEV_ENV_NAME => Ok(Self::Dev),
            other => Err(Error::other(format!(
                "{other} is not a supported environment. Use either `{PROD_ENV_NAME}` or `{DEV_ENV_NAME}`.",
            ))),
        }
    }
}
