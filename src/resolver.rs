//! Location parsing
//!
//! Turns `hdfs://[user@]host:port/path` or a bare `/path` into the server
//! to contact, the identity to act as, and the path inside the store.
//! Bare paths need a default server from the environment.

use crate::error::ResolveError;
use percent_encoding::percent_decode_str;
use url::Url;

/// Env var naming the default server ('<host>:<port>')
pub const SERVER_ENV: &str = "HADOOP_NAMENODE";

/// Env var naming the default user
pub const USER_ENV: &str = "HADOOP_USER_NAME";

/// Scheme whose host is used as the server address
pub const DEFAULT_SCHEME: &str = "hdfs";

/// Where and as whom to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Server address ('<host>' or '<host>:<port>')
    pub server: String,

    /// User to act as, if any source provided one
    pub identity: Option<String>,

    /// Path inside the remote store
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    default_server: Option<String>,
    default_user: Option<String>,
    local_identity: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl PathResolver {
    /// Resolver without defaults, using the process user as last resort
    pub fn new() -> Self {
        Self {
            default_server: None,
            default_user: None,
            local_identity: current_user_name(),
        }
    }

    /// Resolver with defaults read from `HADOOP_NAMENODE` and `HADOOP_USER_NAME`
    pub fn from_env() -> Self {
        Self::new()
            .with_default_server(std::env::var(SERVER_ENV).ok())
            .with_default_user(std::env::var(USER_ENV).ok())
    }

    pub fn with_default_server(mut self, server: Option<String>) -> Self {
        self.default_server = non_empty(server);
        self
    }

    pub fn with_default_user(mut self, user: Option<String>) -> Self {
        self.default_user = non_empty(user);
        self
    }

    /// Override the process identity (last fallback)
    pub fn with_local_identity(mut self, identity: Option<String>) -> Self {
        self.local_identity = non_empty(identity);
        self
    }

    pub fn resolve(&self, location: &str) -> Result<Resolved, ResolveError> {
        let parse_error = |reason: &str| ResolveError::Parse {
            location: location.to_string(),
            reason: reason.to_string(),
        };

        if location.trim().is_empty() {
            return Err(parse_error("empty location"));
        }

        let (uri_server, uri_user, path) = if location.contains("://") {
            let url = Url::parse(location).map_err(|e| parse_error(&e.to_string()))?;

            let server = match url.host_str() {
                Some(host) if !host.is_empty() && url.scheme() == DEFAULT_SCHEME => {
                    Some(match url.port() {
                        Some(port) => format!("{}:{}", host, port),
                        None => host.to_string(),
                    })
                }
                _ => None,
            };

            // Url keeps the path percent-encoded; the store wants it as typed
            let path = percent_decode_str(url.path())
                .decode_utf8()
                .map_err(|e| parse_error(&format!("path is not valid UTF-8: {}", e)))?
                .into_owned();

            (server, non_empty(Some(url.username().to_string())), path)
        } else {
            (None, None, location.to_string())
        };

        if path.is_empty() {
            return Err(parse_error("missing path"));
        }

        let server = uri_server
            .or_else(|| self.default_server.clone())
            .ok_or_else(|| ResolveError::Configuration {
                location: location.to_string(),
            })?;

        let identity = uri_user
            .or_else(|| self.default_user.clone())
            .or_else(|| self.local_identity.clone());

        Ok(Resolved {
            server,
            identity,
            path,
        })
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Login name of the user running the process
pub fn current_user_name() -> Option<String> {
    non_empty(whoami::fallible::username().ok())
}
