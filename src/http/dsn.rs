use core::fmt;
use std::str::FromStr;

use eyre::{Context, OptionExt};
use http::Uri;

const SENTRY_VERSION: u8 = 7;

/// Parsed credential of the form `{scheme}://{public_key}[:{secret}]@{host}[:{port}]/{path/}{project_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    scheme: String,
    public_key: String,
    secret_key: Option<String>,
    host: String,
    port: Option<u16>,
    path: String,
    project_id: String,
}

impl Dsn {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn host_and_port(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Endpoint reports are posted to.
    pub fn store_url(&self) -> String {
        format!(
            "{}://{}{}/api/{}/store/",
            self.scheme,
            self.host_and_port(),
            self.path,
            self.project_id
        )
    }

    /// Value of the `X-Sentry-Auth` header.
    pub fn auth_header(&self, client: &str, timestamp: i64) -> String {
        let mut header = format!(
            "Sentry sentry_version={}, sentry_client={}, sentry_timestamp={}, sentry_key={}",
            SENTRY_VERSION, client, timestamp, self.public_key
        );
        if let Some(secret) = &self.secret_key {
            header.push_str(&format!(", sentry_secret={}", secret));
        }
        header
    }
}

impl FromStr for Dsn {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uri: Uri = s
            .trim()
            .parse()
            .with_context(|| format!("Invalid DSN {:?}", s))?;

        let scheme = uri
            .scheme_str()
            .ok_or_eyre(format!("DSN {:?} is missing a scheme", s))?;
        if scheme != "http" && scheme != "https" {
            eyre::bail!("DSN {:?} has unsupported scheme {}", s, scheme);
        }

        let authority = uri
            .authority()
            .ok_or_eyre(format!("DSN {:?} is missing a host", s))?;
        let (userinfo, _) = authority
            .as_str()
            .rsplit_once('@')
            .ok_or_eyre(format!("DSN {:?} is missing the public key", s))?;
        let (public_key, secret_key) = match userinfo.split_once(':') {
            Some((public, secret)) => (public, Some(secret.to_string())),
            None => (userinfo, None),
        };
        if public_key.is_empty() {
            eyre::bail!("DSN {:?} is missing the public key", s);
        }

        let path = uri.path().trim_end_matches('/');
        let (prefix, project_id) = path.rsplit_once('/').unwrap_or(("", path));
        if project_id.is_empty() || !project_id.chars().all(|c| c.is_ascii_digit()) {
            eyre::bail!("DSN {:?} does not end in a numeric project id", s);
        }

        Ok(Self {
            scheme: scheme.to_string(),
            public_key: public_key.to_string(),
            secret_key,
            host: authority.host().to_string(),
            port: authority.port_u16(),
            path: prefix.to_string(),
            project_id: project_id.to_string(),
        })
    }
}

/// Masks the secret key, so a `Dsn` can appear in errors and logs.
impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.public_key)?;
        if self.secret_key.is_some() {
            write!(f, ":***")?;
        }
        write!(
            f,
            "@{}{}/{}",
            self.host_and_port(),
            self.path,
            self.project_id
        )
    }
}
