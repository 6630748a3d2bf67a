//! Configuration system: TOML file + env var overrides + command-line overlay,
//! validated once into an immutable [`Settings`].

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::unistd::{Group, User, getegid, geteuid};
use reqwest::Url;
use serde::Deserialize;

use crate::core::artifact::{ApiKey, Artifact, ArtifactKind, Ownership};
use crate::core::errors::{CpError, Result};

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/certpull/config.toml";
/// API path between the server base address and `download/`.
pub const DEFAULT_API_PREFIX: &str = "/certwarden/api/v1";
/// Hook file name looked up next to the executable.
pub const DEFAULT_HOOK_NAME: &str = "certpull-post-install";

/// Raw, layered configuration. Every field is optional until [`Config::resolve`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Server base address, e.g. `certs.example.com:4055`.
    pub server: Option<String>,
    pub api_prefix: Option<String>,
    /// Certificate name on the server.
    pub name: Option<String>,
    pub cert_api_key: Option<ApiKey>,
    pub key_api_key: Option<ApiKey>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// User name or numeric uid.
    pub owner: Option<String>,
    /// Group name or numeric gid.
    pub group: Option<String>,
    /// Octal permission bits, e.g. `"0640"`.
    pub mode: Option<String>,
    pub hook: Option<PathBuf>,
    /// Skip the post-install hook even if one is configured or present.
    pub disable_hook: bool,
    /// JSONL activity log path. No log is written when unset.
    pub activity_log: Option<PathBuf>,
    /// Per-request timeout. Requests block indefinitely when unset.
    pub timeout_secs: Option<u64>,
}

/// Validated, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub name: String,
    pub certificate: Artifact,
    pub private_key: Artifact,
    pub ownership: Ownership,
    pub hook: Option<PathBuf>,
    pub activity_log: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Settings {
    #[must_use]
    pub const fn artifact(&self, kind: ArtifactKind) -> &Artifact {
        match kind {
            ArtifactKind::Certificate => &self.certificate,
            ArtifactKind::PrivateKey => &self.private_key,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| CpError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str(&raw)?
        } else if path.is_some() {
            return Err(CpError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        Ok(cfg)
    }

    /// Apply `CERTPULL_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CERTPULL_SERVER") {
            self.server = Some(raw);
        }
        if let Some(raw) = lookup("CERTPULL_API_PREFIX") {
            self.api_prefix = Some(raw);
        }
        if let Some(raw) = lookup("CERTPULL_NAME") {
            self.name = Some(raw);
        }
        if let Some(raw) = lookup("CERTPULL_CERT_API_KEY") {
            self.cert_api_key = Some(ApiKey::new(raw));
        }
        if let Some(raw) = lookup("CERTPULL_KEY_API_KEY") {
            self.key_api_key = Some(ApiKey::new(raw));
        }
        if let Some(raw) = lookup("CERTPULL_CERT_PATH") {
            self.cert_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("CERTPULL_KEY_PATH") {
            self.key_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("CERTPULL_OWNER") {
            self.owner = Some(raw);
        }
        if let Some(raw) = lookup("CERTPULL_GROUP") {
            self.group = Some(raw);
        }
        if let Some(raw) = lookup("CERTPULL_MODE") {
            self.mode = Some(raw);
        }
        if let Some(raw) = lookup("CERTPULL_HOOK") {
            self.hook = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("CERTPULL_NO_HOOK") {
            self.disable_hook = parse_env_bool("CERTPULL_NO_HOOK", &raw)?;
        }
        if let Some(raw) = lookup("CERTPULL_ACTIVITY_LOG") {
            self.activity_log = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("CERTPULL_TIMEOUT_SECS") {
            self.timeout_secs = Some(parse_env_u64("CERTPULL_TIMEOUT_SECS", &raw)?);
        }
        Ok(())
    }

    /// Layer `higher` on top of `self`; fields set in `higher` win.
    pub fn overlay(&mut self, higher: Self) {
        let Self {
            server,
            api_prefix,
            name,
            cert_api_key,
            key_api_key,
            cert_path,
            key_path,
            owner,
            group,
            mode,
            hook,
            disable_hook,
            activity_log,
            timeout_secs,
        } = higher;

        replace_if_set(&mut self.server, server);
        replace_if_set(&mut self.api_prefix, api_prefix);
        replace_if_set(&mut self.name, name);
        replace_if_set(&mut self.cert_api_key, cert_api_key);
        replace_if_set(&mut self.key_api_key, key_api_key);
        replace_if_set(&mut self.cert_path, cert_path);
        replace_if_set(&mut self.key_path, key_path);
        replace_if_set(&mut self.owner, owner);
        replace_if_set(&mut self.group, group);
        replace_if_set(&mut self.mode, mode);
        replace_if_set(&mut self.hook, hook);
        replace_if_set(&mut self.activity_log, activity_log);
        replace_if_set(&mut self.timeout_secs, timeout_secs);
        self.disable_hook |= disable_hook;
    }

    /// Validate and freeze the configuration.
    ///
    /// `default_hook` is used only when no hook is configured and the file exists.
    /// An explicitly configured hook must exist; whether it is executable is
    /// checked when it is invoked.
    pub fn resolve(self, default_hook: Option<&Path>) -> Result<Settings> {
        let server = required_str(self.server.as_deref(), "server")?;
        let name = required_str(self.name.as_deref(), "name")?.to_string();
        let cert_api_key = required_key(self.cert_api_key, "cert_api_key")?;
        let key_api_key = required_key(self.key_api_key, "key_api_key")?;
        let cert_path = required_path(self.cert_path, "cert_path")?;
        let key_path = required_path(self.key_path, "key_path")?;

        if cert_path == key_path {
            return Err(CpError::InvalidConfig {
                details: format!(
                    "cert_path and key_path must differ, both are {}",
                    cert_path.display()
                ),
            });
        }

        let base = normalize_server(server)?;
        let prefix = self.api_prefix.as_deref().unwrap_or(DEFAULT_API_PREFIX);

        let ownership = Ownership {
            uid: self
                .owner
                .as_deref()
                .map_or_else(|| Ok(geteuid().as_raw()), resolve_user)?,
            gid: self
                .group
                .as_deref()
                .map_or_else(|| Ok(getegid().as_raw()), resolve_group)?,
            mode: self
                .mode
                .as_deref()
                .map_or(Ok(Ownership::DEFAULT_MODE), parse_mode)?,
        };

        let hook = if self.disable_hook {
            None
        } else if let Some(explicit) = self.hook {
            if !explicit.exists() {
                return Err(CpError::HookNotFound { path: explicit });
            }
            Some(explicit)
        } else {
            default_hook.filter(|p| p.is_file()).map(Path::to_path_buf)
        };

        let timeout = match self.timeout_secs {
            Some(0) => {
                return Err(CpError::InvalidConfig {
                    details: "timeout_secs must be > 0 when set".to_string(),
                });
            }
            other => other.map(Duration::from_secs),
        };

        Ok(Settings {
            certificate: Artifact {
                kind: ArtifactKind::Certificate,
                url: endpoint_url(&base, prefix, ArtifactKind::Certificate, &name)?,
                api_key: cert_api_key,
                destination: cert_path,
            },
            private_key: Artifact {
                kind: ArtifactKind::PrivateKey,
                url: endpoint_url(&base, prefix, ArtifactKind::PrivateKey, &name)?,
                api_key: key_api_key,
                destination: key_path,
            },
            name,
            ownership,
            hook,
            activity_log: self.activity_log,
            timeout,
        })
    }
}

/// `certpull-post-install` in the directory holding the running executable.
#[must_use]
pub fn default_hook_path() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_HOOK_NAME)))
}

/// Parse a server base address, defaulting the scheme to `https`.
pub fn normalize_server(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme).map_err(|error| CpError::InvalidConfig {
        details: format!("server {raw:?} is not a valid address: {error}"),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CpError::InvalidConfig {
            details: format!("server scheme must be http or https, got {}", url.scheme()),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CpError::InvalidConfig {
            details: format!("server {raw:?} has no host"),
        });
    }
    Ok(url)
}

/// Build `{base}{prefix}/download/{certificates|privatekeys}/{name}`.
pub fn endpoint_url(base: &Url, prefix: &str, kind: ArtifactKind, name: &str) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|()| CpError::InvalidConfig {
            details: format!("server {base} cannot carry a path"),
        })?;
        segments.pop_if_empty();
        segments.extend(prefix.split('/').filter(|s| !s.is_empty()));
        segments.extend(["download", kind.endpoint_segment(), name]);
    }
    Ok(url)
}

/// Parse octal permission bits such as `0600`, `640`, or `0o644`.
pub fn parse_mode(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    let mode = u32::from_str_radix(digits, 8).map_err(|error| CpError::InvalidConfig {
        details: format!("mode {raw:?} is not an octal permission value: {error}"),
    })?;
    if mode > 0o7777 {
        return Err(CpError::InvalidConfig {
            details: format!("mode {raw:?} exceeds 07777"),
        });
    }
    Ok(mode)
}

/// Resolve a user name or numeric uid.
pub fn resolve_user(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if let Ok(uid) = raw.parse::<u32>() {
        return Ok(uid);
    }
    match User::from_name(raw) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(unresolved("user", raw, "no such user")),
        Err(errno) => Err(unresolved("user", raw, &errno.to_string())),
    }
}

/// Resolve a group name or numeric gid.
pub fn resolve_group(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if let Ok(gid) = raw.parse::<u32>() {
        return Ok(gid);
    }
    match Group::from_name(raw) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(unresolved("group", raw, "no such group")),
        Err(errno) => Err(unresolved("group", raw, &errno.to_string())),
    }
}

fn unresolved(kind: &'static str, value: &str, details: &str) -> CpError {
    CpError::UnresolvedIdentity {
        kind,
        value: value.to_string(),
        details: details.to_string(),
    }
}

fn replace_if_set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn required_str<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(CpError::MissingParameter { name })
}

fn required_key(value: Option<ApiKey>, name: &'static str) -> Result<ApiKey> {
    value
        .filter(|key| !key.is_blank())
        .ok_or(CpError::MissingParameter { name })
}

fn required_path(value: Option<PathBuf>, name: &'static str) -> Result<PathBuf> {
    value
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(CpError::MissingParameter { name })
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| CpError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| CpError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
