use spinup_common::OrchestratorError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TEMPLATE_PATH: &str = "ec2_template.json";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8001";

#[derive(Debug, Clone, PartialEq)]
pub struct SshSettings {
    pub key_path: Option<PathBuf>,
    pub user: String,
    pub program: String,
    pub connect_timeout: Duration,
    pub connection_attempts: u32,
    pub session_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            key_path: None,
            user: "ec2-user".to_string(),
            program: "ssh".to_string(),
            connect_timeout: Duration::from_secs(10),
            connection_attempts: 10,
            session_timeout: Duration::from_secs(900),
        }
    }
}

/// What the instance runs once docker is up.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub image: Option<String>,
    pub data_dir: String,
    pub container_name: String,
    pub backup_download_url: Option<String>,
    pub backup_download_auth_header: Option<String>,
    /// Passed to `aws s3 cp` when a backup is uploaded from the instance.
    pub upload_region: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            image: None,
            data_dir: "/opt/factorio".to_string(),
            container_name: "factorio".to_string(),
            backup_download_url: None,
            backup_download_auth_header: None,
            upload_region: None,
        }
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: String,
    pub aws_region: Option<String>,
    pub chat_channel_id: String,
    pub chat_bot_token: String,
    pub template_path: PathBuf,
    pub backup_bucket: String,
    pub ssh: SshSettings,
    pub readiness_timeout: Duration,
    pub readiness_poll_interval: Duration,
    pub server: ServerSettings,
    pub listen_addr: SocketAddr,
}

pub fn default_provider_name() -> &'static str {
    if cfg!(feature = "provider-aws") {
        "aws"
    } else {
        "mock"
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, OrchestratorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OrchestratorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |keys: &[&str]| {
            keys.iter().find_map(|k| get(*k)).ok_or_else(|| {
                OrchestratorError::Config(format!("{} must be set", keys.join(" or ")))
            })
        };

        let provider = get("PROVIDER")
            .map(|p| p.to_lowercase())
            .unwrap_or_else(|| default_provider_name().to_string());
        if provider == "aws" {
            require(&["AWS_ACCESS_KEY_ID"])?;
            require(&["AWS_SECRET_ACCESS_KEY"])?;
        }

        let key_path = PathBuf::from(require(&["SSH_KEY_PATH"])?);
        if !key_path.is_file() {
            return Err(OrchestratorError::Config(format!(
                "SSH_KEY_PATH={} is not a readable file",
                key_path.display()
            )));
        }

        let ssh = SshSettings {
            key_path: Some(key_path),
            user: get("SSH_USER").unwrap_or_else(|| SshSettings::default().user),
            program: get("SSH_PROGRAM").unwrap_or_else(|| SshSettings::default().program),
            connect_timeout: Duration::from_secs(parse_or(&get, "SSH_CONNECT_TIMEOUT_S", 10)?),
            connection_attempts: parse_or(&get, "SSH_CONNECTION_ATTEMPTS", 10)?,
            session_timeout: Duration::from_secs(parse_or(&get, "SSH_SESSION_TIMEOUT_S", 900)?),
        };

        let server = ServerSettings {
            image: get("SERVER_IMAGE"),
            data_dir: get("SERVER_DATA_DIR").unwrap_or_else(|| ServerSettings::default().data_dir),
            container_name: get("SERVER_CONTAINER_NAME")
                .unwrap_or_else(|| ServerSettings::default().container_name),
            backup_download_url: get("BACKUP_DOWNLOAD_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
            backup_download_auth_header: get("BACKUP_DOWNLOAD_AUTH_HEADER"),
            upload_region: get("AWS_REGION"),
        };

        let readiness_poll_interval = parse_or(&get, "READINESS_POLL_INTERVAL_S", 5u64)?;
        if readiness_poll_interval == 0 {
            return Err(OrchestratorError::Config(
                "READINESS_POLL_INTERVAL_S must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            provider,
            aws_region: get("AWS_REGION"),
            chat_channel_id: require(&["CHAT_CHANNEL_ID", "DISCORD_CHANNEL_ID"])?,
            chat_bot_token: require(&["CHAT_BOT_TOKEN", "DISCORD_TOKEN"])?,
            template_path: PathBuf::from(
                get("EC2_TEMPLATE").unwrap_or_else(|| DEFAULT_TEMPLATE_PATH.to_string()),
            ),
            backup_bucket: require(&["BACKUP_BUCKET"])?,
            ssh,
            readiness_timeout: Duration::from_secs(parse_or(&get, "READINESS_TIMEOUT_S", 300)?),
            readiness_poll_interval: Duration::from_secs(readiness_poll_interval),
            server,
            listen_addr: parse_or(
                &get,
                "LISTEN_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8001)),
            )?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, OrchestratorError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| OrchestratorError::Config(format!("{}={:?} is invalid: {}", key, raw, e))),
    }
}
