//! Configuração do orderflow carregada a partir de `orderflow.toml`.
//!
//! A struct [`TrackerConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `ORDERFLOW_API_URL` e `ORDERFLOW_TOKEN` têm
//! precedência sobre o arquivo; flags da CLI têm precedência sobre ambas.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::backend::{Session, Timeouts};
use crate::orchestrator::UploadPolicy;
use crate::tracker::PollConfig;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "orderflow.toml";

/// Configuração de nível superior carregada de `orderflow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// URL base da API do backend (sem a barra final).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Token de sessão enviado no cabeçalho `Authorization`.
    #[serde(default)]
    pub token: Option<String>,

    /// Intervalo entre consultas de status, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Máximo de consultas antes de desistir com timeout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fração máxima de progresso exibida antes da confirmação final.
    #[serde(default = "default_progress_cap")]
    pub progress_cap: f64,

    /// Habilita backoff exponencial após consultas que falharam.
    #[serde(default)]
    pub transient_backoff: bool,

    /// Teto do intervalo com backoff, em segundos.
    #[serde(default = "default_max_poll_interval_secs")]
    pub max_poll_interval_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout maior para uploads de arquivos grandes.
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,

    /// Tamanho máximo do arquivo de chat, em bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Extensões aceitas para upload.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

// Valor padrão para a URL base: backend local na porta 8000.
fn default_api_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

// Valor padrão para o intervalo de consulta: 15s.
fn default_poll_interval_secs() -> u64 {
    15
}

// Valor padrão para tentativas: 60 (15 minutos com o intervalo padrão).
fn default_max_attempts() -> u32 {
    60
}

fn default_progress_cap() -> f64 {
    0.90
}

fn default_max_poll_interval_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_upload_timeout_secs() -> u64 {
    60
}

// Valor padrão para o tamanho máximo: 50MB.
fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token: None,
            poll_interval_secs: default_poll_interval_secs(),
            max_attempts: default_max_attempts(),
            progress_cap: default_progress_cap(),
            transient_backoff: false,
            max_poll_interval_secs: default_max_poll_interval_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl TrackerConfig {
    /// Carrega a configuração do caminho informado ou de `orderflow.toml`.
    ///
    /// Um caminho explícito que não existe é erro; o arquivo padrão ausente
    /// resulta nos valores padrão.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Lê e interpreta um arquivo TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<TrackerConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Aplica as variáveis de ambiente por cima do que veio do arquivo.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ORDERFLOW_API_URL")
            && !url.is_empty()
        {
            self.api_base_url = url;
        }

        if let Some(token) = lookup("ORDERFLOW_TOKEN")
            && !token.is_empty()
        {
            self.token = Some(token);
        }
    }

    /// Parâmetros do laço de consulta derivados desta configuração.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_attempts,
            progress_cap: self.progress_cap,
            transient_backoff: self.transient_backoff,
            max_poll_interval: Duration::from_secs(self.max_poll_interval_secs),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
            upload: Duration::from_secs(self.upload_timeout_secs),
        }
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.max_file_size,
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }

    /// Sessão explícita com o token configurado (se houver).
    pub fn session(&self) -> Session {
        Session::new(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = TrackerConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.max_attempts, 60);
        assert_eq!(config.progress_cap, 0.90);
        assert_eq!(config.max_file_size, 52_428_800);
        assert_eq!(config.allowed_extensions, vec!["txt"]);
        assert!(config.token.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_base_url = "https://orders.example.com/api"
            max_attempts = 20
            transient_backoff = true
        "#;
        let config: TrackerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_base_url, "https://orders.example.com/api");
        assert_eq!(config.max_attempts, 20);
        assert!(config.transient_backoff);
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.upload_timeout_secs, 60);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = TrackerConfig {
            token: Some("from-file".into()),
            ..Default::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            ("ORDERFLOW_API_URL", "http://backend:9000/api"),
            ("ORDERFLOW_TOKEN", "from-env"),
        ]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "http://backend:9000/api");
        assert_eq!(config.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = TrackerConfig::default();
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert!(config.token.is_none());
    }

    #[test]
    fn derived_settings() {
        let config = TrackerConfig {
            poll_interval_secs: 5,
            max_attempts: 12,
            ..Default::default()
        };
        let poll = config.poll_config();
        assert_eq!(poll.poll_interval, Duration::from_secs(5));
        assert_eq!(poll.max_attempts, 12);
        assert_eq!(config.timeouts().upload, Duration::from_secs(60));
        assert_eq!(config.upload_policy().max_file_size, 52_428_800);
        assert!(!config.session().is_authenticated());
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_secs = 3\nmax_attempts = 7").unwrap();

        let config = TrackerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.max_attempts, 7);
    }

    #[test]
    fn load_rejects_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(TrackerConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_attempts = \"many\"").unwrap();
        assert!(TrackerConfig::from_file(file.path()).is_err());
    }
}
