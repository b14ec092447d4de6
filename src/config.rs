//! Configuração do cliente carregada a partir de `wavespeed.toml`.
//!
//! A struct [`WavespeedConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis. As variáveis de
//! ambiente `WAVESPEED_API_KEY` e `WAVESPEED_BASE_URL` têm precedência sobre
//! o arquivo. Durações são expressas em segundos.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::api::client::DEFAULT_BASE_URL;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "wavespeed.toml";

/// Configuração de nível superior carregada de `wavespeed.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct WavespeedConfig {
    /// Chave da API WaveSpeed.
    #[serde(default)]
    pub api_key: String,

    /// URL base da API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Tempo máximo total de espera por uma predição, em segundos.
    /// Zero ou negativo desativa o limite.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Intervalo entre consultas de status, em segundos.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,

    /// Retentativas da tarefa inteira (submissão + espera).
    #[serde(default)]
    pub max_retries: u32,

    /// Retentativas de uma única chamada HTTP.
    #[serde(default = "default_max_connection_retries")]
    pub max_connection_retries: u32,

    /// Intervalo base entre retentativas, em segundos.
    #[serde(default = "default_retry_interval")]
    pub retry_interval: f64,

    /// Prazo de uma única chamada HTTP, em segundos.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: f64,

    /// Usa o modo síncrono por padrão.
    #[serde(default)]
    pub enable_sync_mode: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// 36000 segundos = 10 horas.
fn default_timeout() -> f64 {
    36_000.0
}

fn default_poll_interval() -> f64 {
    1.0
}

fn default_max_connection_retries() -> u32 {
    5
}

fn default_retry_interval() -> f64 {
    1.0
}

fn default_request_timeout() -> f64 {
    120.0
}

impl Default for WavespeedConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            max_retries: 0,
            max_connection_retries: default_max_connection_retries(),
            retry_interval: default_retry_interval(),
            request_timeout: default_request_timeout(),
            enable_sync_mode: false,
        }
    }
}

impl WavespeedConfig {
    /// Carrega a configuração de `wavespeed.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito, aplicando o ambiente.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<WavespeedConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variáveis de ambiente têm precedência sobre o arquivo.
        if let Some(key) = non_empty_env("WAVESPEED_API_KEY") {
            config.api_key = key;
        }
        if let Some(url) = non_empty_env("WAVESPEED_BASE_URL") {
            config.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejeita durações negativas ou não finitas (exceto `timeout`, onde
    /// zero ou menos significa "sem limite").
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("poll_interval", self.poll_interval),
            ("retry_interval", self.retry_interval),
            ("request_timeout", self.request_timeout),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        if !self.timeout.is_finite() {
            return Err(Error::Config(format!(
                "timeout must be a finite number of seconds, got {}",
                self.timeout
            )));
        }
        Ok(())
    }

    /// Converte os campos numéricos na [`RetryPolicy`] usada pelo cliente.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_connection_retries: self.max_connection_retries,
            max_retries: self.max_retries,
            retry_interval: seconds(self.retry_interval),
            request_timeout: seconds(self.request_timeout),
            timeout: (self.timeout > 0.0).then(|| seconds(self.timeout)),
            poll_interval: seconds(self.poll_interval),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
