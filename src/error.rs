//! Tipos de erro do cliente WaveSpeed.
//!
//! Define [`Error`] com uma variante para cada ponto de falha do cliente e
//! [`ErrorKind`], a classificação estruturada usada pelas camadas de
//! retentativa. A classificação é produzida no ponto onde a falha acontece,
//! então os predicados de retry casam sobre dados e não sobre texto.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Alias de conveniência para `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Erros que podem ocorrer ao interagir com a plataforma WaveSpeed.
#[derive(Debug, Error)]
pub enum Error {
    /// Nenhuma chave de API foi configurada. Levantado antes de qualquer I/O.
    #[error("API key is required. Set WAVESPEED_API_KEY or pass it to the client.")]
    MissingApiKey,

    /// Configuração inválida (URL base, construção do cliente HTTP, etc.).
    #[error("config error: {0}")]
    Config(String),

    /// Argumentos inválidos, rejeitados antes de qualquer chamada de rede.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Falha de transporte numa única chamada HTTP (DNS, conexão recusada, reset).
    #[error("connection error: {0}")]
    Connection(String),

    /// O prazo de uma única chamada HTTP expirou.
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// A camada de retentativa de conexão esgotou todas as tentativas.
    #[error("connection failed after {attempts} attempts: {last}")]
    ConnectionExhausted { attempts: u32, last: Box<Error> },

    /// O servidor respondeu com um status HTTP fora da faixa 2xx.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A submissão assíncrona não devolveu o identificador da predição.
    #[error("missing request id in response")]
    MissingRequestId,

    /// A predição remota terminou com status `failed`.
    #[error("prediction failed (task_id: {id}): {message}")]
    PredictionFailed { id: String, message: String },

    /// O laço de espera excedeu o tempo total configurado.
    #[error("prediction timed out after {seconds} seconds")]
    WaitTimeout { seconds: f64 },

    /// O arquivo local a ser enviado não existe.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// O upload foi aceito pelo HTTP mas o envelope reportou falha.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// O upload foi bem-sucedido mas a resposta não trouxe `download_url`.
    #[error("no download_url in response")]
    MissingDownloadUrl,

    /// A resposta não tem o formato esperado.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Classificação de alto nível de um erro para decisões de retentativa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuração ausente ou inválida. Nunca retentado.
    Config,
    /// Falha de rede (DNS, conexão, reset) ou retentativas de conexão esgotadas.
    Connection,
    /// Prazo de uma chamada ou do laço de espera expirado.
    Timeout,
    /// Resposta HTTP com o status dado.
    HttpStatus(u16),
    /// A predição remota falhou.
    RemoteFailure,
    /// Qualquer outro erro (tipicamente não retentado).
    Other,
}

impl Error {
    /// Returns the structured classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingApiKey | Error::Config(_) => ErrorKind::Config,
            Error::Connection(_) | Error::ConnectionExhausted { .. } => ErrorKind::Connection,
            Error::RequestTimeout(_) | Error::WaitTimeout { .. } => ErrorKind::Timeout,
            Error::Http { status, .. } => ErrorKind::HttpStatus(*status),
            Error::PredictionFailed { .. } => ErrorKind::RemoteFailure,
            _ => ErrorKind::Other,
        }
    }

    /// Whether this is a transient transport-level failure: a connection
    /// problem, a timeout, HTTP 429 or HTTP 5xx.
    pub fn is_transient(&self) -> bool {
        match self.kind() {
            ErrorKind::Connection | ErrorKind::Timeout => true,
            ErrorKind::HttpStatus(status) => status == 429 || status >= 500,
            _ => false,
        }
    }

    /// Whether a whole submit-and-wait task that ended with this error may be
    /// started over.
    ///
    /// Remote job failures only carry the service's message text, so those are
    /// matched against it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::PredictionFailed { message, .. } => remote_message_is_retryable(message),
            other => other.is_transient(),
        }
    }
}

fn remote_message_is_retryable(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["timeout", "timed out", "connection", "http 5", "http 429", "rate limit"]
        .iter()
        .any(|pattern| lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_failed_display_names_id_and_message() {
        let err = Error::PredictionFailed {
            id: "abc123".into(),
            message: "out of memory".into(),
        };
        assert_eq!(
            err.to_string(),
            "prediction failed (task_id: abc123): out of memory"
        );
    }

    #[test]
    fn connection_exhausted_display() {
        let err = Error::ConnectionExhausted {
            attempts: 4,
            last: Box::new(Error::Connection("connection refused".into())),
        };
        assert_eq!(
            err.to_string(),
            "connection failed after 4 attempts: connection error: connection refused"
        );
    }

    #[test]
    fn wait_timeout_display() {
        let err = Error::WaitTimeout { seconds: 0.1 };
        assert_eq!(err.to_string(), "prediction timed out after 0.1 seconds");
    }

    #[test]
    fn kinds_are_assigned_at_the_failure_point() {
        assert_eq!(Error::MissingApiKey.kind(), ErrorKind::Config);
        assert_eq!(Error::Connection("x".into()).kind(), ErrorKind::Connection);
        assert_eq!(
            Error::RequestTimeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            Error::Http {
                status: 502,
                body: String::new()
            }
            .kind(),
            ErrorKind::HttpStatus(502)
        );
        assert_eq!(Error::MissingRequestId.kind(), ErrorKind::Other);
    }

    #[test]
    fn transient_errors() {
        assert!(Error::Connection("reset".into()).is_transient());
        assert!(Error::WaitTimeout { seconds: 1.0 }.is_transient());
        assert!(
            Error::Http {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            Error::Http {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !Error::Http {
                status: 404,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!Error::MissingApiKey.is_transient());
    }

    #[test]
    fn remote_failure_retryable_only_on_matching_message() {
        let retryable = Error::PredictionFailed {
            id: "x".into(),
            message: "Upstream connection reset".into(),
        };
        assert!(retryable.is_retryable());

        let gpu_timeout = Error::PredictionFailed {
            id: "x".into(),
            message: "Worker Timeout".into(),
        };
        assert!(gpu_timeout.is_retryable());

        let bad_prompt = Error::PredictionFailed {
            id: "x".into(),
            message: "prompt rejected by safety filter".into(),
        };
        assert!(!bad_prompt.is_retryable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
