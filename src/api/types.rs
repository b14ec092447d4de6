//! Tipos de dados para requisições e respostas da API WaveSpeed v3.
//!
//! Todas as respostas chegam dentro do envelope `{code, message, data}`.
//! Apenas os campos que o cliente inspeciona são tipados com rigor; o resto
//! é opcional para tolerar respostas parciais do serviço.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope comum a todas as respostas da API.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Código de status lógico reportado pelo serviço (200 em caso de sucesso).
    #[serde(default)]
    pub code: Option<u16>,
    /// Mensagem legível que acompanha o código.
    #[serde(default)]
    pub message: Option<String>,
    /// Carga útil da resposta. Ausente ou `null` vira `None`.
    pub data: Option<T>,
}

/// Status de uma predição no serviço remoto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Created,
    Processing,
    Completed,
    Failed,
    /// Qualquer status que o serviço venha a adicionar; tratado como não-terminal.
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    /// `true` para `completed` e `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PredictionStatus::Completed | PredictionStatus::Failed)
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictionStatus::Created => write!(f, "created"),
            PredictionStatus::Processing => write!(f, "processing"),
            PredictionStatus::Completed => write!(f, "completed"),
            PredictionStatus::Failed => write!(f, "failed"),
            PredictionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Uma predição (job) conforme reportada pelo serviço remoto.
///
/// O cliente nunca infere transições localmente: cada instância é o
/// resultado de exatamente uma busca remota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Identificador opaco atribuído pelo serviço.
    #[serde(default)]
    pub id: String,
    /// Modelo que executou a predição.
    #[serde(default)]
    pub model: Option<String>,
    pub status: PredictionStatus,
    /// Parâmetros de entrada, quando o serviço os ecoa.
    #[serde(default)]
    pub input: Option<Map<String, Value>>,
    /// Referências de saída (normalmente URLs).
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Mensagem de erro do serviço quando `status` é `failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Tempo de execução reportado pelo serviço, em milissegundos.
    #[serde(default, alias = "executionTime")]
    pub execution_time: Option<f64>,
    #[serde(default)]
    pub has_nsfw_contents: Vec<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Prediction {
    /// Mensagem de falha, com um texto padrão quando o serviço não informa nenhuma.
    pub fn failure_message(&self) -> String {
        self.error
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or("Unknown error")
            .to_string()
    }
}

/// Resultado de uma submissão.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Modo assíncrono: o job foi criado e deve ser acompanhado pelo id.
    Pending(String),
    /// Modo síncrono: o serviço bloqueou até o fim e devolveu o resultado.
    Finished(Prediction),
}

/// Metadados de um arquivo enviado para o armazenamento de mídia.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Tipo MIME detectado pelo serviço. Serializado como "type" no JSON.
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_deserialize_from_api_format() {
        let json = r#"{
            "code": 200,
            "message": "success",
            "data": {
                "id": "pred_123",
                "model": "wavespeed-ai/flux-dev",
                "status": "completed",
                "outputs": ["https://cdn.example.com/a.png"],
                "has_nsfw_contents": [false],
                "executionTime": 1532.5,
                "created_at": "2025-01-01T00:00:00Z"
            }
        }"#;
        let env: Envelope<Prediction> = serde_json::from_str(json).unwrap();
        assert_eq!(env.code, Some(200));
        let p = env.data.unwrap();
        assert_eq!(p.id, "pred_123");
        assert_eq!(p.status, PredictionStatus::Completed);
        assert_eq!(p.outputs, vec!["https://cdn.example.com/a.png".to_string()]);
        assert_eq!(p.execution_time, Some(1532.5));
        assert!(p.status.is_terminal());
    }

    #[test]
    fn missing_outputs_default_to_empty() {
        let p: Prediction = serde_json::from_str(r#"{"id": "x", "status": "processing"}"#).unwrap();
        assert!(p.outputs.is_empty());
        assert!(!p.status.is_terminal());
    }

    #[test]
    fn unknown_status_is_not_terminal() {
        let p: Prediction = serde_json::from_str(r#"{"id": "x", "status": "queued"}"#).unwrap();
        assert_eq!(p.status, PredictionStatus::Unknown);
        assert!(!p.status.is_terminal());
    }

    #[test]
    fn failure_message_defaults() {
        let mut p: Prediction = serde_json::from_str(r#"{"id": "x", "status": "failed"}"#).unwrap();
        assert_eq!(p.failure_message(), "Unknown error");
        p.error = Some("bad prompt".into());
        assert_eq!(p.failure_message(), "bad prompt");
    }

    #[test]
    fn uploaded_file_type_field_renames_correctly() {
        let json = r#"{"download_url": "https://x/y.png", "filename": "y.png", "size": 12, "type": "image/png"}"#;
        let f: UploadedFile = serde_json::from_str(json).unwrap();
        assert_eq!(f.content_type.as_deref(), Some("image/png"));
        assert_eq!(f.size, Some(12));
    }
}
