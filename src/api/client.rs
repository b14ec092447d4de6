use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::PredictionService;
use super::transport::{CallSpec, send_with_retry};
use super::types::{Envelope, Prediction, Submission, UploadedFile};
use crate::config::WavespeedConfig;
use crate::error::{Error, Result};
use crate::retry::{Backoff, Deadline, RetryPolicy, RunOptions};
use crate::runner;

pub const DEFAULT_BASE_URL: &str = "https://api.wavespeed.ai";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the WaveSpeed prediction API.
///
/// Cheap to clone; holds no per-call state, so concurrent runs on the same
/// client are independent.
#[derive(Clone)]
pub struct Client {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    policy: RetryPolicy,
    enable_sync_mode: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .field("enable_sync_mode", &self.enable_sync_mode)
            .finish()
    }
}

impl Client {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("base URL must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            base_url,
            http,
            policy: RetryPolicy::default(),
            enable_sync_mode: false,
        })
    }

    pub fn from_config(config: &WavespeedConfig) -> Result<Self> {
        Ok(Self::with_base_url(&config.api_key, &config.base_url)?
            .with_policy(config.retry_policy())
            .with_sync_mode(config.enable_sync_mode))
    }

    /// Load `wavespeed.toml` and the environment, then build a client.
    pub fn from_env() -> Result<Self> {
        Self::from_config(&WavespeedConfig::load()?)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sync_mode(mut self, enabled: bool) -> Self {
        self.enable_sync_mode = enabled;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run `model` on `input` and wait for the finished prediction, using the
    /// client defaults.
    pub async fn run(&self, model: &str, input: &Value) -> Result<Prediction> {
        self.run_with_options(model, input, &RunOptions::default()).await
    }

    /// Like [`run`](Self::run), with per-call overrides.
    ///
    /// The whole submit-and-wait sequence is retried up to `max_retries`
    /// times on retryable failures; every retry submits a new remote job.
    pub async fn run_with_options(
        &self,
        model: &str,
        input: &Value,
        options: &RunOptions,
    ) -> Result<Prediction> {
        let input = validate(model, input)?;
        let policy = options.apply(&self.policy);
        let sync = options.sync_mode(self.enable_sync_mode);
        runner::run_task(self, model, input, sync, &policy).await
    }

    /// Submit a prediction without waiting for it.
    ///
    /// In sync mode the request itself waits for the result, so the overall
    /// timeout bounds it and its retries.
    pub async fn submit(
        &self,
        model: &str,
        input: &Value,
        options: &RunOptions,
    ) -> Result<Submission> {
        let input = validate(model, input)?;
        let policy = options.apply(&self.policy);
        let sync = options.sync_mode(self.enable_sync_mode);
        let budget = if sync { policy.wait_deadline() } else { None };
        self.create_prediction(model, input, sync, &policy, budget)
            .await
    }

    /// Fetch the current state of a prediction once.
    pub async fn get_result(&self, id: &str) -> Result<Prediction> {
        self.fetch_prediction(id, &self.policy, None).await
    }

    /// Poll a submitted prediction until it completes, fails or times out.
    pub async fn wait(&self, id: &str, options: &RunOptions) -> Result<Prediction> {
        let policy = options.apply(&self.policy);
        runner::wait_for_completion(self, id, &policy).await
    }

    /// Upload a local file and return its download URL.
    pub async fn upload(&self, path: impl AsRef<Path>) -> Result<String> {
        self.upload_with_options(path, &RunOptions::default()).await
    }

    /// Like [`upload`](Self::upload), with per-call overrides of the
    /// connection retry settings.
    pub async fn upload_with_options(
        &self,
        path: impl AsRef<Path>,
        options: &RunOptions,
    ) -> Result<String> {
        Ok(self.upload_file(path, options).await?.download_url)
    }

    /// Upload a local file and return everything the service reported about it.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        options: &RunOptions,
    ) -> Result<UploadedFile> {
        let path = path.as_ref();
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(Error::FileNotFound(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        // Read once; every attempt shares the same buffer.
        let contents = Bytes::from(tokio::fs::read(path).await?);
        let size = contents.len() as u64;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let policy = options.apply(&self.policy);
        debug!(file = %path.display(), size, "uploading file");

        let url = format!("{}/api/v3/media/upload/binary", self.base_url);
        let spec = CallSpec {
            idempotent: false,
            backoff: Backoff::Exponential,
            deadline: policy.request_timeout,
            budget: None,
        };
        let response = send_with_retry(&policy, spec, || {
            let part = Part::stream_with_length(Body::from(contents.clone()), size)
                .file_name(filename.clone());
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .multipart(Form::new().part("file", part))
        })
        .await?
        .into_success()?;

        let envelope: Envelope<UploadedFile> = response.json()?;
        if envelope.code != Some(200) {
            return Err(Error::UploadFailed(
                envelope
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        let file = envelope
            .data
            .filter(|d| !d.download_url.is_empty())
            .ok_or(Error::MissingDownloadUrl)?;
        info!(url = %file.download_url, "file uploaded");
        Ok(file)
    }
}

impl PredictionService for Client {
    async fn create_prediction(
        &self,
        model: &str,
        input: &Map<String, Value>,
        sync: bool,
        policy: &RetryPolicy,
        budget: Option<Deadline>,
    ) -> Result<Submission> {
        let url = format!("{}/api/v3/{}", self.base_url, model);
        let mut body = input.clone();
        if sync {
            body.insert("enable_sync_mode".to_string(), Value::Bool(true));
        }
        let spec = CallSpec {
            idempotent: false,
            backoff: Backoff::Exponential,
            deadline: policy.submit_deadline(sync),
            budget,
        };
        debug!(model, sync, "submitting prediction");

        let response = send_with_retry(policy, spec, || {
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?
        .into_success()?;

        if sync {
            let envelope: Envelope<Prediction> = response.json()?;
            let prediction = envelope.data.ok_or_else(|| {
                Error::UnexpectedResponse("sync response has no data".to_string())
            })?;
            return Ok(Submission::Finished(prediction));
        }

        let envelope: Envelope<Value> = response.json()?;
        let id = envelope
            .data
            .as_ref()
            .and_then(|d| d.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingRequestId)?;
        debug!(model, id, "prediction submitted");
        Ok(Submission::Pending(id.to_string()))
    }

    async fn fetch_prediction(
        &self,
        id: &str,
        policy: &RetryPolicy,
        budget: Option<Deadline>,
    ) -> Result<Prediction> {
        let url = format!("{}/api/v3/predictions/{}/result", self.base_url, id);
        let spec = CallSpec {
            idempotent: true,
            backoff: Backoff::Linear,
            deadline: policy.request_timeout,
            budget,
        };

        let response = send_with_retry(policy, spec, || {
            self.http.get(&url).bearer_auth(&self.api_key)
        })
        .await?
        .into_success()?;

        let envelope: Envelope<Prediction> = response.json()?;
        envelope
            .data
            .ok_or_else(|| Error::UnexpectedResponse(format!("no data for prediction {id}")))
    }
}

fn validate<'a>(model: &str, input: &'a Value) -> Result<&'a Map<String, Value>> {
    if model.trim().is_empty() {
        return Err(Error::InvalidInput("model must not be empty".into()));
    }
    input
        .as_object()
        .ok_or_else(|| Error::InvalidInput("input must be a JSON object".into()))
}
