use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::api::multipart::FormData;
use crate::api::types::{
    Ack, ColumnHistogram, ComparisonSummary, DataSummary, NetworkParameters, ProcessingOptions,
    SplitSizes,
};
use crate::api::validate;
use crate::error::ClientError;
use crate::model::ModelConfig;
use crate::train::ConfigSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(120);
const WRITE_TIMEOUT: Duration = Duration::from_secs(120);

/// How a non-2xx response is reported to the caller.
#[derive(Clone, Copy)]
enum OnFailure {
    /// Surface the response body verbatim.
    Body,
    /// Replace it with a fixed message.
    Fixed(&'static str),
    /// `Error: <status>`.
    Status,
}

/// Blocking client for the preprocessing/model backend's REST API.
#[derive(Clone)]
pub struct BackendClient {
    agent: ureq::Agent,
    base: String,
}

impl BackendClient {
    /// `backend_url` is the server root; endpoints live under `/api`.
    pub fn new(backend_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build();
        BackendClient { agent, base: format!("{}/api", backend_url.trim_end_matches('/')) }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    // -- data -------------------------------------------------------------

    /// Uploads a CSV file as multipart field `file`.
    pub fn upload_csv(&self, file_name: &str, data: &[u8]) -> Result<Ack, ClientError> {
        validate::csv_file_name(file_name)?;
        let (content_type, body) = FormData::new().file("file", file_name, "text/csv", data).finish();
        log::info!("uploading {file_name} ({} bytes)", data.len());
        let result = self
            .agent
            .post(&self.url("upload"))
            .set("Content-Type", &content_type)
            .send_bytes(&body);
        read_json(result, OnFailure::Body)
    }

    pub fn columns(&self) -> Result<Vec<String>, ClientError> {
        self.get("columns", OnFailure::Body)
    }

    pub fn columns_for_label(&self) -> Result<Vec<String>, ClientError> {
        self.get("columns_for_label", OnFailure::Body)
    }

    pub fn select_label_column(&self, column: &str) -> Result<Ack, ClientError> {
        self.post("select-label-column", &json!({ "labelColumn": column }), OnFailure::Body)
    }

    pub fn data_summary(&self) -> Result<DataSummary, ClientError> {
        self.get("data-summary", OnFailure::Fixed("Error fetching data summary"))
    }

    pub fn comparison_summary(&self) -> Result<ComparisonSummary, ClientError> {
        self.get("data-comparison-summary", OnFailure::Body)
    }

    pub fn visualization_data(&self, column: &str) -> Result<ColumnHistogram, ClientError> {
        let result = self
            .agent
            .get(&self.url("visualization-data"))
            .query("columnName", column)
            .call();
        read_json(result, OnFailure::Body)
    }

    /// Splits the dataset; ratios are fractions and are validated before any
    /// request is made.
    pub fn split_data(&self, train: f64, validation: f64) -> Result<SplitSizes, ClientError> {
        validate::split_ratios(train, validation)?;
        self.post(
            "split-data",
            &json!({ "trainSize": train, "validationSize": validation }),
            OnFailure::Body,
        )
    }

    pub fn drop_columns(&self, columns: &[String]) -> Result<Ack, ClientError> {
        self.post("drop-columns", &json!({ "columns": columns }), OnFailure::Body)
    }

    /// Applies the selected processing steps. Returns `Ok(None)` without a
    /// request when nothing is selected.
    pub fn process_data(
        &self,
        options: &ProcessingOptions,
    ) -> Result<Option<serde_json::Value>, ClientError> {
        if !validate::processing_requested(options) {
            log::info!("no processing options selected; skipping");
            return Ok(None);
        }
        self.post("process_data", options, OnFailure::Status).map(Some)
    }

    // -- model ------------------------------------------------------------

    pub fn save_model_config(&self, config: &ModelConfig) -> Result<Ack, ClientError> {
        self.post("save-model-config", &json!({ "config": config }), OnFailure::Body)
    }

    pub fn get_model_config(&self) -> Result<ModelConfig, ClientError> {
        self.get("get-model-config", OnFailure::Fixed("Failed to fetch model configuration"))
    }

    pub fn network_parameters(&self) -> Result<NetworkParameters, ClientError> {
        self.get("network-parameters", OnFailure::Fixed("Network parameters could not be fetched"))
    }

    // -- plumbing ---------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, on_failure: OnFailure) -> Result<T, ClientError> {
        log::debug!("GET {path}");
        read_json(self.agent.get(&self.url(path)).call(), on_failure)
    }

    fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        on_failure: OnFailure,
    ) -> Result<T, ClientError> {
        log::debug!("POST {path}");
        let result = self
            .agent
            .post(&self.url(path))
            .set("Content-Type", "application/json")
            .send_json(body);
        read_json(result, on_failure)
    }
}

impl ConfigSource for BackendClient {
    fn model_config(&self) -> Result<ModelConfig, ClientError> {
        self.get_model_config()
    }
}

fn read_json<T: DeserializeOwned>(
    result: Result<ureq::Response, ureq::Error>,
    on_failure: OnFailure,
) -> Result<T, ClientError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(status, response)) => {
            let message = match on_failure {
                OnFailure::Body => response.into_string().unwrap_or_default(),
                OnFailure::Fixed(message) => message.to_owned(),
                OnFailure::Status => format!("Error: {status}"),
            };
            log::warn!("backend answered {status}: {message}");
            return Err(ClientError::Backend { status, message });
        }
        Err(ureq::Error::Transport(err)) => return Err(ClientError::Transport(err.to_string())),
    };
    response.into_json::<T>().map_err(|e| ClientError::Decode(e.to_string()))
}
