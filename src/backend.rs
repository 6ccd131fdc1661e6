use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::{Client, Response, multipart};
use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::config::BackendConfig;
use crate::domain::DeskError;
use crate::record::{Record, RecordKind};

/// The HTTP collaborator. Every call returns its outcome, callers decide
/// what to do with the local state.
pub trait Backend: Send + Sync {
    fn fetch(&self, kind: RecordKind) -> Result<Vec<Record>, DeskError>;
    fn delete(&self, kind: RecordKind, id: i64) -> Result<(), DeskError>;
    fn create(&self, kind: RecordKind, record: &Record) -> Result<(), DeskError>;
    fn bulk_import(&self, upload: &BulkUpload) -> Result<ImportOutcome, DeskError>;
}

/// A normalized batch plus optional photo files matched by row order.
#[derive(Debug, Clone, Default)]
pub struct BulkUpload {
    pub records: Vec<Record>,
    pub photos: Vec<PathBuf>,
}

/// Whole-batch answer of the bulk endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportOutcome {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ImportOutcome {
    /// An explicit `success` flag decides, otherwise a `msg` confirms.
    /// `message` alone is only shown, it carries failures too.
    pub fn accepted(&self) -> bool {
        match self.success {
            Some(success) => success,
            None => self.msg.is_some(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.msg.as_deref().or(self.message.as_deref())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
}

/// Failure text of a non 2xx answer: the body's `message` or `msg`,
/// else the raw body.
fn error_message(text: &str) -> String {
    serde_json::from_str::<ErrorBody>(text)
        .ok()
        .and_then(|b| b.message.or(b.msg))
        .unwrap_or_else(|| text.to_string())
}

/// Reads the bulk endpoint's 2xx body. Plain text counts as a `msg`.
fn outcome_from_text(text: &str) -> ImportOutcome {
    serde_json::from_str::<ImportOutcome>(text).unwrap_or_else(|_| ImportOutcome {
        success: None,
        msg: (!text.trim().is_empty()).then(|| text.trim().to_string()),
        message: None,
    })
}

/// Request body of a bulk upload.
#[derive(Debug, PartialEq)]
enum BulkBody {
    Json(serde_json::Value),
    /// `data` part with the records as JSON, one `shop_photos` part per
    /// photo in row order.
    Multipart { data: String, photos: Vec<PathBuf> },
}

fn bulk_body(upload: &BulkUpload) -> Result<BulkBody, DeskError> {
    if upload.photos.is_empty() {
        Ok(BulkBody::Json(serde_json::json!({ "data": upload.records })))
    } else {
        Ok(BulkBody::Multipart {
            data: serde_json::to_string(&upload.records)?,
            photos: upload.photos.clone(),
        })
    }
}

pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, DeskError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("rdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpBackend {
            client,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn collection_url(&self, kind: RecordKind) -> String {
        match kind {
            RecordKind::Retailer => self.url(&self.config.retailers_path),
            RecordKind::Distributor => self.url(&self.config.distributors_path),
        }
    }

    /// Turns any non 2xx answer into `DeskError::Http`, using the body's
    /// message when it has one.
    fn check(response: Response) -> Result<Response, DeskError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().unwrap_or_default();
        Err(DeskError::Http {
            status: status.as_u16(),
            message: error_message(&text),
        })
    }
}

impl Backend for HttpBackend {
    fn fetch(&self, kind: RecordKind) -> Result<Vec<Record>, DeskError> {
        let url = self.collection_url(kind);
        debug!("GET {url}");
        let response = Self::check(self.client.get(&url).send()?)?;
        let records: Vec<Record> = response.json()?;
        info!("Fetched {} {}", records.len(), kind.title().to_lowercase());
        Ok(records)
    }

    fn delete(&self, kind: RecordKind, id: i64) -> Result<(), DeskError> {
        let url = format!("{}/{}", self.collection_url(kind), id);
        debug!("DELETE {url}");
        Self::check(self.client.delete(&url).send()?)?;
        Ok(())
    }

    fn create(&self, kind: RecordKind, record: &Record) -> Result<(), DeskError> {
        let url = self.collection_url(kind);
        debug!("POST {url}");
        Self::check(self.client.post(&url).json(record).send()?)?;
        Ok(())
    }

    fn bulk_import(&self, upload: &BulkUpload) -> Result<ImportOutcome, DeskError> {
        let url = self.url(&self.config.bulk_upload_path);
        let request = match bulk_body(upload)? {
            BulkBody::Json(body) => self.client.post(&url).json(&body),
            BulkBody::Multipart { data, photos } => {
                let mut form = multipart::Form::new().text("data", data);
                for photo in photos.iter() {
                    form = form.file("shop_photos", photo)?;
                }
                self.client.post(&url).multipart(form)
            }
        };
        debug!(
            "POST {url} with {} records and {} photos",
            upload.records.len(),
            upload.photos.len()
        );

        let text = Self::check(request.send()?)?.text()?;
        trace!("Bulk upload answered: {text}");
        let outcome = outcome_from_text(&text);
        Ok(outcome)
    }
}
