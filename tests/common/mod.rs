#![allow(dead_code)]

use std::sync::Mutex;

use rdesk::backend::{Backend, BulkUpload, ImportOutcome};
use rdesk::domain::DeskError;
use rdesk::record::{Record, RecordKind};

/// In-memory stand-in for the HTTP backend.
#[derive(Default)]
pub struct FakeBackend {
    pub records: Mutex<Vec<Record>>,
    pub uploads: Mutex<Vec<BulkUpload>>,
    pub failing: bool,
}

impl FakeBackend {
    pub fn with_records(records: Vec<Record>) -> Self {
        FakeBackend {
            records: Mutex::new(records),
            ..FakeBackend::default()
        }
    }

    pub fn failing() -> Self {
        FakeBackend {
            failing: true,
            ..FakeBackend::default()
        }
    }

    fn check(&self) -> Result<(), DeskError> {
        if self.failing {
            Err(DeskError::Http {
                status: 503,
                message: "backend unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Backend for FakeBackend {
    fn fetch(&self, _kind: RecordKind) -> Result<Vec<Record>, DeskError> {
        self.check()?;
        Ok(self.records.lock().unwrap().clone())
    }

    fn delete(&self, _kind: RecordKind, id: i64) -> Result<(), DeskError> {
        self.check()?;
        self.records.lock().unwrap().retain(|r| r.id() != Some(id));
        Ok(())
    }

    fn create(&self, _kind: RecordKind, record: &Record) -> Result<(), DeskError> {
        self.check()?;
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn bulk_import(&self, upload: &BulkUpload) -> Result<ImportOutcome, DeskError> {
        self.check()?;
        let count = upload.records.len();
        self.uploads.lock().unwrap().push(upload.clone());
        Ok(ImportOutcome {
            success: Some(true),
            msg: Some(format!("{count} records saved")),
            message: None,
        })
    }
}

pub fn named(id: i64, name: &str) -> Record {
    Record::new().with("id", id).with("name", name)
}
