use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, trace};

use crate::backend::Backend;
use crate::domain::Message;
use crate::import::{self, ImportMapping};
use crate::record::RecordKind;

/// Runs backend calls off the ui thread. Each call posts exactly one
/// result message, the controller picks them up on its next tick.
pub struct Worker {
    backend: Arc<dyn Backend>,
    sender: Sender<Message>,
}

pub fn channel(backend: Arc<dyn Backend>) -> (Worker, Receiver<Message>) {
    let (sender, receiver) = mpsc::channel();
    (Worker { backend, sender }, receiver)
}

impl Worker {
    fn spawn<F>(&self, job: &'static str, f: F)
    where
        F: FnOnce(&dyn Backend) -> Message + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let sender = self.sender.clone();
        debug!("Starting {job} job");
        thread::spawn(move || {
            let message = f(backend.as_ref());
            if sender.send(message).is_err() {
                trace!("Dropping {job} result, ui is gone");
            }
        });
    }

    pub fn fetch(&self, kind: RecordKind, generation: u64) {
        self.spawn("fetch", move |backend| Message::Fetched {
            generation,
            result: backend.fetch(kind),
        });
    }

    pub fn delete(&self, kind: RecordKind, id: i64) {
        self.spawn("delete", move |backend| Message::Deleted {
            id,
            result: backend.delete(kind, id),
        });
    }

    pub fn import(&self, path: PathBuf, mapping: ImportMapping, photos: Vec<PathBuf>) {
        self.spawn("import", move |backend| {
            let result = import::load(&path, &mapping)
                .and_then(|records| import::submit(backend, records, photos));
            Message::Imported(result)
        });
    }
}
