//! Test support: a scripted transport and a wired-up engine harness.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use nimbus_cache::{DatabasePool, SqliteStateRepository};
use nimbus_core::{
    domain::{AccountContext, ItemId, ItemRecord, LocalCacheEntry, RemotePath, VersionToken},
    ports::{
        IRemoteTransport, IStateRepository, ProgressSink, TransportError, TransportErrorKind,
        TransportResponse,
    },
};
use tempfile::TempDir;
use tokio::sync::watch;

use crate::{
    completion::{CompletionHandle, CompletionQueue},
    signal::SignalBus,
    storage::LocalStorage,
};

pub(crate) const HOME: &str = "/remote.php/dav/files/alice";

/// What the scripted transport answers to the next request
pub(crate) enum Script {
    Respond {
        status: u16,
        token: Option<String>,
        file_id: Option<String>,
        body: Vec<u8>,
    },
    Fail(TransportError),
    /// Writes some bytes, then loses the connection
    PartialThenFail(Vec<u8>),
}

impl Script {
    pub(crate) fn ok_body(token: &str, body: &[u8]) -> Self {
        Script::Respond {
            status: 200,
            token: Some(token.to_string()),
            file_id: None,
            body: body.to_vec(),
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Script::Respond {
            status,
            token: None,
            file_id: None,
            body: Vec::new(),
        }
    }

    pub(crate) fn uploaded(file_id: Option<&str>, token: &str) -> Self {
        Script::Respond {
            status: 201,
            token: Some(token.to_string()),
            file_id: file_id.map(str::to_string),
            body: Vec::new(),
        }
    }
}

/// In-process transport answering from per-direction scripts
///
/// Unscripted downloads succeed with a small body; unscripted uploads
/// succeed without a file id. `hold` parks every request until `release`.
pub(crate) struct ScriptedTransport {
    downloads: Mutex<VecDeque<Script>>,
    uploads: Mutex<VecDeque<Script>>,
    download_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    upload_remotes: Mutex<Vec<RemotePath>>,
    gate: watch::Sender<bool>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            downloads: Mutex::new(VecDeque::new()),
            uploads: Mutex::new(VecDeque::new()),
            download_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            upload_remotes: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub(crate) fn push_download(&self, script: Script) {
        self.downloads.lock().unwrap().push_back(script);
    }

    pub(crate) fn push_upload(&self, script: Script) {
        self.uploads.lock().unwrap().push_back(script);
    }

    pub(crate) fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn upload_remotes(&self) -> Vec<RemotePath> {
        self.upload_remotes.lock().unwrap().clone()
    }

    pub(crate) fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub(crate) fn release(&self) {
        self.gate.send_replace(true);
    }

    async fn pass_gate(&self) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

fn response(status: u16, token: Option<String>, file_id: Option<String>, bytes: u64) -> TransportResponse {
    TransportResponse {
        status,
        version_token: token.map(|t| VersionToken::new(t).unwrap()),
        file_id: file_id.map(|id| ItemId::new(id).unwrap()),
        date: Some(Utc::now()),
        last_modified: None,
        bytes,
    }
}

fn io_error(e: std::io::Error) -> TransportError {
    TransportError::new(TransportErrorKind::Io, e.to_string())
}

#[async_trait]
impl IRemoteTransport for ScriptedTransport {
    async fn download(
        &self,
        _remote: &RemotePath,
        destination: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, TransportError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;

        let script = self
            .downloads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::ok_body("v1", b"content"));

        match script {
            Script::Respond {
                status,
                token,
                file_id,
                body,
            } => {
                if !(200..300).contains(&status) {
                    return Ok(response(status, token, file_id, 0));
                }
                if let Some(parent) = destination.parent() {
                    std::fs::create_dir_all(parent).map_err(io_error)?;
                }
                let total = body.len() as u64;
                progress.report(total / 2, Some(total));
                std::fs::write(destination, &body).map_err(io_error)?;
                progress.report(total, Some(total));
                Ok(response(status, token, file_id, total))
            }
            Script::Fail(e) => Err(e),
            Script::PartialThenFail(body) => {
                if let Some(parent) = destination.parent() {
                    std::fs::create_dir_all(parent).map_err(io_error)?;
                }
                std::fs::write(destination, &body).map_err(io_error)?;
                Err(TransportError::new(
                    TransportErrorKind::ConnectionLost,
                    "connection reset",
                ))
            }
        }
    }

    async fn upload(
        &self,
        remote: &RemotePath,
        source: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, TransportError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.upload_remotes.lock().unwrap().push(remote.clone());
        self.pass_gate().await;

        let total = std::fs::metadata(source).map_err(io_error)?.len();
        progress.report(total, Some(total));

        let script = self
            .uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::uploaded(None, "v-up"));

        match script {
            Script::Respond {
                status,
                token,
                file_id,
                ..
            } => Ok(response(status, token, file_id, total)),
            Script::Fail(e) => Err(e),
            Script::PartialThenFail(_) => Err(TransportError::new(
                TransportErrorKind::ConnectionLost,
                "connection reset",
            )),
        }
    }
}

/// Catalogue, storage, completion queue and transport wired together
pub(crate) struct Harness {
    pub(crate) dir: TempDir,
    pub(crate) repo: Arc<SqliteStateRepository>,
    pub(crate) storage: LocalStorage,
    pub(crate) signals: SignalBus,
    pub(crate) completion: CompletionHandle,
    pub(crate) transport: Arc<ScriptedTransport>,
    pub(crate) ctx: AccountContext,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = DatabasePool::in_memory().await.unwrap();
        let repo = Arc::new(SqliteStateRepository::new(pool.pool().clone()));
        let storage = LocalStorage::new(dir.path().join("storage")).unwrap();
        let signals = SignalBus::new();
        let (queue, completion) =
            CompletionQueue::new(repo.clone(), storage.clone(), signals.clone());
        tokio::spawn(queue.run());

        Self {
            dir,
            repo,
            storage,
            signals,
            completion,
            transport: Arc::new(ScriptedTransport::new()),
            ctx: AccountContext::new("alice", home()).unwrap(),
        }
    }

    pub(crate) async fn insert_file(&self, id: &str, name: &str, token: Option<&str>) -> ItemRecord {
        self.insert_file_in(home(), id, name, token).await
    }

    pub(crate) async fn insert_file_in(
        &self,
        container: RemotePath,
        id: &str,
        name: &str,
        token: Option<&str>,
    ) -> ItemRecord {
        let mut record =
            ItemRecord::new_file(item_id(id), name, container, 7, Utc::now()).unwrap();
        if let Some(token) = token {
            record = record.with_version_token(VersionToken::new(token.to_string()).unwrap());
        }
        self.repo.upsert_record(&record).await.unwrap();
        record
    }

    pub(crate) async fn insert_directory(&self, id: &str, name: &str) -> ItemRecord {
        self.insert_directory_in(home(), id, name).await
    }

    pub(crate) async fn insert_directory_in(
        &self,
        container: RemotePath,
        id: &str,
        name: &str,
    ) -> ItemRecord {
        let record = ItemRecord::new_directory(item_id(id), name, container, Utc::now()).unwrap();
        self.repo.upsert_record(&record).await.unwrap();
        record
    }

    pub(crate) async fn record(&self, id: &str) -> ItemRecord {
        self.repo.get_record(&item_id(id)).await.unwrap().unwrap()
    }

    /// Writes content for `record` and a cache entry matching its token
    pub(crate) async fn cache(&self, record: &ItemRecord) {
        let path = self.write_content(record, b"cached");
        let entry = LocalCacheEntry::for_record(record, path);
        self.repo.upsert_cache_entry(&entry).await.unwrap();
    }

    pub(crate) fn write_content(&self, record: &ItemRecord, content: &[u8]) -> std::path::PathBuf {
        self.storage.ensure_dir(record.id()).unwrap();
        let path = self.storage.content_path(record.id(), record.name());
        std::fs::write(&path, content).unwrap();
        path
    }
}

pub(crate) fn home() -> RemotePath {
    RemotePath::new(HOME.to_string()).unwrap()
}

pub(crate) fn item_id(id: &str) -> ItemId {
    ItemId::new(id.to_string()).unwrap()
}
