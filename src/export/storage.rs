//! Object-storage collaborator contract.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage rejected upload: {0}")]
    Rejected(String),
}

/// Persists a generated artifact and returns its public URL. A failure here
/// must abort the surrounding export transaction.
#[rocket::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn store(
        &self,
        bytes: Vec<u8>,
        name: &str,
        destination: &str,
    ) -> Result<String, StorageError>;
}

/// HTTP-backed store: `PUT {base}/{destination}/{name}` with the artifact as
/// the request body.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("LEADSTORE_STORAGE_URL").ok().map(Self::new)
    }
}

#[rocket::async_trait]
impl ObjectStore for HttpObjectStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        name: &str,
        destination: &str,
    ) -> Result<String, StorageError> {
        let url = format!("{}/{}/{}", self.base_url, destination, name);
        let response = self
            .client
            .put(&url)
            .header("content-type", "text/csv")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Rejected(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        Ok(url)
    }
}

/// In-memory store used by tests and local development.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: std::sync::Mutex<Vec<StoredObject>>,
    fail: std::sync::atomic::AtomicBool,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub name: String,
    pub destination: String,
    pub bytes: Vec<u8>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `store` call fail; used to exercise rollback.
    pub fn fail_next(&self) {
        self.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<StoredObject> {
        self.objects.lock().expect("store lock").clone()
    }
}

#[rocket::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        name: &str,
        destination: &str,
    ) -> Result<String, StorageError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Rejected("simulated failure".into()));
        }

        self.objects.lock().expect("store lock").push(StoredObject {
            name: name.to_string(),
            destination: destination.to_string(),
            bytes,
        });
        Ok(format!("memory://{destination}/{name}"))
    }
}
