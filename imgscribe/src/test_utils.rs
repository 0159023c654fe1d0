//! Test fixtures: a fully wired router over in-memory stores and recording fakes.

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::{
    AppState, build_router,
    config::{Config, DatabaseConfig, EmailConfig, EmailTransport, StorageConfig},
    db::memory::MemoryStore,
    describe::{DescribeError, DescriptionGenerator},
    email::EmailService,
    pipeline::Pipeline,
    storage::{ObjectStore, ObjectStoreError, public_url},
};

/// Install the process-wide rustls provider; reqwest is built without one.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn test_storage_config() -> StorageConfig {
    StorageConfig {
        bucket: "test-bucket".to_string(),
        region: "us-east-1".to_string(),
        ..Default::default()
    }
}

/// A valid configuration using the memory store and cheap Argon2 parameters
pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        storage: test_storage_config(),
        email: EmailConfig {
            transport: Some(EmailTransport::File),
            from_email: Some("noreply@example.com".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    config.describer.api_key = Some("sk-test".to_string());
    config.auth.password.argon2_memory_kib = 8;
    config.auth.password.argon2_iterations = 1;
    config.auth.password.argon2_parallelism = 1;
    config
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size: usize,
    pub content_type: Option<String>,
}

/// Object store that keeps a list of what was written. Can be told to fail the next put.
pub struct RecordingObjectStore {
    config: StorageConfig,
    objects: Mutex<Vec<StoredObject>>,
    fail_next: Mutex<bool>,
}

impl RecordingObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            objects: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        }
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().iter().map(|o| o.key.clone()).collect()
    }

    pub fn content_types(&self) -> Vec<Option<String>> {
        self.objects.lock().unwrap().iter().map(|o| o.content_type.clone()).collect()
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> Result<(), ObjectStoreError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(ObjectStoreError::Put {
                key: key.to_string(),
                source: anyhow::anyhow!("AccessDenied"),
            });
        }
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            size: bytes.len(),
            content_type: content_type.map(str::to_string),
        });
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.config, key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeCall {
    pub model: String,
    pub prompt: String,
    pub image_url: String,
}

/// Describer that answers with a fixed reply and records every call.
pub struct RecordingDescriber {
    reply: String,
    calls: Mutex<Vec<DescribeCall>>,
    fail_next: Mutex<bool>,
}

impl RecordingDescriber {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        }
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<DescribeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DescriptionGenerator for RecordingDescriber {
    async fn describe(&self, model: &str, prompt: &str, image_url: &str) -> Result<String, DescribeError> {
        self.calls.lock().unwrap().push(DescribeCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
            image_url: image_url.to_string(),
        });
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(DescribeError::EmptyResponse);
        }
        Ok(self.reply.clone())
    }
}

/// The full router over fakes, with handles to inspect them.
pub struct TestApp {
    pub server: TestServer,
    pub objects: Arc<RecordingObjectStore>,
    pub describer: Arc<RecordingDescriber>,
    pub store: Arc<MemoryStore>,
    emails: TempDir,
}

impl TestApp {
    pub fn with_config(mut config: Config) -> Self {
        let emails = TempDir::new().expect("Failed to create email directory");
        config.email.transport = Some(EmailTransport::File);
        config.email.file_path = emails.path().to_string_lossy().into_owned();

        let objects = Arc::new(RecordingObjectStore::new(config.storage.clone()));
        let describer = Arc::new(RecordingDescriber::replying("A red bicycle leaning on a wall."));
        let store = Arc::new(MemoryStore::new());
        let pipeline = Arc::new(Pipeline::new(
            objects.clone(),
            describer.clone(),
            store.clone(),
            config.describer.clone(),
            &config.uploads,
        ));
        let email = Arc::new(EmailService::new(&config.email).expect("Failed to create email service"));

        let state = AppState::builder()
            .config(config)
            .pipeline(pipeline)
            .users(store.clone())
            .email(email)
            .build();
        let router = build_router(state).expect("Failed to build router");
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            objects,
            describer,
            store,
            emails,
        }
    }

    /// OTPs from every email sent so far. The emails are removed once read.
    pub fn take_otps(&self) -> Vec<String> {
        const MARKER: &str = "Your OTP for password reset is: ";

        let mut otps = Vec::new();
        for entry in std::fs::read_dir(self.emails.path()).expect("Failed to read email directory") {
            let path = entry.expect("Failed to read email entry").path();
            if path.extension().is_none_or(|ext| ext != "eml") {
                continue;
            }
            let email = std::fs::read_to_string(&path).expect("Failed to read email");
            if let Some(start) = email.find(MARKER) {
                otps.push(email[start + MARKER.len()..].chars().take(6).collect());
            }
            std::fs::remove_file(&path).expect("Failed to remove email");
        }
        otps
    }
}

pub fn create_test_app() -> TestApp {
    TestApp::with_config(create_test_config())
}
