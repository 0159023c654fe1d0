//! Upload, describe and save, in that order.
//!
//! The pipeline owns no I/O of its own: it sequences the [`ObjectStore`], the
//! [`DescriptionGenerator`] and the [`RecordStore`], and remembers the most recent upload per
//! session so a describe request can refer to it implicitly.
//!
//! Sessions are keyed by whatever the client sends in `x-session-id`. Clients that send nothing
//! share one anonymous slot: concurrent uploads there race, and a describe request sees whichever
//! upload finished last. Slots are held in a bounded cache: idle sessions expire after
//! `uploads.session_ttl`, and beyond `uploads.max_sessions` the least recently used are evicted.

use bytes::Bytes;
use moka::{future::Cache, policy::EvictionPolicy};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    config::{DescriberConfig, UploadsConfig},
    db::{
        errors::DbError,
        models::{
            descriptions::{DescriptionRecord, DescriptionRecordCreateDBRequest},
            images::UploadedImageCreateDBRequest,
        },
        store::RecordStore,
    },
    describe::{DescribeError, DescriptionGenerator},
    errors::{Error, Upstream},
    storage::{ObjectStore, ObjectStoreError},
};

/// Scope used when the client did not identify a session
const ANONYMOUS_SESSION: &str = "";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Upload(#[from] ObjectStoreError),

    #[error(transparent)]
    Describe(#[from] DescribeError),

    #[error("failed to persist: {0}")]
    Persist(#[from] DbError),

    #[error("No image has been uploaded and no imageUrl was provided")]
    MissingImageUrl,

    #[error("{0} is required")]
    MissingField(&'static str),
}

impl From<PipelineError> for Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Upload(e) => Error::upstream(Upstream::ObjectStore, e),
            PipelineError::Describe(e) => Error::upstream(Upstream::Describer, e),
            PipelineError::Persist(e) => Error::upstream(Upstream::RecordStore, e),
            e @ (PipelineError::MissingImageUrl | PipelineError::MissingField(_)) => Error::BadRequest { message: e.to_string() },
        }
    }
}

pub struct Pipeline {
    objects: Arc<dyn ObjectStore>,
    describer: Arc<dyn DescriptionGenerator>,
    records: Arc<dyn RecordStore>,
    config: DescriberConfig,
    last_uploads: Cache<String, String>,
}

impl Pipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        describer: Arc<dyn DescriptionGenerator>,
        records: Arc<dyn RecordStore>,
        config: DescriberConfig,
        uploads: &UploadsConfig,
    ) -> Self {
        let last_uploads = Cache::builder()
            .max_capacity(uploads.max_sessions)
            .time_to_idle(uploads.session_ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            objects,
            describer,
            records,
            config,
            last_uploads,
        }
    }

    /// Store the image, remember its URL for the session, and record the upload.
    ///
    /// A storage failure leaves the session's previous URL untouched. A persistence failure
    /// after a successful store does not roll the object back.
    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    pub async fn handle_upload(
        &self,
        file_name: &str,
        bytes: Bytes,
        content_type: Option<&str>,
        session: Option<&str>,
    ) -> Result<String, PipelineError> {
        self.objects.put(file_name, bytes, content_type).await?;

        let image_url = self.objects.public_url(file_name);
        self.last_uploads
            .insert(session.unwrap_or(ANONYMOUS_SESSION).to_string(), image_url.clone())
            .await;

        self.records
            .create_uploaded_image(&UploadedImageCreateDBRequest {
                name: file_name.to_string(),
                url: image_url.clone(),
            })
            .await?;

        info!(%image_url, "Image uploaded");
        Ok(image_url)
    }

    /// Describe an explicit image URL, or the session's last upload.
    ///
    /// An empty `model` counts as absent.
    #[instrument(skip(self), err)]
    pub async fn handle_generate_description(
        &self,
        model: Option<&str>,
        image_url: Option<&str>,
        session: Option<&str>,
    ) -> Result<String, PipelineError> {
        let image_url = match image_url.filter(|url| !url.is_empty()) {
            Some(url) => url.to_string(),
            None => match self.last_upload(session).await {
                Some(url) => url,
                None if self.config.require_image_url => return Err(PipelineError::MissingImageUrl),
                None => String::new(),
            },
        };

        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.default_model.as_str());

        debug!(%model, %image_url, "Requesting description");
        let description = self.describer.describe(model, &self.config.prompt, &image_url).await?;

        Ok(description)
    }

    /// Persist a description record. Saving the same pair twice creates two records.
    #[instrument(skip(self, description), err)]
    pub async fn save_record(
        &self,
        image_url: Option<String>,
        description: Option<String>,
    ) -> Result<DescriptionRecord, PipelineError> {
        let image_url = image_url.ok_or(PipelineError::MissingField("imageUrl"))?;
        let description = description.ok_or(PipelineError::MissingField("description"))?;

        let record = self
            .records
            .create_description_record(&DescriptionRecordCreateDBRequest { image_url, description })
            .await?;

        Ok(record)
    }

    /// Every saved record, oldest first.
    #[instrument(skip(self), err)]
    pub async fn list_records(&self) -> Result<Vec<DescriptionRecord>, PipelineError> {
        Ok(self.records.list_description_records().await?)
    }

    /// The URL of the most recent upload in `session`
    pub async fn last_upload(&self, session: Option<&str>) -> Option<String> {
        self.last_uploads.get(session.unwrap_or(ANONYMOUS_SESSION)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory::MemoryStore,
        test_utils::{RecordingDescriber, RecordingObjectStore, test_storage_config},
    };

    struct Harness {
        pipeline: Pipeline,
        objects: Arc<RecordingObjectStore>,
        describer: Arc<RecordingDescriber>,
        records: Arc<MemoryStore>,
    }

    fn harness(config: DescriberConfig) -> Harness {
        harness_with_uploads(config, &UploadsConfig::default())
    }

    fn harness_with_uploads(config: DescriberConfig, uploads: &UploadsConfig) -> Harness {
        let objects = Arc::new(RecordingObjectStore::new(test_storage_config()));
        let describer = Arc::new(RecordingDescriber::replying("A red bicycle leaning on a wall."));
        let records = Arc::new(MemoryStore::new());
        let pipeline = Pipeline::new(objects.clone(), describer.clone(), records.clone(), config, uploads);
        Harness {
            pipeline,
            objects,
            describer,
            records,
        }
    }

    fn default_harness() -> Harness {
        harness(DescriberConfig::default())
    }

    #[tokio::test]
    async fn test_upload_returns_template_url_and_records_image() {
        let h = default_harness();

        let url = h
            .pipeline
            .handle_upload("bike.png", Bytes::from_static(b"\x89PNG"), Some("image/png"), None)
            .await
            .unwrap();

        assert_eq!(url, "https://test-bucket.s3.us-east-1.amazonaws.com/bike.png");
        assert_eq!(h.objects.keys(), vec!["bike.png".to_string()]);
        let images = h.records.list_uploaded_images().await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].url, url);
        assert_eq!(h.pipeline.last_upload(None).await, Some(url));
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_previous_url() {
        let h = default_harness();
        let first = h.pipeline.handle_upload("a.png", Bytes::from_static(b"a"), None, None).await.unwrap();

        h.objects.fail_next();
        let err = h.pipeline.handle_upload("b.png", Bytes::from_static(b"b"), None, None).await.unwrap_err();

        assert!(matches!(err, PipelineError::Upload(_)));
        assert_eq!(h.pipeline.last_upload(None).await, Some(first));
        assert_eq!(h.records.list_uploaded_images().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_describe_uses_latest_upload() {
        let h = default_harness();
        h.pipeline.handle_upload("a.png", Bytes::from_static(b"a"), None, None).await.unwrap();
        let b = h.pipeline.handle_upload("b.png", Bytes::from_static(b"b"), None, None).await.unwrap();

        let description = h.pipeline.handle_generate_description(None, None, None).await.unwrap();

        assert_eq!(description, "A red bicycle leaning on a wall.");
        let calls = h.describer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].image_url, b);
        assert_eq!(calls[0].model, "gpt-4o");
        assert_eq!(calls[0].prompt, "What's in this image?");
    }

    #[tokio::test]
    async fn test_anonymous_uploads_share_one_slot() {
        let h = Arc::new(default_harness());

        let a = {
            let h = h.clone();
            tokio::spawn(async move { h.pipeline.handle_upload("a.png", Bytes::from_static(b"a"), None, None).await })
        };
        let b = {
            let h = h.clone();
            tokio::spawn(async move { h.pipeline.handle_upload("b.png", Bytes::from_static(b"b"), None, None).await })
        };
        let urls = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];

        let last = h.pipeline.last_upload(None).await.unwrap();
        assert!(urls.contains(&last));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let h = default_harness();
        let alice = h
            .pipeline
            .handle_upload("alice.png", Bytes::from_static(b"a"), None, Some("alice"))
            .await
            .unwrap();
        h.pipeline
            .handle_upload("bob.png", Bytes::from_static(b"b"), None, Some("bob"))
            .await
            .unwrap();

        h.pipeline.handle_generate_description(None, None, Some("alice")).await.unwrap();

        assert_eq!(h.describer.calls()[0].image_url, alice);
        assert_eq!(h.pipeline.last_upload(None).await, None);
    }

    #[tokio::test]
    async fn test_explicit_image_url_wins() {
        let h = default_harness();
        h.pipeline.handle_upload("a.png", Bytes::from_static(b"a"), None, None).await.unwrap();

        h.pipeline
            .handle_generate_description(None, Some("https://elsewhere.example.com/x.jpg"), None)
            .await
            .unwrap();

        assert_eq!(h.describer.calls()[0].image_url, "https://elsewhere.example.com/x.jpg");
    }

    #[tokio::test]
    async fn test_caller_model_is_honored() {
        let h = default_harness();

        h.pipeline
            .handle_generate_description(Some("gpt-4o-mini"), Some("https://x/y.png"), None)
            .await
            .unwrap();
        h.pipeline
            .handle_generate_description(Some("  "), Some("https://x/y.png"), None)
            .await
            .unwrap();

        let calls = h.describer.calls();
        assert_eq!(calls[0].model, "gpt-4o-mini");
        assert_eq!(calls[1].model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_no_upload_is_rejected_without_remote_call() {
        let h = default_harness();

        let err = h.pipeline.handle_generate_description(None, None, None).await.unwrap_err();

        assert!(matches!(err, PipelineError::MissingImageUrl));
        assert!(h.describer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_upload_sends_empty_url_when_not_required() {
        let h = harness(DescriberConfig {
            require_image_url: false,
            ..Default::default()
        });

        h.pipeline.handle_generate_description(None, None, None).await.unwrap();

        assert_eq!(h.describer.calls()[0].image_url, "");
    }

    #[tokio::test]
    async fn test_describer_failure_is_propagated() {
        let h = default_harness();
        h.describer.fail_next();

        let err = h
            .pipeline
            .handle_generate_description(None, Some("https://x/y.png"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Describe(_)));
    }

    #[tokio::test]
    async fn test_saving_same_pair_twice_creates_two_records() {
        let h = default_harness();
        let url = Some("https://x/y.png".to_string());
        let description = Some("A dog".to_string());

        let first = h.pipeline.save_record(url.clone(), description.clone()).await.unwrap();
        let second = h.pipeline.save_record(url, description).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(h.pipeline.list_records().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_list_returns_every_saved_record() {
        let h = default_harness();
        for i in 0..5 {
            h.pipeline
                .save_record(Some(format!("https://x/{i}.png")), Some(format!("image {i}")))
                .await
                .unwrap();
        }

        let records = h.pipeline.list_records().await.unwrap();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.image_url, format!("https://x/{i}.png"));
            assert_eq!(record.description, format!("image {i}"));
        }
    }

    #[tokio::test]
    async fn test_save_requires_both_fields() {
        let h = default_harness();

        let err = h.pipeline.save_record(None, Some("d".to_string())).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingField("imageUrl")));

        let err = h.pipeline.save_record(Some("u".to_string()), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingField("description")));

        assert!(h.pipeline.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_slots_are_bounded() {
        let uploads = UploadsConfig {
            max_sessions: 16,
            ..Default::default()
        };
        let h = harness_with_uploads(DescriberConfig::default(), &uploads);

        for i in 0..500 {
            let session = format!("session-{i}");
            h.pipeline
                .handle_upload(&format!("{i}.png"), Bytes::from_static(b"x"), None, Some(&session))
                .await
                .unwrap();
        }
        h.pipeline.last_uploads.run_pending_tasks().await;

        assert!(h.pipeline.last_uploads.entry_count() <= 16);
        assert_eq!(h.pipeline.last_upload(Some("session-0")).await, None);
        assert_eq!(
            h.pipeline.last_upload(Some("session-499")).await,
            Some("https://test-bucket.s3.us-east-1.amazonaws.com/499.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_idle_session_slot_expires() {
        let uploads = UploadsConfig {
            session_ttl: std::time::Duration::from_millis(50),
            ..Default::default()
        };
        let h = harness_with_uploads(DescriberConfig::default(), &uploads);

        h.pipeline
            .handle_upload("a.png", Bytes::from_static(b"a"), None, Some("idle"))
            .await
            .unwrap();
        assert!(h.pipeline.last_upload(Some("idle")).await.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        assert_eq!(h.pipeline.last_upload(Some("idle")).await, None);
        let err = h
            .pipeline
            .handle_generate_description(None, None, Some("idle"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingImageUrl));
    }
}
