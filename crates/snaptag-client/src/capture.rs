//! Capture flow: quota gate, upload, signed URL, vision analysis, then
//! confirmation of the reviewed detections.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use snaptag_shared::detection::{Detection, ParsedDetections};
use snaptag_shared::quota::QuotaStatus;
use snaptag_shared::types::normalize_name;

use crate::error::{ClientError, Result};
use crate::remote::RemoteBackend;
use crate::sync::{ObjectDraft, SaveOutcome, SyncEngine};
use crate::vision::VisionClient;

/// Anything that can name the objects in an image reachable at a URL.
#[allow(async_fn_in_trait)]
pub trait Analyzer {
    async fn analyze(&self, image_url: &str) -> Result<ParsedDetections>;
}

impl Analyzer for VisionClient {
    async fn analyze(&self, image_url: &str) -> Result<ParsedDetections> {
        VisionClient::analyze(self, image_url).await
    }
}

/// An uploaded image awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedImage {
    /// Storage path, becomes the picture's image reference on confirm.
    pub image_ref: String,
    pub signed_url: String,
    pub detections: ParsedDetections,
    /// Quota as it stood before this capture.
    pub quota: QuotaStatus,
}

pub struct CaptureService<R, A> {
    engine: SyncEngine<R>,
    analyzer: A,
    signed_url_ttl_secs: i64,
}

impl<R: RemoteBackend, A: Analyzer> CaptureService<R, A> {
    pub fn new(engine: SyncEngine<R>, analyzer: A, signed_url_ttl_secs: i64) -> Self {
        Self {
            engine,
            analyzer,
            signed_url_ttl_secs,
        }
    }

    pub fn engine(&self) -> &SyncEngine<R> {
        &self.engine
    }

    /// Upload and analyze a new image.
    ///
    /// Fails with [`ClientError::QuotaExceeded`] before uploading anything
    /// when today's limit is reached.
    pub async fn capture(&self, data: Vec<u8>, content_type: &str) -> Result<CapturedImage> {
        let owner = self.engine.owner();

        let quota = self.engine.check_quota().await?;
        if !quota.can_capture {
            info!(owner = %owner, count = quota.count, limit = quota.limit, "capture blocked by daily quota");
            return Err(ClientError::QuotaExceeded {
                count: quota.count,
                limit: quota.limit,
            });
        }

        let remote = self.engine.remote();
        let upload = remote.upload_image(owner, data, content_type).await?;
        let signed = remote
            .sign_url(owner, &upload.path, self.signed_url_ttl_secs)
            .await?;
        let detections = self.analyzer.analyze(&signed.signed_url).await?;

        info!(
            owner = %owner,
            image = %upload.path,
            size = upload.size,
            detections = detections.detections.len(),
            source = ?detections.source,
            "image captured"
        );

        Ok(CapturedImage {
            image_ref: upload.path,
            signed_url: signed.signed_url,
            detections,
            quota,
        })
    }

    /// Save the reviewed objects of a captured image. Drafts with blank
    /// names are skipped.
    pub async fn confirm(&self, image_ref: &str, drafts: &[ObjectDraft]) -> Result<Vec<SaveOutcome>> {
        let mut outcomes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if normalize_name(&draft.name).is_none() {
                warn!(image = %image_ref, "skipping object with blank name");
                continue;
            }
            outcomes.push(self.engine.save_object(image_ref, draft).await?);
        }
        Ok(outcomes)
    }

    /// Confirm every detection unchanged.
    pub async fn confirm_detections(&self, image_ref: &str, detections: &[Detection]) -> Result<Vec<SaveOutcome>> {
        let drafts: Vec<ObjectDraft> = detections.iter().map(ObjectDraft::from).collect();
        self.confirm(image_ref, &drafts).await
    }
}
