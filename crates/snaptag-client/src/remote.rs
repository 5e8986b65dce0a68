//! Access to the authoritative backend.
//!
//! [`RemoteBackend`] is the seam between the sync layer and the network;
//! [`HttpBackend`] implements it against the SnapTag server API.

use reqwest::multipart;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use snaptag_shared::constants::OWNER_HEADER;
use snaptag_shared::protocol::{
    CreateObject, CreatePicture, ErrorBody, RenameObject, SignRequest, SignedUrl, SoftDeletePicture,
    SoftDeleteStats, TodayCount, UpdatePicture, UploadResponse,
};
use snaptag_shared::OwnerId;
use snaptag_store::{ObjectView, Picture, PictureWithObjects, TaggedObject};

use crate::error::{ClientError, Result};

/// Remote table, storage and procedure calls used by the sync layer.
///
/// Every call is a single request with no retry.
#[allow(async_fn_in_trait)]
pub trait RemoteBackend {
    /// The live picture for an image reference, if one exists.
    async fn find_picture(&self, owner: OwnerId, image_ref: &str) -> Result<Option<Picture>>;

    async fn create_picture(&self, owner: OwnerId, req: &CreatePicture) -> Result<Picture>;

    async fn insert_object(&self, owner: OwnerId, req: &CreateObject) -> Result<TaggedObject>;

    /// Every live object of the owner, joined with its picture.
    async fn list_objects(&self, owner: OwnerId) -> Result<Vec<ObjectView>>;

    async fn list_pictures(&self, owner: OwnerId) -> Result<Vec<PictureWithObjects>>;

    async fn search_pictures(&self, owner: OwnerId, query: &str) -> Result<Vec<PictureWithObjects>>;

    async fn update_picture(&self, owner: OwnerId, id: Uuid, update: &UpdatePicture) -> Result<Picture>;

    async fn rename_object(&self, owner: OwnerId, id: Uuid, name: &str) -> Result<TaggedObject>;

    async fn soft_delete_picture(&self, owner: OwnerId, id: Uuid) -> Result<SoftDeleteStats>;

    /// Pictures the owner created today, on the backend's calendar.
    async fn today_count(&self, owner: OwnerId) -> Result<u32>;

    async fn upload_image(&self, owner: OwnerId, data: Vec<u8>, content_type: &str) -> Result<UploadResponse>;

    async fn sign_url(&self, owner: OwnerId, path: &str, expires_in: i64) -> Result<SignedUrl>;
}

/// [`RemoteBackend`] over the server's JSON API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, owner: OwnerId, path: &str) -> RequestBuilder {
        self.http.get(self.url(path)).header(OWNER_HEADER, owner.to_string())
    }

    fn post(&self, owner: OwnerId, path: &str) -> RequestBuilder {
        self.http.post(self.url(path)).header(OWNER_HEADER, owner.to_string())
    }

    fn patch(&self, owner: OwnerId, path: &str) -> RequestBuilder {
        self.http.patch(self.url(path)).header(OWNER_HEADER, owner.to_string())
    }
}

/// Decode a success body, or turn the server's `{"error": ...}` body into
/// [`ClientError::Remote`].
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(ClientError::Remote {
        status: status.as_u16(),
        message,
    })
}

impl RemoteBackend for HttpBackend {
    async fn find_picture(&self, owner: OwnerId, image_ref: &str) -> Result<Option<Picture>> {
        let resp = self
            .get(owner, "/pictures")
            .query(&[("image_ref", image_ref)])
            .send()
            .await?;
        let found: Vec<PictureWithObjects> = decode(resp).await?;
        Ok(found.into_iter().next().map(|p| p.picture))
    }

    async fn create_picture(&self, owner: OwnerId, req: &CreatePicture) -> Result<Picture> {
        let resp = self.post(owner, "/pictures").json(req).send().await?;
        decode(resp).await
    }

    async fn insert_object(&self, owner: OwnerId, req: &CreateObject) -> Result<TaggedObject> {
        let resp = self.post(owner, "/objects").json(req).send().await?;
        decode(resp).await
    }

    async fn list_objects(&self, owner: OwnerId) -> Result<Vec<ObjectView>> {
        let resp = self.get(owner, "/objects").send().await?;
        decode(resp).await
    }

    async fn list_pictures(&self, owner: OwnerId) -> Result<Vec<PictureWithObjects>> {
        let resp = self.get(owner, "/pictures").send().await?;
        decode(resp).await
    }

    async fn search_pictures(&self, owner: OwnerId, query: &str) -> Result<Vec<PictureWithObjects>> {
        let resp = self
            .get(owner, "/pictures/search")
            .query(&[("q", query)])
            .send()
            .await?;
        decode(resp).await
    }

    async fn update_picture(&self, owner: OwnerId, id: Uuid, update: &UpdatePicture) -> Result<Picture> {
        let resp = self
            .patch(owner, &format!("/pictures/{id}"))
            .json(update)
            .send()
            .await?;
        decode(resp).await
    }

    async fn rename_object(&self, owner: OwnerId, id: Uuid, name: &str) -> Result<TaggedObject> {
        let resp = self
            .patch(owner, &format!("/objects/{id}"))
            .json(&RenameObject {
                name: name.to_string(),
            })
            .send()
            .await?;
        decode(resp).await
    }

    async fn soft_delete_picture(&self, owner: OwnerId, id: Uuid) -> Result<SoftDeleteStats> {
        let resp = self
            .post(owner, "/rpc/soft_delete_picture")
            .json(&SoftDeletePicture { picture_id: id })
            .send()
            .await?;
        decode(resp).await
    }

    async fn today_count(&self, owner: OwnerId) -> Result<u32> {
        let resp = self.get(owner, "/pictures/today-count").send().await?;
        let today: TodayCount = decode(resp).await?;
        Ok(today.count)
    }

    async fn upload_image(&self, owner: OwnerId, data: Vec<u8>, content_type: &str) -> Result<UploadResponse> {
        let part = multipart::Part::bytes(data)
            .file_name("capture")
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);

        let resp = self.post(owner, "/storage/upload").multipart(form).send().await?;
        decode(resp).await
    }

    async fn sign_url(&self, owner: OwnerId, path: &str, expires_in: i64) -> Result<SignedUrl> {
        let resp = self
            .post(owner, "/storage/sign")
            .json(&SignRequest {
                path: path.to_string(),
                expires_in: Some(expires_in),
            })
            .send()
            .await?;
        decode(resp).await
    }
}
