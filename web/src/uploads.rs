//! Image upload URLs.
//!
//! Clients upload report images straight to object storage. The service only
//! hands out an upload URL plus the stable public URL to store as `image_url`
//! on the report. Whether the upload URL is actually time-bounded depends on
//! the [`UploadIssuer`]; see [`PublicBucketUploadIssuer`].
//!
//! Object keys have the form `reports/<user_id>/<uuid><ext>`, where
//! `<user_id>` is percent-encoded into a single path segment and `<ext>` is
//! the lower-cased extension of the file's base name, `.jpg` when absent.

use chrono::{DateTime, Duration, Utc};
use reportdesk_core::UserId;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Validity advertised for an upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::minutes(10);

const DEFAULT_EXTENSION: &str = ".jpg";

/// Errors from upload URL issuance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The storage backend refused to issue a URL.
    #[error("Failed to create upload URL: {0}")]
    Issue(String),

    /// The owner id cannot be used as a key segment.
    #[error("User id {0:?} cannot be used in an object key")]
    InvalidOwner(String),
}

/// An issued upload slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadTicket {
    /// Where the client PUTs the file.
    pub upload_url: String,
    /// Stable public URL of the object once uploaded.
    pub image_url: String,
    /// Object key inside the bucket.
    pub object_key: String,
    /// Advertised end of the upload window.
    pub expires_at: DateTime<Utc>,
}

/// Issues upload URLs for report images.
pub trait UploadIssuer: Send + Sync {
    /// Issue an upload slot for `file_name` owned by `user_id`.
    ///
    /// # Errors
    ///
    /// [`UploadError::Issue`] when the backend cannot issue a URL,
    /// [`UploadError::InvalidOwner`] when `user_id` is not a usable key segment.
    fn issue<'a>(
        &'a self,
        user_id: &'a UserId,
        file_name: &'a str,
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<UploadTicket, UploadError>> + Send + 'a>>;
}

/// Derive the object key for an upload.
///
/// Directory components of `file_name` are ignored. Reserved characters in
/// `user_id` are percent-encoded, so it always occupies one segment.
///
/// ```
/// use reportdesk_core::UserId;
/// use reportdesk_web::uploads::object_key;
/// use uuid::Uuid;
///
/// let id = Uuid::nil();
/// assert_eq!(
///     object_key(&UserId::from("u1"), "../photos/Pothole.PNG", id).ok(),
///     Some(format!("reports/u1/{id}.png")),
/// );
/// assert_eq!(
///     object_key(&UserId::from("a/b"), "p.jpg", id).ok(),
///     Some(format!("reports/a%2Fb/{id}.jpg")),
/// );
/// ```
///
/// # Errors
///
/// [`UploadError::InvalidOwner`] for a blank user id or one that is `.` or
/// `..`.
pub fn object_key(user_id: &UserId, file_name: &str, id: Uuid) -> Result<String, UploadError> {
    let owner = urlencoding::encode(user_id.as_str());
    if matches!(&*owner, "" | "." | "..") {
        return Err(UploadError::InvalidOwner(user_id.to_string()));
    }
    Ok(format!("reports/{owner}/{id}{}", extension(file_name)))
}

fn extension(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    match base.rfind('.') {
        Some(dot) if dot + 1 < base.len() => base[dot..].to_ascii_lowercase(),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Unsigned URLs for a publicly writable bucket (MinIO in development).
///
/// The upload URL is `<endpoint>/<bucket>/<key>`; the public URL is
/// `<public_base_url>/<bucket>/<key>`. Nothing is signed, so the upload URL
/// stays usable for as long as the bucket accepts anonymous writes. The
/// `X-Amz-Expires` parameter and `expires_at` only advertise
/// [`UPLOAD_URL_TTL`]. Use a signing issuer wherever the bucket is not open.
#[derive(Clone, Debug)]
pub struct PublicBucketUploadIssuer {
    endpoint: String,
    public_base_url: String,
    bucket: String,
}

impl PublicBucketUploadIssuer {
    /// Create an issuer. Trailing slashes on the URLs are ignored.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        public_base_url: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }

    /// The target bucket.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl UploadIssuer for PublicBucketUploadIssuer {
    fn issue<'a>(
        &'a self,
        user_id: &'a UserId,
        file_name: &'a str,
        content_type: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<UploadTicket, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            let key = object_key(user_id, file_name, Uuid::new_v4())?;
            let ticket = UploadTicket {
                upload_url: format!(
                    "{}/{}/{key}?X-Amz-Expires={}",
                    self.endpoint,
                    self.bucket,
                    UPLOAD_URL_TTL.num_seconds()
                ),
                image_url: format!("{}/{}/{key}", self.public_base_url, self.bucket),
                object_key: key,
                expires_at: Utc::now() + UPLOAD_URL_TTL,
            };

            tracing::info!(
                bucket = %self.bucket,
                object_key = %ticket.object_key,
                content_type,
                "Upload URL issued"
            );
            Ok(ticket)
        })
    }
}
