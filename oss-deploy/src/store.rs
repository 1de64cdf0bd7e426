//! Aliyun OSS backend for [`ObjectStore`], spoken over the S3-compatible API.
//!
//! Keys handed in by the core start with `/` (they are `pathPrefix` joined with
//! the relative path); the leading slash is dropped to form the object key.
//! The content fingerprint is sent as `Content-MD5`, so the service verifies
//! the body, and is also stored as the `content-md5` user metadata entry that
//! `head` reads back. Objects without that entry fall back to the native
//! `Content-MD5` response header.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::interceptors::BeforeDeserializationInterceptorContextRef;
use aws_sdk_s3::config::{
    ConfigBag, Credentials, Intercept, RequestChecksumCalculation, ResponseChecksumValidation,
    RuntimeComponents,
};
use aws_sdk_s3::error::{BoxError, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use oss_deploy_core::config::StorageCredentials;
use oss_deploy_core::contract::{ObjectHead, ObjectStore, PutObject};
use oss_deploy_core::error::StoreError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, warn};

/// User metadata entry holding the upload fingerprint.
pub const META_FINGERPRINT: &str = "content-md5";
const CONTENT_MD5_HEADER: &str = "content-md5";

/// Endpoint for a region, e.g. `oss-cn-hangzhou` -> `https://oss-cn-hangzhou.aliyuncs.com`.
pub fn endpoint_for(region: &str, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|e| !e.is_empty()) {
        Some(url) => {
            let lower = url.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            }
        }
        None if region.starts_with("oss-") => format!("https://{region}.aliyuncs.com"),
        None => format!("https://oss-{region}.aliyuncs.com"),
    }
}

/// Object key for a deploy key: `/v1/a.js` -> `v1/a.js`.
pub fn object_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

/// Fingerprint of a remote object: the `content-md5` metadata entry written by
/// [`OssStore::put`], else the service's own `Content-MD5` response header,
/// which objects uploaded by other tools carry.
pub fn stored_fingerprint(
    metadata: Option<&HashMap<String, String>>,
    content_md5_header: Option<String>,
) -> Option<String> {
    metadata
        .and_then(|meta| meta.get(META_FINGERPRINT))
        .cloned()
        .or(content_md5_header)
        .filter(|fp| !fp.is_empty())
}

/// Records the `Content-MD5` response header, which `HeadObjectOutput` does not model.
#[derive(Debug, Clone, Default)]
struct ContentMd5Capture {
    value: Arc<Mutex<Option<String>>>,
}

impl ContentMd5Capture {
    fn take(&self) -> Option<String> {
        self.value.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Intercept for ContentMd5Capture {
    fn name(&self) -> &'static str {
        "ContentMd5Capture"
    }

    fn read_before_deserialization(
        &self,
        context: &BeforeDeserializationInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let header = context
            .response()
            .headers()
            .get(CONTENT_MD5_HEADER)
            .map(str::to_string);
        if let Ok(mut slot) = self.value.lock() {
            *slot = header;
        }
        Ok(())
    }
}

fn map_sdk_error<E>(err: SdkError<E>, key: &str) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let SdkError::ServiceError(ref service_err) = err {
        if service_err.raw().status().as_u16() == 404 {
            return StoreError::NotFound(key.to_string());
        }
    }
    StoreError::Backend(Box::new(err))
}

/// Bucket client for one run.
pub struct OssStore {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl std::fmt::Debug for OssStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssStore")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OssStore {
    pub fn new(storage: &StorageCredentials) -> Self {
        let endpoint = endpoint_for(&storage.region, storage.endpoint.as_deref());
        let credentials = Credentials::new(
            storage.access_key_id.clone(),
            storage.access_key_secret.clone(),
            None,
            None,
            "oss-deploy-config",
        );

        // OSS rejects the streaming checksum trailers newer SDKs send by default
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(storage.region.clone()))
            .endpoint_url(&endpoint)
            .credentials_provider(credentials)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        debug!(bucket = %storage.bucket, endpoint = %endpoint, "OSS client configured");

        OssStore {
            client: Client::from_conf(config),
            bucket: storage.bucket.clone(),
            endpoint,
        }
    }
}

#[async_trait]
impl ObjectStore for OssStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        let capture = ContentMd5Capture::default();
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(object_key(key))
            .customize()
            .interceptor(capture.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(ObjectHead::found(stored_fingerprint(
            output.metadata(),
            capture.take(),
        )))
    }

    #[instrument(skip(self, req), fields(bucket = %self.bucket, key = %req.key))]
    async fn put<'a>(&self, req: PutObject<'a>) -> Result<(), StoreError> {
        let key = object_key(req.key);
        let mut builder = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(req.body.to_vec()))
            .content_md5(req.fingerprint.as_str())
            .metadata(META_FINGERPRINT, req.fingerprint.as_str());

        let mut content_type = None;
        let mut extra: Vec<(String, String)> = Vec::new();
        for (name, value) in req.headers.iter() {
            match name.to_ascii_lowercase().as_str() {
                "cache-control" => builder = builder.cache_control(value),
                "content-type" => content_type = Some(value.to_string()),
                "content-disposition" => builder = builder.content_disposition(value),
                "content-encoding" => builder = builder.content_encoding(value),
                "content-language" => builder = builder.content_language(value),
                _ => extra.push((name.to_string(), value.to_string())),
            }
        }
        let content_type = content_type.unwrap_or_else(|| {
            mime_guess::from_path(key)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        builder = builder.content_type(content_type);

        let mut customized = builder.customize();
        if !extra.is_empty() {
            customized = customized.mutate_request(move |request| {
                for (name, value) in &extra {
                    if let Err(e) = request.headers_mut().try_insert(name.clone(), value.clone()) {
                        warn!(header = %name, error = %e, "Dropping header that is not valid HTTP");
                    }
                }
            });
        }

        customized
            .send()
            .await
            .map_err(|e| map_sdk_error(e, req.key))?;
        Ok(())
    }
}
