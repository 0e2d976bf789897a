//! MinIO probe over the S3 API: create the bucket when missing, write
//! `test.txt`, read it back.

mod bucket;

pub use bucket::BucketClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload, RetryConfig};
use serde_json::json;
use tracing::info;

use super::{Probe, ProbeDetail, ServiceKind};
use crate::config::MinioConfig;
use crate::errors::{Error, Result};

pub const OBJECT_KEY: &str = "test.txt";
pub const OBJECT_BODY: &[u8] = b"Hello MinIO!";

pub struct MinioProbe {
    config: MinioConfig,
    buckets: BucketClient,
    store: Option<Arc<dyn ObjectStore>>,
}

impl MinioProbe {
    pub fn new(config: MinioConfig) -> Result<Self> {
        let buckets = BucketClient::new(&config)?;
        Ok(Self { config, buckets, store: None })
    }

    /// Write objects to an already-built store; the bucket is still managed
    /// through the configured endpoint
    pub fn with_store(config: MinioConfig, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let buckets = BucketClient::new(&config)?;
        Ok(Self { config, buckets, store: Some(store) })
    }

    fn build_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let endpoint = self.config.endpoint_url();
        info!(endpoint = %endpoint, bucket = %self.config.bucket, "Using S3 endpoint");

        let store = AmazonS3Builder::new()
            .with_endpoint(&endpoint)
            .with_allow_http(!self.config.use_ssl)
            .with_virtual_hosted_style_request(false)
            .with_bucket_name(&self.config.bucket)
            .with_region(&self.config.region)
            .with_access_key_id(&self.config.access_key)
            .with_secret_access_key(&self.config.secret_key)
            .with_retry(RetryConfig {
                max_retries: 1,
                retry_timeout: Duration::from_secs(10),
                ..Default::default()
            })
            .build()
            .map_err(|e| Error::object_store(e, format!("Invalid S3 settings for {}", endpoint)))?;

        Ok(Arc::new(store))
    }
}

#[async_trait]
impl Probe for MinioProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Minio
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let store = match &self.store {
            Some(store) => Arc::clone(store),
            None => self.build_store()?,
        };
        let bucket = &self.config.bucket;

        let created = self.buckets.ensure().await?;

        let path = Path::from(OBJECT_KEY);
        store
            .put(&path, PutPayload::from_static(OBJECT_BODY))
            .await
            .map_err(|e| Error::object_store(e, format!("Failed to write {}", OBJECT_KEY)))?;
        info!(bucket = %bucket, key = OBJECT_KEY, "File created in MinIO");

        let body = store
            .get(&path)
            .await
            .map_err(|e| Error::object_store(e, format!("Failed to read {}", OBJECT_KEY)))?
            .bytes()
            .await
            .map_err(|e| Error::object_store(e, format!("Failed to read {}", OBJECT_KEY)))?;

        if body.as_ref() != OBJECT_BODY {
            return Err(Error::validation(format!(
                "{} read back {} bytes that differ from what was written",
                OBJECT_KEY,
                body.len()
            )));
        }

        Ok(ProbeDetail::new(format!("wrote and read {}/{}", bucket, OBJECT_KEY)).with_data(json!({
            "bucket": bucket,
            "key": OBJECT_KEY,
            "bucket_created": created,
            "content": String::from_utf8_lossy(&body),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use wiremock::matchers::{body_string_contains, header_exists, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> MinioConfig {
        let address = server.address();
        MinioConfig { endpoint: address.ip().to_string(), port: address.port(), ..Default::default() }
    }

    async fn bucket_exists(server: &MockServer) {
        Mock::given(method("HEAD"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let server = MockServer::start().await;
        bucket_exists(&server).await;
        Mock::given(method("PUT"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let minio = MinioProbe::with_store(config_for(&server), Arc::clone(&store)).unwrap();

        let detail = minio.run().await.unwrap();
        assert_eq!(detail.summary, "wrote and read test-bucket/test.txt");
        let data = detail.data.unwrap();
        assert_eq!(data["content"], "Hello MinIO!");
        assert_eq!(data["bucket_created"], false);

        let stored = store.get(&Path::from(OBJECT_KEY)).await.unwrap().bytes().await.unwrap();
        assert_eq!(stored.as_ref(), OBJECT_BODY);
    }

    #[tokio::test]
    async fn test_overwrites_existing_object() {
        let server = MockServer::start().await;
        bucket_exists(&server).await;

        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        store.put(&Path::from(OBJECT_KEY), PutPayload::from_static(b"stale")).await.unwrap();

        let minio = MinioProbe::with_store(config_for(&server), store).unwrap();
        assert!(minio.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_bucket_is_created_then_written() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/test-bucket"))
            .and(header_exists("x-amz-date"))
            .and(header_exists("x-amz-content-sha256"))
            .and(header_regex(
                "authorization",
                r"^AWS4-HMAC-SHA256 Credential=minioadmin/\d{8}/us-east-1/s3/aws4_request, ",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/test-bucket/test.txt"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"5d41402abc4b\""))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/test-bucket/test.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"5d41402abc4b\"")
                    .insert_header("Last-Modified", "Wed, 01 May 2024 12:30:00 GMT")
                    .set_body_bytes(OBJECT_BODY),
            )
            .expect(1)
            .mount(&server)
            .await;

        let minio = MinioProbe::new(config_for(&server)).unwrap();
        let detail = minio.run().await.unwrap();

        let data = detail.data.unwrap();
        assert_eq!(data["bucket_created"], true);
        assert_eq!(data["content"], "Hello MinIO!");

        let requests = server.received_requests().await.unwrap();
        let order: Vec<(String, String)> =
            requests.iter().map(|r| (r.method.to_string(), r.url.path().to_string())).collect();
        assert_eq!(
            order,
            vec![
                ("HEAD".to_string(), "/test-bucket".to_string()),
                ("PUT".to_string(), "/test-bucket".to_string()),
                ("PUT".to_string(), "/test-bucket/test.txt".to_string()),
                ("GET".to_string(), "/test-bucket/test.txt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_sends_region_constraint() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/test-bucket"))
            .and(body_string_contains("<LocationConstraint>eu-west-1</LocationConstraint>"))
            .and(header_regex("authorization", r"/eu-west-1/s3/aws4_request, "))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = MinioConfig { region: "eu-west-1".to_string(), ..config_for(&server) };
        let created = BucketClient::new(&config).unwrap().ensure().await.unwrap();
        assert!(created);
    }

    #[tokio::test]
    async fn test_bucket_already_owned_counts_as_ready() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(409).set_body_string(
                "<Error><Code>BucketAlreadyOwnedByYou</Code><Message>owned</Message></Error>",
            ))
            .mount(&server)
            .await;

        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let minio = MinioProbe::with_store(config_for(&server), store).unwrap();
        let detail = minio.run().await.unwrap();
        assert_eq!(detail.data.unwrap()["bucket_created"], false);
    }

    #[tokio::test]
    async fn test_bucket_owned_elsewhere_fails() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/test-bucket"))
            .respond_with(ResponseTemplate::new(409).set_body_string(
                "<Error><Code>BucketAlreadyExists</Code><Message>taken</Message></Error>",
            ))
            .mount(&server)
            .await;

        let err = BucketClient::new(&config_for(&server)).unwrap().ensure().await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 409, .. }));
        assert!(err.to_string().contains("BucketAlreadyExists"));
    }

    #[test]
    fn test_build_store_accepts_local_endpoint() {
        let minio = MinioProbe::new(MinioConfig::default()).unwrap();
        assert!(minio.build_store().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_bucket() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let minio = MinioProbe::new(MinioConfig {
            endpoint: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        })
        .unwrap();

        let err = minio.run().await.unwrap_err();
        assert!(matches!(err, Error::Request { .. }));
        assert!(err.to_string().contains("test-bucket"));
        assert!(err.hint().is_some());
    }
}
