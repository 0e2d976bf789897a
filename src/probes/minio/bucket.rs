//! Bucket check and creation over the S3 REST API.
//!
//! object_store only reads and writes objects, so the `HEAD /<bucket>` and
//! `PUT /<bucket>` calls are signed here with AWS Signature Version 4.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::MinioConfig;
use crate::errors::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";
const SERVICE: &str = "s3";
/// Region S3 treats as the default; CreateBucket takes no body there
const DEFAULT_REGION: &str = "us-east-1";

/// Headers that authenticate one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedHeaders {
    pub amz_date: String,
    pub payload_hash: String,
    pub authorization: String,
}

/// SigV4 request signer for a single set of credentials
pub(crate) struct Signer<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
}

impl Signer<'_> {
    /// Sign a request with no query string
    pub(crate) fn sign(
        &self,
        method: &Method,
        host: &str,
        path: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex_sha256(payload);

        let canonical_request = format!(
            "{}\n{}\n\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
            method.as_str(),
            path,
            host,
            payload_hash,
            amz_date,
            SIGNED_HEADERS,
            payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let key = signing_key(self.secret_key, &date, self.region, SERVICE)?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.access_key, scope, SIGNED_HEADERS, signature
            ),
            amz_date,
            payload_hash,
        })
    }
}

fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| Error::internal(format!("Failed to initialise HMAC: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// CreateBucket body; empty for the default region
fn create_bucket_body(region: &str) -> Vec<u8> {
    if region.is_empty() || region == DEFAULT_REGION {
        return Vec::new();
    }
    format!(
        "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
        region
    )
    .into_bytes()
}

/// Pull `<Code>` out of an S3 XML error body
fn s3_error_code(body: &str) -> Option<&str> {
    let start = body.find("<Code>")? + "<Code>".len();
    let end = body[start..].find("</Code>")? + start;
    Some(&body[start..end])
}

/// Checks for the configured bucket and creates it when missing
pub struct BucketClient {
    http: reqwest::Client,
    endpoint: String,
    bucket: String,
    region: String,
    access_key: String,
    secret_key: String,
}

impl BucketClient {
    pub fn new(config: &MinioConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::request(e, "Failed to build HTTP client"))?;

        Ok(Self {
            http,
            endpoint: config.endpoint_url(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Make sure the bucket exists; `true` when this call created it
    pub async fn ensure(&self) -> Result<bool> {
        if self.exists().await? {
            debug!(bucket = %self.bucket, "Bucket already exists");
            return Ok(false);
        }
        self.create().await
    }

    async fn exists(&self) -> Result<bool> {
        let response = self.send(Method::HEAD, Vec::new()).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::http(
                format!("Checking bucket '{}' returned {}", self.bucket, status),
                status.as_u16(),
            )),
        }
    }

    async fn create(&self) -> Result<bool> {
        let response = self.send(Method::PUT, create_bucket_body(&self.region)).await?;
        let status = response.status();
        if status.is_success() {
            info!(bucket = %self.bucket, region = %self.region, "Bucket created");
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        let code = s3_error_code(&body);
        if status == StatusCode::CONFLICT && code == Some("BucketAlreadyOwnedByYou") {
            debug!(bucket = %self.bucket, "Bucket was created concurrently");
            return Ok(false);
        }

        Err(Error::http(
            format!(
                "Creating bucket '{}' returned {} ({})",
                self.bucket,
                status,
                code.unwrap_or("no error code")
            ),
            status.as_u16(),
        ))
    }

    async fn send(&self, method: Method, body: Vec<u8>) -> Result<reqwest::Response> {
        let raw = format!("{}/{}", self.endpoint, self.bucket);
        let url = url::Url::parse(&raw).map_err(|e| {
            Error::config_var(format!("Invalid MinIO endpoint '{}': {}", raw, e), "MINIO_ENDPOINT")
        })?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::config_var(
                    format!("MinIO endpoint '{}' has no host", raw),
                    "MINIO_ENDPOINT",
                ))
            }
        };

        let signer = Signer {
            access_key: &self.access_key,
            secret_key: &self.secret_key,
            region: &self.region,
        };
        let signed = signer.sign(&method, &host, url.path(), &body, Utc::now())?;

        self.http
            .request(method, url)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.payload_hash)
            .header(AUTHORIZATION, signed.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                Error::request(
                    e,
                    format!("Failed to reach bucket '{}' at {}", self.bucket, self.endpoint),
                )
            })
    }
}
