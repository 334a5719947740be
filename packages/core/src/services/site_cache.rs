//! ShopperTrak site list.
//!
//! The list of known site ids is maintained by the visits poller and
//! cached in S3 as a JSON array of strings.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteCacheError {
    #[error("Failed to fetch s3://{bucket}/{key}: {detail}")]
    Fetch {
        bucket: String,
        key: String,
        detail: String,
    },

    #[error("Site cache is not a JSON array of strings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait SiteListSource: Send + Sync {
    async fn fetch_cache(&self) -> Result<Vec<String>, SiteCacheError>;
}

/// Reads the cached site list from an S3 object.
#[derive(Debug, Clone)]
pub struct S3SiteCache {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
}

impl S3SiteCache {
    pub async fn from_env(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    fn fetch_error(&self, detail: impl ToString) -> SiteCacheError {
        SiteCacheError::Fetch {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            detail: detail.to_string(),
        }
    }
}

#[async_trait]
impl SiteListSource for S3SiteCache {
    async fn fetch_cache(&self) -> Result<Vec<String>, SiteCacheError> {
        tracing::debug!(bucket = %self.bucket, key = %self.key, "Fetching ShopperTrak site cache");

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| self.fetch_error(e))?;

        let body = object.body.collect().await.map_err(|e| self.fetch_error(e))?;
        parse_site_list(&body.into_bytes())
    }
}

pub fn parse_site_list(bytes: &[u8]) -> Result<Vec<String>, SiteCacheError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Fixed site list, for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct StaticSiteCache {
    sites: Vec<String>,
}

impl StaticSiteCache {
    pub fn new<S: Into<String>>(sites: impl IntoIterator<Item = S>) -> Self {
        Self {
            sites: sites.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl SiteListSource for StaticSiteCache {
    async fn fetch_cache(&self) -> Result<Vec<String>, SiteCacheError> {
        Ok(self.sites.clone())
    }
}
