use aws_sdk_s3::{
    config::{Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::get_object::GetObjectError,
    Client,
};
use catalog_common::CatalogError;
use tracing::{debug, info, instrument};

pub mod config;

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

/// How a failed S3 request maps onto the fetch error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    ObjectNotFound,
    BucketNotFound,
    AccessDenied,
    Connection,
}

impl FetchFailure {
    /// Classify from the S3 error code and HTTP status of a service error
    pub fn from_service(code: Option<&str>, status: u16) -> Self {
        match (code, status) {
            (Some("NoSuchKey"), _) => FetchFailure::ObjectNotFound,
            (Some("NoSuchBucket"), _) => FetchFailure::BucketNotFound,
            (Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch"), _) => {
                FetchFailure::AccessDenied
            },
            (_, 404) => FetchFailure::BucketNotFound,
            (_, 401 | 403) => FetchFailure::AccessDenied,
            _ => FetchFailure::Connection,
        }
    }

    pub fn into_error(self, bucket: &str, key: &str, detail: String) -> CatalogError {
        match self {
            FetchFailure::ObjectNotFound => CatalogError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            FetchFailure::BucketNotFound => CatalogError::BucketNotFound(bucket.to_string()),
            FetchFailure::AccessDenied => CatalogError::AccessDenied(bucket.to_string()),
            FetchFailure::Connection => CatalogError::StorageConnection(detail),
        }
    }
}

fn classify(err: &SdkError<GetObjectError>) -> FetchFailure {
    match err {
        SdkError::ServiceError(service) => {
            if matches!(service.err(), GetObjectError::NoSuchKey(_)) {
                return FetchFailure::ObjectNotFound;
            }
            FetchFailure::from_service(service.err().code(), service.raw().status().as_u16())
        },
        _ => FetchFailure::Connection,
    }
}

impl Storage {
    pub fn new(config: config::StorageConfig) -> Self {
        debug!("Initializing storage with config: {:?}", config);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "catalog-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Storage client initialized for bucket: {}", config.bucket);

        Self {
            client,
            bucket: config.bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Download one object into memory
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn download(&self, key: &str) -> Result<Vec<u8>, CatalogError> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let failure = classify(&e);
                failure.into_error(&self.bucket, key, DisplayErrorContext(&e).to_string())
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| CatalogError::StorageConnection(format!("Failed to read S3 response body: {}", e)))?
            .into_bytes()
            .to_vec();

        info!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }
}
