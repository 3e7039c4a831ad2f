//! Fetch-stage tests against a MinIO container
//!
//! **Requirements**: Docker daemon running.
//!
//! ```bash
//! cargo test -p catalog-ingest --test storage_integration_test -- --ignored
//! ```

mod common;

use catalog_common::{CatalogError, Stage};
use catalog_ingest::{
    models::parse_csv,
    pipeline::Pipeline,
    source::{CsvSource, S3Source},
    storage::{config::StorageConfig, Storage},
};
use common::{fixture_path, TestMinio, TestPostgres};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_download_existing_object() {
    let minio = TestMinio::start().await.expect("Failed to start MinIO");
    let data = std::fs::read(fixture_path("titles_sample.csv")).unwrap();
    minio
        .upload("exports/netflix_titles.csv", data.clone())
        .await
        .unwrap();

    let source = S3Source::new(minio.storage_config(), "exports/netflix_titles.csv");
    let fetched = source.fetch().await.expect("Fetch failed");
    assert_eq!(fetched, data);

    let dataset = parse_csv(&fetched).unwrap();
    assert_eq!(dataset.len(), 5);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_object_is_not_found() {
    let minio = TestMinio::start().await.expect("Failed to start MinIO");
    let storage = Storage::new(minio.storage_config());

    let err = storage.download("nope.csv").await.unwrap_err();
    assert!(
        matches!(err, CatalogError::ObjectNotFound { ref key, .. } if key == "nope.csv"),
        "unexpected error: {:?}",
        err
    );
    assert_eq!(
        err.to_string(),
        format!("File nope.csv not found in bucket {}", minio.bucket())
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_bucket_is_not_found() {
    let minio = TestMinio::start().await.expect("Failed to start MinIO");
    let storage = Storage::new(StorageConfig::for_minio(minio.endpoint(), "no-such-bucket"));

    let err = storage.download("titles.csv").await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {:?}", err);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_wrong_credentials_are_access_denied() {
    let minio = TestMinio::start().await.expect("Failed to start MinIO");
    let mut config = minio.storage_config();
    config.secret_key = "not-the-secret".to_string();

    let err = Storage::new(config).download("titles.csv").await.unwrap_err();
    assert!(
        matches!(err, CatalogError::AccessDenied(_)),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unreachable_endpoint_is_connection_error() {
    let storage = Storage::new(StorageConfig::for_minio("http://127.0.0.1:1", "catalog"));
    let err = storage.download("titles.csv").await.unwrap_err();
    assert!(matches!(err, CatalogError::StorageConnection(_)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pipeline_from_s3() {
    let minio = TestMinio::start().await.expect("Failed to start MinIO");
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    minio
        .upload(
            "netflix_titles.csv",
            std::fs::read(fixture_path("titles_sample.csv")).unwrap(),
        )
        .await
        .unwrap();

    let source = S3Source::new(minio.storage_config(), "netflix_titles.csv");
    let summary = Pipeline::new(Box::new(source), pg.db_config())
        .run()
        .await
        .expect("Pipeline failed");
    assert_eq!(summary.titles, 5);
    assert_eq!(pg.count("directors").await.unwrap(), 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pipeline_stops_when_object_missing() {
    let minio = TestMinio::start().await.expect("Failed to start MinIO");
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");

    let source = S3Source::new(minio.storage_config(), "netflix_titles.csv");
    let err = Pipeline::new(Box::new(source), pg.db_config())
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Fetch);
    assert!(!pg.table_exists("netflix_titles").await.unwrap());
}
