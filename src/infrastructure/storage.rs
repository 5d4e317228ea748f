use crate::config::{StorageBackend, StorageConfig};
use crate::services::storage::{InMemoryStorageService, S3StorageService, StorageService};
use anyhow::Context;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    match config.backend {
        StorageBackend::Memory => {
            warn!("🧪 In-memory storage selected, files are lost on restart");
            Ok(Arc::new(InMemoryStorageService::new()))
        }
        StorageBackend::S3 => Ok(Arc::new(setup_s3(config).await?)),
    }
}

async fn setup_s3(config: &StorageConfig) -> anyhow::Result<S3StorageService> {
    info!(
        "☁️  S3 Storage: {} (Container: {})",
        config.endpoint.as_deref().unwrap_or("<default endpoint>"),
        config.container
    );

    let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    // Without static keys the default provider chain applies (env, profile, IMDS, web identity)
    match config.static_credentials() {
        Some((access_key, secret_key)) => {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }
        None => info!("🔑 Using the default credential provider chain"),
    }

    if let Some(timeout) = config.timeout() {
        loader = loader.timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
    }

    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.force_path_style)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    if config.create_container {
        ensure_container(&s3_client, config).await?;
    }

    Ok(S3StorageService::new(s3_client, config.container.clone()))
}

async fn ensure_container(client: &aws_sdk_s3::Client, config: &StorageConfig) -> anyhow::Result<()> {
    let bucket = &config.container;

    if client.head_bucket().bucket(bucket).send().await.is_ok() {
        info!("✅ Container '{}' is ready", bucket);
        return Ok(());
    }

    info!("🪣 Container '{}' not found, creating...", bucket);
    let mut request = client.create_bucket().bucket(bucket);
    if config.region != "us-east-1" {
        request = request.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(config.region.as_str()))
                .build(),
        );
    }

    request
        .send()
        .await
        .with_context(|| format!("Failed to create container '{}'", bucket))?;

    info!("✅ Container '{}' created successfully", bucket);
    Ok(())
}
