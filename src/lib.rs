pub mod api;
pub mod config;
pub mod pipeline;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServiceConfig};
use crate::pipeline::{
    FormatGatekeeper, ModelError, Pipeline, SpreadsheetFeatureExtractor, SpreadsheetRecordReader,
    TrainedModel, UploadStorage,
};

/// Failures that prevent the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load model from {path}: {source}")]
    Model {
        path: String,
        #[source]
        source: ModelError,
    },

    #[error("Failed to prepare upload directory {path}: {source}")]
    UploadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Wire the pipeline from configuration: load the model once and share it.
pub fn build_pipeline(config: &ServiceConfig) -> Result<Pipeline, StartupError> {
    let model = TrainedModel::load(&config.model_path).map_err(|source| StartupError::Model {
        path: config.model_path.display().to_string(),
        source,
    })?;

    tracing::info!(
        path = %config.model_path.display(),
        features = model.feature_names.len(),
        "Model loaded"
    );

    let storage = UploadStorage::new(&config.upload_dir);
    std::fs::create_dir_all(storage.dir()).map_err(|source| StartupError::UploadDir {
        path: config.upload_dir.display().to_string(),
        source,
    })?;

    Ok(Pipeline::new(
        FormatGatekeeper::new(config.allowed_extensions.clone()),
        storage,
        Arc::new(SpreadsheetFeatureExtractor::new(model.feature_names.clone())),
        Arc::new(SpreadsheetRecordReader::default()),
        Arc::new(model),
    ))
}

/// Service entry point: tracing → config → model → orphan sweep → serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_TITLE, config::APP_VERSION);

    let config = ServiceConfig::from_env()?;
    let pipeline = build_pipeline(&config)?;

    // Files from a previous process that died mid-request
    pipeline.storage().cleanup_orphans();

    let addr = config.bind_addr();
    let mut server = api::start_server(&addr, pipeline, config.max_upload_bytes)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.wait().await;

    tracing::info!("{} stopped", config::APP_TITLE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{sample_model, students_bytes};
    use crate::pipeline::UploadRequest;

    #[test]
    fn build_pipeline_loads_model_and_creates_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        sample_model().save(&model_path).unwrap();

        let config = ServiceConfig {
            upload_dir: dir.path().join("data"),
            model_path,
            ..ServiceConfig::default()
        };
        let pipeline = build_pipeline(&config).unwrap();
        assert!(config.upload_dir.is_dir());

        let results = pipeline
            .run(UploadRequest {
                filename: "students.xlsx".into(),
                bytes: students_bytes(&[(101, 2023, 1, 6.0, 3.0)]),
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].predicted_count, 2.0);
    }

    #[test]
    fn missing_model_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            upload_dir: dir.path().join("data"),
            model_path: dir.path().join("absent.json"),
            ..ServiceConfig::default()
        };

        let Err(err) = build_pipeline(&config) else {
            panic!("startup should fail without a model artifact");
        };
        assert!(matches!(err, StartupError::Model { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn configured_extensions_reach_the_gatekeeper() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        sample_model().save(&model_path).unwrap();

        let config = ServiceConfig {
            upload_dir: dir.path().join("data"),
            model_path,
            allowed_extensions: ["xlsm".to_string()].into_iter().collect(),
            ..ServiceConfig::default()
        };
        let pipeline = build_pipeline(&config).unwrap();
        assert!(pipeline.gatekeeper().is_allowed("grades.xlsm"));
        assert!(!pipeline.gatekeeper().is_allowed("grades.xlsx"));
    }
}
