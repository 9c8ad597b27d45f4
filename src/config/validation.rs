use super::models::{Config, EngineBackend};
use std::path::{Component, Path};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("engine.binary must not be empty for the process backend")]
    EmptyBinary,

    #[error("engine.output_template must not be empty")]
    EmptyOutputTemplate,

    #[error("engine.output_template must be relative to the job directory: {template}")]
    AbsoluteOutputTemplate { template: String },

    #[error("engine.output_template must not contain '..': {template}")]
    OutputTemplateTraversal { template: String },

    #[error("worker.max_concurrent_jobs must be positive")]
    ZeroConcurrency,

    #[error("server.max_form_bytes must be positive")]
    ZeroFormLimit,

    #[error("downloads.root must not be empty")]
    EmptyDownloadsRoot,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_engine(config)?;
    validate_worker(config)?;
    validate_server(config)?;
    validate_downloads(config)?;
    Ok(())
}

fn validate_engine(config: &Config) -> Result<(), ValidationError> {
    let engine = &config.engine;
    if engine.backend == EngineBackend::Process && engine.binary.as_os_str().is_empty() {
        return Err(ValidationError::EmptyBinary);
    }

    let template = engine.output_template.trim();
    if template.is_empty() {
        return Err(ValidationError::EmptyOutputTemplate);
    }

    let path = Path::new(template);
    if path.has_root() {
        return Err(ValidationError::AbsoluteOutputTemplate {
            template: template.to_string(),
        });
    }
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(ValidationError::OutputTemplateTraversal {
                    template: template.to_string(),
                });
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(ValidationError::AbsoluteOutputTemplate {
                    template: template.to_string(),
                });
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.max_concurrent_jobs == Some(0) {
        return Err(ValidationError::ZeroConcurrency);
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_form_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroFormLimit);
    }
    Ok(())
}

fn validate_downloads(config: &Config) -> Result<(), ValidationError> {
    if config.downloads.root.as_os_str().is_empty() {
        return Err(ValidationError::EmptyDownloadsRoot);
    }
    Ok(())
}
