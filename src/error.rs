//! Error types for the nimbus-k8s operator

use thiserror::Error;

use crate::instance_state::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// The CloudCluster carries an owner reference to a ComputeCluster that
    /// cannot be resolved
    #[error("owner ComputeCluster {name} not found: {source}")]
    OwnerNotFound {
        name: String,
        #[source]
        source: kube::Error,
    },

    /// A sub-reconciler step failed; the underlying error is opaque
    #[error(transparent)]
    Service(#[from] anyhow::Error),

    /// Remote rule or queue store error
    #[error("remote store error: {0}")]
    Store(#[from] StoreError),

    /// The delivery queue exists but exposes no ARN attribute
    #[error("queue {name} is missing its ARN attribute")]
    QueueMisconfigured { name: String },

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Errors worth retrying on a short interval.
    ///
    /// Every propagated error is retried eventually; this only tunes how
    /// soon the scheduler requeues.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::KubeError(_)
                | Error::OwnerNotFound { .. }
                | Error::Service(_)
                | Error::Store(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
