use crate::model::GenericError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Transaction or one of its context records is unusable; retried on a later batch.
    #[error("transaction {transaction_id} failed validation: {reason}")]
    Validation {
        transaction_id: String,
        reason: String,
    },

    #[error("model estimator failed for transaction {transaction_id}: {source}")]
    Estimator {
        transaction_id: String,
        #[source]
        source: GenericError,
    },

    #[error("transaction source unavailable: {0}")]
    Source(#[source] GenericError),

    #[error("assessment store unavailable: {0}")]
    Store(#[source] GenericError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("pipeline is already running")]
    AlreadyRunning,
}

impl ProcessingError {
    /// Fatal errors stop the pipeline; everything else only skips one transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessingError::Source(_) | ProcessingError::Store(_))
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            ProcessingError::Validation { transaction_id, .. }
            | ProcessingError::Estimator { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_collaborator_outages_are_fatal() {
        let validation = ProcessingError::Validation {
            transaction_id: "TXN-1".to_string(),
            reason: "amount is invalid".to_string(),
        };
        assert!(!validation.is_fatal());
        assert_eq!(validation.transaction_id(), Some("TXN-1"));

        assert!(ProcessingError::Source("connection refused".into()).is_fatal());
        assert!(ProcessingError::Store("connection reset".into()).is_fatal());
        assert!(!ProcessingError::Config("bad weights".to_string()).is_fatal());
    }

    #[test]
    fn messages_name_the_transaction() {
        let err = ProcessingError::Estimator {
            transaction_id: "TXN-7".to_string(),
            source: "probability NaN".into(),
        };
        assert_eq!(
            err.to_string(),
            "model estimator failed for transaction TXN-7: probability NaN"
        );
    }
}
