//! Error taxonomy for the configuration engine.

/// Boxed failure coming back from a collaborator (credential loader, signer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigTxError {
    /// A tree or profile is missing something it must carry.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A policy expression or rule string could not be compiled.
    #[error("Parse error: {0}")]
    Parse(String),

    /// `compute` was asked to diff two identical trees.
    #[error("no differences detected between original and updated config")]
    NoDifferences,

    /// The credential loader or signer failed.
    #[error("{context}: {source}")]
    Collaborator {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl ConfigTxError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ConfigTxError::Validation(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        ConfigTxError::Parse(msg.into())
    }

    pub fn collaborator(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ConfigTxError::Collaborator {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Prefix the message with where it happened, keeping the variant.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            ConfigTxError::Validation(msg) => ConfigTxError::Validation(format!("{ctx}: {msg}")),
            ConfigTxError::Parse(msg) => ConfigTxError::Parse(format!("{ctx}: {msg}")),
            ConfigTxError::Collaborator { context, source } => ConfigTxError::Collaborator {
                context: format!("{ctx}: {context}"),
                source,
            },
            other => other,
        }
    }
}

pub type Result<T, E = ConfigTxError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_variant() {
        let err = ConfigTxError::validation("no Admins policy defined").context("orderer group");
        assert!(matches!(err, ConfigTxError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: orderer group: no Admins policy defined");
    }

    #[test]
    fn collaborator_chains_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "cacerts missing");
        let err = ConfigTxError::collaborator("loading MSP for Org1MSP", io);
        assert_eq!(err.to_string(), "loading MSP for Org1MSP: cacerts missing");
        assert!(std::error::Error::source(&err).is_some());
    }
}
