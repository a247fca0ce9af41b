use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::LocalWallet;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Signing client used for every write against the pool.
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sizing error: {0}")]
    Sizing(#[from] SizingError),

    /// A sizing error recurred on consecutive cycles; the formula itself is suspect.
    #[error("Fatal sizing error after {cycles} consecutive cycles: {source}")]
    FatalSizing {
        cycles: u32,
        #[source]
        source: SizingError,
    },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Quote mismatch for {token}: oracle {local}, router {remote}")]
    QuoteMismatch {
        token: String,
        local: String,
        remote: String,
    },

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Decimal parse error: {0}")]
    ParseDecimal(#[from] bigdecimal::ParseBigDecimalError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] ethers::signers::WalletError),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Contract error: {0}")]
    Contract(#[from] ethers::contract::ContractError<SignerClient>),

    #[error("Event stream error: {0}")]
    EventStream(String),

    #[error("Other: {0}")]
    Other(String),
}

impl AppError {
    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration",
            AppError::Sizing(_) => "sizing",
            AppError::FatalSizing { .. } => "fatal_sizing",
            AppError::Execution(_) => "execution",
            AppError::QuoteMismatch { .. } => "quote_mismatch",
            AppError::Env(_) | AppError::ParseDecimal(_) | AppError::UrlParse(_) => {
                "configuration"
            }
            AppError::Wallet(_) => "wallet",
            AppError::Provider(_) | AppError::Contract(_) => "provider",
            AppError::EventStream(_) => "event_stream",
            AppError::Other(_) => "other",
        }
    }

    /// Fatal errors stop the agent instead of being absorbed by the queue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::Env(_)
                | AppError::ParseDecimal(_)
                | AppError::UrlParse(_)
                | AppError::FatalSizing { .. }
        )
    }
}

/// Failures of the trade sizing formulas. Any of these aborts the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingError {
    #[error("reserve of the sold token is zero")]
    EmptyReserve,

    #[error("impact bound {0}% is outside (0, 100)")]
    InvalidImpact(String),

    #[error("fee {numerator}/{denominator} is not a valid multiplier")]
    InvalidFee { numerator: u64, denominator: u64 },

    #[error("arithmetic overflow while sizing")]
    Overflow,

    #[error("formula produced an undefined result: {0}")]
    Undefined(String),

    #[error("sized amount {amount} fails the {policy} check")]
    Contradiction { policy: &'static str, amount: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_and_repeated_sizing_are_fatal() {
        assert!(AppError::Config("bad".into()).is_fatal());
        assert!(
            AppError::FatalSizing {
                cycles: 2,
                source: SizingError::EmptyReserve
            }
            .is_fatal()
        );
        assert!(!AppError::Sizing(SizingError::Overflow).is_fatal());
        assert!(!AppError::Execution("reverted".into()).is_fatal());
    }

    #[test]
    fn every_configuration_source_is_fatal() {
        assert!(AppError::Env(std::env::VarError::NotPresent).is_fatal());
        assert!(AppError::UrlParse(url::ParseError::EmptyHost).is_fatal());
        assert!(
            !AppError::QuoteMismatch {
                token: "A".into(),
                local: "1".into(),
                remote: "2".into(),
            }
            .is_fatal()
        );
        assert!(!AppError::EventStream("closed".into()).is_fatal());
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(AppError::Sizing(SizingError::Overflow).kind(), "sizing");
        assert_eq!(AppError::Execution("x".into()).kind(), "execution");
        assert_eq!(AppError::Config("x".into()).kind(), "configuration");
    }
}
