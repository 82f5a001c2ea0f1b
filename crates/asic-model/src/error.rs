use thiserror::Error;

/// Lookup of a register name that the register map does not define.
///
/// This is a caller programming error rather than a runtime transaction
/// fault, so it is reported directly instead of being absorbed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("unknown register name `{name}`")]
pub struct UnknownRegisterError {
    /// Name that failed to resolve.
    pub name: String,
}

/// Faults raised while applying a single register transaction.
///
/// A transaction that fails leaves the model untouched; see
/// [`RegisterModel::try_process`](crate::RegisterModel::try_process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TransactionError {
    /// Transaction carried no control byte.
    #[error("transaction is empty")]
    Empty,
    /// Paged address resolution landed outside the register array.
    #[error("register address {requested} resolves to {true_address}, outside the register space")]
    AddressOutOfRange {
        /// Page-relative address derived from the control byte and offset.
        requested: u8,
        /// Resolved address after page selection.
        true_address: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::{TransactionError, UnknownRegisterError};

    #[test]
    fn unknown_register_message_names_the_register() {
        let err = UnknownRegisterError {
            name: "NOT_A_REG".to_string(),
        };
        assert_eq!(err.to_string(), "unknown register name `NOT_A_REG`");
    }

    #[test]
    fn out_of_range_message_reports_both_addresses() {
        let err = TransactionError::AddressOutOfRange {
            requested: 20,
            true_address: 148,
        };
        let text = err.to_string();
        assert!(text.contains("20"));
        assert!(text.contains("148"));
    }
}
