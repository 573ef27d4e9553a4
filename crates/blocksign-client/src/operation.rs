//! Known remote operations
//!
//! Every method name the client will send is listed in [`OPERATIONS`].
//! Anything else is rejected up front instead of being forwarded blindly.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How the client treats an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Plain request/response
    Query,
    /// Spends wallet funds; may come back asking for PIN-derived signatures
    Withdrawal,
    /// Spends from an external WIF key supplied by the caller
    Sweep,
    /// Submits `signature_data` after local signing
    Finalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetBalance,
    GetNewAddress,
    GetMyAddresses,
    GetMyArchivedAddresses,
    GetAddressBalance,
    GetAddressByLabel,
    GetUserBalance,
    GetUserAddress,
    GetNetworkFeeEstimate,
    GetTransactions,
    GetRawTransaction,
    GetCurrentPrice,
    IsGreenAddress,
    IsValidAddress,
    ArchiveAddresses,
    UnarchiveAddresses,
    CreateNotification,
    DeleteNotification,
    Withdraw,
    WithdrawFromAddress,
    WithdrawFromAddresses,
    WithdrawFromUser,
    WithdrawFromUsers,
    WithdrawFromLabel,
    WithdrawFromLabels,
    SweepFromAddress,
    SignAndFinalizeWithdrawal,
    SignAndFinalizeSweep,
}

/// Method name ↔ operation table.
pub const OPERATIONS: &[(&str, Operation)] = &[
    ("get_balance", Operation::GetBalance),
    ("get_new_address", Operation::GetNewAddress),
    ("get_my_addresses", Operation::GetMyAddresses),
    ("get_my_archived_addresses", Operation::GetMyArchivedAddresses),
    ("get_address_balance", Operation::GetAddressBalance),
    ("get_address_by_label", Operation::GetAddressByLabel),
    ("get_user_balance", Operation::GetUserBalance),
    ("get_user_address", Operation::GetUserAddress),
    ("get_network_fee_estimate", Operation::GetNetworkFeeEstimate),
    ("get_transactions", Operation::GetTransactions),
    ("get_raw_transaction", Operation::GetRawTransaction),
    ("get_current_price", Operation::GetCurrentPrice),
    ("is_green_address", Operation::IsGreenAddress),
    ("is_valid_address", Operation::IsValidAddress),
    ("archive_addresses", Operation::ArchiveAddresses),
    ("unarchive_addresses", Operation::UnarchiveAddresses),
    ("create_notification", Operation::CreateNotification),
    ("delete_notification", Operation::DeleteNotification),
    ("withdraw", Operation::Withdraw),
    ("withdraw_from_address", Operation::WithdrawFromAddress),
    ("withdraw_from_addresses", Operation::WithdrawFromAddresses),
    ("withdraw_from_user", Operation::WithdrawFromUser),
    ("withdraw_from_users", Operation::WithdrawFromUsers),
    ("withdraw_from_label", Operation::WithdrawFromLabel),
    ("withdraw_from_labels", Operation::WithdrawFromLabels),
    ("sweep_from_address", Operation::SweepFromAddress),
    ("sign_and_finalize_withdrawal", Operation::SignAndFinalizeWithdrawal),
    ("sign_and_finalize_sweep", Operation::SignAndFinalizeSweep),
];

/// Error for a method name missing from [`OPERATIONS`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl Operation {
    /// Remote method name used in the endpoint URL.
    pub fn method_name(self) -> &'static str {
        OPERATIONS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    pub fn kind(self) -> OperationKind {
        use Operation::*;
        match self {
            Withdraw | WithdrawFromAddress | WithdrawFromAddresses | WithdrawFromUser
            | WithdrawFromUsers | WithdrawFromLabel | WithdrawFromLabels => {
                OperationKind::Withdrawal
            }
            SweepFromAddress => OperationKind::Sweep,
            SignAndFinalizeWithdrawal | SignAndFinalizeSweep => OperationKind::Finalize,
            _ => OperationKind::Query,
        }
    }

    /// Endpoint that accepts the signed request for this operation.
    pub fn finalize_operation(self) -> Option<Operation> {
        match self.kind() {
            OperationKind::Withdrawal => Some(Operation::SignAndFinalizeWithdrawal),
            OperationKind::Sweep => Some(Operation::SignAndFinalizeSweep),
            OperationKind::Query | OperationKind::Finalize => None,
        }
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        OPERATIONS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, op)| *op)
            .ok_or_else(|| UnknownOperation(name.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_roundtrip() {
        for (name, op) in OPERATIONS {
            assert_eq!(op.method_name(), *name);
            assert_eq!(name.parse::<Operation>().unwrap(), *op);
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert_eq!(
            "drop_database".parse::<Operation>(),
            Err(UnknownOperation("drop_database".into()))
        );
        assert!("Withdraw".parse::<Operation>().is_err());
    }

    #[test]
    fn test_withdraw_family() {
        for name in [
            "withdraw",
            "withdraw_from_address",
            "withdraw_from_addresses",
            "withdraw_from_user",
            "withdraw_from_users",
            "withdraw_from_label",
            "withdraw_from_labels",
        ] {
            let op: Operation = name.parse().unwrap();
            assert_eq!(op.kind(), OperationKind::Withdrawal);
            assert_eq!(
                op.finalize_operation(),
                Some(Operation::SignAndFinalizeWithdrawal)
            );
        }
    }

    #[test]
    fn test_sweep_and_finalize() {
        assert_eq!(Operation::SweepFromAddress.kind(), OperationKind::Sweep);
        assert_eq!(
            Operation::SweepFromAddress.finalize_operation(),
            Some(Operation::SignAndFinalizeSweep)
        );
        assert_eq!(Operation::SignAndFinalizeSweep.kind(), OperationKind::Finalize);
        assert_eq!(Operation::GetBalance.finalize_operation(), None);
        assert_eq!(Operation::GetBalance.to_string(), "get_balance");
    }
}
