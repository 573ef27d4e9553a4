//! Response envelope handling

use crate::operation::{Operation, OperationKind};
use crate::ClientError;
use blocksign_core::SigningRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status value of a successful call
pub const STATUS_SUCCESS: &str = "success";

/// A successful `{status, data}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub data: Value,
}

impl ApiResponse {
    /// Parse a response body returned for `operation`.
    ///
    /// Anything but `"status": "success"` becomes an error carrying the
    /// server's `error_message`. Bodies that do not fit the envelope at all
    /// are [`ClientError::UnknownRemoteError`].
    pub fn parse(operation: Operation, body: &str) -> Result<Self, ClientError> {
        let envelope: Value =
            serde_json::from_str(body).map_err(|_| ClientError::UnknownRemoteError)?;
        let status = envelope
            .get("status")
            .and_then(Value::as_str)
            .ok_or(ClientError::UnknownRemoteError)?;
        let data = envelope
            .get("data")
            .filter(|data| data.is_object())
            .ok_or(ClientError::UnknownRemoteError)?;

        if status != STATUS_SUCCESS {
            let message = data
                .get("error_message")
                .and_then(Value::as_str)
                .ok_or(ClientError::UnknownRemoteError)?
                .to_string();
            log::warn!("{} failed remotely: {}", operation, message);
            return Err(match operation.kind() {
                OperationKind::Withdrawal => ClientError::Withdraw(message),
                _ => ClientError::Remote(message),
            });
        }

        Ok(Self {
            status: status.to_string(),
            data: data.clone(),
        })
    }

    /// True when the server wants client-side signatures before it will
    /// broadcast.
    pub fn needs_signatures(&self) -> bool {
        self.data
            .get("reference_id")
            .map_or(false, |reference| !reference.is_null())
    }

    pub fn signing_request(&self) -> Result<SigningRequest, ClientError> {
        Ok(SigningRequest::from_value(self.data.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let body = r#"{"status":"success","data":{"network":"BTCTEST","available_balance":"1.5"}}"#;
        let response = ApiResponse::parse(Operation::GetBalance, body).unwrap();
        assert_eq!(response.data["network"], "BTCTEST");
        assert!(!response.needs_signatures());
    }

    #[test]
    fn test_fail_status_carries_message() {
        let body = r#"{"status":"fail","data":{"error_message":"Invalid API Key."}}"#;
        match ApiResponse::parse(Operation::GetBalance, body) {
            Err(ClientError::Remote(message)) => assert_eq!(message, "Invalid API Key."),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_withdraw_failure_uses_withdraw_variant() {
        let body = r#"{"status":"fail","data":{"error_message":"Insufficient funds."}}"#;
        for op in [Operation::Withdraw, Operation::WithdrawFromLabels] {
            assert!(matches!(
                ApiResponse::parse(op, body),
                Err(ClientError::Withdraw(ref m)) if m == "Insufficient funds."
            ));
        }
    }

    #[test]
    fn test_unexpected_shapes() {
        for body in [
            "<html>502 Bad Gateway</html>",
            r#"{"data":{}}"#,
            r#"{"status":"success"}"#,
            r#"{"status":"success","data":"nope"}"#,
            r#"{"status":"fail","data":{}}"#,
            r#"{"status":42,"data":{}}"#,
        ] {
            assert!(
                matches!(
                    ApiResponse::parse(Operation::GetBalance, body),
                    Err(ClientError::UnknownRemoteError)
                ),
                "body: {}",
                body
            );
        }
    }

    #[test]
    fn test_reference_id_detection() {
        let body = r#"{"status":"success","data":{"reference_id":"abc","inputs":[]}}"#;
        let response = ApiResponse::parse(Operation::Withdraw, body).unwrap();
        assert!(response.needs_signatures());
        let request = response.signing_request().unwrap();
        assert_eq!(request.reference_id.as_deref(), Some("abc"));

        let body = r#"{"status":"success","data":{"reference_id":null}}"#;
        assert!(!ApiResponse::parse(Operation::Withdraw, body)
            .unwrap()
            .needs_signatures());
    }
}
