//! BlockSign Client
//!
//! Talks to the remote wallet API and performs the client-side half of
//! withdrawals and sweeps: the server prepares unsigned inputs, we sign the
//! ones our keys own and hand them back.
//!
//! # Example
//!
//! ```ignore
//! use blocksign_client::{Client, ClientOptions, Params};
//!
//! let options = ClientOptions {
//!     api_key: "API KEY".into(),
//!     pin: Some("SECRET PIN".into()),
//!     ..Default::default()
//! };
//! let client = Client::new(options, my_transport)?;
//!
//! let params = Params::new()
//!     .with("amounts", "1.0")
//!     .with("to_addresses", "2N...");
//! let response = client.execute("withdraw", params)?;
//! ```

pub mod operation;
pub mod response;
pub mod signing;
pub mod transport;

pub use operation::{Operation, OperationKind, UnknownOperation, OPERATIONS};
pub use response::ApiResponse;
pub use signing::{sign_sweep, sign_withdrawal};
pub use transport::{ApiRequest, MockTransport, Params, Transport, TransportError};

use blocksign_core::crypto::DEFAULT_PIN_ITERATIONS;
use blocksign_core::{pin_to_aes_key, AesKey, CryptoError, Key, KeyError, SignError, SigningRequest};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Default API host
pub const DEFAULT_HOSTNAME: &str = "block.io";

/// Default API version
pub const DEFAULT_API_VERSION: u32 = 2;

/// Errors from the client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Public key mismatch for requested signer and ourselves. Invalid Secret PIN detected.")]
    PublicKeyMismatch { expected: String, actual: String },

    #[error("Invalid Secret PIN provided")]
    InvalidPin,

    #[error("PIN not set. Configure a Secret PIN before withdrawing.")]
    PinNotSet,

    #[error("No private_key provided")]
    MissingPrivateKey,

    #[error("Unknown error occurred. Please report this.")]
    UnknownRemoteError,

    #[error("{0}")]
    Remote(String),

    #[error("Withdrawal failed: {0}")]
    Withdraw(String),

    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),

    #[error("{operation} is not a {expected} operation")]
    UnsupportedOperation {
        operation: Operation,
        expected: &'static str,
    },

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Signing error: {0}")]
    Sign(#[from] SignError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidPin => ClientError::InvalidPin,
            CryptoError::Key(key) => ClientError::Key(key),
            other => ClientError::Crypto(other),
        }
    }
}

/// Connection and credential settings
#[derive(Clone)]
pub struct ClientOptions {
    pub api_key: String,
    /// Secret PIN; required for withdrawals
    pub pin: Option<String>,
    pub hostname: String,
    /// API version; version 1 lets the server handle the PIN
    pub version: u32,
    /// PBKDF2 iterations for PIN stretching (split across two passes)
    pub pbkdf2_iterations: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            pin: None,
            hostname: DEFAULT_HOSTNAME.to_string(),
            version: DEFAULT_API_VERSION,
            pbkdf2_iterations: DEFAULT_PIN_ITERATIONS,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &"<redacted>")
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .field("hostname", &self.hostname)
            .field("version", &self.version)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .finish()
    }
}

/// PIN plus the AES key derived from it
struct PinState {
    pin: Zeroizing<String>,
    aes_key: AesKey,
}

/// API client over a [`Transport`]
pub struct Client<T: Transport> {
    transport: T,
    api_key: String,
    hostname: String,
    version: u32,
    pbkdf2_iterations: u32,
    pin: Option<PinState>,
}

impl<T: Transport> Client<T> {
    /// Create a client, deriving the PIN key up front when a PIN is given.
    pub fn new(options: ClientOptions, transport: T) -> Result<Self, ClientError> {
        let ClientOptions {
            api_key,
            pin,
            hostname,
            version,
            pbkdf2_iterations,
        } = options;

        let mut client = Self {
            transport,
            api_key,
            hostname,
            version,
            pbkdf2_iterations,
            pin: None,
        };
        if let Some(pin) = pin {
            client.set_pin(Zeroizing::new(pin))?;
        }

        log::debug!(
            "client ready for {} (API v{})",
            client.hostname,
            client.version
        );
        Ok(client)
    }

    /// Replace the Secret PIN and its derived key.
    pub fn set_pin(&mut self, pin: impl Into<Zeroizing<String>>) -> Result<(), ClientError> {
        let pin = pin.into();
        let aes_key = pin_to_aes_key(&pin, self.pbkdf2_iterations)?;
        self.pin = Some(PinState { pin, aes_key });
        Ok(())
    }

    pub fn has_pin(&self) -> bool {
        self.pin.is_some()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `https://{host}/api/v{version}/{method}/`
    pub fn endpoint_url(&self, operation: Operation) -> String {
        format!(
            "https://{}/api/v{}/{}/",
            self.hostname,
            self.version,
            operation.method_name()
        )
    }

    /// Dispatch by method name: withdrawals and sweeps get local signing,
    /// everything else is a single call.
    pub fn execute(&self, method: &str, params: Params) -> Result<ApiResponse, ClientError> {
        let operation: Operation = method.parse()?;
        match operation.kind() {
            OperationKind::Withdrawal => self.withdraw(operation, params),
            OperationKind::Sweep => self.sweep(operation, params),
            OperationKind::Query | OperationKind::Finalize => self.call(operation, params),
        }
    }

    /// Send one request and unwrap the response envelope.
    pub fn call(&self, operation: Operation, params: Params) -> Result<ApiResponse, ClientError> {
        let request = ApiRequest {
            method: operation.method_name().to_string(),
            url: self.endpoint_url(operation),
            api_key: self.api_key.clone(),
            params,
        };
        log::debug!("POST {} {:?}", request.url, request.params);

        let body = self.transport.post(&request)?;
        ApiResponse::parse(operation, &body)
    }

    /// Withdraw, signing locally when the server asks for signatures.
    ///
    /// If the finalize response asks for more signatures (dTrust), it is
    /// returned as is for the other signers.
    pub fn withdraw(
        &self,
        operation: Operation,
        mut params: Params,
    ) -> Result<ApiResponse, ClientError> {
        if operation.kind() != OperationKind::Withdrawal {
            return Err(ClientError::UnsupportedOperation {
                operation,
                expected: "withdrawal",
            });
        }
        let pin = self.pin.as_ref().ok_or(ClientError::PinNotSet)?;

        if self.version == 1 {
            // legacy API: the server holds the PIN and signs
            params.insert("pin", pin.pin.as_str());
            return self.call(operation, params);
        }

        let response = self.call(operation, params)?;
        if !response.needs_signatures() {
            return Ok(response);
        }

        let mut request = response.signing_request()?;
        sign_withdrawal(&mut request, &pin.aes_key)?;
        self.finalize(operation, &request)
    }

    /// Sweep an external address whose WIF key is in `private_key`.
    ///
    /// The WIF is swapped for its public key before anything is sent.
    pub fn sweep(
        &self,
        operation: Operation,
        mut params: Params,
    ) -> Result<ApiResponse, ClientError> {
        if operation.kind() != OperationKind::Sweep {
            return Err(ClientError::UnsupportedOperation {
                operation,
                expected: "sweep",
            });
        }
        let wif = Zeroizing::new(
            params
                .remove("private_key")
                .ok_or(ClientError::MissingPrivateKey)?,
        );
        let key = Key::from_wif(&wif)?;
        params.insert("public_key", key.public_key());

        let response = self.call(operation, params)?;
        if !response.needs_signatures() {
            return Ok(response);
        }

        let mut request = response.signing_request()?;
        sign_sweep(&mut request, &key)?;
        self.finalize(operation, &request)
    }

    /// Submit `request` to the finalize endpoint paired with `operation`.
    fn finalize(
        &self,
        operation: Operation,
        request: &SigningRequest,
    ) -> Result<ApiResponse, ClientError> {
        let finalize = operation
            .finalize_operation()
            .ok_or(ClientError::UnsupportedOperation {
                operation,
                expected: "withdrawal or sweep",
            })?;
        let params = Params::new().with("signature_data", request.to_signature_data()?);
        self.call(finalize, params)
    }
}
