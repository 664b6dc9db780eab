// Copyright (c) 2022-2023 The MobileCoin Foundation

/// [Signer][crate::signer::Signer] errors
///
/// Every error is fatal to the signing session, see [Error::kind] for the
/// failure category reported to the host.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum Error {
    /// Host response does not match the outstanding request
    #[cfg_attr(feature = "thiserror", error("Unexpected response"))]
    UnexpectedAck = 0x00,

    /// Required field missing
    #[cfg_attr(feature = "thiserror", error("Missing required field"))]
    MissingField = 0x01,

    /// Field provided but not expected for this script type
    #[cfg_attr(feature = "thiserror", error("Field provided but not expected"))]
    UnexpectedField = 0x02,

    /// Script type not valid in this context
    #[cfg_attr(feature = "thiserror", error("Invalid script type"))]
    InvalidScriptType = 0x03,

    /// Malformed or unsupported multisig descriptor
    #[cfg_attr(feature = "thiserror", error("Invalid multisig parameters"))]
    InvalidMultisig = 0x04,

    /// Invalid OP_RETURN output
    #[cfg_attr(feature = "thiserror", error("Invalid OP_RETURN output"))]
    InvalidOpReturn = 0x05,

    /// Address could not be decoded for this coin
    #[cfg_attr(feature = "thiserror", error("Invalid address"))]
    InvalidAddress = 0x06,

    /// Derivation path rejected
    #[cfg_attr(feature = "thiserror", error("Invalid derivation path"))]
    InvalidPath = 0x07,

    /// Segwit not enabled on this coin
    #[cfg_attr(feature = "thiserror", error("Segwit not enabled on this coin"))]
    SegwitDisabled = 0x08,

    /// Taproot not enabled on this coin
    #[cfg_attr(feature = "thiserror", error("Taproot not enabled on this coin"))]
    TaprootDisabled = 0x09,

    /// Coin parameters do not match the request
    #[cfg_attr(feature = "thiserror", error("Unknown or mismatched coin"))]
    UnknownCoin = 0x0a,

    /// Transaction declares no inputs or outputs
    #[cfg_attr(feature = "thiserror", error("Transaction has no inputs or outputs"))]
    EmptyTransaction = 0x0b,

    /// Presigned external input signature does not verify
    #[cfg_attr(feature = "thiserror", error("Invalid external input"))]
    InvalidExternalInput = 0x0c,

    /// Malformed script_sig, witness or script
    #[cfg_attr(feature = "thiserror", error("Invalid script or witness"))]
    InvalidScript = 0x0d,

    /// Signature does not verify against the spent script
    #[cfg_attr(feature = "thiserror", error("Invalid signature"))]
    InvalidSignature = 0x0e,

    /// Claimed input amount does not match the previous transaction
    #[cfg_attr(feature = "thiserror", error("Invalid amount specified"))]
    InvalidAmount = 0x10,

    /// Previous transaction hash does not match the streamed data
    #[cfg_attr(feature = "thiserror", error("Encountered invalid prev_hash"))]
    InvalidPrevHash = 0x11,

    /// Previous output index out of range
    #[cfg_attr(feature = "thiserror", error("Not enough outputs in previous transaction"))]
    InvalidPrevIndex = 0x12,

    /// Previous output locking script does not match the input
    #[cfg_attr(feature = "thiserror", error("Input does not match previous output script"))]
    InvalidPrevScript = 0x13,

    /// Streamed data changed between passes
    #[cfg_attr(feature = "thiserror", error("Transaction has changed during signing"))]
    TxChanged = 0x14,

    /// Original transaction id does not match the streamed data
    #[cfg_attr(feature = "thiserror", error("Invalid original TXID"))]
    InvalidOrigHash = 0x15,

    /// Replacement transaction violates replacement rules
    #[cfg_attr(feature = "thiserror", error("Invalid replacement transaction"))]
    InvalidReplacement = 0x16,

    /// Original inputs or outputs removed or reordered
    #[cfg_attr(feature = "thiserror", error("Rearranging or removal of original inputs or outputs is not supported"))]
    OrigRearranged = 0x17,

    /// Too many original transactions referenced
    #[cfg_attr(feature = "thiserror", error("Too many original transactions"))]
    TooManyOrigTxs = 0x18,

    /// External input without proof of non-ownership or signature
    #[cfg_attr(feature = "thiserror", error("Unverifiable external input"))]
    UnverifiedExternalInput = 0x19,

    /// Fee exceeds the hard threshold
    #[cfg_attr(feature = "thiserror", error("Fee over threshold"))]
    FeeOverThreshold = 0x1a,

    /// Inputs do not cover outputs
    #[cfg_attr(feature = "thiserror", error("Not enough funds"))]
    NotEnoughFunds = 0x1b,

    /// Payment request failed verification
    #[cfg_attr(feature = "thiserror", error("Invalid payment request"))]
    InvalidPaymentRequest = 0x1c,

    /// Serialized data exceeds the chunk buffer
    #[cfg_attr(feature = "thiserror", error("Serialized chunk overflow"))]
    ChunkOverflow = 0x1d,

    /// Original transaction has no input of ours to verify
    #[cfg_attr(feature = "thiserror", error("Original transaction has no input signed by this wallet"))]
    UnverifiedOrigTx = 0x1e,

    /// Signing path or script not covered by the authorization
    #[cfg_attr(feature = "thiserror", error("Unauthorized path"))]
    Unauthorized = 0x20,

    /// CoinJoin request missing or not authorized
    #[cfg_attr(feature = "thiserror", error("Missing or unauthorized CoinJoin request"))]
    InvalidCoinJoinRequest = 0x21,

    /// Coordination fee rate above the authorized maximum
    #[cfg_attr(feature = "thiserror", error("Coordination fee rate too high"))]
    CoordinatorFeeTooHigh = 0x22,

    /// Authorized number of rounds exhausted
    #[cfg_attr(feature = "thiserror", error("Exceeded number of CoinJoin rounds"))]
    RoundsExhausted = 0x23,

    /// Authorization bound to a different, unexpired round
    #[cfg_attr(feature = "thiserror", error("Authorization bound to another round"))]
    RoundMismatch = 0x24,

    /// User or confirmation gate declined
    #[cfg_attr(feature = "thiserror", error("Action cancelled"))]
    ActionCancelled = 0x30,

    /// Key material rejected by the curve
    #[cfg_attr(feature = "thiserror", error("Invalid key"))]
    InvalidKey = 0x40,

    /// Signing failed
    #[cfg_attr(feature = "thiserror", error("Signing error"))]
    SignError = 0x41,

    /// Invalid signer state
    #[cfg_attr(feature = "thiserror", error("Invalid signer state"))]
    InvalidState = 0x42,
}

/// Failure category reported to the host
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ErrorKind {
    /// Malformed or unexpected data from the host
    DataError,
    /// Consistency or policy violation
    ProcessError,
    /// Inputs do not cover outputs
    NotEnoughFunds,
    /// Declined by the user or the authorization
    ActionCancelled,
    /// Internal signing failure
    Firmware,
}

impl Error {
    /// Fetch the failure category for an error
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            UnexpectedAck | MissingField | UnexpectedField | InvalidScriptType
            | InvalidMultisig | InvalidOpReturn | InvalidAddress | InvalidPath
            | SegwitDisabled | TaprootDisabled | UnknownCoin | EmptyTransaction
            | InvalidExternalInput | InvalidScript | InvalidSignature | InvalidOrigHash | InvalidPaymentRequest | InvalidCoinJoinRequest => {
                ErrorKind::DataError
            }
            NotEnoughFunds => ErrorKind::NotEnoughFunds,
            ActionCancelled | Unauthorized | RoundsExhausted | RoundMismatch => {
                ErrorKind::ActionCancelled
            }
            InvalidKey | SignError | InvalidState | ChunkOverflow => ErrorKind::Firmware,
            _ => ErrorKind::ProcessError,
        }
    }
}

impl From<secp256k1::Error> for Error {
    fn from(_: secp256k1::Error) -> Self {
        Error::InvalidKey
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_kinds() {
        let tests = &[
            (Error::UnexpectedAck, ErrorKind::DataError),
            (Error::InvalidExternalInput, ErrorKind::DataError),
            (Error::InvalidSignature, ErrorKind::DataError),
            (Error::TxChanged, ErrorKind::ProcessError),
            (Error::UnverifiedOrigTx, ErrorKind::ProcessError),
            (Error::InvalidReplacement, ErrorKind::ProcessError),
            (Error::NotEnoughFunds, ErrorKind::NotEnoughFunds),
            (Error::ActionCancelled, ErrorKind::ActionCancelled),
            (Error::RoundsExhausted, ErrorKind::ActionCancelled),
            (Error::SignError, ErrorKind::Firmware),
        ];

        for (e, k) in tests {
            assert_eq!(e.kind(), *k, "kind mismatch for {e:?}");
        }
    }
}
