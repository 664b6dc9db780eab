// Copyright (c) 2022-2023 The MobileCoin Foundation

use alloc::{string::String, vec::Vec};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumIter};

/// Input script types
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumIter, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum InputScriptType {
    /// Legacy P2PKH (or P2SH multisig when a descriptor is present)
    SpendAddress = 0,
    /// Legacy P2SH multisig
    SpendMultisig = 1,
    /// Input not owned by this wallet
    External = 2,
    /// Native segwit v0
    SpendWitness = 3,
    /// Segwit v0 nested in P2SH
    SpendP2shWitness = 4,
    /// Taproot key-path spend
    SpendTaproot = 5,
}

impl Default for InputScriptType {
    fn default() -> Self {
        Self::SpendAddress
    }
}

impl InputScriptType {
    /// Input spent with witness data
    pub fn is_segwit(&self) -> bool {
        matches!(
            self,
            Self::SpendWitness | Self::SpendP2shWitness | Self::SpendTaproot
        )
    }

    /// Input signed without witness data
    pub fn is_nonsegwit(&self) -> bool {
        matches!(self, Self::SpendAddress | Self::SpendMultisig)
    }

    /// Input owned (and signed) by this wallet
    pub fn is_internal(&self) -> bool {
        !matches!(self, Self::External)
    }

    /// Script types which may carry a multisig descriptor
    pub fn allows_multisig(&self) -> bool {
        matches!(
            self,
            Self::SpendAddress | Self::SpendMultisig | Self::SpendWitness | Self::SpendP2shWitness
        )
    }
}

/// Output script types
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumIter, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OutputScriptType {
    PayToAddress = 0,
    PayToScriptHash = 1,
    PayToMultisig = 2,
    PayToOpReturn = 3,
    PayToWitness = 4,
    PayToP2shWitness = 5,
    PayToTaproot = 6,
}

impl Default for OutputScriptType {
    fn default() -> Self {
        Self::PayToAddress
    }
}

impl OutputScriptType {
    /// Input script type a change output of this type will be spent with
    pub fn change_input_type(&self) -> Option<InputScriptType> {
        match self {
            Self::PayToAddress => Some(InputScriptType::SpendAddress),
            Self::PayToMultisig => Some(InputScriptType::SpendMultisig),
            Self::PayToWitness => Some(InputScriptType::SpendWitness),
            Self::PayToP2shWitness => Some(InputScriptType::SpendP2shWitness),
            Self::PayToTaproot => Some(InputScriptType::SpendTaproot),
            Self::PayToScriptHash | Self::PayToOpReturn => None,
        }
    }

    /// Script types which may carry a multisig descriptor
    pub fn allows_multisig(&self) -> bool {
        matches!(
            self,
            Self::PayToAddress | Self::PayToMultisig | Self::PayToWitness | Self::PayToP2shWitness
        )
    }
}

/// Display unit for amounts
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum AmountUnit {
    #[default]
    Bitcoin,
    MilliBitcoin,
    MicroBitcoin,
    Satoshi,
}

/// Multisig public key ordering
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum PubkeysOrder {
    /// Keys used in the order supplied
    #[default]
    Preserved,
    /// Keys sorted lexicographically (BIP-67)
    Lexicographic,
}

/// Multisig descriptor
#[derive(Clone, PartialEq, Debug, Default)]
pub struct MultisigRedeemScript {
    /// Compressed cosigner public keys
    pub pubkeys: Vec<[u8; 33]>,
    /// Existing cosigner signatures (DER, no hash type), empty when absent
    pub signatures: Vec<Vec<u8>>,
    /// Signature threshold
    pub m: u32,
    /// Public key ordering
    pub pubkeys_order: PubkeysOrder,
}

/// Coordinator parameters for an automated coinjoin round
#[derive(Clone, PartialEq, Debug, Default)]
pub struct CoinJoinRequest {
    /// Coordination fee rate in units of 10^-8
    pub fee_rate: u32,
    /// Inputs at or below this amount are not charged a coordination fee
    pub no_fee_threshold: u64,
    /// Minimum output amount accepted by the coordinator
    pub min_registrable_amount: u64,
    /// Round identifier
    pub round_id: [u8; 32],
}

/// Transaction signing request
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SignTx {
    pub outputs_count: u32,
    pub inputs_count: u32,
    pub coin_name: String,
    pub version: u32,
    pub lock_time: u32,
    pub amount_unit: AmountUnit,
    pub coinjoin_request: Option<CoinJoinRequest>,
    /// Display addresses in chunks
    pub chunkify: bool,
}

/// Automated coinjoin authorization request
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AuthorizeCoinJoin {
    /// Coordinator identifier, bound into ownership proof commitments
    pub coordinator: String,
    /// Maximum number of signing rounds
    pub max_rounds: u32,
    /// Maximum coordination fee rate in units of 10^-8
    pub max_coordinator_fee_rate: u32,
    /// Maximum mining fee rate in satoshi per 1000 virtual bytes
    pub max_fee_per_kvbyte: u32,
    /// Total fee budget across all rounds, in satoshi
    pub max_total_fee: u64,
    /// Account path prefix
    pub address_n: Vec<u32>,
    pub coin_name: String,
    pub script_type: InputScriptType,
    pub amount_unit: AmountUnit,
}

/// CoinJoin flag marking inputs exempt from coordination fees (remixes)
pub const COINJOIN_FLAGS_NO_FEE: u8 = 0x02;

/// Transaction input, streamed for the current or an original transaction
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TxInput {
    /// Derivation path, internal inputs only
    pub address_n: Vec<u32>,
    /// Previous transaction id (display byte order)
    pub prev_hash: [u8; 32],
    pub prev_index: u32,
    /// Signature script, presigned external inputs only
    pub script_sig: Option<Vec<u8>>,
    pub sequence: u32,
    pub script_type: InputScriptType,
    pub multisig: Option<MultisigRedeemScript>,
    pub amount: u64,
    /// Serialized witness stack, presigned external inputs only
    pub witness: Option<Vec<u8>>,
    /// Original transaction this input is carried over from
    pub orig_hash: Option<[u8; 32]>,
    pub orig_index: Option<u32>,
    /// Locking script, external inputs only
    pub script_pubkey: Option<Vec<u8>>,
    pub coinjoin_flags: u8,
}

impl TxInput {
    /// Input carries its owner's signature, verified before signing
    pub fn is_presigned(&self) -> bool {
        self.script_sig.is_some() || self.witness.is_some()
    }
}

/// Transaction output, streamed for the current or an original transaction
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TxOutput {
    /// Destination address
    pub address: Option<String>,
    /// Derivation path for change outputs
    pub address_n: Vec<u32>,
    pub amount: u64,
    pub script_type: OutputScriptType,
    pub multisig: Option<MultisigRedeemScript>,
    pub op_return_data: Option<Vec<u8>>,
    /// Original transaction this output is carried over from
    pub orig_hash: Option<[u8; 32]>,
    pub orig_index: Option<u32>,
    /// Payment request covering this output
    pub payment_req_index: Option<u32>,
}

/// Header of a referenced previous (or original) transaction
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PrevTx {
    pub version: u32,
    pub lock_time: u32,
    pub inputs_count: u32,
    pub outputs_count: u32,
    /// Length of coin-specific trailing data
    pub extra_data_len: u32,
}

/// Input of a referenced previous transaction
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PrevInput {
    pub prev_hash: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

/// Output of a referenced previous transaction
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PrevOutput {
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
}

/// Signed payment request covering a run of outputs
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PaymentRequest {
    pub nonce: Option<Vec<u8>>,
    pub recipient_name: String,
    /// Sum of the covered output amounts
    pub amount: Option<u64>,
    /// Compact (64 byte) ECDSA signature
    pub signature: Vec<u8>,
}
