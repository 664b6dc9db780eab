#![allow(unused)]

use std::collections::HashMap;

use bip39::{Language, Mnemonic, Seed};
use log::{debug, trace};
use zeroize::Zeroizing;

use ledger_btc_core::{
    authorization::CoinJoinAuthorization,
    coin::CoinInfo,
    config::SignerConfig,
    helpers::{
        address,
        fmt::fmt_amount,
        paths::h,
        scripts::{output_script_native_segwit, output_script_p2pkh, witness_p2wpkh},
        sha256, sha256d,
        writers::{write_compact_size, write_tx_input, write_tx_output, write_u32},
    },
    keychain::{Keychain, SigningKey},
    msg::{
        AckData, AmountUnit, InputScriptType, PaymentRequest, PrevInput, PrevOutput, PrevTx,
        RequestType, Serialized, SignTx, TxAck, TxInput, TxOutput, TxRequest,
    },
    signer::TxPort,
    sign_tx,
    ui::{Prompt, PromptKind, Ui},
    Error,
};

pub const MNEMONIC: &str = "duck deal pretty pen thunder economy wide common goose fit engine main aisle curtain choose cube claim snake enroll detect brief history float unit";

/// BIP-0173 example address
pub const EXTERNAL_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

/// Keychain implementation for test use
pub struct TestKeychain {
    /// BIP39 Mnemonic derived seed
    pub seed: [u8; 64],
}

impl TestKeychain {
    pub fn new() -> Self {
        let mnemonic = Mnemonic::from_phrase(MNEMONIC, Language::English).unwrap();
        let seed = Seed::new(&mnemonic, "");

        let mut b = [0u8; 64];
        b.copy_from_slice(seed.as_bytes());
        Self { seed: b }
    }
}

/// Keys are a hash of the seed and path, sufficient for signing tests
impl Keychain for TestKeychain {
    fn derive(&self, path: &[u32]) -> Result<Zeroizing<[u8; 32]>, Error> {
        let mut b = self.seed.to_vec();
        for p in path {
            b.extend_from_slice(&p.to_le_bytes());
        }
        Ok(Zeroizing::new(sha256(&b)))
    }
}

/// Signing key for a path
pub fn key(path: &[u32]) -> SigningKey {
    let secp = secp256k1::Secp256k1::new();
    SigningKey::derive(&secp, &TestKeychain::new(), path).unwrap()
}

/// P2WPKH locking script for a path
pub fn p2wpkh_script(path: &[u32]) -> Vec<u8> {
    output_script_native_segwit(0, &key(path).pubkey_hash())
}

/// P2PKH locking script for a path
pub fn p2pkh_script(path: &[u32]) -> Vec<u8> {
    output_script_p2pkh(&key(path).pubkey_hash())
}

/// P2WPKH witness for a path, signing the provided digest
pub fn p2wpkh_witness(path: &[u32], digest: &[u8; 32]) -> Vec<u8> {
    let secp = secp256k1::Secp256k1::new();
    let k = key(path);
    let sig = k.sign_ecdsa(&secp, digest).unwrap();

    let mut w = Vec::new();
    witness_p2wpkh(&mut w, &k.public_key(), &sig, 1).unwrap();
    w
}

/// P2TR locking script for a path
pub fn p2tr_script(path: &[u32]) -> Vec<u8> {
    let secp = secp256k1::Secp256k1::new();
    output_script_native_segwit(1, &key(path).taproot_output_key(&secp).unwrap())
}

/// Standard legacy path
pub fn bip44(chain: u32, index: u32) -> Vec<u32> {
    vec![h(44), h(0), h(0), chain, index]
}

/// Standard native segwit path
pub fn bip84(chain: u32, index: u32) -> Vec<u32> {
    vec![h(84), h(0), h(0), chain, index]
}

/// UI implementation for test use, recording every prompt
#[derive(Default)]
pub struct TestUi {
    pub prompts: Vec<PromptKind>,
    /// Spending and fee of each total confirmation
    pub totals: Vec<(u64, i64)>,
    /// Prompt to decline
    pub decline: Option<PromptKind>,
}

impl Ui for TestUi {
    fn confirm(&mut self, coin: &CoinInfo, unit: AmountUnit, prompt: &Prompt<'_>) -> bool {
        let kind = PromptKind::from(prompt);

        match prompt {
            Prompt::Total { spending, fee, .. } => {
                let (mut a, mut b) = ([0u8; 32], [0u8; 32]);
                debug!(
                    "confirm total: {} (fee: {})",
                    fmt_amount(*spending as i64, coin, unit, &mut a),
                    fmt_amount(*fee, coin, unit, &mut b)
                );
                self.totals.push((*spending, *fee));
            }
            Prompt::Output { output, .. } => {
                let mut a = [0u8; 32];
                debug!(
                    "confirm output: {} to {:?}",
                    fmt_amount(output.amount as i64, coin, unit, &mut a),
                    output.address
                );
            }
            _ => debug!("confirm: {}", kind),
        }

        self.prompts.push(kind);
        self.decline != Some(kind)
    }
}

/// Previous transaction fixture
#[derive(Clone, Debug, Default)]
pub struct PrevTxFixture {
    pub meta: PrevTx,
    pub inputs: Vec<PrevInput>,
    pub outputs: Vec<PrevOutput>,
    pub extra_data: Vec<u8>,
}

impl PrevTxFixture {
    /// Single input transaction paying the provided outputs
    pub fn paying(outputs: Vec<PrevOutput>) -> Self {
        Self {
            meta: PrevTx {
                version: 2,
                lock_time: 0,
                inputs_count: 1,
                outputs_count: outputs.len() as u32,
                extra_data_len: 0,
            },
            inputs: vec![PrevInput {
                prev_hash: rand::random(),
                prev_index: 0,
                script_sig: vec![0x51],
                sequence: 0xffff_ffff,
            }],
            outputs,
            extra_data: vec![],
        }
    }

    /// Compute the transaction id
    pub fn txid(&self) -> [u8; 32] {
        let mut b = Vec::new();

        write_u32(&mut b, self.meta.version).unwrap();
        write_compact_size(&mut b, self.inputs.len()).unwrap();
        for i in &self.inputs {
            write_tx_input(&mut b, &i.prev_hash, i.prev_index, &i.script_sig, i.sequence).unwrap();
        }
        write_compact_size(&mut b, self.outputs.len()).unwrap();
        for o in &self.outputs {
            write_tx_output(&mut b, o.amount, &o.script_pubkey).unwrap();
        }
        write_u32(&mut b, self.meta.lock_time).unwrap();
        b.extend_from_slice(&self.extra_data);

        let mut txid = sha256d(&b);
        txid.reverse();
        txid
    }
}

/// Original (replaced) transaction fixture
#[derive(Clone, Debug, Default)]
pub struct OrigTxFixture {
    pub meta: PrevTx,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl OrigTxFixture {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            meta: PrevTx {
                version: 2,
                lock_time: 0,
                inputs_count: inputs.len() as u32,
                outputs_count: outputs.len() as u32,
                extra_data_len: 0,
            },
            inputs,
            outputs,
        }
    }

    /// Compute the transaction id, outputs must pay addresses
    pub fn txid(&self, coin: &CoinInfo) -> [u8; 32] {
        let mut b = Vec::new();

        write_u32(&mut b, self.meta.version).unwrap();
        write_compact_size(&mut b, self.inputs.len()).unwrap();
        for i in &self.inputs {
            let script_sig = i.script_sig.clone().unwrap_or_default();
            write_tx_input(&mut b, &i.prev_hash, i.prev_index, &script_sig, i.sequence).unwrap();
        }
        write_compact_size(&mut b, self.outputs.len()).unwrap();
        for o in &self.outputs {
            let script = address::output_script(o.address.as_deref().unwrap(), coin).unwrap();
            write_tx_output(&mut b, o.amount, &script).unwrap();
        }
        write_u32(&mut b, self.meta.lock_time).unwrap();

        let mut txid = sha256d(&b);
        txid.reverse();
        txid
    }
}

/// Host implementation for test use, answering requests from fixtures
#[derive(Default)]
pub struct TestHost {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub prev_txs: HashMap<[u8; 32], PrevTxFixture>,
    pub orig_txs: HashMap<[u8; 32], OrigTxFixture>,
    pub payment_requests: Vec<PaymentRequest>,

    /// Replace the nth (1-based) request for an input of the transaction
    pub tamper: Option<(usize, TxInput)>,
    input_requests: usize,

    /// Collected serialized transaction
    pub serialized: Vec<u8>,
    /// Collected signatures by input index
    pub signatures: Vec<(u32, Vec<u8>)>,
    pub requests: Vec<RequestType>,
    pub finished: bool,
    /// Fail delivery of the final request
    pub fail_finish: bool,
}

impl TestHost {
    /// Add an input spending a new previous transaction output
    pub fn add_input(&mut self, mut txi: TxInput, script_pubkey: Vec<u8>) -> [u8; 32] {
        let prev = PrevTxFixture::paying(vec![
            PrevOutput {
                amount: 1234,
                script_pubkey: vec![0x6a],
            },
            PrevOutput {
                amount: txi.amount,
                script_pubkey,
            },
        ]);

        let txid = prev.txid();
        txi.prev_hash = txid;
        txi.prev_index = 1;

        self.prev_txs.insert(txid, prev);
        self.inputs.push(txi);

        txid
    }

    fn collect(&mut self, s: &Serialized) {
        self.serialized.extend_from_slice(&s.serialized_tx);
        if let (Some(i), Some(sig)) = (s.signature_index, &s.signature) {
            self.signatures.push((i, sig.to_vec()));
        }
    }

    fn prev(&self, h: &[u8; 32]) -> Result<&PrevTxFixture, Error> {
        self.prev_txs.get(h).ok_or(Error::UnexpectedAck)
    }

    fn orig(&self, h: &[u8; 32]) -> Result<&OrigTxFixture, Error> {
        self.orig_txs.get(h).ok_or(Error::UnexpectedAck)
    }
}

impl TxPort for TestHost {
    fn exchange(&mut self, req: TxRequest) -> Result<TxAck, Error> {
        trace!("request: {:?}", req);

        self.collect(&req.serialized);
        self.requests.push(req.request_type);

        let d = &req.details;
        let i = d.request_index.unwrap_or(0) as usize;

        let data = match (req.request_type, d.tx_hash) {
            (RequestType::TxInput, None) => {
                self.input_requests += 1;
                match &self.tamper {
                    Some((n, txi)) if *n == self.input_requests => AckData::Input(txi.clone()),
                    _ => AckData::Input(self.inputs[i].clone()),
                }
            }
            (RequestType::TxOutput, None) => AckData::Output(self.outputs[i].clone()),
            (RequestType::TxPaymentReq, None) => {
                AckData::PaymentRequest(self.payment_requests[i].clone())
            }
            (RequestType::TxMeta, Some(h)) => match self.orig_txs.get(&h) {
                Some(o) => AckData::Meta(o.meta.clone()),
                None => AckData::Meta(self.prev(&h)?.meta.clone()),
            },
            (RequestType::TxInput, Some(h)) => AckData::PrevInput(self.prev(&h)?.inputs[i].clone()),
            (RequestType::TxOutput, Some(h)) => {
                AckData::PrevOutput(self.prev(&h)?.outputs[i].clone())
            }
            (RequestType::TxExtraData, Some(h)) => {
                let offset = d.extra_data_offset.unwrap_or(0) as usize;
                let len = d.extra_data_len.unwrap_or(0) as usize;
                AckData::ExtraData(self.prev(&h)?.extra_data[offset..offset + len].to_vec())
            }
            (RequestType::TxOrigInput, Some(h)) => AckData::Input(self.orig(&h)?.inputs[i].clone()),
            (RequestType::TxOrigOutput, Some(h)) => {
                AckData::Output(self.orig(&h)?.outputs[i].clone())
            }
            _ => return Err(Error::UnexpectedAck),
        };

        Ok(TxAck::new(&req, data))
    }

    fn finish(&mut self, req: TxRequest) -> Result<(), Error> {
        if self.fail_finish {
            return Err(Error::UnexpectedAck);
        }

        self.collect(&req.serialized);
        self.requests.push(req.request_type);
        self.finished = true;
        Ok(())
    }
}

/// Transaction header for a host
pub fn sign_tx_for(host: &TestHost, coin: &CoinInfo) -> SignTx {
    SignTx {
        coin_name: coin.name.to_string(),
        inputs_count: host.inputs.len() as u32,
        outputs_count: host.outputs.len() as u32,
        version: 2,
        lock_time: 0,
        ..Default::default()
    }
}

/// Sign the transaction supplied by a host
pub fn sign(
    host: &mut TestHost,
    ui: &mut TestUi,
    coin: &CoinInfo,
    config: &SignerConfig,
    authorization: Option<&mut CoinJoinAuthorization>,
) -> Result<(), Error> {
    let tx = sign_tx_for(host, coin);
    sign_tx(tx, coin, config, &TestKeychain::new(), ui, host, authorization)
}

/// Internal P2WPKH input
pub fn witness_input(path: Vec<u32>, amount: u64) -> TxInput {
    TxInput {
        address_n: path,
        script_type: InputScriptType::SpendWitness,
        sequence: 0xffff_ffff,
        amount,
        ..Default::default()
    }
}

/// Internal P2PKH input
pub fn legacy_input(path: Vec<u32>, amount: u64) -> TxInput {
    TxInput {
        address_n: path,
        script_type: InputScriptType::SpendAddress,
        sequence: 0xffff_ffff,
        amount,
        ..Default::default()
    }
}

/// Output paying the external test address
pub fn external_output(amount: u64) -> TxOutput {
    TxOutput {
        address: Some(EXTERNAL_ADDRESS.to_string()),
        amount,
        script_type: ledger_btc_core::msg::OutputScriptType::PayToWitness,
        ..Default::default()
    }
}

/// Setup logging for tests
pub fn setup() {
    let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Default::default());
}
