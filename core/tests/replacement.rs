use ledger_btc_core::{
    coin::BITCOIN,
    config::{SafetyCheckLevel, SignerConfig},
    helpers::{address, paths::h, scripts::output_script_p2pkh},
    msg::{InputScriptType, SignTx, TxInput},
    signer::sig_hasher::{BitcoinSigHasher, SigHasher},
    ui::PromptKind,
    Error,
};

mod helpers;
use helpers::*;

const CONFIG: SignerConfig = SignerConfig::new();

/// Digest our input signed in the original transaction
fn original_digest(txi: &TxInput) -> [u8; 32] {
    let path = bip84(0, 0);

    let mut hasher = BitcoinSigHasher::new();
    hasher.add_input(txi, &p2wpkh_script(&path)).unwrap();
    hasher
        .add_output(49_000, &address::output_script(EXTERNAL_ADDRESS, &BITCOIN).unwrap())
        .unwrap();

    let header = SignTx {
        version: 2,
        lock_time: 0,
        ..Default::default()
    };
    let script_code = output_script_p2pkh(&key(&path).pubkey_hash());

    hasher
        .hash143(txi, &script_code, &header, &BITCOIN, 1)
        .unwrap()
}

/// Host replacing a signed transaction paying 49000 with a 1000 fee
fn replacement_host(amount_out: u64) -> (TestHost, [u8; 32]) {
    let mut host = TestHost::default();

    let mut txi = witness_input(bip84(0, 0), 50_000);
    txi.sequence = 0xffff_fffd;
    host.add_input(txi, p2wpkh_script(&bip84(0, 0)));

    // The witness is not part of the transaction id
    let mut orig_txi = host.inputs[0].clone();
    orig_txi.witness = Some(p2wpkh_witness(&bip84(0, 0), &original_digest(&orig_txi)));

    let orig = OrigTxFixture::new(vec![orig_txi], vec![external_output(49_000)]);
    let orig_hash = orig.txid(&BITCOIN);
    host.orig_txs.insert(orig_hash, orig);

    host.inputs[0].orig_hash = Some(orig_hash);
    host.inputs[0].orig_index = Some(0);

    let mut txo = external_output(amount_out);
    txo.orig_hash = Some(orig_hash);
    txo.orig_index = Some(0);
    host.outputs.push(txo);

    (host, orig_hash)
}

#[test]
fn bump_fee() -> anyhow::Result<()> {
    setup();

    let (mut host, _) = replacement_host(48_500);
    let mut ui = TestUi::default();

    sign(&mut host, &mut ui, &BITCOIN, &CONFIG, None)?;

    assert!(host.finished);
    assert_eq!(
        ui.prompts,
        vec![
            PromptKind::Replacement,
            PromptKind::ModifyOutput,
            PromptKind::ModifyFee
        ]
    );
    assert_eq!(host.signatures.len(), 1);

    Ok(())
}

#[test]
fn unchanged_outputs_need_no_output_confirmation() -> anyhow::Result<()> {
    setup();

    // Additional input with the original output left unchanged raises the fee
    let (mut host, _) = replacement_host(49_000);
    host.add_input(witness_input(bip84(0, 1), 600), p2wpkh_script(&bip84(0, 1)));

    let mut ui = TestUi::default();
    sign(&mut host, &mut ui, &BITCOIN, &CONFIG, None)?;

    assert_eq!(ui.prompts, vec![PromptKind::Replacement, PromptKind::ModifyFee]);

    Ok(())
}

#[test]
fn increased_output_rejected() {
    setup();

    // Additional funds go to the recipient rather than the fee
    let (mut host, _) = replacement_host(49_100);
    host.add_input(witness_input(bip84(0, 1), 600), p2wpkh_script(&bip84(0, 1)));

    let r = sign(&mut host, &mut TestUi::default(), &BITCOIN, &CONFIG, None);
    assert_eq!(r, Err(Error::InvalidReplacement));
    assert!(!host.finished);
}

#[test]
fn new_output_rejected() {
    setup();

    let (mut host, _) = replacement_host(48_500);
    host.outputs.push(external_output(100));

    let r = sign(&mut host, &mut TestUi::default(), &BITCOIN, &CONFIG, None);
    assert_eq!(r, Err(Error::InvalidReplacement));
}

#[test]
fn original_must_match_claimed_hash() {
    setup();

    let (mut host, orig_hash) = replacement_host(48_500);
    host.orig_txs.get_mut(&orig_hash).unwrap().outputs[0].amount = 49_500;

    let r = sign(&mut host, &mut TestUi::default(), &BITCOIN, &CONFIG, None);
    assert_eq!(r, Err(Error::InvalidOrigHash));
}

#[test]
fn original_input_must_match() {
    setup();

    let (mut host, orig_hash) = replacement_host(48_500);
    host.orig_txs.get_mut(&orig_hash).unwrap().inputs[0].amount = 40_000;

    let r = sign(&mut host, &mut TestUi::default(), &BITCOIN, &CONFIG, None);
    assert_eq!(r, Err(Error::InvalidReplacement));
}

#[test]
fn forged_original_signature_rejected() {
    setup();

    let (mut host, orig_hash) = replacement_host(48_500);
    let orig_txi = &mut host.orig_txs.get_mut(&orig_hash).unwrap().inputs[0];
    orig_txi.witness = Some(p2wpkh_witness(&bip84(0, 0), &[0x55; 32]));

    let r = sign(&mut host, &mut TestUi::default(), &BITCOIN, &CONFIG, None);
    assert_eq!(r, Err(Error::InvalidSignature));
    assert!(host.signatures.is_empty());
    assert!(!host.finished);
}

#[test]
fn unsigned_original_rejected() {
    setup();

    let (mut host, orig_hash) = replacement_host(48_500);
    host.orig_txs.get_mut(&orig_hash).unwrap().inputs[0].witness = None;

    let r = sign(&mut host, &mut TestUi::default(), &BITCOIN, &CONFIG, None);
    assert_eq!(r, Err(Error::InvalidSignature));
    assert!(host.signatures.is_empty());
}

#[test]
fn original_without_our_input_rejected() {
    setup();

    let config = SignerConfig {
        safety_checks: SafetyCheckLevel::PromptAlways,
        ..SignerConfig::new()
    };

    // Only input belongs to another wallet, carried over unsigned
    let script = p2wpkh_script(&[h(84), h(0), h(5), 0, 0]);
    let mut host = TestHost::default();
    host.add_input(
        TxInput {
            script_type: InputScriptType::External,
            script_pubkey: Some(script.clone()),
            sequence: 0xffff_fffd,
            amount: 50_000,
            ..Default::default()
        },
        script,
    );

    let orig = OrigTxFixture::new(vec![host.inputs[0].clone()], vec![external_output(49_000)]);
    let orig_hash = orig.txid(&BITCOIN);
    host.orig_txs.insert(orig_hash, orig);

    host.inputs[0].orig_hash = Some(orig_hash);
    host.inputs[0].orig_index = Some(0);

    let mut txo = external_output(48_500);
    txo.orig_hash = Some(orig_hash);
    txo.orig_index = Some(0);
    host.outputs.push(txo);

    let mut ui = TestUi::default();
    let r = sign(&mut host, &mut ui, &BITCOIN, &config, None);
    assert_eq!(r, Err(Error::UnverifiedOrigTx));
    assert!(ui.prompts.contains(&PromptKind::UnverifiedExternalInput));
    assert!(!host.finished);
}
