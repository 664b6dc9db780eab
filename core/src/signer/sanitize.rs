// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Host data sanitation, applied to every message before use

use crate::{
    coin::CoinInfo,
    helpers::multisig,
    msg::{InputScriptType, OutputScriptType, PrevTx, SignTx, TxInput, TxOutput},
    Error,
};

/// Maximum OP_RETURN payload
pub const MAX_OP_RETURN_LEN: usize = 80;

fn fail(e: Error, _msg: &str) -> Result<(), Error> {
    #[cfg(feature = "log")]
    log::error!("sanitation failed: {}", _msg);

    Err(e)
}

/// Check a signing request
pub fn sanitize_sign_tx(tx: &SignTx, coin: &CoinInfo) -> Result<(), Error> {
    if tx.coin_name != coin.name {
        return fail(Error::UnknownCoin, "coin name mismatch");
    }
    if tx.inputs_count == 0 || tx.outputs_count == 0 {
        return fail(Error::EmptyTransaction, "no inputs or outputs");
    }
    Ok(())
}

/// Check a previous transaction header
pub fn sanitize_prev_tx(tx: &PrevTx) -> Result<(), Error> {
    if tx.outputs_count == 0 {
        return fail(Error::MissingField, "previous transaction has no outputs");
    }
    Ok(())
}

/// Check an input of the transaction being signed
pub fn sanitize_tx_input(txi: &TxInput, coin: &CoinInfo) -> Result<(), Error> {
    let t = txi.script_type;

    if let Some(m) = &txi.multisig {
        if !t.allows_multisig() {
            return fail(Error::UnexpectedField, "multisig with non-multisig script type");
        }
        multisig::validate(m)?;
    } else if t == InputScriptType::SpendMultisig {
        return fail(Error::MissingField, "multisig input without descriptor");
    }

    if t.is_internal() {
        if txi.address_n.is_empty() {
            return fail(Error::MissingField, "internal input without path");
        }
        if txi.script_pubkey.is_some() || txi.script_sig.is_some() || txi.witness.is_some() {
            return fail(Error::UnexpectedField, "internal input with scripts");
        }
    } else {
        if !txi.address_n.is_empty() {
            return fail(Error::UnexpectedField, "external input with path");
        }
        if txi.script_pubkey.is_none() {
            return fail(Error::MissingField, "external input without script_pubkey");
        }
    }

    if t.is_segwit() && !coin.segwit() {
        return fail(Error::SegwitDisabled, "segwit input");
    }
    if t == InputScriptType::SpendTaproot && !coin.taproot() {
        return fail(Error::TaprootDisabled, "taproot input");
    }

    if txi.orig_hash.is_some() != txi.orig_index.is_some() {
        return fail(Error::MissingField, "incomplete original input reference");
    }

    Ok(())
}

/// Check an output of the transaction being signed
pub fn sanitize_tx_output(txo: &TxOutput, coin: &CoinInfo) -> Result<(), Error> {
    let t = txo.script_type;

    if let Some(m) = &txo.multisig {
        if !t.allows_multisig() {
            return fail(Error::UnexpectedField, "multisig with non-multisig script type");
        }
        multisig::validate(m)?;
    } else if t == OutputScriptType::PayToMultisig {
        return fail(Error::MissingField, "multisig output without descriptor");
    }

    if !txo.address_n.is_empty() && t.change_input_type().is_none() {
        return fail(Error::UnexpectedField, "path with non-change script type");
    }

    if t == OutputScriptType::PayToOpReturn {
        let data = match &txo.op_return_data {
            Some(d) => d,
            None => return fail(Error::InvalidOpReturn, "missing OP_RETURN data"),
        };
        if data.len() > MAX_OP_RETURN_LEN {
            return fail(Error::InvalidOpReturn, "OP_RETURN data too long");
        }
        if txo.amount != 0 {
            return fail(Error::InvalidOpReturn, "OP_RETURN output with non-zero amount");
        }
        if txo.address.is_some() || !txo.address_n.is_empty() || txo.multisig.is_some() {
            return fail(Error::InvalidOpReturn, "OP_RETURN output with destination");
        }
    } else {
        if txo.op_return_data.is_some() {
            return fail(Error::UnexpectedField, "OP_RETURN data on non OP_RETURN output");
        }
        if txo.address.is_some() == !txo.address_n.is_empty() {
            return fail(Error::MissingField, "output requires exactly one of address or path");
        }
    }

    if !txo.address_n.is_empty() {
        let change_type = t.change_input_type().unwrap_or_default();
        if change_type.is_segwit() && !coin.segwit() {
            return fail(Error::SegwitDisabled, "segwit change output");
        }
        if change_type == InputScriptType::SpendTaproot && !coin.taproot() {
            return fail(Error::TaprootDisabled, "taproot change output");
        }
    }

    if txo.orig_hash.is_some() != txo.orig_index.is_some() {
        return fail(Error::MissingField, "incomplete original output reference");
    }

    Ok(())
}
