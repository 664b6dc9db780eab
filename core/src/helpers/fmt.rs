// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Amount formatting for confirmation prompts

use core::str::from_utf8;

use emstr::{helpers::Fractional, EncodeStr};

use crate::{coin::CoinInfo, msg::AmountUnit};

/// Maximum significant characters before truncation
const MAX_SF: usize = 16;

/// Scale and suffix for a display unit
fn unit_info(coin: &CoinInfo, unit: AmountUnit) -> (i64, u8) {
    let decimals = coin.decimals as u32;

    match unit {
        AmountUnit::Bitcoin => (10i64.pow(decimals), b' '),
        AmountUnit::MilliBitcoin => (10i64.pow(decimals.saturating_sub(3)), b'm'),
        AmountUnit::MicroBitcoin => (10i64.pow(decimals.saturating_sub(6)), b'u'),
        AmountUnit::Satoshi => (1, b's'),
    }
}

/// Format an amount in satoshi for display in the provided unit
pub fn fmt_amount<'a>(value: i64, coin: &CoinInfo, unit: AmountUnit, buff: &'a mut [u8]) -> &'a str {
    let (scalar, prefix) = unit_info(coin, unit);

    // Compute and write value using scalar
    let mut n = match emstr::write!(&mut buff[..], Fractional::<i64>::new(value, scalar)) {
        Ok(v) => v,
        Err(_) => return "ENCODE_ERR",
    };

    // Backtrack and truncate values if max chars is exceeded
    if n > MAX_SF {
        n = MAX_SF;
        buff[n] = b'.';
        buff[n + 1] = b'.';
        n += 2;
    }

    // Write unit
    let r = match prefix {
        b's' => emstr::write!(&mut buff[n..], " sat"),
        b' ' => emstr::write!(&mut buff[n..], ' ', coin.shortcut),
        p => emstr::write!(&mut buff[n..], ' ', p as char, coin.shortcut),
    };
    match r {
        Ok(v) => n += v,
        Err(_) => return "ENCODE_ERR",
    }

    match from_utf8(&buff[..n]) {
        Ok(v) => v,
        Err(_) => "INVALID_UTF8",
    }
}
