// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Signing session configuration

use heapless::Vec;

/// Safety check level applied to policy decisions
#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SafetyCheckLevel {
    /// Fail closed on unverifiable inputs and excessive fees
    #[default]
    Strict,
    /// Prompt instead of failing
    PromptAlways,
    /// Prompt instead of failing, until the device restarts
    PromptTemporarily,
}

impl SafetyCheckLevel {
    pub fn is_strict(&self) -> bool {
        *self == SafetyCheckLevel::Strict
    }
}

/// [Signer][crate::signer::Signer] configuration
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignerConfig {
    /// Safety check level
    pub safety_checks: SafetyCheckLevel,

    /// Compressed public key trusted to sign payment requests,
    /// payment requests are rejected when unset
    pub payment_request_key: Option<Vec<u8, 33>>,
}

impl SignerConfig {
    /// Create a strict configuration with no payment request key
    pub const fn new() -> Self {
        Self {
            safety_checks: SafetyCheckLevel::Strict,
            payment_request_key: None,
        }
    }
}
