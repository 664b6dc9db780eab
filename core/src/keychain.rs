// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Key derivation collaborator and signing keys

use heapless::Vec;
use secp256k1::{All, Keypair, Message, PublicKey, Scalar, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::{
    helpers::{hash160, paths::MAX_PATH_DEPTH, tagged_hash},
    msg::MAX_SIGNATURE_LEN,
    Error,
};

/// [`Keychain`] trait provides platform key derivation for [`Signer`][crate::signer::Signer] instances
pub trait Keychain {
    /// BIP-0032 derivation of secp256k1 private keys
    fn derive(&self, path: &[u32]) -> Result<Zeroizing<[u8; 32]>, Error>;
}

impl<T: Keychain> Keychain for &T {
    fn derive(&self, path: &[u32]) -> Result<Zeroizing<[u8; 32]>, Error> {
        T::derive(self, path)
    }
}

/// Derived signing key, erased on drop
pub struct SigningKey {
    secret: SecretKey,
    public: PublicKey,
}

impl SigningKey {
    /// Derive the signing key for a path
    pub fn derive<K: Keychain>(
        secp: &Secp256k1<All>,
        keychain: &K,
        path: &[u32],
    ) -> Result<Self, Error> {
        if path.is_empty() || path.len() > MAX_PATH_DEPTH {
            return Err(Error::InvalidPath);
        }

        let raw = keychain.derive(path)?;
        let secret = SecretKey::from_slice(raw.as_ref())?;
        let public = PublicKey::from_secret_key(secp, &secret);

        Ok(Self { secret, public })
    }

    /// Compressed public key
    pub fn public_key(&self) -> [u8; 33] {
        self.public.serialize()
    }

    /// HASH160 of the compressed public key
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public_key())
    }

    /// BIP-0086 tweaked keypair for key-path spends without a script tree
    fn tweaked_keypair(&self, secp: &Secp256k1<All>) -> Result<Keypair, Error> {
        let keypair = Keypair::from_secret_key(secp, &self.secret);
        let (internal, _parity) = keypair.x_only_public_key();

        let t = tagged_hash(b"TapTweak", &internal.serialize());
        let tweak = Scalar::from_be_bytes(t).map_err(|_| Error::InvalidKey)?;

        Ok(keypair.add_xonly_tweak(secp, &tweak)?)
    }

    /// Taproot output key (x-only)
    pub fn taproot_output_key(&self, secp: &Secp256k1<All>) -> Result<[u8; 32], Error> {
        let (output, _parity) = self.tweaked_keypair(secp)?.x_only_public_key();
        Ok(output.serialize())
    }

    /// Deterministic (RFC-6979) ECDSA signature, DER encoded
    pub fn sign_ecdsa(
        &self,
        secp: &Secp256k1<All>,
        digest: &[u8; 32],
    ) -> Result<Vec<u8, MAX_SIGNATURE_LEN>, Error> {
        let msg = Message::from_digest(*digest);
        let sig = secp.sign_ecdsa(&msg, &self.secret);

        Vec::from_slice(&sig.serialize_der()).map_err(|_| Error::SignError)
    }

    /// BIP-0340 signature with the tweaked key, without auxiliary randomness
    pub fn sign_taproot(
        &self,
        secp: &Secp256k1<All>,
        digest: &[u8; 32],
    ) -> Result<Vec<u8, MAX_SIGNATURE_LEN>, Error> {
        let keypair = self.tweaked_keypair(secp)?;
        let msg = Message::from_digest(*digest);
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &keypair);

        Vec::from_slice(&sig.serialize()).map_err(|_| Error::SignError)
    }
}

impl Drop for SigningKey {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

#[cfg(test)]
mod test {
    use secp256k1::{ecdsa, schnorr, XOnlyPublicKey};

    use super::*;
    use crate::helpers::sha256;

    struct StaticKeychain;

    impl Keychain for StaticKeychain {
        fn derive(&self, path: &[u32]) -> Result<Zeroizing<[u8; 32]>, Error> {
            let mut b = [0u8; 32];
            b[31] = path.len() as u8;
            Ok(Zeroizing::new(b))
        }
    }

    #[test]
    fn path_bounds() {
        let secp = Secp256k1::new();

        assert!(SigningKey::derive(&secp, &StaticKeychain, &[]).is_err());
        assert!(SigningKey::derive(&secp, &StaticKeychain, &[0; MAX_PATH_DEPTH + 1]).is_err());
        assert!(SigningKey::derive(&secp, &StaticKeychain, &[0; 5]).is_ok());
    }

    #[test]
    fn signatures_verify() {
        let secp = Secp256k1::new();
        let k = SigningKey::derive(&secp, &StaticKeychain, &[1, 2, 3]).unwrap();
        let digest = sha256(b"message");
        let msg = Message::from_digest(digest);

        let der = k.sign_ecdsa(&secp, &digest).unwrap();
        let sig = ecdsa::Signature::from_der(&der).unwrap();
        let pk = PublicKey::from_slice(&k.public_key()).unwrap();
        secp.verify_ecdsa(&msg, &sig, &pk).unwrap();

        // ECDSA signing is deterministic
        assert_eq!(der, k.sign_ecdsa(&secp, &digest).unwrap());

        let raw = k.sign_taproot(&secp, &digest).unwrap();
        let sig = schnorr::Signature::from_slice(&raw).unwrap();
        let output = XOnlyPublicKey::from_slice(&k.taproot_output_key(&secp).unwrap()).unwrap();
        secp.verify_schnorr(&sig, &msg, &output).unwrap();
    }
}
