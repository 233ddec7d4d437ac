//! Leaf commitments, nullifier keys and deterministic nullifier authorizations.
//!
//! A nullifier authorization proves, without revealing the secret key, that
//! `N = sk * H2C(message || pk)` for the owner `pk`. `N` is unique per
//! `(sk, message)`, which is what makes it usable as a spend tag.

use borsh::{BorshDeserialize, BorshSerialize};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, NonZeroScalar, ProjectivePoint, Scalar, Secp256k1, U256};
use rand_core::OsRng;
use sha2::Sha256;

use crate::constants::*;
use crate::keys::{decode_point, encode_point, point_coordinates, PublicKey};
use crate::serialization::{hash32, hash_fields};
use crate::types::{Amount, CoreError, Hash32, Nonce};

/// Account leaf commitment: `H(ownerX, ownerY, balance)`.
pub fn account_leaf(owner: &PublicKey, balance: Amount) -> Result<Hash32, CoreError> {
    let (x, y) = owner.coordinates()?;
    Ok(hash_fields(DS_ACCOUNT_LEAF, &[x.0, y.0, balance.to_field()]))
}

/// UTXO leaf commitment: `H(ownerX, ownerY, amount, nonce)`.
pub fn utxo_leaf(owner: &PublicKey, amount: Amount, nonce: &Nonce) -> Result<Hash32, CoreError> {
    let (x, y) = owner.coordinates()?;
    Ok(hash_fields(
        DS_UTXO_LEAF,
        &[x.0, y.0, amount.to_field(), nonce.0],
    ))
}

/// Nullifier map key: `H(nullifierX, nullifierY, utxoIndex)`.
///
/// Binds one spend authorization to one UTXO slot.
pub fn nullifier_key(auth: &NullifierAuth, utxo_index: u64) -> Result<Hash32, CoreError> {
    let (x, y) = auth.point_coordinates()?;
    Ok(hash_fields(
        DS_NULLIFIER_KEY,
        &[x.0, y.0, Hash32::from_u64(utxo_index).0],
    ))
}

/// Deterministic nullifier with its Chaum-Pedersen proof.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct NullifierAuth {
    /// Key the nullifier was derived under.
    pub public_key: PublicKey,
    /// Nullifier point `N = sk * Hm`, compressed.
    pub point: [u8; POINT_LEN],
    /// Proof challenge.
    pub c: [u8; HASH32_LEN],
    /// Proof response.
    pub s: [u8; HASH32_LEN],
}

impl NullifierAuth {
    /// Derive the nullifier for `message` under `sk` and prove it.
    pub fn create(sk: &SigningKey, message: &Hash32) -> Result<Self, CoreError> {
        let public_key = PublicKey::from_signing_key(sk);
        let pk_point = public_key.to_point()?;
        let secret: Scalar = **sk.as_nonzero_scalar();

        let hm = message_point(message, &public_key)?;
        let n = hm * secret;

        let r: Scalar = *NonZeroScalar::random(&mut OsRng);
        let a = ProjectivePoint::GENERATOR * r;
        let b = hm * r;
        let c = challenge(&pk_point, &hm, &n, &a, &b)?;
        let s = r + secret * c;

        Ok(Self {
            public_key,
            point: encode_point(&n)?,
            c: scalar_bytes(&c),
            s: scalar_bytes(&s),
        })
    }

    /// Check the proof against `message`.
    pub fn verify(&self, message: &Hash32) -> Result<(), CoreError> {
        let pk_point = self.public_key.to_point()?;
        let n = decode_point(&self.point)?;
        let c = decode_scalar(&self.c)?;
        let s = decode_scalar(&self.s)?;
        let hm = message_point(message, &self.public_key)?;

        let a = ProjectivePoint::GENERATOR * s - pk_point * c;
        let b = hm * s - n * c;
        if challenge(&pk_point, &hm, &n, &a, &b)? != c {
            return Err(CoreError::Verification("nullifier proof"));
        }
        Ok(())
    }

    /// Affine coordinates of the nullifier point.
    pub fn point_coordinates(&self) -> Result<(Hash32, Hash32), CoreError> {
        point_coordinates(&decode_point(&self.point)?)
    }
}

/// `Hm = hash_to_curve(message || pk)`.
fn message_point(message: &Hash32, pk: &PublicKey) -> Result<ProjectivePoint, CoreError> {
    Secp256k1::hash_from_bytes::<ExpandMsgXmd<Sha256>>(
        &[&message.0[..], &pk.0[..]],
        &[DS_NULLIFIER_H2C],
    )
    .map_err(|_| CoreError::InvalidValue("hash to curve failed"))
}

fn challenge(
    pk: &ProjectivePoint,
    hm: &ProjectivePoint,
    n: &ProjectivePoint,
    a: &ProjectivePoint,
    b: &ProjectivePoint,
) -> Result<Scalar, CoreError> {
    let mut transcript = Vec::with_capacity(6 * POINT_LEN);
    for p in [&ProjectivePoint::GENERATOR, pk, hm, n, a, b] {
        transcript.extend_from_slice(&encode_point(p)?);
    }
    let digest = hash32(DS_NULLIFIER_CHALLENGE, &transcript);
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(
        digest.0,
    )))
}

fn scalar_bytes(s: &Scalar) -> [u8; HASH32_LEN] {
    let mut out = [0u8; HASH32_LEN];
    out.copy_from_slice(&s.to_bytes());
    out
}

fn decode_scalar(bytes: &[u8; HASH32_LEN]) -> Result<Scalar, CoreError> {
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*bytes)))
        .ok_or(CoreError::InvalidEncoding("scalar"))
}
