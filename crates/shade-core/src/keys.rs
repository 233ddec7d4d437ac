//! secp256k1 keys and ECDSA spend signatures.
//!
//! Owners are identified by their public key; commitments bind the
//! uncompressed affine coordinates `(x, y)`.

use borsh::{BorshDeserialize, BorshSerialize};
use core::fmt;
use k256::ecdsa::{signature::Signer, signature::Verifier, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, ProjectivePoint};

use crate::constants::*;
use crate::serialization::hash_fields;
use crate::types::{CoreError, Hash32};

/// Owner public key (SEC1 compressed secp256k1 point).
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct PublicKey(pub [u8; POINT_LEN]);

impl PublicKey {
    /// Public key of a signing key.
    pub fn from_signing_key(sk: &SigningKey) -> Self {
        Self::from_verifying_key(sk.verifying_key())
    }

    /// Compress a verifying key.
    pub fn from_verifying_key(vk: &VerifyingKey) -> Self {
        let ep = vk.to_encoded_point(true);
        let mut out = [0u8; POINT_LEN];
        out.copy_from_slice(ep.as_bytes());
        Self(out)
    }

    /// Decode into a verifying key.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, CoreError> {
        VerifyingKey::from_sec1_bytes(&self.0)
            .map_err(|_| CoreError::InvalidEncoding("public key"))
    }

    /// Decode into a curve point.
    pub fn to_point(&self) -> Result<ProjectivePoint, CoreError> {
        let vk = self.to_verifying_key()?;
        Ok(ProjectivePoint::from(*vk.as_affine()))
    }

    /// Affine `(x, y)` coordinates as field elements.
    pub fn coordinates(&self) -> Result<(Hash32, Hash32), CoreError> {
        point_coordinates(&self.to_point()?)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Compact ECDSA signature over a sequence of field elements.
#[derive(Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SpendSignature(pub [u8; SIGNATURE_LEN]);

impl SpendSignature {
    /// Sign `fields` with `sk`.
    pub fn create(sk: &SigningKey, fields: &[[u8; HASH32_LEN]]) -> Self {
        let msg = signing_message(fields);
        let sig: Signature = sk.sign(msg.as_bytes());
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(&sig.to_bytes());
        Self(out)
    }

    /// Verify the signature over `fields` under `signer`.
    pub fn verify(&self, signer: &PublicKey, fields: &[[u8; HASH32_LEN]]) -> Result<(), CoreError> {
        let vk = signer.to_verifying_key()?;
        let sig = Signature::from_slice(&self.0)
            .map_err(|_| CoreError::InvalidEncoding("signature"))?;
        let msg = signing_message(fields);
        vk.verify(msg.as_bytes(), &sig)
            .map_err(|_| CoreError::Verification("signature"))
    }
}

impl fmt::Debug for SpendSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpendSignature({})", hex::encode(self.0))
    }
}

/// Digest actually signed: `BLAKE3(DS_SIG_MSG || fields)`.
fn signing_message(fields: &[[u8; HASH32_LEN]]) -> Hash32 {
    hash_fields(DS_SIG_MSG, fields)
}

/// SEC1 compressed encoding of a non-identity point.
pub fn encode_point(p: &ProjectivePoint) -> Result<[u8; POINT_LEN], CoreError> {
    let ep = AffinePoint::from(*p).to_encoded_point(true);
    if ep.len() != POINT_LEN {
        return Err(CoreError::InvalidEncoding("identity point"));
    }
    let mut out = [0u8; POINT_LEN];
    out.copy_from_slice(ep.as_bytes());
    Ok(out)
}

/// Decode a SEC1 compressed point.
pub fn decode_point(bytes: &[u8; POINT_LEN]) -> Result<ProjectivePoint, CoreError> {
    k256::PublicKey::from_sec1_bytes(bytes)
        .map(|p| p.to_projective())
        .map_err(|_| CoreError::InvalidEncoding("curve point"))
}

/// Affine coordinates of a non-identity point.
pub fn point_coordinates(p: &ProjectivePoint) -> Result<(Hash32, Hash32), CoreError> {
    let ep = AffinePoint::from(*p).to_encoded_point(false);
    match (ep.x(), ep.y()) {
        (Some(x), Some(y)) => {
            let mut xs = [0u8; HASH32_LEN];
            let mut ys = [0u8; HASH32_LEN];
            xs.copy_from_slice(x);
            ys.copy_from_slice(y);
            Ok((Hash32(xs), Hash32(ys)))
        }
        _ => Err(CoreError::InvalidEncoding("identity point")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn signature_verifies_only_for_signed_fields() {
        let sk = SigningKey::random(&mut OsRng);
        let pk = PublicKey::from_signing_key(&sk);
        let fields = [Hash32([3u8; 32]).0, [4u8; 32]];
        let sig = SpendSignature::create(&sk, &fields);
        sig.verify(&pk, &fields).unwrap();

        let tampered = [Hash32([3u8; 32]).0, [5u8; 32]];
        assert!(sig.verify(&pk, &tampered).is_err());
    }

    #[test]
    fn signature_rejects_other_signer() {
        let sk = SigningKey::random(&mut OsRng);
        let other = PublicKey::from_signing_key(&SigningKey::random(&mut OsRng));
        let sig = SpendSignature::create(&sk, &[[1u8; 32]]);
        assert!(sig.verify(&other, &[[1u8; 32]]).is_err());
    }

    #[test]
    fn coordinates_match_point_roundtrip() {
        let sk = SigningKey::random(&mut OsRng);
        let pk = PublicKey::from_signing_key(&sk);
        let point = pk.to_point().unwrap();
        assert_eq!(encode_point(&point).unwrap(), pk.0);
        assert_eq!(decode_point(&pk.0).unwrap(), point);
        let (x, _y) = pk.coordinates().unwrap();
        assert_eq!(&x.0[..], &pk.0[1..]);
    }
}
