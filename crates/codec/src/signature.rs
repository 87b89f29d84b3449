//! Assembly of remote-signer output into Ethereum signatures.
//!
//! Threshold ECDSA services return the bare `r || s` pair. Ethereum needs the
//! y-parity as well, which is recovered here by checking which parity yields
//! the expected signer address for the digest.

use crate::CodecError;
use alloy_primitives::{Address, Signature, B256, U256};

/// Turn a raw signature over `digest` into a recoverable [`Signature`] that
/// recovers to `signer`.
///
/// Accepts the 64-byte compact form (`r || s`) and the 65-byte form
/// (`r || s || v`). The high-s half is normalized away first. Fails when the
/// bytes are malformed or no parity recovers to `signer`.
pub fn assemble_signature(
    raw: &[u8],
    digest: &B256,
    signer: Address,
) -> Result<Signature, CodecError> {
    let candidates = match raw.len() {
        64 => {
            let r = U256::from_be_slice(&raw[..32]);
            let s = U256::from_be_slice(&raw[32..]);
            let base = Signature::new(r, s, false).normalized_s();
            [base, base.with_parity(!base.v())]
        }
        65 => {
            let parsed =
                Signature::from_raw(raw).map_err(|e| CodecError::MalformedSignature(e.to_string()))?;
            let normalized = parsed.normalized_s();
            [normalized, normalized]
        }
        len => {
            return Err(CodecError::MalformedSignature(format!(
                "expected 64 or 65 bytes, got {len}"
            )))
        }
    };

    if candidates[0].r().is_zero() || candidates[0].s().is_zero() {
        return Err(CodecError::MalformedSignature("zero scalar".to_string()));
    }

    candidates
        .into_iter()
        .find(|candidate| {
            candidate
                .recover_address_from_prehash(digest)
                .is_ok_and(|recovered| recovered == signer)
        })
        .ok_or(CodecError::SignerMismatch { expected: signer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{b256, keccak256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    fn signer() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&b256!(
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        ))
        .unwrap()
    }

    fn compact(signature: &Signature) -> Vec<u8> {
        let mut out = signature.r().to_be_bytes::<32>().to_vec();
        out.extend_from_slice(&signature.s().to_be_bytes::<32>());
        out
    }

    #[test]
    fn test_recovers_parity_from_compact_form() {
        let key = signer();

        // Different digests exercise both parities.
        for i in 0u8..8 {
            let digest = keccak256([i]);
            let expected = key.sign_hash_sync(&digest).unwrap();

            let assembled = assemble_signature(&compact(&expected), &digest, key.address()).unwrap();

            assert_eq!(assembled, expected);
            assert_eq!(
                assembled.recover_address_from_prehash(&digest).unwrap(),
                key.address()
            );
        }
    }

    #[test]
    fn test_accepts_full_form() {
        let key = signer();
        let digest = keccak256(b"full form");
        let expected = key.sign_hash_sync(&digest).unwrap();

        let assembled = assemble_signature(&expected.as_bytes(), &digest, key.address()).unwrap();
        assert_eq!(assembled, expected);
    }

    #[test]
    fn test_normalizes_high_s() {
        let key = signer();
        let digest = keccak256(b"high s");
        let low = key.sign_hash_sync(&digest).unwrap();

        // Flip to the equivalent high-s form the way a non-normalizing signer might.
        let order = U256::from_be_bytes(alloy_primitives::hex!(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141"
        ));
        let mut raw = low.r().to_be_bytes::<32>().to_vec();
        raw.extend_from_slice(&(order - low.s()).to_be_bytes::<32>());

        let assembled = assemble_signature(&raw, &digest, key.address()).unwrap();
        assert_eq!(assembled, low);
    }

    #[test]
    fn test_rejects_wrong_signer() {
        let key = signer();
        let digest = keccak256(b"someone else");
        let signature = key.sign_hash_sync(&digest).unwrap();

        let result = assemble_signature(&compact(&signature), &digest, Address::repeat_byte(0x11));
        assert!(matches!(result, Err(CodecError::SignerMismatch { .. })));
    }

    #[test]
    fn test_rejects_signature_over_other_digest() {
        let key = signer();
        let signed = keccak256(b"signed digest");
        let other = keccak256(b"other digest");
        let signature = key.sign_hash_sync(&signed).unwrap();

        let result = assemble_signature(&compact(&signature), &other, key.address());
        assert!(matches!(result, Err(CodecError::SignerMismatch { .. })));
    }

    #[test]
    fn test_rejects_malformed_lengths() {
        let digest = keccak256(b"x");
        for len in [0usize, 32, 63, 66] {
            let result = assemble_signature(&vec![1u8; len], &digest, Address::ZERO);
            assert!(matches!(result, Err(CodecError::MalformedSignature(_))));
        }
    }

    #[test]
    fn test_rejects_zero_scalars() {
        let digest = keccak256(b"zero");
        let result = assemble_signature(&[0u8; 64], &digest, Address::ZERO);
        assert!(matches!(result, Err(CodecError::MalformedSignature(_))));
    }
}
