//! Canonical transaction encoding for remote signing.
//!
//! A [`TransactionRequest`] is turned into an [`UnsignedTransaction`] carrying
//! the typed transaction, its signing payload and the keccak256 digest handed
//! to the remote signer. Once the signature comes back it is attached and the
//! envelope is re-encoded in EIP-2718 form for `eth_sendRawTransaction`.

use alloy_consensus::{SignableTransaction, TxEnvelope, TypedTransaction};
use alloy_network::eip2718::{Decodable2718, Encodable2718};
use alloy_primitives::{keccak256, Address, Bytes, Signature, TxHash, B256};
use alloy_rpc_types_eth::TransactionRequest;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// Required fields were not populated before encoding
    #[error("transaction is missing required fields: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),

    /// Blob and set-code transactions cannot be signed through the bridge
    #[error("unsupported transaction type: {0}")]
    UnsupportedType(&'static str),

    /// Signature bytes could not be parsed
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Signature does not recover to the account address
    #[error("signature does not recover to {expected}")]
    SignerMismatch { expected: Address },

    /// Signed payload hashes to something other than the digest that was signed
    #[error("digest mismatch: signed {signed}, transaction hashes to {recomputed}")]
    DigestMismatch { signed: B256, recomputed: B256 },

    /// Raw bytes are not a valid transaction envelope
    #[error("invalid transaction encoding: {0}")]
    Decode(String),
}

/// A fully populated transaction ready to be signed.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    tx: TypedTransaction,
    encoded: Bytes,
    digest: B256,
}

impl UnsignedTransaction {
    /// The typed transaction.
    pub const fn transaction(&self) -> &TypedTransaction {
        &self.tx
    }

    /// Canonical signing payload.
    pub const fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// Keccak256 digest of the signing payload.
    pub const fn digest(&self) -> B256 {
        self.digest
    }
}

/// A signed transaction in broadcastable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// EIP-2718 encoded envelope
    pub raw: Bytes,
    /// Transaction hash
    pub hash: TxHash,
}

/// Encode a transaction request for signing.
///
/// Every field the signature commits to must already be set: nonce, gas limit,
/// chain id and either `gasPrice` (legacy) or both EIP-1559 fee fields. The
/// `from` field is ignored since the sender is implied by the signature.
pub fn encode_unsigned(request: TransactionRequest) -> Result<UnsignedTransaction, CodecError> {
    if request.blob_versioned_hashes.is_some() || request.sidecar.is_some() {
        return Err(CodecError::UnsupportedType("eip-4844"));
    }
    if request.authorization_list.is_some() {
        return Err(CodecError::UnsupportedType("eip-7702"));
    }

    let missing = missing_fields(&request);
    if !missing.is_empty() {
        return Err(CodecError::Incomplete(missing));
    }

    let tx = request
        .build_typed_tx()
        .map_err(|_| CodecError::Incomplete(vec!["type"]))?;

    let mut encoded = Vec::new();
    tx.encode_for_signing(&mut encoded);
    let digest = keccak256(&encoded);

    Ok(UnsignedTransaction {
        tx,
        encoded: encoded.into(),
        digest,
    })
}

fn missing_fields(request: &TransactionRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();

    if request.nonce.is_none() {
        missing.push("nonce");
    }
    if request.gas.is_none() {
        missing.push("gas");
    }
    if request.chain_id.is_none() {
        missing.push("chainId");
    }
    if request.gas_price.is_none() {
        if request.max_fee_per_gas.is_none() {
            missing.push("maxFeePerGas");
        }
        if request.max_priority_fee_per_gas.is_none() {
            missing.push("maxPriorityFeePerGas");
        }
    }

    missing
}

/// Attach a signature and produce broadcastable bytes.
pub fn attach_signature(
    unsigned: &UnsignedTransaction,
    signature: Signature,
) -> SignedTransaction {
    let envelope = TxEnvelope::from(unsigned.tx.clone().into_signed(signature));
    let raw = envelope.encoded_2718();
    let hash = keccak256(&raw);

    SignedTransaction {
        raw: raw.into(),
        hash,
    }
}

/// Decode a broadcastable transaction.
pub fn decode_signed(raw: &[u8]) -> Result<TxEnvelope, CodecError> {
    let mut buf = raw;
    TxEnvelope::decode_2718(&mut buf).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Check a signed transaction against the digest that was actually signed.
///
/// Decodes `raw`, recomputes the signing digest of its unsigned portion and
/// requires it to equal `digest`, then requires the embedded signature to
/// recover to `signer`.
pub fn verify_signed(raw: &[u8], digest: B256, signer: Address) -> Result<TxEnvelope, CodecError> {
    let envelope = decode_signed(raw)?;

    let recomputed = envelope.signature_hash();
    if recomputed != digest {
        return Err(CodecError::DigestMismatch {
            signed: digest,
            recomputed,
        });
    }

    let recovered = envelope
        .signature()
        .recover_address_from_prehash(&recomputed)
        .map_err(|e| CodecError::MalformedSignature(e.to_string()))?;
    if recovered != signer {
        return Err(CodecError::SignerMismatch { expected: signer });
    }

    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble_signature;
    use alloy_consensus::{TxEip1559, TxLegacy};
    use alloy_primitives::{address, b256, hex, TxKind, U256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    const RECIPIENT: Address = address!("3535353535353535353535353535353535353535");

    fn signer() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&b256!(
            "4646464646464646464646464646464646464646464646464646464646464646"
        ))
        .unwrap()
    }

    fn legacy_request() -> TransactionRequest {
        TransactionRequest {
            nonce: Some(9),
            gas_price: Some(20_000_000_000),
            gas: Some(21_000),
            to: Some(TxKind::Call(RECIPIENT)),
            value: Some(U256::from(1_000_000_000_000_000_000u128)),
            chain_id: Some(1),
            ..Default::default()
        }
    }

    fn eip1559_request() -> TransactionRequest {
        TransactionRequest {
            nonce: Some(5),
            max_fee_per_gas: Some(30_000_000_000),
            max_priority_fee_per_gas: Some(1_000_000_000),
            gas: Some(21_000),
            to: Some(TxKind::Call(RECIPIENT)),
            value: Some(U256::from(1_000_000_000_000_000_000u128)),
            input: Bytes::from_static(&[0xde, 0xad]).into(),
            chain_id: Some(5),
            ..Default::default()
        }
    }

    fn sign(unsigned: &UnsignedTransaction, key: &PrivateKeySigner) -> Signature {
        let signature = key.sign_hash_sync(&unsigned.digest()).unwrap();
        let mut compact = signature.r().to_be_bytes::<32>().to_vec();
        compact.extend_from_slice(&signature.s().to_be_bytes::<32>());
        assemble_signature(&compact, &unsigned.digest(), key.address()).unwrap()
    }

    #[test]
    fn test_eip155_known_vector() {
        // EIP-155 example transaction.
        let unsigned = encode_unsigned(legacy_request()).unwrap();

        assert_eq!(
            unsigned.encoded().as_ref(),
            hex!("ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080")
        );
        assert_eq!(
            unsigned.digest(),
            b256!("daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53")
        );

        let signed = attach_signature(&unsigned, sign(&unsigned, &signer()));
        assert_eq!(
            signed.raw.as_ref(),
            hex!("f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83")
        );
    }

    #[test]
    fn test_eip1559_roundtrip_preserves_fields() {
        let key = signer();
        let unsigned = encode_unsigned(eip1559_request()).unwrap();
        let signed = attach_signature(&unsigned, sign(&unsigned, &key));

        let envelope = verify_signed(&signed.raw, unsigned.digest(), key.address()).unwrap();
        let TxEnvelope::Eip1559(decoded) = envelope else {
            panic!("expected an EIP-1559 envelope");
        };

        let expected = TxEip1559 {
            chain_id: 5,
            nonce: 5,
            gas_limit: 21_000,
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
            to: TxKind::Call(RECIPIENT),
            value: U256::from(1_000_000_000_000_000_000u128),
            access_list: Default::default(),
            input: Bytes::from_static(&[0xde, 0xad]),
        };
        assert_eq!(decoded.tx(), &expected);
        assert_eq!(*decoded.hash(), signed.hash);
    }

    #[test]
    fn test_legacy_roundtrip_preserves_fields() {
        let key = signer();
        let unsigned = encode_unsigned(legacy_request()).unwrap();
        let signed = attach_signature(&unsigned, sign(&unsigned, &key));

        let TxEnvelope::Legacy(decoded) = decode_signed(&signed.raw).unwrap() else {
            panic!("expected a legacy envelope");
        };
        let expected = TxLegacy {
            chain_id: Some(1),
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: TxKind::Call(RECIPIENT),
            value: U256::from(1_000_000_000_000_000_000u128),
            input: Bytes::new(),
        };
        assert_eq!(decoded.tx(), &expected);
    }

    #[test]
    fn test_digest_matches_signature_hash() {
        let unsigned = encode_unsigned(eip1559_request()).unwrap();
        assert_eq!(unsigned.digest(), unsigned.transaction().signature_hash());
    }

    #[test]
    fn test_from_field_does_not_affect_digest() {
        let plain = encode_unsigned(eip1559_request()).unwrap();
        let with_from = encode_unsigned(TransactionRequest {
            from: Some(Address::repeat_byte(0x42)),
            ..eip1559_request()
        })
        .unwrap();

        assert_eq!(plain.digest(), with_from.digest());
    }

    #[test]
    fn test_incomplete_transaction_rejected() {
        let request = TransactionRequest {
            to: Some(TxKind::Call(RECIPIENT)),
            value: Some(U256::from(1)),
            ..Default::default()
        };

        let Err(CodecError::Incomplete(missing)) = encode_unsigned(request) else {
            panic!("expected incomplete error");
        };
        assert_eq!(
            missing,
            vec!["nonce", "gas", "chainId", "maxFeePerGas", "maxPriorityFeePerGas"]
        );
    }

    #[test]
    fn test_blob_transaction_rejected() {
        let request = TransactionRequest {
            blob_versioned_hashes: Some(vec![B256::ZERO]),
            ..eip1559_request()
        };
        assert!(matches!(
            encode_unsigned(request),
            Err(CodecError::UnsupportedType("eip-4844"))
        ));
    }

    #[test]
    fn test_verify_rejects_foreign_digest() {
        let key = signer();
        let unsigned = encode_unsigned(eip1559_request()).unwrap();
        let signed = attach_signature(&unsigned, sign(&unsigned, &key));

        let other = encode_unsigned(TransactionRequest {
            nonce: Some(6),
            ..eip1559_request()
        })
        .unwrap();

        let result = verify_signed(&signed.raw, other.digest(), key.address());
        assert!(matches!(result, Err(CodecError::DigestMismatch { .. })));
    }

    #[test]
    fn test_verify_rejects_wrong_signer() {
        let key = signer();
        let unsigned = encode_unsigned(eip1559_request()).unwrap();
        let signed = attach_signature(&unsigned, sign(&unsigned, &key));

        let result = verify_signed(&signed.raw, unsigned.digest(), Address::repeat_byte(0x01));
        assert!(matches!(result, Err(CodecError::SignerMismatch { .. })));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_signed(&[0x02, 0xff]),
            Err(CodecError::Decode(_))
        ));
    }
}
