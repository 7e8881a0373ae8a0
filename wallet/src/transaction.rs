//! Transfer requests, receipts and the legacy (EIP-155) transaction codec.

use primitive_types::{H256, U256};
use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crypto::hashes::keccak256;
use crypto::secp256k1::{Secp256k1SecretKey, Secp256k1Signature};
use crypto::traits::RecoverableSignature;

use crate::address::Address;
use crate::error::WalletError;
use crate::quantity::{option_bytes_hex, option_u64_hex, status, u64_hex};

/// Intrinsic gas of a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;
const ZERO_BYTE_GAS: u64 = 4;
const NONZERO_BYTE_GAS: u64 = 16;

const PRE_EIP155_V_OFFSET: u64 = 27;
const EIP155_V_OFFSET: u64 = 35;

pub fn intrinsic_gas(data: &[u8]) -> u64 {
    data.iter().fold(TRANSFER_GAS, |acc, byte| {
        acc + if *byte == 0 {
            ZERO_BYTE_GAS
        } else {
            NONZERO_BYTE_GAS
        }
    })
}

/// A value transfer between two accounts. Fixed once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    from: Address,
    to: Address,
    value_wei: U256,
    gas_limit: u64,
}

impl TransferRequest {
    pub fn new(from: Address, to: Address, value_wei: U256, gas_limit: u64) -> Self {
        Self {
            from,
            to,
            value_wei,
            gas_limit,
        }
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn to(&self) -> Address {
        self.to
    }

    pub fn value_wei(&self) -> U256 {
        self.value_wei
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn to_wire(&self) -> TransactionRequest {
        TransactionRequest {
            from: self.from,
            to: Some(self.to),
            value: Some(self.value_wei),
            gas: Some(self.gas_limit),
            ..TransactionRequest::from_sender(self.from)
        }
    }
}

/// `eth_sendTransaction` / `eth_signTransaction` parameter object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_u64_hex"
    )]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_u64_hex"
    )]
    pub nonce: Option<u64>,
    #[serde(
        default,
        alias = "input",
        skip_serializing_if = "Option::is_none",
        with = "option_bytes_hex"
    )]
    pub data: Option<Vec<u8>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_u64_hex"
    )]
    pub chain_id: Option<u64>,
}

impl TransactionRequest {
    pub fn from_sender(from: Address) -> Self {
        Self {
            from,
            to: None,
            value: None,
            gas: None,
            gas_price: None,
            nonce: None,
            data: None,
            chain_id: None,
        }
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Builds the signable transaction once nonce, gas price and gas are known.
    pub fn to_legacy(&self, chain_id: Option<u64>) -> Result<LegacyTransaction, WalletError> {
        Ok(LegacyTransaction {
            nonce: self
                .nonce
                .ok_or(WalletError::InvalidArgument("transaction nonce missing"))?,
            gas_price: self
                .gas_price
                .ok_or(WalletError::InvalidArgument("transaction gas price missing"))?,
            gas_limit: self
                .gas
                .ok_or(WalletError::InvalidArgument("transaction gas limit missing"))?,
            to: self.to,
            value: self.value.unwrap_or_default(),
            data: self.data().to_vec(),
            chain_id,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    /// `None` signs without replay protection.
    pub chain_id: Option<u64>,
}

impl LegacyTransaction {
    fn append_payload(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        match self.to {
            Some(to) => stream.append(&to.as_bytes().to_vec()),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data);
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        match self.chain_id {
            Some(chain_id) => {
                let mut stream = RlpStream::new_list(9);
                self.append_payload(&mut stream);
                stream.append(&chain_id);
                stream.append_empty_data();
                stream.append_empty_data();
                stream.out().to_vec()
            }
            None => {
                let mut stream = RlpStream::new_list(6);
                self.append_payload(&mut stream);
                stream.out().to_vec()
            }
        }
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    pub fn sign(self, secret: &Secp256k1SecretKey) -> Result<SignedTransaction, WalletError> {
        let signature = secret.sign_prehash(&self.signing_hash())?;
        let recovery = u64::from(signature.recovery_id());
        let v = match self.chain_id {
            Some(chain_id) => chain_id
                .checked_mul(2)
                .and_then(|doubled| doubled.checked_add(EIP155_V_OFFSET + recovery))
                .ok_or(WalletError::InvalidArgument("chain id too large for EIP-155"))?,
            None => recovery + PRE_EIP155_V_OFFSET,
        };
        Ok(SignedTransaction {
            transaction: self,
            v,
            r: signature.r(),
            s: signature.s(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: LegacyTransaction,
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn left_pad_32(bytes: &[u8]) -> Result<[u8; 32], WalletError> {
    if bytes.len() > 32 {
        return Err(WalletError::Serialization(format!(
            "signature scalar is {} bytes",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

impl SignedTransaction {
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.transaction.append_payload(&mut stream);
        stream.append(&self.v);
        stream.append(&trim_leading_zeros(&self.r));
        stream.append(&trim_leading_zeros(&self.s));
        stream.out().to_vec()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WalletError> {
        let rlp = Rlp::new(raw);
        if !rlp.is_list() || rlp.item_count()? != 9 {
            return Err(WalletError::Serialization(
                "legacy transaction must be a 9 item list".into(),
            ));
        }
        let to_bytes: Vec<u8> = rlp.val_at(3)?;
        let to = if to_bytes.is_empty() {
            None
        } else {
            Some(Address::from_slice(&to_bytes)?)
        };
        let v: u64 = rlp.val_at(6)?;
        let chain_id = match v {
            27 | 28 => None,
            v if v >= EIP155_V_OFFSET => Some((v - EIP155_V_OFFSET) / 2),
            other => {
                return Err(WalletError::Serialization(format!(
                    "invalid signature v value {other}"
                )))
            }
        };
        let r: Vec<u8> = rlp.val_at(7)?;
        let s: Vec<u8> = rlp.val_at(8)?;
        Ok(Self {
            transaction: LegacyTransaction {
                nonce: rlp.val_at(0)?,
                gas_price: rlp.val_at(1)?,
                gas_limit: rlp.val_at(2)?,
                to,
                value: rlp.val_at(4)?,
                data: rlp.val_at(5)?,
                chain_id,
            },
            v,
            r: left_pad_32(&r)?,
            s: left_pad_32(&s)?,
        })
    }

    pub fn hash(&self) -> H256 {
        H256::from(keccak256(&self.encode()))
    }

    pub fn recovery_id(&self) -> u8 {
        let parity = match self.transaction.chain_id {
            Some(_) => (self.v - EIP155_V_OFFSET) % 2,
            None => self.v - PRE_EIP155_V_OFFSET,
        };
        parity as u8
    }

    pub fn recover_sender(&self) -> Result<Address, WalletError> {
        let signature = Secp256k1Signature::from_parts(self.r, self.s, self.recovery_id())?;
        let public = signature.recover(&self.transaction.signing_hash())?;
        Ok(Address::from_public_key(&public))
    }
}

/// Mined transaction receipt as reported by `eth_getTransactionReceipt`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    #[serde(with = "status")]
    pub status: bool,
    pub transaction_hash: H256,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default, with = "option_u64_hex")]
    pub block_number: Option<u64>,
    #[serde(default, with = "option_u64_hex")]
    pub transaction_index: Option<u64>,
    #[serde(default, with = "option_u64_hex")]
    pub gas_used: Option<u64>,
    #[serde(default, with = "option_u64_hex")]
    pub cumulative_gas_used: Option<u64>,
    #[serde(default)]
    pub effective_gas_price: Option<U256>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Value>,
}

impl TransferReceipt {
    /// Wei paid for gas, when the node reports both factors.
    pub fn gas_cost(&self) -> Option<U256> {
        Some(U256::from(self.gas_used?) * self.effective_gas_price?)
    }
}

/// Transaction object as returned by `eth_getTransactionByHash`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub hash: H256,
    #[serde(with = "u64_hex")]
    pub nonce: u64,
    pub block_hash: Option<H256>,
    #[serde(default, with = "option_u64_hex")]
    pub block_number: Option<u64>,
    #[serde(default, with = "option_u64_hex")]
    pub transaction_index: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: U256,
    #[serde(with = "u64_hex")]
    pub gas: u64,
    #[serde(with = "crate::quantity::option_bytes_hex")]
    pub input: Option<Vec<u8>>,
}
