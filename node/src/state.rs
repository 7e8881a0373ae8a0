//! In-memory ledger with automine: every accepted transaction is sealed into
//! its own block before the submitting call returns.

use std::collections::HashMap;
use std::sync::Arc;

use crypto::hashes::keccak256_concat;
use crypto::secp256k1::Secp256k1SecretKey;
use parking_lot::Mutex;
use primitive_types::{H256, U256};
use tracing::{debug, info};
use wallet::transaction::{
    intrinsic_gas, SignedTransaction, TransactionRequest, TransactionView, TransferReceipt,
};
use wallet::Address;

use crate::config::ChainConfig;
use crate::error::{NodeError, NodeResult};
use crate::telemetry::Telemetry;

/// Gas limit applied to `eth_sendTransaction` calls that omit one.
pub const DEFAULT_TRANSACTION_GAS: u64 = 90_000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub number: u64,
    pub hash: H256,
    pub parent_hash: H256,
    pub transactions: Vec<H256>,
}

impl Block {
    fn seal(number: u64, parent_hash: H256, transactions: Vec<H256>) -> Self {
        let number_bytes = number.to_be_bytes();
        let mut parts: Vec<&[u8]> = vec![parent_hash.as_bytes(), &number_bytes[..]];
        parts.extend(transactions.iter().map(|hash| hash.as_bytes()));
        Self {
            number,
            hash: H256::from(keccak256_concat(&parts)),
            parent_hash,
            transactions,
        }
    }
}

#[derive(Clone, Debug)]
struct MinedTransaction {
    signed: SignedTransaction,
    from: Address,
    receipt: TransferReceipt,
}

#[derive(Debug)]
struct Ledger {
    accounts: HashMap<Address, Account>,
    blocks: Vec<Block>,
    transactions: HashMap<H256, MinedTransaction>,
}

impl Ledger {
    fn account(&self, address: &Address) -> Account {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    fn head(&self) -> &Block {
        // genesis is pushed at construction
        &self.blocks[self.blocks.len() - 1]
    }
}

#[derive(Debug)]
pub struct ChainState {
    inner: Mutex<Ledger>,
    custodied: Vec<Address>,
    keys: HashMap<Address, Secp256k1SecretKey>,
    network_id: u64,
    chain_id: u64,
    gas_price: U256,
    block_gas_limit: u64,
    locked: bool,
    telemetry: Arc<Telemetry>,
}

impl ChainState {
    pub fn new(config: &ChainConfig, telemetry: Arc<Telemetry>) -> Self {
        let mut accounts = HashMap::new();
        let mut custodied = Vec::with_capacity(config.accounts.len());
        let mut keys = HashMap::new();
        for genesis in &config.accounts {
            let address = genesis.address();
            accounts.insert(
                address,
                Account {
                    balance: genesis.balance,
                    nonce: 0,
                },
            );
            custodied.push(address);
            keys.insert(address, genesis.secret.clone());
        }
        let genesis = Block::seal(0, H256::zero(), Vec::new());
        Self {
            inner: Mutex::new(Ledger {
                accounts,
                blocks: vec![genesis],
                transactions: HashMap::new(),
            }),
            custodied,
            keys,
            network_id: config.network_id,
            chain_id: config.chain_id,
            gas_price: config.gas_price,
            block_gas_limit: config.block_gas_limit,
            locked: config.locked,
            telemetry,
        }
    }

    pub fn network_id(&self) -> u64 {
        self.network_id
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn gas_price(&self) -> U256 {
        self.gas_price
    }

    /// Custodied accounts in genesis order.
    pub fn accounts(&self) -> Vec<Address> {
        self.custodied.clone()
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.inner.lock().account(address).balance
    }

    /// Mined and pending counts coincide under automine.
    pub fn nonce(&self, address: &Address) -> u64 {
        self.inner.lock().account(address).nonce
    }

    pub fn block_number(&self) -> u64 {
        self.inner.lock().head().number
    }

    pub fn block(&self, number: u64) -> Option<Block> {
        self.inner.lock().blocks.get(number as usize).cloned()
    }

    pub fn estimate_gas(&self, request: &TransactionRequest) -> u64 {
        intrinsic_gas(request.data())
    }

    pub fn receipt(&self, hash: &H256) -> Option<TransferReceipt> {
        self.inner
            .lock()
            .transactions
            .get(hash)
            .map(|mined| mined.receipt.clone())
    }

    pub fn transaction(&self, hash: &H256) -> Option<TransactionView> {
        let ledger = self.inner.lock();
        let mined = ledger.transactions.get(hash)?;
        let tx = &mined.signed.transaction;
        Some(TransactionView {
            hash: *hash,
            nonce: tx.nonce,
            block_hash: mined.receipt.block_hash,
            block_number: mined.receipt.block_number,
            transaction_index: mined.receipt.transaction_index,
            from: mined.from,
            to: tx.to,
            value: tx.value,
            gas_price: tx.gas_price,
            gas: tx.gas_limit,
            input: Some(tx.data.clone()),
        })
    }

    /// Signs with a custodied key and mines the result. Nonce assignment,
    /// signing and mining happen under one ledger lock.
    pub fn send_transaction(&self, mut request: TransactionRequest) -> NodeResult<H256> {
        let secret = self
            .keys
            .get(&request.from)
            .ok_or_else(|| NodeError::UnknownAccount(request.from.to_checksum()))?;
        if self.locked {
            return Err(NodeError::AccountLocked(request.from.to_checksum()));
        }
        request.gas_price = request.gas_price.or(Some(self.gas_price));
        request.gas = request.gas.or(Some(DEFAULT_TRANSACTION_GAS));
        let chain_id = request.chain_id.unwrap_or(self.chain_id);

        let mut ledger = self.inner.lock();
        if request.nonce.is_none() {
            request.nonce = Some(ledger.account(&request.from).nonce);
        }
        let signed = request.to_legacy(Some(chain_id))?.sign(secret)?;
        let hash = self.mine(&mut ledger, signed)?;
        drop(ledger);
        self.telemetry.record_block(1);
        Ok(hash)
    }

    pub fn send_raw_transaction(&self, raw: &[u8]) -> NodeResult<H256> {
        let signed = SignedTransaction::decode(raw)
            .map_err(|err| NodeError::InvalidTransaction(err.to_string()))?;
        let hash = self.mine(&mut self.inner.lock(), signed)?;
        self.telemetry.record_block(1);
        Ok(hash)
    }

    fn mine(&self, ledger: &mut Ledger, signed: SignedTransaction) -> NodeResult<H256> {
        let tx = &signed.transaction;
        if let Some(chain_id) = tx.chain_id {
            if chain_id != self.chain_id {
                return Err(NodeError::InvalidTransaction(format!(
                    "incompatible EIP155-based V: chain id {chain_id}, expected {}",
                    self.chain_id
                )));
            }
        }
        let to = tx.to.ok_or_else(|| {
            NodeError::InvalidTransaction("contract creation is not supported".into())
        })?;
        let intrinsic = intrinsic_gas(&tx.data);
        if tx.gas_limit < intrinsic {
            return Err(NodeError::InvalidTransaction(format!(
                "intrinsic gas too low: need {intrinsic}, limit {}",
                tx.gas_limit
            )));
        }
        if tx.gas_limit > self.block_gas_limit {
            return Err(NodeError::InvalidTransaction(format!(
                "exceeds block gas limit {}",
                self.block_gas_limit
            )));
        }
        let from = signed
            .recover_sender()
            .map_err(|err| NodeError::InvalidTransaction(err.to_string()))?;
        let upfront = U256::from(tx.gas_limit)
            .checked_mul(tx.gas_price)
            .and_then(|gas| gas.checked_add(tx.value))
            .ok_or_else(|| NodeError::InvalidTransaction("upfront cost overflows".into()))?;
        let charged = U256::from(intrinsic) * tx.gas_price;
        let hash = signed.hash();

        let sender = ledger.account(&from);
        if tx.nonce != sender.nonce {
            return Err(NodeError::NonceMismatch {
                expected: sender.nonce,
                actual: tx.nonce,
            });
        }
        if sender.balance < upfront {
            return Err(NodeError::InsufficientFunds {
                required: upfront.to_string(),
                available: sender.balance.to_string(),
            });
        }

        ledger.accounts.insert(
            from,
            Account {
                balance: sender.balance - tx.value - charged,
                nonce: sender.nonce + 1,
            },
        );
        let recipient = ledger.accounts.entry(to).or_default();
        recipient.balance = recipient.balance.saturating_add(tx.value);

        let parent = ledger.head().hash;
        let number = ledger.head().number + 1;
        let block = Block::seal(number, parent, vec![hash]);
        let receipt = TransferReceipt {
            status: true,
            transaction_hash: hash,
            from: Some(from),
            to: Some(to),
            block_hash: Some(block.hash),
            block_number: Some(number),
            transaction_index: Some(0),
            gas_used: Some(intrinsic),
            cumulative_gas_used: Some(intrinsic),
            effective_gas_price: Some(tx.gas_price),
            contract_address: None,
            logs: Vec::new(),
        };
        ledger.blocks.push(block);
        ledger.transactions.insert(
            hash,
            MinedTransaction {
                signed: signed.clone(),
                from,
                receipt,
            },
        );

        info!(?hash, %from, %to, value = %tx.value, block = number, "mined transaction");
        debug!(gas_used = intrinsic, gas_price = %tx.gas_price, "gas charged");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet::units::ether;
    use wallet::SigningIdentity;

    fn chain() -> ChainState {
        ChainState::new(&ChainConfig::devnet(2, 15), Arc::new(Telemetry::new()))
    }

    fn transfer(from: Address, to: Address, value: U256) -> TransactionRequest {
        TransactionRequest {
            to: Some(to),
            value: Some(value),
            gas: Some(21_000),
            ..TransactionRequest::from_sender(from)
        }
    }

    #[test]
    fn custodied_transfer_charges_intrinsic_gas() {
        let chain = chain();
        let accounts = chain.accounts();
        let hash = chain
            .send_transaction(transfer(accounts[0], accounts[1], ether(1)))
            .unwrap();
        let receipt = chain.receipt(&hash).unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.block_number, Some(1));
        let gas = receipt.gas_cost().unwrap();
        assert_eq!(chain.balance(&accounts[0]), ether(14) - gas);
        assert_eq!(chain.balance(&accounts[1]), ether(16));
        assert_eq!(chain.nonce(&accounts[0]), 1);
        assert_eq!(chain.block_number(), 1);
    }

    #[test]
    fn raw_transaction_from_external_key_is_mined() {
        let chain = chain();
        let primary = chain.accounts()[0];
        let identity = SigningIdentity::from_seed(b"external");
        chain
            .send_transaction(transfer(primary, identity.address(), ether(1)))
            .unwrap();

        let mut request = transfer(identity.address(), primary, U256::one());
        request.nonce = Some(0);
        request.gas_price = Some(chain.gas_price());
        let signed = identity
            .sign_transaction(request.to_legacy(Some(chain.chain_id())).unwrap())
            .unwrap();
        let hash = chain.send_raw_transaction(&signed.encode()).unwrap();
        assert_eq!(chain.receipt(&hash).unwrap().from, Some(identity.address()));
        let view = chain.transaction(&hash).unwrap();
        assert_eq!(view.from, identity.address());
        assert_eq!(view.nonce, 0);
    }

    #[test]
    fn wrong_chain_id_and_nonce_are_rejected() {
        let chain = chain();
        let identity = SigningIdentity::from_seed(b"replay");
        let mut request = transfer(identity.address(), chain.accounts()[0], U256::zero());
        request.nonce = Some(0);
        request.gas_price = Some(U256::zero());

        let foreign = identity
            .sign_transaction(request.to_legacy(Some(1)).unwrap())
            .unwrap();
        assert!(matches!(
            chain.send_raw_transaction(&foreign.encode()),
            Err(NodeError::InvalidTransaction(_))
        ));

        request.nonce = Some(3);
        let skipped = identity
            .sign_transaction(request.to_legacy(Some(chain.chain_id())).unwrap())
            .unwrap();
        assert!(matches!(
            chain.send_raw_transaction(&skipped.encode()),
            Err(NodeError::NonceMismatch {
                expected: 0,
                actual: 3
            })
        ));
    }

    #[test]
    fn underfunded_sender_is_rejected() {
        let chain = chain();
        let identity = SigningIdentity::from_seed(b"broke");
        let mut request = transfer(identity.address(), chain.accounts()[0], U256::one());
        request.nonce = Some(0);
        request.gas_price = Some(chain.gas_price());
        let signed = identity
            .sign_transaction(request.to_legacy(Some(chain.chain_id())).unwrap())
            .unwrap();
        assert!(matches!(
            chain.send_raw_transaction(&signed.encode()),
            Err(NodeError::InsufficientFunds { .. })
        ));
        assert_eq!(chain.block_number(), 0);
    }

    #[test]
    fn locked_chain_refuses_custodied_signing() {
        let mut config = ChainConfig::devnet(2, 15);
        config.locked = true;
        let chain = ChainState::new(&config, Arc::new(Telemetry::new()));
        let accounts = chain.accounts();
        assert!(matches!(
            chain.send_transaction(transfer(accounts[0], accounts[1], U256::one())),
            Err(NodeError::AccountLocked(_))
        ));
    }

    #[test]
    fn concurrent_sends_from_one_account_get_distinct_nonces() {
        let chain = chain();
        let accounts = chain.accounts();
        let (from, to) = (accounts[0], accounts[1]);
        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..10)
                            .map(|_| chain.send_transaction(transfer(from, to, U256::one())))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for worker in workers {
                for outcome in worker.join().unwrap() {
                    outcome.unwrap();
                }
            }
        });
        assert_eq!(chain.nonce(&from), 80);
        assert_eq!(chain.block_number(), 80);
        assert_eq!(chain.balance(&to), ether(15) + U256::from(80u64));
    }

    #[test]
    fn blocks_chain_by_parent_hash() {
        let chain = chain();
        let accounts = chain.accounts();
        chain
            .send_transaction(transfer(accounts[0], accounts[1], U256::one()))
            .unwrap();
        let genesis = chain.block(0).unwrap();
        let first = chain.block(1).unwrap();
        assert_eq!(first.parent_hash, genesis.hash);
        assert_ne!(first.hash, genesis.hash);
    }
}
