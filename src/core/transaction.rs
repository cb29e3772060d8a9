// This file implements the transaction system - how value moves on the ledger
// Each transaction consumes previous outputs and creates new ones (UTXO model)

use crate::error::{BlockchainError, Result};
use crate::storage::UTXOSet;
use crate::utils::{
    deserialize, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, serialize,
    sha256_digest,
};
use crate::wallet::{address_to_pub_key_hash, hash_pub_key, Wallet};
use data_encoding::HEXLOWER;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Value minted by every coinbase transaction
pub const SUBSIDY: u64 = 100;

/// Output index carried by a coinbase input: it references nothing
pub const COINBASE_VOUT: i64 = -1;

/// Transactions referenced by a transaction's inputs, keyed by their id
pub type PrevTransactions = HashMap<Vec<u8>, Transaction>;

// A transaction input references a previous transaction output
// Think of it as "I want to spend output #2 from transaction ABC123"
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>,      // The ID of the transaction containing the output to spend
    vout: i64,          // Index of the output in that transaction, COINBASE_VOUT for a coinbase
    signature: Vec<u8>, // Fixed-width r||s over the per-input signing digest
    pub_key: Vec<u8>,   // Raw X||Y public key of the spender (memo bytes for a coinbase)
}

impl TXInput {
    // A fresh, unsigned input
    pub fn new(txid: &[u8], vout: usize, pub_key: &[u8]) -> Result<TXInput> {
        let vout = i64::try_from(vout).map_err(|_| {
            BlockchainError::InvalidTransaction(format!("Output index {vout} is out of range"))
        })?;
        Ok(TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: pub_key.to_vec(),
        })
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    /// The referenced output index, or an error for the coinbase sentinel and
    /// other negative values.
    pub fn output_index(&self) -> Result<usize> {
        usize::try_from(self.vout).map_err(|_| {
            BlockchainError::InvalidTransaction(format!(
                "Input references invalid output index {}",
                self.vout
            ))
        })
    }

    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(self.pub_key.as_slice()).eq(pub_key_hash)
    }
}

// A transaction output is like a "check" that can be cashed later
// "Pay 40 to whoever holds the key hashing to pub_key_hash"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    pub fn new(value: u64, address: &str) -> Result<TXOutput> {
        let pub_key_hash = address_to_pub_key_hash(address)?;
        Self::locked_to(value, &pub_key_hash)
    }

    pub fn locked_to(value: u64, pub_key_hash: &[u8]) -> Result<TXOutput> {
        if value == 0 {
            return Err(BlockchainError::InvalidTransaction(
                "Output value must be positive".to_string(),
            ));
        }
        Ok(TXOutput {
            value,
            pub_key_hash: pub_key_hash.to_vec(),
        })
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.eq(pub_key_hash)
    }
}

/// An output that no input on the chain has consumed yet, with its position
/// in the transaction that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct UnspentOutput {
    pub vout: usize,
    pub output: TXOutput,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,         // SHA-256 of the encoding with this field blanked
    vin: Vec<TXInput>,   // What is being spent
    vout: Vec<TXOutput>, // Where the value goes
}

impl Transaction {
    /// Mints [`SUBSIDY`] to `to`. An empty memo gets a default text.
    pub fn new_coinbase_tx(to: &str, memo: &str) -> Result<Transaction> {
        let memo = if memo.is_empty() {
            format!("Coins to {to}")
        } else {
            memo.to_string()
        };

        let txout = TXOutput::new(SUBSIDY, to)?;
        // The random bytes keep two coinbases to the same address with the
        // same memo from sharing an id
        let tx_input = TXInput {
            txid: vec![],
            vout: COINBASE_VOUT,
            signature: Uuid::new_v4().as_bytes().to_vec(),
            pub_key: memo.into_bytes(),
        };

        let mut tx = Transaction {
            id: vec![],
            vin: vec![tx_input],
            vout: vec![txout],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Builds and signs a transfer of `amount` from `wallet` to `to`.
    ///
    /// Outputs are picked greedily from the UTXO index; any excess comes back
    /// to the sender as a change output.
    pub fn new_utxo_transaction(
        wallet: &Wallet,
        to: &str,
        amount: u64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::InvalidTransaction(
                "Amount must be positive".to_string(),
            ));
        }

        let public_key_hash = hash_pub_key(wallet.get_public_key());
        let (accumulated, valid_outputs) =
            utxo_set.find_spendable_outputs(public_key_hash.as_slice(), amount)?;

        if accumulated < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for (txid, outs) in valid_outputs {
            for out in outs {
                inputs.push(TXInput::new(&txid, out, wallet.get_public_key())?);
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)?];
        if accumulated > amount {
            outputs.push(TXOutput::locked_to(
                accumulated - amount,
                public_key_hash.as_slice(),
            )?);
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        utxo_set.get_blockchain().sign_transaction(&mut tx, wallet)?;
        Ok(tx)
    }

    /// Assembles a transaction from explicit parts and computes its id.
    pub fn from_parts(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == COINBASE_VOUT
    }

    /// Copy with every input's signature and public key cleared; the shape
    /// that gets signed.
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .vin
            .iter()
            .map(|input| TXInput {
                txid: input.txid.clone(),
                vout: input.vout,
                signature: vec![],
                pub_key: vec![],
            })
            .collect();
        Transaction {
            id: self.id.clone(),
            vin: inputs,
            vout: self.vout.clone(),
        }
    }

    /// Signs every input with `pkcs8`. Each input is signed over the trimmed
    /// copy with only that input's public key slot holding the referenced
    /// output's `pub_key_hash`. Coinbase transactions are left untouched.
    ///
    /// The id is recomputed afterwards since it covers the signatures. The
    /// signing digests blank the id, so this does not invalidate them.
    pub fn sign(&mut self, pkcs8: &[u8], prev_txs: &PrevTransactions) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        self.check_inputs_exist(prev_txs)?;

        let mut tx_copy = self.trimmed_copy();
        for idx in 0..self.vin.len() {
            let locking_hash = Self::referenced_output(&self.vin[idx], prev_txs)?
                .get_pub_key_hash()
                .to_vec();
            let digest = Self::input_digest(&mut tx_copy, idx, &locking_hash)?;
            self.vin[idx].signature = ecdsa_p256_sha256_sign_digest(pkcs8, &digest)?;
        }
        self.id = self.hash()?;
        Ok(())
    }

    /// Checks every input's signature and ownership. Returns `Ok(false)` on
    /// the first failing input and an error when a reference is dangling.
    pub fn verify(&self, prev_txs: &PrevTransactions) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        self.check_inputs_exist(prev_txs)?;

        let mut tx_copy = self.trimmed_copy();
        for (idx, vin) in self.vin.iter().enumerate() {
            let locking_hash = match Self::referenced_output(vin, prev_txs) {
                Ok(output) => output.get_pub_key_hash().to_vec(),
                Err(e) => {
                    warn!("Input {idx} of {}: {e}", HEXLOWER.encode(&self.id));
                    return Ok(false);
                }
            };

            if !vin.uses_key(&locking_hash) {
                warn!(
                    "Input {idx} of {} is not owned by its public key",
                    HEXLOWER.encode(&self.id)
                );
                return Ok(false);
            }

            let digest = Self::input_digest(&mut tx_copy, idx, &locking_hash)?;
            if !ecdsa_p256_sha256_sign_verify(&vin.pub_key, &vin.signature, &digest) {
                debug!(
                    "Signature check failed for input {idx} of {}",
                    HEXLOWER.encode(&self.id)
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    // Per-input signing message: the trimmed copy's id with this input's
    // public key slot temporarily holding the referenced output's lock
    fn input_digest(tx_copy: &mut Transaction, idx: usize, locking_hash: &[u8]) -> Result<Vec<u8>> {
        tx_copy.vin[idx].signature.clear();
        tx_copy.vin[idx].pub_key = locking_hash.to_vec();
        tx_copy.id = tx_copy.hash()?;
        tx_copy.vin[idx].pub_key.clear();
        Ok(tx_copy.id.clone())
    }

    fn check_inputs_exist(&self, prev_txs: &PrevTransactions) -> Result<()> {
        match self
            .vin
            .iter()
            .find(|input| !prev_txs.contains_key(input.get_txid()))
        {
            Some(input) => Err(BlockchainError::DanglingReference(
                HEXLOWER.encode(input.get_txid()),
            )),
            None => Ok(()),
        }
    }

    fn referenced_output<'a>(
        input: &TXInput,
        prev_txs: &'a PrevTransactions,
    ) -> Result<&'a TXOutput> {
        let prev_tx = prev_txs
            .get(input.get_txid())
            .ok_or_else(|| BlockchainError::DanglingReference(HEXLOWER.encode(input.get_txid())))?;
        let index = input.output_index()?;
        prev_tx.vout.get(index).ok_or_else(|| {
            BlockchainError::InvalidTransaction(format!(
                "Output {index} does not exist in transaction {}",
                HEXLOWER.encode(input.get_txid())
            ))
        })
    }

    /// Total value of the outputs this transaction consumes.
    pub fn input_value(&self, prev_txs: &PrevTransactions) -> Result<u64> {
        if self.is_coinbase() {
            return Ok(0);
        }
        self.vin.iter().try_fold(0u64, |total, input| {
            let value = Self::referenced_output(input, prev_txs)?.get_value();
            total
                .checked_add(value)
                .ok_or_else(|| BlockchainError::InvalidTransaction("Input value overflow".to_string()))
        })
    }

    pub fn output_value(&self) -> Result<u64> {
        self.vout.iter().try_fold(0u64, |total, output| {
            total.checked_add(output.get_value()).ok_or_else(|| {
                BlockchainError::InvalidTransaction("Output value overflow".to_string())
            })
        })
    }

    /// SHA-256 over the canonical encoding with the id blanked.
    pub fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(&tx_copy.serialize()?))
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Transaction {}:", HEXLOWER.encode(&self.id))?;
        for (i, input) in self.vin.iter().enumerate() {
            writeln!(f, "     Input {i}:")?;
            writeln!(f, "       TXID:      {}", HEXLOWER.encode(&input.txid))?;
            writeln!(f, "       Out:       {}", input.vout)?;
            writeln!(f, "       Signature: {}", HEXLOWER.encode(&input.signature))?;
            writeln!(f, "       PubKey:    {}", HEXLOWER.encode(&input.pub_key))?;
        }
        for (i, output) in self.vout.iter().enumerate() {
            writeln!(f, "     Output {i}:")?;
            writeln!(f, "       Value:  {}", output.value)?;
            writeln!(f, "       Script: {}", HEXLOWER.encode(&output.pub_key_hash))?;
        }
        Ok(())
    }
}
