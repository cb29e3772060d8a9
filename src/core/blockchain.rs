// This is the ledger - the chain of blocks persisted in Sled
// The blocks tree maps every block hash to its encoding and the "lh" key to
// the hash of the current tip. Both are always written in one transaction.
// Blocks that arrive before their parent wait in the orphans tree.

use crate::config::Config;
use crate::core::miner::MiningTask;
use crate::core::proof_of_work::MiningOutcome;
use crate::core::{Block, PrevTransactions, ProofOfWork, Transaction, UnspentOutput};
use crate::error::{BlockchainError, Result};
use crate::wallet::Wallet;
use data_encoding::HEXLOWER;
use log::{debug, info, warn};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::{Db, Tree};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};
use std::thread;

// Key holding the hash of the latest block
const TIP_BLOCK_HASH_KEY: &[u8] = b"lh";
const BLOCKS_TREE: &str = "blocks";
const ORPHANS_TREE: &str = "orphans";

/// Memo carried by the coinbase of every genesis block
pub const GENESIS_COINBASE_DATA: &str = "First Transaction from Genesis";

/// Unspent outputs keyed by the id of the transaction that created them
pub type UtxoMap = HashMap<Vec<u8>, Vec<UnspentOutput>>;

#[derive(Clone)]
pub struct Blockchain {
    // Cached copy of "lh", readable by the proof-of-work worker without a
    // round trip to the store. Held for writing whenever "lh" changes.
    tip_hash: Arc<RwLock<Vec<u8>>>,
    db: Db,
    blocks: Tree,
    orphans: Tree,
    db_path: PathBuf,
    difficulty: u32,
    // Local miners take turns; external blocks never wait on this
    mining_lock: Arc<Mutex<()>>,
}

impl Blockchain {
    /// Creates a chain at the configured location with a freshly mined genesis block.
    pub fn create_blockchain(genesis_address: &str, config: &Config) -> Result<Blockchain> {
        Self::create_blockchain_with_path(genesis_address, &config.chain_path(), config.difficulty)
    }

    /// Opens the chain at the configured location.
    pub fn new_blockchain(config: &Config) -> Result<Blockchain> {
        Self::new_blockchain_with_path(&config.chain_path(), config.difficulty)
    }

    pub fn create_blockchain_with_path(
        genesis_address: &str,
        db_path: &Path,
        difficulty: u32,
    ) -> Result<Blockchain> {
        // Fails early on a bad difficulty, before anything touches the disk
        ProofOfWork::new(&[], &[], difficulty)?;

        let (db, blocks, orphans) = Self::open_store(db_path)?;
        if blocks.contains_key(TIP_BLOCK_HASH_KEY)? {
            return Err(BlockchainError::ChainAlreadyExists(
                db_path.display().to_string(),
            ));
        }

        info!("Creating genesis block for address: {genesis_address}");
        let coinbase_tx = Transaction::new_coinbase_tx(genesis_address, GENESIS_COINBASE_DATA)?;
        let mut genesis = Block::genesis(&coinbase_tx)?;
        let pow = ProofOfWork::for_block(&genesis, difficulty)?;
        match run_pow_worker(pow, || false)? {
            MiningOutcome::Found { nonce, hash } => genesis.seal(nonce, hash),
            MiningOutcome::Interrupted => return Err(BlockchainError::MiningCancelled),
        }

        let block_data = genesis.serialize()?;
        let genesis_hash = genesis.get_hash().to_vec();
        blocks.transaction(|tx_db| -> ConflictableTransactionResult<(), BlockchainError> {
            tx_db.insert(genesis_hash.as_slice(), block_data.as_slice())?;
            tx_db.insert(TIP_BLOCK_HASH_KEY, genesis_hash.as_slice())?;
            Ok(())
        })?;
        db.flush()?;
        info!("Genesis block {} stored", genesis.hash_hex());

        Ok(Blockchain {
            tip_hash: Arc::new(RwLock::new(genesis_hash)),
            db,
            blocks,
            orphans,
            db_path: db_path.to_path_buf(),
            difficulty,
            mining_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn new_blockchain_with_path(db_path: &Path, difficulty: u32) -> Result<Blockchain> {
        ProofOfWork::new(&[], &[], difficulty)?;

        // Sled would happily create an empty store here, so a missing
        // directory is answered before opening anything
        if !db_path.exists() {
            return Err(BlockchainError::ChainNotFound(
                db_path.display().to_string(),
            ));
        }

        let (db, blocks, orphans) = Self::open_store(db_path)?;
        let tip_hash = blocks
            .get(TIP_BLOCK_HASH_KEY)?
            .ok_or_else(|| BlockchainError::ChainNotFound(db_path.display().to_string()))?;
        debug!("Opened chain at {} with tip {}", db_path.display(), HEXLOWER.encode(&tip_hash));

        Ok(Blockchain {
            tip_hash: Arc::new(RwLock::new(tip_hash.to_vec())),
            db,
            blocks,
            orphans,
            db_path: db_path.to_path_buf(),
            difficulty,
            mining_lock: Arc::new(Mutex::new(())),
        })
    }

    fn open_store(db_path: &Path) -> Result<(Db, Tree, Tree)> {
        let db = sled::open(db_path)
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))?;
        let orphans = db
            .open_tree(ORPHANS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open orphans tree: {e}")))?;
        Ok((db, blocks, orphans))
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_tip_hash(&self) -> Vec<u8> {
        self.tip_hash
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // Taken before any write to "lh" and released after the cache is updated,
    // so readers never see the cache behind the store
    fn lock_tip(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.tip_hash
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // The persisted tip and its block, read straight from the store
    fn stored_tip(&self) -> Result<(Vec<u8>, Block)> {
        let tip_hash = self
            .blocks
            .get(TIP_BLOCK_HASH_KEY)?
            .ok_or_else(|| BlockchainError::Database("Tip hash not found".to_string()))?;
        let tip_block = self.get_block(&tip_hash)?.ok_or_else(|| {
            BlockchainError::Database(format!(
                "Tip block {} not found",
                HEXLOWER.encode(&tip_hash)
            ))
        })?;
        Ok((tip_hash.to_vec(), tip_block))
    }

    /// Verifies `transactions`, mines a block on top of the tip and persists it.
    ///
    /// Verification and the new block both use one snapshot of the tip, and
    /// the block is only stored if that snapshot is still the tip. Any
    /// unverifiable transaction aborts the attempt without touching the
    /// store. If the tip moves, the batch is verified again and mined on the
    /// new tip.
    pub fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        self.mine_block_internal(transactions, Arc::new(AtomicBool::new(false)))
    }

    /// Same as [`mine_block`](Self::mine_block) but on a background thread,
    /// returning a handle that can cancel or await the result.
    pub fn spawn_mining(&self, transactions: Vec<Transaction>) -> Result<MiningTask> {
        let cancel = Arc::new(AtomicBool::new(false));
        let chain = self.clone();
        let flag = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("miner".to_string())
            .spawn(move || chain.mine_block_internal(&transactions, flag))?;
        Ok(MiningTask::new(handle, cancel))
    }

    fn mine_block_internal(
        &self,
        transactions: &[Transaction],
        cancel: Arc<AtomicBool>,
    ) -> Result<Block> {
        let _guard = self
            .mining_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            if cancel.load(Ordering::SeqCst) {
                return Err(BlockchainError::MiningCancelled);
            }

            let (tip_hash, tip_block) = self.stored_tip()?;
            self.verify_candidates(transactions, &tip_hash)?;

            let next_height = tip_block.get_height() + 1;
            let mut block = Block::assemble(&tip_hash, transactions, next_height)?;
            info!(
                "Mining block at height {} with {} transactions (difficulty: {})",
                next_height,
                transactions.len(),
                self.difficulty
            );

            let pow = ProofOfWork::for_block(&block, self.difficulty)?;
            let cached_tip = Arc::clone(&self.tip_hash);
            let stop_flag = Arc::clone(&cancel);
            let mined_on = tip_hash.clone();
            let outcome = run_pow_worker(pow, move || {
                stop_flag.load(Ordering::SeqCst)
                    || cached_tip
                        .read()
                        .map(|current| *current != mined_on)
                        .unwrap_or(false)
            })?;

            match outcome {
                MiningOutcome::Found { nonce, hash } => block.seal(nonce, hash),
                MiningOutcome::Interrupted => {
                    if cancel.load(Ordering::SeqCst) {
                        info!("Mining at height {next_height} cancelled");
                        return Err(BlockchainError::MiningCancelled);
                    }
                    info!("Tip moved while mining height {next_height}, restarting");
                    continue;
                }
            }

            if self.commit_mined_block(&block, &tip_hash)? {
                info!(
                    "Successfully mined block {} at height {}",
                    block.hash_hex(),
                    next_height
                );
                return Ok(block);
            }
            info!("Tip moved before block at height {next_height} was stored, retrying");
        }
    }

    // Stores the block and moves "lh" to it, but only if "lh" still points at
    // the block it was mined on. Returns false when it does not.
    fn commit_mined_block(&self, block: &Block, expected_tip: &[u8]) -> Result<bool> {
        let block_hash = block.get_hash();
        let block_data = block.serialize()?;

        let mut cached_tip = self.lock_tip();
        let committed = self.blocks.transaction(
            |tx_db| -> ConflictableTransactionResult<bool, BlockchainError> {
                let current = tx_db.get(TIP_BLOCK_HASH_KEY)?;
                if current.as_deref() != Some(expected_tip) {
                    return Ok(false);
                }
                tx_db.insert(block_hash, block_data.as_slice())?;
                tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash)?;
                Ok(true)
            },
        )?;

        if committed {
            self.db.flush()?;
            *cached_tip = block_hash.to_vec();
        }
        Ok(committed)
    }

    // Everything a candidate batch must satisfy before any work is spent on
    // it, checked against the chain ending at `tip_hash`
    fn verify_candidates(&self, transactions: &[Transaction], tip_hash: &[u8]) -> Result<()> {
        let utxo = self.find_utxo_at(tip_hash.to_vec())?;
        let mut claimed: HashSet<(Vec<u8>, usize)> = HashSet::new();

        for (i, transaction) in transactions.iter().enumerate() {
            if transaction.is_coinbase() {
                continue;
            }
            let txid_hex = HEXLOWER.encode(transaction.get_id());

            if transaction.hash()?.as_slice() != transaction.get_id() {
                return Err(BlockchainError::InvalidTransaction(format!(
                    "Transaction {i} ({txid_hex}) does not match its id"
                )));
            }

            let prev_txs = self.previous_transactions_at(transaction, tip_hash)?;
            if !transaction.verify(&prev_txs)? {
                return Err(BlockchainError::InvalidTransaction(format!(
                    "Invalid signature in transaction {i} ({txid_hex})"
                )));
            }

            for input in transaction.get_vin() {
                let index = input.output_index()?;
                let reference = HEXLOWER.encode(input.get_txid());

                let unspent = utxo
                    .get(input.get_txid())
                    .is_some_and(|outs| outs.iter().any(|out| out.vout == index));
                if !unspent {
                    return Err(BlockchainError::InvalidTransaction(format!(
                        "Transaction {i} spends {reference}:{index} which is not unspent"
                    )));
                }

                // The same output claimed twice inside one block
                if !claimed.insert((input.get_txid().to_vec(), index)) {
                    return Err(BlockchainError::InvalidTransaction(format!(
                        "Double-spending detected in transaction {i}: output {reference}:{index} already spent in this block"
                    )));
                }
            }

            let input_value = transaction.input_value(&prev_txs)?;
            let output_value = transaction.output_value()?;
            if input_value < output_value {
                return Err(BlockchainError::InvalidTransaction(format!(
                    "Transaction {i} ({txid_hex}) creates {output_value} from {input_value}"
                )));
            }
        }
        Ok(())
    }

    /// Stores a block produced elsewhere.
    ///
    /// A block already on the chain is a no-op. A block whose parent is not
    /// stored yet is parked as an orphan and linked once the parent arrives;
    /// an orphan never becomes the tip. The tip only moves when a linked
    /// block is strictly higher than the current one. Returns whether it
    /// moved, counting orphans linked behind this block.
    pub fn add_block(&self, block: &Block) -> Result<bool> {
        let block_hash = block.get_hash();
        if self.blocks.contains_key(block_hash)? {
            debug!("Block {} already stored", block.hash_hex());
            return Ok(false);
        }

        if !ProofOfWork::validate(block, self.difficulty)? {
            return Err(BlockchainError::InvalidBlock(format!(
                "Block {} fails proof-of-work",
                block.hash_hex()
            )));
        }
        if block.is_genesis() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Block {} has no parent but the chain already has a genesis block",
                block.hash_hex()
            )));
        }

        let parent = match self.get_block(block.get_prev_hash())? {
            Some(parent) => parent,
            None => {
                self.park_orphan(block)?;
                return Ok(false);
            }
        };
        if block.get_height() != parent.get_height() + 1 {
            return Err(BlockchainError::InvalidBlock(format!(
                "Block {} claims height {} on a parent at height {}",
                block.hash_hex(),
                block.get_height(),
                parent.get_height()
            )));
        }

        let mut advanced = self.store_linked_block(block)?;
        for orphan in self.take_orphans_of(block_hash)? {
            match self.add_block(&orphan) {
                Ok(moved) => advanced |= moved,
                Err(e) => warn!("Dropping orphan block {}: {e}", orphan.hash_hex()),
            }
        }
        Ok(advanced)
    }

    // Writes a block whose parent is on the chain and moves "lh" to it when it
    // is higher than the current tip
    fn store_linked_block(&self, block: &Block) -> Result<bool> {
        let block_hash = block.get_hash();
        let block_data = block.serialize()?;

        let mut cached_tip = self.lock_tip();
        let advanced = self.blocks.transaction(
            |tx_db| -> ConflictableTransactionResult<bool, BlockchainError> {
                if tx_db.get(block_hash)?.is_some() {
                    return Ok(false);
                }
                tx_db.insert(block_hash, block_data.as_slice())?;

                let tip_hash = tx_db.get(TIP_BLOCK_HASH_KEY)?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(BlockchainError::Database(
                        "Tip hash not found".to_string(),
                    ))
                })?;
                let tip_block_bytes = tx_db.get(&tip_hash)?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(BlockchainError::Database(
                        "Tip block not found".to_string(),
                    ))
                })?;
                let tip_block = Block::deserialize(tip_block_bytes.as_ref())
                    .map_err(ConflictableTransactionError::Abort)?;

                if block.get_height() > tip_block.get_height() {
                    tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash)?;
                    return Ok(true);
                }
                Ok(false)
            },
        )?;
        self.db.flush()?;

        if advanced {
            *cached_tip = block_hash.to_vec();
            info!(
                "Added block {} at height {}, new tip",
                block.hash_hex(),
                block.get_height()
            );
        } else {
            info!(
                "Added block {} at height {}",
                block.hash_hex(),
                block.get_height()
            );
        }
        Ok(advanced)
    }

    fn park_orphan(&self, block: &Block) -> Result<()> {
        warn!(
            "Parking block {} until its parent {} arrives",
            block.hash_hex(),
            HEXLOWER.encode(block.get_prev_hash())
        );
        self.orphans.insert(block.get_hash(), block.serialize()?)?;
        self.orphans.flush()?;
        Ok(())
    }

    // Removes and returns the parked blocks waiting on `parent_hash`
    fn take_orphans_of(&self, parent_hash: &[u8]) -> Result<Vec<Block>> {
        let mut children = vec![];
        for entry in self.orphans.iter() {
            let (hash, data) = entry?;
            let orphan = Block::deserialize(data.as_ref())?;
            if orphan.get_prev_hash() == parent_hash && self.orphans.remove(&hash)?.is_some() {
                children.push(orphan);
            }
        }
        Ok(children)
    }

    /// Number of blocks waiting for their parent.
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// Walks from the tip back to genesis.
    pub fn iterator(&self) -> BlockchainIterator {
        BlockchainIterator::new(self.get_tip_hash(), self.blocks.clone())
    }

    /// Full rescan of the chain: every output not consumed by a later input.
    pub fn find_utxo(&self) -> Result<UtxoMap> {
        self.find_utxo_at(self.get_tip_hash())
    }

    // Rescan pinned to a given tip, so callers can record what they indexed
    pub(crate) fn find_utxo_at(&self, tip_hash: Vec<u8>) -> Result<UtxoMap> {
        let mut utxo: UtxoMap = HashMap::new();
        let mut spent_txos: HashMap<Vec<u8>, HashSet<usize>> = HashMap::new();

        for block in BlockchainIterator::new(tip_hash, self.blocks.clone()) {
            let block = block?;
            // Newest first inside the block as well, so spends are always
            // seen before the outputs they consume
            for tx in block.get_transactions().iter().rev() {
                let spent = spent_txos.get(tx.get_id());
                for (idx, out) in tx.get_vout().iter().enumerate() {
                    if spent.is_some_and(|indices| indices.contains(&idx)) {
                        continue;
                    }
                    utxo.entry(tx.get_id().to_vec())
                        .or_default()
                        .push(UnspentOutput {
                            vout: idx,
                            output: out.clone(),
                        });
                }
                if tx.is_coinbase() {
                    continue;
                }

                for txin in tx.get_vin() {
                    spent_txos
                        .entry(txin.get_txid().to_vec())
                        .or_default()
                        .insert(txin.output_index()?);
                }
            }
        }
        Ok(utxo)
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Transaction> {
        self.find_transaction_at(txid, &self.get_tip_hash())
    }

    fn find_transaction_at(&self, txid: &[u8], tip_hash: &[u8]) -> Result<Transaction> {
        for block in BlockchainIterator::new(tip_hash.to_vec(), self.blocks.clone()) {
            let block = block?;
            if let Some(transaction) = block
                .get_transactions()
                .iter()
                .find(|transaction| transaction.get_id() == txid)
            {
                return Ok(transaction.clone());
            }
        }
        Err(BlockchainError::TransactionNotFound(HEXLOWER.encode(txid)))
    }

    /// The transactions referenced by `transaction`'s inputs that exist on the chain.
    ///
    /// Missing references are left out; signing and verification report them.
    pub fn previous_transactions(&self, transaction: &Transaction) -> Result<PrevTransactions> {
        self.previous_transactions_at(transaction, &self.get_tip_hash())
    }

    fn previous_transactions_at(
        &self,
        transaction: &Transaction,
        tip_hash: &[u8],
    ) -> Result<PrevTransactions> {
        let mut prev_txs = PrevTransactions::new();
        if transaction.is_coinbase() {
            return Ok(prev_txs);
        }

        for input in transaction.get_vin() {
            if prev_txs.contains_key(input.get_txid()) {
                continue;
            }
            match self.find_transaction_at(input.get_txid(), tip_hash) {
                Ok(prev_tx) => {
                    prev_txs.insert(input.get_txid().to_vec(), prev_tx);
                }
                Err(BlockchainError::TransactionNotFound(txid)) => {
                    debug!("Referenced transaction {txid} is not on the chain");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(prev_txs)
    }

    pub fn sign_transaction(&self, transaction: &mut Transaction, wallet: &Wallet) -> Result<()> {
        let prev_txs = self.previous_transactions(transaction)?;
        transaction.sign(wallet.get_pkcs8(), &prev_txs)
    }

    pub fn verify_transaction(&self, transaction: &Transaction) -> Result<bool> {
        let prev_txs = self.previous_transactions(transaction)?;
        transaction.verify(&prev_txs)
    }

    pub fn get_best_height(&self) -> Result<usize> {
        let (_, tip_block) = self.stored_tip()?;
        Ok(tip_block.get_height())
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        match self.blocks.get(block_hash)? {
            Some(block_bytes) => Ok(Some(Block::deserialize(block_bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn block_exists(&self, block_hash: &[u8]) -> Result<bool> {
        Ok(self.blocks.contains_key(block_hash)?)
    }

    /// Hashes of the main chain, tip first.
    pub fn get_block_hashes(&self) -> Result<Vec<Vec<u8>>> {
        self.iterator()
            .map(|block| block.map(|block| block.get_hash().to_vec()))
            .collect()
    }

    /// Re-checks every block from the tip down: proof-of-work, linkage,
    /// heights, transaction signatures and that no output is spent twice.
    pub fn validate_chain(&self) -> Result<bool> {
        let mut child: Option<Block> = None;
        let mut spent: HashSet<(Vec<u8>, usize)> = HashSet::new();
        for block in self.iterator() {
            let block = block?;
            if !ProofOfWork::validate(&block, self.difficulty)? {
                warn!("Block {} fails proof-of-work", block.hash_hex());
                return Ok(false);
            }
            if let Some(child) = &child {
                if child.get_prev_hash() != block.get_hash()
                    || child.get_height() != block.get_height() + 1
                {
                    warn!("Block {} is not linked to its parent", child.hash_hex());
                    return Ok(false);
                }
            }
            if block.is_genesis() && block.get_height() != 0 {
                warn!("Genesis block {} has a non-zero height", block.hash_hex());
                return Ok(false);
            }
            for transaction in block.get_transactions() {
                if !self.verify_transaction(transaction)? {
                    warn!(
                        "Transaction {} in block {} fails verification",
                        HEXLOWER.encode(transaction.get_id()),
                        block.hash_hex()
                    );
                    return Ok(false);
                }
                if transaction.is_coinbase() {
                    continue;
                }
                for input in transaction.get_vin() {
                    let index = input.output_index()?;
                    if !spent.insert((input.get_txid().to_vec(), index)) {
                        warn!(
                            "Output {}:{index} is spent more than once",
                            HEXLOWER.encode(input.get_txid())
                        );
                        return Ok(false);
                    }
                }
            }
            child = Some(block);
        }
        Ok(true)
    }
}

// The nonce search runs on its own thread so the ledger stays responsive
fn run_pow_worker<F>(pow: ProofOfWork, should_stop: F) -> Result<MiningOutcome>
where
    F: Fn() -> bool + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("pow-worker".to_string())
        .spawn(move || pow.run(should_stop))?;
    handle
        .join()
        .map_err(|_| BlockchainError::Mining("Proof-of-work worker panicked".to_string()))?
}

/// Yields blocks from the tip back to genesis, stopping after genesis.
pub struct BlockchainIterator {
    blocks: Tree,
    current_hash: Vec<u8>,
    done: bool,
}

impl BlockchainIterator {
    fn new(tip_hash: Vec<u8>, blocks: Tree) -> BlockchainIterator {
        BlockchainIterator {
            blocks,
            current_hash: tip_hash,
            done: false,
        }
    }
}

impl Iterator for BlockchainIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let data = match self.blocks.get(&self.current_hash) {
            Ok(Some(data)) => data,
            Ok(None) => {
                self.done = true;
                return Some(Err(BlockchainError::Database(format!(
                    "Block {} not found",
                    HEXLOWER.encode(&self.current_hash)
                ))));
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };

        match Block::deserialize(data.as_ref()) {
            Ok(block) => {
                if block.is_genesis() {
                    self.done = true;
                } else {
                    self.current_hash = block.get_prev_hash().to_vec();
                }
                Some(Ok(block))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
