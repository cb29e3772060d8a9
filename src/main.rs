// Entry point for the minichain command-line tool
// Every command is a thin call into the library; settings come from GLOBAL_CONFIG
use clap::Parser;
use data_encoding::HEXLOWER;
use log::{error, info, LevelFilter};
use minichain::{
    address_to_pub_key_hash, convert_address, hash_pub_key, validate_address, Blockchain,
    BlockchainError, Command, Opt, Transaction, UTXOSet, Wallets, GLOBAL_CONFIG,
};
use std::process;

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), BlockchainError> {
    let config = &*GLOBAL_CONFIG;
    match command {
        Command::Createblockchain { address } => {
            if !validate_address(&address) {
                return Err(BlockchainError::InvalidAddress(address));
            }
            let blockchain = Blockchain::create_blockchain(&address, config)?;
            let utxo_set = UTXOSet::new(blockchain)?;
            utxo_set.reindex()?;
            println!("Done!");
        }
        Command::Createwallet => {
            let mut wallets = Wallets::load(&config.data_dir, &config.node_id)?;
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}")
        }
        Command::GetBalance { address } => {
            let pub_key_hash = address_to_pub_key_hash(&address)?;
            let blockchain = Blockchain::new_blockchain(config)?;
            let utxo_set = UTXOSet::new(blockchain)?;
            let balance = utxo_set.balance(&pub_key_hash)?;
            println!("Balance of {address}: {balance}");
        }
        Command::ListAddresses => {
            let wallets = Wallets::load(&config.data_dir, &config.node_id)?;
            for address in wallets.get_addresses() {
                println!("{address}")
            }
        }
        Command::Send { from, to, amount } => {
            if !validate_address(&from) {
                return Err(BlockchainError::InvalidAddress(from));
            }
            if !validate_address(&to) {
                return Err(BlockchainError::InvalidAddress(to));
            }

            let blockchain = Blockchain::new_blockchain(config)?;
            let utxo_set = UTXOSet::new(blockchain.clone())?;
            let wallets = Wallets::load(&config.data_dir, &config.node_id)?;
            let wallet = wallets.require_wallet(&from)?;

            let transaction = Transaction::new_utxo_transaction(wallet, &to, amount, &utxo_set)?;

            // Single node: this node mines the transaction right away
            let reward_address = config.mining_address.as_deref().unwrap_or(&from);
            let coinbase = Transaction::new_coinbase_tx(reward_address, "")?;
            let block = blockchain.mine_block(&[coinbase, transaction])?;
            utxo_set.update(&block)?;
            info!("Transaction mined in block {}", block.hash_hex());
            println!("Success!")
        }
        Command::Printchain => {
            let blockchain = Blockchain::new_blockchain(config)?;
            for block in blockchain.iterator() {
                let block = block?;
                println!("Pre block hash: {}", HEXLOWER.encode(block.get_prev_hash()));
                println!("Cur block hash: {}", block.hash_hex());
                println!("Cur block Timestamp: {}", block.get_timestamp());
                println!("Height: {}", block.get_height());

                for tx in block.get_transactions() {
                    println!("- Transaction txid_hex: {}", HEXLOWER.encode(tx.get_id()));

                    if !tx.is_coinbase() {
                        for input in tx.get_vin() {
                            let pub_key_hash = hash_pub_key(input.get_pub_key());
                            println!(
                                "-- Input txid = {}, vout = {}, from = {}",
                                HEXLOWER.encode(input.get_txid()),
                                input.get_vout(),
                                convert_address(&pub_key_hash),
                            )
                        }
                    }
                    for output in tx.get_vout() {
                        println!(
                            "-- Output value = {}, to = {}",
                            output.get_value(),
                            convert_address(output.get_pub_key_hash()),
                        )
                    }
                }
                println!()
            }
        }
        Command::Reindexutxo => {
            let blockchain = Blockchain::new_blockchain(config)?;
            let utxo_set = UTXOSet::new(blockchain)?;
            utxo_set.reindex()?;
            let count = utxo_set.count_transactions()?;
            println!("Done! There are {count} transactions in the UTXO set.");
        }
        Command::Validatechain => {
            let blockchain = Blockchain::new_blockchain(config)?;
            if blockchain.validate_chain()? {
                println!("Chain is valid up to height {}", blockchain.get_best_height()?);
            } else {
                return Err(BlockchainError::InvalidBlock(
                    "Chain failed validation, see log for details".to_string(),
                ));
            }
        }
    }
    Ok(())
}
