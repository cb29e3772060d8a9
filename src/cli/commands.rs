use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "minichain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    #[command(name = "createblockchain", about = "Create a new blockchain")]
    Createblockchain {
        #[arg(help = "The address to send genesis block reward to")]
        address: String,
    },
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(
        name = "getbalance",
        about = "Get the wallet balance of the target address"
    )]
    GetBalance {
        #[arg(help = "The wallet address")]
        address: String,
    },
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
    #[command(
        name = "send",
        about = "Send coins between addresses and mine the transaction locally"
    )]
    Send {
        #[arg(help = "Source wallet address")]
        from: String,
        #[arg(help = "Destination wallet address")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
    },
    #[command(name = "printchain", about = "Print all blocks in the blockchain")]
    Printchain,
    #[command(name = "reindexutxo", about = "Rebuild UTXO index set")]
    Reindexutxo,
    #[command(
        name = "validatechain",
        about = "Check proof-of-work, linkage and signatures of every block"
    )]
    Validatechain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let opt = Opt::try_parse_from(["minichain", "send", "from", "to", "40"]).unwrap();
        assert_eq!(
            opt.command,
            Command::Send {
                from: "from".to_string(),
                to: "to".to_string(),
                amount: 40,
            }
        );
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(Opt::try_parse_from(["minichain", "send", "from", "to", "-5"]).is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        let opt = Opt::try_parse_from(["minichain", "printchain"]).unwrap();
        assert_eq!(opt.command, Command::Printchain);
        let opt = Opt::try_parse_from(["minichain", "reindexutxo"]).unwrap();
        assert_eq!(opt.command, Command::Reindexutxo);
    }
}
