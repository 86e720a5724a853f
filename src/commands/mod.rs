pub mod balance;
pub mod history;
pub mod info;
pub mod watch;

use lnd_rest::LndClient;

pub const USAGE: &str = "\
usage: lnd-rest <command> [args]

commands:
  info                                      node alias, version and chain state
  balance                                   channel and on-chain balances
  history [--limit N] [--offset N] [--sent|--received] [--all]
          [--payment-cursor C] [--invoice-cursor C]
                                            merged payments and invoices, newest first
  watch <invoices|payments|invoice HASH|payment HASH>
                                            print push updates until Ctrl-C;
                                            HASH is hex:<hex> or b64:<base64>";

/// Run one command line; errors come back as printable messages
pub async fn dispatch(client: &LndClient, parts: &[String]) -> Result<(), String> {
    let Some((command, rest)) = parts.split_first() else {
        return Err(USAGE.to_string());
    };
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();

    match command.as_str() {
        "info" => info::execute(client).await,
        "balance" | "bal" => balance::execute(client).await,
        "history" | "tx" => history::execute(client, &args).await,
        "watch" => watch::execute(client, &args).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => Err(format!("unknown command `{}`\n\n{}", other, USAGE)),
    }
}
