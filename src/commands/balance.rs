use lnd_rest::utils::{Align, Table};
use lnd_rest::LndClient;

pub async fn execute(client: &LndClient) -> Result<(), String> {
    let (channels, wallet) = tokio::try_join!(client.channel_balance(), client.wallet_balance())
        .map_err(|e| format!("Failed to get balance: {}", e))?;

    let mut table = Table::new(&["Balance", "sat"]).align(1, Align::Right);
    let rows = [
        ("channels (local)", channels.local_balance.sat),
        ("channels (remote)", channels.remote_balance.sat),
        ("channels (unsettled)", channels.unsettled_local_balance.sat),
        ("channels (pending open)", channels.pending_open_local_balance.sat),
        ("on-chain (confirmed)", wallet.confirmed_balance),
        ("on-chain (unconfirmed)", wallet.unconfirmed_balance),
        ("on-chain (locked)", wallet.locked_balance),
    ];
    for (label, sat) in rows {
        table.add_row(vec![label.to_string(), sat.to_string()]);
    }

    print!("{}", table.render());
    println!(
        "total spendable: {} sat",
        channels.local_balance.sat + wallet.confirmed_balance
    );
    Ok(())
}
