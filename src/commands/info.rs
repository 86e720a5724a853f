use lnd_rest::LndClient;

pub async fn execute(client: &LndClient) -> Result<(), String> {
    let info = client.get_info().await.map_err(|e| e.to_string())?;

    let network = info
        .chains
        .first()
        .map(|c| format!("{} {}", c.chain, c.network))
        .unwrap_or_else(|| "unknown".to_string());

    println!("⚡ {} ({})", info.alias, info.version);
    println!("pubkey:    {}", info.identity_pubkey);
    println!("network:   {}", network);
    println!("height:    {}", info.block_height);
    println!(
        "synced:    chain {} / graph {}",
        yes_no(info.synced_to_chain),
        yes_no(info.synced_to_graph)
    );
    println!(
        "channels:  {} active, {} inactive, {} pending",
        info.num_active_channels, info.num_inactive_channels, info.num_pending_channels
    );
    println!("peers:     {}", info.num_peers);
    for uri in &info.uris {
        println!("uri:       {}", uri);
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
