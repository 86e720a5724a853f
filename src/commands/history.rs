use lnd_rest::utils::{Align, Table};
use lnd_rest::{HistoryFilter, LndClient, TransactionType};

pub async fn execute(client: &LndClient, args: &[&str]) -> Result<(), String> {
    let filter = parse_args(args)?;
    let page = client.fetch_history(&filter).await.map_err(|e| e.to_string())?;

    if page.transactions.is_empty() {
        println!("No transactions.");
        return Ok(());
    }

    let mut table = Table::new(&["Date", "Type", "Amount", "Fee", "Status", "Memo / Destination"])
        .align(2, Align::Right)
        .align(3, Align::Right);
    for tx in &page.transactions {
        let date = tx
            .created_at()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| tx.timestamp.to_string());
        let note = if tx.description.is_empty() {
            shorten(&tx.destination)
        } else {
            tx.description.clone()
        };
        table.add_row(vec![
            date,
            tx.kind.to_string(),
            tx.amount.to_string(),
            tx.fee.to_string(),
            tx.status.to_string(),
            note,
        ]);
    }
    print!("{}", table.render());

    println!(
        "showing {}-{} of {}",
        page.offset + 1,
        page.offset + page.transactions.len(),
        page.total_count
    );
    for anomaly in &page.anomalies {
        println!("⚠️  {}", anomaly);
    }
    if let Some(next) = &page.next_cursor {
        println!(
            "more: lnd-rest history --payment-cursor {} --invoice-cursor {}",
            next.payment_cursor, next.invoice_cursor
        );
    }
    Ok(())
}

fn parse_args(args: &[&str]) -> Result<HistoryFilter, String> {
    let mut filter = HistoryFilter::new();
    let mut iter = args.iter();

    while let Some(&arg) = iter.next() {
        match arg {
            "--limit" | "-n" => filter = filter.limit(number(arg, iter.next())?),
            "--offset" => filter = filter.offset(number(arg, iter.next())?),
            "--sent" => filter = filter.types(&[TransactionType::Sent]),
            "--received" => filter = filter.types(&[TransactionType::Received]),
            "--all" => filter = filter.fetch_all(true),
            "--payment-cursor" => filter.payment_cursor = Some(value(arg, iter.next())?.to_string()),
            "--invoice-cursor" => filter.invoice_cursor = Some(value(arg, iter.next())?.to_string()),
            other => return Err(format!("unexpected argument `{}`", other)),
        }
    }
    Ok(filter)
}

fn value<'a>(flag: &str, value: Option<&&'a str>) -> Result<&'a str, String> {
    value.copied().ok_or_else(|| format!("{} needs a value", flag))
}

fn number(flag: &str, raw: Option<&&str>) -> Result<usize, String> {
    value(flag, raw)?
        .parse()
        .map_err(|_| format!("{} expects a number", flag))
}

fn shorten(pubkey: &str) -> String {
    if pubkey.len() > 20 {
        format!("{}…{}", &pubkey[..10], &pubkey[pubkey.len() - 6..])
    } else {
        pubkey.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let filter = parse_args(&["--limit", "10", "--offset", "20", "--received", "--all"]).unwrap();
        assert_eq!(filter.limit, Some(10));
        assert_eq!(filter.offset, Some(20));
        assert_eq!(filter.types, vec![TransactionType::Received]);
        assert!(filter.fetch_all);
    }

    #[test]
    fn test_resume_from_cursors() {
        let filter = parse_args(&["--payment-cursor", "120", "--invoice-cursor", "45"]).unwrap();
        assert_eq!(filter.payment_cursor.as_deref(), Some("120"));
        assert_eq!(filter.invoice_cursor.as_deref(), Some("45"));
        assert!(parse_args(&["--invoice-cursor"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let filter = parse_args(&[]).unwrap();
        assert_eq!(filter.limit, None);
        assert!(filter.types.is_empty());
        assert!(!filter.fetch_all);
    }

    #[test]
    fn test_bad_input() {
        assert!(parse_args(&["--limit"]).is_err());
        assert!(parse_args(&["--limit", "ten"]).is_err());
        assert!(parse_args(&["--bogus"]).is_err());
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("abc"), "abc");
        let key = "02".repeat(33);
        assert_eq!(shorten(&key), format!("{}…{}", &key[..10], &key[60..]));
    }
}
