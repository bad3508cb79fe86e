use crate::stocks::{in_sector, search, sectors};
use anyhow::{anyhow, Result};

pub async fn run(query: Option<&str>, sector: Option<&str>) -> Result<()> {
    let matches = match sector {
        Some(sector) => {
            let listed = in_sector(sector);
            if listed.is_empty() {
                return Err(anyhow!(
                    "unknown sector {} (known: {})",
                    sector,
                    sectors().join(", ")
                ));
            }
            let query = query.unwrap_or("");
            let found = search(query);
            listed
                .into_iter()
                .filter(|stock| found.contains(stock))
                .collect::<Vec<_>>()
        }
        None => search(query.unwrap_or("")),
    };

    if matches.is_empty() {
        println!("No stocks match");
        return Ok(());
    }
    for sector in sectors() {
        let in_group: Vec<_> = matches.iter().filter(|s| s.sector == sector).collect();
        if in_group.is_empty() {
            continue;
        }
        println!("{}", sector);
        for stock in in_group {
            println!("  {:<6} {}", stock.ticker, stock.name);
        }
    }
    Ok(())
}
