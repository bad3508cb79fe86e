use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockInfo {
    pub ticker: &'static str,
    pub name: &'static str,
    pub sector: &'static str,
}

const fn stock(ticker: &'static str, name: &'static str, sector: &'static str) -> StockInfo {
    StockInfo {
        ticker,
        name,
        sector,
    }
}

/// Sample S&P 500 universe offered when building an environment, grouped by
/// sector. Environments may still use tickers outside this list.
pub static CATALOG: [StockInfo; 34] = [
    stock("AAPL", "Apple Inc.", "Technology"),
    stock("MSFT", "Microsoft Corporation", "Technology"),
    stock("GOOGL", "Alphabet Inc.", "Technology"),
    stock("AMZN", "Amazon.com Inc.", "Technology"),
    stock("NVDA", "NVIDIA Corporation", "Technology"),
    stock("META", "Meta Platforms Inc.", "Technology"),
    stock("JPM", "JPMorgan Chase & Co.", "Financial"),
    stock("BAC", "Bank of America Corp.", "Financial"),
    stock("WFC", "Wells Fargo & Co.", "Financial"),
    stock("GS", "Goldman Sachs Group Inc.", "Financial"),
    stock("JNJ", "Johnson & Johnson", "Healthcare"),
    stock("UNH", "UnitedHealth Group Inc.", "Healthcare"),
    stock("PFE", "Pfizer Inc.", "Healthcare"),
    stock("ABT", "Abbott Laboratories", "Healthcare"),
    stock("HD", "Home Depot Inc.", "Consumer Discretionary"),
    stock("NKE", "Nike Inc.", "Consumer Discretionary"),
    stock("MCD", "McDonald's Corp.", "Consumer Discretionary"),
    stock("SBUX", "Starbucks Corp.", "Consumer Discretionary"),
    stock("BA", "Boeing Co.", "Industrial"),
    stock("CAT", "Caterpillar Inc.", "Industrial"),
    stock("GE", "General Electric Co.", "Industrial"),
    stock("HON", "Honeywell International Inc.", "Industrial"),
    stock("XOM", "Exxon Mobil Corp.", "Energy"),
    stock("CVX", "Chevron Corp.", "Energy"),
    stock("COP", "ConocoPhillips", "Energy"),
    stock("SLB", "Schlumberger NV", "Energy"),
    stock("VZ", "Verizon Communications Inc.", "Communication Services"),
    stock("T", "AT&T Inc.", "Communication Services"),
    stock("CMCSA", "Comcast Corp.", "Communication Services"),
    stock("NFLX", "Netflix Inc.", "Communication Services"),
    stock("LIN", "Linde plc", "Materials"),
    stock("DD", "DuPont de Nemours Inc.", "Materials"),
    stock("DOW", "Dow Inc.", "Materials"),
    stock("FCX", "Freeport-McMoRan Inc.", "Materials"),
];

pub fn find(ticker: &str) -> Option<&'static StockInfo> {
    let ticker = ticker.trim();
    CATALOG
        .iter()
        .find(|stock| stock.ticker.eq_ignore_ascii_case(ticker))
}

/// Case-insensitive substring match on ticker or company name. A blank
/// query returns the whole catalog.
pub fn search(query: &str) -> Vec<&'static StockInfo> {
    let query = query.trim().to_lowercase();
    CATALOG
        .iter()
        .filter(|stock| {
            query.is_empty()
                || stock.ticker.to_lowercase().contains(&query)
                || stock.name.to_lowercase().contains(&query)
        })
        .collect()
}

pub fn sectors() -> Vec<&'static str> {
    let mut sectors: Vec<&'static str> = Vec::new();
    for stock in CATALOG.iter() {
        if !sectors.contains(&stock.sector) {
            sectors.push(stock.sector);
        }
    }
    sectors
}

pub fn in_sector(sector: &str) -> Vec<&'static StockInfo> {
    CATALOG
        .iter()
        .filter(|stock| stock.sector.eq_ignore_ascii_case(sector.trim()))
        .collect()
}
