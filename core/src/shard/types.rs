//! Market data: ticker → shard assignment (spec §4.14 "Dispatch").
//!
//! Built once at startup from the configured ticker universe, then shared
//! read-only across every shard thread — spec §5's "Market data ... is
//! built once and then read-only".

use crate::wire::messages::Ticker;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickerData {
    pub worker_id: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MarketData {
    tickers: HashMap<Ticker, TickerData>,
}

impl MarketData {
    /// Assigns each ticker to a shard in round-robin order, stable
    /// regardless of `HashMap` iteration order since it walks the input
    /// slice in place.
    pub fn assign(tickers: &[Ticker], shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut map = HashMap::with_capacity(tickers.len());
        for (i, ticker) in tickers.iter().enumerate() {
            map.insert(
                *ticker,
                TickerData {
                    worker_id: i % shard_count,
                },
            );
        }
        MarketData { tickers: map }
    }

    pub fn worker_for(&self, ticker: &Ticker) -> Option<usize> {
        self.tickers.get(ticker).map(|t| t.worker_id)
    }

    /// The full assigned ticker universe, in no particular order — used by
    /// the price feed to know which tickers to simulate.
    pub fn tickers(&self) -> impl Iterator<Item = &Ticker> {
        self.tickers.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_tickers_round_robin() {
        let tickers = [*b"AAAA", *b"BBBB", *b"CCCC", *b"DDDD"];
        let market = MarketData::assign(&tickers, 2);
        assert_eq!(market.worker_for(&tickers[0]), Some(0));
        assert_eq!(market.worker_for(&tickers[1]), Some(1));
        assert_eq!(market.worker_for(&tickers[2]), Some(0));
        assert_eq!(market.worker_for(&tickers[3]), Some(1));
    }

    #[test]
    fn unknown_ticker_has_no_assignment() {
        let market = MarketData::assign(&[*b"AAAA"], 4);
        assert_eq!(market.worker_for(&[0u8; 4]), None);
    }
}
