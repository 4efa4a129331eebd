//! Synthetic price feed (spec §4.16): a random walk per ticker, driven by a
//! timer at `rates.price_feed_rate_us`, broadcasting [`TickerPrice`] on the
//! market bus whenever a tick changes the rounded price. Fluctuation
//! parameters re-randomize on `[100ms, 5s]`, independent of the tick rate.

use crate::bus::BusHub;
use crate::control::StopToken;
use crate::wire::messages::{Ticker, TickerPrice};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

const RESEED_MIN: Duration = Duration::from_millis(100);
const RESEED_MAX: Duration = Duration::from_millis(5000);

/// One ticker's walk state: a continuous `price` that accumulates a
/// per-tick step, and the broadcast threshold (`last_published`) so a tick
/// that doesn't move the rounded price doesn't spam the bus.
struct TickerState {
    ticker: Ticker,
    price: f64,
    last_published: u32,
    step_scale: f64,
    next_reseed: Instant,
}

impl TickerState {
    fn new(ticker: Ticker, starting_price: u32, now: Instant, rng: &mut impl Rng) -> Self {
        TickerState {
            ticker,
            price: starting_price as f64,
            last_published: starting_price,
            step_scale: reseeded_step_scale(rng),
            next_reseed: now + reseed_interval(rng),
        }
    }

    /// Advances the walk by one tick. Returns `Some(price)` when the
    /// rounded price changed from what was last published.
    fn tick(&mut self, now: Instant, rng: &mut impl Rng) -> Option<u32> {
        if now >= self.next_reseed {
            self.step_scale = reseeded_step_scale(rng);
            self.next_reseed = now + reseed_interval(rng);
        }
        let step: f64 = rng.random_range(-1.0..=1.0) * self.step_scale;
        self.price = (self.price + step).max(1.0);
        let rounded = self.price.round() as u32;
        if rounded != self.last_published {
            self.last_published = rounded;
            Some(rounded)
        } else {
            None
        }
    }
}

fn reseed_interval(rng: &mut impl Rng) -> Duration {
    let millis = rng.random_range(RESEED_MIN.as_millis() as u64..=RESEED_MAX.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Step size as a small fraction of a typical quoted price; re-picked on
/// every reseed so the walk's volatility drifts over time instead of
/// staying fixed for the life of the feed.
fn reseeded_step_scale(rng: &mut impl Rng) -> f64 {
    rng.random_range(0.01..=2.0)
}

/// Owns the running price-feed thread. Dropping this does not stop the
/// thread — callers stop it via the shared [`StopToken`] and may then
/// `join` separately if they kept the handle.
pub struct PriceFeed;

impl PriceFeed {
    /// Spawns the feed's timer thread, seeded with one walk per ticker in
    /// `tickers`, each starting at `starting_price`. Runs until `stop` is
    /// set, waking every `tick_period`.
    pub fn start(
        bus: Arc<BusHub>,
        tickers: Vec<Ticker>,
        starting_price: u32,
        tick_period: Duration,
        stop: StopToken,
    ) -> std::thread::JoinHandle<()> {
        crate::affinity::spawn_pinned("price-feed", None, false, move || {
            let mut rng = rand::rng();
            let now = Instant::now();
            let mut states: Vec<TickerState> = tickers
                .into_iter()
                .map(|ticker| TickerState::new(ticker, starting_price, now, &mut rng))
                .collect();

            while !stop.is_stopped() {
                let now = Instant::now();
                for state in &mut states {
                    if let Some(price) = state.tick(now, &mut rng) {
                        bus.market.post(TickerPrice {
                            ticker: state.ticker,
                            price,
                        });
                    }
                }
                std::thread::sleep(tick_period);
            }
        })
    }
}
