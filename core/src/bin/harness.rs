//! Composition harness: wires a `BusHub`, `SessionManager`, the network
//! front end, `OrderGateway`, sharded `Coordinator`, the telemetry drain,
//! and the price feed together and runs them briefly. Locating the real
//! config file and reading the console are out of scope (spec §1); this
//! exists so the wiring itself gets exercised outside of unit tests, with
//! real listeners bound on the network thread's cooperative executor
//! (spec §5).

use hft_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SAMPLE_CONFIG: &str = r#"
    [network]
    url = 0.0.0.0
    port_tcp_up = 9001
    port_tcp_down = 9002
    port_udp = 9003

    [cpu]
    core_system = 0
    core_network = 1
    core_gateway = 2
    cores_app = 3,4

    [rates]
    price_feed_rate_us = 50000
    monitor_rate_ms = 1000
    telemetry_ms = 500

    [shm]
    shm_upstream = /dev/shm/up
    shm_downstream = /dev/shm/down
    shm_telemetry = /dev/shm/telemetry
    shm_size = 1048576

    [log]
    output = stdout
    level = info
"#;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn main() -> CoreResult<()> {
    init_logging();

    let config = Config::from_str(SAMPLE_CONFIG)?;
    config.cpu.validate()?;

    let bus = Arc::new(BusHub::new());
    let stop = StopToken::new();

    let registry = NetworkRegistry::new();
    let session_manager = SessionManager::new(registry.clone());
    session_manager.wire(&bus);

    let gateway = OrderGateway::new(AllocFlags {
        huge: false,
        lock: false,
        prefault: false,
    })?;
    gateway.wire(&bus);

    let tickers = [*b"AAAA", *b"BBBB", *b"CCCC", *b"DDDD"];
    let market_data = Arc::new(MarketData::assign(&tickers, config.cpu.shard_count()));
    let shard_cores: Vec<Option<usize>> = config.cpu.cores_app.iter().map(|c| Some(*c)).collect();
    let _coordinator = Coordinator::start(
        market_data.clone(),
        &bus,
        &shard_cores,
        Duration::from_millis(config.rates.monitor_rate_ms),
        stop.clone(),
    )?;

    let feed_tickers: Vec<_> = market_data.tickers().copied().collect();
    let _feed = PriceFeed::start(
        bus.clone(),
        feed_tickers,
        100,
        Duration::from_micros(config.rates.price_feed_rate_us),
        stop.clone(),
    );

    let _telemetry = TelemetryDrain::start(
        bus.clone(),
        Duration::from_millis(config.rates.telemetry_ms),
        stop.clone(),
    );

    let network_config = config.network.clone();
    let network_core = config.cpu.core_network;
    let network_bus = bus.clone();
    let network_stop = stop.clone();
    let _network = hft_core::affinity::spawn_pinned("network", network_core, false, move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build the network thread's tokio runtime");
        let local = LocalSet::new();
        // `bind` calls into `tokio::net` (`TcpListener::from_std`), which needs
        // a runtime context even outside `block_on`.
        let _guard = runtime.enter();
        let codec: Arc<dyn Codec> = Arc::new(FlatCodec);
        let framer = Arc::new(Framer::new(hft_core::channel::OUT_BUFFER_SIZE));
        match NetworkFront::bind(&network_config, network_bus, codec, framer, registry) {
            Ok(front) => {
                front.run(&local, network_stop.clone());
                runtime.block_on(local.run_until(async move {
                    while !network_stop.is_stopped() {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                }));
            }
            Err(e) => tracing::error!(error = %e, "failed to bind network front end"),
        }
    });

    std::thread::sleep(Duration::from_millis(200));
    stop.stop();
    tracing::info!("harness: shutdown requested, exiting");
    Ok(())
}
