use crate::config::Config;
use crate::devices::DeviceBackend;
use crate::devices::linux::LinuxBackend;
use crate::discovery::{Discovery, DiscoveryEvent};
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use log::info;
use std::future::Future;
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{MissedTickBehavior, interval};

/// Runs the daemon against the real hardware until SIGINT or SIGTERM.
pub async fn run(config: &Config) -> Result<()> {
    let mut discovery = Discovery::new(&config.udev_tag)?;
    let mut orchestrator = Orchestrator::new(LinuxBackend, config.max_events)?;
    orchestrator.watch_discovery(discovery.as_raw_fd())?;
    orchestrator.handle_discovery(discovery.enumerate()?)?;
    info!("Watching udev tag \"{}\"", config.udev_tag);

    let mut terminate = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    };

    drive(
        orchestrator,
        || discovery.drain(),
        Duration::from_millis(config.blink_interval_ms),
        shutdown,
    )
    .await
}

/// The event loop: epoll readiness, the LED blink tick and shutdown.
pub async fn drive<B, D, S>(
    mut orchestrator: Orchestrator<B>,
    mut discover: D,
    blink_interval: Duration,
    shutdown: S,
) -> Result<()>
where
    B: DeviceBackend,
    D: FnMut() -> Vec<DiscoveryEvent>,
    S: Future<Output = ()>,
{
    // SAFETY: the epoll fd belongs to the orchestrator, which outlives
    // `epoll`; it is dropped before shutdown closes anything.
    let epoll = unsafe { AsyncFd::register_with_interest(orchestrator.as_raw_fd(), Interest::READABLE) }
        .map_err(io::Error::from)?;
    let mut blink = interval(blink_interval);
    blink.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            guard = epoll.readable() => {
                let mut guard = guard?;
                let handled = orchestrator.poll(Some(Duration::ZERO), &mut discover)?;
                // A full batch may have left events behind.
                if handled < orchestrator.multiplexer().max_events() {
                    guard.clear_ready();
                }
            }
            _ = blink.tick() => orchestrator.blink_pairing_leds(),
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    drop(epoll);
    orchestrator.shutdown()
}
