//! CPU pinning and real-time elevation for long-lived threads (spec §5
//! "CPU placement"): network, gateway, each shard, and the SHM reactor.

use std::thread::{self, JoinHandle};

/// Spawns `f` on a new OS thread, optionally pinned to `core_id` and
/// elevated to the real-time (`SCHED_FIFO`) scheduling class. Pinning and
/// elevation failures are logged and otherwise ignored — a thread that
/// can't be pinned still runs correctly, just without the placement
/// guarantee, and refusing to start would contradict spec §5's "no
/// component blocks indefinitely on shutdown" spirit applied to startup.
pub fn spawn_pinned<F>(name: &str, core_id: Option<usize>, realtime: bool, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    let name = name.to_string();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            if let Some(core_id) = core_id {
                pin_current_thread(core_id);
            }
            if realtime {
                elevate_current_thread();
            }
            f();
        })
        .unwrap_or_else(|e| panic!("failed to spawn thread {name}: {e}"))
}

fn pin_current_thread(core_id: usize) {
    let cores = core_affinity::get_core_ids().unwrap_or_default();
    match cores.into_iter().find(|c| c.id == core_id) {
        Some(core) => {
            if !core_affinity::set_for_current(core) {
                tracing::warn!(core_id, "failed to pin thread to core");
            }
        }
        None => tracing::warn!(core_id, "core id not present on this machine"),
    }
}

#[cfg(target_os = "linux")]
fn elevate_current_thread() {
    unsafe {
        let param = libc::sched_param { sched_priority: 1 };
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
            tracing::warn!("failed to elevate thread to SCHED_FIFO (needs CAP_SYS_NICE)");
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn elevate_current_thread() {
    tracing::debug!("real-time scheduling elevation is only implemented on linux");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn spawn_pinned_runs_the_closure() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        let handle = spawn_pinned("test-thread", None, false, move || {
            ran2.store(true, Ordering::SeqCst);
        });
        handle.join().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
