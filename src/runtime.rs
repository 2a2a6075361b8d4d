/// Thread plumbing: cooperative shutdown and CPU pinning
///
/// Both loop threads check the shutdown flag once per iteration and wind
/// down cooperatively; nothing is interrupted mid-packet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Injected cancellation token shared by the producer and consumer loops.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Pin the calling thread to the given CPU. Returns `false` when the CPU id
/// is unknown or pinning is unsupported on this platform.
pub fn pin_to_core(cpu: u32) -> bool {
    match core_affinity::get_core_ids() {
        Some(ids) => ids
            .into_iter()
            .find(|core| core.id == cpu as usize)
            .map(core_affinity::set_for_current)
            .unwrap_or(false),
        None => false,
    }
}
