//! Transport contract (spec §4.7): two implementations, one interface.

/// Outcome of an I/O operation, plus how many bytes moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoResult {
    pub ok: bool,
    pub would_block: bool,
    pub closed: bool,
    pub error: bool,
    pub bytes: usize,
}

impl IoResult {
    pub fn ok(bytes: usize) -> Self {
        IoResult {
            ok: true,
            bytes,
            ..Default::default()
        }
    }

    pub fn would_block() -> Self {
        IoResult {
            would_block: true,
            ..Default::default()
        }
    }

    pub fn closed() -> Self {
        IoResult {
            closed: true,
            ..Default::default()
        }
    }

    pub fn error() -> Self {
        IoResult {
            error: true,
            ..Default::default()
        }
    }
}

/// A byte-oriented endpoint the channel frames on top of. `asyncRx`/
/// `asyncTx` own their own scheduling (tokio tasks for the socket
/// transport, the reactor for shared memory); `syncRx`/`syncTx` are
/// trusted-path variants for callers that already know a message is
/// ready and just need to pull it under a bounded spin.
#[allow(async_fn_in_trait)]
pub trait Transport: Send {
    async fn async_rx(&mut self, buf: &mut [u8]) -> IoResult;
    async fn async_tx(&mut self, bytes: &[u8]) -> IoResult;

    fn sync_rx(&mut self, buf: &mut [u8]) -> IoResult;
    fn sync_tx(&mut self, bytes: &[u8]) -> IoResult;

    /// Idempotent.
    fn close(&mut self);
}
