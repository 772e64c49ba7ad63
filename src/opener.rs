use std::sync::Weak;

use tokio::sync::mpsc;
use tracing::trace;

use crate::{pool::PoolInner, Manager};

/// One unit of work for the opener: create a single resource.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OpenRequest;

pub(crate) type OpenQueue = mpsc::Sender<OpenRequest>;

pub(crate) fn channel(cap: usize) -> (OpenQueue, mpsc::Receiver<OpenRequest>) {
    mpsc::channel(cap)
}

/// Spawns the background task creating resources for parked callers.
///
/// The task only holds a [`Weak`] reference to the pool and stops once the
/// queue's sender is gone, i.e. when the pool is closed or dropped.
pub(crate) fn spawn<M: Manager>(
    pool: Weak<PoolInner<M>>,
    mut requests: mpsc::Receiver<OpenRequest>,
) {
    let _opener = tokio::spawn(async move {
        while let Some(OpenRequest) = requests.recv().await {
            let pool = match pool.upgrade() {
                Some(pool) => pool,
                None => break,
            };
            if pool.is_closed() {
                break;
            }
            pool.open_new().await;
        }
        trace!("resource opener stopped");
    });
}
