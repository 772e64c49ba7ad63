#![allow(dead_code)]

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

pub type Pool = respool::Pool<Manager>;

/// Hands out increasing ids and records every call.
#[derive(Debug)]
pub struct Manager {
    next_id: AtomicUsize,
    /// Creations left before the factory starts failing.
    creates_left: AtomicUsize,
    pub fail_create: AtomicBool,
    /// Number of upcoming creations that fail.
    fail_next: AtomicUsize,
    pub fail_destroy: AtomicBool,
    /// Ids below this fail the health check.
    pub healthy_from: AtomicUsize,
    /// Milliseconds every health check takes.
    pub check_delay_ms: AtomicU64,
    /// Milliseconds every destruction takes.
    pub destroy_delay_ms: AtomicU64,
    created: AtomicUsize,
    destroyed: Mutex<Vec<usize>>,
}

impl Manager {
    pub fn new() -> Self {
        init_logging();
        Self {
            next_id: AtomicUsize::new(0),
            creates_left: AtomicUsize::new(usize::MAX),
            fail_create: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
            fail_destroy: AtomicBool::new(false),
            healthy_from: AtomicUsize::new(0),
            check_delay_ms: AtomicU64::new(0),
            destroy_delay_ms: AtomicU64::new(0),
            created: AtomicUsize::new(0),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(creates: usize) -> Self {
        let manager = Self::new();
        manager.creates_left.store(creates, Ordering::SeqCst);
        manager
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> Vec<usize> {
        let mut ids = self.destroyed.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next(&self, creates: usize) {
        self.fail_next.store(creates, Ordering::SeqCst);
    }

    pub fn set_check_delay(&self, delay: Duration) {
        self.check_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_destroy_delay(&self, delay: Duration) {
        self.destroy_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

async fn delay(ms: &AtomicU64) {
    let ms = ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl respool::Manager for Manager {
    type Type = usize;
    type Error = &'static str;

    async fn create(&self) -> Result<usize, &'static str> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err("create failed");
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err("create failed");
        }
        let left = self.creates_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err("create failed");
        }
        if left != usize::MAX {
            self.creates_left.store(left - 1, Ordering::SeqCst);
        }
        let _ = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn destroy(&self, obj: usize) -> Result<(), &'static str> {
        delay(&self.destroy_delay_ms).await;
        self.destroyed.lock().unwrap().push(obj);
        if self.fail_destroy.load(Ordering::SeqCst) {
            Err("destroy failed")
        } else {
            Ok(())
        }
    }

    async fn check(&self, obj: &mut usize) -> Result<(), &'static str> {
        delay(&self.check_delay_ms).await;
        if *obj < self.healthy_from.load(Ordering::SeqCst) {
            Err("unhealthy")
        } else {
            Ok(())
        }
    }
}

/// Routes pool logs to the test output, filtered by `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn pool(initial_size: usize, max_idle: usize, max_size: usize) -> Pool {
    Pool::builder(Manager::new())
        .max_size(max_size)
        .max_idle(max_idle)
        .initial_size(initial_size)
        .build()
        .await
        .unwrap()
}

/// Polls `cond` until it holds, failing the test after one second.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

/// Asserts that `fut` does not complete within a short grace period.
pub async fn assert_pending<F: Future + Unpin>(fut: &mut F) {
    assert!(
        tokio::time::timeout(Duration::from_millis(50), fut)
            .await
            .is_err(),
        "future completed unexpectedly"
    );
}
