use std::collections::VecDeque;
use std::mem::drop;
use std::ops::{Deref, DerefMut, Drop};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use futures::channel::oneshot;

#[async_trait]
pub trait Factory: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: Send + 'static;

    async fn make(&self) -> Result<Self::Output, Self::Error>;

    /// Broken connections are discarded on release instead of going back to the pool.
    fn is_broken(_conn: &Self::Output) -> bool {
        false
    }
}

/// A checked-out connection. Dropping it returns the connection to the pool.
pub struct Connect<F: Factory> {
    connect: Option<F::Output>,
    pool: Weak<SharedPool<F>>,
}

impl<F: Factory> Deref for Connect<F> {
    type Target = F::Output;

    fn deref(&self) -> &F::Output {
        self.connect.as_ref().expect("connection used after release")
    }
}

impl<F: Factory> DerefMut for Connect<F> {
    fn deref_mut(&mut self) -> &mut F::Output {
        self.connect.as_mut().expect("connection used after release")
    }
}

impl<F: Factory> Drop for Connect<F> {
    fn drop(&mut self) {
        if let (Some(connect), Some(pool)) = (self.connect.take(), self.pool.upgrade()) {
            SharedPool::release(pool, connect);
        }
    }
}

struct InternalPool<C> {
    waiters: VecDeque<oneshot::Sender<C>>,
    conns: VecDeque<C>,
    num: usize,
}

impl<C> InternalPool<C> {
    fn put_back(&mut self, mut connect: C) {
        while let Some(waiter) = self.waiters.pop_front() {
            if let Err(returned) = waiter.send(connect) {
                connect = returned;
            } else {
                return;
            }
        }
        self.conns.push_back(connect);
    }
}

struct SharedPool<F: Factory> {
    factory: F,
    max: usize,
    inner: Mutex<InternalPool<F::Output>>,
}

impl<F: Factory> SharedPool<F> {
    fn lock(&self) -> MutexGuard<'_, InternalPool<F::Output>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(pool: Arc<SharedPool<F>>, connect: F::Output) {
        let mut internal = pool.lock();
        if !F::is_broken(&connect) {
            internal.put_back(connect);
            return;
        }
        internal.num -= 1;
        log::warn!("A broken connection was dropped from the pool");
        if internal.waiters.is_empty() {
            return;
        }
        internal.num += 1;
        drop(internal);
        tokio::spawn(async move {
            match pool.factory.make().await {
                Ok(connect) => pool.lock().put_back(connect),
                Err(_) => {
                    log::error!("Failed to replace a broken connection");
                    pool.lock().num -= 1;
                }
            }
        });
    }
}

enum Checkout<C> {
    Ready(C),
    Make,
    Wait(oneshot::Receiver<C>),
}

pub struct Status {
    pub idle: usize,
    pub total: usize,
    pub waiting: usize,
}

pub struct Pool<F: Factory> {
    inner: Arc<SharedPool<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Pool {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Factory> Pool<F> {
    /// Opens `num` connections up front; at most `max` are ever open at once.
    pub async fn with_num(num: usize, max: usize, factory: F) -> Result<Pool<F>, F::Error> {
        let max = max.max(num).max(1);
        let mut conns: VecDeque<F::Output> = VecDeque::with_capacity(num);
        for _ in 0..num {
            conns.push_back(factory.make().await?);
        }
        let waiters = VecDeque::new();
        let internal_pool = InternalPool { waiters, conns, num };
        let shared_pool = SharedPool {
            inner: Mutex::new(internal_pool),
            factory,
            max,
        };
        Ok(Pool {
            inner: Arc::new(shared_pool),
        })
    }

    fn wrap(&self, connect: F::Output) -> Connect<F> {
        Connect {
            connect: Some(connect),
            pool: Arc::downgrade(&self.inner),
        }
    }

    pub async fn get(&self) -> Result<Connect<F>, F::Error> {
        loop {
            let checkout = {
                let mut internal = self.inner.lock();
                if let Some(connect) = internal.conns.pop_front() {
                    Checkout::Ready(connect)
                } else if internal.num < self.inner.max {
                    internal.num += 1;
                    Checkout::Make
                } else {
                    let (tx, rx) = oneshot::channel::<F::Output>();
                    internal.waiters.push_back(tx);
                    Checkout::Wait(rx)
                }
            };
            match checkout {
                Checkout::Ready(connect) => return Ok(self.wrap(connect)),
                Checkout::Make => {
                    return match self.inner.factory.make().await {
                        Ok(connect) => Ok(self.wrap(connect)),
                        Err(e) => {
                            self.inner.lock().num -= 1;
                            Err(e)
                        }
                    };
                }
                Checkout::Wait(rx) => {
                    if let Ok(connect) = rx.await {
                        return Ok(self.wrap(connect));
                    }
                }
            }
        }
    }

    pub fn status(&self) -> Status {
        let internal = self.inner.lock();
        Status {
            idle: internal.conns.len(),
            total: internal.num,
            waiting: internal.waiters.len(),
        }
    }
}

#[cfg(test)]
struct Counter(std::sync::atomic::AtomicUsize);

#[cfg(test)]
#[async_trait]
impl Factory for Counter {
    type Output = usize;
    type Error = std::convert::Infallible;

    async fn make(&self) -> Result<usize, Self::Error> {
        Ok(self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
    }

    fn is_broken(conn: &usize) -> bool {
        *conn >= 100
    }
}

#[tokio::test]
async fn pool_test() {
    use std::sync::atomic::AtomicUsize;

    let pool = Pool::with_num(2, 2, Counter(AtomicUsize::new(0))).await.unwrap();
    let a = pool.get().await.unwrap();
    let b = pool.get().await.unwrap();
    assert_eq!((*a, *b), (0, 1));
    drop(a);
    let c = pool.get().await.unwrap();
    assert_eq!(*c, 0);

    let waiting_pool = pool.clone();
    let waiter = tokio::spawn(async move { *waiting_pool.get().await.unwrap() });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    drop(b);
    assert_eq!(waiter.await.unwrap(), 1);
    assert_eq!(pool.status().total, 2);
    drop(c);
    assert_eq!(pool.status().idle, 2);
}

#[tokio::test]
async fn pool_grows_on_demand() {
    use std::sync::atomic::AtomicUsize;

    let pool = Pool::with_num(0, 3, Counter(AtomicUsize::new(0))).await.unwrap();
    assert_eq!(pool.status().total, 0);
    let a = pool.get().await.unwrap();
    let b = pool.get().await.unwrap();
    assert_eq!(pool.status().total, 2);
    drop(a);
    drop(b);
    assert_eq!(pool.status().idle, 2);
    assert_eq!(pool.status().waiting, 0);
}

#[tokio::test]
async fn broken_connection_is_discarded() {
    use std::sync::atomic::AtomicUsize;

    let pool = Pool::with_num(1, 1, Counter(AtomicUsize::new(100))).await.unwrap();
    let broken = pool.get().await.unwrap();
    assert_eq!(*broken, 100);
    drop(broken);
    let status = pool.status();
    assert_eq!(status.total, 0);
    assert_eq!(status.idle, 0);
}
