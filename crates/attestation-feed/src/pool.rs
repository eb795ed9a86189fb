// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{future::Future, sync::Arc};

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Limits the number of futures that are in flight at once.
///
/// Admission is first come, first served: the tokio semaphore queues waiters fairly. The slot is
/// held by a permit guard, so it is returned whether the task succeeds, fails or is dropped.
#[derive(Clone, Debug)]
pub struct BoundedTaskPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Default for BoundedTaskPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl BoundedTaskPool {
    /// Capacity for general purpose fan-out.
    pub const DEFAULT_CAPACITY: usize = 9;

    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { semaphore: Arc::new(Semaphore::new(capacity)), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Run `task` once a slot is free and return its output.
    pub async fn execute<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        let _permit =
            self.semaphore.acquire().await.expect("task pool semaphore is never closed");
        task.await
    }

    /// Run every task through the pool. The output keeps the input order regardless of which
    /// task finishes first, and failures do not cut the others short.
    pub async fn execute_all<I, F>(&self, tasks: I) -> Vec<F::Output>
    where
        I: IntoIterator<Item = F>,
        F: Future,
    {
        join_all(tasks.into_iter().map(|task| self.execute(task))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn never_exceeds_capacity() {
        let pool = BoundedTaskPool::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..20).map(|i| {
            let current = current.clone();
            let peak = peak.clone();
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                i
            }
        });

        let results = pool.execute_all(tasks).await;

        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let pool = BoundedTaskPool::new(4);
        // Later tasks finish first.
        let tasks = (0..8u64).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(40 - i * 5)).await;
            i
        });

        assert_eq!(pool.execute_all(tasks).await, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn admission_is_fifo() {
        let pool = BoundedTaskPool::new(1);
        let started = Arc::new(Mutex::new(Vec::new()));

        let tasks = (0..5).map(|i| {
            let started = started.clone();
            async move {
                started.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
        pool.execute_all(tasks).await;

        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn failures_release_the_slot() {
        let pool = BoundedTaskPool::new(2);

        let res: Result<(), &str> = pool.execute(async { Err("boom") }).await;
        assert_eq!(res, Err("boom"));
        assert_eq!(pool.in_flight(), 0);

        let results = pool
            .execute_all(vec![
                Box::pin(async { Err::<u32, &str>("first") })
                    as std::pin::Pin<Box<dyn Future<Output = Result<u32, &str>> + Send>>,
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(7)
                }),
            ])
            .await;
        assert_eq!(results, vec![Err("first"), Ok(7)]);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(BoundedTaskPool::new(0).capacity(), 1);
        assert_eq!(BoundedTaskPool::default().capacity(), 9);
    }
}
