use std::sync::atomic::AtomicUsize;
use crossbeam::channel::Sender;
use rayon::prelude::*;

pub trait ParallelProcessor {
    fn init_parallel_processing() {
        // build_global fails if a pool already exists, which is fine
        if rayon::current_num_threads() == 1 {
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(num_cpus::get())
                .build_global()
            {
                log::debug!("global thread pool already configured: {}", e);
            }
        }
        log::debug!("using {} CPU threads for processing", rayon::current_num_threads());
    }

    fn get_progress_counter() -> AtomicUsize {
        AtomicUsize::new(0)
    }

    /// Run `f` over `items` on the pool and send each result down `tx` as soon as it
    /// is ready. Blocks until every item is done; results arrive in completion order.
    fn stream_results<T, R, F>(items: Vec<T>, f: F, tx: Sender<R>)
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        items.into_par_iter().for_each_with(tx, |tx, item| {
            // a closed receiver means the consumer gave up on this batch
            let _ = tx.send(f(item));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    struct Worker;
    impl ParallelProcessor for Worker {}

    #[test]
    fn streams_every_result() {
        let (tx, rx) = channel::unbounded();
        Worker::stream_results((0..50).collect(), |n: u32| n * 2, tx);

        let mut got: Vec<u32> = rx.iter().collect();
        got.sort();
        assert_eq!(got, (0..50).map(|n| n * 2).collect::<Vec<_>>());
    }
}
