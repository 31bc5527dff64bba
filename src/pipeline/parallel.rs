use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per logical CPU
    #[default]
    Auto,
    Manual(NonZeroUsize),
}

impl WorkerCount {
    pub fn get(self) -> usize {
        match self {
            WorkerCount::Auto => num_cpus::get(),
            WorkerCount::Manual(n) => n.get(),
        }
    }
}

/// Maps `fun` over `items` using up to `worker_count` threads.
///
/// Workers pull item indices from a shared counter, results are returned in item order
/// regardless of which worker produced them. Panics in workers are propagated.
pub fn parallel_map<I, O, F>(items: &[I], fun: F, worker_count: WorkerCount) -> Vec<O>
where
    I: Sync,
    O: Send,
    F: Fn(&I) -> O + Sync,
{
    let worker_count = worker_count.get().min(items.len());
    if worker_count <= 1 {
        return items.iter().map(fun).collect();
    }

    let next_index = AtomicUsize::new(0);
    let next_index = &next_index;
    let fun = &fun;

    let mut results: Vec<Option<O>> = Vec::new();
    results.resize_with(items.len(), || None);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                log::trace!("starting worker{worker_id}");
                scope.spawn(move || {
                    let mut produced = Vec::new();
                    loop {
                        let index = next_index.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(index) else {
                            break;
                        };
                        produced.push((index, fun(item)));
                    }
                    produced
                })
            })
            .collect();

        for handle in handles {
            let produced = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            for (index, output) in produced {
                results[index] = Some(output);
            }
        }
    });

    results
        .into_iter()
        .map(|output| output.unwrap_or_else(|| unreachable!("Every item is processed once")))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn worker_count_strategy() -> impl Strategy<Value = WorkerCount> {
        prop_oneof![
            (1..32usize).prop_map(|n| WorkerCount::Manual(NonZeroUsize::new(n).unwrap())),
            Just(WorkerCount::Auto),
        ]
    }

    #[proptest]
    fn keeps_item_order(
        #[strategy(worker_count_strategy())] worker_count: WorkerCount,
        #[strategy(0..1000usize)] n: usize,
    ) {
        let items: Vec<usize> = (0..n).collect();
        let squares = parallel_map(&items, |i| i * i, worker_count);
        prop_assert_eq!(squares, items.iter().map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn uses_multiple_threads() {
        let items: Vec<usize> = (0..64).collect();
        let ids = parallel_map(
            &items,
            |_| {
                std::thread::sleep(std::time::Duration::from_millis(1));
                std::thread::current().id()
            },
            WorkerCount::Manual(NonZeroUsize::new(4).unwrap()),
        );
        let mut distinct = ids.clone();
        distinct.sort_by_key(|id| format!("{id:?}"));
        distinct.dedup();
        assert!(distinct.len() > 1);
    }

    #[test]
    #[should_panic]
    fn propagates_panics() {
        let items: Vec<usize> = (0..100).collect();
        parallel_map(
            &items,
            |&i| {
                if i == 50 {
                    panic!("Don't panic!");
                }
            },
            WorkerCount::Manual(NonZeroUsize::new(4).unwrap()),
        );
    }
}
