/// Bounded worker pool over an indexed job list.
///
/// Jobs fan out over `workers` scoped threads through a bounded
/// crossbeam channel and results come back tagged with their input index,
/// so the output order matches the input order regardless of which worker
/// finished first. Each worker builds its own state via `init`; inference
/// sessions and decoder handles are never shared between threads.
pub fn run_indexed<T, R, S, I, F>(items: Vec<T>, workers: usize, init: I, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    I: Fn() -> S + Sync,
    F: Fn(&mut S, T) -> R + Sync,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, total);

    let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, T)>(workers);
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, R)>();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let init = &init;
            let work = &work;
            scope.spawn(move || {
                let mut state = init();
                for (index, item) in job_rx {
                    if result_tx.send((index, work(&mut state, item))).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        for job in items.into_iter().enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut results: Vec<(usize, R)> = result_rx.iter().collect();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, r)| r).collect()
    })
}
