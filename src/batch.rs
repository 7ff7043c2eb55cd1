extern crate num_cpus;

use crate::{
    error::{Result, ShaderGraphError},
    function_generator::FunctionGenerator,
    instantiation::InstantiationParameters,
    instantiator::ShaderInstantiator,
    provider::GraphProvider,
    scaffold::ScaffoldGenerator,
};
use std::{
    collections::VecDeque,
    sync::{mpsc, Arc, Mutex},
    thread,
};
use tracing::{debug, warn};

/// One shader to instantiate as part of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryPoint {
    pub file: String,
    pub function: String,
    pub parameters: InstantiationParameters,
}

impl EntryPoint {
    pub fn new(file: &str, function: &str, parameters: InstantiationParameters) -> Self {
        Self {
            file: file.to_string(),
            function: function.to_string(),
            parameters,
        }
    }
}

/// Instantiates independent entry points on up to one thread per CPU. Every entry point gets
/// its own work list, so only the instantiator and the provider are shared. Results come
/// back in the same order as `entry_points`.
pub fn instantiate_batch<F, S>(
    instantiator: Arc<ShaderInstantiator<F, S>>,
    provider: Arc<dyn GraphProvider>,
    entry_points: Vec<EntryPoint>,
) -> Vec<Result<Vec<String>>>
where
    F: FunctionGenerator + 'static,
    S: ScaffoldGenerator + 'static,
{
    struct ThreadMessage {
        index: usize,
        fragments: Result<Vec<String>>,
    }

    let count = entry_points.len();
    let max_count = num_cpus::get().min(count).max(1);
    let queue: Arc<Mutex<VecDeque<(usize, EntryPoint)>>> =
        Arc::new(Mutex::new(entry_points.into_iter().enumerate().collect()));
    let (send, recv) = mpsc::channel::<ThreadMessage>();

    debug!(entry_points = count, threads = max_count, "starting batch");

    let workers: Vec<_> = (0..max_count)
        .map(|_| {
            let instantiator = Arc::clone(&instantiator);
            let provider = Arc::clone(&provider);
            let queue = Arc::clone(&queue);
            let send = send.clone();

            thread::spawn(move || loop {
                let next = match queue.lock() {
                    Ok(mut queue) => queue.pop_front(),
                    Err(_) => None,
                };
                let (index, entry_point) = match next {
                    Some(next) => next,
                    None => return,
                };

                let fragments = instantiator.instantiate_entry(
                    provider.as_ref(),
                    &entry_point.file,
                    &entry_point.function,
                    &entry_point.parameters,
                );

                if let Err(e) = send.send(ThreadMessage { index, fragments }) {
                    warn!("{:?}", e);
                }
            })
        })
        .collect();
    drop(send);

    let mut results: Vec<Option<Result<Vec<String>>>> = (0..count).map(|_| None).collect();
    for message in recv {
        results[message.index] = Some(message.fragments);
    }

    for worker in workers {
        if worker.join().is_err() {
            warn!("instantiation worker panicked");
        }
    }

    results
        .into_iter()
        .map(|result| result.unwrap_or(Err(ShaderGraphError::WorkerPanicked)))
        .collect()
}
