//! Fixed-size pool of encoders sharing one dictionary.
//!
//! Each rayon worker owns one encoder, with the worker index as its encoder
//! id, so encodes on different workers overlap inside the shared window.
//! Submission blocks once `queue_size + nb_workers` jobs are in flight; a
//! bounded `crossbeam_channel` of slot tokens acts as the semaphore.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::ThreadPool as RayonPool;

use crate::dictionary::{DictImage, SharedDictionary};
use crate::encoder::{max_encoded_size, EncodeRequest, Encoder};
use crate::error::GlzError;
use crate::usr::{EncoderUsr, ImageToken, LineChunk};

/// Output granted each time a pooled encode outgrows its initial estimate.
const MORE_SPACE_CHUNK: usize = 64 * 1024;

type FreeImageFn = Arc<dyn Fn(ImageToken) + Send + Sync>;

// ---------------------------------------------------------------------------
// Jobs and results
// ---------------------------------------------------------------------------

/// An image plus the scanline chunks that follow its first lines.
#[derive(Clone, Debug)]
pub struct EncodeJob {
    pub request: EncodeRequest,
    pub more_lines: Vec<LineChunk>,
}

impl EncodeJob {
    pub fn new(request: EncodeRequest) -> Self {
        EncodeJob { request, more_lines: Vec::new() }
    }

    pub fn with_more_lines(mut self, more_lines: Vec<LineChunk>) -> Self {
        self.more_lines = more_lines;
        self
    }
}

#[derive(Clone, Debug)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub image: DictImage,
    pub window_head_distance: u32,
}

pub type EncodeResult = Result<EncodedImage, GlzError>;

/// Callbacks of a pooled encoder: lines come from the current job, output
/// grows on demand and evictions go to the pool's listener.
struct JobUsr {
    pending: VecDeque<LineChunk>,
    on_free_image: FreeImageFn,
}

impl EncoderUsr for JobUsr {
    fn more_space(&mut self) -> usize {
        MORE_SPACE_CHUNK
    }

    fn more_lines(&mut self) -> Option<LineChunk> {
        self.pending.pop_front()
    }

    fn free_image(&mut self, image: ImageToken) {
        (self.on_free_image)(image);
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

struct PoolState {
    pending: usize, // submitted but not yet finished
}

pub struct EncoderPool {
    pool: Arc<RayonPool>,
    dict: Arc<SharedDictionary>,
    encoders: Arc<Vec<Mutex<Encoder<JobUsr>>>>,
    /// Free in-flight slots; submitters take one, finished jobs return it.
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    state: Arc<(Mutex<PoolState>, Condvar)>,
}

impl EncoderPool {
    /// Starts `nb_workers` encoders on `dict`. `on_free_image` hears about
    /// every live image evicted by any of them, from the evicting worker and
    /// under the dictionary lock.
    pub fn new(
        dict: Arc<SharedDictionary>,
        nb_workers: usize,
        queue_size: usize,
        on_free_image: impl Fn(ImageToken) + Send + Sync + 'static,
    ) -> Result<Self, GlzError> {
        if nb_workers < 1 {
            return Err(GlzError::InvalidEncoderCount(nb_workers as u32));
        }
        if queue_size < 1 {
            return Err(GlzError::InvalidQueueSize(queue_size));
        }
        if nb_workers > dict.max_encoders() as usize {
            return Err(GlzError::WorkerCountExceeded { requested: nb_workers, max_encoders: dict.max_encoders() });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nb_workers)
            .thread_name(|i| format!("glz-encoder-{i}"))
            .build()
            .map_err(|e| GlzError::WorkerSpawn(e.to_string()))?;

        let on_free_image: FreeImageFn = Arc::new(on_free_image);
        let encoders = (0..nb_workers)
            .map(|id| {
                let usr = JobUsr { pending: VecDeque::new(), on_free_image: Arc::clone(&on_free_image) };
                Encoder::create(id as u8, Arc::clone(&dict), usr).map(Mutex::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let capacity = queue_size + nb_workers;
        let (slot_tx, slot_rx) = bounded(capacity);
        for _ in 0..capacity {
            slot_tx.send(()).map_err(|_| GlzError::PoolClosed)?;
        }

        log::debug!("encoder pool started: {nb_workers} workers, queue {queue_size}");
        Ok(EncoderPool {
            pool: Arc::new(pool),
            dict,
            encoders: Arc::new(encoders),
            slot_tx,
            slot_rx,
            state: Arc::new((Mutex::new(PoolState { pending: 0 }), Condvar::new())),
        })
    }

    pub fn nb_workers(&self) -> usize {
        self.encoders.len()
    }

    pub fn dictionary(&self) -> &Arc<SharedDictionary> {
        &self.dict
    }

    /// Queues `job`, blocking while the pool is full. The result arrives on
    /// the returned channel once a worker has encoded the image.
    pub fn submit(&self, job: EncodeJob) -> Result<Receiver<EncodeResult>, GlzError> {
        self.slot_rx.recv().map_err(|_| GlzError::PoolClosed)?;

        {
            let (lock, _cvar) = &*self.state;
            lock.lock().unwrap_or_else(PoisonError::into_inner).pending += 1;
        }

        let (result_tx, result_rx) = bounded(1);
        let encoders = Arc::clone(&self.encoders);
        let state = Arc::clone(&self.state);
        let slot_tx = self.slot_tx.clone();
        self.pool.spawn(move || {
            let worker = rayon::current_thread_index().unwrap_or(0) % encoders.len();
            let result = {
                let mut encoder = encoders[worker].lock().unwrap_or_else(PoisonError::into_inner);
                run_job(&mut encoder, job)
            };
            // the submitter may have dropped its receiver
            let _ = result_tx.send(result);

            let (lock, cvar) = &*state;
            let mut s = lock.lock().unwrap_or_else(PoisonError::into_inner);
            s.pending -= 1;
            if s.pending == 0 {
                cvar.notify_all();
            }
            let _ = slot_tx.send(());
        });
        Ok(result_rx)
    }

    /// Encodes `jobs` across the workers and returns their results in
    /// submission order.
    pub fn encode_batch(&self, jobs: impl IntoIterator<Item = EncodeJob>) -> Result<Vec<EncodeResult>, GlzError> {
        let receivers = jobs.into_iter().map(|job| self.submit(job)).collect::<Result<Vec<_>, _>>()?;
        Ok(receivers
            .into_iter()
            .map(|rx| rx.recv().unwrap_or(Err(GlzError::PoolClosed)))
            .collect())
    }

    /// Blocks until every submitted job has finished. The pool keeps
    /// accepting jobs afterwards.
    pub fn jobs_completed(&self) {
        let (lock, cvar) = &*self.state;
        let mut s = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while s.pending > 0 {
            s = cvar.wait(s).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for EncoderPool {
    fn drop(&mut self) {
        self.jobs_completed();
    }
}

fn run_job(encoder: &mut Encoder<JobUsr>, job: EncodeJob) -> EncodeResult {
    encoder.usr_mut().pending = job.more_lines.into();
    let req = job.request;
    let budget = max_encoded_size(req.image_type, req.height, req.stride);
    let mut data = Vec::with_capacity(budget);
    let result = encoder.encode(req, &mut data, budget);
    encoder.usr_mut().pending.clear();
    let encoded = result?;
    Ok(EncodedImage { data, image: encoded.image, window_head_distance: encoded.window_head_distance })
}
