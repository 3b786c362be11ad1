//! Backend for local audio files
//!
//! Two background threads sit behind this backend:
//!
//! 1. `cuewave-decoder` receives load jobs and decodes them into peaks. A
//!    newer load sets the cancel flag of the older one, so a superseded decode
//!    stops early and never reports.
//! 2. `cuewave-clock` is the transport: while playing it emits a time update
//!    every [`CLOCK_INTERVAL`] and pauses itself at the end of the track.
//!
//! There is no audio output; the transport follows the wall clock. Both
//! threads are stopped and joined when the backend is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::decoder::{decode_peaks, resolve_locator, DecodeError};
use super::{BackendNotifier, LoadToken, PlaybackBackend};

/// How often the transport reports the playback time
pub const CLOCK_INTERVAL: Duration = Duration::from_millis(50);

struct DecodeJob {
    locator: String,
    notifier: BackendNotifier,
    cancel: Arc<AtomicBool>,
}

#[derive(Default)]
struct Transport {
    notifier: Option<BackendNotifier>,
    duration: f64,
    position: f64,
    playing_since: Option<Instant>,
}

impl Transport {
    fn token(&self) -> Option<LoadToken> {
        self.notifier.as_ref().map(BackendNotifier::token)
    }

    fn current_time(&self) -> f64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.position + elapsed).min(self.duration)
    }

    fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }
}

type SharedTransport = Arc<Mutex<Transport>>;

fn lock(transport: &SharedTransport) -> MutexGuard<'_, Transport> {
    transport.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decodes local files and simulates a transport clock
pub struct FileBackend {
    jobs: Option<Sender<DecodeJob>>,
    transport: SharedTransport,
    cancel: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    clock: Option<JoinHandle<()>>,
}

impl FileBackend {
    /// Spawn the decoder and clock threads
    pub fn spawn(peaks_per_second: u32) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<DecodeJob>();
        let transport: SharedTransport = Arc::new(Mutex::new(Transport::default()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_transport = Arc::clone(&transport);
        let worker = thread::Builder::new()
            .name("cuewave-decoder".to_string())
            .spawn(move || decoder_thread(job_rx, worker_transport, peaks_per_second))?;

        let clock_transport = Arc::clone(&transport);
        let clock_shutdown = Arc::clone(&shutdown);
        let clock = thread::Builder::new()
            .name("cuewave-clock".to_string())
            .spawn(move || clock_thread(clock_transport, clock_shutdown))?;

        log::info!("FileBackend started ({} peaks/s)", peaks_per_second);

        Ok(Self {
            jobs: Some(job_tx),
            transport,
            cancel: Arc::new(AtomicBool::new(false)),
            shutdown,
            worker: Some(worker),
            clock: Some(clock),
        })
    }

    fn transport(&self) -> MutexGuard<'_, Transport> {
        lock(&self.transport)
    }

    fn cancel_pending(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.cancel = Arc::new(AtomicBool::new(false));
    }
}

impl PlaybackBackend for FileBackend {
    fn load(&mut self, locator: &str, notifier: BackendNotifier) {
        self.cancel_pending();
        *self.transport() = Transport {
            notifier: Some(notifier.clone()),
            ..Transport::default()
        };

        let job = DecodeJob {
            locator: locator.to_string(),
            notifier: notifier.clone(),
            cancel: Arc::clone(&self.cancel),
        };
        let sent = self.jobs.as_ref().map(|jobs| jobs.send(job).is_ok());
        if sent != Some(true) {
            log::error!("Decoder thread unavailable, cannot load {}", locator);
            notifier.error("decoder thread unavailable");
        }
    }

    fn duration(&self) -> f64 {
        self.transport().duration
    }

    fn current_time(&self) -> f64 {
        self.transport().current_time()
    }

    fn play(&mut self) {
        let transport = &mut *self.transport();
        if transport.is_playing() || transport.duration <= 0.0 {
            return;
        }
        if transport.position >= transport.duration {
            transport.position = 0.0;
        }
        transport.playing_since = Some(Instant::now());
        if let Some(notifier) = &transport.notifier {
            notifier.playing(true);
        }
    }

    fn pause(&mut self) {
        let transport = &mut *self.transport();
        if !transport.is_playing() {
            return;
        }
        transport.position = transport.current_time();
        transport.playing_since = None;
        if let Some(notifier) = &transport.notifier {
            notifier.playing(false);
            notifier.time_update(transport.position);
        }
    }

    fn set_time(&mut self, seconds: f64) {
        let transport = &mut *self.transport();
        transport.position = seconds.clamp(0.0, transport.duration.max(0.0));
        if transport.is_playing() {
            transport.playing_since = Some(Instant::now());
        }
    }

    fn unload(&mut self) {
        self.cancel_pending();
        *self.transport() = Transport::default();
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.shutdown.store(true, Ordering::Relaxed);
        // Closing the job channel ends the decoder loop
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(clock) = self.clock.take() {
            let _ = clock.join();
        }
        log::debug!("FileBackend stopped");
    }
}

fn decoder_thread(rx: Receiver<DecodeJob>, transport: SharedTransport, peaks_per_second: u32) {
    log::debug!("Decoder thread starting");

    while let Ok(job) = rx.recv() {
        if job.cancel.load(Ordering::Relaxed) {
            continue;
        }
        let token = job.notifier.token();
        let start_time = Instant::now();

        let result = resolve_locator(&job.locator)
            .and_then(|path| decode_peaks(&path, peaks_per_second, &job.cancel));

        match result {
            Err(DecodeError::Cancelled) => {
                log::debug!("Load {} of {} cancelled", token, job.locator);
            }
            _ if job.cancel.load(Ordering::Relaxed) => {
                log::debug!("Load {} of {} superseded", token, job.locator);
            }
            Ok(buffer) => {
                {
                    let mut transport = lock(&transport);
                    if transport.token() == Some(token) {
                        transport.duration = buffer.duration();
                    }
                }
                log::debug!(
                    "Load {} of {} finished in {:?}",
                    token,
                    job.locator,
                    start_time.elapsed()
                );
                job.notifier.ready(buffer);
            }
            Err(err) => {
                log::warn!("Load {} of {} failed: {}", token, job.locator, err);
                job.notifier.error(err.to_string());
            }
        }
    }

    log::debug!("Decoder thread shutting down");
}

fn clock_thread(transport: SharedTransport, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(CLOCK_INTERVAL);

        let transport = &mut *lock(&transport);
        if !transport.is_playing() {
            continue;
        }
        let Some(notifier) = transport.notifier.clone() else {
            continue;
        };

        let now = transport.current_time();
        if now >= transport.duration {
            transport.position = transport.duration;
            transport.playing_since = None;
            notifier.time_update(transport.duration);
            notifier.playing(false);
        } else {
            notifier.time_update(now);
        }
    }
}
