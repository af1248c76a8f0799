//! # Analysis Worker
//!
//! Runs capture and analysis on a dedicated background thread: read a block from an
//! [`AudioSource`], transform it, publish the power spectrum to a [`SpectrumSink`], repeat.
//!
//! The loop can be paused, resumed and cancelled through [`WorkerControl`]. Both take
//! effect only between transform calls, so a sink never sees a partially computed
//! spectrum.

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

use crate::{config::AnalysisConfig, kernel::fft_size_for, transform::ConstantQTransform};

/// A blocking supplier of mono audio samples.
pub trait AudioSource {
    /// Rate of the samples produced by [`read`](Self::read), in Hz.
    fn sample_rate(&self) -> f64;

    /// Fills the whole of `buffer` with the next samples, blocking until they arrive.
    fn read(&mut self, buffer: &mut [f32]) -> Result<()>;
}

/// A consumer of computed power spectra.
pub trait SpectrumSink {
    /// Called once, before the first spectrum, with the axis of the spectra to come:
    /// bin `i` is centred on `min_frequency * ratio^i`.
    fn configure(&mut self, ratio: f64, min_frequency: f64);

    /// Receives one power spectrum in decibels. An error stops the worker.
    fn publish(&mut self, spectrum: &[f32]) -> Result<()>;

    /// Called when the audio source fails; the worker stops afterwards.
    fn source_failed(&mut self, _error: &anyhow::Error) {}
}

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    cancelled: bool,
}

/// Shared pause/resume/cancel switch for an [`AnalysisWorker`].
#[derive(Debug, Default)]
pub struct WorkerControl {
    state: Mutex<ControlState>,
    signal: Condvar,
}

impl WorkerControl {
    pub fn new(paused: bool) -> Self {
        Self {
            state: Mutex::new(ControlState {
                paused,
                cancelled: false,
            }),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut ControlState)) {
        apply(&mut self.lock());
        self.signal.notify_all();
    }

    pub fn pause(&self) {
        self.update(|state| state.paused = true);
    }

    pub fn resume(&self) {
        self.update(|state| state.paused = false);
    }

    /// Flips between paused and running. Returns `true` if now paused.
    pub fn toggle_paused(&self) -> bool {
        let mut paused = false;
        self.update(|state| {
            state.paused = !state.paused;
            paused = state.paused;
        });
        paused
    }

    /// Asks the worker to stop. Also wakes a paused worker so it can exit.
    pub fn cancel(&self) {
        self.update(|state| state.cancelled = true);
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Blocks while paused. Returns `false` once cancelled, `true` when the caller may
    /// proceed with the next block.
    pub fn wait_while_paused(&self) -> bool {
        let state = self
            .signal
            .wait_while(self.lock(), |state| state.paused && !state.cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        !state.cancelled
    }
}

/// Handle to a running analysis thread.
///
/// Dropping the handle cancels the worker without waiting for it.
#[derive(Debug)]
pub struct AnalysisWorker {
    control: Arc<WorkerControl>,
    thread_handle: Option<JoinHandle<Result<()>>>,
}

impl AnalysisWorker {
    /// Starts the analysis thread.
    ///
    /// # Arguments
    /// * `config` - Bin layout, window and reference power for the engine
    /// * `start_paused` - Hold the worker before its first block until resumed
    /// * `open_source` - Opens the audio source; called on the worker thread, so the
    ///   source itself does not need to be `Send`
    /// * `sink` - Receives the axis configuration and every spectrum
    ///
    /// The engine is built from the sample rate reported by the opened source.
    pub fn spawn<S, F, K>(
        config: AnalysisConfig,
        start_paused: bool,
        open_source: F,
        sink: K,
    ) -> Result<Self>
    where
        S: AudioSource,
        F: FnOnce() -> Result<S> + Send + 'static,
        K: SpectrumSink + Send + 'static,
    {
        let control = Arc::new(WorkerControl::new(start_paused));
        let thread_control = Arc::clone(&control);
        let thread_handle = thread::Builder::new()
            .name("cqt-analysis".into())
            .spawn(move || run(&thread_control, &config, open_source, sink))
            .context("failed to spawn analysis thread")?;

        Ok(Self {
            control,
            thread_handle: Some(thread_handle),
        })
    }

    /// Shared control switch, e.g. for a UI thread.
    pub fn control(&self) -> Arc<WorkerControl> {
        Arc::clone(&self.control)
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn toggle_paused(&self) -> bool {
        self.control.toggle_paused()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Waits for the thread to finish and returns how it ended.
    ///
    /// This does not cancel the worker; call [`cancel`](Self::cancel) first to stop it.
    pub fn join(mut self) -> Result<()> {
        match self.thread_handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("analysis thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.control.cancel();
        }
    }
}

fn run<S, F, K>(
    control: &WorkerControl,
    config: &AnalysisConfig,
    open_source: F,
    mut sink: K,
) -> Result<()>
where
    S: AudioSource,
    F: FnOnce() -> Result<S>,
    K: SpectrumSink,
{
    info!("Starting audio analysis...");
    let mut source = match open_source() {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open audio source: {e:#}");
            sink.source_failed(&e);
            return Err(e.context("failed to open audio source"));
        }
    };

    let sample_rate = source.sample_rate();
    info!(
        "Will use FFT of size {}",
        fft_size_for(sample_rate, config.min_frequency(), config.ratio)
    );
    let engine = ConstantQTransform::from_config(config, sample_rate)
        .context("invalid constant-Q configuration")?;

    let fft_size = engine.fft_size();
    let mut data = vec![0.0f32; 2 * fft_size];
    let mut power_spectrum = vec![0.0f32; engine.num_coefficients()];

    if !control.wait_while_paused() {
        info!("Audio analysis cancelled before start");
        return Ok(());
    }
    sink.configure(engine.ratio(), engine.min_frequency());

    while control.wait_while_paused() {
        if let Err(e) = source.read(&mut data[..fft_size]) {
            error!("Audio source read failed: {e:#}");
            sink.source_failed(&e);
            return Err(e.context("audio source failed"));
        }

        engine.transform(&mut data, &mut power_spectrum, config.reference_power)?;

        if let Err(e) = sink.publish(&power_spectrum) {
            warn!("Spectrum sink closed: {e:#}");
            return Err(e);
        }
    }

    info!("Stopping audio analysis...");
    Ok(())
}

/// An [`AudioSource`] fed by chunks of samples arriving on a channel.
///
/// Chunks may be any size; they are split or joined to fill each requested block.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Receiver<Vec<f32>>,
    sample_rate: f64,
    pending: Vec<f32>,
    offset: usize,
}

impl ChannelSource {
    pub fn new(receiver: Receiver<Vec<f32>>, sample_rate: f64) -> Self {
        Self {
            receiver,
            sample_rate,
            pending: Vec::new(),
            offset: 0,
        }
    }
}

impl AudioSource for ChannelSource {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<()> {
        let mut filled = 0;
        while filled < buffer.len() {
            if self.offset == self.pending.len() {
                self.pending = self
                    .receiver
                    .recv()
                    .map_err(|_| anyhow!("audio channel disconnected"))?;
                self.offset = 0;
                continue;
            }
            let take = (buffer.len() - filled).min(self.pending.len() - self.offset);
            buffer[filled..filled + take]
                .copy_from_slice(&self.pending[self.offset..self.offset + take]);
            filled += take;
            self.offset += take;
        }
        Ok(())
    }
}

/// One computed power spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Running count of frames published by the worker, starting at 0.
    pub index: u64,
    /// Power in decibels per constant-Q bin.
    pub power_db: Vec<f32>,
}

/// Messages sent by a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    /// The axis of the spectra that follow.
    Configured { ratio: f64, min_frequency: f64 },
    Spectrum(SpectrumFrame),
    /// The audio source failed and the worker is stopping.
    SourceFailed(String),
}

/// A [`SpectrumSink`] that forwards everything as [`AnalysisEvent`]s.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<AnalysisEvent>,
    next_index: u64,
}

impl ChannelSink {
    pub fn new(sender: Sender<AnalysisEvent>) -> Self {
        Self {
            sender,
            next_index: 0,
        }
    }
}

impl SpectrumSink for ChannelSink {
    fn configure(&mut self, ratio: f64, min_frequency: f64) {
        if self
            .sender
            .send(AnalysisEvent::Configured {
                ratio,
                min_frequency,
            })
            .is_err()
        {
            warn!("Spectrum receiver dropped before configuration");
        }
    }

    fn publish(&mut self, spectrum: &[f32]) -> Result<()> {
        let frame = SpectrumFrame {
            index: self.next_index,
            power_db: spectrum.to_vec(),
        };
        self.next_index += 1;
        self.sender
            .send(AnalysisEvent::Spectrum(frame))
            .map_err(|_| anyhow!("spectrum receiver disconnected"))
    }

    fn source_failed(&mut self, error: &anyhow::Error) {
        let _ = self.sender.send(AnalysisEvent::SourceFailed(format!("{error:#}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::peak_bin;
    use std::{f64::consts::PI, time::Duration};

    const TIMEOUT: Duration = Duration::from_secs(10);
    const QUIET: Duration = Duration::from_millis(200);

    /// Endless sine wave, optionally failing after a number of reads.
    struct SineSource {
        sample_rate: f64,
        frequency: f64,
        position: u64,
        reads: usize,
        fail_after: Option<usize>,
    }

    impl SineSource {
        fn new(frequency: f64) -> Self {
            Self {
                sample_rate: 8000.0,
                frequency,
                position: 0,
                reads: 0,
                fail_after: None,
            }
        }
    }

    impl AudioSource for SineSource {
        fn sample_rate(&self) -> f64 {
            self.sample_rate
        }

        fn read(&mut self, buffer: &mut [f32]) -> Result<()> {
            if self.fail_after == Some(self.reads) {
                return Err(anyhow!("device unplugged"));
            }
            self.reads += 1;
            for sample in buffer.iter_mut() {
                let t = self.position as f64 / self.sample_rate;
                *sample = (0.5 * (2.0 * PI * self.frequency * t).sin()) as f32;
                self.position += 1;
            }
            Ok(())
        }
    }

    fn semitone_config() -> AnalysisConfig {
        AnalysisConfig {
            min_frequency: Some(110.0),
            num_bins: 24,
            ..AnalysisConfig::default()
        }
    }

    fn spawn_sine(
        source: SineSource,
        start_paused: bool,
    ) -> (AnalysisWorker, Receiver<AnalysisEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = AnalysisWorker::spawn(
            semitone_config(),
            start_paused,
            move || Ok(source),
            ChannelSink::new(tx),
        )
        .unwrap();
        (worker, rx)
    }

    fn next_spectrum(rx: &Receiver<AnalysisEvent>) -> SpectrumFrame {
        loop {
            match rx.recv_timeout(TIMEOUT).unwrap() {
                AnalysisEvent::Spectrum(frame) => return frame,
                AnalysisEvent::Configured { .. } => continue,
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn control_toggles_and_reports_state() {
        let control = WorkerControl::new(false);
        assert!(!control.is_paused());
        assert!(control.toggle_paused());
        assert!(control.is_paused());
        assert!(!control.toggle_paused());
        control.cancel();
        assert!(control.is_cancelled());
        assert!(!control.wait_while_paused());
    }

    #[test]
    fn cancel_wakes_a_paused_waiter() {
        let control = Arc::new(WorkerControl::new(true));
        let waiter = {
            let control = Arc::clone(&control);
            thread::spawn(move || control.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(50));
        control.cancel();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn resume_wakes_a_paused_waiter() {
        let control = Arc::new(WorkerControl::new(true));
        let waiter = {
            let control = Arc::clone(&control);
            thread::spawn(move || control.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(50));
        control.resume();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn worker_configures_sink_then_publishes_spectra() {
        let (worker, rx) = spawn_sine(SineSource::new(220.0), false);

        match rx.recv_timeout(TIMEOUT).unwrap() {
            AnalysisEvent::Configured {
                ratio,
                min_frequency,
            } => {
                assert_eq!(min_frequency, 110.0);
                assert_eq!(ratio, 2f64.powf(1.0 / 12.0));
            }
            other => panic!("expected configuration first, got {other:?}"),
        }

        let first = next_spectrum(&rx);
        let second = next_spectrum(&rx);
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(first.power_db.len(), 24);
        assert_eq!(peak_bin(&first.power_db), Some(12));

        worker.cancel();
        worker.join().unwrap();
    }

    #[test]
    fn paused_worker_waits_for_resume() {
        let (worker, rx) = spawn_sine(SineSource::new(220.0), true);

        assert!(rx.recv_timeout(QUIET).is_err());

        worker.resume();
        assert!(matches!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            AnalysisEvent::Configured { .. }
        ));
        next_spectrum(&rx);

        worker.cancel();
        worker.join().unwrap();
    }

    #[test]
    fn pause_takes_effect_between_blocks() {
        let (worker, rx) = spawn_sine(SineSource::new(220.0), false);
        next_spectrum(&rx);

        worker.pause();
        // At most the block in flight when pausing is still delivered.
        thread::sleep(QUIET);
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(QUIET).is_err());

        worker.cancel();
        worker.join().unwrap();
    }

    #[test]
    fn source_failure_is_reported_and_returned() {
        let mut source = SineSource::new(220.0);
        source.fail_after = Some(2);
        let (worker, rx) = spawn_sine(source, false);

        let events: Vec<AnalysisEvent> = rx.iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], AnalysisEvent::Configured { .. }));
        assert!(matches!(events[2], AnalysisEvent::Spectrum(_)));
        match &events[3] {
            AnalysisEvent::SourceFailed(message) => assert!(message.contains("device unplugged")),
            other => panic!("expected source failure, got {other:?}"),
        }

        let error = worker.join().unwrap_err();
        assert!(format!("{error:#}").contains("audio source failed"));
    }

    #[test]
    fn invalid_configuration_stops_the_worker() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = AnalysisConfig {
            ratio: 1.0,
            ..AnalysisConfig::default()
        };
        let worker = AnalysisWorker::spawn(
            config,
            false,
            || Ok(SineSource::new(220.0)),
            ChannelSink::new(tx),
        )
        .unwrap();

        let error = worker.join().unwrap_err();
        assert!(format!("{error:#}").contains("bin ratio"));
        assert!(rx.recv_timeout(TIMEOUT).is_err());
    }

    #[test]
    fn dropped_receiver_stops_the_worker() {
        let (worker, rx) = spawn_sine(SineSource::new(220.0), false);
        next_spectrum(&rx);
        drop(rx);

        let error = worker.join().unwrap_err();
        assert!(error.to_string().contains("disconnected"));
    }

    #[test]
    fn channel_source_regroups_chunks() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut source = ChannelSource::new(rx, 48_000.0);
        tx.send(vec![1.0, 2.0, 3.0]).unwrap();
        tx.send(vec![4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();

        let mut block = [0.0f32; 4];
        source.read(&mut block).unwrap();
        assert_eq!(block, [1.0, 2.0, 3.0, 4.0]);
        source.read(&mut block).unwrap();
        assert_eq!(block, [5.0, 6.0, 7.0, 8.0]);
        assert_eq!(source.sample_rate(), 48_000.0);

        drop(tx);
        assert!(source.read(&mut block).is_err());
    }
}
