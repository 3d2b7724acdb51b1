//! Whisper backed keyword recognizer.
//!
//! A dedicated worker thread owns the audio stream (which is not `Send`), the
//! VAD session and the whisper context. The [`WhisperRecognizer`] handle only
//! sends it control messages; the worker reports back on the event channel.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::StreamTrait;
use hound::{WavSpec, WavWriter};
use log::{debug, error, info, warn};
use ringbuf::traits::{Consumer, Observer, Split};
use ringbuf::{HeapCons, HeapRb};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::search::KeywordSearch;
use super::{Hypothesis, Recognizer, RecognizerEvent, RecognizerSetup};
use crate::asr::{Asr, DecodeOptions};
use crate::audio::vad::{N_SAMPLES, Segment, Segmenter, Silero};
use crate::audio::{self, SAMPLE_RATE};
use crate::commands::CommandList;
use crate::error::Error;

/// Seconds of audio buffered between the capture callback and the worker.
const RING_SECONDS: usize = 30;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

enum Control {
    AddSearch(String, KeywordSearch),
    Start(String),
    Stop,
    Cancel,
    Shutdown,
}

/// Handle on the recognizer worker thread.
pub struct WhisperRecognizer {
    control: UnboundedSender<Control>,
    searches: HashSet<String>,
    worker: Option<JoinHandle<()>>,
}

impl WhisperRecognizer {
    /// Starts the worker and waits until the device and models are loaded.
    pub(super) fn spawn(
        setup: RecognizerSetup,
        events: UnboundedSender<RecognizerEvent>,
    ) -> Result<Self> {
        let (control, control_rx) = unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
        let worker = std::thread::Builder::new()
            .name("hark-recognizer".to_string())
            .spawn(move || {
                let engine = match Engine::new(setup, events) {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        engine
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                engine.run(control_rx);
            })
            .context("Spawning recognizer thread")?;

        ready_rx
            .recv()
            .context("Recognizer thread exited during setup")??;
        info!("Recognizer ready");
        Ok(Self {
            control,
            searches: HashSet::new(),
            worker: Some(worker),
        })
    }

    fn send(&self, control: Control) -> Result<()> {
        self.control
            .send(control)
            .map_err(|_| anyhow!(Error::Recognizer("recognizer thread is gone".to_string())))
    }
}

impl Recognizer for WhisperRecognizer {
    fn add_keyword_search(&mut self, name: &str, keywords_file: &Path) -> Result<()> {
        let commands = CommandList::from_file(keywords_file)?;
        let search = KeywordSearch::from_commands(&commands);
        if search.is_empty() {
            warn!("Keyword search '{name}' has no keywords");
        }
        self.send(Control::AddSearch(name.to_string(), search))?;
        self.searches.insert(name.to_string());
        Ok(())
    }

    fn start_listening(&mut self, search: &str) -> Result<()> {
        if !self.searches.contains(search) {
            bail!(Error::Recognizer(format!("unknown search '{search}'")));
        }
        self.send(Control::Start(search.to_string()))
    }

    fn stop(&mut self) -> Result<()> {
        self.send(Control::Stop)
    }

    fn cancel(&mut self) -> Result<()> {
        self.send(Control::Cancel)
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // The worker may already be gone after a fatal error.
        let _ = self.send(Control::Shutdown);
        worker
            .join()
            .map_err(|_| anyhow!("Recognizer thread panicked"))
    }
}

impl Drop for WhisperRecognizer {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.control.send(Control::Shutdown);
        }
    }
}

/// State of an active listening session.
struct Listening {
    search: KeywordSearch,
    options: DecodeOptions,
    started: Instant,
    heard_speech: bool,
    /// Utterance length at the last partial decode.
    decoded: usize,
}

/// Registered keyword searches and the session using one of them.
#[derive(Default)]
struct Sessions {
    searches: HashMap<String, KeywordSearch>,
    listening: Option<Listening>,
}

/// Side effect a control message asks of the engine.
#[derive(Debug, PartialEq)]
enum Transition {
    Nothing,
    Started,
    Stopped,
    Failed(String),
    Exit,
}

impl Sessions {
    fn apply(&mut self, message: Control, no_context: bool) -> Transition {
        match message {
            Control::AddSearch(name, search) => {
                debug!("Adding keyword search '{name}'");
                self.searches.insert(name, search);
                Transition::Nothing
            }
            Control::Start(name) => {
                let Some(search) = self.searches.get(&name).cloned() else {
                    return Transition::Failed(format!("unknown search '{name}'"));
                };
                debug!("Listening with search '{name}'");
                let options = DecodeOptions {
                    prompt: search.prompt(),
                    no_context,
                };
                self.listening = Some(Listening {
                    search,
                    options,
                    started: Instant::now(),
                    heard_speech: false,
                    decoded: 0,
                });
                Transition::Started
            }
            Control::Stop | Control::Cancel => match self.listening.take() {
                Some(_) => Transition::Stopped,
                None => Transition::Nothing,
            },
            Control::Shutdown => {
                self.listening = None;
                Transition::Exit
            }
        }
    }
}

/// Whether a session that heard no speech for `elapsed` has to give up.
fn timeout_due(timeout_ms: Option<u64>, heard_speech: bool, elapsed: Duration) -> bool {
    match timeout_ms {
        Some(ms) => !heard_speech && elapsed >= Duration::from_millis(ms),
        None => false,
    }
}

/// Whether an utterance of `len` samples, `decoded` of them already decoded,
/// is due for another partial decode.
fn partial_due(interval_ms: Option<u64>, len: usize, decoded: usize) -> bool {
    let Some(ms) = interval_ms else {
        return false;
    };
    let interval = ms as usize * SAMPLE_RATE as usize / 1000;
    len > decoded && len - decoded >= interval
}

/// Events closing a finished utterance, sent together once it is decoded.
fn utterance_events(decoded: Result<Option<Hypothesis>>) -> [RecognizerEvent; 2] {
    let last = match decoded {
        Ok(hypothesis) => RecognizerEvent::Result(hypothesis),
        Err(err) => RecognizerEvent::Error(format!("{err:#}")),
    };
    [RecognizerEvent::EndOfSpeech, last]
}

struct Engine {
    setup: RecognizerSetup,
    events: UnboundedSender<RecognizerEvent>,
    stream: cpal::Stream,
    consumer: HeapCons<f32>,
    silero: Silero,
    asr: Asr,
    segmenter: Segmenter,
    sessions: Sessions,
}

impl Engine {
    fn new(setup: RecognizerSetup, events: UnboundedSender<RecognizerEvent>) -> Result<Self> {
        if let Some(dir) = &setup.raw_log_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Creating raw log directory {}", dir.display()))?;
        }

        let (producer, consumer) = HeapRb::<f32>::new(SAMPLE_RATE as usize * RING_SECONDS).split();
        let stream = audio::open_input_stream(&setup.audio, producer)
            .map_err(|e| Error::AudioDevice(format!("{e:#}")))?;
        let silero = Silero::new(SAMPLE_RATE as i64, &setup.vad_model).map_err(|e| {
            Error::Model(format!(
                "Loading VAD model at {}: {e}",
                setup.vad_model.display()
            ))
        })?;
        let asr = Asr::load(&setup.acoustic_model)?;
        let segmenter = Segmenter::from_config(&setup.listen);

        Ok(Self {
            setup,
            events,
            stream,
            consumer,
            silero,
            asr,
            segmenter,
            sessions: Sessions::default(),
        })
    }

    fn run(mut self, mut control: UnboundedReceiver<Control>) {
        loop {
            // Block while idle, poll while listening.
            if self.sessions.listening.is_none() {
                match control.blocking_recv() {
                    Some(message) => {
                        if !self.handle(message) {
                            break;
                        }
                    }
                    None => break,
                }
                continue;
            }
            match control.try_recv() {
                Ok(message) => {
                    if !self.handle(message) {
                        break;
                    }
                    continue;
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            if self.timed_out() {
                info!("No speech heard, timing out");
                self.handle(Control::Stop);
                self.emit(RecognizerEvent::Timeout);
                continue;
            }
            if self.consumer.occupied_len() < N_SAMPLES {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            let mut frame = [0.0; N_SAMPLES];
            self.consumer.pop_slice(&mut frame);
            self.process_frame(&frame);
        }
        if let Err(err) = self.stream.pause() {
            debug!("Pausing stream on shutdown: {err}");
        }
        info!("Recognizer stopped");
    }

    /// Applies a control message; `false` once the worker should exit.
    fn handle(&mut self, message: Control) -> bool {
        match self.sessions.apply(message, self.setup.no_context) {
            Transition::Nothing => {}
            Transition::Started => {
                self.reset_audio();
                if let Err(err) = self.stream.play() {
                    self.sessions.listening = None;
                    self.emit_error(format!("Cannot start audio stream: {err}"));
                }
            }
            Transition::Stopped => {
                if let Err(err) = self.stream.pause() {
                    warn!("Cannot pause audio stream: {err}");
                }
                self.reset_audio();
            }
            Transition::Failed(message) => self.emit_error(message),
            Transition::Exit => return false,
        }
        true
    }

    fn reset_audio(&mut self) {
        self.consumer.clear();
        self.segmenter.reset();
        self.silero.reset();
    }

    fn timed_out(&self) -> bool {
        self.sessions.listening.as_ref().is_some_and(|listening| {
            timeout_due(
                self.setup.listen.timeout_ms,
                listening.heard_speech,
                listening.started.elapsed(),
            )
        })
    }

    fn process_frame(&mut self, frame: &[f32; N_SAMPLES]) {
        let speech_prob = match self.silero.calc_level(frame) {
            Ok(prob) => prob,
            Err(err) => {
                self.emit_error(format!("Voice activity detection failed: {err}"));
                return;
            }
        };
        match self.segmenter.push(speech_prob, frame) {
            Some(Segment::Started) => {
                if let Some(listening) = &mut self.sessions.listening {
                    listening.heard_speech = true;
                    listening.decoded = 0;
                }
                self.emit(RecognizerEvent::BeginningOfSpeech);
            }
            Some(Segment::Finished(samples)) => {
                self.log_raw(&samples);
                // Both events trigger a restart; they must reach the
                // controller back to back.
                for event in utterance_events(self.decode(&samples)) {
                    if let RecognizerEvent::Error(message) = &event {
                        error!("{message}");
                    }
                    self.emit(event);
                }
            }
            None => self.partial_decode(),
        }
    }

    /// Re-decodes the ongoing utterance once enough new audio arrived.
    fn partial_decode(&mut self) {
        let Some(listening) = &mut self.sessions.listening else {
            return;
        };
        let len = self.segmenter.utterance().len();
        if !partial_due(self.setup.listen.partial_interval_ms, len, listening.decoded) {
            return;
        }
        listening.decoded = len;
        let samples = self.segmenter.utterance().to_vec();
        match self.decode(&samples) {
            Ok(Some(hypothesis)) => self.emit(RecognizerEvent::PartialResult(Some(hypothesis))),
            Ok(None) => {}
            Err(err) => self.emit_error(format!("{err:#}")),
        }
    }

    fn decode(&self, samples: &[f32]) -> Result<Option<Hypothesis>> {
        let Some(listening) = &self.sessions.listening else {
            return Ok(None);
        };
        let transcript = self
            .asr
            .run(samples, &listening.options)
            .context("Transcribing utterance")?;
        let text = self.setup.apply_dictionary(&transcript.text);
        debug!("Heard '{text}' ({:.3})", transcript.confidence);
        Ok(spot_keyword(
            &listening.search,
            &text,
            transcript.confidence,
            self.setup.keyword_threshold,
        ))
    }

    fn log_raw(&self, samples: &[f32]) {
        let Some(dir) = &self.setup.raw_log_dir else {
            return;
        };
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = dir.join(format!("{millis}.wav"));
        if let Err(err) = write_wav(&path, samples) {
            warn!("Cannot write raw log {}: {err:#}", path.display());
        }
    }

    fn emit(&self, event: RecognizerEvent) {
        if self.events.send(event).is_err() {
            debug!("Nobody is listening to recognizer events");
        }
    }

    fn emit_error(&self, message: String) {
        error!("{message}");
        self.emit(RecognizerEvent::Error(message));
    }
}

/// Keyword heard in `text`, if its decoding was confident enough.
fn spot_keyword(
    search: &KeywordSearch,
    text: &str,
    confidence: f32,
    threshold: f32,
) -> Option<Hypothesis> {
    let keyword = search.spot(text)?;
    if confidence < threshold {
        debug!("Rejecting '{keyword}', confidence {confidence:.3} below {threshold}");
        return None;
    }
    Some(Hypothesis::new(keyword, confidence))
}

/// Writes 16kHz mono samples as a float WAV file.
fn write_wav(path: &Path, samples: &[f32]) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).context("Wav writer failed")?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
