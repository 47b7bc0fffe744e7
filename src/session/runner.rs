// Session runner: the single owner of one interview session.
//
// The timer, the capture stream, the interviewer transport, and the
// draft interval all feed one mpsc queue; the runner applies events to
// the machine one at a time and executes the returned effects in
// order. No two phase transitions are ever evaluated concurrently.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audio::{AudioFrame, CaptureDuplexer, FinalizedTracks};
use crate::collab::{
    AnalysisRequest, AudioSplitter, InterviewerEvent, InterviewerLink, LiveInterviewer,
    TranscriptAnalyzer,
};
use crate::completion::{self, CompletedInterview};
use crate::config::InterviewConfig;
use crate::draft::{Draft, DraftStore};
use crate::session::event::{Effect, SessionEvent};
use crate::session::machine::InterviewMachine;
use crate::session::message::{full_transcript, AudioRef, MessageKind};
use crate::session::phase::Phase;
use crate::session::theme::{interviewer_instructions, ScriptedFollowUps, Theme};
use crate::timer::{SessionTimer, TimerEvent};

/// Spinner phases have bounded waits; past these the session falls
/// back rather than hanging the narrator.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(60);
const SPLIT_TIMEOUT: Duration = Duration::from_secs(120);

const EVENT_QUEUE_DEPTH: usize = 64;

/// Injected collaborators for one session.
pub struct SessionDeps {
    pub analyzer: Arc<dyn TranscriptAnalyzer>,
    pub splitter: Arc<dyn AudioSplitter>,
    /// `None` disables the live interviewer; scripted follow-ups
    /// handle every turn.
    pub live_interviewer: Option<Arc<dyn LiveInterviewer>>,
    pub draft_store: Arc<dyn DraftStore>,
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub elapsed_seconds: u64,
    pub theme: Option<String>,
    pub message_count: usize,
    pub narrator_turns: usize,
    pub interviewer_turns: usize,
    pub is_composing: bool,
    pub detected_story_count: usize,
    pub last_error: Option<String>,
}

/// Caller-facing handle. Cheap to use from multiple request handlers;
/// all methods funnel into the runner's event queue.
pub struct SessionHandle {
    id: Uuid,
    account_id: String,
    events: mpsc::Sender<SessionEvent>,
    snapshot: watch::Receiver<SessionSnapshot>,
    completed: watch::Receiver<Option<Arc<CompletedInterview>>>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub async fn select_theme(&self, theme: Option<Theme>) -> Result<()> {
        self.send(SessionEvent::ThemeChosen(theme)).await
    }

    pub async fn narrator_typed(&self, text: String) -> Result<()> {
        self.send(SessionEvent::NarratorTyped(text)).await
    }

    /// Narrator finished a spoken turn; the runner stamps the capture
    /// position and awaits the transcript.
    pub async fn narrator_spoke(&self) -> Result<()> {
        self.send(SessionEvent::NarratorSpoke { audio_ref: None })
            .await
    }

    pub async fn finish(&self) -> Result<()> {
        self.send(SessionEvent::FinishRequested).await
    }

    pub async fn split_decision(&self, split: bool) -> Result<()> {
        self.send(SessionEvent::SplitChoice { split }).await
    }

    pub async fn retry_interviewer(&self) -> Result<()> {
        self.send(SessionEvent::RetryInterviewer).await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.send(SessionEvent::CancelRequested).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Completed output, if the session has finished.
    pub fn completed(&self) -> Option<Arc<CompletedInterview>> {
        self.completed.borrow().clone()
    }

    /// Wait until the runner has published a terminal snapshot.
    ///
    /// Capture release (finalize or discard) happens before that
    /// snapshot, so a caller that waits here knows the rig is free.
    pub async fn wait_terminal(&self) {
        let mut rx = self.snapshot.clone();
        loop {
            if rx.borrow().phase.is_terminal() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait until the session completes. Returns `None` if it was
    /// cancelled (the runner exits without producing output).
    pub async fn wait_completed(&self) -> Option<Arc<CompletedInterview>> {
        let mut rx = self.completed.clone();
        loop {
            let current = rx.borrow().clone();
            if current.is_some() {
                return current;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    async fn send(&self, event: SessionEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .ok()
            .context("Session is no longer running")
    }
}

/// Owns the machine and every background resource for one session.
pub struct SessionRunner {
    machine: InterviewMachine,
    config: InterviewConfig,
    duplexer: CaptureDuplexer,
    timer: SessionTimer,
    deps: SessionDeps,
    follow_ups: ScriptedFollowUps,

    event_tx: mpsc::Sender<SessionEvent>,
    timer_tx: mpsc::Sender<TimerEvent>,

    live_link: Option<Box<dyn InterviewerLink>>,

    /// Spoken-answer message ids awaiting transcript backfill, oldest
    /// first. Transcripts arrive in the order produced.
    pending_transcripts: VecDeque<Uuid>,

    /// Set once capture is finalized.
    tracks: Option<FinalizedTracks>,

    /// Elapsed-time accounting: frozen offset plus a running segment.
    elapsed_offset: Duration,
    running_since: Option<Instant>,

    last_error: Option<String>,

    snapshot_tx: watch::Sender<SessionSnapshot>,
    completed_tx: watch::Sender<Option<Arc<CompletedInterview>>>,
}

impl SessionRunner {
    /// Start a session: open capture, connect the interviewer, spawn
    /// the event loop. Capture errors (`PermissionDenied`,
    /// `DeviceUnavailable`) are fatal here, before any interview UI.
    pub async fn spawn(
        mut machine: InterviewMachine,
        mut duplexer: CaptureDuplexer,
        config: InterviewConfig,
        deps: SessionDeps,
    ) -> Result<SessionHandle> {
        let capture_rx = duplexer
            .start()
            .await
            .context("Failed to start audio capture")?
            .context("Capture rig is already in use by another session")?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (timer_tx, timer_rx) = mpsc::channel(4);

        // Live interviewer is best-effort at startup: a connect
        // failure degrades to scripted follow-ups instead of blocking
        // the narrator.
        let mut live_link = None;
        let mut interviewer_rx = None;
        let mut last_error = None;
        if config.live_interviewer_enabled {
            if let Some(live) = &deps.live_interviewer {
                let instructions = interviewer_instructions(machine.theme(), None);
                match live.connect(&instructions).await {
                    Ok((link, rx)) => {
                        live_link = Some(link);
                        interviewer_rx = Some(rx);
                    }
                    Err(e) => {
                        warn!("Live interviewer unavailable ({}); using scripted follow-ups", e);
                        last_error = Some(e.to_string());
                    }
                }
            }
        }

        let initial = Self::snapshot_of(&machine, Duration::ZERO, &last_error);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (completed_tx, completed_rx) = watch::channel(None);

        let handle = SessionHandle {
            id: machine.id(),
            account_id: machine.account_id().to_string(),
            events: event_tx.clone(),
            snapshot: snapshot_rx,
            completed: completed_rx,
        };

        let bootstrap = machine.bootstrap();

        let mut runner = Self {
            machine,
            config,
            duplexer,
            timer: SessionTimer::new(),
            deps,
            follow_ups: ScriptedFollowUps::default(),
            event_tx,
            timer_tx,
            live_link,
            pending_transcripts: VecDeque::new(),
            tracks: None,
            elapsed_offset: Duration::ZERO,
            running_since: None,
            last_error,
            snapshot_tx,
            completed_tx,
        };

        tokio::spawn(async move {
            runner.run(event_rx, capture_rx, timer_rx, interviewer_rx, bootstrap)
                .await;
        });

        Ok(handle)
    }

    async fn run(
        &mut self,
        mut event_rx: mpsc::Receiver<SessionEvent>,
        mut capture_rx: mpsc::Receiver<AudioFrame>,
        mut timer_rx: mpsc::Receiver<TimerEvent>,
        mut interviewer_rx: Option<mpsc::Receiver<InterviewerEvent>>,
        bootstrap: Vec<Effect>,
    ) {
        info!("Session {} runner started", self.machine.id());

        let mut queue = VecDeque::new();
        self.run_effects(bootstrap, &mut queue).await;
        self.drain(&mut queue).await;
        self.publish_snapshot();

        let mut draft_interval = tokio::time::interval(self.config.draft_interval());
        draft_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        draft_interval.reset(); // first tick after a full interval

        while !self.machine.phase().is_terminal() {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) => self.process(event).await,
                    None => {
                        // All handles dropped with the session live:
                        // treat as cancellation so nothing leaks.
                        warn!("Session {} abandoned; cancelling", self.machine.id());
                        self.process(SessionEvent::CancelRequested).await;
                    }
                },
                Some(frame) = capture_rx.recv() => {
                    self.duplexer.push_frame(frame);
                }
                Some(timer_event) = timer_rx.recv() => {
                    let event = match timer_event {
                        TimerEvent::Warning => SessionEvent::TimerWarning,
                        TimerEvent::HardLimit => SessionEvent::TimerExpired,
                    };
                    self.process(event).await;
                }
                Some(iv_event) = recv_interviewer(&mut interviewer_rx) => {
                    if let Some(event) = self.map_interviewer_event(iv_event) {
                        self.process(event).await;
                    }
                }
                _ = draft_interval.tick() => {
                    self.process(SessionEvent::DraftTick).await;
                }
            }
        }

        if let Some(mut link) = self.live_link.take() {
            if let Err(e) = link.close().await {
                warn!("Failed to close interviewer link: {}", e);
            }
        }

        info!(
            "Session {} runner finished in {:?}",
            self.machine.id(),
            self.machine.phase()
        );
    }

    /// Apply one event and everything it cascades into, then publish
    /// a fresh snapshot.
    async fn process(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);
        self.drain(&mut queue).await;
        self.publish_snapshot();
    }

    async fn drain(&mut self, queue: &mut VecDeque<SessionEvent>) {
        while let Some(event) = queue.pop_front() {
            let event = self.stamp(event);
            let spoken = matches!(event, SessionEvent::NarratorSpoke { .. });

            // A landed interviewer reply supersedes any surfaced
            // connection error.
            if matches!(event, SessionEvent::InterviewerSaid(_)) {
                self.last_error = None;
            }

            let effects = self.machine.apply(event);

            if spoken {
                if let Some(msg) = self
                    .machine
                    .messages()
                    .iter()
                    .rev()
                    .find(|m| m.kind == MessageKind::SpokenAnswer)
                {
                    self.pending_transcripts.push_back(msg.id);
                }
            }

            self.run_effects(effects, queue).await;
        }
    }

    /// Fill in runner-owned details the caller cannot know.
    fn stamp(&self, event: SessionEvent) -> SessionEvent {
        match event {
            SessionEvent::NarratorSpoke { audio_ref: None } => SessionEvent::NarratorSpoke {
                audio_ref: Some(AudioRef(self.duplexer.narrator_sample_offset())),
            },
            other => other,
        }
    }

    fn map_interviewer_event(&mut self, event: InterviewerEvent) -> Option<SessionEvent> {
        match event {
            InterviewerEvent::Composing => Some(SessionEvent::ComposingStarted),
            InterviewerEvent::Utterance(text) => Some(SessionEvent::InterviewerSaid(text)),
            InterviewerEvent::FinalTranscript(text) => {
                match self.pending_transcripts.pop_front() {
                    Some(message_id) => Some(SessionEvent::TranscriptArrived { message_id, text }),
                    None => {
                        warn!("Transcript arrived with no spoken answer awaiting backfill");
                        None
                    }
                }
            }
            InterviewerEvent::Error(error) => Some(SessionEvent::InterviewerErrored(error)),
        }
    }

    async fn run_effects(&mut self, effects: Vec<Effect>, queue: &mut VecDeque<SessionEvent>) {
        for effect in effects {
            self.run_effect(effect, queue).await;
        }
    }

    async fn run_effect(&mut self, effect: Effect, queue: &mut VecDeque<SessionEvent>) {
        match effect {
            Effect::StartTimer { offset } => {
                self.elapsed_offset = offset;
                self.running_since = Some(Instant::now());
                self.timer.start(
                    offset,
                    self.config.warning_after(),
                    self.config.hard_limit(),
                    self.timer_tx.clone(),
                );
            }
            Effect::StopTimer => {
                self.elapsed_offset = self.elapsed();
                self.running_since = None;
                self.timer.stop();
            }
            Effect::AskInterviewer { narrator_text } => {
                if let Some(link) = &mut self.live_link {
                    if let Err(e) = link.send_narrator_turn(&narrator_text).await {
                        queue.push_back(SessionEvent::InterviewerErrored(e.to_string()));
                    }
                } else {
                    // Scripted fallback replies immediately.
                    let question = self.follow_ups.next_question();
                    queue.push_back(SessionEvent::InterviewerSaid(question));
                }
            }
            Effect::SaveDraft => self.save_draft().await,
            Effect::DeleteDraft => {
                let account = self.machine.account_id().to_string();
                if let Err(e) = self.deps.draft_store.delete(&account).await {
                    warn!("Failed to delete draft for {}: {}", account, e);
                }
            }
            Effect::FinalizeCapture => match self.duplexer.finalize().await {
                Ok(tracks) => self.tracks = Some(tracks),
                Err(e) => {
                    error!("Failed to finalize capture: {}", e);
                    self.tracks = Some(FinalizedTracks {
                        mixed: Vec::new(),
                        narrator_only: Vec::new(),
                        narrator_duration_seconds: 0.0,
                    });
                }
            },
            Effect::DiscardCapture => {
                if let Err(e) = self.duplexer.discard().await {
                    warn!("Failed to discard capture: {}", e);
                }
            }
            Effect::RunAnalysis { transcript } => self.spawn_analysis(transcript),
            Effect::RunSplit {
                stories,
                transcript_len,
            } => self.spawn_split(stories, transcript_len),
            Effect::CompleteSingle { title, text } => {
                let tracks = self.take_tracks();
                let done = completion::single_story(
                    title,
                    text,
                    &tracks,
                    full_transcript(self.machine.messages()),
                );
                self.finish_with(done);
            }
            Effect::CompleteSplit { stories, files } => {
                let tracks = self.take_tracks();
                let done = completion::assemble_split(
                    &stories,
                    &files,
                    &tracks,
                    full_transcript(self.machine.messages()),
                );
                self.finish_with(done);
            }
            Effect::SurfaceError(e) => {
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn spawn_analysis(&self, transcript: String) {
        let analyzer = Arc::clone(&self.deps.analyzer);
        let tx = self.event_tx.clone();
        let session_id = self.machine.id();
        let narrator_name = None;

        tokio::spawn(async move {
            let request = AnalysisRequest {
                transcript,
                narrator_name,
            };
            let outcome =
                tokio::time::timeout(ANALYSIS_TIMEOUT, analyzer.analyze(request)).await;

            let event = match outcome {
                Ok(Ok(stories)) => SessionEvent::AnalysisDone {
                    session_id,
                    stories,
                },
                Ok(Err(e)) => SessionEvent::AnalysisFailed {
                    session_id,
                    error: e.to_string(),
                },
                Err(_) => SessionEvent::AnalysisFailed {
                    session_id,
                    error: "analysis timed out".to_string(),
                },
            };
            // Receiver gone means the session tore down; drop silently.
            let _ = tx.send(event).await;
        });
    }

    fn spawn_split(&self, mut stories: Vec<crate::collab::DetectedStory>, transcript_len: usize) {
        let splitter = Arc::clone(&self.deps.splitter);
        let tx = self.event_tx.clone();
        let session_id = self.machine.id();

        let tracks = match &self.tracks {
            Some(tracks) => tracks.clone(),
            None => {
                // Splitting without finalized audio cannot succeed.
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx
                        .send(SessionEvent::SplitFailed {
                            session_id,
                            error: "no finalized audio".to_string(),
                        })
                        .await;
                });
                return;
            }
        };

        completion::map_offsets_to_times(
            &mut stories,
            transcript_len,
            tracks.narrator_duration_seconds,
        );
        let segments = completion::segments_for(&stories);

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                SPLIT_TIMEOUT,
                splitter.split(&tracks.narrator_only, &segments),
            )
            .await;

            let event = match outcome {
                Ok(Ok(files)) => SessionEvent::SplitDone { session_id, files },
                Ok(Err(e)) => SessionEvent::SplitFailed {
                    session_id,
                    error: e.to_string(),
                },
                Err(_) => SessionEvent::SplitFailed {
                    session_id,
                    error: "split timed out".to_string(),
                },
            };
            let _ = tx.send(event).await;
        });
    }

    async fn save_draft(&mut self) {
        let draft = Draft::snapshot(
            self.machine.id(),
            self.machine.messages(),
            self.machine.theme(),
            self.elapsed().as_secs(),
        );
        let account = self.machine.account_id().to_string();

        // Awaited inline: draft writes are serialized by construction.
        if let Err(e) = self.deps.draft_store.put(&account, &draft).await {
            // PersistenceFailed is degraded service, never narrator-visible.
            warn!("Draft write failed for {}: {}", account, e);
        }
    }

    fn take_tracks(&mut self) -> FinalizedTracks {
        self.tracks.clone().unwrap_or(FinalizedTracks {
            mixed: Vec::new(),
            narrator_only: Vec::new(),
            narrator_duration_seconds: 0.0,
        })
    }

    fn finish_with(&mut self, done: CompletedInterview) {
        info!(
            "Session {} completed with {} stories",
            self.machine.id(),
            done.stories.len()
        );
        let _ = self.completed_tx.send(Some(Arc::new(done)));
    }

    fn elapsed(&self) -> Duration {
        self.elapsed_offset
            + self
                .running_since
                .map(|since| since.elapsed())
                .unwrap_or(Duration::ZERO)
    }

    fn publish_snapshot(&self) {
        let snapshot = Self::snapshot_of(&self.machine, self.elapsed(), &self.last_error);
        let _ = self.snapshot_tx.send(snapshot);
    }

    fn snapshot_of(
        machine: &InterviewMachine,
        elapsed: Duration,
        last_error: &Option<String>,
    ) -> SessionSnapshot {
        let (narrator_turns, interviewer_turns) = machine.main_turn_counts();
        SessionSnapshot {
            session_id: machine.id(),
            phase: machine.phase(),
            elapsed_seconds: elapsed.as_secs(),
            theme: machine.theme().map(|t| t.title.clone()),
            message_count: machine.messages().len(),
            narrator_turns,
            interviewer_turns,
            is_composing: machine.is_composing(),
            detected_story_count: machine.detected_stories().len(),
            last_error: last_error.clone(),
        }
    }
}

async fn recv_interviewer(
    rx: &mut Option<mpsc::Receiver<InterviewerEvent>>,
) -> Option<InterviewerEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
