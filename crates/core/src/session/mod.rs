//! Host-side driver tying playback input, analysis, the meter and the scene
//! together on one frame scheduler.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    features::{reduce, FeatureFrame},
    AnalyzerHandle, AppConfig, AudioStreamHandle, BarMeter, FrameId, FrameScheduler, FrameTick,
    FrequencyAnalyzer, SceneEngine, SceneState, SceneSurface, StreamId, VisualizerBarSet,
};

/// What the playback side exposes to the visualiser.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub current_stream: Option<AudioStreamHandle>,
    pub is_playing: bool,
}

impl PlaybackState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn playing(stream: AudioStreamHandle) -> Self {
        Self {
            current_stream: Some(stream),
            is_playing: true,
        }
    }
}

/// One audio-reactive view: a bar meter and a 3D scene fed from the same
/// analyser.
///
/// Two loops share the scheduler. The sampling loop runs while a stream is
/// playing and pushes fresh features to both views; the scene's render loop
/// runs from mount to shutdown regardless of audio.
#[derive(Debug)]
pub struct Visualiser<S: SceneSurface> {
    band_count: usize,
    analyzer: FrequencyAnalyzer,
    handle: AnalyzerHandle,
    attached: Option<StreamId>,
    playing: bool,
    sampling: Option<FrameId>,
    meter: BarMeter,
    scene: SceneEngine<S>,
    latest: Option<FeatureFrame>,
    shut_down: bool,
}

impl<S: SceneSurface> Visualiser<S> {
    /// Mounts both views. A scene that cannot start is logged and left in its
    /// failed state; the meter keeps working.
    pub fn mount<R: Rng + ?Sized>(
        config: &AppConfig,
        analyzer: FrequencyAnalyzer,
        surface: S,
        scheduler: &mut dyn FrameScheduler,
        rng: &mut R,
    ) -> Self {
        let meter = BarMeter::mount(config.meter.clone(), rng);
        let mut scene = SceneEngine::new(config.scene.clone(), surface);
        if let Err(err) = scene.mount(scheduler, rng) {
            warn!(error = %err, "3D scene disabled");
        }

        Self {
            band_count: config.meter.band_count,
            analyzer,
            handle: AnalyzerHandle::Inactive,
            attached: None,
            playing: false,
            sampling: None,
            meter,
            scene,
            latest: None,
            shut_down: false,
        }
    }

    /// Applies the playback side's current stream and play state.
    pub fn sync_playback(&mut self, playback: &PlaybackState, scheduler: &mut dyn FrameScheduler) {
        if self.shut_down {
            return;
        }

        let stream_id = playback.current_stream.as_ref().map(AudioStreamHandle::id);
        if stream_id != self.attached {
            self.analyzer.release(self.handle);
            self.handle = match &playback.current_stream {
                Some(stream) => self.analyzer.attach(stream),
                None => AnalyzerHandle::Inactive,
            };
            self.attached = stream_id;
            self.latest = None;
            if self.attached.is_none() {
                self.meter.render(None);
                self.scene.push_average(0.0);
            }
            info!(
                stream = ?stream_id,
                active = self.handle.is_active(),
                "visualiser stream changed"
            );
        }

        let playing = playback.is_playing && self.attached.is_some();
        if playing && !self.playing {
            if let Err(err) = self.analyzer.resume() {
                warn!(error = %err, "could not resume analysis context");
            }
            self.start_sampling(scheduler);
        } else if !playing && self.playing {
            self.stop_sampling(scheduler);
        }
        self.playing = playing;
    }

    /// Runs whichever loops `tick` carries.
    pub fn on_frame(&mut self, tick: &FrameTick, scheduler: &mut dyn FrameScheduler) {
        if let Some(id) = self.sampling {
            if tick.fires(id) {
                self.sampling = None;
                self.sample_and_dispatch();
                self.sampling = Some(scheduler.request_frame());
            }
        }
        self.scene.on_frame(tick, scheduler);
    }

    /// Forwards a viewport change to the scene.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.scene.resize(width, height);
    }

    /// Stops both loops and releases the analysis context. Idempotent.
    pub fn shutdown(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.shut_down {
            return;
        }
        self.stop_sampling(scheduler);
        self.playing = false;
        self.scene.dispose(scheduler);
        self.analyzer.release(self.handle);
        self.handle = AnalyzerHandle::Inactive;
        self.analyzer.close();
        self.shut_down = true;
        info!("visualiser shut down");
    }

    pub fn bars(&self) -> &VisualizerBarSet {
        self.meter.bars()
    }

    pub fn meter(&self) -> &BarMeter {
        &self.meter
    }

    pub fn scene(&self) -> &SceneEngine<S> {
        &self.scene
    }

    pub fn scene_state(&self) -> &SceneState {
        self.scene.state()
    }

    /// Features from the most recent sampling tick, if it produced any.
    pub fn latest_features(&self) -> Option<&FeatureFrame> {
        self.latest.as_ref()
    }

    pub fn analyzer_handle(&self) -> AnalyzerHandle {
        self.handle
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling.is_some()
    }

    fn sample_and_dispatch(&mut self) {
        let band_count = self.band_count;
        let features = self
            .analyzer
            .sample(self.handle)
            .map(|snapshot| reduce(snapshot, band_count));

        match &features {
            Some(frame) => {
                self.meter.render(Some(&frame.bands));
                self.scene.push_average(frame.average);
            }
            None => {
                self.meter.render(None);
                self.scene.push_average(0.0);
            }
        }
        self.latest = features;
    }

    fn start_sampling(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.sampling.is_none() {
            self.sampling = Some(scheduler.request_frame());
            debug!("sampling loop started");
        }
    }

    fn stop_sampling(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(id) = self.sampling.take() {
            scheduler.cancel_frame(id);
            debug!("sampling loop stopped");
        }
    }
}
