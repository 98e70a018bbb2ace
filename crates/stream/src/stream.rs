use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::StdRng;
use shoji_assets::{ImageLoader, ResourceLoadError};
use shoji_scene::{SceneEvent, SceneGraph};

use crate::camera::FlyThroughCamera;
use crate::config::StreamConfig;
use crate::factory::{PanelFactory, PendingPanel};
use crate::state::GeneratorState;
use crate::window::{LiveWindow, WindowError};

/// Why a panel never made it into the window.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error(transparent)]
    Load(#[from] ResourceLoadError),
    #[error(transparent)]
    Window(#[from] WindowError),
}

#[derive(Debug)]
pub struct PanelFailure {
    pub creation_index: u64,
    pub error: PanelError,
}

/// What happened during one frame.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub camera_x: f64,
    /// Creation index issued this frame, if any.
    pub issued: Option<u64>,
    /// Admitted this frame, in completion order.
    pub admitted: Vec<u64>,
    pub retired: Vec<u64>,
    pub failed: Vec<PanelFailure>,
    /// Scene mutations made this frame, drained from the scene's log.
    pub scene_events: Vec<SceneEvent>,
}

impl FrameReport {
    pub fn is_quiet(&self) -> bool {
        self.issued.is_none()
            && self.admitted.is_empty()
            && self.retired.is_empty()
            && self.failed.is_empty()
    }
}

/// Running totals for instrumentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub frames: u64,
    pub issued: u64,
    pub admitted: u64,
    pub retired: u64,
    pub failed: u64,
    pub pending: usize,
    pub live: usize,
    pub last_update: Duration,
}

/// The panel stream generator: spawn trigger, pending fetches and live window.
///
/// Single-threaded. Pending panels are boxed futures polled once per frame
/// with a no-op waker; whichever complete are admitted in completion order.
pub struct PanelStream<L, R> {
    config: StreamConfig,
    factory: PanelFactory,
    loader: L,
    state: GeneratorState<R>,
    window: LiveWindow,
    pending: Vec<PendingPanel>,
    stats: StreamStats,
}

impl<L: ImageLoader> PanelStream<L, StdRng> {
    /// Stream with an entropy-seeded image order and shape layout.
    pub fn new(config: StreamConfig, loader: L) -> Self {
        let state = GeneratorState::from_entropy(config.image_count);
        Self::with_state(config, loader, state)
    }

    /// Reproducible stream.
    pub fn seeded(config: StreamConfig, loader: L, seed: u64) -> Self {
        let state = GeneratorState::seeded(config.image_count, seed);
        Self::with_state(config, loader, state)
    }
}

impl<L: ImageLoader, R: Rng> PanelStream<L, R> {
    pub fn with_state(config: StreamConfig, loader: L, state: GeneratorState<R>) -> Self {
        Self {
            factory: PanelFactory::new(&config),
            window: LiveWindow::new(config.window_size, config.eviction),
            config,
            loader,
            state,
            pending: Vec::new(),
            stats: StreamStats::default(),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn factory(&self) -> &PanelFactory {
        &self.factory
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn state(&self) -> &GeneratorState<R> {
        &self.state
    }

    pub fn window(&self) -> &LiveWindow {
        &self.window
    }

    /// Creation indices still waiting on their image, in issue order.
    pub fn pending_indices(&self) -> Vec<u64> {
        self.pending
            .iter()
            .map(|p| p.request.creation_index)
            .collect()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Step the camera one frame, then run [`frame`](Self::frame).
    pub fn advance(
        &mut self,
        camera: &mut FlyThroughCamera,
        scene: &mut SceneGraph,
    ) -> FrameReport {
        let x = camera.advance();
        self.frame(x, scene)
    }

    /// Run one frame at camera position `camera_x`.
    ///
    /// The scene's event log is drained into the report, so it never
    /// outgrows one frame's worth of mutations.
    pub fn frame(&mut self, camera_x: f64, scene: &mut SceneGraph) -> FrameReport {
        let _span = tracing::info_span!("panel_stream_frame", frame = self.stats.frames).entered();
        let frame_start = Instant::now();
        let mut report = FrameReport {
            frame: self.stats.frames,
            camera_x,
            ..FrameReport::default()
        };

        if let Some(pending) = self
            .state
            .spawn_if_due(camera_x, &self.factory, &self.loader)
        {
            report.issued = Some(pending.request.creation_index);
            self.stats.issued += 1;
            self.pending.push(pending);
        }

        self.poll_pending(scene, &mut report);
        report.scene_events = scene.drain_events();

        self.stats.frames += 1;
        self.stats.pending = self.pending.len();
        self.stats.live = self.window.len();
        self.stats.last_update = frame_start.elapsed();

        if !report.is_quiet() {
            tracing::trace!(
                issued = ?report.issued,
                admitted = report.admitted.len(),
                retired = report.retired.len(),
                failed = report.failed.len(),
                scene_events = report.scene_events.len(),
                pending = self.pending.len(),
                live = self.window.len(),
                "frame complete"
            );
        }
        report
    }

    fn poll_pending(&mut self, scene: &mut SceneGraph, report: &mut FrameReport) {
        let mut cx = Context::from_waker(Waker::noop());
        let mut i = 0;
        while i < self.pending.len() {
            let result = match self.pending[i].task.as_mut().poll(&mut cx) {
                Poll::Pending => {
                    i += 1;
                    continue;
                }
                Poll::Ready(result) => result,
            };
            let done = self.pending.remove(i);
            let index = done.request.creation_index;

            let outcome = result
                .map_err(PanelError::from)
                .and_then(|panel| self.window.admit(panel, scene).map_err(PanelError::from));
            match outcome {
                Ok(admission) => {
                    self.stats.admitted += 1;
                    report.admitted.push(index);
                    for p in admission.retired {
                        self.stats.retired += 1;
                        report.retired.push(p.creation_index);
                    }
                }
                Err(error) => {
                    self.window.skip(index);
                    tracing::warn!(
                        index,
                        image = %done.request.image_id,
                        %error,
                        "panel dropped"
                    );
                    self.stats.failed += 1;
                    report.failed.push(PanelFailure {
                        creation_index: index,
                        error,
                    });
                }
            }
        }
    }

    /// Retire every live panel and abandon pending fetches.
    pub fn shutdown(&mut self, scene: &mut SceneGraph) -> Result<usize, WindowError> {
        let abandoned = self.pending.len();
        self.pending.clear();
        let retired = self.window.clear(scene)?;
        self.stats.retired += retired.len() as u64;
        self.stats.pending = 0;
        self.stats.live = 0;
        tracing::info!(retired = retired.len(), abandoned, "panel stream shut down");
        Ok(retired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionPolicy;
    use crate::window::PanelState;
    use shoji_assets::{ImageData, MemoryImageLoader};
    use shoji_common::ImageId;

    fn stream(loader: MemoryImageLoader) -> PanelStream<MemoryImageLoader, StdRng> {
        PanelStream::seeded(StreamConfig::default(), loader, 11)
    }

    fn all_images(loader: &MemoryImageLoader, config: &StreamConfig) {
        let source = shoji_assets::ImageSource::new(config.base_url.clone());
        for n in 1..=config.image_count {
            loader.insert(source.url_for(ImageId(n)), ImageData::blank(16, 9));
        }
    }

    /// Drive the camera until `count` panels have been issued.
    fn run_until_issued(
        s: &mut PanelStream<MemoryImageLoader, StdRng>,
        cam: &mut FlyThroughCamera,
        scene: &mut SceneGraph,
        count: u64,
    ) -> Vec<FrameReport> {
        let mut reports = Vec::new();
        while s.stats().issued < count {
            let r = s.advance(cam, scene);
            if !r.is_quiet() {
                reports.push(r);
            }
        }
        reports
    }

    #[test]
    fn first_frame_spawns_first_panel() {
        let loader = MemoryImageLoader::new();
        all_images(&loader, &StreamConfig::default());
        let mut s = stream(loader);
        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();

        let r = s.advance(&mut cam, &mut scene);
        assert_eq!(r.issued, Some(0));
        assert_eq!(r.admitted, vec![0]);
        assert_eq!(s.window().get(0).unwrap().world_offset_x, 300.0);
        assert_eq!(s.state().spawn_threshold_x(), 150.0);

        // Nothing more until the camera reaches 150.
        for _ in 0..100 {
            assert!(s.advance(&mut cam, &mut scene).is_quiet());
        }
    }

    #[test]
    fn five_instant_panels() {
        let loader = MemoryImageLoader::new();
        all_images(&loader, &StreamConfig::default());
        let mut s = stream(loader);
        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();

        let reports = run_until_issued(&mut s, &mut cam, &mut scene, 5);
        assert_eq!(reports.len(), 5);
        for (k, r) in reports.iter().enumerate() {
            assert_eq!(r.admitted, vec![k as u64]);
            if k < 4 {
                assert!(r.retired.is_empty());
            }
        }
        // Panel #1 retires exactly when panel #5 is admitted.
        assert_eq!(reports[4].retired, vec![0]);
        assert_eq!(s.window().live_indices(), vec![1, 2, 3, 4]);

        let offsets: Vec<f64> = s.window().panels().map(|p| p.world_offset_x).collect();
        assert_eq!(offsets, vec![450.0, 600.0, 750.0, 900.0]);
    }

    #[test]
    fn window_size_holds_over_long_run() {
        let loader = MemoryImageLoader::new();
        all_images(&loader, &StreamConfig::default());
        let mut s = stream(loader);
        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();

        let reports = run_until_issued(&mut s, &mut cam, &mut scene, 30);
        for (k, r) in reports.iter().enumerate() {
            let expected_retired = usize::from(k >= 4);
            assert_eq!(r.retired.len(), expected_retired);
        }
        assert_eq!(s.window().len(), 4);
        assert_eq!(s.stats().retired, 26);
        assert_eq!(s.stats().admitted, 30);
    }

    #[test]
    fn failed_fetch_skips_one_panel() {
        let config = StreamConfig::default();
        let loader = MemoryImageLoader::new();
        all_images(&loader, &config);
        let mut s = PanelStream::seeded(config, loader.clone(), 3);

        // Panel #3 (index 2) gets the third image of the first permutation.
        let third = s.state().sequencer().order()[2];
        loader.fail(s.factory().source().url_for(third), "connection reset");

        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();
        let reports = run_until_issued(&mut s, &mut cam, &mut scene, 5);

        let admitted: Vec<u64> = reports.iter().flat_map(|r| r.admitted.clone()).collect();
        assert_eq!(admitted, vec![0, 1, 3, 4]);
        let failed: Vec<u64> = reports
            .iter()
            .flat_map(|r| r.failed.iter().map(|f| f.creation_index))
            .collect();
        assert_eq!(failed, vec![2]);
        assert!(matches!(
            reports[2].failed[0].error,
            PanelError::Load(ResourceLoadError::Unavailable { .. })
        ));

        // Eviction keys off creation index: admitting 4 retires 0.
        assert_eq!(reports[4].retired, vec![0]);
        assert_eq!(s.window().live_indices(), vec![1, 3, 4]);
        assert_eq!(s.window().state_of(2), None);

        // The corridor kept advancing past the failed slot.
        assert_eq!(s.window().get(3).unwrap().world_offset_x, 750.0);
    }

    #[test]
    fn out_of_order_completion() {
        let config = StreamConfig::default();
        let loader = MemoryImageLoader::new();
        all_images(&loader, &config);
        let mut s = PanelStream::seeded(config, loader.clone(), 8);

        let second = s.state().sequencer().order()[1];
        let second_url = s.factory().source().url_for(second);
        loader.hold(second_url.clone());

        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();
        run_until_issued(&mut s, &mut cam, &mut scene, 3);
        assert_eq!(s.pending_indices(), vec![1]);
        assert_eq!(s.window().live_indices(), vec![0, 2]);

        loader.release(&second_url);
        let r = s.advance(&mut cam, &mut scene);
        assert_eq!(r.admitted, vec![1]);
        assert!(s.pending_indices().is_empty());

        // Spacing came from the value captured at issue time.
        assert_eq!(s.window().get(1).unwrap().world_offset_x, 450.0);
        assert_eq!(s.window().get(2).unwrap().world_offset_x, 600.0);
    }

    #[test]
    fn stalled_fetch_stays_pending() {
        let config = StreamConfig::default();
        let loader = MemoryImageLoader::new();
        all_images(&loader, &config);
        let mut s = PanelStream::seeded(config, loader.clone(), 5);
        let first = s.state().sequencer().order()[0];
        loader.hold(s.factory().source().url_for(first));

        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();
        run_until_issued(&mut s, &mut cam, &mut scene, 6);

        assert_eq!(s.pending_indices(), vec![0]);
        assert_eq!(s.window().live_indices(), vec![2, 3, 4, 5]);
        assert_eq!(s.stats().pending, 1);
    }

    #[test]
    fn oldest_live_policy_through_stream() {
        let config = StreamConfig {
            eviction: EvictionPolicy::OldestLive,
            window_size: 2,
            ..StreamConfig::default()
        };
        let loader = MemoryImageLoader::new();
        all_images(&loader, &config);
        let mut s = PanelStream::seeded(config, loader, 1);
        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();
        run_until_issued(&mut s, &mut cam, &mut scene, 5);
        assert_eq!(s.window().live_indices(), vec![3, 4]);
        assert_eq!(s.window().state_of(0), Some(PanelState::Retired));
    }

    #[test]
    fn shutdown_releases_everything() {
        let loader = MemoryImageLoader::new();
        all_images(&loader, &StreamConfig::default());
        let mut s = stream(loader);
        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();
        run_until_issued(&mut s, &mut cam, &mut scene, 6);

        let retired = s.shutdown(&mut scene).unwrap();
        assert_eq!(retired, 4);
        assert!(s.window().is_empty());
        assert_eq!(scene.node_count(), 1);
        assert_eq!(scene.resources().live_count(), 0);
        assert_eq!(
            scene.resources().allocated_total(),
            scene.resources().released_total()
        );
    }

    #[test]
    fn long_run_bookkeeping_stays_bounded() {
        let config = StreamConfig::default();
        let loader = MemoryImageLoader::synthetic(
            &shoji_assets::ImageSource::new(config.base_url.clone()),
            config.image_count,
        );
        let mut s = PanelStream::seeded(config, loader.clone(), 17);
        let mut scene = SceneGraph::new();
        // One panel per frame.
        let mut cam = FlyThroughCamera::with_step(150.0);

        for _ in 0..2000 {
            let r = s.advance(&mut cam, &mut scene);
            assert_eq!(r.admitted.len(), 1);
            assert!(!r.scene_events.is_empty());
            assert!(scene.events().is_empty());
        }
        assert_eq!(s.stats().admitted, 2000);
        assert_eq!(scene.node_count(), 1 + 4 * 50);
        assert_eq!(s.window().closed_below(), 1996);
        assert_eq!(s.window().sparse_closed(), 0);
        assert_eq!(loader.request_count(), 2000);
        assert!(loader.requests().len() <= MemoryImageLoader::REQUEST_LOG_CAPACITY);
    }

    #[test]
    fn frame_report_carries_scene_events() {
        let loader = MemoryImageLoader::new();
        all_images(&loader, &StreamConfig::default());
        let mut s = stream(loader);
        let mut scene = SceneGraph::new();
        let mut cam = FlyThroughCamera::default();

        let r = s.advance(&mut cam, &mut scene);
        // backing plane + 6 bars + grid + 40 cones + frame + photo
        let attached = r
            .scene_events
            .iter()
            .filter(|e| matches!(e, SceneEvent::Attached { .. }))
            .count();
        assert_eq!(attached, 50);
        assert!(s.advance(&mut cam, &mut scene).scene_events.is_empty());
    }
}
