use std::collections::HashSet;

use crate::action::{Action, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Loader screen with the start button.
    Intro,
    /// Fly-through running.
    Running,
}

/// What the host should do in response to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    RemoveLoaderScreen,
    BeginAnimation,
    EnterFullscreen,
    ExitFullscreen,
    Play { track: Track, looping: bool },
}

/// Session state machine: loader screen, fly-through, fullscreen, soundtrack.
#[derive(Debug, Clone)]
pub struct Session {
    phase: SessionPhase,
    fullscreen: bool,
    loaded: HashSet<Track>,
    /// Intro was requested before its audio finished loading.
    intro_deferred: bool,
    playing: Option<Track>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Intro,
            fullscreen: false,
            loaded: HashSet::new(),
            intro_deferred: false,
            playing: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn playing(&self) -> Option<Track> {
        self.playing
    }

    pub fn handle(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::Start => self.start(),
            Action::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                tracing::info!(fullscreen = self.fullscreen, "fullscreen toggled");
                vec![if self.fullscreen {
                    Effect::EnterFullscreen
                } else {
                    Effect::ExitFullscreen
                }]
            }
            Action::TrackLoaded(track) => {
                self.loaded.insert(track);
                tracing::debug!(?track, "track loaded");
                if track == Track::Intro && self.intro_deferred {
                    self.intro_deferred = false;
                    return vec![self.play(Track::Intro, false)];
                }
                Vec::new()
            }
            Action::TrackEnded(track) => {
                if self.playing == Some(track) {
                    self.playing = None;
                }
                if track == Track::Intro && self.loaded.contains(&Track::Ambient) {
                    return vec![self.play(Track::Ambient, true)];
                }
                Vec::new()
            }
        }
    }

    fn start(&mut self) -> Vec<Effect> {
        if self.phase == SessionPhase::Running {
            return Vec::new();
        }
        self.phase = SessionPhase::Running;
        tracing::info!("fly-through started");
        let mut effects = vec![Effect::RemoveLoaderScreen, Effect::BeginAnimation];
        if self.loaded.contains(&Track::Intro) {
            effects.push(self.play(Track::Intro, false));
        } else {
            self.intro_deferred = true;
        }
        effects
    }

    fn play(&mut self, track: Track, looping: bool) -> Effect {
        self.playing = Some(track);
        Effect::Play { track, looping }
    }
}
