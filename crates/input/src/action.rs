/// A soundtrack cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    /// Plays once when the fly-through starts.
    Intro,
    /// Loops after the intro ends.
    Ambient,
}

impl Track {
    /// Path of the track relative to the asset base.
    pub fn path(self) -> &'static str {
        match self {
            Track::Intro => "audio/hbd.mp3",
            Track::Ambient => "audio/chill.mp3",
        }
    }
}

/// Something the session reacts to.
///
/// The host maps raw events (button click, double click, audio callbacks)
/// to actions; the session never sees raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The start button was pressed.
    Start,
    /// Double click on the canvas.
    ToggleFullscreen,
    /// The audio host finished decoding a track.
    TrackLoaded(Track),
    /// A non-looping track reached its end.
    TrackEnded(Track),
}
