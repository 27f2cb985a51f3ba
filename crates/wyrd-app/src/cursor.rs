//! Interaction signals sampled once per frame.

use serde::{Deserialize, Serialize};

/// External source of the interaction cursor (e.g. an optical-flow tracker).
pub trait CursorSource {
    /// Horizontal cursor position, quantised to a shaft index.
    fn cursor(&self) -> usize;

    /// Whether motion was detected this frame.
    fn motion_detected(&self) -> bool;

    /// Whether the vertical gesture that cycles the update mode fired.
    fn mode_reset(&self) -> bool {
        false
    }

    /// Move on to the next frame. Called after the frame was sampled.
    fn advance(&mut self) {}
}

/// One frame's worth of cursor signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CursorSample {
    pub cursor: usize,
    pub motion: bool,
    #[serde(default)]
    pub mode_reset: bool,
}

impl CursorSample {
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            cursor: 0,
            motion: false,
            mode_reset: false,
        }
    }

    #[must_use]
    pub const fn moving(cursor: usize) -> Self {
        Self {
            cursor,
            motion: true,
            mode_reset: false,
        }
    }

    pub fn read(source: &impl CursorSource) -> Self {
        Self {
            cursor: source.cursor(),
            motion: source.motion_detected(),
            mode_reset: source.mode_reset(),
        }
    }
}

/// Empty room: never any motion.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleCursor;

impl CursorSource for IdleCursor {
    fn cursor(&self) -> usize {
        0
    }

    fn motion_detected(&self) -> bool {
        false
    }
}

/// Replays a fixed list of samples, cycling when exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCursor {
    samples: Vec<CursorSample>,
    position: usize,
}

impl ScriptedCursor {
    /// An empty script behaves like [`IdleCursor`].
    #[must_use]
    pub fn new(samples: Vec<CursorSample>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    fn current(&self) -> CursorSample {
        self.samples
            .get(self.position)
            .copied()
            .unwrap_or_default()
    }
}

impl CursorSource for ScriptedCursor {
    fn cursor(&self) -> usize {
        self.current().cursor
    }

    fn motion_detected(&self) -> bool {
        self.current().motion
    }

    fn mode_reset(&self) -> bool {
        self.current().mode_reset
    }

    fn advance(&mut self) {
        if !self.samples.is_empty() {
            self.position = (self.position + 1) % self.samples.len();
        }
    }
}

/// Deterministic visitor: alternating active and quiet stretches while the
/// cursor walks across the shafts.
#[derive(Debug, Clone)]
pub struct SweepCursor {
    num_shafts: usize,
    active_frames: u64,
    idle_frames: u64,
    frames_per_step: u64,
    frame: u64,
}

impl SweepCursor {
    #[must_use]
    pub fn new(num_shafts: usize, active_frames: u64, idle_frames: u64) -> Self {
        Self {
            num_shafts: num_shafts.max(1),
            active_frames,
            idle_frames,
            frames_per_step: 8,
            frame: 0,
        }
    }

    /// Frames the cursor stays on one shaft.
    #[must_use]
    pub fn with_frames_per_step(mut self, frames: u64) -> Self {
        self.frames_per_step = frames.max(1);
        self
    }

    fn period(&self) -> u64 {
        (self.active_frames + self.idle_frames).max(1)
    }

    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}

impl CursorSource for SweepCursor {
    fn cursor(&self) -> usize {
        let step = self.frame / self.frames_per_step;
        (step % self.num_shafts as u64) as usize
    }

    fn motion_detected(&self) -> bool {
        self.frame % self.period() < self.active_frames
    }

    /// Fires on the last frame of each active stretch.
    fn mode_reset(&self) -> bool {
        self.active_frames > 0 && self.frame % self.period() == self.active_frames - 1
    }

    fn advance(&mut self) {
        self.frame += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_cursor_cycles() {
        let mut source = ScriptedCursor::new(vec![CursorSample::moving(3), CursorSample::idle()]);
        assert_eq!(CursorSample::read(&source), CursorSample::moving(3));
        source.advance();
        assert!(!source.motion_detected());
        source.advance();
        assert_eq!(source.cursor(), 3);
    }

    #[test]
    fn empty_script_is_idle() {
        let mut source = ScriptedCursor::new(Vec::new());
        source.advance();
        assert_eq!(CursorSample::read(&source), CursorSample::idle());
    }

    #[test]
    fn sweep_alternates_motion_windows() {
        let mut source = SweepCursor::new(4, 3, 2).with_frames_per_step(1);
        let mut motion = Vec::new();
        let mut resets = Vec::new();
        let mut cursors = Vec::new();
        for _ in 0..10 {
            motion.push(source.motion_detected());
            resets.push(source.mode_reset());
            cursors.push(source.cursor());
            source.advance();
        }
        assert_eq!(
            motion,
            vec![true, true, true, false, false, true, true, true, false, false]
        );
        assert_eq!(resets.iter().filter(|&&r| r).count(), 2);
        assert!(resets[2] && resets[7]);
        assert_eq!(cursors, vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }
}
