use std::collections::{BTreeMap, VecDeque};

use crate::input::InputEvent;

/// Scripted window for tests and offscreen runs.
///
/// Each poll hands out the next scripted batch (or nothing once the script is
/// exhausted). After `frame_budget` polls the window asks to stop.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    script: VecDeque<Vec<InputEvent>>,
    resizes: BTreeMap<u64, (u32, u32)>,
    frame_budget: Option<u64>,
    polls: u64,
    pre_presents: u64,
    size: (u32, u32),
    stop_requested: bool,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            script: VecDeque::new(),
            resizes: BTreeMap::new(),
            frame_budget: None,
            polls: 0,
            pre_presents: 0,
            size: (width, height),
            stop_requested: false,
        }
    }

    /// Stops after `frames` polls.
    pub fn with_frame_budget(mut self, frames: u64) -> Self {
        self.frame_budget = Some(frames);
        self
    }

    /// Appends the batch returned by the next unscripted poll.
    pub fn push_frame(mut self, events: impl IntoIterator<Item = InputEvent>) -> Self {
        self.script.push_back(events.into_iter().collect());
        self
    }

    /// Changes the reported size when poll number `frame` (0-based) happens.
    pub fn resize_at(mut self, frame: u64, width: u32, height: u32) -> Self {
        self.resizes.insert(frame, (width, height));
        self
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Polls so far; one per loop iteration.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn pre_presents(&self) -> u64 {
        self.pre_presents
    }
}

impl super::Window for HeadlessWindow {
    fn poll_events(&mut self, out: &mut Vec<InputEvent>) {
        if let Some(size) = self.resizes.remove(&self.polls) {
            self.size = size;
        }
        if let Some(batch) = self.script.pop_front() {
            out.extend(batch);
        }
        self.polls += 1;
    }

    fn should_stop(&self) -> bool {
        self.stop_requested || self.frame_budget.is_some_and(|budget| self.polls >= budget)
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn pre_present(&mut self) {
        self.pre_presents += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key;
    use crate::window::Window;

    #[test]
    fn script_is_replayed_in_order() {
        let mut window = HeadlessWindow::new(4, 4)
            .push_frame([InputEvent::KeyDown { key: Key::W, repeat: false }])
            .push_frame(Vec::new())
            .push_frame([InputEvent::KeyUp { key: Key::W }]);

        let mut batches = Vec::new();
        for _ in 0..4 {
            let mut out = Vec::new();
            window.poll_events(&mut out);
            batches.push(out.len());
        }
        assert_eq!(batches, vec![1, 0, 1, 0]);
    }

    #[test]
    fn budget_stops_after_n_polls() {
        let mut window = HeadlessWindow::new(4, 4).with_frame_budget(2);
        let mut out = Vec::new();
        assert!(!window.should_stop());
        window.poll_events(&mut out);
        assert!(!window.should_stop());
        window.poll_events(&mut out);
        assert!(window.should_stop());
    }

    #[test]
    fn resize_applies_on_its_frame() {
        let mut window = HeadlessWindow::new(4, 4).resize_at(1, 8, 6);
        let mut out = Vec::new();
        window.poll_events(&mut out);
        assert_eq!(window.size(), (4, 4));
        window.poll_events(&mut out);
        assert_eq!(window.size(), (8, 6));
    }
}
