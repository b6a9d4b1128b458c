//! Single-threaded cooperative event loop on a virtual clock.
//!
//! Two scheduling primitives share one clock: single-shot timers and "next frame" requests.
//! Frame requests are served on a fixed tick grid (`frame_interval`); a request made while a
//! tick is being drained lands on the following tick, the way `requestAnimationFrame` does.
//! Within one instant timers fire before frames.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::foundation::core::Millis;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiredKind {
    Timer,
    Frame { tick: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fired<E> {
    pub at: Millis,
    pub kind: FiredKind,
    pub event: E,
}

pub struct Scheduler<E> {
    now: Millis,
    frame_interval: Millis,
    next_frame_at: Millis,
    ticks: u64,
    next_seq: u64,

    timers: BTreeMap<(Millis, u64), E>,
    timer_deadlines: HashMap<u64, Millis>,

    frame_requests: BTreeMap<u64, E>,
    ready_frames: VecDeque<(u64, E)>,
}

impl<E> Scheduler<E> {
    pub fn new(frame_interval: Millis) -> Self {
        let frame_interval = Millis(frame_interval.0.max(1));
        Self {
            now: Millis::ZERO,
            frame_interval,
            next_frame_at: frame_interval,
            ticks: 0,
            next_seq: 0,
            timers: BTreeMap::new(),
            timer_deadlines: HashMap::new(),
            frame_requests: BTreeMap::new(),
            ready_frames: VecDeque::new(),
        }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn frame_interval(&self) -> Millis {
        self.frame_interval
    }

    /// Number of frame ticks served so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.frame_requests.len() + self.ready_frames.len()
    }

    fn seq(&mut self) -> u64 {
        let s = self.next_seq;
        self.next_seq += 1;
        s
    }

    pub fn schedule_after(&mut self, delay: Millis, event: E) -> TimerToken {
        let seq = self.seq();
        let at = self.now.saturating_add(delay);
        self.timers.insert((at, seq), event);
        self.timer_deadlines.insert(seq, at);
        TimerToken(seq)
    }

    /// Returns `false` when the timer already fired or was cancelled.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        match self.timer_deadlines.remove(&token.0) {
            Some(at) => self.timers.remove(&(at, token.0)).is_some(),
            None => false,
        }
    }

    pub fn request_frame(&mut self, event: E) -> FrameToken {
        if self.next_frame_at <= self.now {
            let interval = self.frame_interval.0;
            self.next_frame_at = Millis((self.now.0 / interval + 1) * interval);
        }
        let seq = self.seq();
        self.frame_requests.insert(seq, event);
        FrameToken(seq)
    }

    /// Returns `false` when the request already ran or was cancelled.
    pub fn cancel_frame(&mut self, token: FrameToken) -> bool {
        if self.frame_requests.remove(&token.0).is_some() {
            return true;
        }
        let before = self.ready_frames.len();
        self.ready_frames.retain(|(seq, _)| *seq != token.0);
        self.ready_frames.len() != before
    }

    /// Earliest instant at which something is due, if anything is pending.
    pub fn next_due(&self) -> Option<Millis> {
        if !self.ready_frames.is_empty() {
            return Some(self.now);
        }
        let timer = self.timers.keys().next().map(|(at, _)| *at);
        let frame = (!self.frame_requests.is_empty()).then_some(self.next_frame_at);
        match (timer, frame) {
            (Some(t), Some(f)) => Some(t.min(f)),
            (t, f) => t.or(f),
        }
    }

    /// Pops the next event due at or before `until`, advancing the clock to its instant.
    pub fn pop_due(&mut self, until: Millis) -> Option<Fired<E>> {
        if let Some((_, event)) = self.ready_frames.pop_front() {
            return Some(Fired {
                at: self.now,
                kind: FiredKind::Frame { tick: self.ticks },
                event,
            });
        }

        let timer_at = self.timers.keys().next().map(|(at, _)| *at);
        let frame_at = (!self.frame_requests.is_empty()).then_some(self.next_frame_at);

        let take_timer = match (timer_at, frame_at) {
            (Some(t), Some(f)) => t <= f,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if take_timer {
            let at = timer_at?;
            if at > until {
                return None;
            }
            let ((at, seq), event) = self.timers.pop_first()?;
            self.timer_deadlines.remove(&seq);
            self.now = self.now.max(at);
            return Some(Fired {
                at: self.now,
                kind: FiredKind::Timer,
                event,
            });
        }

        let at = frame_at?;
        if at > until {
            return None;
        }
        self.now = self.now.max(at);
        self.ticks += 1;
        self.next_frame_at = at.saturating_add(self.frame_interval);
        let drained = std::mem::take(&mut self.frame_requests);
        self.ready_frames.extend(drained);
        let (_, event) = self.ready_frames.pop_front()?;
        Some(Fired {
            at: self.now,
            kind: FiredKind::Frame { tick: self.ticks },
            event,
        })
    }

    /// Moves the clock forward without firing anything. Callers drain `pop_due` first.
    pub fn advance_to(&mut self, t: Millis) {
        self.now = self.now.max(t);
    }

    /// Drops every pending timer and frame request.
    pub fn clear(&mut self) {
        self.timers.clear();
        self.timer_deadlines.clear();
        self.frame_requests.clear();
        self.ready_frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler<&'static str>, until: u64) -> Vec<(u64, &'static str)> {
        let mut out = Vec::new();
        while let Some(f) = s.pop_due(Millis(until)) {
            out.push((f.at.0, f.event));
        }
        s.advance_to(Millis(until));
        out
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut s = Scheduler::new(Millis(16));
        s.schedule_after(Millis(30), "b");
        s.schedule_after(Millis(10), "a");
        s.schedule_after(Millis(30), "c");
        assert_eq!(drain(&mut s, 100), vec![(10, "a"), (30, "b"), (30, "c")]);
        assert_eq!(s.now(), Millis(100));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut s = Scheduler::new(Millis(16));
        let t = s.schedule_after(Millis(5), "x");
        assert!(s.cancel(t));
        assert!(!s.cancel(t));
        assert!(drain(&mut s, 50).is_empty());
    }

    #[test]
    fn timer_beyond_horizon_waits() {
        let mut s = Scheduler::new(Millis(16));
        s.schedule_after(Millis(500), "commit");
        assert!(drain(&mut s, 499).is_empty());
        assert_eq!(drain(&mut s, 500), vec![(500, "commit")]);
    }

    #[test]
    fn frame_requests_land_on_tick_grid() {
        let mut s = Scheduler::new(Millis(16));
        s.advance_to(Millis(20));
        s.request_frame("f");
        assert_eq!(s.next_due(), Some(Millis(32)));
        assert_eq!(drain(&mut s, 40), vec![(32, "f")]);
        assert_eq!(s.ticks(), 1);
    }

    #[test]
    fn request_during_tick_runs_next_tick() {
        let mut s = Scheduler::new(Millis(10));
        s.request_frame("a");
        let first = s.pop_due(Millis(100)).unwrap();
        assert_eq!(first.at, Millis(10));
        s.request_frame("b");
        let second = s.pop_due(Millis(100)).unwrap();
        assert_eq!((second.at, second.event), (Millis(20), "b"));
    }

    #[test]
    fn timers_precede_frames_at_same_instant() {
        let mut s = Scheduler::new(Millis(10));
        s.request_frame("frame");
        s.schedule_after(Millis(10), "timer");
        assert_eq!(drain(&mut s, 10), vec![(10, "timer"), (10, "frame")]);
    }

    #[test]
    fn cancel_frame_removes_ready_and_pending() {
        let mut s = Scheduler::new(Millis(10));
        let a = s.request_frame("a");
        let b = s.request_frame("b");
        assert!(s.cancel_frame(a));
        let fired = s.pop_due(Millis(10)).unwrap();
        assert_eq!(fired.event, "b");
        assert!(!s.cancel_frame(b));
        assert_eq!(s.pending_frames(), 0);
    }
}
