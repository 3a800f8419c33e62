use std::io::Write;
use std::time::Instant;

use anyhow::Result;

use crate::clock::Clock;
use crate::pattern::model::{PatternEntry, PatternSequence, SequenceError};
use crate::pattern::scheduler::{PatternScheduler, Prediction, ScheduleState, predict_appended,
    predict_replaced};

/// Side-effecting alert collaborator. Failures are logged by the
/// session and never reach the scheduler.
pub trait NotificationSink {
    fn fire(&mut self, index: usize, entry: &PatternEntry) -> Result<()>;
}

/// Default sink: terminal bell plus a log line.
pub struct BellSink;

impl NotificationSink for BellSink {
    fn fire(&mut self, index: usize, entry: &PatternEntry) -> Result<()> {
        let mut stdout = std::io::stdout();
        stdout.write_all(b"\x07")?;
        stdout.flush()?;
        log::info!("alarm {index} fired: {}", entry.label);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    EntryFired { index: usize, label: String },
    ScheduleChanged(ScheduleState),
    ActiveEntryChanged(Option<usize>),
    EditingEnabled(bool),
}

pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub elapsed_ms: u64,
    pub running: bool,
    pub schedule: ScheduleState,
    pub active_entry: Option<usize>,
}

/// Owns the clock, the pattern sequence, and the derived schedule
/// state. The schedule is never patched across edits: any externally
/// set elapsed time (start, reset, edit) forces a full resync.
pub struct StopwatchSession {
    clock: Clock,
    sequence: PatternSequence,
    scheduler: PatternScheduler,
    sink: Box<dyn NotificationSink>,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl StopwatchSession {
    pub fn new(sequence: PatternSequence, sink: Box<dyn NotificationSink>) -> Self {
        let scheduler = PatternScheduler::new(&sequence, 0);
        Self {
            clock: Clock::new(),
            sequence,
            scheduler,
            sink,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn sequence(&self) -> &PatternSequence {
        &self.sequence
    }

    pub fn schedule(&self) -> ScheduleState {
        self.scheduler.state()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        self.clock.elapsed_ms_at(now)
    }

    pub fn active_entry(&self) -> Option<usize> {
        self.scheduler.state().active_index(self.sequence.len())
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            elapsed_ms: self.clock.elapsed_ms_at(now),
            running: self.clock.is_running(),
            schedule: self.scheduler.state(),
            active_entry: self.active_entry(),
        }
    }

    /// Starts (or resumes) the clock. The sequence may have been edited
    /// while paused, so the schedule is resynced from current elapsed
    /// time rather than trusted.
    pub fn start(&mut self, now: Instant) -> bool {
        if !self.clock.start_at(now) {
            return false;
        }
        self.scheduler
            .resync(&self.sequence, self.clock.elapsed_ms_at(now));
        self.notify(SessionEvent::EditingEnabled(false));
        self.publish_schedule();
        true
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        if !self.clock.pause_at(now) {
            return false;
        }
        self.notify(SessionEvent::EditingEnabled(true));
        true
    }

    /// Zeroes the clock and the schedule; the pattern list survives.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.scheduler.resync(&self.sequence, 0);
        self.notify(SessionEvent::EditingEnabled(true));
        self.publish_schedule();
    }

    /// One logical timer tick. Drains every due trigger at the current
    /// elapsed time, invoking the sink per fired entry; bounded to one
    /// cycle's worth of fires so zero-length entries cannot spin.
    pub fn tick(&mut self, now: Instant) -> usize {
        if !self.clock.is_running() {
            return 0;
        }
        let elapsed = self.clock.elapsed_ms_at(now);
        let mut fired = 0;
        let budget = self.sequence.len().max(1);
        while fired < budget {
            let Some(index) = self.scheduler.poll(&self.sequence, elapsed) else {
                break;
            };
            let entry = self.sequence.entries()[index].clone();
            if let Err(err) = self.sink.fire(index, &entry) {
                log::warn!("notification sink failed for entry {index}: {err:#}");
            }
            self.notify(SessionEvent::EntryFired {
                index,
                label: entry.label,
            });
            fired += 1;
        }
        if fired > 0 {
            self.publish_schedule();
        }
        fired
    }

    pub fn add_entry(&mut self, entry: PatternEntry) -> Result<(), SequenceError> {
        self.ensure_editable()?;
        self.sequence.push(entry);
        self.after_edit();
        Ok(())
    }

    pub fn remove_entry(&mut self, index: usize) -> Result<PatternEntry, SequenceError> {
        self.ensure_editable()?;
        let removed = self.sequence.remove_at(index)?;
        self.after_edit();
        Ok(removed)
    }

    pub fn update_entry(&mut self, index: usize, entry: PatternEntry) -> Result<(), SequenceError> {
        self.ensure_editable()?;
        self.sequence.update_at(index, entry)?;
        self.after_edit();
        Ok(())
    }

    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), SequenceError> {
        self.ensure_editable()?;
        self.sequence.move_entry(from, to)?;
        self.after_edit();
        Ok(())
    }

    pub fn set_repeat(&mut self, repeat: bool) -> Result<(), SequenceError> {
        self.ensure_editable()?;
        self.sequence.set_repeat(repeat);
        self.after_edit();
        Ok(())
    }

    /// Wholesale replacement, as done by file import. `repeat: None`
    /// keeps the current setting (legacy bare-array files).
    pub fn replace_sequence(
        &mut self,
        entries: Vec<PatternEntry>,
        repeat: Option<bool>,
    ) -> Result<(), SequenceError> {
        self.ensure_editable()?;
        let repeat = repeat.unwrap_or(self.sequence.repeat());
        self.sequence = PatternSequence::new(entries, repeat);
        self.after_edit();
        Ok(())
    }

    pub fn predict_new_entry(&self, duration_ms: u64, now: Instant) -> Option<Prediction> {
        predict_appended(&self.sequence, duration_ms, self.clock.elapsed_ms_at(now))
    }

    pub fn predict_resized_entry(
        &self,
        index: usize,
        duration_ms: u64,
        now: Instant,
    ) -> Result<Option<Prediction>, SequenceError> {
        predict_replaced(&self.sequence, index, duration_ms, self.clock.elapsed_ms_at(now))
    }

    fn ensure_editable(&self) -> Result<(), SequenceError> {
        if self.clock.is_running() {
            return Err(SequenceError::EditWhileRunning);
        }
        Ok(())
    }

    // Edits happen with the clock paused, so elapsed is exactly the
    // accumulated value no matter which instant we sample.
    fn after_edit(&mut self) {
        let elapsed = self.clock.elapsed_ms_at(Instant::now());
        self.scheduler.resync(&self.sequence, elapsed);
        self.publish_schedule();
    }

    fn publish_schedule(&mut self) {
        let state = self.scheduler.state();
        let active = self.active_entry();
        self.notify(SessionEvent::ScheduleChanged(state));
        self.notify(SessionEvent::ActiveEntryChanged(active));
    }

    fn notify(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;

    struct NullSink;

    impl NotificationSink for NullSink {
        fn fire(&mut self, _index: usize, _entry: &PatternEntry) -> Result<()> {
            Ok(())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn fire(&mut self, _index: usize, _entry: &PatternEntry) -> Result<()> {
            anyhow::bail!("speaker unplugged")
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<SessionEvent>>>);

    impl SessionObserver for Recorder {
        fn on_event(&mut self, event: &SessionEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    fn two_step(repeat: bool) -> PatternSequence {
        PatternSequence::new(
            vec![
                PatternEntry::new(5_000, "A"),
                PatternEntry::new(3_000, "B"),
            ],
            repeat,
        )
    }

    fn at(base: Instant, offset_ms: u64) -> Instant {
        base + Duration::from_millis(offset_ms)
    }

    #[test]
    fn ticks_fire_entries_in_order_and_stop_at_terminal() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        let recorder = Recorder::default();
        let events = recorder.0.clone();
        session.subscribe(Box::new(recorder));

        assert!(session.start(base));
        assert_eq!(session.tick(at(base, 4_000)), 0);
        assert_eq!(session.tick(at(base, 5_010)), 1);
        assert_eq!(session.tick(at(base, 8_200)), 1);
        assert_eq!(session.tick(at(base, 60_000)), 0);

        let fired: Vec<String> = events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::EntryFired { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(fired, ["A", "B"]);
        assert!(session.schedule().is_terminal());
        assert_eq!(session.active_entry(), None);
    }

    #[test]
    fn coarse_tick_drains_multiple_due_triggers() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session.start(base);
        // a single late tick past both alarms reports both fires
        assert_eq!(session.tick(at(base, 9_000)), 2);
        assert!(session.schedule().is_terminal());
    }

    #[test]
    fn sink_failure_is_swallowed_and_schedule_still_advances() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(FailingSink));
        session.start(base);
        assert_eq!(session.tick(at(base, 5_000)), 1);
        assert_eq!(session.active_entry(), Some(1));
    }

    #[test]
    fn edits_are_rejected_while_running() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session.start(base);

        assert_eq!(
            session.add_entry(PatternEntry::new(1_000, "C")),
            Err(SequenceError::EditWhileRunning)
        );
        assert_eq!(session.remove_entry(0), Err(SequenceError::EditWhileRunning));
        assert_eq!(session.set_repeat(false), Err(SequenceError::EditWhileRunning));
        assert_eq!(
            session.replace_sequence(Vec::new(), None),
            Err(SequenceError::EditWhileRunning)
        );
        assert_eq!(session.sequence().len(), 2);
    }

    #[test]
    fn edit_while_paused_resyncs_the_schedule() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session.start(base);
        session.tick(at(base, 5_000));
        session.pause(at(base, 6_000));

        // shrink B so its alarm lands before the paused elapsed of 6s;
        // the resync must treat it as already fired, not pending
        session
            .update_entry(1, PatternEntry::new(500, "B"))
            .expect("paused edit");
        assert!(session.schedule().is_terminal());

        // growing B revives the schedule from the same elapsed time
        session
            .update_entry(1, PatternEntry::new(10_000, "B"))
            .expect("paused edit");
        assert_eq!(session.schedule().next_trigger.at_ms(), Some(15_000));
        assert_eq!(session.active_entry(), Some(1));
    }

    #[test]
    fn readding_entries_after_terminal_state_unterminates_via_resync() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session.start(base);
        session.tick(at(base, 9_000));
        assert!(session.schedule().is_terminal());
        session.pause(at(base, 9_000));

        session
            .add_entry(PatternEntry::new(4_000, "C"))
            .expect("paused edit");
        assert_eq!(session.schedule().next_trigger.at_ms(), Some(12_000));
        assert_eq!(session.active_entry(), Some(2));
    }

    #[test]
    fn reset_zeroes_clock_and_schedule_but_keeps_patterns() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session.start(base);
        session.tick(at(base, 9_000));
        session.pause(at(base, 9_000));

        session.reset();
        let snapshot = session.snapshot(at(base, 10_000));
        assert_eq!(snapshot.elapsed_ms, 0);
        assert!(!snapshot.running);
        assert_eq!(snapshot.schedule.current_index, 0);
        assert_eq!(snapshot.schedule.next_trigger.at_ms(), Some(5_000));
        assert_eq!(session.sequence().len(), 2);
    }

    #[test]
    fn pause_resume_keeps_absolute_trigger_times() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session.start(base);
        session.tick(at(base, 3_000));
        session.pause(at(base, 3_000));

        // resume much later in wall time; elapsed continues from 3s
        session.start(at(base, 60_000));
        assert_eq!(session.tick(at(base, 61_500)), 0);
        assert_eq!(session.tick(at(base, 62_000)), 1);
        assert_eq!(session.active_entry(), Some(1));
    }

    #[test]
    fn bare_array_import_keeps_current_repeat_setting() {
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session
            .replace_sequence(vec![PatternEntry::new(1_000, "solo")], None)
            .expect("import");
        assert!(!session.sequence().repeat());

        session
            .replace_sequence(vec![PatternEntry::new(1_000, "solo")], Some(true))
            .expect("import");
        assert!(session.sequence().repeat());
    }

    #[test]
    fn observers_see_interaction_lock_transitions() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(true), Box::new(NullSink));
        let recorder = Recorder::default();
        let events = recorder.0.clone();
        session.subscribe(Box::new(recorder));

        session.start(base);
        session.pause(at(base, 1_000));
        let locks: Vec<bool> = events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::EditingEnabled(enabled) => Some(*enabled),
                _ => None,
            })
            .collect();
        assert_eq!(locks, [false, true]);
    }

    #[test]
    fn predictions_do_not_touch_live_state() {
        let base = Instant::now();
        let mut session = StopwatchSession::new(two_step(false), Box::new(NullSink));
        session.start(base);
        session.tick(at(base, 5_000));
        let before = session.schedule();

        assert_eq!(
            session.predict_new_entry(2_000, at(base, 5_000)),
            Some(Prediction::At(10_000))
        );
        assert_eq!(session.schedule(), before);
        assert_eq!(session.sequence().len(), 2);
    }
}
