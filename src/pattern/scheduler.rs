use crate::pattern::model::{PatternEntry, PatternSequence, SequenceError};

/// Absolute elapsed-time instant of the next alarm, in milliseconds
/// since the clock's zero. Never a relative/remaining value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTrigger {
    At(u64),
    Unreachable,
}

impl NextTrigger {
    pub fn at_ms(self) -> Option<u64> {
        match self {
            NextTrigger::At(ms) => Some(ms),
            NextTrigger::Unreachable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    /// Index of the entry whose alarm is next due; equals the sequence
    /// length once a non-repeating sequence is exhausted.
    pub current_index: usize,
    pub next_trigger: NextTrigger,
}

impl ScheduleState {
    pub fn exhausted(len: usize) -> Self {
        Self {
            current_index: len,
            next_trigger: NextTrigger::Unreachable,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_trigger == NextTrigger::Unreachable
    }

    pub fn active_index(&self, len: usize) -> Option<usize> {
        (self.current_index < len).then_some(self.current_index)
    }
}

fn cycle_base_ms(repeat: bool, elapsed_ms: u64, total_cycle_ms: u64) -> u64 {
    if repeat && elapsed_ms > 0 {
        (elapsed_ms / total_cycle_ms) * total_cycle_ms
    } else {
        0
    }
}

/// Full simulation of the schedule against an elapsed time. This is the
/// only valid way to (re)establish schedule state after a resume, a
/// reset, or any sequence edit; the incremental step below is reserved
/// for the instant right after a fire on an unmodified sequence.
///
/// An entry whose accumulated trigger time equals `elapsed_ms` exactly
/// counts as already fired, so boundaries never double-fire.
pub fn compute_schedule(sequence: &PatternSequence, elapsed_ms: u64) -> ScheduleState {
    let total = sequence.total_cycle_ms();
    if total == 0 {
        return ScheduleState::exhausted(sequence.len());
    }

    let base = cycle_base_ms(sequence.repeat(), elapsed_ms, total);
    let mut acc = 0u64;
    for (index, entry) in sequence.entries().iter().enumerate() {
        acc += entry.duration_ms;
        let candidate = base + acc;
        if candidate <= elapsed_ms {
            continue;
        }
        return ScheduleState {
            current_index: index,
            next_trigger: NextTrigger::At(candidate),
        };
    }

    if sequence.repeat() {
        // Everything in the current cycle already fired; the next alarm
        // is the first entry of the following cycle.
        ScheduleState {
            current_index: 0,
            next_trigger: NextTrigger::At(base + total + sequence.entries()[0].duration_ms),
        }
    } else {
        ScheduleState::exhausted(sequence.len())
    }
}

/// Cursor step applied immediately after a fire: the new trigger is the
/// old one plus the new current entry's duration, wrapping to entry 0
/// on repeat. Matches `compute_schedule` at the fire instant as long as
/// the sequence was not edited in between.
pub fn advance_after_fire(sequence: &PatternSequence, state: ScheduleState) -> ScheduleState {
    let NextTrigger::At(fired_at) = state.next_trigger else {
        return state;
    };
    let len = sequence.len();
    let next_index = state.current_index + 1;
    if next_index >= len {
        if sequence.repeat() && len > 0 {
            ScheduleState {
                current_index: 0,
                next_trigger: NextTrigger::At(fired_at + sequence.entries()[0].duration_ms),
            }
        } else {
            ScheduleState::exhausted(len)
        }
    } else {
        ScheduleState {
            current_index: next_index,
            next_trigger: NextTrigger::At(fired_at + sequence.entries()[next_index].duration_ms),
        }
    }
}

/// Stateful cursor over a sequence's schedule. Owns nothing but derived
/// data; `resync` rebuilds it wholesale from `(sequence, elapsed_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternScheduler {
    state: ScheduleState,
}

impl PatternScheduler {
    pub fn new(sequence: &PatternSequence, elapsed_ms: u64) -> Self {
        Self {
            state: compute_schedule(sequence, elapsed_ms),
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn resync(&mut self, sequence: &PatternSequence, elapsed_ms: u64) {
        self.state = compute_schedule(sequence, elapsed_ms);
    }

    /// Fire check for one tick: reports the due entry's index and
    /// advances the cursor, or `None` when nothing is due yet. At most
    /// one fire per call; callers drain with bounded repeat polls.
    pub fn poll(&mut self, sequence: &PatternSequence, elapsed_ms: u64) -> Option<usize> {
        let due = self.state.next_trigger.at_ms()?;
        if elapsed_ms < due {
            return None;
        }
        let fired = self.state.current_index;
        self.state = advance_after_fire(sequence, self.state);
        Some(fired)
    }
}

/// Per-entry trigger time for list display: when each entry will next
/// fire given the current elapsed time, or `Completed` once it is past
/// on a non-repeating sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTrigger {
    At(u64),
    Completed,
}

pub fn entry_trigger_times(sequence: &PatternSequence, elapsed_ms: u64) -> Vec<EntryTrigger> {
    let total = sequence.total_cycle_ms();
    if total == 0 {
        return vec![EntryTrigger::Completed; sequence.len()];
    }

    let base = cycle_base_ms(sequence.repeat(), elapsed_ms, total);
    let mut acc = 0u64;
    sequence
        .entries()
        .iter()
        .map(|entry| {
            acc += entry.duration_ms;
            let trigger = base + acc;
            if trigger <= elapsed_ms {
                if sequence.repeat() {
                    EntryTrigger::At(trigger + total)
                } else {
                    EntryTrigger::Completed
                }
            } else {
                EntryTrigger::At(trigger)
            }
        })
        .collect()
}

/// Predicted fire time for a single entry of a hypothetical sequence.
/// `AlreadyPast` is a per-entry terminal condition on non-repeating
/// sequences, distinct from the whole-sequence `Unreachable` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    At(u64),
    AlreadyPast,
}

pub fn predict_at(
    sequence: &PatternSequence,
    target_index: usize,
    elapsed_ms: u64,
) -> Option<Prediction> {
    if target_index >= sequence.len() {
        return None;
    }
    let total = sequence.total_cycle_ms();
    if total == 0 {
        return None;
    }

    let base = cycle_base_ms(sequence.repeat(), elapsed_ms, total);
    let mut acc = 0u64;
    for (index, entry) in sequence.entries().iter().enumerate() {
        acc += entry.duration_ms;
        if index == target_index {
            let trigger = base + acc;
            if trigger <= elapsed_ms {
                return Some(if sequence.repeat() {
                    Prediction::At(trigger + total)
                } else {
                    Prediction::AlreadyPast
                });
            }
            return Some(Prediction::At(trigger));
        }
    }
    None
}

/// "If I added an entry of this duration, when would it fire?"
/// Simulated on a transient copy; live state untouched.
pub fn predict_appended(
    sequence: &PatternSequence,
    duration_ms: u64,
    elapsed_ms: u64,
) -> Option<Prediction> {
    let mut transient = sequence.clone();
    transient.push(PatternEntry::new(duration_ms, ""));
    predict_at(&transient, transient.len() - 1, elapsed_ms)
}

/// Same question for resizing an existing entry in place.
pub fn predict_replaced(
    sequence: &PatternSequence,
    index: usize,
    duration_ms: u64,
    elapsed_ms: u64,
) -> Result<Option<Prediction>, SequenceError> {
    let label = sequence.entry_at(index)?.label.clone();
    let mut transient = sequence.clone();
    transient.update_at(index, PatternEntry::new(duration_ms, label))?;
    Ok(predict_at(&transient, index, elapsed_ms))
}

pub fn format_hms(ms: u64) -> String {
    let total_secs = ms / 1_000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3_600,
        (total_secs % 3_600) / 60,
        total_secs % 60
    )
}

pub fn format_entry_trigger(trigger: EntryTrigger) -> String {
    match trigger {
        EntryTrigger::At(ms) => format!("fires at {}", format_hms(ms)),
        EntryTrigger::Completed => "completed".to_string(),
    }
}
