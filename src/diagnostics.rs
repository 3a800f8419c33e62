use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::pattern::model::PatternSequence;
use crate::pattern::scheduler::{
    NextTrigger, compute_schedule, entry_trigger_times, format_entry_trigger, format_hms,
};

/// Drift bookkeeping for the fixed-period tick loop. The reference
/// clock accepts bounded drift; this measures how bounded it actually
/// is on the host.
pub struct TickStats {
    total_ticks: u64,
    late_ticks: u64,
    max_drift: Duration,
    window: VecDeque<Duration>,
    drift_histogram: [u64; 5],
}

impl TickStats {
    pub fn new(window_size: usize) -> Self {
        Self {
            total_ticks: 0,
            late_ticks: 0,
            max_drift: Duration::ZERO,
            window: VecDeque::with_capacity(window_size),
            drift_histogram: [0; 5],
        }
    }

    /// Records how far past its scheduled deadline a tick actually ran.
    pub fn record_drift(&mut self, drift: Duration, tolerance: Duration) {
        self.total_ticks += 1;
        if drift > tolerance {
            self.late_ticks += 1;
        }
        self.max_drift = self.max_drift.max(drift);

        if self.window.len() == self.window.capacity() {
            let _ = self.window.pop_front();
        }
        self.window.push_back(drift);

        let ms = drift.as_secs_f64() * 1_000.0;
        let bucket = if ms <= 0.1 {
            0
        } else if ms <= 1.0 {
            1
        } else if ms <= 5.0 {
            2
        } else if ms <= 20.0 {
            3
        } else {
            4
        };
        self.drift_histogram[bucket] += 1;
    }

    pub fn mean_drift(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.window.iter().sum();
        total / self.window.len() as u32
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }

    pub fn max_drift(&self) -> Duration {
        self.max_drift
    }

    pub fn histogram(&self) -> [u64; 5] {
        self.drift_histogram
    }
}

/// `--check` mode: validate the loaded pattern list and print the
/// schedule a fresh stopwatch run would follow.
pub fn run_check(sequence: &PatternSequence, source: &str) -> Result<()> {
    println!("SeagullWatch pattern check");
    println!("Source: {source}");
    println!("Patterns: {}", sequence.len());
    println!("Repeat: {}", if sequence.repeat() { "on" } else { "off" });
    println!(
        "Total cycle: {} ({} ms)",
        format_hms(sequence.total_cycle_ms()),
        sequence.total_cycle_ms()
    );

    let state = compute_schedule(sequence, 0);
    match state.next_trigger {
        NextTrigger::At(ms) => println!("First trigger: {} ({} ms)", format_hms(ms), ms),
        NextTrigger::Unreachable => println!("First trigger: none (empty cycle)"),
    }

    let triggers = entry_trigger_times(sequence, 0);
    for (index, (entry, trigger)) in sequence.entries().iter().zip(triggers).enumerate() {
        let label = if entry.label.is_empty() {
            "(no message)"
        } else {
            entry.label.as_str()
        };
        println!(
            "  [{index}] {} {} -> {}",
            format_hms(entry.duration_ms),
            label,
            format_entry_trigger(trigger)
        );
    }
    Ok(())
}

/// `--bench` mode: run the tick loop dry for one second and report the
/// pacing drift the scheduler would live with.
pub fn run_bench(tick_ms: u64) -> Result<()> {
    let step = Duration::from_millis(tick_ms);
    println!("SeagullWatch tick pacing benchmark");
    println!("Tick period: {tick_ms} ms");

    let tolerance = step / 4;
    let mut stats = TickStats::new(512);
    let bench_start = Instant::now();
    let bench_end = bench_start + Duration::from_secs(1);
    let mut deadline = bench_start + step;
    while Instant::now() < bench_end {
        sleep_until(deadline);
        let drift = Instant::now().saturating_duration_since(deadline);
        stats.record_drift(drift, tolerance);
        deadline += step;
    }

    println!("Benchmark summary:");
    println!("  Ticks: {}", stats.total_ticks());
    println!("  Late ticks: {}", stats.late_ticks());
    println!(
        "  Mean drift: {:.3} ms",
        stats.mean_drift().as_secs_f64() * 1_000.0
    );
    println!(
        "  Max drift: {:.3} ms",
        stats.max_drift().as_secs_f64() * 1_000.0
    );
    println!("  Drift histogram buckets (<=0.1, <=1, <=5, <=20, >20 ms):");
    println!("  {:?}", stats.histogram());
    Ok(())
}

pub fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if now >= deadline {
        return;
    }

    let remaining = deadline.saturating_duration_since(now);
    if remaining > Duration::from_millis(2) {
        std::thread::sleep(remaining - Duration::from_millis(1));
    }
    while Instant::now() < deadline {
        std::thread::yield_now();
    }
}
