#![allow(unused)]
use std::cell::RefCell;
use std::time::Duration;

#[cfg(feature = "timing")]
use std::time::Instant;

/// Wall-clock accounting for the two expensive phases of a time step.
/// Gathering is active only with the `timing` cargo feature; the record
/// wrappers are otherwise transparent.
#[derive(Default, Clone)]
pub struct TimingStats {
    pub assembly_times: Vec<Duration>,
    pub solve_times: Vec<Duration>,
    pub total_time: Duration,
}

impl TimingStats {
    #[cfg(feature = "timing")]
    pub fn print_summary(&self) {
        if self.solve_times.is_empty() {
            return;
        }
        let total_assembly: Duration = self.assembly_times.iter().sum();
        let total_solve: Duration = self.solve_times.iter().sum();

        println!("\n{}", "=".repeat(60));
        println!("{:^60}", "STEP TIMING SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Total:                 {:.3}s",
            self.total_time.as_secs_f64()
        );
        println!(
            "  System assembly:     {:>9.3}ms  (avg: {:>9.3}ms over {})",
            total_assembly.as_secs_f64() * 1000.0,
            total_assembly.as_secs_f64() * 1000.0 / self.assembly_times.len().max(1) as f64,
            self.assembly_times.len()
        );
        println!(
            "  Linear solves:       {:>9.3}ms  (avg: {:>9.3}ms over {})",
            total_solve.as_secs_f64() * 1000.0,
            total_solve.as_secs_f64() * 1000.0 / self.solve_times.len().max(1) as f64,
            self.solve_times.len()
        );
        println!("{}", "=".repeat(60));
    }

    #[cfg(not(feature = "timing"))]
    pub fn print_summary(&self) {}
}

thread_local! {
    static STATS: RefCell<TimingStats> = RefCell::new(TimingStats::default());
}

pub fn reset_timing() {
    STATS.with(|s| *s.borrow_mut() = TimingStats::default());
}

pub fn record_assembly<T>(f: impl FnOnce() -> T) -> T {
    #[cfg(feature = "timing")]
    {
        let start = Instant::now();
        let out = f();
        STATS.with(|s| s.borrow_mut().assembly_times.push(start.elapsed()));
        return out;
    }
    #[cfg(not(feature = "timing"))]
    f()
}

pub fn record_solve<T>(f: impl FnOnce() -> T) -> T {
    #[cfg(feature = "timing")]
    {
        let start = Instant::now();
        let out = f();
        STATS.with(|s| s.borrow_mut().solve_times.push(start.elapsed()));
        return out;
    }
    #[cfg(not(feature = "timing"))]
    f()
}

pub fn finalize_and_print(total: Duration) {
    STATS.with(|s| {
        let mut stats = s.borrow_mut();
        stats.total_time = total;
        stats.print_summary();
    });
}
