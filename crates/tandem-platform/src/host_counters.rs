//! Host hardware performance counters.
//!
//! On Linux, uses the `perf_event` crate. Elsewhere the group is never
//! available and reports come back without host counters.

/// Host CPU counters sampled over the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfCounters {
    /// Host CPU cycles.
    pub cycles: Option<u64>,
    /// Host instructions executed.
    pub instructions: Option<u64>,
    /// Branch instructions.
    pub branches: Option<u64>,
    /// Branch misses.
    pub branch_misses: Option<u64>,
}

impl PerfCounters {
    /// Instructions per cycle.
    pub fn ipc(&self) -> Option<f64> {
        match (self.instructions, self.cycles) {
            (Some(i), Some(c)) if c > 0 => Some(i as f64 / c as f64),
            _ => None,
        }
    }

    /// Branch miss rate as percentage.
    pub fn branch_miss_rate(&self) -> Option<f64> {
        match (self.branch_misses, self.branches) {
            (Some(m), Some(b)) if b > 0 => Some((m as f64 / b as f64) * 100.0),
            _ => None,
        }
    }
}

#[cfg(target_os = "linux")]
mod inner {
    use super::PerfCounters;
    use perf_event::events::Hardware;
    use perf_event::{Builder, Counter, Group};

    /// Perf counter group measuring the harness thread.
    pub struct PerfGroup {
        group: Group,
        cycles: Counter,
        instructions: Counter,
        branches: Counter,
        branch_misses: Counter,
    }

    impl PerfGroup {
        pub fn new() -> Option<Self> {
            let mut group = Group::new().ok()?;
            let mut counter = |kind| Builder::new().group(&mut group).kind(kind).build().ok();

            let cycles = counter(Hardware::CPU_CYCLES)?;
            let instructions = counter(Hardware::INSTRUCTIONS)?;
            let branches = counter(Hardware::BRANCH_INSTRUCTIONS)?;
            let branch_misses = counter(Hardware::BRANCH_MISSES)?;

            Some(Self {
                group,
                cycles,
                instructions,
                branches,
                branch_misses,
            })
        }

        pub fn enable(&mut self) -> std::io::Result<()> {
            self.group.enable()
        }

        pub fn disable(&mut self) -> std::io::Result<()> {
            self.group.disable()
        }

        pub fn read(&mut self) -> Option<PerfCounters> {
            let counts = self.group.read().ok()?;
            Some(PerfCounters {
                cycles: counts.get(&self.cycles).copied(),
                instructions: counts.get(&self.instructions).copied(),
                branches: counts.get(&self.branches).copied(),
                branch_misses: counts.get(&self.branch_misses).copied(),
            })
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod inner {
    use super::PerfCounters;

    /// Stub perf counter group (no-op on non-Linux).
    pub struct PerfGroup;

    impl PerfGroup {
        pub fn new() -> Option<Self> {
            None
        }

        pub fn enable(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        pub fn disable(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        pub fn read(&mut self) -> Option<PerfCounters> {
            None
        }
    }
}

pub use inner::PerfGroup;
