//! Phased systems: a query bound to a callback, run by `World::progress`.

use std::time::Duration;

use crate::query::{Iter, QueryId};

/// Callback invoked once per matching archetype with a columnar view.
pub type SystemFn = Box<dyn FnMut(&mut Iter<'_>)>;

/// Execution buckets for systems. Each tick runs every phase in the order
/// listed here; systems within a phase run in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Physics,
    PreUpdate,
    Update,
    PostUpdate,
    Transform,
    PreRender,
    Render,
    PostRender,
}

impl Phase {
    pub const COUNT: usize = 8;

    /// All phases in execution order.
    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::Physics,
        Phase::PreUpdate,
        Phase::Update,
        Phase::PostUpdate,
        Phase::Transform,
        Phase::PreRender,
        Phase::Render,
        Phase::PostRender,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// System ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId {
    pub(crate) phase: Phase,
    pub(crate) index: u32,
}

impl SystemId {
    pub fn phase(self) -> Phase {
        self.phase
    }
}

/// Cumulative execution timing for one system.
///
/// Tracked in debug builds only; release builds compile the bookkeeping out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemStats {
    /// Total time spent inside the system's callback across all ticks.
    pub runtime: Duration,
    /// Number of times the system has run.
    pub calls: u64,
}

impl SystemStats {
    /// Mean runtime per call.
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.runtime / self.calls as u32
        }
    }
}

/// A registered system: the query it iterates, the callback it invokes, and
/// debug bookkeeping. The phase is implied by the bucket the system lives in.
pub struct System {
    pub(crate) query: QueryId,
    pub(crate) callback: SystemFn,
    pub(crate) name: String,
    #[cfg(debug_assertions)]
    pub(crate) stats: SystemStats,
}

impl System {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> QueryId {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_is_fixed() {
        let indices: Vec<usize> = Phase::ALL.iter().map(|p| p.index()).collect();
        assert_eq!(indices, (0..Phase::COUNT).collect::<Vec<_>>());
        assert_eq!(Phase::ALL[0], Phase::Physics);
        assert_eq!(Phase::ALL[Phase::COUNT - 1], Phase::PostRender);
    }

    #[test]
    fn test_stats_average() {
        let stats = SystemStats {
            runtime: Duration::from_millis(30),
            calls: 3,
        };
        assert_eq!(stats.average(), Duration::from_millis(10));
        assert_eq!(SystemStats::default().average(), Duration::ZERO);
    }
}
