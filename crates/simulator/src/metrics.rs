use sim_core::Scheduler;
use sim_core::SchedulingPolicy;

#[derive(Debug, Default, Clone, PartialEq)]
struct AccumulatedTickMetrics {
    ready: u64,
    blocked: u64,
    occupied_frames: u64,
    locked_resources: u64,
    busy: u64,
    count: u64,
}

/// Per-batch averages of the tick samples.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TickAverages {
    ready: f64,
    blocked: f64,
    occupied_frames: f64,
    locked_resources: f64,
    utilization: f64,
}

impl AccumulatedTickMetrics {
    fn averages(&self) -> Option<TickAverages> {
        if self.count == 0 {
            return None;
        }
        let count = self.count as f64;
        Some(TickAverages {
            ready: self.ready as f64 / count,
            blocked: self.blocked as f64 / count,
            occupied_frames: self.occupied_frames as f64 / count,
            locked_resources: self.locked_resources as f64 / count,
            utilization: self.busy as f64 / count,
        })
    }
}

/// Samples the scheduler after every tick and emits averaged `metrics.*` events every
/// `batch_size` samples.
pub(crate) struct MetricsRecorder {
    batch_size: usize,
    policy: SchedulingPolicy,
    acc: AccumulatedTickMetrics,
}

impl MetricsRecorder {
    pub(crate) fn new(batch_size: usize, policy: SchedulingPolicy) -> Self {
        Self {
            batch_size: batch_size.max(1),
            policy,
            acc: AccumulatedTickMetrics::default(),
        }
    }

    pub(crate) fn observe(&mut self, scheduler: &Scheduler, executed: bool) {
        let acc = &mut self.acc;
        acc.ready += scheduler.ready().len() as u64;
        acc.blocked += scheduler.blocked().len() as u64;
        acc.occupied_frames += scheduler.memory().occupied_frames() as u64;
        acc.locked_resources += scheduler.files().stats().locked as u64;
        acc.busy += u64::from(executed);
        acc.count += 1;

        if acc.count >= self.batch_size as u64 {
            self.flush(scheduler.current_tick());
        }
    }

    /// Emits whatever has been accumulated and resets the batch.
    pub(crate) fn flush(&mut self, tick: u64) {
        if let Some(avg) = self.acc.averages() {
            tracing::info!(
                target: "metrics.sim_tick_avg",
                tag_policy = %self.policy,
                tick = tick,
                ready = avg.ready,
                blocked = avg.blocked,
                occupied_frames = avg.occupied_frames,
                locked_resources = avg.locked_resources,
                utilization = avg.utilization
            );
        }
        self.acc = AccumulatedTickMetrics::default();
    }

    /// Emits the end-of-run totals.
    pub(crate) fn summary(&mut self, scheduler: &Scheduler) {
        self.flush(scheduler.current_tick());

        let metrics = scheduler.metrics();
        let memory = scheduler.memory().stats();
        let files = scheduler.files().stats();
        tracing::info!(
            target: "metrics.sim_summary",
            tag_policy = %self.policy,
            tag_replacement = %memory.policy,
            ticks = metrics.ticks,
            completed = metrics.completed as u64,
            context_switches = metrics.context_switches,
            avg_waiting = metrics.avg_waiting.unwrap_or_default(),
            avg_turnaround = metrics.avg_turnaround.unwrap_or_default(),
            utilization = metrics.utilization,
            page_faults = memory.page_faults,
            replacements = memory.replacements,
            conflicts = files.conflicts_total,
            grants = files.successful_grants
        );
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use sim_core::ProcessSpec;
    use sim_core::SimConfig;
    use test_log::test;

    use super::*;

    #[test]
    fn empty_batch_has_no_averages() {
        assert_eq!(AccumulatedTickMetrics::default().averages(), None);
    }

    #[test]
    fn averages_divide_by_sample_count() {
        let acc = AccumulatedTickMetrics {
            ready: 6,
            blocked: 1,
            occupied_frames: 8,
            locked_resources: 2,
            busy: 3,
            count: 4,
        };
        assert_eq!(
            acc.averages(),
            Some(TickAverages {
                ready: 1.5,
                blocked: 0.25,
                occupied_frames: 2.0,
                locked_resources: 0.5,
                utilization: 0.75,
            })
        );
    }

    #[test]
    fn batch_resets_after_flush() {
        let mut scheduler = Scheduler::new(SimConfig::new().with_seed(1)).unwrap();
        scheduler.admit(ProcessSpec::new(1, 4)).unwrap();
        let mut recorder = MetricsRecorder::new(3, SchedulingPolicy::RoundRobin);

        for _ in 0..2 {
            let executed = scheduler.tick();
            recorder.observe(&scheduler, executed);
        }
        assert_eq!(recorder.acc.count, 2);
        assert_eq!(recorder.acc.busy, 2);
        assert_eq!(recorder.acc.occupied_frames, 2);

        let executed = scheduler.tick();
        recorder.observe(&scheduler, executed);
        assert_eq!(recorder.acc, AccumulatedTickMetrics::default());
    }
}
