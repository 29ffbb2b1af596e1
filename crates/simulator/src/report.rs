//! Text and JSON rendering of a [`SimulationReport`].

use std::fmt;

use sim_core::SimulationReport;

/// Human readable report, showing at most `events` trailing log entries.
pub(crate) struct TextReport<'a> {
    report: &'a SimulationReport,
    events: usize,
}

impl<'a> TextReport<'a> {
    pub(crate) fn new(report: &'a SimulationReport, events: usize) -> Self {
        Self { report, events }
    }

    fn gantt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Gantt ==")?;
        if self.report.gantt.is_empty() {
            return writeln!(f, "(no execution)");
        }
        for interval in &self.report.gantt {
            writeln!(
                f,
                "T{:>3}-{:>3} | P{:<3} | {}",
                interval.start,
                interval.end,
                interval.pid,
                "#".repeat(interval.duration() as usize)
            )?;
        }
        Ok(())
    }

    fn processes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Processes ==")?;
        writeln!(
            f,
            "{:>4} {:<10} {:>4} {:>6} {:>5} {:>7} {:>6} {:>6} {:>5}  resources",
            "pid", "state", "prio", "burst", "left", "arrive", "wait", "turn", "pages"
        )?;
        for process in &self.report.processes {
            let turnaround = process
                .turnaround_time()
                .map_or_else(|| "-".to_string(), |t| t.to_string());
            let resources = if process.required_resources().is_empty() {
                "-".to_string()
            } else {
                format!(
                    "{}/{} {}",
                    process.used_resources().len(),
                    process.required_resources().len(),
                    process.required_resources().join(",")
                )
            };
            writeln!(
                f,
                "{:>4} {:<10} {:>4} {:>6} {:>5} {:>7} {:>6} {:>6} {:>5}  {}",
                process.id(),
                process.state().to_string(),
                process.priority(),
                process.total_burst(),
                process.remaining_burst(),
                process.arrival_time(),
                process.waiting_time(),
                turnaround,
                process.memory_pages_required(),
                resources
            )?;
        }
        Ok(())
    }

    fn memory(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.report.memory;
        writeln!(
            f,
            "== Memory ({}, {}/{} frames) ==",
            stats.policy, stats.occupied_frames, stats.total_frames
        )?;
        for slot in &self.report.frames {
            match (slot.page, slot.owner) {
                (Some(page), Some(owner)) => {
                    writeln!(f, "frame {:>2}: page {page} (P{owner})", slot.frame)?
                }
                (Some(page), None) => writeln!(f, "frame {:>2}: page {page}", slot.frame)?,
                _ => writeln!(f, "frame {:>2}: free", slot.frame)?,
            }
        }
        writeln!(
            f,
            "page faults: {}, replacements: {}",
            stats.page_faults, stats.replacements
        )
    }

    fn resources(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Resources ==")?;
        for resource in &self.report.resources {
            let owner = resource
                .owner()
                .map_or_else(|| "free".to_string(), |pid| format!("P{pid}"));
            let queue = resource
                .wait_queue()
                .iter()
                .map(|pid| format!("P{pid}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(
                f,
                "{:<12} {:<5} uses {:>3} conflicts {:>3} queue [{}]",
                resource.name(),
                owner,
                resource.use_count(),
                resource.conflict_count(),
                queue
            )?;
        }
        Ok(())
    }

    fn metrics(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = &self.report.metrics;
        let mean = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        writeln!(f, "== Metrics (tick {}) ==", self.report.tick)?;
        writeln!(
            f,
            "completed: {}/{}",
            metrics.completed,
            self.report.processes.len()
        )?;
        writeln!(f, "context switches: {}", metrics.context_switches)?;
        writeln!(f, "avg waiting: {}", mean(metrics.avg_waiting))?;
        writeln!(f, "avg turnaround: {}", mean(metrics.avg_turnaround))?;
        writeln!(
            f,
            "cpu: {} busy, {} idle, {:.1}% utilization",
            metrics.busy_ticks,
            metrics.idle_ticks,
            metrics.utilization * 100.0
        )?;
        writeln!(
            f,
            "resource conflicts: {}, grants: {}",
            self.report.files.conflicts_total, self.report.files.successful_grants
        )
    }

    fn events(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events = &self.report.events;
        let start = events.len().saturating_sub(self.events);
        writeln!(f, "== Events (last {} of {}) ==", events.len() - start, events.len())?;
        for event in &events[start..] {
            writeln!(f, "{event}")?;
        }
        Ok(())
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.gantt(f)?;
        writeln!(f)?;
        self.processes(f)?;
        writeln!(f)?;
        self.memory(f)?;
        writeln!(f)?;
        self.resources(f)?;
        writeln!(f)?;
        self.metrics(f)?;
        if self.events > 0 {
            writeln!(f)?;
            self.events(f)?;
        }
        Ok(())
    }
}

pub(crate) fn render_json(report: &SimulationReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use sim_core::ProcessSpec;
    use sim_core::Scheduler;
    use sim_core::SimConfig;
    use test_log::test;

    use super::*;

    fn finished_report() -> SimulationReport {
        let mut scheduler = Scheduler::new(SimConfig::new().with_quantum(3).with_seed(2)).unwrap();
        scheduler.admit(ProcessSpec::new(1, 5)).unwrap();
        scheduler
            .admit(ProcessSpec::new(2, 2).with_resources(["log.txt"]))
            .unwrap();
        while scheduler.has_active_processes() {
            scheduler.tick();
        }
        scheduler.report()
    }

    #[test]
    fn text_report_shows_gantt_and_metrics() {
        let text = TextReport::new(&finished_report(), 5).to_string();

        let gantt: Vec<&str> = text
            .lines()
            .skip_while(|line| *line != "== Gantt ==")
            .skip(1)
            .take(3)
            .collect();
        assert_eq!(
            gantt,
            vec![
                "T  1-  3 | P1   | ###",
                "T  4-  5 | P2   | ##",
                "T  6-  7 | P1   | ##",
            ]
        );
        assert!(text.contains("completed: 2/2"));
        assert!(text.contains("context switches: 2"));
        assert!(text.contains("log.txt      free  uses   1 conflicts   0 queue []"));
        assert!(text.contains("== Events (last 5 of "));
    }

    #[test]
    fn events_section_can_be_disabled() {
        let text = TextReport::new(&finished_report(), 0).to_string();
        assert!(!text.contains("== Events"));
    }

    #[test]
    fn json_report_is_parseable() {
        let json = render_json(&finished_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metrics"]["completed"], serde_json::json!(2));
        assert_eq!(value["processes"].as_array().unwrap().len(), 2);
        assert_eq!(value["config"]["scheduling"], serde_json::json!("round-robin"));
    }
}
