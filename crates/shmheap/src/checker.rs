//! Structural validation and reclamation of blocks whose owners are gone.

use crate::errors::Result;
use crate::header::{Anchor, Claim, HeaderState, Seed};
use crate::offset::Offset;
use crate::registry;
use crate::segment::Segment;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::Serialize;
use std::sync::atomic::Ordering;

/// Answers whether a process still exists.
pub trait ProcessProbe {
    fn is_alive(&self, pid: Pid) -> bool;
}

/// Probes with `kill(pid, 0)`. A process we may not signal still exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn is_alive(&self, pid: Pid) -> bool {
        if pid.as_raw() <= 0 {
            return false;
        }
        !matches!(kill(pid, None), Err(Errno::ESRCH))
    }
}

impl<F: Fn(Pid) -> bool> ProcessProbe for F {
    fn is_alive(&self, pid: Pid) -> bool {
        self(pid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Record every finding in the report and log it.
    pub verbose: bool,
    /// Reclaim orphaned and stale blocks, and release dead connections.
    pub cleanup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    OrphanedBlock {
        offset: Offset,
        pid: i32,
        seed: i32,
        type_tag: i32,
    },
    StaleSeedBlock {
        offset: Offset,
        pid: i32,
        seed: i32,
        type_tag: i32,
    },
    StaleConnection {
        seed: i32,
        pid: i32,
    },
    Corruption {
        cluster: Option<usize>,
        detail: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub headers: usize,
    pub allocated: usize,
    pub free: usize,
    pub orphaned: usize,
    pub stale_seeds: usize,
    pub stale_connections: usize,
    pub corruptions: usize,
    pub reclaimed: usize,
    pub released_connections: usize,
    /// Populated only for verbose checks.
    pub findings: Vec<Finding>,
}

impl CheckReport {
    pub fn anomalies(&self) -> usize {
        self.orphaned + self.stale_seeds + self.stale_connections + self.corruptions
    }

    pub fn is_consistent(&self) -> bool {
        self.corruptions == 0
    }
}

struct Walk<'a> {
    report: CheckReport,
    verbose: bool,
    damaged: &'a mut [bool],
}

impl Walk<'_> {
    fn corruption(&mut self, cluster: Option<usize>, detail: String) {
        tracing::error!(cluster, %detail, "Segment corruption");
        if let Some(c) = cluster {
            self.damaged[c] = true;
        }
        self.report.corruptions += 1;
        if self.verbose {
            self.report.findings.push(Finding::Corruption { cluster, detail });
        }
    }

    fn note(&mut self, finding: Finding) {
        if self.verbose {
            tracing::warn!(?finding, "Check finding");
            self.report.findings.push(finding);
        }
    }
}

impl Segment {
    /// Validate the segment and find blocks whose owning process is gone.
    ///
    /// `pid` is the checking process; its own claims are never orphaned.
    pub fn check(&self, pid: Pid, options: CheckOptions) -> Result<CheckReport> {
        self.check_with(&SystemProbe, pid, options)
    }

    pub fn check_with(
        &self,
        probe: &dyn ProcessProbe,
        pid: Pid,
        options: CheckOptions,
    ) -> Result<CheckReport> {
        let clusters = self.layout().clusters();
        let headers = self.headers();
        let control = self.control();
        let alive = |owner: Pid| owner == pid || probe.is_alive(owner);

        let mut damaged = vec![false; clusters.len()];
        let mut on_list = vec![false; headers.len()];
        let mut walk = Walk {
            report: CheckReport {
                headers: headers.len(),
                ..CheckReport::default()
            },
            verbose: options.verbose,
            damaged: &mut damaged,
        };

        let guard = self.lock()?;

        for (ci, info) in clusters.iter().enumerate() {
            let desc = self.desc(ci);
            let mut walked: u32 = 0;
            let mut cursor = Offset::from_link(desc.free_head.load(Ordering::Relaxed));

            while let Some(offset) = cursor {
                if walked >= info.blocks {
                    walk.corruption(Some(ci), format!("free list cycles at {offset}"));
                    break;
                }
                let Some(index) = info.header_index(offset) else {
                    walk.corruption(
                        Some(ci),
                        format!("free list link {offset} is not a block of this cluster"),
                    );
                    break;
                };
                if on_list[index] {
                    walk.corruption(Some(ci), format!("free list revisits {offset}"));
                    break;
                }
                on_list[index] = true;
                walked += 1;

                match headers[index].load() {
                    Ok(HeaderState::Free { next }) => cursor = next,
                    Ok(HeaderState::Allocated(_)) => {
                        walk.corruption(
                            Some(ci),
                            format!("free list reaches allocated block {offset}"),
                        );
                        break;
                    }
                    Err(e) => {
                        walk.corruption(Some(ci), e.to_string());
                        break;
                    }
                }
            }

            let recorded = desc.free_count.load(Ordering::Relaxed);
            if !walk.damaged[ci] && walked != recorded {
                walk.corruption(
                    Some(ci),
                    format!("free count is {recorded} but the list holds {walked}"),
                );
            }
        }

        for (ci, info) in clusters.iter().enumerate() {
            let first = info.first_header as usize;
            for index in first..first + info.blocks as usize {
                let offset = info.block_offset(index);
                let claim = match headers[index].load() {
                    Err(e) => {
                        walk.corruption(Some(ci), format!("header at {offset}: {e}"));
                        continue;
                    }
                    Ok(HeaderState::Free { .. }) => {
                        walk.report.free += 1;
                        if !on_list[index] && !walk.damaged[ci] {
                            walk.corruption(
                                Some(ci),
                                format!("free block {offset} is on no free list"),
                            );
                        }
                        continue;
                    }
                    Ok(HeaderState::Allocated(claim)) => claim,
                };
                walk.report.allocated += 1;

                if claim.size > info.block_size {
                    walk.corruption(
                        Some(ci),
                        format!(
                            "block {offset} claims {} bytes in a {}-byte block",
                            claim.size, info.block_size
                        ),
                    );
                    continue;
                }

                let Some(finding) = classify(&claim, offset, &alive, |seed| {
                    registry::find_slot(control, seed).is_some()
                }) else {
                    continue;
                };
                match finding {
                    Finding::OrphanedBlock { .. } => walk.report.orphaned += 1,
                    _ => walk.report.stale_seeds += 1,
                }
                walk.note(finding);

                if options.cleanup && !walk.damaged[ci] {
                    self.push_free(&guard, ci, index);
                    walk.report.reclaimed += 1;
                    tracing::info!(
                        offset = offset.get(),
                        owner = claim.pid.as_raw(),
                        seed = claim.seed.get(),
                        "Reclaimed block"
                    );
                }
            }
        }

        for slot in &control.connections {
            let seed = slot.seed.load(Ordering::Relaxed);
            if seed == 0 {
                continue;
            }
            let owner = slot.pid.load(Ordering::Relaxed);
            if alive(Pid::from_raw(owner)) {
                continue;
            }
            walk.report.stale_connections += 1;
            walk.note(Finding::StaleConnection { seed, pid: owner });
            if options.cleanup {
                registry::release(slot);
                walk.report.released_connections += 1;
            }
        }
        drop(guard);

        let report = walk.report;
        tracing::info!(
            checker = pid.as_raw(),
            allocated = report.allocated,
            orphaned = report.orphaned,
            stale_seeds = report.stale_seeds,
            stale_connections = report.stale_connections,
            corruptions = report.corruptions,
            reclaimed = report.reclaimed,
            "Segment check complete"
        );
        if !report.is_consistent() {
            tracing::error!(
                corruptions = report.corruptions,
                "Segment check found structural damage; affected clusters were not repaired"
            );
        }
        Ok(report)
    }
}

/// Why an allocated block no longer has a legitimate owner, if it doesn't.
fn classify(
    claim: &Claim,
    offset: Offset,
    alive: &impl Fn(Pid) -> bool,
    seed_live: impl Fn(Seed) -> bool,
) -> Option<Finding> {
    let (pid, seed, type_tag) = (claim.pid.as_raw(), claim.seed.get(), claim.type_tag);
    if !alive(claim.pid) {
        return Some(Finding::OrphanedBlock {
            offset,
            pid,
            seed,
            type_tag,
        });
    }
    if claim.anchor == Anchor::Seed && !seed_live(claim.seed) {
        return Some(Finding::StaleSeedBlock {
            offset,
            pid,
            seed,
            type_tag,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::tests::{small_layout, test_config};

    const DEAD: i32 = 999_999;

    fn probe(pid: Pid) -> bool {
        pid.as_raw() != DEAD
    }

    #[test]
    fn test_system_probe_sees_self_alive() {
        assert!(SystemProbe.is_alive(Pid::this()));
        assert!(!SystemProbe.is_alive(Pid::from_raw(0)));
    }

    #[test]
    fn test_clean_segment_reports_nothing() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();
        segment.alloc(Pid::this(), seed, 0, 10).unwrap();

        let report = segment
            .check_with(&probe, Pid::this(), CheckOptions::default())
            .unwrap();
        assert_eq!(report.headers, 6);
        assert_eq!(report.allocated, 1);
        assert_eq!(report.free, 5);
        assert_eq!(report.anomalies(), 0);
        assert!(report.is_consistent());

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_orphan_is_counted_then_reclaimed() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();
        let dead = Pid::from_raw(DEAD);

        let ptr = segment.alloc(dead, seed, 3, 10).unwrap();
        let offset = segment.offset_of(ptr.as_ptr()).unwrap();

        let dry = segment
            .check_with(&probe, Pid::this(), CheckOptions::default())
            .unwrap();
        assert_eq!(dry.orphaned, 1);
        assert_eq!(dry.reclaimed, 0);
        assert!(dry.findings.is_empty(), "non-verbose check only counts");
        assert_eq!(segment.stats().unwrap().clusters[0].free, 3);

        let fixed = segment
            .check_with(
                &probe,
                Pid::this(),
                CheckOptions {
                    verbose: true,
                    cleanup: true,
                },
            )
            .unwrap();
        assert_eq!(fixed.reclaimed, 1);
        assert_eq!(
            fixed.findings,
            vec![Finding::OrphanedBlock {
                offset,
                pid: DEAD,
                seed: seed.get(),
                type_tag: 3
            }]
        );
        assert_eq!(segment.stats().unwrap().clusters[0].free, 4);

        let reused = segment.alloc(Pid::this(), seed, 0, 10).unwrap();
        assert_eq!(reused, ptr, "reclaimed block is at the top of the free list");

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_checker_never_orphans_its_own_blocks() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();
        let everyone_dead = |_: Pid| false;

        segment.alloc(Pid::this(), seed, 0, 10).unwrap();
        let report = segment
            .check_with(&everyone_dead, Pid::this(), CheckOptions::default())
            .unwrap();
        assert_eq!(report.orphaned, 0);

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_seed_blocks_go_stale_after_disconnect() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();

        segment.alloc_seed(Pid::this(), seed, 1, 10).unwrap();
        segment.alloc(Pid::this(), seed, 1, 10).unwrap();
        segment.disconnect(seed).unwrap();

        let options = CheckOptions {
            verbose: false,
            cleanup: true,
        };
        let report = segment.check_with(&probe, Pid::this(), options).unwrap();
        assert_eq!(report.stale_seeds, 1, "only the seed-anchored block is stale");
        assert_eq!(report.reclaimed, 1);
        assert_eq!(report.allocated, 2);

        let again = segment.check_with(&probe, Pid::this(), options).unwrap();
        assert_eq!(again.allocated, 1, "pool block survives its seed");
        assert_eq!(again.anomalies(), 0);

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_dead_connection_is_released() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let ghost = segment.connect_as(Pid::from_raw(DEAD)).unwrap();
        segment.connect().unwrap();

        let report = segment
            .check_with(
                &probe,
                Pid::this(),
                CheckOptions {
                    verbose: false,
                    cleanup: true,
                },
            )
            .unwrap();
        assert_eq!(report.stale_connections, 1);
        assert_eq!(report.released_connections, 1);
        assert!(!segment.is_connected(ghost).unwrap());
        assert_eq!(segment.stats().unwrap().connections, 1);

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_free_list_cycle_is_reported_not_repaired() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();
        segment.alloc(Pid::from_raw(DEAD), seed, 0, 10).unwrap();

        // Remaining 64-byte list is 64 -> 128 -> 192; point 192 back at 64.
        segment.headers()[3].poke_next(64);

        let report = segment
            .check_with(
                &probe,
                Pid::this(),
                CheckOptions {
                    verbose: true,
                    cleanup: true,
                },
            )
            .unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.orphaned, 1);
        assert_eq!(report.reclaimed, 0, "damaged cluster must not be modified");
        assert!(report.findings.iter().any(|f| matches!(
            f,
            Finding::Corruption {
                cluster: Some(0),
                ..
            }
        )));

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_leaked_free_header_is_reported() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();

        // Cut the 256-byte list after its first block.
        segment.headers()[4].poke_next(Offset::NIL);
        segment.desc(1).free_count.store(1, Ordering::Relaxed);

        let report = segment
            .check_with(&probe, Pid::this(), CheckOptions::default())
            .unwrap();
        assert_eq!(report.corruptions, 1);

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_report_serializes_findings_with_kind_tag() {
        let finding = Finding::StaleConnection { seed: 4, pid: 10 };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "stale_connection");
        assert_eq!(json["seed"], 4);
    }
}
