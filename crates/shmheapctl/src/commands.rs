use crate::config::CtlConfig;
use anyhow::{Context, Result, bail};
use serde_json::json;
use shmheap::{
    CheckOptions, LiveBlock, Offset, Pid, Scope, Seed, Segment, SegmentStats, TypeTag,
};
use std::ops::ControlFlow;

pub fn attach(config: &CtlConfig) -> Result<Segment> {
    let segment_config = config.segment();
    let segment = match config.wait_timeout() {
        Some(timeout) => common::wait_for_resource(
            || Segment::attach(&segment_config),
            config.poll_interval(),
            Some(timeout),
            "shared heap",
        )?,
        None => Segment::attach(&segment_config).with_context(|| {
            format!("no segment at {}", segment_config.ctl_path.display())
        })?,
    };
    Ok(segment)
}

pub fn init(config: &CtlConfig, cluster_size: Option<u32>) -> Result<()> {
    let segment_config = config.segment();
    let cluster_size = cluster_size.unwrap_or(segment_config.cluster_size);
    let segment = Segment::initialise(&segment_config, cluster_size)
        .context("failed to initialise segment")?;
    print_stats(&segment.stats()?, false)
}

pub fn destroy(config: &CtlConfig, force: bool) -> Result<()> {
    let segment = attach(config)?;
    let connections = segment.connections()?;
    if !connections.is_empty() {
        if !force {
            bail!(
                "{} connections are still registered; pass --force to destroy anyway",
                connections.len()
            );
        }
        tracing::warn!(
            connections = connections.len(),
            "Destroying a segment with live connections"
        );
    }
    segment.destroy(true)?;
    Ok(())
}

pub fn stats(config: &CtlConfig, as_json: bool) -> Result<()> {
    let segment = attach(config)?;
    print_stats(&segment.stats()?, as_json)
}

/// Returns whether the segment is consistent.
pub fn check(config: &CtlConfig, options: CheckOptions, as_json: bool) -> Result<bool> {
    let segment = attach(config)?;
    let report = segment.check(Pid::this(), options)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "headers={} allocated={} free={} orphaned={} stale_seeds={} stale_connections={} corruptions={}",
            report.headers,
            report.allocated,
            report.free,
            report.orphaned,
            report.stale_seeds,
            report.stale_connections,
            report.corruptions,
        );
        if options.cleanup {
            println!(
                "reclaimed={} released_connections={}",
                report.reclaimed, report.released_connections
            );
        }
        for finding in &report.findings {
            println!("{}", serde_json::to_string(finding)?);
        }
    }
    Ok(report.is_consistent())
}

pub struct ScanFilter {
    pub pid: Option<i32>,
    pub seed: Option<i32>,
    pub type_tag: Option<TypeTag>,
    pub limit: Option<usize>,
}

impl ScanFilter {
    fn scope(&self) -> Result<Scope> {
        Ok(match (self.pid, self.seed) {
            (Some(_), Some(_)) => bail!("--pid and --seed are mutually exclusive"),
            (Some(pid), None) => Scope::Process(Pid::from_raw(pid)),
            (None, Some(seed)) => Scope::Seed(Seed::try_from(seed)?),
            (None, None) => Scope::All,
        })
    }
}

pub fn scan(config: &CtlConfig, filter: ScanFilter) -> Result<()> {
    let segment = attach(config)?;
    let scope = filter.scope()?;
    let limit = filter.limit.unwrap_or(usize::MAX);

    let mut printed = 0;
    let mut failure = None;
    segment.scan(scope, |block| {
        if filter.type_tag.is_some_and(|t| t != block.type_tag) {
            return ControlFlow::Continue(());
        }
        if let Err(e) = serde_json::to_string(&describe(block)).map(|line| println!("{line}")) {
            failure = Some(e);
            return ControlFlow::Break(());
        }
        printed += 1;
        if printed >= limit {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    if let Some(e) = failure {
        return Err(e.into());
    }

    tracing::debug!(printed, "Scan finished");
    Ok(())
}

pub fn records(config: &CtlConfig, offset: i32) -> Result<()> {
    let segment = attach(config)?;
    let records = segment.load_records(Offset::new(offset))?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

pub fn connect(config: &CtlConfig, pid: Option<i32>) -> Result<()> {
    let segment = attach(config)?;
    let pid = pid.map(Pid::from_raw).unwrap_or_else(Pid::this);
    let seed = segment.connect_as(pid)?;
    println!("{seed}");
    Ok(())
}

pub fn disconnect(config: &CtlConfig, seed: i32) -> Result<()> {
    let segment = attach(config)?;
    segment.disconnect(Seed::try_from(seed)?)?;
    Ok(())
}

pub fn connections(config: &CtlConfig) -> Result<()> {
    let segment = attach(config)?;
    for connection in segment.connections()? {
        println!("{}", serde_json::to_string(&connection)?);
    }
    Ok(())
}

fn describe(block: &LiveBlock) -> serde_json::Value {
    json!({
        "offset": block.offset,
        "pid": block.pid.as_raw(),
        "seed": block.seed,
        "type_tag": block.type_tag,
        "size": block.size,
        "anchor": block.anchor,
    })
}

fn print_stats(stats: &SegmentStats, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }
    println!("{:>10} {:>8} {:>8}", "block", "blocks", "free");
    for cluster in &stats.clusters {
        println!(
            "{:>10} {:>8} {:>8}",
            cluster.block_size, cluster.blocks, cluster.free
        );
    }
    println!(
        "free_blocks={} connections={}",
        stats.free_blocks(),
        stats.connections
    );
    Ok(())
}
