use crate::{install_interrupt_flag, RunArgs};
use anyhow::{Context, Result};
use armsim_core::communication::{Frame, VizPublisher};
use armsim_core::SimulationEngine;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const STATUS_PERIOD: Duration = Duration::from_secs(1);

pub fn execute(args: RunArgs) -> Result<()> {
    let config = args.config.load()?;
    let max_points = config.viz.max_trajectory_points;
    let objective_capacity = config.objectives.count_max + 1;
    let frame_period = config.timing.refresh_interval();

    let publisher = match &args.viz {
        Some(addr) => {
            let publisher = VizPublisher::new(addr.as_str())
                .with_context(|| format!("cannot reach visualizer at {}", addr))?;
            publisher.send_init(1, objective_capacity)?;
            Some(publisher)
        }
        None => None,
    };

    let mut engine = SimulationEngine::new(config)?;
    let running = install_interrupt_flag();
    engine.start()?;

    if let Some(target) = args.target {
        engine.move_to(target, args.steps)?;
    }

    // Durations past the clock's range mean "until Ctrl+C"
    let deadline = args
        .duration
        .and_then(|duration| Instant::now().checked_add(duration));
    let mut cursor = None;
    let mut last_status = Instant::now();

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(frame_period);
        let snapshot = engine.snapshot();

        if let Some(publisher) = &publisher {
            let frame = Frame::from_snapshot(0, &snapshot, cursor, max_points);
            if let Err(e) = publisher.publish_frame(frame) {
                warn!("frame dropped: {}", e);
            }
            cursor = Some(snapshot.trajectory.total_appended());
        }

        if last_status.elapsed() >= STATUS_PERIOD {
            last_status = Instant::now();
            let ee = snapshot.end_effector();
            let nearest = snapshot.distances.nearest().map(|(_, d)| d);
            info!(
                tick = snapshot.tick,
                motion = %snapshot.motion,
                angles = %snapshot.joint_angles,
                ee = %format!("({:.2}, {:.2}, {:.2})", ee.x, ee.y, ee.z),
                objectives = snapshot.objectives.len(),
                reached = snapshot.objectives_reached,
                nearest = ?nearest,
                "status"
            );
        }
    }

    engine.stop();
    if let Some(publisher) = &publisher {
        publisher.send_shutdown(1)?;
    }

    for report in engine.task_reports() {
        info!(
            task = report.name,
            ticks = report.metrics.total_ticks,
            failed = report.metrics.failed_ticks,
            avg_us = %format!("{:.1}", report.metrics.avg_tick_duration_us),
            state = %report.state,
            "task summary"
        );
    }
    Ok(())
}
