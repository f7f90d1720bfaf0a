use crate::{install_interrupt_flag, RolloutArgs};
use anyhow::{Context, Result};
use armsim_core::communication::VizPublisher;
use armsim_core::MultiEnv;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

pub fn execute(args: RolloutArgs) -> Result<()> {
    let mut config = args.config.load()?;
    if let Some(max_steps) = args.max_steps {
        config.env.max_steps = max_steps;
    }
    if let Some(count) = args.objectives {
        config = config.with_objective_range(count, count);
    }
    config.validate()?;

    let mut envs = MultiEnv::new(config, args.envs)?;
    if let Some(addr) = &args.viz {
        let publisher = VizPublisher::new(addr.as_str())
            .with_context(|| format!("cannot reach visualizer at {}", addr))?;
        envs.attach_visualizer(publisher)?;
    }

    let running = install_interrupt_flag();
    let pause = Duration::from_millis(args.render_interval_ms);

    'epochs: for epoch in 0..args.epochs {
        let started = Instant::now();
        envs.reset_all()?;
        envs.render()?;

        let mut finished = vec![false; envs.len()];
        let mut steps = 0usize;
        while !finished.iter().all(|f| *f) {
            if !running.load(Ordering::SeqCst) {
                break 'epochs;
            }
            let actions = envs.action_sample();
            let results = envs.step(&actions)?;
            for (done, result) in finished.iter_mut().zip(&results) {
                *done |= result.done;
            }
            steps += 1;

            envs.render()?;
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        let rewards: Vec<String> = envs
            .total_rewards()
            .iter()
            .map(|r| format!("{:.1}", r))
            .collect();
        info!(
            epoch = epoch + 1,
            steps,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "total rewards [{}]",
            rewards.join(", ")
        );
    }

    envs.close();
    Ok(())
}
