use crate::{install_interrupt_flag, ListenArgs};
use anyhow::{Context, Result};
use armsim_core::communication::{SceneEvent, VizReceiver, VizScene};
use armsim_core::Point;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL: Duration = Duration::from_millis(250);
const SUMMARY_EVERY: u64 = 50;

pub fn execute(args: ListenArgs) -> Result<()> {
    let receiver = VizReceiver::bind((args.host.as_str(), args.port))
        .with_context(|| format!("cannot bind {}:{}", args.host, args.port))?;
    info!(addr = %receiver.local_addr()?, "listening for visualization frames");

    let running = install_interrupt_flag();
    let mut scene = VizScene::new();
    let mut frames = 0u64;

    while running.load(Ordering::SeqCst) {
        let message = match receiver.recv_timeout(POLL) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                warn!("discarding datagram: {}", e);
                continue;
            }
        };

        match scene.apply(message) {
            SceneEvent::Initialized { env_count } => {
                frames = 0;
                info!(
                    envs = env_count,
                    objectives = scene.objective_capacity(),
                    "scene initialized"
                );
            }
            SceneEvent::Updated { env_index } => {
                frames += 1;
                if let Some(env) = scene.env(env_index) {
                    debug!(
                        env = env_index,
                        objectives = env.objectives.len(),
                        trajectory = env.trajectory.len(),
                        "frame"
                    );
                }
                if frames % SUMMARY_EVERY == 0 {
                    for (index, env) in scene.envs().iter().enumerate() {
                        let ee = env.joints.last().copied().unwrap_or_else(Point::origin);
                        info!(
                            env = index,
                            frames = env.frames,
                            objectives = env.objectives.len(),
                            trajectory = env.trajectory.len(),
                            ee = %format!("({:.2}, {:.2}, {:.2})", ee.x, ee.y, ee.z),
                            "scene"
                        );
                    }
                }
            }
            SceneEvent::Dropped { env_index } => {
                debug!(env = env_index, "frame dropped");
            }
            SceneEvent::Shutdown => {
                info!(frames, "shutdown received");
                break;
            }
        }
    }
    Ok(())
}
