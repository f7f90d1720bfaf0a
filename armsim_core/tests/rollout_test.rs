// Random-action rollouts across several environments, streamed over loopback
use armsim_core::communication::{SceneEvent, VizPublisher, VizReceiver, VizScene};
use armsim_core::{Environment, MultiEnv, SimConfig};
use std::time::Duration;

#[test]
fn test_multi_env_rollout_epochs() {
    let config = SimConfig::default().with_seed(42).with_objective_range(8, 8);
    let mut envs = MultiEnv::new(config, 3).unwrap();

    for _epoch in 0..2 {
        envs.reset_all().unwrap();
        for env in envs.envs() {
            // 8 sampled plus the sentinel
            assert_eq!(env.snapshot().objectives.len(), 9);
        }

        let mut finished = vec![false; envs.len()];
        let mut steps = 0;
        while !finished.iter().all(|f| *f) {
            let actions = envs.action_sample();
            let results = envs.step(&actions).unwrap();
            for (done, result) in finished.iter_mut().zip(&results) {
                *done |= result.done;
            }
            steps += 1;
            assert!(steps <= 100);
        }

        for (env, total) in envs.envs().iter().zip(envs.total_rewards()) {
            assert_eq!(env.episode_info().total_reward, total);
            assert!(total.is_finite());
        }
    }
}

#[test]
fn test_seeded_rollouts_repeat() {
    let run = || {
        let mut envs = MultiEnv::new(SimConfig::default().with_seed(9), 2).unwrap();
        envs.reset_all().unwrap();
        for _ in 0..20 {
            let actions = envs.action_sample();
            envs.step(&actions).unwrap();
        }
        envs.total_rewards()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_rollout_streams_to_receiver() {
    let receiver = VizReceiver::bind("127.0.0.1:0").unwrap();
    let mut envs = MultiEnv::new(SimConfig::default().with_seed(1), 2).unwrap();
    envs.reset_all().unwrap();
    envs.attach_visualizer(VizPublisher::new(receiver.local_addr().unwrap()).unwrap())
        .unwrap();

    let mut expected_messages = 1;
    for _ in 0..5 {
        let actions = envs.action_sample();
        envs.step(&actions).unwrap();
        envs.render().unwrap();
        expected_messages += envs.len();
    }
    // Second episode: trajectories restart
    envs.reset_all().unwrap();
    envs.render().unwrap();
    expected_messages += envs.len();
    drop(envs);
    expected_messages += 1;

    let mut scene = VizScene::new();
    let mut events = Vec::new();
    while let Some(message) = receiver.recv_timeout(Duration::from_secs(2)).unwrap() {
        let event = scene.apply(message);
        events.push(event);
        if event == SceneEvent::Shutdown {
            break;
        }
    }

    assert_eq!(events.len(), expected_messages);
    assert_eq!(events[0], SceneEvent::Initialized { env_count: 2 });
    assert_eq!(events.last(), Some(&SceneEvent::Shutdown));
    for buffer in scene.envs() {
        assert_eq!(buffer.frames, 6);
        assert_eq!(buffer.trajectory.len(), 1);
        assert_eq!(buffer.joints.len(), 4);
    }
}
