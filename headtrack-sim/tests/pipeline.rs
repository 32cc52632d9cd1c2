use std::path::Path;
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use common::errors::{CommandError, HeadtrackError};
use common::signals::TaskState;
use common::tasks::commander::Command;
use common::types::config::PipelineConfig;
use common::unit::OutputChannel;
use common::Instance;
use headtrack_sim::config::SimConfig;
use headtrack_sim::{SimHandle, SimulatedImu};

const WAIT: Duration = Duration::from_secs(5);

fn deg(degrees: f32) -> f32 {
    degrees.to_radians()
}

fn start(sim_config: &SimConfig, path: &Path) -> (SimHandle, Instance) {
    let sim = SimHandle::new(sim_config);
    let imu = SimulatedImu::new(sim.clone(), sim_config).unwrap();
    let config = PipelineConfig {
        read_rate_hz: 500,
        calibration_path: path.to_path_buf(),
        ..Default::default()
    };
    (sim, Instance::start(imu, config).unwrap())
}

fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < WAIT, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn wait_for_state(instance: &Instance, state: TaskState) {
    wait_for(&format!("{state:?}"), || instance.task_state() == state);
}

/// Wait until the published orientation matches, then return it.
fn wait_for_orientation(instance: &Instance, yaw: f32, pitch: f32, roll: f32) -> [f32; 3] {
    let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
    wait_for("orientation", || {
        let o = instance.latest().orientation;
        close(o.yaw, yaw) && close(o.pitch, pitch) && close(o.roll, roll)
    });
    instance.latest().orientation.to_array()
}

/// Device mounted at an arbitrary angle on the head.
fn mounted() -> SimConfig {
    SimConfig {
        mount: [0.4, -0.9, 2.0],
        ..SimConfig::ideal()
    }
}

#[test]
fn starts_running_without_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let (_sim, instance) = start(&SimConfig::ideal(), &dir.path().join("calibration"));
    wait_for_state(&instance, TaskState::Run);
    assert!(instance.fusion_status().is_fully_calibrated());
}

#[test]
fn failed_init_outputs_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig {
        fail_init: true,
        initial: [0.3, 0.2, 0.1],
        ..SimConfig::ideal()
    };
    let (_sim, instance) = start(&config, &dir.path().join("calibration"));
    let mut unit = instance.unit(OutputChannel::Orientation);

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(instance.task_state(), TaskState::Stop);
    assert_eq!(unit.next(1.0, 0.0, 0.0), [0.0, 0.0, 0.0]);
    assert_eq!(instance.task_state(), TaskState::Stop);

    let result = instance.commander().request(Command::CalibrateNeutral);
    assert!(matches!(
        result,
        Err(HeadtrackError::Command(CommandError::Closed | CommandError::Dropped))
    ));
}

#[test]
fn calibrate_with_commands() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, instance) = start(&mounted(), &dir.path().join("calibration"));
    let commander = instance.commander();
    wait_for_state(&instance, TaskState::Run);

    // Look forward, then down
    sim.set_head_ypr(deg(30.0), 0.0, 0.0);
    commander.request(Command::CalibrateNeutral).unwrap();
    assert_eq!(instance.task_state(), TaskState::CalibrateIdle);

    sim.set_head_ypr(deg(30.0), deg(40.0), 0.0);
    commander.request(Command::CalibrateDown).unwrap();
    assert_eq!(instance.task_state(), TaskState::Run);

    sim.set_head_ypr(deg(30.0), 0.0, 0.0);
    wait_for_orientation(&instance, 0.0, 0.0, 0.0);

    sim.set_head_ypr(deg(50.0), 0.0, 0.0);
    wait_for_orientation(&instance, deg(20.0), 0.0, 0.0);

    sim.set_head_ypr(deg(30.0), deg(15.0), 0.0);
    wait_for_orientation(&instance, 0.0, deg(15.0), 0.0);

    // Units only read the published sample
    let mut yaw = instance.unit(OutputChannel::Yaw);
    let mut pitch = instance.unit(OutputChannel::Pitch);
    assert_abs_diff_eq!(yaw.next(0.0, 0.0, 0.0)[0], 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(pitch.next(0.0, 0.0, 0.0)[0], deg(15.0), epsilon = 1e-3);
}

#[test]
fn calibrate_with_triggers() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, instance) = start(&mounted(), &dir.path().join("calibration"));
    let mut unit = instance.unit(OutputChannel::Orientation);
    wait_for_state(&instance, TaskState::Run);

    sim.set_head_ypr(deg(-60.0), 0.0, 0.0);
    unit.next(1.0, 0.0, 0.0);
    wait_for_state(&instance, TaskState::CalibrateIdle);
    assert_eq!(unit.next(0.0, 0.0, 0.0), [0.0, 0.0, 0.0]);

    sim.set_head_ypr(deg(-60.0), deg(50.0), 0.0);
    unit.next(1.0, 0.0, 0.0);
    wait_for_state(&instance, TaskState::Run);

    sim.set_head_ypr(deg(-60.0), 0.0, deg(10.0));
    let [yaw, pitch, roll] = wait_for_orientation(&instance, 0.0, 0.0, deg(10.0));
    let frame = unit.next(0.0, 0.0, 0.0);
    assert_abs_diff_eq!(frame[0], pitch, epsilon = 1e-3);
    assert_abs_diff_eq!(frame[1], roll, epsilon = 1e-3);
    assert_abs_diff_eq!(frame[2], yaw, epsilon = 1e-3);
}

#[test]
fn degenerate_gravity_keeps_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, instance) = start(&mounted(), &dir.path().join("calibration"));
    let commander = instance.commander();
    wait_for_state(&instance, TaskState::Run);

    sim.set_head_ypr(0.0, 0.0, 0.0);
    commander.request(Command::CalibrateNeutral).unwrap();
    sim.set_head_ypr(0.0, deg(45.0), 0.0);
    commander.request(Command::CalibrateDown).unwrap();

    sim.set_zero_gravity(true);
    assert!(commander.request(Command::CalibrateNeutral).is_err());
    assert_eq!(instance.task_state(), TaskState::Run);
    sim.set_zero_gravity(false);

    sim.set_head_ypr(deg(25.0), 0.0, 0.0);
    wait_for_orientation(&instance, deg(25.0), 0.0, 0.0);
}

#[test]
fn calibration_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration");

    {
        let (sim, instance) = start(&mounted(), &path);
        let commander = instance.commander();
        wait_for_state(&instance, TaskState::Run);

        sim.set_head_ypr(deg(90.0), 0.0, 0.0);
        commander.request(Command::CalibrateNeutral).unwrap();
        sim.set_head_ypr(deg(90.0), deg(30.0), 0.0);
        commander.request(Command::CalibrateDown).unwrap();
        commander.request(Command::Save(None)).unwrap();
    }
    assert!(path.exists());

    let (sim, instance) = start(&mounted(), &path);
    wait_for_state(&instance, TaskState::Run);

    sim.set_head_ypr(deg(100.0), deg(-10.0), 0.0);
    wait_for_orientation(&instance, deg(10.0), deg(-10.0), 0.0);
}

#[test]
fn load_missing_file_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let (_sim, instance) = start(&SimConfig::ideal(), &dir.path().join("calibration"));
    wait_for_state(&instance, TaskState::Run);

    let other = dir.path().join("other");
    let result = instance.commander().request(Command::Load(Some(other)));
    assert!(matches!(result, Err(HeadtrackError::Store(_))));
    assert_eq!(instance.task_state(), TaskState::Run);
}

#[test]
fn shutdown_zeroes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig {
        initial: [0.0, 0.0, 1.0],
        ..SimConfig::ideal()
    };
    let (_sim, mut instance) = start(&config, &dir.path().join("calibration"));
    let mut unit = instance.unit(OutputChannel::Yaw);
    wait_for_orientation(&instance, 1.0, 0.0, 0.0);
    assert_abs_diff_eq!(unit.next(0.0, 0.0, 0.0)[0], 1.0, epsilon = 1e-3);

    instance.shutdown();
    assert_eq!(instance.task_state(), TaskState::Stop);
    assert_eq!(unit.next(0.0, 0.0, 0.0), [0.0]);
}
