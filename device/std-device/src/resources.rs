use std::error::Error;
use std::sync::mpsc::{self, Receiver, Sender};

use common::tasks::commander::{Command, Commander};
use headtrack_sim::SimHandle;
use log::{info, warn};

pub fn setup_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_nanos()
        .init();
}

/// A one-block pulse on one of the trigger inputs of the audio unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    Calibrate,
    Load,
    Save,
}

const HELP: &str = "\
commands:
  calibrate-neutral | calibrate-down | save [file] | load [file]
  trig cal|load|save          pulse a trigger input of the audio unit
  pose <yaw> <pitch> <roll>   move the simulated head, in degrees
  help";

/// Read console lines from stdin on a separate thread. Trigger pulses are
/// forwarded to the audio loop, the receiver disconnects when stdin closes.
pub fn spawn_console(commander: Commander, sim: SimHandle) -> std::io::Result<Receiver<Pulse>> {
    let (pulses, receiver) = mpsc::channel();

    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || console(commander, sim, pulses))?;

    Ok(receiver)
}

fn console(commander: Commander, sim: SimHandle, pulses: Sender<Pulse>) {
    const ID: &str = "console";
    info!("{}: Type 'help' for a list of commands", ID);

    for line in std::io::stdin().lines() {
        let Ok(line) = line else {
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle_line(line, &commander, &sim, &pulses) {
            Ok(()) => info!("{}: '{}' done", ID, line),
            Err(error) => warn!("{}: '{}' failed: {}", ID, line, error),
        }
    }

    info!("{}: Input closed", ID);
}

fn handle_line(
    line: &str,
    commander: &Commander,
    sim: &SimHandle,
    pulses: &Sender<Pulse>,
) -> Result<(), Box<dyn Error>> {
    let mut words = line.split_whitespace();

    match words.next() {
        Some("help") => println!("{HELP}"),
        Some("trig") => {
            let pulse = match words.next() {
                Some("cal") => Pulse::Calibrate,
                Some("load") => Pulse::Load,
                Some("save") => Pulse::Save,
                _ => return Err("expected 'trig cal|load|save'".into()),
            };
            pulses.send(pulse)?;
        }
        Some("pose") => {
            let mut angle = || -> Result<f32, Box<dyn Error>> {
                let word = words.next().ok_or("expected 'pose <yaw> <pitch> <roll>'")?;
                Ok(word.parse::<f32>()?.to_radians())
            };
            let (yaw, pitch, roll) = (angle()?, angle()?, angle()?);
            sim.set_head_ypr(yaw, pitch, roll);
        }
        _ => {
            let command: Command = line.parse()?;
            commander.request(command)?;
        }
    }

    Ok(())
}
