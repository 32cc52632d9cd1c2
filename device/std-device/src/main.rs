use std::sync::mpsc::TryRecvError;
use std::time::{Duration, Instant};

use clap::Parser;
use common::unit::{OutputChannel, TriggerInputs};
use common::utils::ticker::Ticker;
use common::Instance;
use headtrack_sim::{SimHandle, SimulatedImu};
use log::info;

mod config;
mod resources;

use resources::Pulse;

#[derive(clap::Parser)]
struct Args {
    /// Path to the configuration file
    #[clap(default_value = "headtrack.toml")]
    #[clap(short, long)]
    config: String,

    /// Output channel: 0 acc, 1 gyr, 2 mag, 3 orientation, 4 yaw, 5 pitch, 6 roll
    #[clap(long, default_value_t = 3)]
    channel: u8,

    /// Number of samples per audio block
    #[clap(long, default_value_t = 64)]
    block_size: usize,

    /// Audio sample rate [Hz]
    #[clap(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// Stop after this many seconds instead of when stdin closes
    #[clap(short, long)]
    duration: Option<f32>,

    /// Print the unit outputs at this interval [ms]
    #[clap(long, default_value_t = 500)]
    print_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    resources::setup_logging();

    let config = config::load_from_file_path(&args.config)?;
    let sim = SimHandle::new(&config.sim);
    let imu = SimulatedImu::new(sim.clone(), &config.sim)?;
    let instance = Instance::start(imu, config.pipeline)?;

    let channel = OutputChannel::from_input(args.channel as f32);
    let mut unit = instance.unit(channel);
    let pulses = resources::spawn_console(instance.commander(), sim)?;

    let block_size = args.block_size.max(1);
    let block_period = Duration::from_secs_f64(block_size as f64 / args.sample_rate.max(1) as f64);
    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs_f32(secs));
    let print_period = Duration::from_millis(args.print_ms);

    info!("main: Audio loop on {:?}, {} samples every {:?}", channel, block_size, block_period);

    let mut triggers: [Vec<f32>; 3] = core::array::from_fn(|_| vec![0.0; block_size]);
    let mut outputs: [Vec<f32>; 3] = core::array::from_fn(|_| vec![0.0; block_size]);
    let mut ticker = Ticker::every(block_period);
    let mut last_print = Instant::now();

    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        for trigger in triggers.iter_mut() {
            trigger.fill(0.0);
        }

        match pulses.try_recv() {
            Ok(pulse) => {
                let idx = match pulse {
                    Pulse::Calibrate => 0,
                    Pulse::Load => 1,
                    Pulse::Save => 2,
                };
                triggers[idx].fill(1.0);
            }
            Err(TryRecvError::Disconnected) if deadline.is_none() => break,
            Err(_) => {}
        }

        let [calibrate, load, save] = &triggers;
        let inputs = TriggerInputs {
            calibrate,
            load,
            save,
        };

        let [out0, out1, out2] = &mut outputs;
        let mut buffers: [&mut [f32]; 3] = [out0, out1, out2];
        unit.process_block(&inputs, &mut buffers[..channel.num_outputs()]);

        if last_print.elapsed() >= print_period {
            last_print = Instant::now();
            let values: Vec<f32> = outputs[..channel.num_outputs()]
                .iter()
                .map(|out| out[block_size - 1])
                .collect();
            info!("main: {:?} {:?} {:.3?}", instance.task_state(), channel, values);
        }

        ticker.next();
    }

    info!("main: Shutting down");
    drop(instance);
    Ok(())
}
