//! Plays a sine tone through a DirectSound ring buffer.
//!
//! Usage: `dsound-tone [--list] [--device <guid>] [--freq <hz>] [--seconds <n>]`
//!
//! Set `RUST_LOG=debug` to watch acquisition and the transfer thread.

#[cfg(target_os = "windows")]
fn main() {
    env_logger::init();

    if let Err(e) = tone::run(std::env::args().skip(1).collect()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "windows"))]
fn main() {
    env_logger::init();
    eprintln!("dsound-tone requires Windows");
    std::process::exit(1);
}

#[cfg(target_os = "windows")]
mod tone {
    use std::f64::consts::TAU;
    use std::thread;
    use std::time::{Duration, Instant};

    use audio_ring_core::{FormatSpec, RingBufferConfiguration, RingBufferSession};
    use audio_ring_windows::{DeviceEnumerator, DirectSoundBackend};

    const SAMPLE_RATE: u32 = 48_000;
    const CHANNELS: u16 = 2;

    struct Options {
        list: bool,
        device: Option<String>,
        frequency: f64,
        seconds: f64,
    }

    fn parse(args: Vec<String>) -> Result<Options, String> {
        let mut options = Options {
            list: false,
            device: None,
            frequency: 440.0,
            seconds: 3.0,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--list" => options.list = true,
                "--device" => options.device = Some(args.next().ok_or("--device needs a GUID")?),
                "--freq" => {
                    let value = args.next().ok_or("--freq needs a value")?;
                    options.frequency = value.parse().map_err(|_| format!("invalid frequency: {}", value))?;
                }
                "--seconds" => {
                    let value = args.next().ok_or("--seconds needs a value")?;
                    options.seconds = value.parse().map_err(|_| format!("invalid duration: {}", value))?;
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
        }
        Ok(options)
    }

    pub fn run(args: Vec<String>) -> Result<(), String> {
        let options = parse(args)?;

        if options.list {
            let devices = DeviceEnumerator::list_playback_devices().map_err(|e| e.to_string())?;
            for device in devices {
                println!(
                    "{:<40} {}",
                    device.id.as_deref().unwrap_or("(default)"),
                    device.description
                );
            }
            return Ok(());
        }

        let config = RingBufferConfiguration {
            device_id: options.device,
            ..RingBufferConfiguration::playback()
        };
        let format = FormatSpec::pcm16(CHANNELS, SAMPLE_RATE);
        let mut session =
            RingBufferSession::acquire(DirectSoundBackend::new(), config, format).map_err(|e| e.to_string())?;

        let layout = session.layout();
        let frames = layout.frames_per_segment(&format);
        let step = TAU * options.frequency / SAMPLE_RATE as f64;
        let mut phase = 0.0_f64;
        let mut segment = vec![0u8; layout.segment_size];

        session.start().map_err(|e| e.to_string())?;
        let segments = session.segments();
        let deadline = Instant::now() + Duration::from_secs_f64(options.seconds.max(0.0));

        while Instant::now() < deadline {
            {
                let mut ring = segments.lock();
                while !ring.is_full() {
                    for frame in segment.chunks_exact_mut(format.bytes_per_sample as usize).take(frames) {
                        let sample = ((phase.sin() * 0.25) * i16::MAX as f64) as i16;
                        for channel in frame.chunks_exact_mut(2) {
                            channel.copy_from_slice(&sample.to_le_bytes());
                        }
                        phase = (phase + step) % TAU;
                    }
                    ring.commit(&segment);
                }
            }
            thread::sleep(layout.latency);
        }

        let diagnostics = session.diagnostics();
        session.release().map_err(|e| e.to_string())?;
        println!("{}", diagnostics.to_json().map_err(|e| e.to_string())?);
        Ok(())
    }
}
