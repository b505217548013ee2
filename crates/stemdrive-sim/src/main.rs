//! stemdrive-sim - drive the mix from a simulated pedal box
//!
//! Reads throttle/brake commands from stdin, feeds them to the simulated
//! telemetry source, and prints the resulting gauges and stem gains a few
//! times per second. `q` (or losing the output device) ends the session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use stemdrive_core::config::{default_config_path, load_config, SimConfig};
use stemdrive_core::gain::DriveLimits;
use stemdrive_core::session::MixSession;
use stemdrive_core::telemetry::SimulatedTelemetry;
use stemdrive_core::StemRole;

/// Pedal positions, both 0..=1
///
/// Brake scales the throttle down rather than subtracting from it, so a
/// full brake always brings the targets to zero no matter the throttle.
struct ControlSurface {
    throttle: f32,
    brake: f32,
}

impl ControlSurface {
    fn new() -> Self {
        Self {
            throttle: 0.0,
            brake: 0.0,
        }
    }

    fn effective(&self) -> f32 {
        self.throttle * (1.0 - self.brake)
    }

    fn apply(&self, telemetry: &SimulatedTelemetry, limits: &DriveLimits) {
        let e = self.effective();
        telemetry.set_target_speed(e * limits.max_speed);
        telemetry.set_target_rpm(e * limits.max_rpm);
    }
}

enum Input {
    Throttle(f32),
    Brake(f32),
    Quit,
}

fn parse_line(line: &str) -> Option<Input> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "q" | "quit" => Some(Input::Quit),
        "t" => parts.next()?.parse().ok().map(Input::Throttle),
        "b" => parts.next()?.parse().ok().map(Input::Brake),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = match default_config_path() {
        Some(path) => load_config(&path),
        None => SimConfig::default(),
    };
    // A config with out-of-range values parses fine; reject it here with
    // a readable error instead of hitting the DriveLimits assertion.
    config.validate()?;
    let limits = config.limits();

    // Optional song name selects a subdirectory of the stem directory
    let stem_dir = match std::env::args().nth(1) {
        Some(song) => config.stem_dir.join(song),
        None => PathBuf::from(&config.stem_dir),
    };

    println!("┌─────────────────────────────────────────────┐");
    println!("│  stemdrive - the car is the mixing console  │");
    println!("│  t <0..1>  throttle    b <0..1>  brake      │");
    println!("│  q         quit                             │");
    println!("└─────────────────────────────────────────────┘");

    let telemetry = Arc::new(SimulatedTelemetry::new());
    let session = MixSession::start(&config, &stem_dir, telemetry.clone())?;
    log::info!(
        "session live at {} Hz, {:.1} ms latency",
        session.sample_rate(),
        session.latency_ms()
    );

    // stdin is blocking, so a reader thread forwards lines over a channel
    // and the main loop stays free to poll the snapshot.
    let (line_tx, line_rx) = channel::bounded::<String>(8);
    std::thread::Builder::new()
        .name("stemdrive-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            loop {
                line.clear();
                match std::io::stdin().read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if line_tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        })?;

    let mut surface = ControlSurface::new();
    surface.apply(&telemetry, &limits);

    loop {
        match line_rx.recv_timeout(Duration::from_millis(250)) {
            Ok(line) => match parse_line(&line) {
                Some(Input::Throttle(t)) => {
                    surface.throttle = t.clamp(0.0, 1.0);
                    surface.apply(&telemetry, &limits);
                }
                Some(Input::Brake(b)) => {
                    surface.brake = b.clamp(0.0, 1.0);
                    surface.apply(&telemetry, &limits);
                }
                Some(Input::Quit) => break,
                None => {
                    if !line.is_empty() {
                        println!("unrecognized: {line}");
                    }
                }
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if session.device_lost() {
            log::error!("output device lost, shutting down");
            break;
        }

        let snap = session.snapshot();
        log::info!(
            "speed {:5.1}  rpm {:6.0}  |  {} {:.2}  {} {:.2}  {} {:.2}  {} {:.2}",
            snap.speed,
            snap.rpm,
            StemRole::Bass.name(),
            snap.gains[StemRole::Bass as usize],
            StemRole::Drums.name(),
            snap.gains[StemRole::Drums as usize],
            StemRole::Other.name(),
            snap.gains[StemRole::Other as usize],
            StemRole::Vocals.name(),
            snap.gains[StemRole::Vocals as usize],
        );
    }

    session.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brake_scales_throttle() {
        let mut surface = ControlSurface::new();
        surface.throttle = 0.8;
        surface.brake = 0.5;
        assert!((surface.effective() - 0.4).abs() < 1e-6);

        surface.brake = 1.0;
        assert_eq!(surface.effective(), 0.0);
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_line("t 0.5"), Some(Input::Throttle(v)) if v == 0.5));
        assert!(matches!(parse_line("b 1"), Some(Input::Brake(v)) if v == 1.0));
        assert!(matches!(parse_line("q"), Some(Input::Quit)));
        assert!(parse_line("x 0.5").is_none());
        assert!(parse_line("t").is_none());
    }
}
