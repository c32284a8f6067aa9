//! gpsdetect
//!
//! Finds an attached GPS receiver by trying the local gpsd and every serial
//! port at each common baud rate, then reports where it was found.

mod settings;

use std::process::ExitCode;

use clap::Parser;
use gps_detect::{
    Candidate, DetectedConnection, DetectionOutcome, Detector, DetectorConfig, DetectorEvent,
    SystemPortEnumerator,
};
use gps_link::{LinkFactory, NmeaConnection};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

const DEFAULT_FILTER: &str = "gpsdetect=info,gps_detect=info,gps_link=info,gps_sim=info";
const VERBOSE_FILTER: &str = "gpsdetect=debug,gps_detect=debug,gps_link=debug,gps_sim=debug";

#[derive(Parser, Debug)]
#[command(
    name = "gpsdetect",
    version,
    about = "Find an attached GPS receiver on serial ports or gpsd"
)]
struct Args {
    /// Endpoint to probe instead of enumerating: a serial device,
    /// host:port:device for gpsd, or internalGPS
    #[arg(short, long)]
    port: Option<String>,

    /// Comma-separated baud rates to sweep on serial ports
    #[arg(short, long, value_delimiter = ',')]
    bauds: Option<Vec<u32>>,

    /// Time each attempt gets to produce a valid sentence
    #[arg(long)]
    window_ms: Option<u64>,

    /// Observation window for network endpoints
    #[arg(long)]
    network_window_ms: Option<u64>,

    /// Print the candidates that would be tried and exit
    #[arg(short, long)]
    list: bool,

    /// Print this many sentences from the detected receiver
    #[arg(short, long, value_name = "N")]
    follow: Option<usize>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Apply command line overrides on top of the saved configuration
    fn detector_config(&self, mut config: DetectorConfig) -> DetectorConfig {
        if let Some(bauds) = &self.bauds {
            config.baud_rates = bauds.clone();
        }
        if let Some(ms) = self.window_ms {
            config.observation_window_ms = ms;
        }
        if let Some(ms) = self.network_window_ms {
            config.network_window_ms = Some(ms);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut settings = Settings::load();
    let config = args.detector_config(settings.detector.clone());
    let port = args.port.clone().or_else(|| settings.port.clone());
    let enumerator = SystemPortEnumerator::with_config(settings.scanner.clone());

    let detector = match Detector::new(config, port.as_deref(), &enumerator, LinkFactory::new()) {
        Ok(detector) => detector,
        Err(e) => {
            eprintln!("gpsdetect: {}", e);
            return ExitCode::from(2);
        }
    };

    if args.list {
        print_candidates(detector.candidates());
        return ExitCode::SUCCESS;
    }

    tracing::info!(
        "Searching {} candidate(s), at most {:.1}s",
        detector.candidates().len(),
        detector
            .config()
            .worst_case(detector.candidates())
            .as_secs_f64()
    );

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(progress_rx));
    let outcome = detector.with_progress(progress_tx).run().await;
    let _ = printer.await;

    match outcome {
        DetectionOutcome::Detected(detected) => {
            println!("{}", describe(&detected));

            let already_saved = settings.port.as_deref() == Some(detected.candidate.id.as_str());
            if settings.remember_detected && !already_saved {
                settings.port = Some(detected.candidate.id.clone());
                if let Some(baud) = detected.baud {
                    settings.detector.baud_rates.retain(|b| *b != baud);
                    settings.detector.baud_rates.insert(0, baud);
                }
                match settings.save() {
                    Ok(path) => {
                        tracing::info!("Saved {} to {}", detected.candidate.id, path.display())
                    }
                    Err(e) => tracing::warn!("Could not save settings: {}", e),
                }
            }

            if let Some(count) = args.follow {
                follow(detected, count).await;
            }
            ExitCode::SUCCESS
        }
        DetectionOutcome::Failed => {
            eprintln!("gpsdetect: no GPS receiver found");
            ExitCode::FAILURE
        }
    }
}

fn print_candidates(candidates: &[Candidate]) {
    if candidates.is_empty() {
        println!("No candidates");
        return;
    }
    for candidate in candidates {
        let sweep = if candidate.endpoint.is_serial() {
            "serial"
        } else {
            "once"
        };
        println!("{:<24} {:<8} {}", candidate.id, sweep, candidate.label);
    }
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<DetectorEvent>) {
    while let Some(event) = rx.recv().await {
        let line = match &event {
            DetectorEvent::AttemptStarted { candidate, baud } => {
                format!("trying {}{}", candidate, at_baud(*baud))
            }
            DetectorEvent::AttemptSkipped {
                candidate,
                baud,
                reason,
            } => format!("skipped {}{}: {}", candidate, at_baud(*baud), reason),
            DetectorEvent::AttemptAbandoned { .. } => continue,
            DetectorEvent::Detected { .. } | DetectorEvent::Failed { .. } => break,
        };
        eprintln!("{}", line);
    }
}

fn at_baud(baud: Option<u32>) -> String {
    baud.map(|b| format!(" @ {b}")).unwrap_or_default()
}

fn describe(detected: &DetectedConnection) -> String {
    format!("{}{}", detected.candidate.id, at_baud(detected.baud))
}

/// Print sentences from the detected connection until `count` were shown
async fn follow(detected: DetectedConnection, count: usize) {
    let mut link = match detected.connection.into_any().downcast::<NmeaConnection>() {
        Ok(link) => link,
        Err(_) => {
            eprintln!("gpsdetect: detected source does not provide NMEA sentences");
            return;
        }
    };
    let Some(mut sentences) = link.take_sentences() else {
        return;
    };

    let mut shown = 0;
    while shown < count {
        tokio::select! {
            sentence = sentences.recv() => match sentence {
                Some(sentence) => {
                    println!("{}", sentence);
                    shown += 1;
                }
                None => break,
            },
            _ = link.closed() => {
                eprintln!("gpsdetect: {} went away", link.source());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "gpsdetect",
            "--bauds",
            "9600,4800",
            "--window-ms",
            "500",
            "--network-window-ms",
            "3000",
        ]);
        let config = args.detector_config(DetectorConfig::default());
        assert_eq!(config.baud_rates, vec![9600, 4800]);
        assert_eq!(config.observation_window_ms, 500);
        assert_eq!(config.network_window_ms, Some(3000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["gpsdetect", "--port", "/dev/ttyUSB0", "--follow", "5"]);
        let saved = DetectorConfig {
            baud_rates: vec![38400],
            ..Default::default()
        };
        assert_eq!(args.detector_config(saved.clone()), saved);
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(args.follow, Some(5));
    }

    #[test]
    fn test_at_baud() {
        assert_eq!(at_baud(Some(4800)), " @ 4800");
        assert_eq!(at_baud(None), "");
    }
}
