use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use usbir_core::{IrSession, SessionConfig, Waveform};

#[derive(Parser, Debug)]
#[command(author, version, about = "USB infrared remote capture/transmit tool", long_about = None)]
struct Args {
    /// Session configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record an IR signal and save the raw waveform
    Capture {
        /// Output file for the raw waveform bytes
        #[arg(short, long)]
        out: PathBuf,

        /// Carrier frequency in Hz
        #[arg(short, long)]
        freq: Option<u32>,

        /// Stop after this many seconds instead of waiting for Enter
        #[arg(long)]
        seconds: Option<u64>,

        /// Round every byte to a multiple of this unit (1 disables)
        #[arg(long, default_value_t = 1)]
        clip: u8,

        /// Also print the waveform as base64
        #[arg(long)]
        base64: bool,

        /// Gzip the waveform before printing it as base64
        #[arg(short, long, requires = "base64")]
        gzip: bool,
    },
    /// Transmit a saved IR waveform
    Send {
        /// Raw waveform file
        file: Option<PathBuf>,

        /// Waveform as a base64 string
        #[arg(short, long, conflicts_with = "file")]
        base64: Option<String>,

        /// Carrier frequency in Hz
        #[arg(short, long)]
        freq: Option<u32>,

        /// Input is gzip-compressed
        #[arg(short, long)]
        gzip: bool,
    },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    match args.command {
        Command::Capture {
            out,
            freq,
            seconds,
            clip,
            base64,
            gzip,
        } => {
            let print = base64.then_some(if gzip { Encoding::Gzip } else { Encoding::Raw });
            capture(&config, freq.unwrap_or(config.frequency), &out, seconds, clip, print)
        }
        Command::Send {
            file,
            base64,
            freq,
            gzip,
        } => {
            let encoding = if gzip { Encoding::Gzip } else { Encoding::Raw };
            let waveform = load_waveform(file.as_deref(), base64.as_deref(), encoding)?;
            let frequency = freq.unwrap_or(config.frequency);

            let mut session = IrSession::open(&config)?;
            session.transmit(&waveform, frequency)?;
            info!(pairs = waveform.len(), frequency, "Sent");
            Ok(())
        }
    }
}

/// How waveform bytes are packed in files and base64 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Raw,
    Gzip,
}

fn capture(
    config: &SessionConfig,
    frequency: u32,
    out: &Path,
    seconds: Option<u64>,
    clip: u8,
    print_base64: Option<Encoding>,
) -> Result<()> {
    let mut session = IrSession::open(config)?;
    session.start_capture(frequency)?;

    match seconds {
        Some(secs) => {
            info!("Recording for {}s...", secs);
            thread::sleep(Duration::from_secs(secs));
        }
        None => {
            eprintln!("Recording. Press the remote button, then Enter to stop.");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
        }
    }

    session.stop_capture()?;
    let waveform = session.read_capture()?.clip(clip);

    std::fs::write(out, waveform.to_bytes())
        .with_context(|| format!("writing {}", out.display()))?;
    info!(pairs = waveform.len(), path = %out.display(), "Capture saved");

    if let Some(encoding) = print_base64 {
        println!("{}", base64_text(&waveform, encoding)?);
    }
    Ok(())
}

fn base64_text(waveform: &Waveform, encoding: Encoding) -> Result<String> {
    Ok(match encoding {
        Encoding::Raw => waveform.to_base64(),
        Encoding::Gzip => waveform.to_base64_gzip()?,
    })
}

fn load_waveform(
    file: Option<&Path>,
    base64: Option<&str>,
    encoding: Encoding,
) -> Result<Waveform> {
    let waveform = match (file, base64, encoding) {
        (Some(path), None, _) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            match encoding {
                Encoding::Raw => Waveform::from_bytes(&bytes)?,
                Encoding::Gzip => Waveform::from_gzip(&bytes)?,
            }
        }
        (None, Some(text), Encoding::Raw) => Waveform::from_base64(text)?,
        (None, Some(text), Encoding::Gzip) => Waveform::from_base64_gzip(text)?,
        _ => bail!("exactly one of FILE or --base64 is required"),
    };
    Ok(waveform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_waveform_requires_one_source() {
        assert!(load_waveform(None, None, Encoding::Raw).is_err());
        assert!(load_waveform(Some(Path::new("a.bin")), Some("AAAA"), Encoding::Raw).is_err());
    }

    #[test]
    fn test_load_waveform_from_base64() {
        let wf = load_waveform(None, Some("ASwAZA=="), Encoding::Raw).unwrap();
        assert_eq!(wf.len(), 1);
        assert_eq!(wf.pairs()[0].on_ticks, 300);
        assert_eq!(wf.pairs()[0].off_ticks, 100);
    }

    #[test]
    fn test_args_parse_send() {
        let args = Args::try_parse_from(["usbir", "send", "--base64", "AAAA", "-f", "40000"]).unwrap();
        match args.command {
            Command::Send {
                file,
                base64,
                freq,
                gzip,
            } => {
                assert!(file.is_none());
                assert_eq!(base64.as_deref(), Some("AAAA"));
                assert_eq!(freq, Some(40_000));
                assert!(!gzip);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_args_capture_gzip_requires_base64() {
        assert!(Args::try_parse_from(["usbir", "capture", "-o", "x.bin", "--gzip"]).is_err());
        let args =
            Args::try_parse_from(["usbir", "capture", "-o", "x.bin", "--base64", "-g"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Capture {
                base64: true,
                gzip: true,
                ..
            }
        ));
    }

    #[test]
    fn test_gzip_base64_capture_output_loads_for_send() {
        let wf = Waveform::from_bytes(&[0x01, 0x2C, 0x00, 0x64, 0x00, 0x10, 0x00, 0x20]).unwrap();
        let text = base64_text(&wf, Encoding::Gzip).unwrap();
        assert_ne!(text, base64_text(&wf, Encoding::Raw).unwrap());
        assert_eq!(load_waveform(None, Some(text.as_str()), Encoding::Gzip).unwrap(), wf);
        assert!(load_waveform(None, Some("ASwAZA=="), Encoding::Gzip).is_err());
    }

    #[test]
    fn test_load_gzip_file() {
        let wf = Waveform::from_bytes(&[0x01, 0x2C, 0x00, 0x64]).unwrap();
        let path = std::env::temp_dir().join(format!("usbir-send-{}.bin.gz", std::process::id()));
        std::fs::write(&path, wf.to_gzip().unwrap()).unwrap();
        let loaded = load_waveform(Some(path.as_path()), None, Encoding::Gzip);
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.unwrap(), wf);
    }
}
