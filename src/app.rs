use crate::cli::{Cli, Commands};
use nvprobe::probe::{CodecSupport, NvencProbe};
use nvprobe::config;
use std::path::PathBuf;
use std::process;

pub fn run(cli: Cli) {
    let probe = build_probe(cli.executable);

    match cli.command {
        Commands::Check { codec } => handle_check(&probe, &codec),
        Commands::List => handle_list(&probe),
        Commands::InitConfig => handle_init_config(),
    }
}

fn build_probe(executable: Option<PathBuf>) -> NvencProbe {
    match executable {
        Some(path) => NvencProbe::with_executable(path),
        None => NvencProbe::new(),
    }
}

/// Exit codes: 0 = supported, 1 = unsupported, 2 = probe could not answer
/// (driver too old or the helper failed to run)
fn handle_check(probe: &NvencProbe, codec: &str) {
    match probe.supports(codec) {
        Ok(CodecSupport::Supported) => {
            println!("{}: supported", codec);
            process::exit(0);
        }
        Ok(CodecSupport::Unsupported) => {
            println!("{}: not supported", codec);
            process::exit(1);
        }
        Ok(CodecSupport::DriverTooOld { output }) => {
            eprintln!("NVENC driver is too old for the probe's API version:");
            eprint!("{}", output);
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {:#}", anyhow::Error::from(e));
            process::exit(2);
        }
    }
}

fn handle_list(probe: &NvencProbe) {
    match probe.probe_output() {
        Ok(output) => {
            print!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", anyhow::Error::from(e));
            process::exit(2);
        }
    }
}

fn handle_init_config() {
    match config::Config::load() {
        Ok(cfg) if config::Config::exists() => {
            match config::Config::config_path() {
                Ok(path) => println!("Config loaded successfully from {}", path.display()),
                Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
            }
            println!("{:#?}", cfg);
        }
        Ok(_) => {
            println!("No config file found, creating default config...");

            let cfg = config::Config::default();
            if let Err(err) = cfg.save() {
                eprintln!("Failed to save default config: {:#}", err);
                process::exit(1);
            }
            match config::Config::config_path() {
                Ok(path) => println!("Default config saved to {}", path.display()),
                Err(e) => println!("Default config saved (path unknown): {:#}", e),
            }
        }
        Err(e) => {
            eprintln!("Config invalid: {:#}", e);
            process::exit(1);
        }
    }
}
