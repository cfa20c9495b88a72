mod app;
mod audio;
mod config;
mod constants;
mod control;
mod error;
mod logging;
mod mixer;
mod pulse;
mod scheduler;
mod smoothing;
mod spectrum;
mod state;
mod ui;

use clap::Parser;
use dialoguer::{Select, theme::ColorfulTheme};
use mixer::Mixer;

fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let device_list = audio::input_device_names()?;

    if device_list.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    let items: Vec<String> = device_list
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}: {}", i, name))
        .collect();

    // Interactive selection
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select an audio input device")
        .items(&items)
        .default(0)
        .interact()?;

    println!("{}", items[selection]);

    Ok(())
}

fn list_sinks() -> Result<(), Box<dyn std::error::Error>> {
    let channels = pulse::PactlMixer::new().list_channels()?;

    if channels.is_empty() {
        println!("No playback streams found.");
        return Ok(());
    }

    for channel in channels {
        println!(
            "{:>5}  {:>5.2}  {}",
            channel.index, channel.volume, channel.name
        );
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    use app::ExitCode;
    use config::{Args, Commands};

    let args = Args::parse();

    match args.command {
        Commands::Run(run_args) => {
            let config = match config::Config::from_run_args(run_args) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            };

            if let Err(e) = logging::init(config.verbose, !config.monitor) {
                eprintln!("{}", e);
                std::process::exit(ExitCode::Error as i32);
            }

            match app::App::new_with_config(config) {
                Ok(app) => {
                    let run_result = app.run().await;
                    match run_result.result {
                        Ok(_) => {
                            std::process::exit(run_result.exit_code as i32);
                        }
                        Err(e) => {
                            eprintln!("Application error: {}", e);
                            std::process::exit(ExitCode::Error as i32);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Setup error: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::List(_) => {
            if let Err(e) = list_devices() {
                eprintln!("Error listing devices: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
        Commands::Sinks(_) => {
            if let Err(e) = list_sinks() {
                eprintln!("Error listing playback streams: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
    }

    std::process::exit(ExitCode::Success as i32);
}
