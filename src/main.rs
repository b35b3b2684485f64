//! labdemo - exercises labengine in a real window
//!
//! Draws a palette sweep and a few shapes, then echoes key presses until
//! Escape is pressed.
//!
//! ```text
//! labdemo                  # native window (terminal on non-Windows hosts)
//! labdemo -W 320 -H 240 -s 2
//! labdemo --terminal       # force the terminal backend
//! ```

use std::env;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use labengine::config::{self, Config};
use labengine::window::{default_backend, Backend, TerminalBackend};
use labengine::{Key, Lab, Palette};

/// Command line options
struct Options {
    width: Option<u32>,
    height: Option<u32>,
    scale: Option<u32>,
    terminal: bool,
    verbose: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("labdemo {} - labengine demonstration", VERSION);
    eprintln!();
    eprintln!("Usage: labdemo [OPTIONS]");
    eprintln!();
    eprintln!("Surface options (override ~/.labengine/config.toml):");
    eprintln!("  -W, --width <PX>      Surface width");
    eprintln!("  -H, --height <PX>     Surface height");
    eprintln!("  -s, --scale <N>       Integer zoom when shown on screen");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -t, --terminal        Draw into the terminal instead of a window");
    eprintln!("  -v, --verbose         Debug logging to ~/.labengine/labengine.log");
    eprintln!("  -V, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Press keys to echo their codes; Esc quits.");
}

fn parse_number(args: &[String], i: usize, name: &str) -> Result<u32, String> {
    let value = args
        .get(i)
        .ok_or_else(|| format!("Missing value for {}", name))?;
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", name, value))
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options {
        width: None,
        height: None,
        scale: None,
        terminal: false,
        verbose: false,
    };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                eprintln!("labdemo {}", VERSION);
                std::process::exit(0);
            }
            "-W" | "--width" => {
                i += 1;
                options.width = Some(parse_number(&args, i, "--width")?);
            }
            "-H" | "--height" => {
                i += 1;
                options.height = Some(parse_number(&args, i, "--height")?);
            }
            "-s" | "--scale" => {
                i += 1;
                options.scale = Some(parse_number(&args, i, "--scale")?);
            }
            "-t" | "--terminal" => options.terminal = true,
            "-v" | "--verbose" => options.verbose = true,
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Log to a file; the terminal may be showing the surface
fn init_logging(verbose: bool) {
    let Some(dir) = config::data_dir() else {
        return;
    };
    let _ = std::fs::create_dir_all(&dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("labengine.log"))
        .ok();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_thread_names(true)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn draw_scene(lab: &Lab) {
    let (w, h) = (lab.width() as i32, lab.height() as i32);

    // Palette sweep along the top
    let band = (w / Palette::ALL.len() as i32).max(1);
    for (i, &color) in Palette::ALL.iter().enumerate() {
        lab.set_color(color);
        let x = i as i32 * band;
        for y in 0..h / 8 {
            lab.draw_line(x, y, x + band, y);
        }
    }

    lab.set_color(Palette::Red);
    lab.draw_rect(0, 0, w, h);

    lab.set_color(Palette::Yellow);
    lab.draw_circle(w / 2, h / 2, h / 4);
    lab.set_color(Palette::Cyan);
    lab.draw_ellipse(w / 2, h / 2, w / 3, h / 6);

    lab.set_color_rgb(255, 128, 0);
    lab.draw_line(0, h - 1, w, h / 8);
    lab.draw_line(0, h / 8, w, h - 1);

    lab.set_color(Palette::White);
    for x in (0..w).step_by(8) {
        lab.draw_point(x, h - 4);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };
    init_logging(options.verbose);
    info!("labdemo {} starting", VERSION);

    // Command line overrides the config file
    let mut config = Config::load();
    if let Some(width) = options.width {
        config.width = width;
    }
    if let Some(height) = options.height {
        config.height = height;
    }
    if let Some(scale) = options.scale {
        config.scale = scale;
    }

    let backend: Arc<dyn Backend> = if options.terminal {
        Arc::new(TerminalBackend)
    } else {
        default_backend()
    };
    let mut lab = Lab::with_shared_backend(backend);
    lab.initialize_with(&config)?;

    draw_scene(&lab);
    lab.flush();

    loop {
        let key = lab.input_key();
        if key == Key::ESC {
            break;
        }
        if key.is_none() {
            continue;
        }
        info!("Key pressed: {} (0x{:04X})", key, key.code());
        // Flash a marker so the press is visible on screen
        lab.set_color(if key.is_virtual() { Palette::Green } else { Palette::Magenta });
        lab.draw_circle(lab.width() as i32 - 12, lab.height() as i32 - 12, 6);
        lab.flush();
        lab.delay(50);
        lab.set_color(Palette::Black);
        lab.draw_circle(lab.width() as i32 - 12, lab.height() as i32 - 12, 6);
        lab.flush();
    }

    lab.try_terminate()?;
    info!("labdemo finished");
    Ok(())
}
