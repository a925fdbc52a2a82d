//! ripple_flow — interactive entry point.

use ripple_flow::app::{run, LandmarkInput};
use ripple_flow::config::{self, AppConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Ripple Flow — pinch the air, play the particles       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut cfg = match flag_value(&args, "--config") {
        Some(path) => match config::parse_file(path) {
            Ok(c)  => c,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    if let Some(seed) = flag_value(&args, "--seed") {
        match seed.parse::<u64>() {
            Ok(s)  => cfg.particles.seed = Some(s),
            Err(_) => {
                eprintln!("Error: --seed expects an unsigned integer, got {:?}", seed);
                std::process::exit(1);
            }
        }
    }

    let input = if args.iter().any(|a| a == "--landmarks-stdin") {
        println!("  Hands: JSON landmark frames on stdin");
        LandmarkInput::Stdin
    } else {
        println!("  Hands: mouse simulation  (hold the left button to pinch)");
        LandmarkInput::Simulated
    };
    println!("  Keys:  Space start/stop   R reset   = / - volume   I instrument   Q quit");
    println!();

    if let Err(e) = run(cfg, input) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Value following `flag`, if both are present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
