//! Terminal explorer for the flow field: prints heading maps and runs the
//! particle model headless.

use flow_field::{Bounds, NoiseField, ParticleConfig, ParticleField, Vec2};
use std::io::{self, Write};

const ARROWS: [char; 8] = ['→', '↘', '↓', '↙', '←', '↖', '↑', '↗'];

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              Flow Field Explorer                     ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let seed: u64 = read_line("  Seed (default 1): ").trim().parse().unwrap_or(1);
    let mut field = ParticleField::new(
        ParticleConfig::default(),
        Bounds::new(800.0, 600.0, 50.0),
        Some(seed),
    );

    loop {
        println!("  ┌──────────────────────────────────────────────────────┐");
        println!("  │  1. Heading map                                      │");
        println!("  │  2. Raw noise map                                    │");
        println!("  │  3. Run N ticks (energy, bass)                       │");
        println!("  │  4. Reset field                                      │");
        println!("  └──────────────────────────────────────────────────────┘");
        let choice = read_line("Command (q to quit): ");

        match choice.trim() {
            "q" | "Q" => { println!("\nGoodbye!\n"); break; }
            "1" => print_heading_map(&field),
            "2" => print_noise_map(&field.flow().noise),
            "3" => {
                let n: usize = read_line("  Ticks (default 60): ").trim().parse().unwrap_or(60);
                let energy: f32 = read_line("  Energy 0–255 (default 0): ").trim().parse().unwrap_or(0.0);
                let bass: f32 = read_line("  Bass 0–255 (default 0): ").trim().parse().unwrap_or(0.0);
                let mut wrapped = 0;
                for _ in 0..n.min(100_000) {
                    wrapped += field.update(energy, bass);
                }
                let mean_speed = field.particles().iter()
                    .map(|p| p.velocity.length())
                    .sum::<f32>() / field.len().max(1) as f32;
                println!("  {} ticks, {} wraps, mean speed {:.3}", n, wrapped, mean_speed);
            }
            "4" => {
                field.reset();
                println!("  Reset, flow scale now {:.1}", field.flow().scale);
            }
            _ => println!("  ⚠  Please enter 1–4 or q.\n"),
        }
    }
}

fn print_heading_map(field: &ParticleField) {
    let flow = field.flow();
    println!("  scale = {:.1}", flow.scale);
    for row in 0..15 {
        print!("  ");
        for col in 0..40 {
            let pos = Vec2::new(col as f32 * 20.0, row as f32 * 40.0);
            let h = flow.heading(pos).rem_euclid(std::f32::consts::TAU);
            let idx = ((h / std::f32::consts::TAU) * 8.0).round() as usize % 8;
            print!("{}", ARROWS[idx]);
        }
        println!();
    }
}

fn print_noise_map(noise: &NoiseField) {
    const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];
    for row in 0..15 {
        print!("  ");
        for col in 0..60 {
            let v = noise.sample(col as f32 * 0.08, row as f32 * 0.16);
            print!("{}", SHADES[((v * 5.0) as usize).min(4)]);
        }
        println!();
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
