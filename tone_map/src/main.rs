//! Prints the note bands for a canvas height and converts frequencies to
//! MIDI note + bend.

use tone_map::{GeneralMidi, MidiPitch, NoteTable};
use std::io::{self, Write};

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              Gesture Note Table                      ║");
    println!("║  top of canvas → low  |  bottom of canvas → high     ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let table = NoteTable::default();

    loop {
        println!("    1. Bands for a canvas height");
        println!("    2. Frequency → MIDI note");
        println!("    3. List instruments");
        println!("    q. Quit");
        match read_line("Choice: ").trim() {
            "1" => {
                let h: f32 = read_line("  Canvas height (default 600): ").trim().parse().unwrap_or(600.0);
                print_bands(&table, h);
            }
            "2" => {
                let hz: f32 = read_line("  Frequency Hz (default 440): ").trim().parse().unwrap_or(440.0);
                match MidiPitch::from_frequency(hz) {
                    Some(p) => println!("  {:.2} Hz → {} ({}), bend {}", hz, p.note, note_name(p.note), p.bend),
                    None    => println!("  ⚠  {} is not a playable frequency", hz),
                }
            }
            "3" => {
                for g in GeneralMidi::ALL {
                    println!("  {:>3}  {}", g.program(), g.name());
                }
            }
            "q" | "quit" => { println!("\nGoodbye!\n"); break; }
            _   => println!("  ⚠  Enter 1–3 or q.\n"),
        }
        println!();
    }
}

fn print_bands(table: &NoteTable, height: f32) {
    if !(height > 0.0) {
        println!("  ⚠  Height must be positive");
        return;
    }
    let band = height / table.len() as f32;
    for (i, &hz) in table.notes().iter().enumerate() {
        let name = MidiPitch::from_frequency(hz)
            .map(|p| note_name(p.note))
            .unwrap_or_else(|| "?".to_string());
        println!("  y {:>7.1} – {:>7.1}   {:<4} {:>7.2} Hz",
            i as f32 * band, (i + 1) as f32 * band, name, hz);
    }
}

fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[note as usize % 12], octave)
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
