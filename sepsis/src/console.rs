//! Headless console for the simulation.
//!
//! A simple line-oriented protocol for playing at a terminal or driving
//! the engine from scripts:
//! - Lines starting with `#` are commands (status, token, load, log, quit)
//! - Every other line is a nurse action

use sepsis_core::{
    Engine, InfusionKind, LogEntry, SimConfig, SimulationState, TokenCodec, TurnResult,
};
use std::io::{self, BufRead, Write};

/// Run the console until `#quit` or end of input.
pub async fn run_console(config: &SimConfig) -> io::Result<()> {
    let engine = Engine::from_config(config);
    let codec = TokenCodec::new(&config.signature_secret);
    let mut state = engine.start().state;

    println!("=== Neutropenic Sepsis Simulation ===");
    print_entries(&state.log);
    print_vitals(&state);
    println!();
    print_help();
    println!();
    println!("Enter nurse actions (one per line):");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("status") => print_status(&state),
                Some("token") => match codec.encode(&state) {
                    Ok(token) => println!("[TOKEN] {token}"),
                    Err(e) => println!("[ERROR] {e}"),
                },
                Some("load") => match parts.get(1) {
                    Some(token) => match codec.decode(token) {
                        Ok(loaded) => {
                            state = loaded;
                            println!(
                                "[LOADED] Minute {}, outcome {}",
                                state.elapsed_minutes, state.outcome
                            );
                            print_vitals(&state);
                        }
                        Err(e) => println!("[ERROR] Load failed: {e}"),
                    },
                    None => println!("[ERROR] Usage: #load <token>"),
                },
                Some("log") => print_entries(&state.log),
                Some("restart") => {
                    let fresh = engine.start();
                    state = fresh.state;
                    println!("[RESTART] New patient handed off.");
                    print_entry(&fresh.log_entry);
                    print_vitals(&state);
                }
                Some("help") => print_help(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        if state.is_terminal() {
            println!(
                "[OUTCOME] The run has ended ({}). Type #restart for a new patient.",
                state.outcome
            );
            continue;
        }

        print!("[PROCESSING]");
        stdout.flush().ok();

        let TurnResult {
            state: next,
            log_entry,
        } = engine.advance_turn(Some(&state), Some(line)).await;
        state = next;

        print!("\r            \r");
        stdout.flush().ok();

        print_entry(&log_entry);
        print_vitals(&state);
        if state.is_terminal() {
            println!("[OUTCOME] {}", state.outcome.as_str().to_uppercase());
        }
        println!();
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  #status        - Vitals, labs, infusions, resources and flags");
    println!("  #token         - Print a token for the current state");
    println!("  #load <token>  - Resume from a token");
    println!("  #log           - Print the whole log");
    println!("  #restart       - Start over with a fresh patient");
    println!("  #help          - Show this help");
    println!("  #quit          - Exit");
    println!("  (anything else is a nurse action)");
}

fn print_entries(log: &[LogEntry]) {
    for entry in log {
        print_entry(entry);
    }
}

fn print_entry(entry: &LogEntry) {
    println!("[T+{}m] {}", entry.at_minute, entry.action);
    println!("  {}", entry.narration);
    for notice in &entry.notices {
        println!("  - {notice}");
    }
}

fn print_vitals(state: &SimulationState) {
    let v = &state.vitals;
    println!(
        "[VITALS] HR {} | BP {}/{} (MAP {}) | T {}°C | RR {} | SpO2 {}% | Lactate {}",
        v.heart_rate, v.systolic, v.diastolic, v.map, v.temperature_c, v.respiratory_rate, v.spo2,
        v.lactate
    );
}

fn print_status(state: &SimulationState) {
    let labs = &state.labs;
    let resources = &state.resources;
    let flags = &state.flags;

    println!("[STATUS]");
    println!("  Minute: {}", state.elapsed_minutes);
    println!("  Outcome: {}", state.outcome);
    print!("  ");
    print_vitals(state);
    println!(
        "  Presentation: {}, skin {}, urine {}",
        state.neuro, state.skin, state.urine_output_trend
    );
    println!(
        "  Labs: Hgb {} | Platelets {} | ANC {} | Creatinine {}",
        labs.hgb, labs.platelets, labs.anc, labs.creatinine
    );

    for kind in InfusionKind::ALL {
        let line = state.infusions.get(kind);
        if !line.active {
            continue;
        }
        match line.remaining_minutes {
            Some(left) => println!("  Running: {} ({left} min left)", kind.label()),
            None => println!("  Running: {}", kind.label()),
        }
    }

    println!(
        "  Resources: antibiotic {} | platelets {} | PRBC {}",
        availability(resources.antibiotic_available),
        availability(resources.platelet_available),
        if resources.prbc_eta_minutes == 0 {
            "on unit".to_string()
        } else {
            format!("ETA {} min", resources.prbc_eta_minutes)
        }
    );
    println!(
        "  Team: cultures {} | precautions {} | provider paged {} | rapid response {}",
        yes_no(flags.cultures_drawn),
        yes_no(flags.neutropenic_precautions),
        yes_no(flags.provider_paged),
        yes_no(flags.rapid_response_called)
    );
}

fn availability(available: bool) -> &'static str {
    if available {
        "available"
    } else {
        "used"
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
