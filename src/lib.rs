pub mod client;
pub mod commands;
pub mod config;
pub mod entities;
pub mod error;
pub mod net;
pub mod proto;
pub mod telemetry;
pub mod world;

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use client::movement::{DEFAULT_RUN_SPEED, DEFAULT_WALK_SPEED};
use client::Client;
use commands::{parse_command, Command, HELP_TEXT};
use config::{load_instances, CliAction, CliOptions, USAGE};
use error::ClientError;

const TICK_INTERVAL: Duration = Duration::from_millis(16);
const PUMP_SLEEP: Duration = Duration::from_millis(1);

pub fn run(args: &[String]) -> Result<(), String> {
    let options = match CliOptions::from_args(args).map_err(|err| err.to_string())? {
        CliAction::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        CliAction::Run(options) => options,
    };

    telemetry::logging::init(Path::new("."))?;
    let instances = load_instances(&options.config_path).map_err(|err| err.to_string())?;
    println!(
        "Starting headless client: debug level {}, config {}, pathfinding {}",
        options.debug_level,
        options.config_path.display(),
        if options.pathfinding { "enabled" } else { "disabled" }
    );

    let mut clients = Vec::new();
    for instance in instances {
        let mut client = Client::new(instance, options.debug_level, options.pathfinding);
        client.start().map_err(|err| err.to_string())?;
        clients.push(Arc::new(Mutex::new(client)));
    }

    let running = Arc::new(AtomicBool::new(true));
    let command_queue: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));

    // Input thread: reads stdin lines into the shared queue. The only state
    // it touches is the queue and its mutex.
    let input_thread = {
        let running = running.clone();
        let command_queue = command_queue.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut stdin_closed = false;
            while running.load(Ordering::SeqCst) {
                if stdin_closed {
                    std::thread::sleep(Duration::from_millis(100));
                    continue;
                }
                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) => stdin_closed = true,
                    Ok(_) => {
                        let line = line.trim().to_string();
                        if !line.is_empty() {
                            let mut queue =
                                command_queue.lock().unwrap_or_else(|err| err.into_inner());
                            queue.push_back(line);
                        }
                    }
                    Err(_) => stdin_closed = true,
                }
            }
        })
    };

    // Command thread: executes commands serially against the first client;
    // movement commands block on the move gate until travel completes.
    let command_thread = {
        let running = running.clone();
        let command_queue = command_queue.clone();
        let client = clients[0].clone();
        std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let line = {
                    let mut queue = command_queue.lock().unwrap_or_else(|err| err.into_inner());
                    queue.pop_front()
                };
                match line {
                    Some(line) => execute_line(&line, &client, &running),
                    None => std::thread::sleep(Duration::from_millis(50)),
                }
            }
        })
    };

    println!("\nHeadless client ready. Type 'help' for commands.");

    // Main pump: drives all sessions and the 60 Hz movement tick.
    let mut announced = false;
    let mut last_tick = Instant::now();
    while running.load(Ordering::SeqCst) {
        for client in &clients {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.pump();
        }
        let now = Instant::now();
        if now.duration_since(last_tick) >= TICK_INTERVAL {
            for client in &clients {
                let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
                client.tick(now);
            }
            last_tick = now;
        }
        if !announced {
            let zoned = {
                let client = clients[0].lock().unwrap_or_else(|err| err.into_inner());
                client.fully_zoned_in()
            };
            if zoned {
                println!("Fully connected to zone. Processing commands now.");
                announced = true;
            }
        }
        std::thread::sleep(PUMP_SLEEP);
    }

    let _ = input_thread.join();
    let _ = command_thread.join();
    Ok(())
}

fn execute_line(line: &str, client: &Arc<Mutex<Client>>, running: &Arc<AtomicBool>) {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(err) => {
            println!("{}", err);
            return;
        }
    };
    if let Err(err) = execute_command(command, client, running) {
        println!("{}", err);
    }
}

fn execute_command(
    command: Command,
    client: &Arc<Mutex<Client>>,
    running: &Arc<AtomicBool>,
) -> Result<(), ClientError> {
    match command {
        Command::Help => println!("{}", HELP_TEXT),
        Command::Quit => running.store(false, Ordering::SeqCst),
        Command::Debug(level) => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.set_debug_level(level);
            println!("Debug level set to {}", level);
        }
        Command::Chat {
            channel,
            target,
            message,
        } => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.send_chat(channel, &target, &message)?;
        }
        Command::Move { x, y, z } => {
            let gate = {
                let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
                client.move_to(x, y, z)?;
                client.move_gate()
            };
            gate.wait_until_idle(|| running.load(Ordering::SeqCst));
        }
        Command::MoveTo(name) => {
            let gate = {
                let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
                client.move_to_entity(&name)?;
                client.move_gate()
            };
            gate.wait_until_idle(|| running.load(Ordering::SeqCst));
        }
        Command::Follow(name) => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            let resolved = client.follow(&name)?;
            println!("Following {}", resolved);
        }
        Command::StopFollow => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            match client.stop_follow() {
                Some(previous) => println!("Stopped following {}", previous),
                None => println!("Not following anyone"),
            }
        }
        Command::FaceCoord { x, y, z } => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.face(x, y, z)?;
        }
        Command::FaceEntity(name) => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.face_entity(&name)?;
        }
        Command::Turn(degrees) => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.turn(degrees)?;
            println!("Turned to heading {:.1} degrees", degrees.rem_euclid(360.0));
        }
        Command::Loc => {
            let client = client.lock().unwrap_or_else(|err| err.into_inner());
            let (position, heading) = client.location();
            println!(
                "Current position: ({:.2}, {:.2}, {:.2}) heading {:.1}",
                position.x, position.y, position.z, heading
            );
        }
        Command::List(search) => {
            let client = client.lock().unwrap_or_else(|err| err.into_inner());
            let listing = client.list_entities(search.as_deref())?;
            println!("{}", listing);
        }
        Command::Walk => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.set_move_speed(DEFAULT_WALK_SPEED);
            println!("Movement speed set to walk");
        }
        Command::Run => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            client.set_move_speed(DEFAULT_RUN_SPEED);
            println!("Movement speed set to run");
        }
        Command::Pathfinding(state) => {
            let mut client = client.lock().unwrap_or_else(|err| err.into_inner());
            match state {
                Some(enabled) => {
                    client.set_pathfinding(enabled);
                    println!(
                        "Pathfinding {}",
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
                None => println!(
                    "Pathfinding is {}",
                    if client.pathfinding_enabled() {
                        "enabled"
                    } else {
                        "disabled"
                    }
                ),
            }
        }
    }
    Ok(())
}
