use anyhow::Result;
use clap::Parser;
use log::info;

use road_director::simulation::{SimWorld, TalkCommand, DEFAULT_VEHICLE_VELOCITY};

#[derive(Parser)]
#[command(name = "road_director")]
#[command(about = "Headless road vehicle direction simulation")]
struct Cli {
    /// Maximum number of simulation ticks to run
    #[arg(long, default_value = "3000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Seed for choosing destinations
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Move commands queued per vehicle
    #[arg(long, default_value = "3")]
    commands: u32,

    /// Vehicle speed in world units per second
    #[arg(long, default_value_t = DEFAULT_VEHICLE_VELOCITY)]
    velocity: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,road_director=info"),
    )
    .init();

    let cli = Cli::parse();
    run_headless(&cli)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(cli: &Cli) -> Result<()> {
    println!("Running road simulation in headless mode...");
    println!("Ticks: {}, Delta: {}s, Seed: {}", cli.ticks, cli.delta, cli.seed);

    // Calculate how many ticks equal 1 second of simulation time
    let ticks_per_second = (1.0 / cli.delta).ceil().max(1.0) as u32;
    println!();

    let mut world = SimWorld::create_test_world_with_seed(cli.seed);

    for vehicle in world.vehicle_ids() {
        for _ in 0..cli.commands {
            if let Some(destination) = world.random_destination() {
                world.command_vehicle(vehicle, destination, None, cli.velocity)?;
            }
        }
        let speaker = vehicle.to_string();
        world.enqueue(
            vehicle,
            Box::new(TalkCommand::new(speaker, "all orders carried out")),
        )?;
    }

    println!("Initial state:");
    world.print_summary();
    println!();

    let mut tick = 0;
    while tick < cli.ticks && !world.is_idle() {
        let ticks_to_run = ticks_per_second.min(cli.ticks - tick);
        for _ in 0..ticks_to_run {
            tick += 1;
            world.tick(cli.delta);
        }

        println!(
            "--- After tick {} ({:.1}s simulated time) ---",
            tick, world.time
        );
        world.print_summary();
        println!();
    }

    info!("=== SIMULATION COMPLETE ===");
    info!("Ticks run: {}", world.ticks);
    info!("All vehicles idle: {}", world.is_idle());

    println!("=== Final State ===");
    world.print_summary();
    Ok(())
}
