//! CLI demo host (spec.md §6's "strictly outside the kernel" surface).
//! Exercises pathfinding on a generated room, or drives a handful of
//! turns of a tiny FSM-driven encounter, and prints the result to
//! stdout. Grounded on `georgehyde-dot-dynamic_pathfinding`'s `Config`
//! (a `clap::Parser` struct read straight off argv) and
//! `osquera-mapf`'s `tracing_subscriber::registry()` logging setup.

use anyhow::{bail, Result};
use clap::Parser;
use rogue_kernel::agent::{
    Action, ActionBudget, HitPoints, MeleeDamage, MovePos, Position, Team,
};
use rogue_kernel::ai_library::{ChaseState, EnemyWithinDistance, PatrolState};
use rogue_kernel::config::KernelConfig;
use rogue_kernel::fsm::Fsm;
use rogue_kernel::grid::{Coord, Grid, TileKind};
use rogue_kernel::pathfinding::{
    find_hierarchical_path, find_path_astar, find_path_ida, prebuild_portals, AraStar,
};
use rogue_kernel::turn::{process_turn, DecisionCore, TurnCounter};
use rogue_kernel::world::EcsWorld;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct DemoArgs {
    /// Grid width of the generated demo room.
    #[arg(long, default_value_t = 20)]
    width: usize,

    /// Grid height of the generated demo room.
    #[arg(long, default_value_t = 20)]
    height: usize,

    /// astar | ida | ara | hierarchical | turns
    #[arg(long, default_value = "astar")]
    mode: String,

    /// A* weight (1.0 = optimal).
    #[arg(long, default_value_t = 1.5)]
    weight: f32,

    /// Number of turns to simulate in `turns` mode.
    #[arg(long, default_value_t = 10)]
    turns: u32,

    /// Path to a RON `KernelConfig` file; falls back to defaults.
    #[arg(long, default_value = "kernel_config.ron")]
    config: String,
}

/// A room bordered by walls, otherwise open floor.
fn bordered_room(width: usize, height: usize) -> Grid {
    let mut tiles = vec![TileKind::Floor; width * height];
    for x in 0..width {
        tiles[x] = TileKind::Wall;
        tiles[(height - 1) * width + x] = TileKind::Wall;
    }
    for y in 0..height {
        tiles[y * width] = TileKind::Wall;
        tiles[y * width + width - 1] = TileKind::Wall;
    }
    Grid::new(width, height, tiles).expect("bordered room dimensions match the tile buffer")
}

fn run_path_demo(args: &DemoArgs, config: &KernelConfig) -> Result<()> {
    let grid = bordered_room(args.width, args.height);
    let start = Coord::new(1, 1);
    let goal = Coord::new((args.width - 2) as i32, (args.height - 2) as i32);

    let path = match args.mode.as_str() {
        "astar" => find_path_astar(&grid, start, goal, args.weight),
        "ida" => find_path_ida(&grid, start, goal),
        "ara" => {
            let mut ara = AraStar::new(grid.width, grid.height);
            let mut epsilon = config.ara_epsilon_start;
            let mut path = Vec::new();
            while epsilon >= config.ara_epsilon_floor {
                path = ara.iteration(&grid, start, goal, epsilon);
                epsilon -= config.ara_epsilon_step;
            }
            path
        }
        "hierarchical" => {
            let portals = prebuild_portals(&grid, config)?;
            find_hierarchical_path(&portals, &grid, start, goal)
        }
        other => bail!("unknown pathfinding mode {other:?}"),
    };

    if path.is_empty() {
        println!("no path found from {start:?} to {goal:?}");
    } else {
        println!("path of {} steps:", path.len());
        for c in &path {
            println!("  ({}, {})", c.x, c.y);
        }
    }
    Ok(())
}

/// A player standing still and a single chaser: enough to exercise the
/// turn loop's decision-core gating, movement resolution, and melee.
fn run_turn_demo(args: &DemoArgs) -> Result<()> {
    let grid = bordered_room(args.width, args.height);
    let mut world = EcsWorld::new(grid);

    let player = world
        .ecs
        .spawn((
            Team::Player,
            Position(Coord::new(2, 2)),
            MovePos(Coord::new(2, 2)),
            Action::MoveRight,
            HitPoints(100.0),
            MeleeDamage(5.0),
            ActionBudget::new(1),
        ))
        .id();

    let monster = world
        .ecs
        .spawn((
            Team::Monster,
            Position(Coord::new(6, 6)),
            MovePos(Coord::new(6, 6)),
            Action::Nop,
            HitPoints(20.0),
            MeleeDamage(3.0),
        ))
        .id();

    let mut fsm: Fsm<EcsWorld> = Fsm::new();
    let patrol = fsm.add_state(Box::new(PatrolState));
    let chase = fsm.add_state(Box::new(ChaseState { target: player }));
    let sees_player = fsm
        .predicates_mut()
        .leaf(Box::new(EnemyWithinDistance(8.0)));
    fsm.add_transition(sees_player, patrol, chase);
    world.set_core(monster, DecisionCore::Fsm(fsm));
    world.reset_core(monster);

    let mut turn = TurnCounter::default();
    for _ in 0..args.turns {
        if !world.has_core(monster) {
            break;
        }
        *world.ecs.get_mut::<Action>(player).unwrap() = Action::MoveRight;
        process_turn(&mut world, &mut turn);
        if let Some(pos) = world.ecs.get::<Position>(player).map(|p| p.0) {
            println!("turn {}: player at ({}, {})", turn.0, pos.x, pos.y);
        }
    }

    println!("ran {} turns", turn.0);
    Ok(())
}

fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::daily("logs", "rogue_kernel.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rogue_kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    let args = DemoArgs::parse();
    let config = KernelConfig::load_or_default(&args.config)?;

    if args.mode == "turns" {
        run_turn_demo(&args)
    } else {
        run_path_demo(&args, &config)
    }
}
