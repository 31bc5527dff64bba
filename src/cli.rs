use std::{num::NonZeroUsize, time::Instant};

use anyhow::Context as _;
use clap::Parser;
use indicatif::ProgressBar;
use minicull::{
    Camera, CullingSettings, FrameCameras, Projection, WorkerCount,
    geometry::{SimdFloatType, WorldPoint, WorldVector},
    run_frame,
    scene::random::{RandomSceneSettings, jitter, random_scene},
    util::{Stats, simba::LaneFloat},
};
use rand::{SeedableRng, rngs::SmallRng};

#[derive(Parser, Debug)]
#[command(name = "minicull-cli")]
#[command(about = "Culls a random scene for a number of frames and prints statistics")]
struct Args {
    /// Number of renderable entities
    #[arg(long, default_value_t = 100_000)]
    entities: usize,

    /// Number of point and spot lights
    #[arg(long, default_value_t = 500)]
    lights: usize,

    #[arg(long, default_value_t = 1)]
    directional_lights: usize,

    /// Number of shadow casting cameras besides the main one
    #[arg(long, default_value_t = 2)]
    shadow_cameras: usize,

    #[arg(long, default_value_t = 100)]
    frames: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads for light list building, all CPUs when not given
    #[arg(long)]
    workers: Option<NonZeroUsize>,

    #[arg(long, default_value_t = 8)]
    max_lights: usize,

    /// Process one entity at a time instead of eight
    #[arg(long)]
    scalar: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    if args.scalar {
        run::<f32>(&args)
    } else {
        run::<SimdFloatType>(&args)
    }
}

fn run<T: LaneFloat>(args: &Args) -> anyhow::Result<()> {
    let scene_settings = RandomSceneSettings {
        entity_count: args.entities,
        point_light_count: args.lights,
        directional_light_count: args.directional_lights,
        seed: args.seed,
        ..Default::default()
    };
    let extent = scene_settings.extent;

    let started = Instant::now();
    let mut scene = random_scene::<T>(&scene_settings);
    log::info!("generated scene in {:.2?}", started.elapsed());
    scene.print_statistics();

    let cameras = cameras(extent, args.shadow_cameras);
    let settings = CullingSettings {
        max_lights_per_entity: args.max_lights,
        worker_count: args.workers.map_or(WorkerCount::Auto, WorkerCount::Manual),
    };

    let mut rng = SmallRng::seed_from_u64(args.seed.wrapping_add(1));
    let mut visible_entities = Stats::default();
    let mut visible_lights = Stats::default();
    let mut last_stats = None;

    let bar = ProgressBar::new(args.frames as u64);
    let started = Instant::now();
    for _ in 0..args.frames {
        jitter(&mut scene, &mut rng, 0.1);
        let frame = run_frame(&scene, &cameras, &settings);
        visible_entities.add_sample(frame.stats.visible_entities);
        visible_lights.add_sample(frame.stats.visible_lights);
        last_stats = Some(frame.stats);
        bar.inc(1);
    }
    bar.finish_and_clear();
    let elapsed = started.elapsed();

    let last_stats = last_stats.context("No frames were run")?;
    println!("{last_stats}");
    println!("visible entities per frame: {visible_entities}");
    println!("visible lights per frame: {visible_lights}");
    println!(
        "{} frames in {:.2?} ({:.2?} per frame, including animation)",
        args.frames,
        elapsed,
        elapsed / args.frames as u32
    );

    Ok(())
}

fn cameras(extent: f32, shadow_count: usize) -> FrameCameras {
    let main = Camera::builder()
        .position(WorldPoint::new(0.0, 0.0, extent))
        .forward(-WorldVector::z())
        .up(WorldVector::y())
        .projection(Projection::Perspective {
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
        })
        .near(0.1)
        .far(extent * 2.0)
        .build();

    let mut cameras = FrameCameras::new(main);
    cameras.shadow = (0..shadow_count)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::TAU / shadow_count as f32;
            let direction = WorldVector::new(angle.cos(), -1.0, angle.sin()).normalize();
            Camera::builder()
                .position(WorldPoint::origin() - direction * extent * 2.0)
                .forward(direction)
                .up(WorldVector::y())
                .projection(Projection::Orthographic {
                    width: extent * 2.0,
                    height: extent * 2.0,
                })
                .near(1.0)
                .far(extent * 4.0)
                .shadow_pass(true)
                .build()
        })
        .collect();
    cameras
}
