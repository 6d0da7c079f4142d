//! Haunted House Example
//!
//! Demonstrates the three jalse crates together:
//! - an engine ticking at a fixed rate on a worker pool
//! - a world of entities holding typed attributes
//! - entity types giving those entities a typed surface
//!
//! Ghosts wail periodically; the house is spooky once it is haunted and
//! has at least one ghost.
//!
//! Run with `RUST_LOG=debug` to see engine and resolver lifecycle logs.

use jalse_engine::{
    Action, ActionContext, ActionResult, Engine, EngineConfig, ThreadPoolEngine, TimeUnit,
};
use jalse_entity::{AttributeContainer, AttributeType, EntityContainer, EntityId, Value, World};
use jalse_types::{
    Annotation, EntityProxy, EntityTypeDecl, EntityTypes, MethodSig, Return, ScheduleSpec,
    TypeRef,
};
use log::info;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long the simulation runs
const RUN_FOR: Duration = Duration::from_secs(1);

/// Milliseconds between two wails of the same ghost
const WAIL_PERIOD_MS: i64 = 100;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== JALSE Haunted House Example ===\n");

    let config = load_config()?;
    println!(
        "Engine: {} ticks/s on {} worker(s)\n",
        config.ticks_per_second(),
        config.worker_count()
    );
    let engine = Arc::new(ThreadPoolEngine::new(config)?);

    let types = declare_types()?;
    let validated = types.validate_tree(&"House".into())?;
    println!("Validated entity types: {:?}\n", validated);

    let world = World::new(engine.clone());
    let house = types.as_type(&world.new_entity()?, &"House".into())?;
    house.invoke("setHaunted", &[Value::Bool(true).into()])?;

    for name in ["Casper", "Slimer"] {
        let ghost = house
            .invoke("newGhost", &[EntityId::named(name).into()])?
            .into_entity()
            .ok_or("newGhost returned no ghost")?;
        ghost.invoke("setName", &[Value::from(name).into()])?;
        let task = ghost.invoke("haunt", &[])?.into_task();
        println!("  {} ({}) haunts as {:?}", name, ghost.id(), task);
    }
    println!(
        "\nSpooky: {:?}",
        house.invoke("isSpooky", &[])?.as_flag().unwrap_or(false)
    );

    println!("\nRunning for {:?}...\n", RUN_FOR);
    engine.tick()?;
    thread::sleep(RUN_FOR);
    engine.pause()?;

    let info = engine.tick_info();
    println!(
        "Ticks: {} (measured {} ticks/s, last delta {:?})",
        info.tick_count, info.current_tps, info.delta
    );
    for ghost in house.invoke("getGhosts", &[])?.into_entities() {
        let name = ghost.invoke("getName", &[])?.into_value();
        let wails = ghost
            .entity()
            .get_attribute("wails", AttributeType::Int)
            .and_then(|v| v.as_int())
            .unwrap_or(0);
        println!("  {:?} wailed {} time(s)", name, wails);
    }

    // Exorcise one ghost; its wailing stops with it.
    let casper = EntityId::named("Casper");
    house.invoke("exorcise", &[casper.into()])?;
    println!(
        "\nExorcised Casper; ghosts left: {}",
        house.entity().entity_count()
    );

    let abandoned = engine.stop();
    println!("Engine stopped ({:?}); {} task(s) abandoned", engine.state(), abandoned.len());

    world.shutdown();
    Ok(())
}

fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let paths = ["demos/haunted_house/data/engine.ron", "data/engine.ron"];
    for path in &paths {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            return Ok(EngineConfig::from_ron(&content)?);
        }
    }
    info!("no engine.ron found, using defaults");
    Ok(EngineConfig::with_ticks_per_second(20))
}

fn wail() -> Arc<dyn Action<EntityProxy>> {
    Arc::new(|ctx: &ActionContext<'_, EntityProxy>| -> ActionResult {
        let ghost = ctx.actor().entity();
        let wails = ghost
            .get_attribute("wails", AttributeType::Int)
            .and_then(|v| v.as_int())
            .unwrap_or(0)
            + 1;
        ghost.set_attribute("wails", AttributeType::Int, wails.into())?;
        info!(
            "{} wails (tick {})",
            ghost.id(),
            ctx.tick_info().tick_count
        );
        Ok(())
    })
}

fn declare_types() -> jalse_types::Result<EntityTypes> {
    let string = || TypeRef::Value(AttributeType::String);
    let flag = || TypeRef::Value(AttributeType::Bool);
    let ghost = || TypeRef::entity("Ghost");

    let types = EntityTypes::new();
    types.register(
        EntityTypeDecl::new("Ghost")
            .method(
                MethodSig::new("getName")
                    .returns(TypeRef::optional(string()))
                    .annotate(Annotation::GetAttribute(None)),
            )
            .method(
                MethodSig::new("setName")
                    .param(string())
                    .annotate(Annotation::SetAttribute(None)),
            )
            .method(
                MethodSig::new("haunt")
                    .returns(TypeRef::optional(TypeRef::Task))
                    .annotate(Annotation::ScheduleForActor(ScheduleSpec::new(
                        wail,
                        0,
                        WAIL_PERIOD_MS,
                        TimeUnit::Milliseconds,
                    ))),
            ),
    )?;
    types.register(
        EntityTypeDecl::new("House")
            .method(
                MethodSig::new("isHaunted")
                    .returns(TypeRef::optional(flag()))
                    .annotate(Annotation::GetAttribute(None)),
            )
            .method(
                MethodSig::new("setHaunted")
                    .param(flag())
                    .annotate(Annotation::SetAttribute(None)),
            )
            .method(
                MethodSig::new("newGhost")
                    .param(TypeRef::Id)
                    .returns(ghost())
                    .annotate(Annotation::NewEntity),
            )
            .method(
                MethodSig::new("getGhosts")
                    .returns(TypeRef::set(ghost()))
                    .annotate(Annotation::GetEntities { of_type: true }),
            )
            .method(
                MethodSig::new("exorcise")
                    .param(TypeRef::Id)
                    .returns(TypeRef::Flag)
                    .annotate(Annotation::KillEntity),
            )
            .method(
                MethodSig::new("isSpooky")
                    .returns(TypeRef::Flag)
                    .default_impl(|house, _| {
                        let haunted = house.invoke("isHaunted", &[])?.into_value();
                        let ghosts = house.invoke("getGhosts", &[])?.into_entities();
                        Ok(Return::Flag(
                            haunted == Some(Value::Bool(true)) && !ghosts.is_empty(),
                        ))
                    }),
            ),
    )?;
    Ok(types)
}
