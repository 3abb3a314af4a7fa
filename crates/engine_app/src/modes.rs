//! Demo modes installed by the host.
//!
//! `Movement` integrates velocity into position, `Jitter` nudges entities
//! tagged with `JITTERBUG` by a seeded random amount, and `Spawner` creates
//! entities in response to `spawn` events.

use engine_core::{Engine, EngineError, EntityView, Mode, SystemContext};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Value, json};
use tracing::{debug, info};

pub const POSITION: &str = "POSITION";
pub const VELOCITY: &str = "VELOCITY";
pub const JITTERBUG: &str = "JITTERBUG";

/// Event asking the spawner for a new entity. Payload fields: `vx`, `vy`,
/// and an optional `jitter` amount.
pub const SPAWN: &str = "spawn";

/// Velocity integration with a fixed time step.
pub struct Movement {
    dt: f64,
}

impl Movement {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl Mode for Movement {
    fn name(&self) -> &str {
        "movement"
    }

    fn install(self, engine: &mut Engine) -> Result<(), EngineError> {
        engine.register_component(POSITION, json!({"x": 0.0, "y": 0.0}))?;
        engine.register_component(VELOCITY, json!({"x": 0.0, "y": 0.0}))?;

        let dt = self.dt;
        engine.register_system("movement", [POSITION, VELOCITY], move |_ctx| {
            move |_ctx: &mut SystemContext<'_>, view: &mut EntityView<'_>| -> anyhow::Result<()> {
                let (vx, vy) = match view.at(1) {
                    Some(velocity) => (velocity.get_f64("x")?, velocity.get_f64("y")?),
                    None => return Ok(()),
                };
                if let Some(position) = view.at_mut(0) {
                    let x = position.get_f64("x")?;
                    let y = position.get_f64("y")?;
                    position.set("x", x + vx * dt)?;
                    position.set("y", y + vy * dt)?;
                }
                Ok(())
            }
        })
    }
}

/// Random positional noise for `JITTERBUG` entities.
pub struct Jitter {
    seed: u64,
}

impl Jitter {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Mode for Jitter {
    fn name(&self) -> &str {
        "jitter"
    }

    fn install(self, engine: &mut Engine) -> Result<(), EngineError> {
        engine.register_component(JITTERBUG, json!({"amount": 0.0}))?;

        let seed = self.seed;
        engine.register_system("jitter", [JITTERBUG, POSITION], move |ctx| {
            debug!(seed, tick_id = ctx.tick_id(), "jitter rng seeded");
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            move |_ctx: &mut SystemContext<'_>, view: &mut EntityView<'_>| -> anyhow::Result<()> {
                let amount = match view.get(JITTERBUG) {
                    Some(bug) => bug.get_f64("amount")?,
                    None => return Ok(()),
                };
                if amount <= 0.0 {
                    return Ok(());
                }
                if let Some(position) = view.get_mut(POSITION) {
                    let x = position.get_f64("x")?;
                    let y = position.get_f64("y")?;
                    position.set("x", x + rng.gen_range(-amount..=amount))?;
                    position.set("y", y + rng.gen_range(-amount..=amount))?;
                }
                Ok(())
            }
        })
    }
}

/// Creates entities from `spawn` events.
pub struct Spawner;

impl Mode for Spawner {
    fn name(&self) -> &str {
        "spawner"
    }

    fn install(self, engine: &mut Engine) -> Result<(), EngineError> {
        engine.on(SPAWN, |ctx, payload| {
            let field = |name: &str| payload.get(name).and_then(Value::as_f64).unwrap_or(0.0);
            let entity = ctx.create_entity();
            ctx.add_component(entity, POSITION)?;
            ctx.add_component_with(entity, VELOCITY, json!({"x": field("vx"), "y": field("vy")}))?;
            let jitter = field("jitter");
            if jitter > 0.0 {
                ctx.add_component_with(entity, JITTERBUG, json!({"amount": jitter}))?;
            }
            info!(entity = %entity, jitter, "spawned entity");
            Ok(())
        });
        Ok(())
    }
}
