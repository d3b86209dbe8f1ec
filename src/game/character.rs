//! Character movement and stat collaborators
//!
//! The reconciler never simulates movement itself; it drives a
//! [`CharacterMotor`] so remote characters move and turn with exactly the
//! logic used for the locally-controlled one.

use std::f32::consts::{PI, TAU};

use crate::game::input::MovementInput;
use crate::util::vec3::Vec3;

/// Movement / stat provider for one character
pub trait CharacterMotor {
    /// Current movement speed stat (units per second)
    fn current_speed(&self) -> f32;

    /// Overwrite the authoritative health and mana mirrors
    fn set_resources(&mut self, health: f32, mana: f32);

    fn health(&self) -> f32;

    /// Mana mirror, as of the last applied snapshot
    fn mana(&self) -> f32;

    /// Latest decoded input, for animation and facing
    fn set_input(&mut self, _input: MovementInput) {}

    /// One movement-integration step from `from`; returns the new position
    fn step(&mut self, from: Vec3, input: MovementInput, speed: f32, dt: f32) -> Vec3;

    /// Turn toward the current look point
    fn rotate_towards_look_point(&mut self, position: Vec3, dt: f32);
}

/// Movement on the XZ plane: vertical input drives Z, horizontal drives X
#[derive(Debug, Clone)]
pub struct PlanarMotor {
    pub speed: f32,
    pub health: f32,
    pub mana: f32,
    /// Point the character aims at; facing follows movement when unset
    pub look_point: Option<Vec3>,
    /// Maximum turn rate (radians per second)
    pub turn_rate: f32,
    yaw: f32,
    last_direction: Vec3,
}

impl PlanarMotor {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            health: 0.0,
            mana: 0.0,
            look_point: None,
            turn_rate: 4.0 * PI,
            yaw: 0.0,
            last_direction: Vec3::ZERO,
        }
    }

    /// Facing on the XZ plane in radians (0 = +Z)
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    fn direction(input: MovementInput) -> Vec3 {
        (Vec3::RIGHT * input.horizontal.value() + Vec3::FORWARD * input.vertical.value()).normalize()
    }
}

impl CharacterMotor for PlanarMotor {
    fn current_speed(&self) -> f32 {
        self.speed
    }

    fn set_resources(&mut self, health: f32, mana: f32) {
        self.health = health;
        self.mana = mana;
    }

    fn health(&self) -> f32 {
        self.health
    }

    fn mana(&self) -> f32 {
        self.mana
    }

    fn set_input(&mut self, input: MovementInput) {
        self.last_direction = Self::direction(input);
    }

    fn step(&mut self, from: Vec3, input: MovementInput, speed: f32, dt: f32) -> Vec3 {
        let direction = Self::direction(input);
        self.last_direction = direction;
        from + direction * (speed * dt)
    }

    fn rotate_towards_look_point(&mut self, position: Vec3, dt: f32) {
        let heading = match self.look_point {
            Some(point) => point - position,
            None => self.last_direction,
        };
        if heading.x * heading.x + heading.z * heading.z <= f32::EPSILON {
            return;
        }

        // Shortest signed angle to the desired heading, wrapped to [-PI, PI)
        let desired = heading.yaw();
        let diff = (desired - self.yaw + PI).rem_euclid(TAU) - PI;
        let max_turn = self.turn_rate * dt.max(0.0);
        self.yaw = (self.yaw + diff.clamp(-max_turn, max_turn) + PI).rem_euclid(TAU) - PI;
    }
}
