//! World Catalog: the two static level blueprints (W1 parkour, W2 danger
//! buttons) and the mutable [`WorldRuntime`] produced from them at the
//! start of every round.
//!
//! The catalog never hands out the blueprint itself, only
//! [`clone_runtime`], a deep copy the simulator is free to mutate.

use shared::Aabb;

#[derive(Debug, Clone)]
pub struct MovingPlatform {
    pub aabb: Aabb,
    pub start_x: f32,
    pub end_x: f32,
    pub speed: f32,
    pub direction: f32,
    pub delta_x: f32,
}

#[derive(Debug, Clone)]
pub struct FallingPlatform {
    pub aabb: Aabb,
    pub original_y: f32,
    pub falling: bool,
    pub fall_timer: u32,
}

/// A mutable, per-round deep clone of a blueprint. The simulator mutates
/// this freely; the catalog's blueprint constructors are never touched
/// after a round starts.
#[derive(Debug, Clone)]
pub struct WorldRuntime {
    pub id: u8,
    pub width: f32,
    pub ground_y: f32,
    pub has_global_floor: bool,
    pub stop_on_release: bool,
    pub gravity: f32,
    pub move_speed: f32,
    pub jump_force: f32,
    pub max_fall_speed: f32,
    pub friction: f32,
    pub platforms: Vec<Aabb>,
    pub moving_platforms: Vec<MovingPlatform>,
    pub falling_platforms: Vec<FallingPlatform>,
    pub key: Aabb,
    pub door: Aabb,
    pub danger_buttons: Vec<Aabb>,
}

impl WorldRuntime {
    /// Collidable platforms for a physics step: static platforms, moving
    /// platforms, and any falling platform that hasn't dropped out of
    /// collision range yet (spec.md §4.3 step 3).
    pub fn collidables(&self) -> Vec<Aabb> {
        let mut out: Vec<Aabb> = self.platforms.clone();
        out.extend(self.moving_platforms.iter().map(|m| m.aabb));
        out.extend(
            self.falling_platforms
                .iter()
                .filter(|f| f.aabb.y < self.ground_y + 300.0)
                .map(|f| f.aabb),
        );
        out
    }

    /// Spawn position for a given slot (1-indexed), resting atop the first
    /// static platform at that slot's x offset, or on the global floor for
    /// World 2.
    pub fn spawn_for_slot(&self, slot: u8) -> (f32, f32) {
        let x = 100.0 + (slot.saturating_sub(1) as f32) * 80.0;
        let y = if self.has_global_floor {
            self.ground_y - shared::PLAYER_HEIGHT
        } else {
            self.platforms
                .iter()
                .find(|p| x >= p.x && x <= p.right())
                .map(|p| p.top() - shared::PLAYER_HEIGHT)
                .unwrap_or(self.ground_y - shared::PLAYER_HEIGHT)
        };
        (x, y)
    }
}

/// World 1 ("parkour"): wide static course, no global floor, velocity
/// persists horizontally until blocked (`friction = 1`).
fn blueprint_world1() -> WorldRuntime {
    let platforms = vec![
        Aabb::new(0.0, 600.0, 300.0, 40.0),
        Aabb::new(450.0, 560.0, 180.0, 40.0),
        Aabb::new(750.0, 500.0, 180.0, 40.0),
        Aabb::new(1050.0, 560.0, 220.0, 40.0),
        Aabb::new(1400.0, 600.0, 260.0, 40.0),
        Aabb::new(1800.0, 560.0, 200.0, 40.0),
        Aabb::new(2150.0, 600.0, 260.0, 40.0),
        Aabb::new(2500.0, 560.0, 220.0, 40.0),
        Aabb::new(2850.0, 600.0, 260.0, 40.0),
        Aabb::new(3200.0, 560.0, 260.0, 40.0),
        Aabb::new(3550.0, 600.0, 260.0, 40.0),
        Aabb::new(3900.0, 560.0, 260.0, 40.0),
        Aabb::new(4250.0, 600.0, 260.0, 40.0),
        Aabb::new(4600.0, 560.0, 260.0, 40.0),
        Aabb::new(4950.0, 600.0, 260.0, 40.0),
        Aabb::new(5300.0, 560.0, 300.0, 40.0),
        Aabb::new(5700.0, 600.0, 300.0, 40.0),
    ];

    WorldRuntime {
        id: 1,
        width: 6000.0,
        ground_y: 900.0,
        has_global_floor: false,
        stop_on_release: false,
        gravity: 0.7,
        move_speed: 5.5,
        jump_force: -14.0,
        max_fall_speed: 18.0,
        friction: 1.0,
        platforms,
        moving_platforms: vec![MovingPlatform {
            aabb: Aabb::new(1650.0, 480.0, 140.0, 24.0),
            start_x: 1650.0,
            end_x: 1950.0,
            speed: 1.5,
            direction: 1.0,
            delta_x: 0.0,
        }],
        falling_platforms: vec![FallingPlatform {
            aabb: Aabb::new(2650.0, 540.0, 140.0, 24.0),
            original_y: 540.0,
            falling: false,
            fall_timer: 0,
        }],
        key: Aabb::new(1950.0, 535.0, 40.0, 40.0),
        door: Aabb::new(3030.0, 525.0, 55.0, 75.0),
        danger_buttons: Vec::new(),
    }
}

/// World 2 ("danger buttons"): single global floor strip, player velocity
/// snaps to zero on release while grounded (`stop_on_release = true`), 31
/// evenly spaced hazards.
fn blueprint_world2(base_y: i32) -> WorldRuntime {
    let ground_y = base_y as f32;
    let width = 8200.0;

    let hazard_count = 31;
    let span_start = 300.0;
    let span_end = width - 300.0;
    let step = (span_end - span_start) / (hazard_count as f32 - 1.0);
    let danger_buttons = (0..hazard_count)
        .map(|i| Aabb::new(span_start + step * i as f32, ground_y - 24.0, 40.0, 24.0))
        .collect();

    WorldRuntime {
        id: 2,
        width,
        ground_y,
        has_global_floor: true,
        stop_on_release: true,
        gravity: 0.7,
        move_speed: 5.5,
        jump_force: -14.0,
        max_fall_speed: 18.0,
        friction: 0.85,
        platforms: Vec::new(),
        moving_platforms: vec![MovingPlatform {
            aabb: Aabb::new(4000.0, ground_y - 220.0, 160.0, 24.0),
            start_x: 3600.0,
            end_x: 4600.0,
            speed: 2.0,
            direction: 1.0,
            delta_x: 0.0,
        }],
        falling_platforms: vec![FallingPlatform {
            aabb: Aabb::new(6200.0, ground_y - 160.0, 160.0, 24.0),
            original_y: ground_y - 160.0,
            falling: false,
            fall_timer: 0,
        }],
        key: Aabb::new(width / 2.0, ground_y - 120.0, 40.0, 40.0),
        door: Aabb::new(width - 180.0, ground_y - 135.0, 55.0, 75.0),
        danger_buttons,
    }
}

pub const WORLD2_BASE_Y_MIN: i32 = 500;
pub const WORLD2_BASE_Y_MAX: i32 = 1400;

pub fn clamp_world2_base_y(base_y: i32) -> i32 {
    base_y.clamp(WORLD2_BASE_Y_MIN, WORLD2_BASE_Y_MAX)
}

/// Deep-clones the blueprint for `world_id` (1 or 2; any other value
/// normalizes to 1). `world2_base_y` only matters for World 2.
pub fn clone_runtime(world_id: u8, world2_base_y: i32) -> WorldRuntime {
    match world_id {
        2 => blueprint_world2(clamp_world2_base_y(world2_base_y)),
        _ => blueprint_world1(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world1_has_no_global_floor_and_unit_friction() {
        let w = clone_runtime(1, 820);
        assert!(!w.has_global_floor);
        assert_eq!(w.friction, 1.0);
        assert_eq!(w.key, Aabb::new(1950.0, 535.0, 40.0, 40.0));
        assert_eq!(w.door, Aabb::new(3030.0, 525.0, 55.0, 75.0));
    }

    #[test]
    fn world2_has_global_floor_and_31_hazards() {
        let w = clone_runtime(2, 820);
        assert!(w.has_global_floor);
        assert!(w.stop_on_release);
        assert_eq!(w.danger_buttons.len(), 31);
    }

    #[test]
    fn unknown_world_id_normalizes_to_world1() {
        let w = clone_runtime(99, 820);
        assert_eq!(w.id, 1);
    }

    #[test]
    fn base_y_clamped_to_spec_range() {
        assert_eq!(clamp_world2_base_y(100), WORLD2_BASE_Y_MIN);
        assert_eq!(clamp_world2_base_y(5000), WORLD2_BASE_Y_MAX);
        assert_eq!(clamp_world2_base_y(900), 900);
    }

    #[test]
    fn clone_runtime_is_a_deep_copy() {
        let mut a = clone_runtime(1, 820);
        let b = clone_runtime(1, 820);
        a.platforms.push(Aabb::new(0.0, 0.0, 1.0, 1.0));
        assert_ne!(a.platforms.len(), b.platforms.len());
    }
}
