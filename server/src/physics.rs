//! The per-tick simulation core: moving/falling platform advancement,
//! one player's physics step, and player-vs-player stacking resolution.
//!
//! Every function here is pure with respect to wallclock time. Callers
//! pass in `dtScale`, already clamped by the scheduler.

use crate::world::WorldRuntime;
use shared::{Aabb, InputFrame, PlayerState};

/// Advances moving and falling platforms one tick. Must run before any
/// player steps so players land on this tick's platform positions, not
/// last tick's.
pub fn advance_world(world: &mut WorldRuntime, dt_scale: f32) {
    for mp in world.moving_platforms.iter_mut() {
        let delta = mp.speed * mp.direction * dt_scale;
        mp.aabb.x += delta;
        mp.delta_x = delta;

        let lo = mp.start_x.min(mp.end_x);
        let hi = mp.start_x.max(mp.end_x);
        if mp.aabb.x <= lo {
            mp.aabb.x = lo;
            mp.direction = mp.direction.abs();
        } else if mp.aabb.x >= hi {
            mp.aabb.x = hi;
            mp.direction = -mp.direction.abs();
        }
    }

    for fp in world.falling_platforms.iter_mut() {
        if fp.falling {
            fp.fall_timer += 1;
            if fp.fall_timer > 30 {
                fp.aabb.y += 8.0 * dt_scale;
            }
        }
    }
}

/// Runs one player's physics step. Returns `true` if the player fell out
/// of the world this tick; the caller (the round evaluator) is
/// responsible for the resulting death transition.
pub fn step_player(player: &mut PlayerState, input: InputFrame, world: &mut WorldRuntime, dt_scale: f32) -> bool {
    apply_intent(player, input, world, dt_scale);

    if input.jump && player.on_ground {
        player.vy = world.jump_force;
        player.on_ground = false;
    }

    resolve_horizontal(player, world, dt_scale);

    let prev_y = player.y;
    player.prev_y = prev_y;
    player.vy += world.gravity * dt_scale;
    player.vy = player.vy.min(world.max_fall_speed);
    player.y += player.vy * dt_scale;
    player.on_ground = false;

    resolve_vertical(player, world, prev_y);

    if world.has_global_floor && player.y + player.height > world.ground_y {
        player.y = world.ground_y - player.height;
        player.vy = 0.0;
        player.on_ground = true;
    }

    carry_on_moving_platform(player, world);

    player.y > world.ground_y + 300.0
}

fn apply_intent(player: &mut PlayerState, input: InputFrame, world: &WorldRuntime, dt_scale: f32) {
    if input.left {
        player.vx = -world.move_speed;
        player.facing_right = false;
        player.anim_frame = (player.anim_frame + 1) % 4;
    } else if input.right {
        player.vx = world.move_speed;
        player.facing_right = true;
        player.anim_frame = (player.anim_frame + 1) % 4;
    } else {
        if world.stop_on_release && player.on_ground {
            player.vx = 0.0;
        } else {
            player.vx *= world.friction.powf(dt_scale);
            if player.vx.abs() < 0.1 {
                player.vx = 0.0;
            }
        }
        player.anim_frame = 0;
    }
}

fn resolve_horizontal(player: &mut PlayerState, world: &WorldRuntime, dt_scale: f32) {
    player.x += player.vx * dt_scale;
    player.x = player.x.clamp(0.0, (world.width - player.width).max(0.0));

    for plat in world.collidables() {
        if player.bounds().intersects(&plat) {
            if player.vx > 0.0 {
                player.x = plat.x - player.width;
            } else if player.vx < 0.0 {
                player.x = plat.right();
            }
            player.vx = 0.0;
            break;
        }
    }
}

/// Landing or underside resolution against a single collidable. Returns
/// `true` if the player landed on `plat` this call (used to arm falling
/// platforms).
fn resolve_one_vertical(player: &mut PlayerState, plat: &Aabb, prev_y: f32) -> bool {
    let prev_bottom = prev_y + player.height;
    let curr_bottom = player.y + player.height;

    if prev_bottom <= plat.top() && curr_bottom >= plat.top() && player.vy >= 0.0 {
        player.y = plat.top() - player.height;
        player.vy = 0.0;
        player.on_ground = true;
        return true;
    }

    if prev_y >= plat.bottom() && player.y <= plat.bottom() && player.vy < 0.0 {
        player.y = plat.bottom();
        player.vy = 0.0;
    }

    false
}

fn resolve_vertical(player: &mut PlayerState, world: &mut WorldRuntime, prev_y: f32) {
    for plat in &world.platforms {
        resolve_one_vertical(player, plat, prev_y);
    }
    for mp in &world.moving_platforms {
        resolve_one_vertical(player, &mp.aabb, prev_y);
    }
    for fp in world.falling_platforms.iter_mut() {
        if resolve_one_vertical(player, &fp.aabb, prev_y) && !fp.falling {
            fp.falling = true;
            fp.fall_timer = 0;
        }
    }
}

fn carry_on_moving_platform(player: &mut PlayerState, world: &WorldRuntime) {
    if !player.on_ground {
        return;
    }
    for mp in &world.moving_platforms {
        let bottom = player.y + player.height;
        let horizontal_overlap = player.x < mp.aabb.right() && (player.x + player.width) > mp.aabb.x;
        if horizontal_overlap && bottom >= mp.aabb.y - 8.0 && bottom <= mp.aabb.y + 10.0 {
            player.x += mp.delta_x;
            player.x = player.x.clamp(0.0, (world.width - player.width).max(0.0));
        }
    }
}

struct OtherSnapshot {
    bounds: Aabb,
    y: f32,
    prev_y: f32,
    height: f32,
    slot: u8,
}

/// Resolves stacking between every living pair. Only `self` is ever
/// pushed in a given call, so the caller must run this for every ordered
/// pair; one-way stacking relies on that asymmetry.
pub fn resolve_stacking(players: &mut [PlayerState], world_width: f32) {
    let snapshots: Vec<Option<OtherSnapshot>> = players
        .iter()
        .map(|p| {
            if p.dead {
                None
            } else {
                Some(OtherSnapshot {
                    bounds: p.bounds(),
                    y: p.y,
                    prev_y: p.prev_y,
                    height: p.height,
                    slot: p.id,
                })
            }
        })
        .collect();

    for i in 0..players.len() {
        if players[i].dead {
            continue;
        }
        for j in 0..players.len() {
            if i == j {
                continue;
            }
            let Some(other) = &snapshots[j] else { continue };
            resolve_pair(&mut players[i], other, world_width);
        }
    }
}

fn resolve_pair(self_p: &mut PlayerState, other: &OtherSnapshot, world_width: f32) {
    let self_bounds = self_p.bounds();
    if !self_bounds.intersects(&other.bounds) {
        return;
    }

    let pen_from_left = self_bounds.right() - other.bounds.left();
    let pen_from_right = other.bounds.right() - self_bounds.left();
    let pen_from_top = self_bounds.bottom() - other.bounds.top();
    let pen_from_bottom = other.bounds.bottom() - self_bounds.top();

    let min_horizontal = pen_from_left.min(pen_from_right);
    let min_vertical = pen_from_top.min(pen_from_bottom);

    if min_horizontal < min_vertical {
        if pen_from_left < pen_from_right {
            self_p.x -= pen_from_left;
        } else {
            self_p.x += pen_from_right;
        }
        self_p.x = self_p.x.clamp(0.0, (world_width - self_p.width).max(0.0));
        self_p.vx = 0.0;
        return;
    }

    let prev_bottom_self = self_p.prev_y + self_p.height;
    let landing = self_p.vy >= 0.0
        && self_p.y < other.y
        && prev_bottom_self <= other.y + 12.0
        && self_p.y + self_p.height >= other.y;
    if landing {
        self_p.y = other.y - self_p.height;
        self_p.vy = 0.0;
        self_p.on_ground = true;
        self_p.standing_on_player = Some(other.slot);
        return;
    }

    let other_prev_bottom = other.prev_y + other.height;
    let other_bottom = other.y + other.height;
    let hitting_underside = self_p.vy < 0.0 && self_p.prev_y >= other_prev_bottom - 8.0 && self_p.y <= other_bottom;
    if hitting_underside {
        self_p.y = other_bottom;
        self_p.vy = 0.0;
        return;
    }

    if self_p.y < other.y {
        self_p.y = other.y - self_p.height;
        self_p.vy = 0.0;
        self_p.on_ground = true;
        self_p.standing_on_player = Some(other.slot);
    }
}
