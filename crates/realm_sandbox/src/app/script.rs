use realm_core::{InputAction, InputSnapshot, Vec3};

/// Keys are only held when the waypoint is farther than this along an axis.
const AXIS_DEADZONE: f32 = 0.2;
const ARRIVAL_DISTANCE: f32 = 0.5;

/// Drives the player around a closed route and presses interact and skill
/// buttons on a fixed tick schedule.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedRoute {
    waypoints: Vec<Vec3>,
    next_waypoint: usize,
    interact_every: u64,
    skill_every: u64,
    skill_slots: usize,
}

impl ScriptedRoute {
    pub(crate) fn new(waypoints: Vec<Vec3>, skill_slots: usize) -> Self {
        Self {
            waypoints,
            next_waypoint: 0,
            interact_every: 90,
            skill_every: 45,
            skill_slots,
        }
    }

    pub(crate) fn with_schedule(mut self, interact_every: u64, skill_every: u64) -> Self {
        self.interact_every = interact_every;
        self.skill_every = skill_every;
        self
    }

    /// Loop through the demo world: past the sign, through the trigger zone
    /// and into the guard's patrol ring before heading home.
    pub(crate) fn demo(skill_slots: usize) -> Self {
        Self::new(
            vec![
                Vec3::new(0.0, 0.0, -3.0),
                Vec3::new(5.0, 0.0, -3.0),
                Vec3::new(9.0, 0.0, -7.0),
                Vec3::new(9.0, 0.0, 3.0),
                Vec3::new(0.0, 0.0, 3.0),
                Vec3::new(0.0, 0.0, 0.0),
            ],
            skill_slots,
        )
    }

    pub(crate) fn next_waypoint(&self) -> Option<Vec3> {
        self.waypoints.get(self.next_waypoint).copied()
    }

    /// Input for `tick` given where the player currently stands. Advances to
    /// the following waypoint once the current one is reached.
    pub(crate) fn input_for(&mut self, tick: u64, player_position: Vec3) -> InputSnapshot {
        let mut input = InputSnapshot::empty();
        if let Some(target) = self.next_waypoint() {
            let mut offset = target - player_position;
            offset.y = 0.0;
            if offset.length() <= ARRIVAL_DISTANCE {
                self.next_waypoint = (self.next_waypoint + 1) % self.waypoints.len();
            } else {
                input = input
                    .with_action_down(InputAction::MoveRight, offset.x > AXIS_DEADZONE)
                    .with_action_down(InputAction::MoveLeft, offset.x < -AXIS_DEADZONE)
                    .with_action_down(InputAction::MoveForward, offset.z < -AXIS_DEADZONE)
                    .with_action_down(InputAction::MoveBackward, offset.z > AXIS_DEADZONE);
            }
        }

        if tick > 0 && self.interact_every > 0 && tick % self.interact_every == 0 {
            input = input.with_interact_pressed(true);
        }
        if tick > 0 && self.skill_every > 0 && self.skill_slots > 0 && tick % self.skill_every == 0 {
            let slot = ((tick / self.skill_every - 1) % self.skill_slots as u64) as usize;
            input = input.with_skill_pressed(Some(slot));
        }
        input
    }
}
