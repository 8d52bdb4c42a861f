use geometry::ScreenRect;

pub const MAX_TIME_TO_VISIBLE_IN_SECONDS: f32 = 1000.0;
pub const PREPAINTING_WINDOW_TIME_SECONDS: f32 = 1.0;
pub const BACKFLING_GUARD_DISTANCE_PIXELS: f32 = 314.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhichTree {
    Active,
    Pending,
}

impl WhichTree {
    pub(crate) fn slot(self) -> usize {
        match self {
            WhichTree::Active => 0,
            WhichTree::Pending => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileResolution {
    High,
    Low,
    NonIdeal,
}

impl TileResolution {
    pub(crate) fn rank(self) -> u8 {
        match self {
            TileResolution::High => 0,
            TileResolution::Low => 1,
            TileResolution::NonIdeal => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePriority {
    pub resolution: TileResolution,
    pub time_to_visible_in_seconds: f32,
    pub distance_to_visible_in_pixels: f32,
}

impl Default for TilePriority {
    fn default() -> Self {
        Self {
            resolution: TileResolution::NonIdeal,
            time_to_visible_in_seconds: MAX_TIME_TO_VISIBLE_IN_SECONDS,
            distance_to_visible_in_pixels: f32::INFINITY,
        }
    }
}

impl TilePriority {
    pub fn new(
        resolution: TileResolution,
        time_to_visible_in_seconds: f32,
        distance_to_visible_in_pixels: f32,
    ) -> Self {
        Self {
            resolution,
            time_to_visible_in_seconds,
            distance_to_visible_in_pixels,
        }
    }

    pub fn combined(active: &TilePriority, pending: &TilePriority) -> Self {
        let resolution = if active.resolution == TileResolution::High
            || pending.resolution == TileResolution::High
        {
            TileResolution::High
        } else if active.resolution == TileResolution::Low
            || pending.resolution == TileResolution::Low
        {
            TileResolution::Low
        } else {
            TileResolution::NonIdeal
        };
        Self {
            resolution,
            time_to_visible_in_seconds: active
                .time_to_visible_in_seconds
                .min(pending.time_to_visible_in_seconds),
            distance_to_visible_in_pixels: active
                .distance_to_visible_in_pixels
                .min(pending.distance_to_visible_in_pixels),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.time_to_visible_in_seconds == 0.0
    }

    pub fn has_been_prioritized(&self) -> bool {
        self.distance_to_visible_in_pixels.is_finite()
    }
}

#[derive(Debug, Clone, Copy)]
struct TimeRange {
    start: f32,
    end: f32,
}

impl TimeRange {
    fn unbounded() -> Self {
        Self {
            start: 0.0,
            end: f32::INFINITY,
        }
    }

    fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    fn intersect(self, other: TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }

    /// Times `t >= 0` where `value + velocity * t > threshold`.
    fn value_larger_than(value: f32, velocity: f32, threshold: f32) -> TimeRange {
        if velocity == 0.0 {
            return if value > threshold {
                TimeRange::unbounded()
            } else {
                TimeRange {
                    start: 0.0,
                    end: 0.0,
                }
            };
        }
        let crossing = (threshold - value) / velocity;
        if velocity > 0.0 {
            TimeRange {
                start: crossing.max(0.0),
                end: f32::INFINITY,
            }
        } else {
            TimeRange {
                start: 0.0,
                end: crossing,
            }
        }
    }

    /// Times `t >= 0` where `value + velocity * t < threshold`.
    fn value_smaller_than(value: f32, velocity: f32, threshold: f32) -> TimeRange {
        Self::value_larger_than(-value, -velocity, -threshold)
    }
}

/// Seconds until `current` reaches `target`, extrapolating each edge linearly
/// from its movement since `previous`.
pub fn time_for_bounds_to_intersect(
    previous: ScreenRect,
    current: ScreenRect,
    time_delta: f32,
    target: ScreenRect,
) -> f32 {
    if current.intersects(&target) {
        return 0.0;
    }
    if time_delta <= 0.0 {
        return MAX_TIME_TO_VISIBLE_IN_SECONDS;
    }

    let velocity_min_x = (current.min.x - previous.min.x) / time_delta;
    let velocity_min_y = (current.min.y - previous.min.y) / time_delta;
    let velocity_max_x = (current.max.x - previous.max.x) / time_delta;
    let velocity_max_y = (current.max.y - previous.max.y) / time_delta;

    let range = TimeRange::unbounded()
        .intersect(TimeRange::value_smaller_than(
            current.min.x,
            velocity_min_x,
            target.max.x,
        ))
        .intersect(TimeRange::value_larger_than(
            current.max.x,
            velocity_max_x,
            target.min.x,
        ))
        .intersect(TimeRange::value_smaller_than(
            current.min.y,
            velocity_min_y,
            target.max.y,
        ))
        .intersect(TimeRange::value_larger_than(
            current.max.y,
            velocity_max_y,
            target.min.y,
        ));

    if range.is_empty() || !range.start.is_finite() {
        return MAX_TIME_TO_VISIBLE_IN_SECONDS;
    }
    range.start.min(MAX_TIME_TO_VISIBLE_IN_SECONDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreePriority {
    #[default]
    SamePriorityForBothTrees,
    SmoothnessTakesPriority,
    NewContentTakesPriority,
}

impl TreePriority {
    pub fn priority_for(self, active: &TilePriority, pending: &TilePriority) -> TilePriority {
        match self {
            TreePriority::SamePriorityForBothTrees => TilePriority::combined(active, pending),
            TreePriority::SmoothnessTakesPriority => *active,
            TreePriority::NewContentTakesPriority => *pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TileBin {
    Now,
    Soon,
    Eventually,
    Never,
}

impl TileBin {
    pub fn from_priority(priority: &TilePriority, required_for_activation: bool) -> Self {
        if required_for_activation || priority.is_visible() {
            return TileBin::Now;
        }
        if !priority.has_been_prioritized() {
            return TileBin::Never;
        }
        if priority.resolution == TileResolution::NonIdeal {
            return TileBin::Eventually;
        }
        if priority.distance_to_visible_in_pixels < BACKFLING_GUARD_DISTANCE_PIXELS
            || priority.time_to_visible_in_seconds < PREPAINTING_WINDOW_TIME_SECONDS
        {
            return TileBin::Soon;
        }
        TileBin::Eventually
    }
}
