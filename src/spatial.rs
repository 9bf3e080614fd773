//! Positioning sounds in 2D space relative to the listener.
//!
//! The per-ear gains for a positional sound come from precomputed lookup
//! tables indexed by the source's quantized position in listener-facing
//! coordinates. Building the tables uses square roots, but the per-voice,
//! per-cycle path is a rotation by a precomputed cosine/sine pair and two
//! array lookups.

use cgmath::Point2;

use crate::frame::Frame;
use crate::voice::SoundSource;

/// The listener's position and facing direction.
///
/// The orientation is carried as a cosine/sine pair so the mixing context
/// never evaluates trigonometric functions.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ListenerPose {
    /// The listener's position in world units.
    pub position: Point2<f32>,
    /// The cosine of the facing angle.
    pub facing_cos: f32,
    /// The sine of the facing angle.
    pub facing_sin: f32,
}

impl Default for ListenerPose {
    fn default() -> Self {
        Self {
            position: Point2::new(0.0, 0.0),
            facing_cos: 1.0,
            facing_sin: 0.0,
        }
    }
}

/// A read-only copy of everything the spatializer needs for one mix cycle.
///
/// Gameplay code publishes a fresh snapshot once per frame; the mixing
/// context keeps using the latest one it has seen.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SpatialSnapshot {
    /// The listener pose the gains are computed against.
    pub listener: ListenerPose,
    /// Actor positions, indexed by actor index.
    pub actors: Vec<Point2<f32>>,
    /// Door positions, indexed by door index.
    pub doors: Vec<Point2<f32>>,
    /// The position of the moving wall, if one is in motion.
    pub wall: Option<Point2<f32>>,
}

/// Sources further than this many world units from the listener in either
/// listener-facing axis are clamped to the table edge.
pub(crate) const TABLE_RADIUS: i32 = 15;

const TABLE_SIZE: usize = (TABLE_RADIUS * 2 + 1) as usize;

/// Precomputed per-ear gains over the quantized listener-relative grid.
pub(crate) struct AttenuationTable {
    left: [[f32; TABLE_SIZE]; TABLE_SIZE],
    right: [[f32; TABLE_SIZE]; TABLE_SIZE],
}

impl AttenuationTable {
    /// Builds the gain grid: linear distance rolloff to silence at the table
    /// radius, split across the ears by the lateral offset. The center cell
    /// holds the table maximum with both ears equal.
    #[must_use]
    pub(crate) fn new() -> Self {
        let mut left = [[0.0; TABLE_SIZE]; TABLE_SIZE];
        let mut right = [[0.0; TABLE_SIZE]; TABLE_SIZE];
        let radius = TABLE_RADIUS as f32;

        for (forward_index, (left_row, right_row)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let forward = forward_index as f32 - radius;
            for (lateral_index, (left_gain, right_gain)) in left_row.iter_mut().zip(right_row.iter_mut()).enumerate() {
                let lateral = lateral_index as f32 - radius;
                let distance = (lateral * lateral + forward * forward).sqrt();
                let base = (1.0 - distance / radius).max(0.0);
                let pan = lateral / radius;
                *left_gain = base * (1.0 - pan) * 0.5;
                *right_gain = base * (1.0 + pan) * 0.5;
            }
        }

        Self { left, right }
    }

    /// The largest gain any cell holds, found in the center cell.
    #[cfg(test)]
    pub(crate) fn max_gain(&self) -> f32 {
        self.left[TABLE_RADIUS as usize][TABLE_RADIUS as usize]
    }

    fn gains(&self, lateral: i32, forward: i32) -> Frame {
        let lateral = (lateral.clamp(-TABLE_RADIUS, TABLE_RADIUS) + TABLE_RADIUS) as usize;
        let forward = (forward.clamp(-TABLE_RADIUS, TABLE_RADIUS) + TABLE_RADIUS) as usize;
        Frame::new(self.left[forward][lateral], self.right[forward][lateral])
    }

    /// Computes the per-ear gains for a source given the current snapshot.
    ///
    /// Ambient sources and sources whose position is missing from the
    /// snapshot play at full volume on both ears.
    #[must_use]
    pub(crate) fn spatialize(&self, snapshot: &SpatialSnapshot, source: SoundSource) -> Frame {
        let position = match source {
            SoundSource::Ambient => None,
            SoundSource::Actor(index) => snapshot.actors.get(index as usize).copied(),
            SoundSource::Door(index) => snapshot.doors.get(index as usize).copied(),
            SoundSource::Wall => snapshot.wall,
        };
        let Some(position) = position else {
            return Frame::from_mono(1.0);
        };

        let listener = snapshot.listener;
        let relative = position - listener.position;
        // Rotate into listener-facing axes: forward along the view direction,
        // lateral positive to the right.
        let lateral = relative.x * listener.facing_sin - relative.y * listener.facing_cos;
        let forward = relative.x * listener.facing_cos + relative.y * listener.facing_sin;

        self.gains(lateral.round() as i32, forward.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::Point2;

    use super::*;

    fn snapshot_with_actor(position: Point2<f32>) -> SpatialSnapshot {
        SpatialSnapshot {
            actors: vec![position],
            ..SpatialSnapshot::default()
        }
    }

    #[test]
    fn co_located_source_gets_equal_maximal_gains() {
        let table = AttenuationTable::new();
        let snapshot = snapshot_with_actor(Point2::new(0.0, 0.0));

        let gains = table.spatialize(&snapshot, SoundSource::Actor(0));

        assert_relative_eq!(gains.left, gains.right);
        assert_relative_eq!(gains.left, table.max_gain());
    }

    #[test]
    fn the_center_cell_holds_the_table_maximum() {
        let table = AttenuationTable::new();
        let maximum = table.max_gain();
        for forward in -TABLE_RADIUS..=TABLE_RADIUS {
            for lateral in -TABLE_RADIUS..=TABLE_RADIUS {
                let gains = table.gains(lateral, forward);
                assert!(gains.left <= maximum);
                assert!(gains.right <= maximum);
            }
        }
    }

    #[test]
    fn sources_to_the_right_favor_the_right_ear() {
        let table = AttenuationTable::new();
        // Listener facing positive x, source a few units to its right.
        let snapshot = snapshot_with_actor(Point2::new(0.0, -5.0));

        let gains = table.spatialize(&snapshot, SoundSource::Actor(0));

        assert!(gains.right > gains.left);
        assert!(gains.left >= 0.0);
    }

    #[test]
    fn rotation_follows_the_facing_direction() {
        let table = AttenuationTable::new();
        // Facing positive y, the same world position is now to the left.
        let snapshot = SpatialSnapshot {
            listener: ListenerPose {
                position: Point2::new(0.0, 0.0),
                facing_cos: 0.0,
                facing_sin: 1.0,
            },
            actors: vec![Point2::new(-5.0, 0.0)],
            ..SpatialSnapshot::default()
        };

        let gains = table.spatialize(&snapshot, SoundSource::Actor(0));

        assert!(gains.left > gains.right);
    }

    #[test]
    fn distant_sources_fall_silent() {
        let table = AttenuationTable::new();
        let snapshot = snapshot_with_actor(Point2::new(200.0, 0.0));

        let gains = table.spatialize(&snapshot, SoundSource::Actor(0));

        assert_relative_eq!(gains.left, 0.0);
        assert_relative_eq!(gains.right, 0.0);
    }

    #[test]
    fn ambient_and_unknown_sources_play_at_full_volume() {
        let table = AttenuationTable::new();
        let snapshot = SpatialSnapshot::default();

        for source in [SoundSource::Ambient, SoundSource::Actor(7), SoundSource::Wall] {
            let gains = table.spatialize(&snapshot, source);
            assert_relative_eq!(gains.left, 1.0);
            assert_relative_eq!(gains.right, 1.0);
        }
    }
}
