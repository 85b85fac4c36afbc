//! The ranking point formula. These constants are not stored in the database.
//!
//! The number of points an entrant earns is `(UP * PV + ATT + FIRST? + BR?) * TIER`, where `PV` is the zero-based index of the entrant's placement
//! in the tournament's unique placements (which are sorted worst to best, so better placements have a higher `PV`).

use crate::prelude::*;

/// Points given for each unique placement.
pub(crate) const UP: i32 = 5;

/// Points given for showing up to a tournament.
pub(crate) const ATT: i32 = 10;

/// Points given for winning a tournament.
pub(crate) const FIRST: i32 = 10;

/// Points given to the second-place finisher if they made a bracket reset.
pub(crate) const BR: i32 = 5;

/// Every entrant's placement must appear in its tournament's placement list, so this indicates corrupted data.
#[derive(Debug, thiserror::Error)]
#[error("placement {placement} is not one of the tournament's placements {placements:?}")]
pub(crate) struct PlacementNotFound {
    pub(crate) placement: i32,
    pub(crate) placements: Vec<i32>,
}

pub(crate) fn points(bracket_reset: bool, placements: &[i32], multiplier: i32, placement: i32) -> Result<i32, PlacementNotFound> {
    let pv = placements.iter().position(|&iter_placement| iter_placement == placement).ok_or_else(|| PlacementNotFound {
        placements: placements.to_owned(),
        placement,
    })?;
    Ok(points_for_index(bracket_reset, pv, multiplier, placement))
}

fn points_for_index(bracket_reset: bool, pv: usize, multiplier: i32, placement: i32) -> i32 {
    let pv = i32::try_from(pv).unwrap_or(i32::MAX);
    let mut points = UP.saturating_mul(pv).saturating_add(ATT);
    if placement == 1 {
        points = points.saturating_add(FIRST);
    } else if placement == 2 && bracket_reset {
        points = points.saturating_add(BR);
    }
    points.saturating_mul(multiplier)
}

/// Maps each of the given placements to the number of points it is worth.
pub(crate) fn point_table(bracket_reset: bool, placements: &[i32], multiplier: i32) -> HashMap<i32, i32> {
    placements.iter()
        .enumerate()
        .map(|(pv, &placement)| (placement, points_for_index(bracket_reset, pv, multiplier, placement)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATOR_GRIND: [i32; 9] = [17, 13, 9, 7, 5, 4, 3, 2, 1];

    #[test]
    fn worst_placement_only_gets_attendance() {
        assert_eq!(points(false, &GATOR_GRIND, 1, 17).unwrap(), ATT);
        assert_eq!(points(true, &GATOR_GRIND, 3, 17).unwrap(), ATT * 3);
    }

    #[test]
    fn champion_bonus() {
        // 1st place is the last of 9 unique placements, so PV = 8
        assert_eq!(points(false, &GATOR_GRIND, 1, 1).unwrap(), UP * 8 + ATT + FIRST);
        assert_eq!(points(true, &GATOR_GRIND, 2, 1).unwrap(), (UP * 8 + ATT + FIRST) * 2);
        // a tournament where every entrant tied for first
        for multiplier in 1..=4 {
            assert_eq!(points(false, &[1], multiplier, 1).unwrap(), (ATT + FIRST) * multiplier);
        }
    }

    #[test]
    fn reset_bonus_only_for_runner_up() {
        for multiplier in 1..=4 {
            let with_reset = points(true, &GATOR_GRIND, multiplier, 2).unwrap();
            let without_reset = points(false, &GATOR_GRIND, multiplier, 2).unwrap();
            assert_eq!(with_reset - without_reset, BR * multiplier);
            for &placement in GATOR_GRIND.iter().filter(|&&placement| placement != 2) {
                assert_eq!(points(true, &GATOR_GRIND, multiplier, placement).unwrap(), points(false, &GATOR_GRIND, multiplier, placement).unwrap());
            }
        }
    }

    #[test]
    fn better_placements_never_earn_less() {
        for bracket_reset in [false, true] {
            for multiplier in [1, 2, 5] {
                let earned = GATOR_GRIND.iter().map(|&placement| points(bracket_reset, &GATOR_GRIND, multiplier, placement).unwrap()).collect_vec();
                assert!(earned.windows(2).all(|pair| pair[0] <= pair[1]), "{earned:?}");
            }
        }
    }

    #[test]
    fn missing_placement() {
        let err = points(false, &GATOR_GRIND, 1, 6).unwrap_err();
        assert_eq!(err.placement, 6);
        assert_eq!(err.placements, GATOR_GRIND);
        assert!(points(false, &[], 1, 1).is_err());
    }

    #[test]
    fn table_matches_points() {
        let table = point_table(true, &GATOR_GRIND, 2);
        assert_eq!(table.len(), GATOR_GRIND.len());
        for placement in GATOR_GRIND {
            assert_eq!(table[&placement], points(true, &GATOR_GRIND, 2, placement).unwrap());
        }
        assert_eq!(table[&17], 20);
        assert_eq!(table[&2], (UP * 7 + ATT + BR) * 2);
    }
}
