//! Keeper election over a cluster's membership.
//!
//! The keeper is the member retained when duplicates are pruned. Election is
//! a pure function of the member list: highest pixel area wins, and ties
//! (including assets with unknown dimensions, e.g. PDF pages) break on
//! first-seen order in the input. The ordering dependency on arrival order is
//! deliberate and matches the store's insertion-order member listing.

use uuid::Uuid;

use crate::models::MemberAsset;

/// Elect the keeper for a cluster's full membership.
///
/// Returns `None` only for an empty member list; otherwise exactly one
/// winner. Running this twice on an unchanged list yields the same keeper.
pub fn select_keeper(members: &[MemberAsset]) -> Option<Uuid> {
    let mut winner: Option<&MemberAsset> = None;
    for member in members {
        // Strictly greater keeps the earliest member on area ties.
        if winner.map_or(true, |w| member.pixel_area() > w.pixel_area()) {
            winner = Some(member);
        }
    }
    winner.map(|w| w.asset_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(width: Option<i32>, height: Option<i32>) -> MemberAsset {
        MemberAsset {
            asset_id: Uuid::new_v4(),
            width,
            height,
            is_keeper: false,
        }
    }

    #[test]
    fn test_highest_area_wins() {
        let small = member(Some(640), Some(480));
        let large = member(Some(3840), Some(2160));
        let members = vec![small.clone(), large.clone()];
        assert_eq!(select_keeper(&members), Some(large.asset_id));
    }

    #[test]
    fn test_area_not_width_decides() {
        // Wider but fewer total pixels must lose.
        let wide = member(Some(4000), Some(100));
        let tall = member(Some(1000), Some(1000));
        let members = vec![wide, tall.clone()];
        assert_eq!(select_keeper(&members), Some(tall.asset_id));
    }

    #[test]
    fn test_tie_breaks_first_seen() {
        let first = member(Some(1920), Some(1080));
        let second = member(Some(1920), Some(1080));
        let members = vec![first.clone(), second];
        assert_eq!(select_keeper(&members), Some(first.asset_id));
    }

    #[test]
    fn test_null_dimensions_count_as_zero_area() {
        let page = member(None, None);
        let image = member(Some(1), Some(1));
        let members = vec![page, image.clone()];
        assert_eq!(select_keeper(&members), Some(image.asset_id));
    }

    #[test]
    fn test_all_null_dimensions_first_seen_wins() {
        let a = member(None, None);
        let b = member(None, None);
        let members = vec![a.clone(), b];
        assert_eq!(select_keeper(&members), Some(a.asset_id));
    }

    #[test]
    fn test_empty_membership_has_no_keeper() {
        assert_eq!(select_keeper(&[]), None);
    }

    #[test]
    fn test_election_is_idempotent() {
        let members = vec![
            member(Some(800), Some(600)),
            member(Some(1920), Some(1080)),
            member(None, None),
        ];
        let once = select_keeper(&members);
        let twice = select_keeper(&members);
        assert_eq!(once, twice);
        assert!(once.is_some());
    }
}
