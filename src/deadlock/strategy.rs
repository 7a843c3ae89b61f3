use crate::config::DeadlockResolution;
use crate::network::TrackNetwork;
use crate::route::{Route, RouteElement};
use crate::train::TrainHandle;
use smallvec::{smallvec, SmallVec};

/// A stretch of a train's route, as inclusive route indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Overlap {
    pub first: usize,
    pub last: usize,
}

/// What a strategy may look at when judging an overlap.
pub(crate) struct OverlapContext<'a> {
    pub network: &'a TrackNetwork,
    /// The route ahead of the train being checked.
    pub own: &'a Route,
    pub handle: TrainHandle,
    /// The lengths of the train being checked and of the other train, in m.
    pub lengths: [f64; 2],
}

/// Turns a stretch shared with another train in the opposite direction into
/// the deadlock boundaries that must be guarded.
pub(crate) trait DeadlockStrategy {
    fn boundaries(&self, ctx: &OverlapContext, overlap: Overlap) -> SmallVec<[Overlap; 2]>;
}

/// Every shared stretch is a boundary.
struct PathBased;

impl DeadlockStrategy for PathBased {
    fn boundaries(&self, _ctx: &OverlapContext, overlap: Overlap) -> SmallVec<[Overlap; 2]> {
        smallvec![overlap]
    }
}

/// Only stretches a train can get stuck in are boundaries, and a passing path
/// inside a stretch lets the trains meet there.
struct LocationBased;

impl DeadlockStrategy for LocationBased {
    fn boundaries(&self, ctx: &OverlapContext, overlap: Overlap) -> SmallVec<[Overlap; 2]> {
        let network = ctx.network;
        let stretch = &ctx.own.as_slice()[overlap.first..=overlap.last];
        let signal_inside = stretch.windows(2).any(|pair| {
            network.exit_signal(pair[0]).is_some()
                || network.exit_signal(pair[1].reversed()).is_some()
        });
        let passing = (overlap.first..=overlap.last)
            .flat_map(|idx| {
                network.passing_paths().iter().filter_map(move |path| {
                    let inside = idx + path.main().len() <= overlap.last + 1;
                    (inside && path.matches_at(ctx.own, idx)).then_some((idx, path))
                })
            })
            .collect::<SmallVec<[_; 2]>>();
        if !signal_inside && passing.is_empty() {
            return SmallVec::new();
        }

        let needed = f64::max(ctx.lengths[0], ctx.lengths[1]);
        let usable = passing.iter().find(|(_, path)| {
            path.length() >= needed
                && path
                    .alternative()
                    .iter()
                    .all(|el| network.section(el.section).is_available(ctx.handle))
        });
        let Some((idx, path)) = usable else {
            return smallvec![overlap];
        };
        let mut parts = SmallVec::new();
        if *idx > overlap.first {
            parts.push(Overlap {
                first: overlap.first,
                last: idx - 1,
            });
        }
        let after = idx + path.main().len();
        if after <= overlap.last {
            parts.push(Overlap {
                first: after,
                last: overlap.last,
            });
        }
        parts
    }
}

impl DeadlockResolution {
    pub(crate) fn strategy(self) -> &'static dyn DeadlockStrategy {
        match self {
            DeadlockResolution::PathBased => &PathBased,
            DeadlockResolution::LocationBased => &LocationBased,
        }
    }
}

/// Finds the stretches where `own` and `theirs` use the same sections in opposite
/// directions. Stretches run the same way are skipped whole.
pub(crate) fn opposite_overlaps(own: &[RouteElement], theirs: &[RouteElement]) -> Vec<Overlap> {
    let mut overlaps = Vec::new();
    let mut i = 0;
    while i < own.len() {
        let Some(j) = theirs.iter().position(|el| el.section == own[i].section) else {
            i += 1;
            continue;
        };
        if theirs[j] == own[i] {
            i += own[i..]
                .iter()
                .zip(&theirs[j..])
                .take_while(|(a, b)| a == b)
                .count();
            continue;
        }
        let mut k = 0;
        while i + k + 1 < own.len() && j > k && own[i + k + 1] == theirs[j - k - 1].reversed() {
            k += 1;
        }
        overlaps.push(Overlap {
            first: i,
            last: i + k,
        });
        i += k + 1;
    }
    overlaps
}

#[cfg(test)]
mod test {
    use super::{opposite_overlaps, Overlap, OverlapContext};
    use crate::config::DeadlockResolution;
    use crate::network::{SectionKind, TrackNetwork};
    use crate::route::{Direction, Route, RouteElement};
    use crate::train::{RouteSide, TrainHandle, TrainNumber};
    use crate::{SectionId, TrainId};
    use slotmap::SlotMap;

    fn fwd(id: SectionId) -> RouteElement {
        RouteElement::new(id, Direction::Forward)
    }

    fn line(net: &mut TrackNetwork, n: usize) -> Vec<SectionId> {
        let ids = (0..n)
            .map(|_| net.add_section(SectionKind::Normal, 100.0))
            .collect::<Vec<_>>();
        for pair in ids.windows(2) {
            net.connect(pair[0], 1, pair[1], 0);
        }
        ids
    }

    #[test]
    fn overlaps_in_opposite_directions() {
        let mut net = TrackNetwork::new();
        let s = line(&mut net, 6);
        let own = s[0..5].iter().map(|id| fwd(*id)).collect::<Vec<_>>();
        let theirs = s[2..6].iter().rev().map(|id| fwd(*id).reversed()).collect::<Vec<_>>();
        assert_eq!(
            opposite_overlaps(&own, &theirs),
            vec![Overlap { first: 2, last: 4 }]
        );

        // Following the same way is not a conflict.
        let behind = s[1..4].iter().map(|id| fwd(*id)).collect::<Vec<_>>();
        assert!(opposite_overlaps(&own, &behind).is_empty());
    }

    #[test]
    fn location_based_needs_a_signal_inside() {
        let mut net = TrackNetwork::new();
        let s = line(&mut net, 4);
        let own = s.iter().map(|id| fwd(*id)).collect::<Route>();
        let mut trains = SlotMap::<TrainId, ()>::with_key();
        let handle = TrainHandle::new(trains.insert(()), TrainNumber(1), RouteSide::Ahead);
        let overlap = Overlap { first: 0, last: 3 };

        let ctx = OverlapContext {
            network: &net,
            own: &own,
            handle,
            lengths: [100.0, 100.0],
        };
        let location = DeadlockResolution::LocationBased.strategy();
        assert!(location.boundaries(&ctx, overlap).is_empty());
        let path = DeadlockResolution::PathBased.strategy();
        assert_eq!(path.boundaries(&ctx, overlap).as_slice(), &[overlap]);

        net.add_signal(fwd(s[1]));
        let ctx = OverlapContext {
            network: &net,
            own: &own,
            handle,
            lengths: [100.0, 100.0],
        };
        assert_eq!(location.boundaries(&ctx, overlap).as_slice(), &[overlap]);
    }
}
