//! Play queue with natural and shuffled orders
//!
//! Tracks are stored once in natural (API) order. The play order is a
//! permutation of indices into that list; it is the identity unless shuffle
//! is on. Positions handed out by [`PlayQueue`] are always positions in the
//! play order.

use core_catalog::Track;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    natural: Vec<Track>,
    order: Vec<usize>,
    shuffled: bool,
}

impl PlayQueue {
    pub fn new(tracks: Vec<Track>) -> Self {
        let order = (0..tracks.len()).collect();
        Self {
            natural: tracks,
            order,
            shuffled: false,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    /// Track at `position` in play order.
    pub fn get(&self, position: usize) -> Option<&Track> {
        self.order.get(position).map(|&i| &self.natural[i])
    }

    /// Play-order position of the first track with `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|&i| self.natural[i].id == id)
    }

    /// Tracks in play order.
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.order.iter().map(move |&i| &self.natural[i])
    }

    /// Tracks in natural order.
    pub fn natural(&self) -> &[Track] {
        &self.natural
    }

    /// Shuffle the play order with a Fisher-Yates pass.
    ///
    /// The track at `current` moves to position 0 and the rest are permuted
    /// behind it. Returns the new position of the current track.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, current: Option<usize>, rng: &mut R) -> Option<usize> {
        let pinned = current
            .filter(|&position| position < self.order.len())
            .map(|position| self.order.remove(position));

        self.order.shuffle(rng);
        self.shuffled = true;

        pinned.map(|index| {
            self.order.insert(0, index);
            0
        })
    }

    /// Return to natural order, relocating `current` by track id.
    ///
    /// Yields `None` when `current` does not point at a track.
    pub fn unshuffle(&mut self, current: Option<usize>) -> Option<usize> {
        let natural_index = current.and_then(|position| self.order.get(position).copied());
        self.order = (0..self.natural.len()).collect();
        self.shuffled = false;
        natural_index
            .map(|i| self.natural[i].id.clone())
            .and_then(|id| self.position_of(&id))
    }

    /// Replace every track. While shuffled the new tracks are shuffled too,
    /// with `keep_first` (if present in the new list) pinned at position 0.
    ///
    /// Returns the play-order position of `keep_first`.
    pub fn replace<R: Rng + ?Sized>(
        &mut self,
        tracks: Vec<Track>,
        keep_first: Option<&str>,
        rng: &mut R,
    ) -> Option<usize> {
        let shuffled = self.shuffled;
        *self = Self::new(tracks);
        let position = keep_first.and_then(|id| self.position_of(id));
        if shuffled {
            self.shuffle(position, rng)
        } else {
            position
        }
    }

    /// Append tracks to the end of both orders.
    pub fn append(&mut self, tracks: Vec<Track>) {
        let start = self.natural.len();
        self.natural.extend(tracks);
        self.order.extend(start..self.natural.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::StreamUrl;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_uppercase(),
            primary_artists: String::new(),
            album: None,
            artwork_url: None,
            streams: vec![StreamUrl {
                quality: None,
                url: format!("https://s/{}", id),
            }],
            duration_secs: None,
        }
    }

    fn queue(ids: &[&str]) -> PlayQueue {
        PlayQueue::new(ids.iter().map(|id| track(id)).collect())
    }

    fn ids(queue: &PlayQueue) -> Vec<String> {
        queue.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_shuffle_pins_current_track() {
        let mut q = queue(&["a", "b", "c", "d", "e"]);
        let mut rng = StdRng::seed_from_u64(7);

        let current = q.shuffle(Some(3), &mut rng);
        assert_eq!(current, Some(0));
        assert_eq!(q.get(0).unwrap().id, "d");

        let mut sorted = ids(&q);
        sorted.sort();
        assert_eq!(sorted, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_unshuffle_relocates_by_id() {
        let mut q = queue(&["a", "b", "c", "d"]);
        let mut rng = StdRng::seed_from_u64(1);
        q.shuffle(Some(2), &mut rng);

        let pos = q.position_of("b").unwrap();
        assert_eq!(q.unshuffle(Some(pos)), Some(1));
        assert_eq!(ids(&q), ["a", "b", "c", "d"]);
        assert!(!q.is_shuffled());
    }

    #[test]
    fn test_unshuffle_without_valid_selection() {
        let mut q = queue(&["a", "b"]);
        let mut rng = StdRng::seed_from_u64(1);
        q.shuffle(None, &mut rng);

        assert_eq!(q.unshuffle(None), None);
        q.shuffle(None, &mut rng);
        assert_eq!(q.unshuffle(Some(9)), None);
    }

    #[test]
    fn test_append_extends_both_orders() {
        let mut q = queue(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(3);
        q.shuffle(Some(0), &mut rng);
        q.append(vec![track("x"), track("y")]);

        assert_eq!(q.len(), 5);
        assert_eq!(q.get(3).unwrap().id, "x");
        assert_eq!(q.get(4).unwrap().id, "y");

        q.unshuffle(None);
        assert_eq!(ids(&q), ["a", "b", "c", "x", "y"]);
    }

    #[test]
    fn test_replace_keeps_playing_track_position() {
        let mut q = queue(&["a", "b"]);
        let mut rng = StdRng::seed_from_u64(3);

        let pos = q.replace(vec![track("z"), track("b")], Some("b"), &mut rng);
        assert_eq!(pos, Some(1));

        q.shuffle(None, &mut rng);
        let pos = q.replace(
            vec![track("p"), track("q"), track("b")],
            Some("b"),
            &mut rng,
        );
        assert_eq!(pos, Some(0));
        assert!(q.is_shuffled());
        assert_eq!(q.get(0).unwrap().id, "b");

        assert_eq!(q.replace(vec![track("n")], Some("b"), &mut rng), None);
    }

    proptest! {
        #[test]
        fn prop_shuffle_then_unshuffle_restores_natural_order(
            len in 0usize..40,
            seed in any::<u64>(),
            pick in any::<prop::sample::Index>(),
        ) {
            let names: Vec<String> = (0..len).map(|i| format!("t{}", i)).collect();
            let mut q = PlayQueue::new(names.iter().map(|n| track(n)).collect());
            let mut rng = StdRng::seed_from_u64(seed);

            let current = if len == 0 { None } else { Some(pick.index(len)) };
            let chosen = current.map(|i| names[i].clone());

            let shuffled_pos = q.shuffle(current, &mut rng);
            prop_assert_eq!(shuffled_pos.is_some(), current.is_some());

            let mut permuted = ids(&q);
            permuted.sort();
            let mut expected = names.clone();
            expected.sort();
            prop_assert_eq!(permuted, expected);

            let restored = q.unshuffle(shuffled_pos);
            prop_assert_eq!(ids(&q), names.clone());
            prop_assert_eq!(restored.map(|i| names[i].clone()), chosen);
        }
    }
}
