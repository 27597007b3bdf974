use super::Playlist;
use crate::{FileId, Song};

impl Playlist {
    fn step_shuffled(&self, index: usize, forward: bool) -> Option<usize> {
        let order = self.shuffle.as_ref()?;
        let len = order.len();
        if len != self.filtered.len() {
            return None;
        }

        let at = order.iter().position(|&slot| slot == index).unwrap_or(0);
        let next = if forward { (at + 1) % len } else { (at + len - 1) % len };
        Some(order[next])
    }

    /// The song to play after `current`, wrapping around the filtered view.
    ///
    /// Without a reference (or one no longer in the view) the walk starts from the
    /// first position, so the second song comes next.
    pub fn item_after(&self, current: Option<&FileId>) -> Option<&Song> {
        if self.filtered.is_empty() {
            return None;
        }

        let len = self.filtered.len();
        let index = current.and_then(|fid| self.filtered_position(fid)).unwrap_or(0);
        let next = self
            .step_shuffled(index, true)
            .unwrap_or((index + 1) % len);
        self.get(&self.filtered[next])
    }

    /// The song before `current`. Without a usable reference this is simply the
    /// first song of the filtered view.
    pub fn item_before(&self, current: Option<&FileId>) -> Option<&Song> {
        let first = self.filtered.first()?;
        let Some(index) = current.and_then(|fid| self.filtered_position(fid)) else {
            return self.get(first);
        };

        let len = self.filtered.len();
        let previous = self
            .step_shuffled(index, false)
            .unwrap_or((index + len - 1) % len);
        self.get(&self.filtered[previous])
    }
}
