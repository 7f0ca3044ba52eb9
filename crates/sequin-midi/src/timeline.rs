//! Ordered event storage for one pattern, with Note-On/Note-Off linking.
//!
//! Links between events are `(index, generation)` pairs. Any operation that
//! moves events to new indices bumps the timeline generation and rewrites
//! the links it keeps, so a link held inside the timeline always resolves.
//! Handles held outside go stale on relocation and [`EventTimeline::resolve`]
//! refuses them instead of returning the wrong event.

use crate::TimedEvent;
use sequin_core::Pulse;

/// Generation-tagged handle to an event inside an [`EventTimeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventRef {
    index: u32,
    generation: u32,
}

impl EventRef {
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Outcome of a [`EventTimeline::verify_and_link`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Note-On/Note-Off pairs linked, wrapped pairs included.
    pub linked: usize,
    /// Pairs whose Note-Off precedes the Note-On across the pattern end.
    pub wrapped: usize,
    pub unlinked_note_ons: usize,
    /// Note-Offs with no partner; a data-quality problem, not a fault.
    pub unlinked_note_offs: usize,
    /// Events removed for lying outside `0..=length`.
    pub pruned: usize,
}

/// Pulses added to a Note-Off that lands on its Note-On's timestamp.
pub const DEFAULT_ZERO_LEN_CORRECTION: Pulse = 16;

#[derive(Debug, Clone)]
pub struct EventTimeline {
    events: Vec<TimedEvent>,
    generation: u32,
    length: Pulse,
    link_wraparound: bool,
    zero_len_correction: Pulse,
    has_tempo: bool,
    has_time_signature: bool,
    has_key_signature: bool,
    modified: bool,
}

impl Default for EventTimeline {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            generation: 0,
            length: 0,
            link_wraparound: false,
            zero_len_correction: DEFAULT_ZERO_LEN_CORRECTION,
            has_tempo: false,
            has_time_signature: false,
            has_key_signature: false,
            modified: false,
        }
    }
}

impl EventTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty timeline for a pattern of `length` pulses.
    pub fn with_length(length: Pulse) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedEvent> {
        self.events.iter()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&TimedEvent> {
        self.events.get(index)
    }

    /// Mutable access. Changing a timestamp requires a later [`sort`](Self::sort).
    pub fn get_mut(&mut self, index: usize) -> Option<&mut TimedEvent> {
        self.modified = true;
        self.events.get_mut(index)
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn length(&self) -> Pulse {
        self.length
    }

    pub fn set_length(&mut self, length: Pulse) {
        self.length = length;
    }

    #[inline]
    pub fn link_wraparound(&self) -> bool {
        self.link_wraparound
    }

    #[inline]
    pub fn zero_len_correction(&self) -> Pulse {
        self.zero_len_correction
    }

    /// Pulses given to a Note-Off on its Note-On's tick when the two are
    /// linked. Zero leaves such pairs alone.
    pub fn set_zero_len_correction(&mut self, pulses: Pulse) {
        self.zero_len_correction = pulses.max(0);
    }

    pub fn set_link_wraparound(&mut self, wrap: bool) {
        self.link_wraparound = wrap;
    }

    #[inline]
    pub fn has_tempo(&self) -> bool {
        self.has_tempo
    }

    #[inline]
    pub fn has_time_signature(&self) -> bool {
        self.has_time_signature
    }

    #[inline]
    pub fn has_key_signature(&self) -> bool {
        self.has_key_signature
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    // Handles

    /// Handle for the event currently at `index`.
    pub fn handle(&self, index: usize) -> Option<EventRef> {
        (index < self.events.len()).then(|| self.make_ref(index))
    }

    /// Index behind `r`, or `None` if the handle is stale or out of range.
    pub fn resolve(&self, r: EventRef) -> Option<usize> {
        let index = r.index();
        (r.generation == self.generation && index < self.events.len()).then_some(index)
    }

    pub fn event(&self, r: EventRef) -> Option<&TimedEvent> {
        self.resolve(r).map(|i| &self.events[i])
    }

    /// Index of the linked partner, checked in both directions.
    pub fn partner(&self, index: usize) -> Option<usize> {
        let link = self.events.get(index)?.linked()?;
        let other = self.resolve(link)?;
        let back = self.events[other].linked()?;
        (self.resolve(back) == Some(index)).then_some(other)
    }

    #[inline]
    fn make_ref(&self, index: usize) -> EventRef {
        EventRef {
            index: index as u32,
            generation: self.generation,
        }
    }

    /// Links `on` and `off`. Returns true if a zero-length note was
    /// lengthened, which leaves the timeline out of order.
    fn link_pair(&mut self, on: usize, off: usize) -> bool {
        let on_ref = self.make_ref(on);
        let off_ref = self.make_ref(off);
        self.events[on].link(off_ref);
        self.events[off].link(on_ref);

        let start = self.events[on].timestamp();
        if self.zero_len_correction > 0 && self.events[off].timestamp() == start {
            self.events[off].set_timestamp(start + self.zero_len_correction);
            tracing::debug!("Zero-length note at {} lengthened", start);
            return true;
        }
        false
    }

    // Insertion

    /// Inserts without sorting. Prefer many appends plus one sort for bulk loads.
    pub fn append(&mut self, event: TimedEvent) {
        self.has_tempo |= event.is_tempo();
        self.has_time_signature |= event.is_time_signature();
        self.has_key_signature |= event.is_key_signature();
        self.events.push(event);
        self.modified = true;
    }

    /// Appends then sorts.
    pub fn add(&mut self, event: TimedEvent) {
        self.append(event);
        self.sort();
    }

    /// Stable sort by timestamp then rank.
    ///
    /// Does nothing, and keeps the generation, if already in order.
    pub fn sort(&mut self) {
        let sorted = self
            .events
            .windows(2)
            .all(|w| w[0].sort_key() <= w[1].sort_key());
        if sorted {
            return;
        }
        let old_len = self.events.len();
        let mut tagged: Vec<(usize, TimedEvent)> = self.events.drain(..).enumerate().collect();
        tagged.sort_by_key(|(_, e)| e.sort_key());
        self.rebuild(tagged, old_len);
    }

    /// Replaces storage with `kept` (old index, event) in its new order.
    ///
    /// Links to surviving events are rewritten; links to dropped events are cleared.
    fn rebuild(&mut self, kept: Vec<(usize, TimedEvent)>, old_len: usize) {
        let old_generation = self.generation;
        let new_generation = old_generation.wrapping_add(1);
        let mut new_index = vec![None; old_len];
        for (n, (old, _)) in kept.iter().enumerate() {
            new_index[*old] = Some(n as u32);
        }

        self.events = kept
            .into_iter()
            .map(|(_, mut e)| {
                let target = e
                    .linked()
                    .filter(|r| r.generation == old_generation)
                    .and_then(|r| new_index.get(r.index()).copied().flatten());
                match target {
                    Some(index) => e.link(EventRef {
                        index,
                        generation: new_generation,
                    }),
                    None => e.unlink(),
                }
                e
            })
            .collect();
        self.generation = new_generation;
        self.modified = true;
    }

    /// Adds `other`'s events, discarding their links, then re-links everything.
    pub fn merge(&mut self, other: EventTimeline, presort: bool) -> LinkReport {
        let mut incoming = other.events;
        if presort {
            incoming.sort_by_key(|e| e.sort_key());
        }
        for mut e in incoming {
            e.unlink();
            self.append(e);
        }
        self.verify_and_link(self.length)
    }

    // Removal

    /// Removes one event, clearing its partner's link first.
    pub fn remove(&mut self, index: usize) -> Option<TimedEvent> {
        if index >= self.events.len() {
            return None;
        }
        let old_len = self.events.len();
        let mut removed = None;
        let kept: Vec<(usize, TimedEvent)> = self
            .events
            .drain(..)
            .enumerate()
            .filter_map(|(i, e)| {
                if i == index {
                    removed = Some(e);
                    None
                } else {
                    Some((i, e))
                }
            })
            .collect();
        self.rebuild(kept, old_len);
        self.rescan_flags();
        removed.map(|mut e| {
            e.unlink();
            e
        })
    }

    fn remove_where<F: FnMut(&TimedEvent) -> bool>(&mut self, mut doomed: F) -> usize {
        let count = self.events.iter().filter(|&e| doomed(e)).count();
        if count == 0 {
            return 0;
        }
        let old_len = self.events.len();
        let kept: Vec<(usize, TimedEvent)> = self
            .events
            .drain(..)
            .enumerate()
            .filter(|(_, e)| !doomed(e))
            .collect();
        self.rebuild(kept, old_len);
        self.rescan_flags();
        count
    }

    pub fn remove_marked(&mut self) -> usize {
        self.remove_where(|e| e.is_marked())
    }

    /// Drops Note-Ons and Note-Offs that have no partner.
    pub fn remove_unlinked_notes(&mut self) -> usize {
        self.remove_where(|e| e.is_note_unlinked())
    }

    pub fn remove_selected(&mut self) -> usize {
        self.remove_where(|e| e.is_selected())
    }

    pub fn clear(&mut self) {
        if !self.events.is_empty() {
            self.events.clear();
            self.generation = self.generation.wrapping_add(1);
            self.modified = true;
        }
        self.rescan_flags();
    }

    fn rescan_flags(&mut self) {
        self.has_tempo = self.events.iter().any(|e| e.is_tempo());
        self.has_time_signature = self.events.iter().any(|e| e.is_time_signature());
        self.has_key_signature = self.events.iter().any(|e| e.is_key_signature());
    }

    // Linking

    pub fn clear_links(&mut self) {
        for e in &mut self.events {
            e.unlink();
        }
    }

    /// Re-sorts and re-links every Note-On, using the timeline's wraparound flag.
    ///
    /// With `length > 0` the pattern length is updated and events outside
    /// `0..=length` are pruned together with their partners.
    pub fn verify_and_link(&mut self, length: Pulse) -> LinkReport {
        self.verify_and_link_with(length, false)
    }

    /// As [`verify_and_link`](Self::verify_and_link), with wraparound forced on by `wrap`.
    pub fn verify_and_link_with(&mut self, length: Pulse, wrap: bool) -> LinkReport {
        self.clear_links();
        self.sort();
        let (linked, wrapped) = self.link_new(self.link_wraparound || wrap);

        let mut pruned = 0;
        if length > 0 {
            self.length = length;
            self.unmark_all();
            self.mark_out_of_range(length);
            pruned = self.remove_marked();
        }

        let report = LinkReport {
            linked,
            wrapped,
            unlinked_note_ons: self.events.iter().filter(|e| e.on_linkable()).count(),
            unlinked_note_offs: self.events.iter().filter(|e| e.off_linkable()).count(),
            pruned,
        };
        if report.unlinked_note_offs > 0 {
            tracing::debug!("{} unlinked Note-Off events", report.unlinked_note_offs);
        }
        report
    }

    /// Links every unlinked Note-On to the nearest following unlinked
    /// Note-Off with the same note, on any channel.
    ///
    /// A Note-Off on the Note-On's own tick sorts ahead of it, so with a
    /// zero-length correction the search starts at the first event of that
    /// tick. With `wrap`, a Note-On that finds nothing before the end
    /// searches again from the start of the pattern. Returns `(linked, wrapped)`.
    fn link_new(&mut self, wrap: bool) -> (usize, usize) {
        let n = self.events.len();
        let mut linked = 0;
        let mut wrapped = 0;
        let mut lengthened = false;
        for i in 0..n {
            if !self.events[i].on_linkable() {
                continue;
            }
            let note = self.events[i].note();
            let start = self.events[i].timestamp();
            let is_partner = |e: &TimedEvent| e.off_linkable() && e.note() == note;

            let mut from = i + 1;
            if self.zero_len_correction > 0 {
                from = i;
                while from > 0 && self.events[from - 1].timestamp() == start {
                    from -= 1;
                }
            }
            let found = (from..n)
                .filter(|&j| j != i)
                .find(|&j| is_partner(&self.events[j]));

            if let Some(j) = found {
                lengthened |= self.link_pair(i, j);
                linked += 1;
            } else if wrap {
                if let Some(j) = (0..i).find(|&j| is_partner(&self.events[j])) {
                    lengthened |= self.link_pair(i, j);
                    linked += 1;
                    wrapped += 1;
                }
            }
        }
        if lengthened {
            self.sort();
        }
        (linked, wrapped)
    }

    /// Duration of the note starting at `index`, across the pattern end if it wraps.
    pub fn note_length(&self, index: usize) -> Option<Pulse> {
        let on = self.events.get(index)?;
        if !on.is_note_on() {
            return None;
        }
        let off = &self.events[self.partner(index)?];
        let len = off.timestamp() - on.timestamp();
        if len < 0 && self.length > 0 {
            Some(len + self.length)
        } else {
            Some(len)
        }
    }

    // Timestamps

    pub fn min_timestamp(&self) -> Option<Pulse> {
        self.events.iter().map(|e| e.timestamp()).min()
    }

    pub fn max_timestamp(&self) -> Option<Pulse> {
        self.events.iter().map(|e| e.timestamp()).max()
    }

    /// Wraps every timestamp into `0..length` and re-sorts.
    pub fn mod_timestamps(&mut self, length: Pulse) {
        if length <= 0 || self.events.is_empty() {
            return;
        }
        for e in &mut self.events {
            e.mod_timestamp(length);
        }
        self.modified = true;
        self.sort();
    }

    // Selection and marking

    pub fn select_all(&mut self) {
        for e in &mut self.events {
            e.select();
        }
    }

    pub fn unselect_all(&mut self) {
        for e in &mut self.events {
            e.unselect();
        }
    }

    pub fn invert_selection(&mut self) {
        for e in &mut self.events {
            if e.is_selected() {
                e.unselect();
            } else {
                e.select();
            }
        }
    }

    /// Selects events with `start <= timestamp < end`; returns how many.
    pub fn select_in_range(&mut self, start: Pulse, end: Pulse) -> usize {
        let mut count = 0;
        for e in &mut self.events {
            if (start..end).contains(&e.timestamp()) {
                e.select();
                count += 1;
            }
        }
        count
    }

    pub fn count_selected(&self) -> usize {
        self.events.iter().filter(|e| e.is_selected()).count()
    }

    /// Selected Note-Ons.
    pub fn count_selected_notes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.is_selected() && e.is_note_on())
            .count()
    }

    pub fn any_selected_notes(&self) -> bool {
        self.events
            .iter()
            .any(|e| e.is_selected() && e.is_note_on())
    }

    pub fn mark_selected(&mut self) -> usize {
        let mut count = 0;
        for e in self.events.iter_mut().filter(|e| e.is_selected()) {
            e.mark();
            count += 1;
        }
        count
    }

    /// Marks events outside `0..=length` and their linked partners.
    pub fn mark_out_of_range(&mut self, length: Pulse) -> usize {
        let outside: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.timestamp() > length || e.timestamp() < 0)
            .map(|(i, _)| i)
            .collect();
        for &i in &outside {
            self.events[i].mark();
            if let Some(p) = self.partner(i) {
                self.events[p].mark();
            }
        }
        self.events.iter().filter(|e| e.is_marked()).count()
    }

    pub fn unmark_all(&mut self) {
        for e in &mut self.events {
            e.unmark();
        }
    }
}

impl<'a> IntoIterator for &'a EventTimeline {
    type Item = &'a TimedEvent;
    type IntoIter = std::slice::Iter<'a, TimedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(ts: Pulse, note: u8) -> TimedEvent {
        TimedEvent::note_on(ts, 0, note, 100)
    }

    fn off(ts: Pulse, note: u8) -> TimedEvent {
        TimedEvent::note_off(ts, 0, note, 0)
    }

    fn index_of(tl: &EventTimeline, ts: Pulse, note_on: bool) -> usize {
        tl.iter()
            .position(|e| e.timestamp() == ts && e.is_note_on() == note_on && e.is_strict_note())
            .unwrap()
    }

    #[test]
    fn test_empty_timeline_is_noop() {
        let mut tl = EventTimeline::new();
        let report = tl.verify_and_link(768);
        assert_eq!(report, LinkReport::default());
        tl.sort();
        tl.select_all();
        assert_eq!(tl.count_selected(), 0);
        assert_eq!(tl.min_timestamp(), None);
    }

    #[test]
    fn test_append_does_not_sort_add_does() {
        let mut tl = EventTimeline::new();
        tl.append(on(100, 60));
        tl.append(on(0, 62));
        assert_eq!(tl.get(0).unwrap().timestamp(), 100);
        tl.add(on(50, 64));
        let stamps: Vec<_> = tl.iter().map(|e| e.timestamp()).collect();
        assert_eq!(stamps, vec![0, 50, 100]);
    }

    #[test]
    fn test_links_nearest_note_off() {
        let mut tl = EventTimeline::new();
        tl.append(on(0, 60));
        tl.append(off(96, 60));
        tl.append(on(192, 60));
        tl.append(off(288, 60));
        let report = tl.verify_and_link(768);
        assert_eq!(report.linked, 2);
        assert_eq!(report.unlinked_note_offs, 0);

        let first = index_of(&tl, 0, true);
        let p = tl.partner(first).unwrap();
        assert_eq!(tl.get(p).unwrap().timestamp(), 96);
        assert_eq!(tl.note_length(first), Some(96));
    }

    #[test]
    fn test_links_across_channels() {
        let mut tl = EventTimeline::new();
        tl.append(TimedEvent::note_on(0, 0, 60, 100));
        tl.append(TimedEvent::note_off(10, 1, 60, 0));
        let report = tl.verify_and_link(0);
        assert_eq!(report.linked, 1);
        assert_eq!(report.unlinked_note_ons, 0);
        assert_eq!(report.unlinked_note_offs, 0);
        assert_eq!(tl.partner(0), Some(1));
    }

    #[test]
    fn test_zero_length_note_lengthened() {
        let mut tl = EventTimeline::with_length(768);
        tl.append(on(96, 60));
        tl.append(off(96, 60));
        tl.append(TimedEvent::control_change(100, 0, 7, 90));
        let report = tl.verify_and_link(768);
        assert_eq!(report.linked, 1);
        assert_eq!(report.unlinked_note_offs, 0);

        let start = index_of(&tl, 96, true);
        assert_eq!(tl.note_length(start), Some(DEFAULT_ZERO_LEN_CORRECTION));
        let stamps: Vec<_> = tl.iter().map(|e| e.timestamp()).collect();
        assert_eq!(stamps, vec![96, 100, 112]);
    }

    #[test]
    fn test_zero_length_correction_disabled() {
        let mut tl = EventTimeline::new();
        tl.set_zero_len_correction(0);
        tl.append(on(96, 60));
        tl.append(off(96, 60));
        let report = tl.verify_and_link(0);
        assert_eq!(report.linked, 0);
        assert_eq!(report.unlinked_note_ons, 1);
    }

    #[test]
    fn test_legato_notes_keep_their_own_offs() {
        let mut tl = EventTimeline::new();
        tl.append(on(0, 60));
        tl.append(off(96, 60));
        tl.append(on(96, 60));
        tl.append(off(192, 60));
        let report = tl.verify_and_link(0);
        assert_eq!(report.linked, 2);
        let second = index_of(&tl, 96, true);
        assert_eq!(tl.note_length(second), Some(96));
    }

    #[test]
    fn test_wraparound_linking() {
        let build = || {
            let mut tl = EventTimeline::with_length(768);
            tl.append(off(50, 60));
            tl.append(on(700, 60));
            tl
        };

        let mut wrapped = build();
        wrapped.set_link_wraparound(true);
        let report = wrapped.verify_and_link(768);
        assert_eq!(report.linked, 1);
        assert_eq!(report.wrapped, 1);
        let start = index_of(&wrapped, 700, true);
        assert_eq!(wrapped.note_length(start), Some(118));

        let mut plain = build();
        let report = plain.verify_and_link(768);
        assert_eq!(report.linked, 0);
        assert_eq!(report.unlinked_note_ons, 1);

        let mut forced = build();
        assert_eq!(forced.verify_and_link_with(768, true).wrapped, 1);
    }

    #[test]
    fn test_direct_link_preferred_over_wrap() {
        let mut tl = EventTimeline::with_length(768);
        tl.set_link_wraparound(true);
        tl.append(on(0, 60));
        tl.append(off(50, 60));
        let report = tl.verify_and_link(768);
        assert_eq!(report.linked, 1);
        assert_eq!(report.wrapped, 0);
    }

    #[test]
    fn test_sort_keeps_links_valid() {
        let mut tl = EventTimeline::new();
        tl.append(on(10, 60));
        tl.append(off(20, 60));
        tl.verify_and_link(0);
        let generation = tl.generation();
        let stale = tl.handle(0).unwrap();

        tl.add(on(0, 62));
        assert_ne!(tl.generation(), generation);
        assert_eq!(tl.resolve(stale), None);

        let start = index_of(&tl, 10, true);
        let p = tl.partner(start).unwrap();
        assert_eq!(tl.get(p).unwrap().timestamp(), 20);
    }

    #[test]
    fn test_remove_clears_partner_link() {
        let mut tl = EventTimeline::new();
        tl.append(on(0, 60));
        tl.append(off(10, 60));
        tl.verify_and_link(0);
        let removed = tl.remove(1).unwrap();
        assert!(removed.is_note_off());
        assert!(!removed.is_linked());
        assert!(!tl.get(0).unwrap().is_linked());
        assert!(tl.remove(5).is_none());
    }

    #[test]
    fn test_prune_out_of_range_takes_partner() {
        let mut tl = EventTimeline::new();
        tl.append(on(700, 60));
        tl.append(off(900, 60));
        tl.append(on(0, 62));
        tl.append(off(10, 62));
        let report = tl.verify_and_link(768);
        assert_eq!(report.pruned, 2);
        assert_eq!(tl.len(), 2);
        assert!(tl.iter().all(|e| e.note() == 62));
    }

    #[test]
    fn test_remove_unlinked_notes() {
        let mut tl = EventTimeline::new();
        tl.append(on(0, 60));
        tl.append(off(10, 60));
        tl.append(off(20, 61));
        tl.append(TimedEvent::control_change(5, 0, 7, 90));
        tl.verify_and_link(0);
        assert_eq!(tl.remove_unlinked_notes(), 1);
        assert_eq!(tl.len(), 3);
    }

    #[test]
    fn test_selection_ops() {
        let mut tl = EventTimeline::new();
        for ts in [0, 10, 20, 30] {
            tl.append(on(ts, 60));
        }
        assert_eq!(tl.select_in_range(10, 30), 2);
        assert_eq!(tl.count_selected_notes(), 2);
        tl.invert_selection();
        assert_eq!(tl.count_selected(), 2);
        assert!(tl.get(0).unwrap().is_selected());
        assert_eq!(tl.mark_selected(), 2);
        assert_eq!(tl.remove_marked(), 2);
        assert_eq!(tl.len(), 2);
        tl.unselect_all();
        assert!(!tl.any_selected_notes());
    }

    #[test]
    fn test_meta_flags_follow_contents() {
        let mut tl = EventTimeline::new();
        assert!(!tl.has_tempo());
        tl.append(TimedEvent::tempo(0, 120.0));
        tl.append(TimedEvent::time_signature(0, 4, 4, 24, 8));
        assert!(tl.has_tempo());
        assert!(tl.has_time_signature());
        assert!(!tl.has_key_signature());
        assert!(tl.is_modified());
        tl.clear_modified();
        tl.remove(0);
        assert!(tl.is_modified());
        tl.clear();
        assert!(!tl.has_tempo());
        assert!(!tl.has_time_signature());
    }

    #[test]
    fn test_mod_timestamps_wraps_and_sorts() {
        let mut tl = EventTimeline::new();
        tl.append(on(800, 60));
        tl.append(on(100, 62));
        tl.mod_timestamps(768);
        let stamps: Vec<_> = tl.iter().map(|e| e.timestamp()).collect();
        assert_eq!(stamps, vec![32, 100]);
        assert_eq!(tl.max_timestamp(), Some(100));
    }

    #[test]
    fn test_merge_relinks() {
        let mut a = EventTimeline::with_length(768);
        a.append(on(0, 60));
        let mut b = EventTimeline::new();
        b.append(off(96, 60));
        let report = a.merge(b, true);
        assert_eq!(report.linked, 1);
        assert_eq!(a.len(), 2);
    }
}
