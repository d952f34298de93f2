/// A jump in the reply sequence
///
/// Every sequence number strictly between `from` and `to` is presumed lost.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Gap {
    pub from: u16,
    pub to: u16,
}

impl Gap {
    /// Number of replies presumed lost inside this gap
    pub fn missing(&self) -> u16 {
        self.to - self.from - 1
    }
}

/// Classifies accepted replies as in-order or as following a gap
///
/// The tracker only remembers the previously accepted sequence number, not every sequence number
/// seen so far. A reply that arrives out of order is therefore simply taken as the next one. The
/// first reply never reports a gap, whatever its sequence number.
///
/// Sequence numbers are compared as plain integers. Replies lost across the wrap from 65535 back
/// to 0 are not reported, the first reply after the wrap merely resets the comparison.
///
/// Duplicate replies must not be passed to `observe`.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<u16>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last accepted sequence number, if any reply was accepted yet
    pub fn last(&self) -> Option<u16> {
        self.last
    }

    /// Accept the next reply and report a gap, if the sequence jumped by more than one
    pub fn observe(&mut self, seq: u16) -> Option<Gap> {
        let prev = self.last.replace(seq)?;

        if i32::from(seq) - i32::from(prev) > 1 {
            Some(Gap { from: prev, to: seq })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&[0, 1, 2, 3, 4]; "starting at zero")]
    #[test_case(&[1, 2, 3]; "starting at one")]
    #[test_case(&[7]; "single reply")]
    fn no_gap_for_consecutive_sequences(sequence: &[u16]) {
        let mut tracker = SequenceTracker::new();
        for &seq in sequence {
            assert_eq!(tracker.observe(seq), None);
        }
        assert_eq!(tracker.last(), sequence.last().copied());
    }

    #[test_case(0; "at zero")]
    #[test_case(7; "late first reply")]
    #[test_case(u16::MAX; "at the end of the range")]
    fn first_reply_never_gaps(seq: u16) {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.last(), None);
        assert_eq!(tracker.observe(seq), None);
        assert_eq!(tracker.last(), Some(seq));
    }

    #[test]
    fn report_each_gap_exactly_once() {
        let mut tracker = SequenceTracker::new();
        let gaps: Vec<_> = [1, 2, 4, 5, 9, 10]
            .iter()
            .filter_map(|&seq| tracker.observe(seq))
            .collect();

        assert_eq!(
            gaps,
            vec![Gap { from: 2, to: 4 }, Gap { from: 5, to: 9 }]
        );
        assert_eq!(gaps[0].missing(), 1);
        assert_eq!(gaps[1].missing(), 3);
    }

    #[test]
    fn reordered_reply_is_accepted_as_next() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(5), None);
        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.last(), Some(3));
        assert_eq!(tracker.observe(4), None);
        assert_eq!(tracker.observe(7), Some(Gap { from: 4, to: 7 }));
    }

    #[test]
    fn loss_across_wrap_is_not_reported() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(65_534), None);
        assert_eq!(tracker.observe(1), None);
        assert_eq!(tracker.observe(3), Some(Gap { from: 1, to: 3 }));
    }
}
