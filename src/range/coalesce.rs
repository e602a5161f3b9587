//! Merging of overlapping and adjacent ranges.

use crate::addr::{AddrRange, Address};

/// Streaming range coalescer.
///
/// Ranges must be pushed in ascending `start` order (ties by `end`). The
/// order is not checked. Each call to [`push`](Self::push) returns the
/// previous run once it can no longer grow.
#[derive(Debug, Clone)]
pub struct Coalescer<A> {
    run: Option<AddrRange<A>>,
}

impl<A: Address> Default for Coalescer<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Address> Coalescer<A> {
    pub fn new() -> Self {
        Self { run: None }
    }

    /// Feed the next range; returns a finished run when `range` starts a new one.
    pub fn push(&mut self, range: AddrRange<A>) -> Option<AddrRange<A>> {
        let Some(run) = self.run.as_mut() else {
            self.run = Some(range);
            return None;
        };

        // a run ending at MAX absorbs everything after it
        let touches = match run.end.checked_next() {
            Some(next) => range.start <= next,
            None => true,
        };

        if touches {
            run.end = run.end.max(range.end);
            None
        } else {
            self.run.replace(range)
        }
    }

    /// Flush the run in progress.
    pub fn finish(&mut self) -> Option<AddrRange<A>> {
        self.run.take()
    }
}

/// Iterator adapter returned by [`coalesce`].
pub struct Coalesce<I, A> {
    inner: I,
    state: Coalescer<A>,
    done: bool,
}

impl<I, A> Iterator for Coalesce<I, A>
where
    I: Iterator<Item = AddrRange<A>>,
    A: Address,
{
    type Item = AddrRange<A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for range in self.inner.by_ref() {
            if let Some(run) = self.state.push(range) {
                return Some(run);
            }
        }
        self.done = true;
        self.state.finish()
    }
}

/// Coalesce a start-ordered sequence of ranges into disjoint, non-adjacent runs.
pub fn coalesce<I, A>(ranges: I) -> Coalesce<I::IntoIter, A>
where
    I: IntoIterator<Item = AddrRange<A>>,
    A: Address,
{
    Coalesce {
        inner: ranges.into_iter(),
        state: Coalescer::new(),
        done: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u32, end: u32) -> AddrRange<u32> {
        AddrRange { start, end }
    }

    #[test]
    fn test_empty() {
        let out: Vec<_> = coalesce(Vec::<AddrRange<u32>>::new()).collect();
        assert!(out.is_empty());
    }

    #[test]
    fn test_single() {
        let out: Vec<_> = coalesce(vec![r(5, 9)]).collect();
        assert_eq!(out, vec![r(5, 9)]);
    }

    #[test]
    fn test_adjacent_merge() {
        let out: Vec<_> = coalesce(vec![r(0, 255), r(256, 511)]).collect();
        assert_eq!(out, vec![r(0, 511)]);
    }

    #[test]
    fn test_gap_kept() {
        let out: Vec<_> = coalesce(vec![r(0, 255), r(512, 767)]).collect();
        assert_eq!(out, vec![r(0, 255), r(512, 767)]);
    }

    #[test]
    fn test_overlap_and_containment() {
        let out: Vec<_> = coalesce(vec![r(0, 100), r(10, 20), r(50, 150), r(151, 151), r(200, 300)])
            .collect();
        assert_eq!(out, vec![r(0, 151), r(200, 300)]);
    }

    #[test]
    fn test_top_of_space() {
        let out: Vec<_> = coalesce(vec![r(10, u32::MAX), r(20, 30), r(u32::MAX, u32::MAX)]).collect();
        assert_eq!(out, vec![r(10, u32::MAX)]);

        let out: Vec<_> = coalesce(vec![
            AddrRange { start: 0u128, end: 1 },
            AddrRange { start: 2, end: u128::MAX },
        ])
        .collect();
        assert_eq!(out, vec![AddrRange::full()]);
    }

    #[test]
    fn test_push_finish() {
        let mut c = Coalescer::new();
        assert_eq!(c.push(r(0, 9)), None);
        assert_eq!(c.push(r(10, 19)), None);
        assert_eq!(c.push(r(30, 39)), Some(r(0, 19)));
        assert_eq!(c.finish(), Some(r(30, 39)));
        assert_eq!(c.finish(), None);
    }
}
