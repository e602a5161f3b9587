//! Streaming minimal cover with a block sink.

use crate::addr::{AddrRange, Address, CidrBlock};

use super::{decompose, Coalescer};

/// Run and block counts produced by a [`CoverWriter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CoverCounts {
    pub runs: u64,
    pub blocks: u64,
}

/// Coalesces start-ordered ranges and hands each CIDR block of the minimal
/// cover to `emit` as soon as its run is complete.
pub struct CoverWriter<A, F> {
    coalescer: Coalescer<A>,
    emit: F,
    counts: CoverCounts,
}

impl<A, F, E> CoverWriter<A, F>
where
    A: Address,
    F: FnMut(CidrBlock<A>) -> Result<(), E>,
{
    pub fn new(emit: F) -> Self {
        Self {
            coalescer: Coalescer::new(),
            emit,
            counts: CoverCounts::default(),
        }
    }

    pub fn push(&mut self, range: AddrRange<A>) -> Result<(), E> {
        match self.coalescer.push(range) {
            Some(run) => self.write_run(run),
            None => Ok(()),
        }
    }

    /// Flush the last run.
    pub fn finish(mut self) -> Result<CoverCounts, E> {
        if let Some(run) = self.coalescer.finish() {
            self.write_run(run)?;
        }
        Ok(self.counts)
    }

    fn write_run(&mut self, run: AddrRange<A>) -> Result<(), E> {
        self.counts.runs += 1;
        for block in decompose(run) {
            (self.emit)(block)?;
            self.counts.blocks += 1;
        }
        Ok(())
    }
}
