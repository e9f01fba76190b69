//! An ordered pipeline for placing variable length outputs produced out of order.
//!
//! Threads processing consecutive blocks do not know where their output goes until every
//! earlier block has been sized. [`IoChain`] hands out iterations in order and lets iteration
//! `i` learn its input offset from iteration `i - 1` as soon as that iteration knows how much
//! input it consumes, and its output offset once iteration `i - 1` knows how much output it
//! produced. The heavy work in between runs concurrently.
//!
//! Each iteration walks through the steps exactly once, in order, enforced by the ticket types:
//!
//! 1. [`IoChain::get_in`] claims the next iteration and waits for its input offset.
//! 2. [`InputClaim::set_next_in`] publishes the input offset of the following iteration.
//! 3. [`PendingOutput::get_out`] waits for this iteration's output offset.
//! 4. [`OutputClaim::set_next_out`] publishes the output offset of the following iteration.
//!
//! At most `window` iterations are in flight at once; further threads block in step 1.
//!
//! Every ticket must be driven to [`OutputClaim::set_next_out`]. Dropping one part way
//! stalls every later iteration forever. Workers that fail must still publish, typically a
//! zero length advance, and report the failure through their own result.
//!
//! # Examples
//!
//! ```
//! use bitshuffle_core::iochain::IoChain;
//!
//! let chain = IoChain::new(0, 0);
//! let claim = chain.get_in();
//! assert_eq!((claim.iteration(), claim.input()), (0, 0));
//!
//! let out = claim.set_next_in(16).get_out();
//! assert_eq!(out.output(), 0);
//! out.set_next_out(7);
//!
//! let claim = chain.get_in();
//! assert_eq!((claim.iteration(), claim.input()), (1, 16));
//! let out = claim.set_next_in(32).get_out();
//! assert_eq!(out.output(), 7);
//! out.set_next_out(10);
//! ```

use std::boxed::Box;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Default number of iterations allowed in flight.
pub const DEFAULT_WINDOW: usize = 33;

/// Smallest usable window. Iterations `i` and `i + 1` must map to different slots.
pub const MIN_WINDOW: usize = 2;

/// Lifecycle of one ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// Free for the next iteration mapping to this slot.
    Empty,
    /// Reserved by the iteration that will publish into it.
    Claimed { iteration: usize },
    /// Holds the offset for `iteration`.
    Published { iteration: usize, offset: usize },
    /// Offset handed to `iteration`, which still owns the slot.
    Consumed { iteration: usize },
}

struct Slot {
    state: Mutex<SlotState>,
    changed: Condvar,
}

impl Slot {
    fn new(state: SlotState) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        }
    }

    // Every transition is a single store, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_for(&self, mut ready: impl FnMut(&SlotState) -> bool) -> MutexGuard<'_, SlotState> {
        let guard = self.lock();
        self.changed
            .wait_while(guard, |state| !ready(state))
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, mut guard: MutexGuard<'_, SlotState>, state: SlotState) {
        *guard = state;
        drop(guard);
        self.changed.notify_all();
    }

    /// Empty -> Claimed
    fn claim(&self, iteration: usize) {
        let guard = self.wait_for(|state| *state == SlotState::Empty);
        self.set(guard, SlotState::Claimed { iteration });
    }

    /// Claimed -> Published
    fn publish(&self, iteration: usize, offset: usize) {
        let guard = self.lock();
        debug_assert_eq!(*guard, SlotState::Claimed { iteration });
        self.set(guard, SlotState::Published { iteration, offset });
    }

    /// Published -> Consumed, returning the offset.
    fn take(&self, iteration: usize) -> usize {
        let guard = self.wait_for(|state| is_published(state, iteration));
        let offset = published_offset(&guard);
        self.set(guard, SlotState::Consumed { iteration });
        offset
    }

    /// Consumed -> Empty
    fn release(&self, iteration: usize) {
        let guard = self.lock();
        debug_assert_eq!(*guard, SlotState::Consumed { iteration });
        self.set(guard, SlotState::Empty);
    }

    /// Published -> Empty, returning the offset.
    fn read(&self, iteration: usize) -> usize {
        let guard = self.wait_for(|state| is_published(state, iteration));
        let offset = published_offset(&guard);
        self.set(guard, SlotState::Empty);
        offset
    }
}

#[inline]
fn is_published(state: &SlotState, iteration: usize) -> bool {
    matches!(state, SlotState::Published { iteration: i, .. } if *i == iteration)
}

#[inline]
fn published_offset(state: &SlotState) -> usize {
    match state {
        SlotState::Published { offset, .. } => *offset,
        _ => 0,
    }
}

/// A ring of input and output offset slots shared by the threads of one pipelined run.
pub struct IoChain {
    next: Mutex<usize>,
    inputs: Box<[Slot]>,
    outputs: Box<[Slot]>,
}

impl IoChain {
    /// Creates a chain with [`DEFAULT_WINDOW`] whose iteration 0 starts at the given offsets.
    pub fn new(input: usize, output: usize) -> Self {
        Self::with_window(DEFAULT_WINDOW, input, output)
    }

    /// Creates a chain allowing `window` iterations in flight. Windows below [`MIN_WINDOW`] are
    /// raised to it.
    pub fn with_window(window: usize, input: usize, output: usize) -> Self {
        let window = window.max(MIN_WINDOW);
        let ring = |first: usize| -> Box<[Slot]> {
            (0..window)
                .map(|index| {
                    Slot::new(if index == 0 {
                        SlotState::Published {
                            iteration: 0,
                            offset: first,
                        }
                    } else {
                        SlotState::Empty
                    })
                })
                .collect()
        };

        Self {
            next: Mutex::new(0),
            inputs: ring(input),
            outputs: ring(output),
        }
    }

    /// Number of iterations allowed in flight.
    pub fn window(&self) -> usize {
        self.inputs.len()
    }

    fn input_slot(&self, iteration: usize) -> &Slot {
        &self.inputs[iteration % self.inputs.len()]
    }

    fn output_slot(&self, iteration: usize) -> &Slot {
        &self.outputs[iteration % self.outputs.len()]
    }

    /// Claims the next iteration and waits until its input offset is known.
    ///
    /// The slots of the following iteration are reserved before the claim is handed out, so
    /// no later iteration can observe them before this one publishes.
    pub fn get_in(&self) -> InputClaim<'_> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let iteration = *next;
        *next += 1;

        let input = self.input_slot(iteration).take(iteration);
        self.input_slot(iteration + 1).claim(iteration + 1);
        self.output_slot(iteration + 1).claim(iteration + 1);
        drop(next);

        InputClaim {
            chain: self,
            iteration,
            input,
        }
    }
}

/// An iteration that knows its input offset.
#[must_use = "the chain stalls unless every claim reaches `set_next_out`"]
pub struct InputClaim<'a> {
    chain: &'a IoChain,
    iteration: usize,
    input: usize,
}

impl<'a> InputClaim<'a> {
    /// Index of this iteration.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Input offset of this iteration.
    pub fn input(&self) -> usize {
        self.input
    }

    /// Publishes where the next iteration's input starts.
    pub fn set_next_in(self, next: usize) -> PendingOutput<'a> {
        self.chain
            .input_slot(self.iteration + 1)
            .publish(self.iteration + 1, next);
        PendingOutput {
            chain: self.chain,
            iteration: self.iteration,
        }
    }
}

/// An iteration that has published its input and may now do its work.
#[must_use = "the chain stalls unless every claim reaches `set_next_out`"]
pub struct PendingOutput<'a> {
    chain: &'a IoChain,
    iteration: usize,
}

impl<'a> PendingOutput<'a> {
    /// Index of this iteration.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Waits until the previous iteration publishes this iteration's output offset.
    pub fn get_out(self) -> OutputClaim<'a> {
        let output = self.chain.output_slot(self.iteration).read(self.iteration);
        OutputClaim {
            chain: self.chain,
            iteration: self.iteration,
            output,
        }
    }
}

/// An iteration that knows where its output goes.
#[must_use = "the chain stalls unless every claim reaches `set_next_out`"]
pub struct OutputClaim<'a> {
    chain: &'a IoChain,
    iteration: usize,
    output: usize,
}

impl OutputClaim<'_> {
    /// Index of this iteration.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Output offset of this iteration.
    pub fn output(&self) -> usize {
        self.output
    }

    /// Publishes where the next iteration's output starts and retires this iteration.
    pub fn set_next_out(self, next: usize) {
        self.chain
            .output_slot(self.iteration + 1)
            .publish(self.iteration + 1, next);
        // Held until now so no thread can lap this one by a full window.
        self.chain.input_slot(self.iteration).release(self.iteration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn window_is_at_least_two() {
        assert_eq!(IoChain::with_window(0, 0, 0).window(), MIN_WINDOW);
        assert_eq!(IoChain::new(0, 0).window(), DEFAULT_WINDOW);
    }

    #[test]
    fn sequential_use_accumulates_offsets() {
        let chain = IoChain::with_window(2, 100, 200);
        let mut expected_in = 100;
        let mut expected_out = 200;
        for iteration in 0..10 {
            let claim = chain.get_in();
            assert_eq!(claim.iteration(), iteration);
            assert_eq!(claim.input(), expected_in);
            expected_in += iteration + 1;
            let out = claim.set_next_in(expected_in).get_out();
            assert_eq!(out.output(), expected_out);
            expected_out += 2 * iteration;
            out.set_next_out(expected_out);
        }
    }

    /// Iteration `i` consumes 1 input byte and produces `i + 1` output bytes of value `i`.
    /// Iterations 0 and 1 finish their work last.
    #[test]
    fn output_order_survives_adversarial_completion() {
        const ITERATIONS: usize = 4;
        let chain = IoChain::with_window(4, 0, 0);
        let output = Mutex::new(vec![0xFFu8; 10]);
        let finished = Mutex::new(Vec::new());
        let ranges = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for _ in 0..ITERATIONS {
                scope.spawn(|| {
                    let claim = chain.get_in();
                    let iteration = claim.iteration();
                    let input = claim.input();
                    let pending = claim.set_next_in(input + 1);

                    if iteration < 2 {
                        thread::sleep(Duration::from_millis(150 - 50 * iteration as u64));
                    }
                    let produced = vec![iteration as u8; iteration + 1];
                    finished.lock().unwrap().push(iteration);

                    let out = pending.get_out();
                    let start = out.output();
                    output.lock().unwrap()[start..start + produced.len()]
                        .copy_from_slice(&produced);
                    ranges.lock().unwrap().push((iteration, start, start + produced.len()));
                    out.set_next_out(start + produced.len());
                });
            }
        });

        let finished = finished.into_inner().unwrap();
        let position = |i: usize| finished.iter().position(|&x| x == i).unwrap();
        assert!(position(2) < position(0));
        assert!(position(2) < position(1));

        assert_eq!(
            output.into_inner().unwrap(),
            vec![0, 1, 1, 2, 2, 2, 3, 3, 3, 3]
        );

        let mut ranges = ranges.into_inner().unwrap();
        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].2 <= pair[1].1, "ranges overlap: {pair:?}");
        }
    }

    #[test]
    fn many_threads_small_window() {
        const ITERATIONS: usize = 64;
        let chain = IoChain::with_window(3, 0, 0);
        let placed = Mutex::new(vec![usize::MAX; ITERATIONS]);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| loop {
                    let claim = chain.get_in();
                    let iteration = claim.iteration();
                    let out = claim.set_next_in(iteration + 1).get_out();
                    let start = out.output();
                    if iteration < ITERATIONS {
                        placed.lock().unwrap()[iteration] = start;
                    }
                    out.set_next_out(start + 2);
                    if iteration >= ITERATIONS {
                        break;
                    }
                });
            }
        });

        let placed = placed.into_inner().unwrap();
        for (iteration, start) in placed.into_iter().enumerate() {
            assert_eq!(start, 2 * iteration);
        }
    }
}
