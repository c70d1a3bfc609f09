//! Generators for the input patterns and sequences used to exercise a temporal memory.
//!
//! A pattern is a sorted list of `w` distinct active bits out of `n`, fed to the temporal memory
//! as its active columns. A sequence is a list of patterns where `None` marks a reset.
//!
//! - [`PatternMachine`]: a fixed set of random patterns.
//! - [`ConsecutivePatternMachine`]: pattern `i` is the block of bits `i * w .. (i + 1) * w`,
//!   so patterns never overlap.
//! - [`SequenceMachine`]: turns number sequences into pattern sequences, generates
//!   number sequences and adds spatial noise.

use super::random::Random;
use crate::error::{HtmError, Result};
use fxhash::FxHashSet;
use std::ops::Range;

/// A numbered collection of patterns.
pub trait PatternSource {
    /// Returns pattern `number`.
    fn get(&self, number: usize) -> Result<&[usize]>;

    /// Total number of bits.
    fn n(&self) -> usize;

    /// Active bits per pattern.
    fn w(&self) -> usize;
}

/// A fixed collection of random patterns.
#[derive(Debug, Clone)]
pub struct PatternMachine {
    n: usize,
    w: usize,
    patterns: Vec<Vec<usize>>,
}

impl PatternMachine {
    /// Generates `num_patterns` patterns of `w` distinct bits out of `n`.
    pub fn new(n: usize, w: usize, num_patterns: usize, seed: u64) -> Result<Self> {
        if w == 0 || w > n {
            return Err(HtmError::Configuration(format!(
                "pattern width must be in 1..={}, got {}",
                n, w
            )));
        }

        let mut rand = Random::new(seed);
        let bits: Vec<usize> = (0..n).collect();
        let patterns = (0..num_patterns)
            .map(|_| rand.sample(&bits, w))
            .collect();

        Ok(Self { n, w, patterns })
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }
}

impl PatternSource for PatternMachine {
    fn get(&self, number: usize) -> Result<&[usize]> {
        self.patterns
            .get(number)
            .map(Vec::as_slice)
            .ok_or(HtmError::Range {
                kind: "pattern",
                index: number,
                len: self.patterns.len(),
            })
    }

    fn n(&self) -> usize {
        self.n
    }

    fn w(&self) -> usize {
        self.w
    }
}

/// Non-overlapping patterns made of consecutive bits.
#[derive(Debug, Clone)]
pub struct ConsecutivePatternMachine {
    n: usize,
    w: usize,
    patterns: Vec<Vec<usize>>,
}

impl ConsecutivePatternMachine {
    /// Creates the `n / w` patterns of `w` consecutive bits.
    pub fn new(n: usize, w: usize) -> Result<Self> {
        if w == 0 || w > n {
            return Err(HtmError::Configuration(format!(
                "pattern width must be in 1..={}, got {}",
                n, w
            )));
        }

        let patterns = (0..n / w).map(|i| (i * w..(i + 1) * w).collect()).collect();

        Ok(Self { n, w, patterns })
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }
}

impl PatternSource for ConsecutivePatternMachine {
    fn get(&self, number: usize) -> Result<&[usize]> {
        self.patterns
            .get(number)
            .map(Vec::as_slice)
            .ok_or(HtmError::Range {
                kind: "pattern",
                index: number,
                len: self.patterns.len(),
            })
    }

    fn n(&self) -> usize {
        self.n
    }

    fn w(&self) -> usize {
        self.w
    }
}

/// Builds pattern sequences from a [`PatternSource`].
#[derive(Debug, Clone)]
pub struct SequenceMachine<P> {
    patterns: P,
    rand: Random,
}

impl<P: PatternSource> SequenceMachine<P> {
    pub fn new(patterns: P, seed: u64) -> Self {
        Self {
            patterns,
            rand: Random::new(seed),
        }
    }

    pub fn patterns(&self) -> &P {
        &self.patterns
    }

    /// Maps each number to its pattern; `None` stays a reset marker.
    pub fn generate_from_numbers(&self, numbers: &[Option<usize>]) -> Result<Vec<Option<Vec<usize>>>> {
        numbers
            .iter()
            .map(|number| match number {
                Some(number) => self.patterns.get(*number).map(|p| Some(p.to_vec())),
                None => Ok(None),
            })
            .collect()
    }

    /// Replaces `round(amount * len)` randomly chosen bits of every pattern with random bits
    /// it does not contain yet. Reset markers are kept.
    pub fn add_spatial_noise(
        &mut self,
        sequence: &[Option<Vec<usize>>],
        amount: f64,
    ) -> Vec<Option<Vec<usize>>> {
        sequence
            .iter()
            .map(|pattern| pattern.as_ref().map(|bits| self.add_noise(bits, amount)))
            .collect()
    }

    fn add_noise(&mut self, bits: &[usize], amount: f64) -> Vec<usize> {
        let mut bits = bits.to_vec();
        bits.sort_unstable();
        bits.dedup();

        let replaced = ((amount.clamp(0.0, 1.0) * bits.len() as f64).round() as usize).min(bits.len());
        if replaced == 0 {
            return bits;
        }

        let present: FxHashSet<usize> = bits.iter().copied().collect();
        let free: Vec<usize> = (0..self.patterns.n())
            .filter(|bit| !present.contains(bit))
            .collect();

        let mut noisy = self.rand.sample(&bits, bits.len() - replaced);
        noisy.extend(self.rand.sample(&free, replaced));
        noisy.sort_unstable();
        noisy
    }

    /// Generates `num_sequences` sequences of `length` numbers, each followed by a reset marker.
    /// - Sequence `i` is a shuffled run of `i * length .. (i + 1) * length`.
    /// - With `shared_range`, those positions of every sequence are overwritten by one common
    ///   block of numbers following all the sequence numbers.
    pub fn generate_numbers(
        &mut self,
        num_sequences: usize,
        length: usize,
        shared_range: Option<Range<usize>>,
    ) -> Result<Vec<Option<usize>>> {
        if let Some(range) = &shared_range {
            if range.start > range.end || range.end > length {
                return Err(HtmError::Range {
                    kind: "shared range",
                    index: range.end,
                    len: length,
                });
            }
        }

        let shared_start = num_sequences * length;
        let mut numbers = Vec::with_capacity(num_sequences * (length + 1));

        for i in 0..num_sequences {
            let mut sequence: Vec<usize> = (i * length..(i + 1) * length).collect();
            self.rand.shuffle(&mut sequence);

            if let Some(range) = &shared_range {
                for (offset, position) in range.clone().enumerate() {
                    sequence[position] = shared_start + offset;
                }
            }

            numbers.extend(sequence.into_iter().map(Some));
            numbers.push(None);
        }

        Ok(numbers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consecutive_machine() -> SequenceMachine<ConsecutivePatternMachine> {
        SequenceMachine::new(ConsecutivePatternMachine::new(100, 5).unwrap(), 42)
    }

    /// Splits generated numbers at the reset markers.
    fn split_sequences(numbers: &[Option<usize>]) -> Vec<Vec<usize>> {
        numbers
            .split(Option::is_none)
            .filter(|run| !run.is_empty())
            .map(|run| run.iter().flatten().copied().collect())
            .collect()
    }

    #[test]
    fn pattern_machine_patterns() {
        let machine = PatternMachine::new(100, 10, 50, 42).unwrap();
        assert_eq!(machine.num_patterns(), 50);

        for i in 0..50 {
            let pattern = machine.get(i).unwrap();
            assert_eq!(pattern.len(), 10);
            assert!(pattern.windows(2).all(|w| w[0] < w[1]));
            assert!(pattern.iter().all(|&bit| bit < 100));
        }

        assert!(matches!(machine.get(50), Err(HtmError::Range { .. })));
        assert!(PatternMachine::new(10, 11, 1, 42).is_err());
    }

    #[test]
    fn consecutive_pattern_machine_patterns() {
        let machine = ConsecutivePatternMachine::new(100, 5).unwrap();
        assert_eq!(machine.num_patterns(), 20);
        assert_eq!(machine.get(0).unwrap(), &[0, 1, 2, 3, 4]);
        assert_eq!(machine.get(19).unwrap(), &[95, 96, 97, 98, 99]);
        assert!(machine.get(20).is_err());
    }

    #[test]
    fn generate_from_numbers() {
        let machine = consecutive_machine();
        let mut numbers: Vec<Option<usize>> = (0..10).map(Some).collect();
        numbers.push(None);
        numbers.extend((10..19).map(Some));

        let sequence = machine.generate_from_numbers(&numbers).unwrap();
        assert_eq!(sequence.len(), 20);
        assert_eq!(sequence[0].as_deref(), Some(machine.patterns().get(0).unwrap()));
        assert_eq!(sequence[10], None);
        assert_eq!(sequence[11].as_deref(), Some(machine.patterns().get(10).unwrap()));

        assert!(machine.generate_from_numbers(&[Some(20)]).is_err());
    }

    #[test]
    fn add_spatial_noise() {
        let patterns = PatternMachine::new(10000, 1000, 100, 42).unwrap();
        let mut machine = SequenceMachine::new(patterns, 42);
        let numbers: Vec<Option<usize>> = (0..100).map(Some).collect();
        let sequence = machine.generate_from_numbers(&numbers).unwrap();

        let clean_bits: FxHashSet<usize> = machine.patterns().get(0).unwrap().iter().copied().collect();

        let noisy = machine.add_spatial_noise(&sequence, 0.5);
        let bits = noisy[0].as_ref().unwrap();
        let overlap = bits.iter().filter(|bit| clean_bits.contains(bit)).count();
        assert_eq!(bits.len(), 1000);
        assert!(400 < overlap && overlap < 600);

        let clean = machine.add_spatial_noise(&sequence, 0.0);
        assert_eq!(clean, sequence);
    }

    #[test]
    fn add_spatial_noise_keeps_resets() {
        let mut machine = consecutive_machine();
        let sequence = machine
            .generate_from_numbers(&[Some(0), None, Some(1)])
            .unwrap();

        let noisy = machine.add_spatial_noise(&sequence, 0.4);
        assert_eq!(noisy[1], None);
        assert_eq!(noisy[0].as_ref().unwrap().len(), 5);
    }

    #[test]
    fn generate_numbers() {
        let mut machine = consecutive_machine();
        let numbers = machine.generate_numbers(1, 100, None).unwrap();
        assert_eq!(numbers.len(), 101);
        assert_eq!(numbers[100], None);

        let mut sequence = split_sequences(&numbers).remove(0);
        let expected: Vec<usize> = (0..100).collect();
        assert_ne!(sequence, expected);
        sequence.sort_unstable();
        assert_eq!(sequence, expected);
    }

    #[test]
    fn generate_numbers_multiple_sequences() {
        let mut machine = consecutive_machine();
        let numbers = machine.generate_numbers(3, 100, None).unwrap();
        let sequences = split_sequences(&numbers);
        assert_eq!(sequences.len(), 3);

        for (i, mut sequence) in sequences.into_iter().enumerate() {
            sequence.sort_unstable();
            assert_eq!(sequence, (i * 100..(i + 1) * 100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn generate_numbers_with_shared() {
        let mut machine = consecutive_machine();
        let numbers = machine.generate_numbers(3, 100, Some(20..35)).unwrap();
        let shared: Vec<usize> = (300..315).collect();

        for sequence in split_sequences(&numbers) {
            assert_eq!(sequence.len(), 100);
            assert_eq!(sequence[20..35], shared[..]);
        }

        assert!(machine.generate_numbers(3, 100, Some(90..101)).is_err());
    }
}
