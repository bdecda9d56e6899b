// src/criterion/layout.rs
use ndarray::{s, Array2};

/// State of one (slot, time step) cell of a minibatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Empty,
    Sample,
    Gap,
}

/// One sequence placed in a parallel slot. `t_begin` may be negative and `t_end`
/// may exceed the number of time steps when the sequence was cut at a minibatch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceInfo {
    pub seq_id: usize,
    pub slot: usize,
    pub t_begin: isize,
    pub t_end: isize,
}

impl SequenceInfo {
    pub fn len(&self) -> usize {
        (self.t_end - self.t_begin).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Describes how variable-length sequences are packed into a
/// `[num_parallel_sequences x num_time_steps]` minibatch.
/// Cells not covered by a sequence are padding and do not count as samples.
#[derive(Debug, Clone)]
pub struct MinibatchLayout {
    frames: Array2<Frame>,
    sequences: Vec<SequenceInfo>,
}

impl MinibatchLayout {
    pub fn new(num_parallel_sequences: usize, num_time_steps: usize) -> Self {
        Self {
            frames: Array2::from_elem((num_parallel_sequences, num_time_steps), Frame::Empty),
            sequences: Vec::new(),
        }
    }

    /// A layout where every cell is a sample, e.g. a plain frame-mode minibatch.
    pub fn dense(num_parallel_sequences: usize, num_time_steps: usize) -> Result<Self, String> {
        let mut layout = Self::new(num_parallel_sequences, num_time_steps);
        for slot in 0..num_parallel_sequences {
            layout.add_sequence(slot, slot, 0, num_time_steps as isize)?;
        }
        Ok(layout)
    }

    pub fn num_parallel_sequences(&self) -> usize {
        self.frames.nrows()
    }

    pub fn num_time_steps(&self) -> usize {
        self.frames.ncols()
    }

    pub fn num_cols(&self) -> usize {
        self.frames.len()
    }

    pub fn sequences(&self) -> &[SequenceInfo] {
        &self.sequences
    }

    pub fn add_sequence(
        &mut self,
        seq_id: usize,
        slot: usize,
        t_begin: isize,
        t_end: isize,
    ) -> Result<(), String> {
        self.occupy(slot, t_begin, t_end, Frame::Sample)?;
        self.sequences.push(SequenceInfo {
            seq_id,
            slot,
            t_begin,
            t_end,
        });
        Ok(())
    }

    /// Marks `[t_begin, t_end)` of `slot` as an explicit gap.
    pub fn add_gap(&mut self, slot: usize, t_begin: usize, t_end: usize) -> Result<(), String> {
        self.occupy(slot, t_begin as isize, t_end as isize, Frame::Gap)
    }

    /// Number of cells holding real samples, excluding padding and gaps.
    pub fn actual_num_samples(&self) -> u64 {
        self.frames.iter().filter(|&&f| f == Frame::Sample).count() as u64
    }

    pub fn num_gap_frames(&self) -> usize {
        self.frames.iter().filter(|&&f| f == Frame::Gap).count()
    }

    fn occupy(&mut self, slot: usize, t_begin: isize, t_end: isize, kind: Frame) -> Result<(), String> {
        if slot >= self.num_parallel_sequences() {
            return Err(format!(
                "Slot {} is out of range for {} parallel sequences",
                slot,
                self.num_parallel_sequences()
            ));
        }
        if t_begin >= t_end {
            return Err(format!("Empty or inverted range [{}, {})", t_begin, t_end));
        }

        // Only the part inside the minibatch window occupies cells
        let steps = self.num_time_steps() as isize;
        let begin = t_begin.clamp(0, steps) as usize;
        let end = t_end.clamp(0, steps) as usize;
        if begin == end {
            return Err(format!(
                "Range [{}, {}) does not overlap the {} time steps of the minibatch",
                t_begin, t_end, steps
            ));
        }

        let mut cells = self.frames.slice_mut(s![slot, begin..end]);
        if let Some(t) = cells.iter().position(|&f| f != Frame::Empty) {
            return Err(format!(
                "Time step {} of slot {} is already occupied",
                begin + t,
                slot
            ));
        }
        cells.fill(kind);
        Ok(())
    }
}
