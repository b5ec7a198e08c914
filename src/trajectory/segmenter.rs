//! Cutting trajectories into overlapping fixed-length pieces.
//!
//! Each trajectory is first sub-sampled with stride `sampling`, giving
//! `sampled_length = ceil(L / sampling)` points and
//! `reduced_length = sampled_length - 1`. It is then cut into `num_pieces`
//! windows of
//!
//!   length_piece = round(2 * reduced_length / (num_pieces + 1))
//!
//! points. Window `m < num_pieces - 1` starts at
//! `round(m * reduced_length / (num_pieces + 1))`, so neighbours share about
//! half their span. The last window is anchored to the tail and always ends on
//! the final sub-sampled point.
//!
//! ```text
//! L = 8, sampling = 1, num_pieces = 3
//! index:   0 1 2 3 4 5 6 7
//! piece 0: x x x x
//! piece 1:     x x x x
//! piece 2:         x x x x
//! ```
//!
//! Rounding is half-to-even throughout.

use std::ops::Range;

use ndarray::{s, Array4, ArrayBase, ArrayView2, ArrayViewD, Axis, Data, Dimension, Ix2};
use tracing::debug;

use crate::error::{Result, StrataError};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Window geometry shared by every trajectory of a given length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Points left after sub-sampling.
    pub sampled_length: usize,
    /// `sampled_length - 1`, the span used by the window formulas.
    pub reduced_length: usize,
    /// Points per window.
    pub length_piece: usize,
    /// Start offset of each window, the last one tail-anchored.
    pub starts: Vec<usize>,
}

impl SegmentLayout {
    /// Compute the layout for trajectories of `length` raw points.
    pub fn new(length: usize, sampling: usize, num_pieces: usize) -> Result<Self> {
        if sampling == 0 {
            return Err(StrataError::config("sampling must be at least 1"));
        }
        if num_pieces == 0 {
            return Err(StrataError::config("num_pieces must be at least 1"));
        }

        let sampled_length = length.div_ceil(sampling);
        if sampled_length == 0 {
            return Err(StrataError::shape(
                "trajectories have zero length after sub-sampling",
            ));
        }
        let reduced_length = sampled_length - 1;

        let denom = num_pieces as f64 + 1.0;
        let length_piece = (2.0 * reduced_length as f64 / denom).round_ties_even() as usize;
        if length_piece == 0 {
            return Err(StrataError::config(format!(
                "trajectories of {sampled_length} sub-sampled points are too short \
                 for {num_pieces} pieces"
            )));
        }

        let tail = sampled_length.checked_sub(length_piece).ok_or_else(|| {
            StrataError::config(format!(
                "piece length {length_piece} exceeds the {sampled_length} sub-sampled points"
            ))
        })?;

        let mut starts: Vec<usize> = (0..num_pieces - 1)
            .map(|m| (m as f64 * reduced_length as f64 / denom).round_ties_even() as usize)
            .collect();
        starts.push(tail);

        if let Some(m) = starts.iter().position(|&st| st + length_piece > sampled_length) {
            return Err(StrataError::config(format!(
                "piece {m} overruns the {sampled_length} sub-sampled points"
            )));
        }

        Ok(Self {
            sampled_length,
            reduced_length,
            length_piece,
            starts,
        })
    }

    /// Number of windows per trajectory.
    pub fn num_pieces(&self) -> usize {
        self.starts.len()
    }

    /// Index range of every window within the sub-sampled trajectory.
    pub fn windows(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.starts.iter().map(|&st| st..st + self.length_piece)
    }
}

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

/// Cut every trajectory into `num_pieces` overlapping windows.
///
/// Accepts `[N, L]` or `[N, L, 1]` input and returns an owned
/// `[N, length_piece, num_pieces, 1]` tensor.
pub fn segment<S, D>(
    trajectories: &ArrayBase<S, D>,
    sampling: usize,
    num_pieces: usize,
) -> Result<Array4<f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let matrix = as_matrix(trajectories.view().into_dyn())?;
    let (n, length) = matrix.dim();
    let layout = SegmentLayout::new(length, sampling, num_pieces)?;

    debug!(
        samples = n,
        sampled_length = layout.sampled_length,
        length_piece = layout.length_piece,
        num_pieces,
        "segmenting trajectories"
    );

    let mut out = Array4::zeros((n, layout.length_piece, num_pieces, 1));
    for (i, row) in matrix.outer_iter().enumerate() {
        let sampled = row.slice(s![..;sampling]);
        for (p, window) in layout.windows().enumerate() {
            out.slice_mut(s![i, .., p, 0])
                .assign(&sampled.slice(s![window]));
        }
    }

    Ok(out)
}

/// View `[N, L]` or `[N, L, 1]` input as an `[N, L]` matrix.
fn as_matrix(view: ArrayViewD<'_, f64>) -> Result<ArrayView2<'_, f64>> {
    let shape = view.shape().to_vec();
    let view = match shape.len() {
        2 => view,
        3 if shape[2] == 1 => view.index_axis_move(Axis(2), 0),
        3 => {
            return Err(StrataError::shape(format!(
                "trajectory channel axis has size {}, expected 1",
                shape[2]
            )))
        }
        rank => {
            return Err(StrataError::shape(format!(
                "trajectories must be rank 2 or 3, got rank {rank}"
            )))
        }
    };
    view.into_dimensionality::<Ix2>()
        .map_err(|e| StrataError::shape(e.to_string()))
}
