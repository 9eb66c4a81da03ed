//! Travel-time matrix and its batched construction.
//!
//! The external table service caps how many coordinates one request may
//! carry, so the coordinate list is cut into blocks and every ordered pair of
//! blocks is requested separately. Cells the service cannot resolve keep the
//! [`UNREACHABLE_SECS`] sentinel so the optimizer can still run.

use std::ops::Range;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coordinate::Coordinate;
use crate::error::ServiceError;
use crate::retry::RetryPolicy;
use crate::throttle::{Pacer, run_bounded};
use crate::traits::{TableRequest, TravelTimeService};

/// Duration standing in for "no known route" (about 278 hours).
pub const UNREACHABLE_SECS: i64 = 999_999;

/// Square matrix of directed travel durations in whole seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeMatrix {
    rows: Vec<Vec<i64>>,
}

impl TravelTimeMatrix {
    /// Matrix of size `n` with every off-diagonal cell at `value`.
    pub fn filled(n: usize, value: i64) -> Self {
        let mut rows = vec![vec![value; n]; n];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 0;
        }
        Self { rows }
    }

    /// Wraps rows as-is. Shape is checked by consumers that need it.
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Self {
        Self { rows }
    }

    /// Number of rows, which is the number of coordinates.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Seconds from `from` to `to`. Panics when out of range.
    pub fn get(&self, from: usize, to: usize) -> i64 {
        self.rows[from][to]
    }

    /// Overwrites one directed cell.
    pub fn set(&mut self, from: usize, to: usize, seconds: i64) {
        self.rows[from][to] = seconds;
    }

    /// Row-major view of every cell.
    pub fn rows(&self) -> &[Vec<i64>] {
        &self.rows
    }

    /// True when every row has one cell per row.
    pub fn is_square(&self) -> bool {
        let n = self.rows.len();
        self.rows.iter().all(|row| row.len() == n)
    }

    /// Forces self-trips to cost nothing.
    pub fn zero_diagonal(&mut self) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            if let Some(cell) = row.get_mut(i) {
                *cell = 0;
            }
        }
    }

    /// Off-diagonal cells still holding the sentinel.
    pub fn unreachable_pairs(&self) -> usize {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .filter(|&(j, &value)| i != j && value >= UNREACHABLE_SECS)
                    .count()
            })
            .sum()
    }

    /// Share of off-diagonal cells at the sentinel; 0 below two coordinates.
    pub fn unreachable_fraction(&self) -> f64 {
        let n = self.size();
        let pairs = n * n.saturating_sub(1);
        if pairs == 0 {
            return 0.0;
        }
        self.unreachable_pairs() as f64 / pairs as f64
    }
}

#[derive(Debug, Clone)]
pub struct MatrixOptions {
    /// Coordinates per block; bounded by the service's request-size limit.
    pub batch_size: usize,
    /// Minimum start-to-start spacing between two requests. A request slower
    /// than this is followed by the next one without extra delay.
    pub pause: Duration,
    /// Simultaneous outstanding requests.
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
    /// Unreachable fraction above which the build is flagged.
    pub warn_unreachable_fraction: f64,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pause: Duration::from_secs(1),
            max_in_flight: 1,
            retry: RetryPolicy::default(),
            warn_unreachable_fraction: 0.1,
        }
    }
}

/// Result of one matrix build.
#[derive(Debug, Clone)]
pub struct MatrixBuild {
    pub matrix: TravelTimeMatrix,
    pub batches: usize,
    pub failed_batches: usize,
    pub unreachable_fraction: f64,
    /// Set when too many pairs are unreachable; usually a geocoding or
    /// connectivity problem upstream.
    pub quality_warning: bool,
}

/// One block-pair request: rows `sources` against columns `destinations`.
#[derive(Debug, Clone, PartialEq)]
struct Batch {
    sources: Range<usize>,
    destinations: Range<usize>,
}

pub struct MatrixBuilder<'a, S: TravelTimeService> {
    service: &'a S,
    options: MatrixOptions,
    pacer: Pacer,
}

impl<'a, S: TravelTimeService> MatrixBuilder<'a, S> {
    pub fn new(service: &'a S, options: MatrixOptions) -> Self {
        let pacer = Pacer::new(options.pause);
        Self {
            service,
            options,
            pacer,
        }
    }

    pub fn build(&self, coordinates: &[Coordinate]) -> MatrixBuild {
        let n = coordinates.len();
        if n <= 1 {
            return MatrixBuild {
                matrix: TravelTimeMatrix::filled(n, 0),
                batches: 0,
                failed_batches: 0,
                unreachable_fraction: 0.0,
                quality_warning: false,
            };
        }

        let batches = plan_batches(n, self.options.batch_size);
        let total = batches.len();
        info!(locations = n, batches = total, "building travel-time matrix");

        let results = run_bounded(&batches, self.options.max_in_flight, |index, batch| {
            let result = self.fetch_batch(coordinates, batch);
            let done = index + 1;
            if done % 5 == 0 || done == total {
                debug!(batch = done, total, "matrix batch finished");
            }
            result
        });

        let mut matrix = TravelTimeMatrix::filled(n, UNREACHABLE_SECS);
        let mut failed_batches = 0;
        for (batch, result) in batches.iter().zip(results) {
            match result {
                Ok(block) => merge_block(&mut matrix, batch, &block),
                Err(err) => {
                    failed_batches += 1;
                    warn!(
                        src = ?batch.sources,
                        dst = ?batch.destinations,
                        error = %err,
                        "matrix batch failed, cells left unreachable"
                    );
                }
            }
        }
        matrix.zero_diagonal();

        let unreachable_fraction = matrix.unreachable_fraction();
        let quality_warning = unreachable_fraction > self.options.warn_unreachable_fraction;
        if quality_warning {
            warn!(
                unreachable = matrix.unreachable_pairs(),
                pairs = n * (n - 1),
                percent = format!("{:.1}", unreachable_fraction * 100.0),
                "many location pairs are not routable"
            );
        }

        MatrixBuild {
            matrix,
            batches: total,
            failed_batches,
            unreachable_fraction,
            quality_warning,
        }
    }

    fn fetch_batch(
        &self,
        coordinates: &[Coordinate],
        batch: &Batch,
    ) -> Result<Vec<Vec<Option<f64>>>, ServiceError> {
        let src = &coordinates[batch.sources.clone()];
        let (combined, sources, destinations) = if batch.sources == batch.destinations {
            let all: Vec<usize> = (0..src.len()).collect();
            (src.to_vec(), all.clone(), all)
        } else {
            let dst = &coordinates[batch.destinations.clone()];
            let ns = src.len();
            let mut combined = Vec::with_capacity(ns + dst.len());
            combined.extend_from_slice(src);
            combined.extend_from_slice(dst);
            (combined, (0..ns).collect(), (ns..ns + dst.len()).collect())
        };

        let request = TableRequest {
            coordinates: &combined,
            sources: Some(sources),
            destinations: Some(destinations),
        };

        let block = self.options.retry.run("table", || {
            self.pacer.wait();
            self.service.durations(&request)
        })?;

        check_shape(&block, batch.sources.len(), batch.destinations.len())?;
        Ok(block)
    }
}

/// Every ordered pair of blocks, row-major.
fn plan_batches(n: usize, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    let blocks: Vec<Range<usize>> = (0..n)
        .step_by(size)
        .map(|start| start..(start + size).min(n))
        .collect();

    blocks
        .iter()
        .flat_map(|sources| {
            blocks.iter().map(move |destinations| Batch {
                sources: sources.clone(),
                destinations: destinations.clone(),
            })
        })
        .collect()
}

fn check_shape(block: &[Vec<Option<f64>>], rows: usize, cols: usize) -> Result<(), ServiceError> {
    if block.len() != rows || block.iter().any(|row| row.len() != cols) {
        return Err(ServiceError::Malformed(format!(
            "expected {}x{} durations, got {} rows",
            rows,
            cols,
            block.len()
        )));
    }
    Ok(())
}

fn merge_block(matrix: &mut TravelTimeMatrix, batch: &Batch, block: &[Vec<Option<f64>>]) {
    for (r, row) in block.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if let Some(seconds) = value {
                if seconds.is_finite() && *seconds >= 0.0 {
                    matrix.set(
                        batch.sources.start + r,
                        batch.destinations.start + c,
                        seconds.round() as i64,
                    );
                }
            }
        }
    }
}
