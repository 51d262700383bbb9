//! Rate-limited progress reporting to the protocol sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rampart_core::Move;

use crate::eval::{CHECKMATE, CHECKMATE_THRESHOLD};
use crate::protocol::{BestMove, ProtocolSink, Score, SearchInfo};

/// Minimum gap between unforced status records.
const STATUS_INTERVAL: Duration = Duration::from_millis(1000);

/// Emits status, best-line, and best-move records. Unforced status
/// records are throttled to one per second; any emission resets the
/// throttle clock.
pub struct Reporter {
    sink: Arc<dyn ProtocolSink>,
    started: Instant,
    last_sent: Instant,
}

impl Reporter {
    pub fn new(sink: Arc<dyn ProtocolSink>) -> Reporter {
        let now = Instant::now();
        Reporter {
            sink,
            started: now,
            last_sent: now,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Nodes per second. Reported as zero until a full second has
    /// elapsed, so early readings do not swing wildly.
    fn nodes_per_second(nodes: u64, elapsed_ms: u64) -> u64 {
        if elapsed_ms >= 1000 {
            nodes * 1000 / elapsed_ms
        } else {
            0
        }
    }

    /// A progress record without score or line. Unforced emissions are
    /// dropped until the throttle interval has passed.
    pub fn status(
        &mut self,
        force: bool,
        depth: u32,
        max_depth: u32,
        nodes: u64,
        current: Option<(Move, usize)>,
    ) {
        if !force && self.last_sent.elapsed() < STATUS_INTERVAL {
            return;
        }
        self.last_sent = Instant::now();

        let elapsed = self.elapsed_ms();
        self.sink.send_info(SearchInfo {
            depth,
            max_depth,
            nodes,
            time_ms: elapsed,
            nps: Self::nodes_per_second(nodes, elapsed),
            current_move: current.map(|(mv, _)| mv),
            current_move_number: current.map(|(_, n)| n),
            line: None,
            score: None,
        });
    }

    /// A new best root move. Always emitted, with the full line and a
    /// centipawn or mate score.
    pub fn best_line(
        &mut self,
        depth: u32,
        max_depth: u32,
        nodes: u64,
        score: i32,
        line: &[Move],
    ) {
        self.last_sent = Instant::now();
        let elapsed = self.elapsed_ms();
        self.sink.send_info(SearchInfo {
            depth,
            max_depth,
            nodes,
            time_ms: elapsed,
            nps: Self::nodes_per_second(nodes, elapsed),
            current_move: line.first().copied(),
            current_move_number: None,
            line: Some(line.to_vec()),
            score: Some(encode_score(score)),
        });
    }

    /// The final verdict of the search.
    pub fn best_move(&self, best: Option<Move>, ponder: Option<Move>) {
        self.sink.send_best_move(BestMove { best, ponder });
    }
}

/// Convert an internal score to the protocol representation. Mate-distance
/// scores become "mate in N" counted in full moves.
fn encode_score(score: i32) -> Score {
    if score.abs() >= CHECKMATE_THRESHOLD {
        let plies = CHECKMATE - score.abs();
        Score::MateIn(score.signum() * (plies + 1) / 2)
    } else {
        Score::Centipawns(score)
    }
}
