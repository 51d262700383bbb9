//! Records sent to the protocol front-end during and after a search.

use rampart_core::Move;

/// A search score, either in centipawns or as distance to mate in full
/// moves. Positive mate counts favor the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    MateIn(i32),
}

/// Periodic progress and best-line information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInfo {
    /// Iteration currently being searched.
    pub depth: u32,
    /// Deepest ply reached so far, quiescence included.
    pub max_depth: u32,
    /// Nodes visited since the search began.
    pub nodes: u64,
    /// Wall-clock milliseconds since the search began.
    pub time_ms: u64,
    /// Nodes per second; zero until a full second has elapsed.
    pub nps: u64,
    /// Root move being searched, with its 1-based index.
    pub current_move: Option<Move>,
    pub current_move_number: Option<usize>,
    /// Principal variation; present only on new-best-move records.
    pub line: Option<Vec<Move>>,
    /// Present only on new-best-move records.
    pub score: Option<Score>,
}

/// The final verdict of a search. Both fields are `None` when the root
/// position has no legal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestMove {
    pub best: Option<Move>,
    pub ponder: Option<Move>,
}

/// Where search output goes. The worker thread is the only writer; the
/// implementation must be safe to read from another thread.
pub trait ProtocolSink: Send + Sync {
    fn send_info(&self, info: SearchInfo);
    fn send_best_move(&self, best: BestMove);
}
