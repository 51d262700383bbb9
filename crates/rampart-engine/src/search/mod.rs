//! Search control: configuration, the worker thread, and stop handling.
//!
//! A [`Search`] is built by one of the constructor family, started exactly
//! once, and then driven only through [`stop`](Search::stop) and
//! [`ponder_hit`](Search::ponder_hit). The stop flag is monotone: once
//! set it stays set, and a controller is never reused for a second search.

mod negamax;
mod reporter;
mod root;
mod timer;
mod variation;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use rampart_core::{Board, Color, Move};

use crate::MAX_DEPTH;
use crate::error::SearchError;
use crate::eval::{CHECKMATE, CHECKMATE_THRESHOLD};
use crate::protocol::ProtocolSink;

use self::negamax::Searcher;
use self::reporter::Reporter;
use self::root::RootMoveList;
use self::timer::SearchTimer;

/// Worker stack size. The search recurses to [`crate::MAX_PLY`] with a
/// move buffer in every frame (precedent: 32 MB in comparable engines).
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Upper bound on how long `stop` waits for the worker to wind down.
const STOP_JOIN_LIMIT: Duration = Duration::from_secs(5);

/// Moves assumed to remain when the clock gives no `movestogo`.
const DEFAULT_MOVES_TO_GO: u64 = 40;

/// Remaining time and increment for both sides, plus moves to the next
/// time control (0 = unknown).
#[derive(Debug, Clone, Copy)]
pub struct ClockParams {
    pub white_time_ms: u64,
    pub white_increment_ms: u64,
    pub black_time_ms: u64,
    pub black_increment_ms: u64,
    pub moves_to_go: u64,
}

/// Everything the worker needs; handed over on `start`.
struct SearchJob {
    board: Board,
    sink: Arc<dyn ProtocolSink>,
    max_depth: u32,
    max_nodes: u64,
    root_filter: Vec<Move>,
    ponder: bool,
}

/// State shared between the controller, the worker, and the timer.
///
/// All numeric fields are written by the worker and read by the timer
/// callback and `ponder_hit`; relaxed ordering suffices because every
/// write is monotone and a stale read at worst delays the stop by one
/// poll.
pub(crate) struct SearchShared {
    abort: AtomicBool,
    timer_stopped: AtomicBool,
    time_managed: bool,
    budget_ms: u64,
    completed_depth: AtomicU32,
    best_score: AtomicI32,
    root_moves: AtomicUsize,
    timer: Mutex<Option<SearchTimer>>,
    finished: Mutex<bool>,
    finished_signal: Condvar,
}

impl SearchShared {
    fn new(budget_ms: u64, time_managed: bool) -> SearchShared {
        SearchShared {
            abort: AtomicBool::new(false),
            timer_stopped: AtomicBool::new(false),
            time_managed,
            budget_ms,
            completed_depth: AtomicU32::new(0),
            best_score: AtomicI32::new(0),
            root_moves: AtomicUsize::new(0),
            timer: Mutex::new(None),
            finished: Mutex::new(false),
            finished_signal: Condvar::new(),
        }
    }

    #[inline]
    pub(crate) fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn request_stop(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub(crate) fn publish_iteration(&self, depth: u32, best_score: i32) {
        self.completed_depth.store(depth, Ordering::Relaxed);
        self.best_score.store(best_score, Ordering::Relaxed);
    }

    /// Arm the one-shot deadline if a time budget is configured. A second
    /// call is a no-op, so `ponder_hit` after a running clock search
    /// cannot double-arm.
    fn arm_timer(self: &Arc<Self>) {
        if self.budget_ms == 0 {
            return;
        }
        let mut slot = self.timer.lock().expect("timer slot mutex poisoned");
        if slot.is_some() {
            return;
        }
        let shared = Arc::clone(self);
        *slot = Some(SearchTimer::schedule(
            Duration::from_millis(self.budget_ms),
            move || shared.deadline(),
        ));
    }

    fn disarm_timer(&self) {
        if let Some(timer) = self.timer.lock().expect("timer slot mutex poisoned").take() {
            timer.cancel();
        }
    }

    fn timer_armed(&self) -> bool {
        self.timer.lock().expect("timer slot mutex poisoned").is_some()
    }

    /// Timer callback. Always records that the deadline passed; sets the
    /// stop flag unless time management still owes the caller a first
    /// completed iteration (a legal best move must always exist).
    fn deadline(&self) {
        self.timer_stopped.store(true, Ordering::Relaxed);
        if !(self.time_managed && self.completed_depth.load(Ordering::Relaxed) == 0) {
            debug!("search deadline elapsed, stopping");
            self.request_stop();
        } else {
            debug!("search deadline elapsed before the first iteration, deferring");
        }
    }

    /// Time-management early termination, evaluated between iterations and
    /// on `ponder_hit`. Inactive unless a timer is armed and time
    /// management is on.
    pub(crate) fn check_stop_conditions(&self) {
        if !self.time_managed || !self.timer_armed() {
            return;
        }
        if self.timer_stopped.load(Ordering::Relaxed) {
            self.request_stop();
            return;
        }
        // With a single legal move there is nothing left to decide.
        if self.root_moves.load(Ordering::Relaxed) == 1 {
            debug!("single legal move, stopping early");
            self.request_stop();
            return;
        }
        // A mate already proven within the completed depth cannot improve.
        let score = self.best_score.load(Ordering::Relaxed);
        if score.abs() >= CHECKMATE_THRESHOLD
            && self.completed_depth.load(Ordering::Relaxed) as i32 >= CHECKMATE - score.abs()
        {
            debug!(score, "mate proven, stopping early");
            self.request_stop();
        }
    }

    fn mark_finished(&self) {
        *self.finished.lock().expect("finished mutex poisoned") = true;
        self.finished_signal.notify_all();
    }

    fn wait_finished(&self, limit: Duration) -> bool {
        let guard = self.finished.lock().expect("finished mutex poisoned");
        let (guard, _) = self
            .finished_signal
            .wait_timeout_while(guard, limit, |done| !*done)
            .expect("finished mutex poisoned");
        *guard
    }
}

/// Derive a search budget from the clock, per side to move.
///
/// Reserve 5% plus a second of the remaining time, then spread the rest
/// (plus the increments banked until the time control) evenly over the
/// remaining moves. The budget never exceeds the reserve-adjusted
/// remaining time.
fn clock_budget(time_left_ms: u64, increment_ms: u64, moves_to_go: u64) -> u64 {
    let reserve_adjusted = (time_left_ms as i64 * 95) / 100 - 1000;
    let max_search = if reserve_adjusted <= 0 {
        1
    } else {
        reserve_adjusted as u64
    };
    let horizon = if moves_to_go == 0 {
        DEFAULT_MOVES_TO_GO
    } else {
        moves_to_go
    };
    let budget = (max_search + (horizon - 1) * increment_ms) / horizon;
    budget.min(max_search).max(1)
}

/// A configured single-shot search over one position.
pub struct Search {
    shared: Arc<SearchShared>,
    job: Mutex<Option<SearchJob>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Search {
    #[allow(clippy::too_many_arguments)]
    fn build(
        sink: Arc<dyn ProtocolSink>,
        board: Board,
        max_depth: u32,
        max_nodes: u64,
        root_filter: Vec<Move>,
        budget_ms: u64,
        time_managed: bool,
        ponder: bool,
    ) -> Search {
        Search {
            shared: Arc::new(SearchShared::new(budget_ms, time_managed)),
            job: Mutex::new(Some(SearchJob {
                board,
                sink,
                max_depth,
                max_nodes,
                root_filter,
                ponder,
            })),
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Search to a fixed depth.
    pub fn new_depth(
        sink: Arc<dyn ProtocolSink>,
        board: Board,
        depth: u32,
    ) -> Result<Search, SearchError> {
        if !(1..=MAX_DEPTH).contains(&depth) {
            return Err(SearchError::InvalidArgument(
                "depth must be between 1 and 64",
            ));
        }
        Ok(Search::build(
            sink,
            board,
            depth,
            u64::MAX,
            Vec::new(),
            0,
            false,
            false,
        ))
    }

    /// Search until a node budget is exhausted.
    pub fn new_nodes(
        sink: Arc<dyn ProtocolSink>,
        board: Board,
        nodes: u64,
    ) -> Result<Search, SearchError> {
        if nodes < 1 {
            return Err(SearchError::InvalidArgument("nodes must be at least 1"));
        }
        Ok(Search::build(
            sink,
            board,
            MAX_DEPTH,
            nodes,
            Vec::new(),
            0,
            false,
            false,
        ))
    }

    /// Search for a fixed wall-clock budget in milliseconds.
    pub fn new_movetime(
        sink: Arc<dyn ProtocolSink>,
        board: Board,
        time_ms: u64,
    ) -> Result<Search, SearchError> {
        if time_ms < 1 {
            return Err(SearchError::InvalidArgument("time must be at least 1 ms"));
        }
        Ok(Search::build(
            sink,
            board,
            MAX_DEPTH,
            u64::MAX,
            Vec::new(),
            time_ms,
            false,
            false,
        ))
    }

    /// Search only the given root moves, until stopped.
    pub fn new_moves(
        sink: Arc<dyn ProtocolSink>,
        board: Board,
        moves: Vec<Move>,
    ) -> Result<Search, SearchError> {
        Ok(Search::build(
            sink,
            board,
            MAX_DEPTH,
            u64::MAX,
            moves,
            0,
            false,
            false,
        ))
    }

    /// Search until explicitly stopped.
    pub fn new_infinite(sink: Arc<dyn ProtocolSink>, board: Board) -> Result<Search, SearchError> {
        Ok(Search::build(
            sink,
            board,
            MAX_DEPTH,
            u64::MAX,
            Vec::new(),
            0,
            false,
            false,
        ))
    }

    /// Search under the game clock with time management.
    pub fn new_clock(
        sink: Arc<dyn ProtocolSink>,
        board: Board,
        clock: ClockParams,
    ) -> Result<Search, SearchError> {
        let budget = Search::validated_budget(&board, &clock)?;
        Ok(Search::build(
            sink,
            board,
            MAX_DEPTH,
            u64::MAX,
            Vec::new(),
            budget,
            true,
            false,
        ))
    }

    /// Like [`new_clock`](Search::new_clock), but the timer stays unarmed
    /// until [`ponder_hit`](Search::ponder_hit).
    pub fn new_ponder(
        sink: Arc<dyn ProtocolSink>,
        board: Board,
        clock: ClockParams,
    ) -> Result<Search, SearchError> {
        let budget = Search::validated_budget(&board, &clock)?;
        Ok(Search::build(
            sink,
            board,
            MAX_DEPTH,
            u64::MAX,
            Vec::new(),
            budget,
            true,
            true,
        ))
    }

    fn validated_budget(board: &Board, clock: &ClockParams) -> Result<u64, SearchError> {
        if clock.white_time_ms < 1 || clock.black_time_ms < 1 {
            return Err(SearchError::InvalidArgument(
                "remaining time must be at least 1 ms per side",
            ));
        }
        let (time_left, increment) = match board.side_to_move() {
            Color::White => (clock.white_time_ms, clock.white_increment_ms),
            Color::Black => (clock.black_time_ms, clock.black_increment_ms),
        };
        Ok(clock_budget(time_left, increment, clock.moves_to_go))
    }

    /// Spawn the worker. Blocks only until the worker has populated the
    /// root move list, so commands issued afterwards cannot race root
    /// setup. Starting twice is a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("search already started, ignoring");
            return;
        }
        let job = self
            .job
            .lock()
            .expect("job mutex poisoned")
            .take()
            .expect("job is present until the first start");
        let shared = Arc::clone(&self.shared);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("search".into())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || run_search(job, shared, ready_tx))
            .expect("failed to spawn search thread");
        *self.worker.lock().expect("worker mutex poisoned") = Some(handle);

        // One-shot release from the worker after root initialization.
        let _ = ready_rx.recv();
    }

    /// Set the stop flag and wait for the worker, bounded by the join
    /// limit. Best-effort: a worker that overruns the limit is left
    /// detached and the call returns.
    pub fn stop(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        self.shared.request_stop();
        if self.shared.wait_finished(STOP_JOIN_LIMIT) {
            if let Some(handle) = self.worker.lock().expect("worker mutex poisoned").take() {
                let _ = handle.join();
            }
        } else {
            warn!("search worker missed the join deadline, detaching");
        }
    }

    /// The pondered-on move was played: arm the timer with the configured
    /// budget, and when a full iteration is already done, give time
    /// management an immediate chance to stop.
    pub fn ponder_hit(&self) {
        self.shared.arm_timer();
        if self.shared.completed_depth.load(Ordering::Relaxed) > 0 {
            self.shared.check_stop_conditions();
        }
    }
}

/// Worker body: root setup, handshake, deepening, final records.
fn run_search(job: SearchJob, shared: Arc<SearchShared>, ready: mpsc::Sender<()>) {
    let SearchJob {
        board,
        sink,
        max_depth,
        max_nodes,
        root_filter,
        ponder,
    } = job;

    let roots = RootMoveList::from_position(&board);
    shared.root_moves.store(roots.len(), Ordering::Relaxed);
    let reporter = Reporter::new(sink);

    // Release the controller; from here on stop/ponderhit are safe.
    let _ = ready.send(());

    if !ponder {
        shared.arm_timer();
    }
    debug!(max_depth, root_moves = shared.root_moves.load(Ordering::Relaxed), "search running");

    let mut searcher = Searcher::new(
        board,
        roots,
        root_filter,
        max_nodes,
        reporter,
        Arc::clone(&shared),
    );
    searcher.run_iterations(max_depth);

    shared.disarm_timer();
    searcher.finish();
    shared.mark_finished();
    debug!("search worker finished");
}

#[cfg(test)]
mod tests {
    use super::{ClockParams, Search, clock_budget};
    use crate::error::SearchError;
    use crate::protocol::{BestMove, ProtocolSink, SearchInfo};
    use rampart_core::Board;
    use std::sync::Arc;

    struct NullSink;

    impl ProtocolSink for NullSink {
        fn send_info(&self, _: SearchInfo) {}
        fn send_best_move(&self, _: BestMove) {}
    }

    fn sink() -> Arc<dyn ProtocolSink> {
        Arc::new(NullSink)
    }

    #[test]
    fn clock_budget_formula() {
        // 5 minutes, 2s increment, 40 moves to go:
        // max = 300000 * 95/100 - 1000 = 284000
        // budget = (284000 + 39 * 2000) / 40 = 9050
        assert_eq!(clock_budget(300_000, 2_000, 40), 9_050);
    }

    #[test]
    fn clock_budget_clamps_to_max_search() {
        // Huge increment would overshoot the remaining time.
        // max = 10000 * 95/100 - 1000 = 8500; uncapped budget would be
        // (8500 + 9 * 60000) / 10 = 54850.
        assert_eq!(clock_budget(10_000, 60_000, 10), 8_500);
    }

    #[test]
    fn clock_budget_low_time_floors_at_one_millisecond() {
        // 500 ms left: 500*95/100 - 1000 <= 0, so max_search = 1 and the
        // per-move share rounds down to the 1 ms floor.
        assert_eq!(clock_budget(500, 0, 40), 1);
        assert_eq!(clock_budget(1, 0, 1), 1);
    }

    #[test]
    fn clock_budget_defaults_moves_to_go() {
        // moves_to_go = 0 is treated as 40.
        assert_eq!(clock_budget(300_000, 2_000, 0), clock_budget(300_000, 2_000, 40));
    }

    #[test]
    fn depth_bounds_are_validated() {
        let board = Board::start_position();
        assert!(matches!(
            Search::new_depth(sink(), board.clone(), 0),
            Err(SearchError::InvalidArgument(_))
        ));
        assert!(matches!(
            Search::new_depth(sink(), board.clone(), 65),
            Err(SearchError::InvalidArgument(_))
        ));
        assert!(Search::new_depth(sink(), board, 64).is_ok());
    }

    #[test]
    fn nodes_must_be_positive() {
        let board = Board::start_position();
        assert!(matches!(
            Search::new_nodes(sink(), board.clone(), 0),
            Err(SearchError::InvalidArgument(_))
        ));
        assert!(Search::new_nodes(sink(), board, 1).is_ok());
    }

    #[test]
    fn movetime_must_be_positive() {
        let board = Board::start_position();
        assert!(matches!(
            Search::new_movetime(sink(), board.clone(), 0),
            Err(SearchError::InvalidArgument(_))
        ));
        assert!(Search::new_movetime(sink(), board, 1).is_ok());
    }

    #[test]
    fn clock_requires_time_on_both_sides() {
        let board = Board::start_position();
        let bad = ClockParams {
            white_time_ms: 0,
            white_increment_ms: 0,
            black_time_ms: 60_000,
            black_increment_ms: 0,
            moves_to_go: 0,
        };
        assert!(matches!(
            Search::new_clock(sink(), board, bad),
            Err(SearchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn stop_before_start_returns_immediately() {
        let board = Board::start_position();
        let search = Search::new_infinite(sink(), board).unwrap();
        // Must not block on the 5 s join limit.
        search.stop();
    }
}
