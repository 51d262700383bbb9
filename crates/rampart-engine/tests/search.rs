//! End-to-end search scenarios driven through the public controller
//! surface: start, stop, ponderhit, and the protocol sink.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rampart_core::{Board, Move, generate_moves};
use rampart_engine::eval::{CHECKMATE, DRAW, INFINITY, evaluate};
use rampart_engine::{
    BestMove, ClockParams, MovePicker, ProtocolSink, Score, Search, SearchInfo,
};

/// Records everything the search emits and signals when the best move
/// arrives.
#[derive(Default)]
struct RecordingSink {
    infos: Mutex<Vec<SearchInfo>>,
    verdict: Mutex<Option<BestMove>>,
    done: Condvar,
}

impl RecordingSink {
    fn new() -> Arc<RecordingSink> {
        Arc::new(RecordingSink::default())
    }

    fn infos(&self) -> Vec<SearchInfo> {
        self.infos.lock().unwrap().clone()
    }

    /// Block until the best-move record arrives, up to `limit`.
    fn wait_verdict(&self, limit: Duration) -> Option<BestMove> {
        let guard = self.verdict.lock().unwrap();
        let (guard, _) = self
            .done
            .wait_timeout_while(guard, limit, |v| v.is_none())
            .unwrap();
        *guard
    }

    /// The score of the most recent best-line record.
    fn last_score(&self) -> Option<Score> {
        self.infos
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|info| info.score)
    }

    fn last_line(&self) -> Option<Vec<Move>> {
        self.infos
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|info| info.line.clone())
    }
}

impl ProtocolSink for RecordingSink {
    fn send_info(&self, info: SearchInfo) {
        self.infos.lock().unwrap().push(info);
    }

    fn send_best_move(&self, best: BestMove) {
        *self.verdict.lock().unwrap() = Some(best);
        self.done.notify_all();
    }
}

fn finished_search(board: Board, depth: u32) -> (Arc<RecordingSink>, BestMove) {
    let sink = RecordingSink::new();
    let search =
        Search::new_depth(Arc::clone(&sink) as Arc<dyn ProtocolSink>, board, depth).unwrap();
    search.start();
    let verdict = sink
        .wait_verdict(Duration::from_secs(60))
        .expect("search finishes on its own");
    (sink, verdict)
}

#[test]
fn start_position_depth_one() {
    let board = Board::start_position();
    let legal: Vec<Move> = generate_moves(&board).iter().copied().collect();
    assert_eq!(legal.len(), 20);

    let (sink, verdict) = finished_search(board, 1);
    let best = verdict.best.expect("a best move exists");
    assert!(legal.contains(&best));

    // Root node plus one node per root move, at minimum.
    let final_nodes = sink.infos().last().unwrap().nodes;
    assert!(final_nodes >= 21, "nodes = {final_nodes}");

    assert!(sink.last_line().is_some_and(|line| !line.is_empty()));
}

#[test]
fn fools_mate_is_found() {
    // After 1.f3 e5 2.g4, Black mates with Qd8-h4.
    let board: Board = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2"
        .parse()
        .unwrap();
    let (sink, verdict) = finished_search(board, 2);

    assert_eq!(verdict.best.unwrap().to_string(), "d8h4");
    assert_eq!(sink.last_score(), Some(Score::MateIn(1)));
}

#[test]
fn stalemate_reports_null_best_move() {
    let board: Board = "k7/2K5/1Q6/8/8/8/8/8 b - - 0 1".parse().unwrap();
    let sink = RecordingSink::new();
    let search =
        Search::new_infinite(Arc::clone(&sink) as Arc<dyn ProtocolSink>, board).unwrap();
    search.start();

    // Terminal root: the search stops itself without an external stop.
    let verdict = sink
        .wait_verdict(Duration::from_secs(5))
        .expect("terminal root terminates immediately");
    assert_eq!(verdict.best, None);
    assert_eq!(verdict.ponder, None);
    for info in sink.infos() {
        assert_eq!(info.current_move, None);
        assert_eq!(info.line, None);
    }
}

#[test]
fn single_reply_stops_after_first_iteration() {
    // Black is in check with exactly one evasion, Kg8.
    let board: Board = "7k/8/5Q1K/8/8/8/8/8 b - - 0 1".parse().unwrap();
    assert_eq!(generate_moves(&board).len(), 1);

    let sink = RecordingSink::new();
    let clock = ClockParams {
        white_time_ms: 60_000,
        white_increment_ms: 0,
        black_time_ms: 60_000,
        black_increment_ms: 0,
        moves_to_go: 0,
    };
    let search =
        Search::new_clock(Arc::clone(&sink) as Arc<dyn ProtocolSink>, board, clock).unwrap();
    let started = Instant::now();
    search.start();
    let verdict = sink
        .wait_verdict(Duration::from_secs(10))
        .expect("time management stops after one iteration");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(verdict.best.unwrap().to_string(), "h8g8");
}

#[test]
fn node_budget_is_respected() {
    let board = Board::start_position();
    let sink = RecordingSink::new();
    let search =
        Search::new_nodes(Arc::clone(&sink) as Arc<dyn ProtocolSink>, board, 1_000).unwrap();
    search.start();
    let verdict = sink
        .wait_verdict(Duration::from_secs(30))
        .expect("node-limited search terminates");
    assert!(verdict.best.is_some());

    let final_nodes = sink.infos().last().unwrap().nodes;
    assert!(
        (1_000..1_100).contains(&final_nodes),
        "nodes = {final_nodes}"
    );
}

#[test]
fn infinite_search_stops_on_command() {
    let board = Board::start_position();
    let sink = RecordingSink::new();
    let search =
        Search::new_infinite(Arc::clone(&sink) as Arc<dyn ProtocolSink>, board).unwrap();
    search.start();
    thread::sleep(Duration::from_millis(100));

    let stopping = Instant::now();
    search.stop();
    assert!(stopping.elapsed() <= Duration::from_secs(5));

    let verdict = sink
        .wait_verdict(Duration::from_secs(1))
        .expect("stopped search reports a verdict");
    assert!(verdict.best.is_some());
}

#[test]
fn search_moves_filter_restricts_the_root() {
    let board = Board::start_position();
    let legal = generate_moves(&board);
    let filter: Vec<Move> = legal.iter().copied().take(2).collect();

    let sink = RecordingSink::new();
    let search = Search::new_moves(
        Arc::clone(&sink) as Arc<dyn ProtocolSink>,
        board,
        filter.clone(),
    )
    .unwrap();
    search.start();
    thread::sleep(Duration::from_millis(100));
    search.stop();

    let verdict = sink.wait_verdict(Duration::from_secs(1)).unwrap();
    assert!(filter.contains(&verdict.best.unwrap()));
}

#[test]
fn fixed_budgets_are_deterministic() {
    let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";
    let run = || {
        let board: Board = fen.parse().unwrap();
        let (sink, verdict) = finished_search(board, 4);
        (verdict.best, sink.last_score(), sink.last_line())
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
}

#[test]
fn depth_limit_is_respected() {
    let (sink, _) = finished_search(Board::start_position(), 3);
    let infos = sink.infos();
    assert!(infos.iter().all(|info| info.depth <= 3));
    assert!(infos.iter().any(|info| info.depth == 3));
}

#[test]
fn movetime_returns_in_time() {
    let board = Board::start_position();
    let sink = RecordingSink::new();
    let search =
        Search::new_movetime(Arc::clone(&sink) as Arc<dyn ProtocolSink>, board, 200).unwrap();
    let started = Instant::now();
    search.start();
    let verdict = sink
        .wait_verdict(Duration::from_secs(5))
        .expect("timed search terminates");
    // Budget plus scheduling slack; well under the 5 s ceiling.
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(verdict.best.is_some());
}

#[test]
fn losing_side_reports_negative_mate() {
    // Black's forced line: 1...Kg8 2.Qg7#, two plies away.
    let board: Board = "7k/8/5Q1K/8/8/8/8/8 b - - 0 1".parse().unwrap();
    let (sink, verdict) = finished_search(board, 3);
    assert_eq!(verdict.best.unwrap().to_string(), "h8g8");
    assert_eq!(sink.last_score(), Some(Score::MateIn(-1)));
}

#[test]
fn nodes_grow_monotonically() {
    let (sink, _) = finished_search(Board::start_position(), 4);
    let infos = sink.infos();
    for pair in infos.windows(2) {
        assert!(pair[0].nodes <= pair[1].nodes);
    }
}

#[test]
fn reported_line_is_playable_and_reversible() {
    let (sink, verdict) = finished_search(Board::start_position(), 4);
    let line = sink.last_line().expect("final iteration reports a line");
    assert_eq!(Some(line[0]), verdict.best);
    if line.len() > 1 {
        assert_eq!(Some(line[1]), verdict.ponder);
    }

    let mut board = Board::start_position();
    let reference = board.clone();
    for mv in &line {
        assert!(
            generate_moves(&board).contains(*mv),
            "{mv} is not legal along the line"
        );
        board.make_move(*mv);
    }
    for mv in line.iter().rev() {
        board.undo_move(*mv);
    }
    assert_eq!(board, reference);
    assert_eq!(board.hash(), reference.hash());
}

#[test]
fn ponder_search_waits_for_the_hit() {
    // One legal reply; after ponderhit the single-reply rule stops the
    // search immediately even though the timer was only just armed.
    let board: Board = "7k/8/5Q1K/8/8/8/8/8 b - - 0 1".parse().unwrap();
    let sink = RecordingSink::new();
    let clock = ClockParams {
        white_time_ms: 60_000,
        white_increment_ms: 0,
        black_time_ms: 60_000,
        black_increment_ms: 0,
        moves_to_go: 0,
    };
    let search =
        Search::new_ponder(Arc::clone(&sink) as Arc<dyn ProtocolSink>, board, clock).unwrap();
    search.start();

    // Pondering: no timer, no time management; the search keeps running.
    thread::sleep(Duration::from_millis(300));
    assert!(sink.verdict.lock().unwrap().is_none());

    search.ponder_hit();
    let verdict = sink
        .wait_verdict(Duration::from_secs(5))
        .expect("ponderhit hands control to time management");
    assert_eq!(verdict.best.unwrap().to_string(), "h8g8");
}

#[test]
fn bare_kings_score_as_a_draw() {
    // Every child node has insufficient material.
    let board: Board = "4k3/8/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
    let (sink, verdict) = finished_search(board, 2);
    assert!(verdict.best.is_some());
    assert_eq!(sink.last_score(), Some(Score::Centipawns(DRAW)));
}

#[test]
fn exhausted_halfmove_clock_scores_as_a_draw() {
    // A rook up, but every reply lands on a halfmove clock of 100+.
    let board: Board = "4k3/8/8/8/8/8/8/R3K3 w - - 100 1".parse().unwrap();
    let (sink, verdict) = finished_search(board, 2);
    assert!(verdict.best.is_some());
    assert_eq!(sink.last_score(), Some(Score::Centipawns(DRAW)));
}

// ---------------------------------------------------------------------
// Alpha-beta soundness: pruning must not change the root score.
// ---------------------------------------------------------------------

/// Plain negamax over the same tree shape as the engine search, with no
/// windows at all.
fn reference_search(board: &mut Board, depth: i32, ply: i32) -> i32 {
    if depth <= 0 {
        return reference_quiescence(board, ply);
    }
    if board.has_insufficient_material() || board.is_repetition() || board.halfmove_clock() >= 100
    {
        return DRAW;
    }
    let in_check = board.is_check();
    let moves = generate_moves(board);
    if moves.is_empty() {
        return if in_check { -CHECKMATE + ply } else { DRAW };
    }
    let mut best = -INFINITY;
    for &mv in &moves {
        board.make_move(mv);
        let value = -reference_search(board, depth - 1, ply + 1);
        board.undo_move(mv);
        best = best.max(value);
    }
    best
}

fn reference_quiescence(board: &mut Board, ply: i32) -> i32 {
    if board.has_insufficient_material() || board.is_repetition() || board.halfmove_clock() >= 100
    {
        return DRAW;
    }
    let in_check = board.is_check();
    let mut best = if in_check { -INFINITY } else { evaluate(board) };
    let mut tried = 0;
    let mut picker = MovePicker::new(board, 0, in_check);
    while let Some(mv) = picker.next_move() {
        board.make_move(mv);
        let value = -reference_quiescence(board, ply + 1);
        board.undo_move(mv);
        tried += 1;
        best = best.max(value);
    }
    if in_check && tried == 0 {
        return -CHECKMATE + ply;
    }
    best
}

#[test]
fn pruning_preserves_the_minimax_score() {
    let positions = [
        "4k3/8/8/4p3/3Q4/8/8/4K3 w - - 0 1",
        "4k3/pp6/8/8/8/8/PP6/4K3 w - - 0 1",
        "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
    ];
    for fen in positions {
        for depth in 1..=2 {
            let mut board: Board = fen.parse().unwrap();
            let expected = reference_search(&mut board, depth, 0);

            let (sink, _) = finished_search(fen.parse().unwrap(), depth as u32);
            let reported = match sink.last_score() {
                Some(Score::Centipawns(cp)) => cp,
                Some(Score::MateIn(_)) | None => {
                    panic!("expected a centipawn score for {fen} at depth {depth}")
                }
            };
            assert_eq!(reported, expected, "score diverged for {fen} at depth {depth}");
        }
    }
}
