//! Event-driven UCI engine loop.
//!
//! The main thread owns the board and the active search controller. A
//! reader thread feeds stdin lines into the event channel; the search
//! worker reports back through the same channel when its best move is
//! out.

use std::io::{self, BufRead};
use std::sync::{Arc, mpsc};

use tracing::{debug, info, warn};

use rampart_core::{Board, Move};
use rampart_engine::{
    BestMove, ClockParams, ProtocolSink, Score, Search, SearchError, SearchInfo,
};

use crate::command::{Command, GoParams, parse_command, resolve_move};
use crate::error::UciError;

enum State {
    Idle,
    Searching,
    Pondering,
}

enum Event {
    Input(Result<Command, UciError>),
    SearchFinished,
    InputClosed,
}

/// Prints engine output as UCI lines. Search output arrives from the
/// worker thread; stdout locking keeps the lines whole.
struct StdoutSink {
    events: mpsc::Sender<Event>,
}

impl ProtocolSink for StdoutSink {
    fn send_info(&self, report: SearchInfo) {
        let mut line = format!(
            "info depth {} seldepth {} nodes {} nps {} time {}",
            report.depth, report.max_depth, report.nodes, report.nps, report.time_ms
        );
        if let (Some(mv), Some(number)) = (report.current_move, report.current_move_number) {
            line.push_str(&format!(" currmove {mv} currmovenumber {number}"));
        }
        match report.score {
            Some(Score::Centipawns(cp)) => line.push_str(&format!(" score cp {cp}")),
            Some(Score::MateIn(moves)) => line.push_str(&format!(" score mate {moves}")),
            None => {}
        }
        if let Some(pv) = &report.line
            && !pv.is_empty()
        {
            line.push_str(" pv");
            for mv in pv {
                line.push_str(&format!(" {mv}"));
            }
        }
        println!("{line}");
    }

    fn send_best_move(&self, verdict: BestMove) {
        match (verdict.best, verdict.ponder) {
            (Some(best), Some(ponder)) => println!("bestmove {best} ponder {ponder}"),
            (Some(best), None) => println!("bestmove {best}"),
            _ => println!("bestmove 0000"),
        }
        let _ = self.events.send(Event::SearchFinished);
    }
}

/// The UCI engine: reads commands until `quit` or end of input.
pub struct UciEngine {
    board: Board,
    state: State,
    search: Option<Search>,
}

impl UciEngine {
    pub fn new() -> UciEngine {
        UciEngine {
            board: Board::start_position(),
            state: State::Idle,
            search: None,
        }
    }

    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<Event>();

        let reader_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(command = %trimmed, "received");
                        if reader_tx.send(Event::Input(parse_command(trimmed))).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = reader_tx.send(Event::InputClosed);
        });

        for event in &rx {
            match event {
                Event::Input(Ok(command)) => match command {
                    Command::Uci => {
                        println!("id name rampart");
                        println!("id author rampart developers");
                        println!("option name Ponder type check default false");
                        println!("uciok");
                    }
                    Command::IsReady => println!("readyok"),
                    Command::NewGame => {
                        self.stop_active();
                        self.board = Board::start_position();
                    }
                    Command::Position(board) => self.board = board,
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::PonderHit => self.handle_ponder_hit(),
                    Command::Stop => self.stop_active(),
                    Command::Quit => {
                        self.stop_active();
                        break;
                    }
                    Command::Unknown(_) => {}
                },
                Event::Input(Err(error)) => warn!(%error, "bad command"),
                Event::SearchFinished => {
                    self.state = State::Idle;
                    self.search = None;
                }
                Event::InputClosed => break,
            }
        }

        info!("rampart shutting down");
        Ok(())
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<Event>) {
        if !matches!(self.state, State::Idle) {
            warn!("go while a search is running, ignoring");
            return;
        }

        // Unknown searchmoves tokens are dropped with a warning rather
        // than failing the whole command.
        let filter: Vec<Move> = params
            .search_moves
            .iter()
            .filter_map(|text| {
                let resolved = resolve_move(&self.board, text);
                if resolved.is_none() {
                    warn!(%text, "searchmoves entry is not a legal move, skipped");
                }
                resolved
            })
            .collect();

        let ponder = params.ponder;
        let sink: Arc<dyn ProtocolSink> = Arc::new(StdoutSink { events: tx.clone() });
        match configure(self.board.clone(), &params, filter, sink) {
            Ok(search) => {
                search.start();
                self.search = Some(search);
                self.state = if ponder {
                    State::Pondering
                } else {
                    State::Searching
                };
            }
            Err(error) => warn!(%error, "go rejected"),
        }
    }

    fn handle_ponder_hit(&mut self) {
        if !matches!(self.state, State::Pondering) {
            warn!("ponderhit while not pondering, ignoring");
            return;
        }
        if let Some(search) = &self.search {
            search.ponder_hit();
        }
        self.state = State::Searching;
    }

    /// Stop any running search and return to idle. `stop` blocks until
    /// the worker has emitted its best move (bounded by the join limit),
    /// so the controller can be dropped here.
    fn stop_active(&mut self) {
        if let Some(search) = self.search.take() {
            search.stop();
        }
        self.state = State::Idle;
    }
}

impl Default for UciEngine {
    fn default() -> UciEngine {
        UciEngine::new()
    }
}

/// Map `go` parameters onto the search constructor family.
fn configure(
    board: Board,
    params: &GoParams,
    filter: Vec<Move>,
    sink: Arc<dyn ProtocolSink>,
) -> Result<Search, SearchError> {
    let clock = || ClockParams {
        white_time_ms: params.white_time.unwrap_or(0),
        white_increment_ms: params.white_increment.unwrap_or(0),
        black_time_ms: params.black_time.unwrap_or(0),
        black_increment_ms: params.black_increment.unwrap_or(0),
        moves_to_go: params.moves_to_go.unwrap_or(0),
    };
    let has_clock = params.white_time.is_some() && params.black_time.is_some();

    if params.ponder {
        if has_clock {
            return Search::new_ponder(sink, board, clock());
        }
        return Search::new_infinite(sink, board);
    }
    if let Some(depth) = params.depth {
        return Search::new_depth(sink, board, depth);
    }
    if let Some(nodes) = params.nodes {
        return Search::new_nodes(sink, board, nodes);
    }
    if let Some(movetime) = params.movetime {
        return Search::new_movetime(sink, board, movetime);
    }
    if !filter.is_empty() {
        return Search::new_moves(sink, board, filter);
    }
    if has_clock {
        return Search::new_clock(sink, board, clock());
    }
    // `go infinite` and a bare `go` both search until told to stop.
    Search::new_infinite(sink, board)
}
