//! Game record decomposition: PGN movetext to the positions that need analysis.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position};
use thiserror::Error;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("valid header pattern"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}|;[^\n]*").expect("valid comment pattern"));
static MOVE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.+").expect("valid move number pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PgnError {
    #[error("game record contains no moves")]
    NoMoves,

    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("invalid move '{san}' at ply {ply}")]
    InvalidSan { san: String, ply: usize },

    #[error("illegal move '{san}' at ply {ply}")]
    IllegalMove { san: String, ply: usize },
}

/// Parse a game record and return the FEN of the position before each move.
///
/// A game of N plies yields N positions; position `i` is the one in which
/// ply `i` was played. Accepts full PGN (tag pairs, comments, variations,
/// NAGs) or bare SAN movetext such as `"e4 e5 Nf3 Nc6"`.
pub fn positions_from_pgn(pgn: &str) -> Result<Vec<String>, PgnError> {
    let mut pos = starting_position(pgn)?;

    let moves = extract_moves(pgn);
    if moves.is_empty() {
        return Err(PgnError::NoMoves);
    }

    let mut positions = Vec::with_capacity(moves.len());
    for (ply, token) in moves.iter().enumerate() {
        let san: SanPlus = token.parse().map_err(|_| PgnError::InvalidSan {
            san: token.clone(),
            ply,
        })?;
        let mv = san.san.to_move(&pos).map_err(|_| PgnError::IllegalMove {
            san: token.clone(),
            ply,
        })?;

        positions.push(Fen::from_position(&pos, EnPassantMode::Legal).to_string());
        pos.play_unchecked(mv);
    }

    Ok(positions)
}

/// Parse a FEN into a legal position and report who is to move.
pub fn side_to_move(fen: &str) -> Result<Color, PgnError> {
    Ok(parse_position(fen.trim())?.turn())
}

fn parse_position(fen_str: &str) -> Result<Chess, PgnError> {
    let fen: Fen = fen_str
        .parse()
        .map_err(|_| PgnError::InvalidFen(fen_str.to_string()))?;
    fen.into_position::<Chess>(CastlingMode::Standard)
        .map_err(|_| PgnError::InvalidFen(fen_str.to_string()))
}

/// Standard start unless the record carries a `[FEN "..."]` tag.
fn starting_position(pgn: &str) -> Result<Chess, PgnError> {
    let fen_tag = HEADER_RE
        .captures_iter(pgn)
        .find(|cap| &cap[1] == "FEN")
        .map(|cap| cap[2].to_string());

    let Some(fen_str) = fen_tag else {
        return Ok(Chess::default());
    };

    parse_position(&fen_str)
}

/// SAN tokens of the main line, stripped of annotations.
fn extract_moves(pgn: &str) -> Vec<String> {
    let no_headers = HEADER_RE.replace_all(pgn, " ");
    let no_comments = COMMENT_RE.replace_all(&no_headers, " ");
    let main_line = strip_variations(&no_comments);

    main_line
        .split_whitespace()
        .map(|token| MOVE_NUMBER_RE.replace(token, "").into_owned())
        .map(|token| token.trim_end_matches(['!', '?']).to_string())
        .filter(|token| !token.is_empty())
        .filter(|token| !token.starts_with('$'))
        .filter(|token| !matches!(token.as_str(), "1-0" | "0-1" | "1/2-1/2" | "*"))
        .collect()
}

/// Drop parenthesised variations, including nested ones.
fn strip_variations(text: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                out.push(' ');
            }
            ')' => {
                depth = depth.saturating_sub(1);
                out.push(' ');
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_bare_san_movetext() {
        let positions = positions_from_pgn("e4 e5 Nf3 Nf6").unwrap();
        assert_eq!(positions.len(), 4);
        assert_eq!(positions[0], START_FEN);
        assert_eq!(
            positions[1],
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn test_full_pgn_with_annotations() {
        let pgn = r#"[Event "Casual"]
[White "Player1"]
[Black "Player2"]
[Result "1-0"]

1. e4 {best by test} e5 2. Nf3 (2. f4 exf4) Nc6?! 3. Bb5 $1 a6 1-0"#;

        let positions = positions_from_pgn(pgn).unwrap();
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[0], START_FEN);
        // Before 3...a6 Black is to move
        assert!(positions[5].contains(" b "));
    }

    #[test]
    fn test_check_suffix_and_castling() {
        let positions =
            positions_from_pgn("1. e4 e5 2. Nf3 Nc6 3. Bc4 Nf6 4. O-O Bc5 5. Bxf7+ Kxf7").unwrap();
        assert_eq!(positions.len(), 10);
    }

    #[test]
    fn test_fen_header_sets_start() {
        let pgn = r#"[SetUp "1"]
[FEN "4k3/8/8/8/8/8/8/4K2R w K - 0 1"]

1. O-O Kd7"#;
        let positions = positions_from_pgn(pgn).unwrap();
        assert_eq!(positions[0], "4k3/8/8/8/8/8/8/4K2R w K - 0 1");
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_fen_header_with_black_to_move() {
        let pgn = r#"[FEN "4k3/8/8/8/8/8/8/4K2R b K - 0 1"]

1... Kd7 2. O-O Kc6"#;
        let positions = positions_from_pgn(pgn).unwrap();
        assert_eq!(positions.len(), 3);
        assert_eq!(side_to_move(&positions[0]), Ok(Color::Black));
        assert_eq!(side_to_move(&positions[1]), Ok(Color::White));
    }

    #[test]
    fn test_side_to_move_rejects_bad_fen() {
        assert_eq!(side_to_move(START_FEN), Ok(Color::White));
        assert!(matches!(side_to_move("not a fen"), Err(PgnError::InvalidFen(_))));
        // No kings
        assert!(matches!(
            side_to_move("8/8/8/8/8/8/8/8 w - - 0 1"),
            Err(PgnError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_empty_game_is_rejected() {
        assert_eq!(positions_from_pgn("[White \"x\"]\n\n*"), Err(PgnError::NoMoves));
        assert_eq!(positions_from_pgn(""), Err(PgnError::NoMoves));
    }

    #[test]
    fn test_illegal_move_reports_ply() {
        assert_eq!(
            positions_from_pgn("e4 e5 Ke3"),
            Err(PgnError::IllegalMove {
                san: "Ke3".into(),
                ply: 2
            })
        );
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        assert!(matches!(
            positions_from_pgn("e4 hello"),
            Err(PgnError::InvalidSan { ply: 1, .. })
        ));
    }
}
