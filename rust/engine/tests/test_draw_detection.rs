use connect4_engine::board::{Board, Symbol, COLS, ROWS};

/// Column order that fills the board with alternating Red/Yellow moves
/// (Red first) without ever completing a line of four.
pub const DRAW_SEQUENCE: [usize; 42] = [
    0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 0, //
    2, 3, 2, 3, 3, 2, 3, 2, 2, 3, 3, 2, //
    4, 5, 4, 5, 5, 4, 6, 4, 6, 6, 5, 6, 4, 4, 6, 5, 5, 6,
];

#[test]
fn filling_the_board_without_a_line_is_a_draw() {
    let mut board = Board::new();
    let mut symbol = Symbol::Red;

    for (index, &column) in DRAW_SEQUENCE.iter().enumerate() {
        assert!(!board.is_full(), "board full too early at move {index}");
        let placed = board
            .apply_move(column, symbol)
            .unwrap_or_else(|err| panic!("move {index} in column {column} rejected: {err}"));
        assert!(
            !placed.board.check_win(placed.row, placed.column),
            "move {index} unexpectedly won:\n{}",
            placed.board
        );
        board = placed.board;
        symbol = symbol.opponent();
    }

    assert!(board.is_full());
    assert_eq!(board.pieces(), ROWS * COLS);
    assert_eq!(board.count(Symbol::Red), 21);
    assert_eq!(board.count(Symbol::Yellow), 21);
    assert_eq!(board.legal_columns().count(), 0);
}

#[test]
fn partially_filled_board_is_not_full() {
    let board = Board::from_rows([
        "RYRYRY.",
        "RYRYRYR",
        "YRYRYRY",
        "YRYRYRY",
        "RYRYRYR",
        "RYRYRYR",
    ])
    .expect("valid board");
    assert!(!board.is_full());
    assert_eq!(board.legal_columns().collect::<Vec<_>>(), vec![6]);
}
