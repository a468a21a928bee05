use connect4_engine::board::{Board, Symbol, COLS, ROWS};
use connect4_engine::errors::MoveError;

#[test]
fn move_lands_on_lowest_empty_row() {
    let board = Board::new();
    let first = board.apply_move(2, Symbol::Red).expect("legal move");
    assert_eq!((first.row, first.column), (ROWS - 1, 2));

    let second = first.board.apply_move(2, Symbol::Yellow).expect("legal move");
    assert_eq!((second.row, second.column), (ROWS - 2, 2));
    assert_eq!(second.board.cell(ROWS - 1, 2), Some(Some(Symbol::Red)));
    assert_eq!(second.board.cell(ROWS - 2, 2), Some(Some(Symbol::Yellow)));
}

#[test]
fn apply_move_leaves_the_input_untouched() {
    let before = Board::new().apply_move(0, Symbol::Red).unwrap().board;
    let snapshot = before;
    let after = before.apply_move(0, Symbol::Yellow).unwrap().board;

    assert_eq!(before, snapshot);
    assert_ne!(before, after);
    assert_eq!(before.pieces(), 1);
    assert_eq!(after.pieces(), 2);
}

#[test]
fn out_of_range_column_is_rejected() {
    let board = Board::new();
    assert_eq!(
        board.apply_move(COLS, Symbol::Red),
        Err(MoveError::ColumnOutOfRange { column: COLS as i64 })
    );
    assert_eq!(
        board.apply_move(usize::MAX, Symbol::Red),
        Err(MoveError::ColumnOutOfRange { column: i64::MAX })
    );
    assert!(board.is_empty());
}

#[test]
fn full_column_is_rejected() {
    let mut board = Board::new();
    let mut symbol = Symbol::Red;
    for _ in 0..ROWS {
        board = board.apply_move(4, symbol).expect("column has room").board;
        symbol = symbol.opponent();
    }

    assert!(!board.accepts(4));
    assert_eq!(
        board.apply_move(4, Symbol::Red),
        Err(MoveError::ColumnFull { column: 4 })
    );
    let legal: Vec<usize> = board.legal_columns().collect();
    assert_eq!(legal, vec![0, 1, 2, 3, 5, 6]);
}

#[test]
fn board_serializes_as_rows_of_markers() {
    let board = Board::new().apply_move(0, Symbol::Red).unwrap().board;
    let json = serde_json::to_value(board).expect("serialize board");
    let rows = json.as_array().expect("rows array");
    assert_eq!(rows.len(), ROWS);
    assert_eq!(rows[ROWS - 1][0], "R");
    assert!(rows[0][0].is_null());

    let back: Board = serde_json::from_value(json).expect("deserialize board");
    assert_eq!(back, board);
}

#[test]
fn deserializing_a_floating_piece_is_rejected() {
    let mut rows: Vec<Vec<Option<&str>>> = vec![vec![None; COLS]; ROWS];
    rows[2][4] = Some("Y");
    let err = serde_json::from_value::<Board>(serde_json::json!(rows)).unwrap_err();
    assert!(err.to_string().contains("row 2, column 4"), "{err}");

    rows[ROWS - 1][4] = Some("R");
    rows[2][4] = None;
    let board: Board = serde_json::from_value(serde_json::json!(rows)).unwrap();
    assert_eq!(board.cell(ROWS - 1, 4), Some(Some(Symbol::Red)));
}
