//! Spreadsheet column labels and A1 references.

/// Converts a zero-based column index into its label: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_label(index: u32) -> String {
    // Bijective base-26 over the 1-based column number.
    let mut column = u64::from(index) + 1;
    let mut name = Vec::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        name.push(b'A' + rem);
        column = (column - 1) / 26;
    }
    name.reverse();
    name.into_iter().map(char::from).collect()
}

/// A1-style reference for a zero-based column and a 1-based row.
pub fn cell_ref(index: u32, row: u32) -> String {
    format!("{}{}", column_label(index), row)
}
