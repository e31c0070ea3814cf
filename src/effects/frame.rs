/// One full matrix of colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    rows: u8,
    cols: u8,
    cells: Vec<[u8; 3]>,
}

impl Frame {
    /// All-black frame.
    pub fn new(rows: u8, cols: u8) -> Self {
        Self {
            rows,
            cols,
            cells: vec![[0; 3]; usize::from(rows) * usize::from(cols)],
        }
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    fn index(&self, row: u8, col: u8) -> Option<usize> {
        (row < self.rows && col < self.cols)
            .then(|| usize::from(row) * usize::from(self.cols) + usize::from(col))
    }

    /// Cells outside the matrix are ignored.
    pub fn set(&mut self, row: u8, col: u8, colour: [u8; 3]) {
        if let Some(index) = self.index(row, col) {
            self.cells[index] = colour;
        }
    }

    pub fn get(&self, row: u8, col: u8) -> Option<[u8; 3]> {
        self.index(row, col).map(|index| self.cells[index])
    }

    /// Driver payload: each row as `[row, 0, cols - 1, r, g, b, ...]`,
    /// rows concatenated.
    pub fn encode(&self) -> Vec<u8> {
        if self.cols == 0 {
            return Vec::new();
        }
        let row_len = 3 + usize::from(self.cols) * 3;
        let mut payload = Vec::with_capacity(row_len * usize::from(self.rows));
        for (row, cells) in self.cells.chunks(usize::from(self.cols)).enumerate() {
            payload.extend_from_slice(&[row as u8, 0, self.cols - 1]);
            for colour in cells {
                payload.extend_from_slice(colour);
            }
        }
        payload
    }
}
