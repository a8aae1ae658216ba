#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Str,
}

/// Column storage as one chunk per parse batch.
///
/// String values are stored as absolute `(start, end)` byte offsets into the
/// memory-mapped source so category labels are never copied.
#[derive(Debug, Clone)]
pub enum Column {
    Int64(Vec<Vec<i64>>),
    Float64(Vec<Vec<f64>>),
    Str(Vec<Vec<(usize, usize)>>),
}

impl Column {
    pub fn new(col_type: ColumnType) -> Self {
        match col_type {
            ColumnType::Int64 => Column::Int64(Vec::new()),
            ColumnType::Float64 => Column::Float64(Vec::new()),
            ColumnType::Str => Column::Str(Vec::new()),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Str(_) => ColumnType::Str,
        }
    }

    pub fn push_chunk_int64(&mut self, chunk: Vec<i64>) {
        match self {
            Column::Int64(chunks) => chunks.push(chunk),
            _ => panic!("Type mismatch"),
        }
    }

    pub fn push_chunk_float64(&mut self, chunk: Vec<f64>) {
        match self {
            Column::Float64(chunks) => chunks.push(chunk),
            _ => panic!("Type mismatch"),
        }
    }

    pub fn push_chunk_str(&mut self, chunk: Vec<(usize, usize)>) {
        match self {
            Column::Str(chunks) => chunks.push(chunk),
            _ => panic!("Type mismatch"),
        }
    }

    /// Numeric values widened to `f64`; empty for string columns
    pub fn iter_f64(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Column::Float64(chunks) => Box::new(chunks.iter().flat_map(|c| c.iter().copied())),
            Column::Int64(chunks) => {
                Box::new(chunks.iter().flat_map(|c| c.iter().map(|&v| v as f64)))
            }
            Column::Str(_) => Box::new(std::iter::empty()),
        }
    }

    pub fn iter_str(&self) -> Box<dyn Iterator<Item = (usize, usize)> + '_> {
        match self {
            Column::Str(chunks) => Box::new(chunks.iter().flat_map(|c| c.iter().copied())),
            _ => Box::new(std::iter::empty()),
        }
    }

    // Random access
    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Column::Float64(chunks) => locate(chunks, idx).copied(),
            Column::Int64(chunks) => locate(chunks, idx).map(|&v| v as f64),
            Column::Str(_) => None,
        }
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Column::Int64(chunks) => locate(chunks, idx).copied(),
            _ => None,
        }
    }

    pub fn get_str(&self, idx: usize) -> Option<(usize, usize)> {
        match self {
            Column::Str(chunks) => locate(chunks, idx).copied(),
            _ => None,
        }
    }

    pub fn total_len(&self) -> usize {
        match self {
            Column::Int64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Float64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Str(chunks) => chunks.iter().map(|c| c.len()).sum(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        match self {
            Column::Int64(chunks) => chunks.len(),
            Column::Float64(chunks) => chunks.len(),
            Column::Str(chunks) => chunks.len(),
        }
    }

    /// Merge all chunks into one so random access is a direct index
    pub fn flatten_in_place(&mut self) {
        match self {
            Column::Int64(chunks) => flatten_chunks(chunks),
            Column::Float64(chunks) => flatten_chunks(chunks),
            Column::Str(chunks) => flatten_chunks(chunks),
        }
    }
}

fn locate<T>(chunks: &[Vec<T>], idx: usize) -> Option<&T> {
    let mut remaining = idx;
    for chunk in chunks {
        if remaining < chunk.len() {
            return chunk.get(remaining);
        }
        remaining -= chunk.len();
    }
    None
}

fn flatten_chunks<T>(chunks: &mut Vec<Vec<T>>) {
    if chunks.len() <= 1 {
        return;
    }

    // Reuse the first chunk's allocation as the base
    let mut owned_chunks = std::mem::take(chunks);
    let mut flattened = owned_chunks.remove(0);
    let total: usize = owned_chunks.iter().map(|c| c.len()).sum();
    flattened.reserve(total);

    for chunk in owned_chunks {
        flattened.extend(chunk);
    }

    chunks.push(flattened);
}
