use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    io::ErrorKind,
    path::Path,
    str,
    time::Instant,
};

use crate::product::{
    AggregateValue, CATEGORY_COLUMN, DashboardError, HEIGHT_COLUMN, LENGTH_COLUMN, Metric,
    NumericField, PHOTOS_COLUMN, ParseError, ParseSummary, REQUIRED_COLUMNS, WIDTH_COLUMN,
    column::{Column, ColumnType},
    selection::CategorySelection,
};

/// Field values treated as missing, compared case-insensitively
const NULL_MARKERS: [&[u8]; 6] = [b"nan", b"na", b"n/a", b"null", b"none", b"<na>"];

/// One cleaned row, borrowed from a [`ProductTable`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductRecord<'a> {
    pub category: &'a str,
    pub length_cm: f64,
    pub height_cm: f64,
    pub width_cm: f64,
    pub photos_qty: i64,
    pub volume_cm3: f64,
}

/// Cleaned, immutable product table in columnar layout.
///
/// Every retained row has all required fields present, and `volume_cm3` is
/// derived from the three dimensions at load time. Category labels stay in the
/// memory-mapped source and are addressed by byte offsets.
///
/// # Examples
///
/// ```no_run
/// # use product_dashboard::product::product_table::ProductTable;
/// let (table, summary) = ProductTable::load_csv("dashboard/product_final.csv".as_ref()).unwrap();
/// println!("{} rows, {} dropped", table.row_count(), summary.rows_dropped());
/// ```
#[derive(Debug)]
pub struct ProductTable {
    mmap: Option<Mmap>, // owns the CSV bytes
    headers: Vec<String>,
    category: Column,
    length_cm: Column,
    height_cm: Column,
    width_cm: Column,
    photos_qty: Column,
    volume_cm3: Column,
    distinct_categories: Vec<String>,
    row_count: usize,
}

/// Positions of the required columns in the header
#[derive(Debug, Clone, Copy)]
struct RequiredIndices {
    category: usize,
    length: usize,
    height: usize,
    width: usize,
    photos: usize,
}

#[derive(Debug, Default)]
struct BatchResult {
    category: Vec<(usize, usize)>,
    length: Vec<f64>,
    height: Vec<f64>,
    width: Vec<f64>,
    photos: Vec<i64>,
    /// Newline-delimited lines in the chunk, blanks included
    line_count: usize,
    rows_processed: usize,
    dropped_null: usize,
    /// `line` holds the chunk-local 0-based index until merged
    errors: Vec<ParseError>,
}

enum RowOutcome {
    Kept,
    Null,
    Invalid(ParseError),
}

impl ProductTable {
    /// Table with no rows and no columns
    pub fn empty() -> Self {
        ProductTable {
            mmap: None,
            headers: Vec::new(),
            category: Column::new(ColumnType::Str),
            length_cm: Column::new(ColumnType::Float64),
            height_cm: Column::new(ColumnType::Float64),
            width_cm: Column::new(ColumnType::Float64),
            photos_qty: Column::new(ColumnType::Int64),
            volume_cm3: Column::new(ColumnType::Float64),
            distinct_categories: Vec::new(),
            row_count: 0,
        }
    }

    /// Loads and cleans a product CSV file using memory mapping.
    ///
    /// Steps run in order: existence check, header parse, required-column check,
    /// parallel row parse dropping rows with missing required values, and finally
    /// the `volume_cm3` derivation.
    ///
    /// # Errors
    /// - [`DashboardError::DataSourceNotFound`] if `path` is not a readable file
    /// - [`DashboardError::SchemaMismatch`] if any required column is absent
    /// - [`DashboardError::Io`] if the file cannot be mapped
    pub fn load_csv(path: &Path) -> Result<(Self, ParseSummary), DashboardError> {
        let started = Instant::now();

        if !path.is_file() {
            return Err(DashboardError::DataSourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DashboardError::DataSourceNotFound {
                path: path.to_path_buf(),
            },
            _ => DashboardError::Io(e),
        })?;

        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            // The file is treated as read-only for the lifetime of the table
            Some(unsafe { Mmap::map(&file)? })
        };
        let buf: &[u8] = mmap.as_deref().unwrap_or(&[]);

        // Parse header
        let header_end = memchr::memchr(b'\n', buf).unwrap_or(buf.len());
        let headers = Self::parse_header(&buf[..header_end]);
        let indices = Self::resolve_required(&headers)?;

        let data_start = (header_end + 1).min(buf.len());
        let data = &buf[data_start..];

        // Find chunk boundaries (split by newlines)
        let num_threads = rayon::current_num_threads().max(1);
        let chunks = Self::find_chunk_boundaries(data, num_threads);

        let batch_results: Vec<BatchResult> = chunks
            .par_iter()
            .map(|(start, end)| {
                Self::parse_chunk(&data[*start..*end], data_start + start, &headers, indices)
            })
            .collect();

        let mut category = Column::new(ColumnType::Str);
        let mut length_cm = Column::new(ColumnType::Float64);
        let mut height_cm = Column::new(ColumnType::Float64);
        let mut width_cm = Column::new(ColumnType::Float64);
        let mut photos_qty = Column::new(ColumnType::Int64);

        let mut summary = ParseSummary::default();
        // Header is line 1
        let mut line_base = 2;

        for batch in batch_results {
            summary.rows_processed += batch.rows_processed;
            summary.rows_dropped_null += batch.dropped_null;
            summary.rows_retained += batch.category.len();
            summary
                .errors
                .extend(batch.errors.into_iter().map(|mut e| {
                    e.line += line_base;
                    e
                }));
            line_base += batch.line_count;

            category.push_chunk_str(batch.category);
            length_cm.push_chunk_float64(batch.length);
            height_cm.push_chunk_float64(batch.height);
            width_cm.push_chunk_float64(batch.width);
            photos_qty.push_chunk_int64(batch.photos);
        }

        for col in [
            &mut category,
            &mut length_cm,
            &mut height_cm,
            &mut width_cm,
            &mut photos_qty,
        ] {
            col.flatten_in_place();
        }

        let volumes: Vec<f64> = length_cm
            .iter_f64()
            .zip(height_cm.iter_f64())
            .zip(width_cm.iter_f64())
            .map(|((l, h), w)| l * h * w)
            .collect();
        let mut volume_cm3 = Column::new(ColumnType::Float64);
        volume_cm3.push_chunk_float64(volumes);

        let distinct_categories = category
            .iter_str()
            .map(|(s, e)| String::from_utf8_lossy(&buf[s..e]).into_owned())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();

        let row_count = summary.rows_retained;
        let table = ProductTable {
            mmap,
            headers,
            category,
            length_cm,
            height_cm,
            width_cm,
            photos_qty,
            volume_cm3,
            distinct_categories,
            row_count,
        };

        log::info!(
            "loaded {} of {} product rows from {} in {:?}",
            summary.rows_retained,
            summary.rows_processed,
            path.display(),
            started.elapsed()
        );
        if summary.rows_dropped() > 0 {
            log::warn!(
                "dropped {} rows ({} with missing values, {} unparsable)",
                summary.rows_dropped(),
                summary.rows_dropped_null,
                summary.errors.len()
            );
        }
        for err in summary.errors.iter().take(5) {
            log::debug!(
                "line {}: column '{}' value '{}': {}",
                err.line,
                err.column,
                err.value,
                err.error.as_deref().unwrap_or("ragged row")
            );
        }

        Ok((table, summary))
    }

    fn parse_header(line: &[u8]) -> Vec<String> {
        let line = line.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(line);
        if clean_field(line).is_empty() {
            return Vec::new();
        }
        line.split(|&b| b == b',')
            .map(|s| String::from_utf8_lossy(clean_field(s)).into_owned())
            .collect()
    }

    fn resolve_required(headers: &[String]) -> Result<RequiredIndices, DashboardError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DashboardError::SchemaMismatch { missing });
        }

        let index = |name: &str| {
            position(name).ok_or_else(|| DashboardError::SchemaMismatch {
                missing: vec![name.to_string()],
            })
        };
        Ok(RequiredIndices {
            category: index(CATEGORY_COLUMN)?,
            length: index(LENGTH_COLUMN)?,
            height: index(HEIGHT_COLUMN)?,
            width: index(WIDTH_COLUMN)?,
            photos: index(PHOTOS_COLUMN)?,
        })
    }

    fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
        if data.is_empty() {
            return vec![];
        }

        let chunk_size = data.len() / num_chunks;
        let mut boundaries = Vec::with_capacity(num_chunks);
        let mut start = 0;

        for i in 0..num_chunks - 1 {
            let mut end = ((i + 1) * chunk_size).max(start);

            // Find next newline
            while end < data.len() && data[end] != b'\n' {
                end += 1;
            }

            if end < data.len() {
                end += 1; // Include the newline
            }

            if start < end {
                boundaries.push((start, end));
            }
            start = end;
        }

        // Last chunk gets everything remaining
        if start < data.len() {
            boundaries.push((start, data.len()));
        }

        boundaries
    }

    fn parse_chunk(
        chunk: &[u8],
        chunk_offset: usize, // Absolute offset of this chunk in the file
        headers: &[String],
        indices: RequiredIndices,
    ) -> BatchResult {
        let mut batch = BatchResult::default();
        let mut fields: Vec<(usize, usize)> = Vec::with_capacity(headers.len());

        let mut start = 0;
        let line_ends = memchr_iter(b'\n', chunk).chain(
            // Final line without a trailing newline
            (chunk.last() != Some(&b'\n') && !chunk.is_empty()).then_some(chunk.len()),
        );

        for (line_idx, end) in line_ends.enumerate() {
            let line = &chunk[start..end];
            let line_offset = chunk_offset + start;
            start = end + 1;
            batch.line_count += 1;

            if clean_field(line).is_empty() {
                continue;
            }
            batch.rows_processed += 1;

            // Split line into fields, relative to line start
            fields.clear();
            let mut field_start = 0;
            for comma_pos in memchr_iter(b',', line) {
                fields.push((field_start, comma_pos));
                field_start = comma_pos + 1;
            }
            fields.push((field_start, line.len()));

            if fields.len() != headers.len() {
                batch.errors.push(ParseError {
                    line: line_idx,
                    column: String::new(),
                    value: format!("expected {} fields, got {}", headers.len(), fields.len()),
                    error: None,
                });
                continue;
            }

            match Self::parse_row(line, line_offset, &fields, headers, indices, &mut batch) {
                RowOutcome::Kept => {}
                RowOutcome::Null => batch.dropped_null += 1,
                RowOutcome::Invalid(mut err) => {
                    err.line = line_idx;
                    batch.errors.push(err);
                }
            }
        }

        batch
    }

    fn parse_row(
        line: &[u8],
        line_offset: usize,
        fields: &[(usize, usize)],
        headers: &[String],
        indices: RequiredIndices,
        batch: &mut BatchResult,
    ) -> RowOutcome {
        let field = |idx: usize| {
            let (s, e) = fields[idx];
            let raw = &line[s..e];
            let cleaned = clean_field(raw);
            // Absolute offset of the cleaned slice
            let abs_start = line_offset + s + (cleaned.as_ptr() as usize - raw.as_ptr() as usize);
            (cleaned, abs_start)
        };

        let (category, category_start) = field(indices.category);
        let (length, _) = field(indices.length);
        let (height, _) = field(indices.height);
        let (width, _) = field(indices.width);
        let (photos, _) = field(indices.photos);

        if [category, length, height, width, photos]
            .iter()
            .any(|f| is_null(f))
        {
            return RowOutcome::Null;
        }

        let invalid = |idx: usize, value: &[u8], error: String| {
            RowOutcome::Invalid(ParseError {
                line: 0,
                column: headers[idx].clone(),
                value: String::from_utf8_lossy(value).into_owned(),
                error: Some(error),
            })
        };

        if let Err(e) = str::from_utf8(category) {
            return invalid(indices.category, category, e.to_string());
        }

        let mut dims = [0.0f64; 3];
        for (slot, (idx, value)) in dims.iter_mut().zip([
            (indices.length, length),
            (indices.height, height),
            (indices.width, width),
        ]) {
            match parse_f64(value) {
                Ok(Some(v)) => *slot = v,
                Ok(None) => return RowOutcome::Null,
                Err(e) => return invalid(idx, value, e),
            }
        }

        let photos_qty = match parse_count(photos) {
            Ok(Some(v)) => v,
            Ok(None) => return RowOutcome::Null,
            Err(e) => return invalid(indices.photos, photos, e),
        };

        batch
            .category
            .push((category_start, category_start + category.len()));
        batch.length.push(dims[0]);
        batch.height.push(dims[1]);
        batch.width.push(dims[2]);
        batch.photos.push(photos_qty);
        RowOutcome::Kept
    }

    // Helper to get string value from mmap using offsets
    fn get_string(&self, start: usize, end: usize) -> &str {
        match self.mmap.as_ref().and_then(|m| m.get(start..end)) {
            Some(bytes) => str::from_utf8(bytes).unwrap_or(""),
            None => "",
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Distinct category labels in ascending lexicographic order
    pub fn distinct_categories(&self) -> &[String] {
        &self.distinct_categories
    }

    pub fn category(&self, row: usize) -> Option<&str> {
        self.category
            .get_str(row)
            .map(|(s, e)| self.get_string(s, e))
    }

    pub fn column(&self, field: NumericField) -> &Column {
        match field {
            NumericField::LengthCm => &self.length_cm,
            NumericField::HeightCm => &self.height_cm,
            NumericField::WidthCm => &self.width_cm,
            NumericField::PhotosQty => &self.photos_qty,
            NumericField::VolumeCm3 => &self.volume_cm3,
        }
    }

    pub fn value(&self, field: NumericField, row: usize) -> Option<f64> {
        self.column(field).get_f64(row)
    }

    pub fn record(&self, row: usize) -> Option<ProductRecord<'_>> {
        Some(ProductRecord {
            category: self.category(row)?,
            length_cm: self.length_cm.get_f64(row)?,
            height_cm: self.height_cm.get_f64(row)?,
            width_cm: self.width_cm.get_f64(row)?,
            photos_qty: self.photos_qty.get_i64(row)?,
            volume_cm3: self.volume_cm3.get_f64(row)?,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = ProductRecord<'_>> + '_ {
        (0..self.row_count).filter_map(|row| self.record(row))
    }

    /// Row indices whose category is part of `selection`, in table order
    pub fn filter_categories(&self, selection: &CategorySelection) -> Vec<usize> {
        if selection.is_empty() {
            return Vec::new();
        }
        let wanted = selection.as_set();
        self.category
            .iter_str()
            .enumerate()
            .filter(|(_, (s, e))| wanted.contains(self.get_string(*s, *e)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Group `rows` by category and reduce each group with `metric`.
    ///
    /// Groups come back in first-seen order; ranking is left to the caller.
    pub fn group_by(&self, rows: &[usize], metric: Metric) -> Vec<(&str, AggregateValue)> {
        // (sum, count) per category, plus first-seen order
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, (f64, usize)> = HashMap::new();
        let values = match metric {
            Metric::Count => None,
            Metric::Mean(field) => Some(self.column(field)),
        };

        for &row in rows {
            let Some(key) = self.category(row) else {
                continue;
            };
            let v = match values {
                Some(col) => match col.get_f64(row) {
                    Some(v) => v,
                    None => continue,
                },
                None => 0.0,
            };
            let entry = groups.entry(key).or_insert_with(|| {
                order.push(key);
                (0.0, 0)
            });
            entry.0 += v;
            entry.1 += 1;
        }

        order
            .into_iter()
            .filter_map(|key| {
                let (sum, count) = groups.get(key)?;
                let value = match metric {
                    Metric::Count => AggregateValue::Int(*count as i64),
                    Metric::Mean(_) => AggregateValue::Float(sum / *count as f64),
                };
                Some((key, value))
            })
            .collect()
    }
}

impl Default for ProductTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// Trim ASCII whitespace (including `\r`) and one pair of surrounding quotes
fn clean_field(field: &[u8]) -> &[u8] {
    let trimmed = field.trim_ascii();
    match trimmed {
        [b'"', inner @ .., b'"'] => inner.trim_ascii(),
        _ => trimmed,
    }
}

fn is_null(field: &[u8]) -> bool {
    field.is_empty() || NULL_MARKERS.iter().any(|m| field.eq_ignore_ascii_case(m))
}

/// `Ok(None)` for a NaN literal
fn parse_f64(field: &[u8]) -> Result<Option<f64>, String> {
    let v = fast_float::parse::<f64, _>(field).map_err(|e| e.to_string())?;
    Ok((!v.is_nan()).then_some(v))
}

/// Integer counts, also accepting integral floats such as `3.0`
fn parse_count(field: &[u8]) -> Result<Option<i64>, String> {
    if let Ok(v) = atoi_simd::parse::<i64>(field) {
        return Ok(Some(v));
    }
    match parse_f64(field)? {
        None => Ok(None),
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            Ok(Some(v as i64))
        }
        Some(v) => Err(format!("{v} is not a whole number")),
    }
}
