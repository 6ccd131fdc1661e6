use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::backend::Backend;
use crate::domain::{DeskError, EXCLUDED_FIELDS, PAGE_SIZES};
use crate::record::{Record, RecordKind, Value};

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortState {
    pub field: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(field: &str, direction: SortDirection) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }

    /// Same field flips the direction, a new field starts ascending.
    pub fn select(&mut self, field: &str) {
        if self.field == field {
            self.direction = self.direction.flip();
        } else {
            self.field = field.to_string();
            self.direction = SortDirection::Ascending;
        }
    }
}

impl Default for SortState {
    fn default() -> Self {
        SortState::new("id", SortDirection::Ascending)
    }
}

impl SortState {
    /// Initial order of a freshly loaded table, newest distributors first.
    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Retailer => SortState::default(),
            RecordKind::Distributor => SortState::new("id", SortDirection::Descending),
        }
    }
}

/// Number of entries per page, restricted to `PAGE_SIZES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(usize);

impl PageSize {
    pub fn new(size: usize) -> Result<Self, DeskError> {
        if PAGE_SIZES.contains(&size) {
            Ok(PageSize(size))
        } else {
            Err(DeskError::Validation(format!(
                "page size {size} is not one of {PAGE_SIZES:?}"
            )))
        }
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn next(&self) -> Self {
        let idx = PAGE_SIZES.iter().position(|&s| s == self.0).unwrap_or(0);
        PageSize(PAGE_SIZES[(idx + 1) % PAGE_SIZES.len()])
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize(PAGE_SIZES[0])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    search_term: String,
    sort: SortState,
    current_page: usize,
    page_size: PageSize,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            search_term: String::new(),
            sort: SortState::default(),
            current_page: 1,
            page_size: PageSize::default(),
        }
    }
}

impl ViewState {
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.search_term = term.to_string();
        self.current_page = 1;
    }

    pub fn set_page_size(&mut self, size: PageSize) {
        self.page_size = size;
        self.current_page = 1;
    }

    pub fn sort_by(&mut self, field: &str) {
        self.sort.select(field);
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
    }

    /// Sets the page without clamping, pages start at 1.
    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    pub fn clamp_page(&mut self, total_pages: usize) {
        self.current_page = self.current_page.clamp(1, total_pages.max(1));
    }
}

/// One page of the filtered and sorted collection.
#[derive(Debug)]
pub struct DerivedView<'a> {
    pub rows: Vec<&'a Record>,
    pub total_pages: usize,
    pub total_matches: usize,
    pub current_page: usize,
}

fn matches(record: &Record, needle: &str) -> bool {
    needle.is_empty()
        || record
            .values()
            .any(|v| v.as_text().to_lowercase().contains(needle))
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
    }
}

/// Ascending order of two cells. Text compares case-insensitively,
/// numbers numerically, mixed types by `rank`.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

/// Filter, sort and slice `records` for the given state. Pure, the
/// collection is never touched. A page past the end yields no rows.
pub fn derive_view<'a>(records: &'a [Record], state: &ViewState) -> DerivedView<'a> {
    let needle = state.search_term.to_lowercase();
    let mut rows: Vec<&Record> = records
        .par_iter()
        .filter(|r| matches(r, &needle))
        .collect();

    let field = state.sort.field.as_str();
    let descending = state.sort.direction == SortDirection::Descending;
    // sort_by is stable, reversing the comparator keeps ties in place
    rows.sort_by(|a, b| {
        let ord = compare_values(a.get(field).unwrap_or(&NULL), b.get(field).unwrap_or(&NULL));
        if descending { ord.reverse() } else { ord }
    });

    let total_matches = rows.len();
    let size = state.page_size.get();
    let total_pages = total_matches.div_ceil(size);
    let start = (state.current_page - 1).saturating_mul(size);
    let rows = if start >= total_matches {
        Vec::new()
    } else {
        rows.drain(start..std::cmp::min(start + size, total_matches))
            .collect()
    };

    trace!(
        "Derived view: term \"{}\", sort {:?}, page {}/{}, {} matches",
        state.search_term, state.sort, state.current_page, total_pages, total_matches
    );

    DerivedView {
        rows,
        total_pages,
        total_matches,
        current_page: state.current_page,
    }
}

/// Keys of the first record minus the backend bookkeeping fields.
pub fn display_columns(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|r| {
            r.keys()
                .filter(|k| !EXCLUDED_FIELDS.contains(k))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    Inferred,
    Declared,
}

/// Last fetched collection plus the view state over it.
#[derive(Debug)]
pub struct RecordTable {
    kind: RecordKind,
    columns: ColumnSource,
    records: Vec<Record>,
    state: ViewState,
    generation: u64,
    loading: bool,
}

impl RecordTable {
    pub fn new(kind: RecordKind, columns: ColumnSource) -> Self {
        let mut state = ViewState::default();
        state.set_sort(SortState::for_kind(kind));
        RecordTable {
            kind,
            columns,
            records: Vec::new(),
            state,
            generation: 0,
            loading: false,
        }
    }

    /// Drops the collection and resets the view, keeping the page size.
    /// The generation keeps counting so fetches already in flight stay stale.
    pub fn clear(&mut self) {
        let page_size = self.state.page_size();
        self.records.clear();
        self.state = ViewState::default();
        self.state.set_sort(SortState::for_kind(self.kind));
        self.state.set_page_size(page_size);
        self.generation += 1;
        self.loading = false;
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn columns(&self) -> Vec<String> {
        if self.records.is_empty() {
            return Vec::new();
        }
        match self.columns {
            ColumnSource::Inferred => display_columns(&self.records),
            ColumnSource::Declared => self.kind.schema().iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn view(&self) -> DerivedView<'_> {
        derive_view(&self.records, &self.state)
    }

    /// Starts a new fetch generation. Results of older ones are dropped.
    pub fn begin_fetch(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.generation
    }

    /// Installs a fetched collection. Returns false for a stale generation.
    pub fn replace(&mut self, generation: u64, records: Vec<Record>) -> bool {
        if generation != self.generation {
            debug!(
                "Dropping stale fetch {} (current {})",
                generation, self.generation
            );
            return false;
        }
        self.records = records
            .into_iter()
            .map(|r| r.without(&EXCLUDED_FIELDS))
            .collect();
        self.loading = false;
        self.clamp_page();
        true
    }

    /// The collection stays as it was, only the loading flag clears.
    pub fn fetch_failed(&mut self, generation: u64) {
        if generation == self.generation {
            self.loading = false;
        }
    }

    pub fn fetch(&mut self, backend: &dyn Backend) -> Result<usize, DeskError> {
        let generation = self.begin_fetch();
        match backend.fetch(self.kind) {
            Ok(records) => {
                self.replace(generation, records);
                Ok(self.records.len())
            }
            Err(e) => {
                self.fetch_failed(generation);
                Err(e)
            }
        }
    }

    /// Local removal after a confirmed delete. Absent ids are a no-op.
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id() != Some(id));
        let removed = self.records.len() != before;
        if removed {
            self.clamp_page();
        } else {
            debug!("Record {id} no longer present, nothing to remove");
        }
        removed
    }

    pub fn delete_record(&mut self, backend: &dyn Backend, id: i64) -> Result<bool, DeskError> {
        backend.delete(self.kind, id)?;
        Ok(self.remove(id))
    }

    pub fn search(&mut self, term: &str) {
        self.state.set_search_term(term);
        self.clamp_page();
    }

    pub fn sort_by(&mut self, field: &str) {
        self.state.sort_by(field);
    }

    pub fn set_page_size(&mut self, size: PageSize) {
        self.state.set_page_size(size);
        self.clamp_page();
    }

    pub fn cycle_page_size(&mut self) {
        let next = self.state.page_size().next();
        self.set_page_size(next);
    }

    pub fn goto_page(&mut self, page: usize) {
        self.state.set_page(page);
        self.clamp_page();
    }

    pub fn next_page(&mut self) {
        self.goto_page(self.state.current_page() + 1);
    }

    pub fn prev_page(&mut self) {
        self.goto_page(self.state.current_page().saturating_sub(1));
    }

    pub fn last_page(&mut self) {
        self.goto_page(usize::MAX);
    }

    fn clamp_page(&mut self) {
        let total_pages = self.view().total_pages;
        self.state.clamp_page(total_pages);
    }
}
