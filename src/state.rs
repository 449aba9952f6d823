//! Pagination, sort and filter state of the customer table.
//!
//! [`ViewState`] is an immutable value. All transitions go through [`reduce`],
//! which returns the next state together with the information whether the
//! displayed page has to be fetched again.

use tracing::trace;

use crate::record::{SortDirection, SortField, StageFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    page_number: usize,
    page_size: usize,
    sort_field: SortField,
    sort_direction: SortDirection,
    filter: StageFilter,
    total_count: Option<usize>,
    total_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SetSort(SortField, SortDirection),
    SetFilter(StageFilter),
    NextPage,
    PreviousPage,
    TotalCountLoaded(usize),
    SetPageSize(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ViewState,
    pub refetch: bool,
}

/// Query parameters for a single page, as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub filter: StageFilter,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        ViewState {
            page_number: 1,
            page_size: page_size.max(1),
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            filter: StageFilter::default(),
            total_count: None,
            total_pages: 0,
        }
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn sort_field(&self) -> SortField {
        self.sort_field
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn filter(&self) -> StageFilter {
        self.filter
    }

    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn is_previous_disabled(&self) -> bool {
        self.page_number == 1
    }

    // `>=` keeps the control disabled while no count is known (total_pages == 0).
    pub fn is_next_disabled(&self) -> bool {
        self.page_number >= self.total_pages
    }

    pub fn offset(&self) -> usize {
        (self.page_number - 1) * self.page_size
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            limit: self.page_size,
            offset: self.offset(),
            sort_field: self.sort_field,
            sort_direction: self.sort_direction,
            filter: self.filter,
        }
    }
}

pub fn total_pages(total_count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size)
}

pub fn reduce(state: &ViewState, action: Action) -> Transition {
    let mut next = state.clone();
    let refetch = match action {
        Action::SetSort(field, direction) => {
            next.sort_field = field;
            next.sort_direction = direction;
            true
        }
        Action::SetFilter(filter) => {
            next.filter = filter;
            next.page_number = 1;
            true
        }
        Action::NextPage => {
            if next.page_number >= next.total_pages {
                false
            } else {
                next.page_number += 1;
                true
            }
        }
        Action::PreviousPage => {
            if next.page_number <= 1 {
                false
            } else {
                next.page_number -= 1;
                true
            }
        }
        Action::TotalCountLoaded(count) => {
            next.total_count = Some(count);
            next.total_pages = total_pages(count, next.page_size);
            if next.total_pages > 0 && next.page_number > next.total_pages {
                next.page_number = next.total_pages;
                true
            } else {
                false
            }
        }
        Action::SetPageSize(0) => false,
        Action::SetPageSize(size) => {
            next.page_size = size;
            next.page_number = 1;
            next.total_pages = next
                .total_count
                .map(|count| total_pages(count, size))
                .unwrap_or(next.total_pages);
            true
        }
    };
    trace!(
        "Reduce {action:?}: page {} -> {}, refetch {refetch}",
        state.page_number, next.page_number
    );
    Transition {
        state: next,
        refetch,
    }
}
