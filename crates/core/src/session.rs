use std::collections::BTreeSet;

/// Number of records shown per result screen.
pub const PAGE_SIZE: usize = 3;

/// The three filter dimensions a user can narrow a search by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterField {
    TimeCommitment,
    Location,
    AreaOfFocus,
}

impl FilterField {
    pub const ALL: [FilterField; 3] =
        [FilterField::TimeCommitment, FilterField::Location, FilterField::AreaOfFocus];

    /// Column name in the backing table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::TimeCommitment => "Time Commitment",
            Self::Location => "Location",
            Self::AreaOfFocus => "Area of Focus",
        }
    }

    /// Key fragment used by the session store.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::TimeCommitment => "time_commitments_select",
            Self::Location => "locations_select",
            Self::AreaOfFocus => "areas_of_focus_select",
        }
    }
}

/// Per-user, in-progress search state: three selection sets plus the current
/// page offset. A missing session is indistinguishable from the default.
///
/// Selections are ordered sets so that derived filter formulas come out
/// identical for identical sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySession {
    pub time_commitments: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub areas_of_focus: BTreeSet<String>,
    pub offset: usize,
}

impl QuerySession {
    pub fn selections(&self, field: FilterField) -> &BTreeSet<String> {
        match field {
            FilterField::TimeCommitment => &self.time_commitments,
            FilterField::Location => &self.locations,
            FilterField::AreaOfFocus => &self.areas_of_focus,
        }
    }

    /// Full replace of one field's selections. An empty set clears the
    /// filter on that dimension.
    pub fn set_selections(&mut self, field: FilterField, values: BTreeSet<String>) {
        match field {
            FilterField::TimeCommitment => self.time_commitments = values,
            FilterField::Location => self.locations = values,
            FilterField::AreaOfFocus => self.areas_of_focus = values,
        }
    }

    /// True when no dimension has a selection, i.e. a search would match
    /// every record.
    pub fn is_unfiltered(&self) -> bool {
        FilterField::ALL.iter().all(|field| self.selections(*field).is_empty())
    }
}
