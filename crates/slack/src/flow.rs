//! The find/create opportunity interaction flow.
//!
//! Every handler runs against injected [`SessionStore`] and
//! [`OpportunitySource`] implementations, so the flow itself holds no
//! connection state and is shared behind an `Arc` by both event handlers.

use std::{collections::BTreeSet, sync::Arc};

use oppy_airtable::{AirtableError, OpportunityRecord, OpportunitySource};
use oppy_core::{pager, FilterExpression, FilterField, PAGE_SIZE};
use oppy_store::{SessionStore, StoreError};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    blocks::{
        self, filter_action_id, OpportunityCard, ACTION_CREATE_OPPORTUNITY,
        ACTION_FIND_OPPORTUNITY, ACTION_SHOW_RESULTS, RESULTS_VALUE_NEXT, RESULTS_VALUE_PREV,
    },
    events::{BlockActionEvent, BotResponse},
};

const PROJECT_NAME_COLUMN: &str = "Project Name";
const ORGANIZATION_COLUMN: &str = "Organization";
const MISSING_CELL_PLACEHOLDER: &str = "(not listed)";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] AirtableError),
}

/// Which page the results button asked for. Unknown button values fall back
/// to the current page rather than failing the interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PageAction {
    Initial,
    Next,
    Previous,
}

impl PageAction {
    fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(RESULTS_VALUE_NEXT) => Self::Next,
            Some(RESULTS_VALUE_PREV) => Self::Previous,
            _ => Self::Initial,
        }
    }

    fn offset_delta(self) -> i64 {
        match self {
            Self::Initial => 0,
            Self::Next => PAGE_SIZE as i64,
            Self::Previous => -(PAGE_SIZE as i64),
        }
    }
}

pub struct OpportunityFlow<S, D> {
    store: Arc<S>,
    source: Arc<D>,
    table: String,
    create_form_url: String,
}

impl<S, D> OpportunityFlow<S, D>
where
    S: SessionStore,
    D: OpportunitySource,
{
    pub fn new(
        store: Arc<S>,
        source: Arc<D>,
        table: impl Into<String>,
        create_form_url: impl Into<String>,
    ) -> Self {
        Self { store, source, table: table.into(), create_form_url: create_form_url.into() }
    }

    /// Entry menu for the slash command.
    pub fn menu(&self) -> BotResponse {
        BotResponse::ephemeral(blocks::menu_message())
    }

    /// Routes one block action. `Ok(None)` means the action was absorbed
    /// without a reply (dropdown changes) or was not ours to handle.
    pub async fn handle_action(
        &self,
        event: &BlockActionEvent,
    ) -> Result<Option<BotResponse>, FlowError> {
        if event.action_id == ACTION_CREATE_OPPORTUNITY {
            return Ok(Some(BotResponse::in_channel(blocks::create_opportunity_message(
                &self.create_form_url,
            ))));
        }

        if event.action_id == ACTION_FIND_OPPORTUNITY {
            return self.begin_search(&event.user_id).await.map(Some);
        }

        if let Some(field) = filter_field_for_action(&event.action_id) {
            self.store_selection(&event.user_id, field, &event.selected_values).await?;
            return Ok(None);
        }

        if event.action_id == ACTION_SHOW_RESULTS {
            let action = PageAction::from_value(event.value.as_deref());
            return self.show_results(&event.user_id, action).await.map(Some);
        }

        debug!(
            event_name = "flow.action.unrouted",
            action_id = %event.action_id,
            "block action has no flow handler"
        );
        Ok(None)
    }

    /// Starts a fresh search: discards any prior session, then builds the
    /// filter prompt from the live column values.
    async fn begin_search(&self, user_id: &str) -> Result<BotResponse, FlowError> {
        self.store.reset(user_id).await?;

        let time_commitments =
            self.source.column_values(&self.table, FilterField::TimeCommitment.column()).await?;
        let locations =
            self.source.column_values(&self.table, FilterField::Location.column()).await?;
        let areas_of_focus =
            self.source.column_values(&self.table, FilterField::AreaOfFocus.column()).await?;

        info!(
            event_name = "flow.search.started",
            user_id,
            time_commitment_options = time_commitments.len(),
            location_options = locations.len(),
            area_of_focus_options = areas_of_focus.len(),
            "presenting filter prompt"
        );

        Ok(BotResponse::ephemeral(blocks::filter_prompt_message(
            &time_commitments,
            &locations,
            &areas_of_focus,
        )))
    }

    /// Replaces one filter dimension with the dropdown's current selection.
    /// Deselecting every option clears the dimension.
    async fn store_selection(
        &self,
        user_id: &str,
        field: FilterField,
        selected: &[String],
    ) -> Result<(), FlowError> {
        let values: BTreeSet<String> = selected.iter().cloned().collect();

        debug!(
            event_name = "flow.filter.updated",
            user_id,
            field = field.storage_key(),
            value_count = values.len(),
            "stored filter selection"
        );

        self.store.set_field(user_id, field, values).await?;
        Ok(())
    }

    async fn show_results(
        &self,
        user_id: &str,
        action: PageAction,
    ) -> Result<BotResponse, FlowError> {
        let offset = self.store.adjust_offset(user_id, action.offset_delta()).await?;
        let session = self.store.get(user_id).await?;

        let formula = FilterExpression::from_session(&session).formula();
        let records = self.source.query(&self.table, formula.as_deref(), &[]).await?;

        let page = pager::page(&records, offset, PAGE_SIZE);
        let cards: Vec<OpportunityCard> = page.records.iter().map(card_for_record).collect();

        info!(
            event_name = "flow.results.page",
            user_id,
            offset,
            total = records.len(),
            shown = cards.len(),
            "rendering results page"
        );

        Ok(BotResponse::ephemeral(blocks::results_message(&cards, page.has_prev, page.has_next)))
    }
}

/// Reverse lookup from a dropdown action id to its filter dimension.
fn filter_field_for_action(action_id: &str) -> Option<FilterField> {
    FilterField::ALL.into_iter().find(|field| filter_action_id(*field) == action_id)
}

fn card_for_record(record: &OpportunityRecord) -> OpportunityCard {
    OpportunityCard {
        project_name: record
            .text(PROJECT_NAME_COLUMN)
            .unwrap_or(MISSING_CELL_PLACEHOLDER)
            .to_owned(),
        organization: record
            .text(ORGANIZATION_COLUMN)
            .unwrap_or(MISSING_CELL_PLACEHOLDER)
            .to_owned(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{BTreeSet, HashMap};

    use async_trait::async_trait;
    use oppy_airtable::{AirtableError, OpportunityRecord, OpportunitySource};
    use tokio::sync::Mutex;

    /// Scripted table backend: fixed records, fixed column values, and a
    /// log of every filter formula it was queried with.
    #[derive(Default)]
    pub(crate) struct CannedOpportunitySource {
        pub(crate) records: Vec<OpportunityRecord>,
        pub(crate) columns: HashMap<String, BTreeSet<String>>,
        pub(crate) fail_with: Option<AirtableError>,
        pub(crate) seen_filters: Mutex<Vec<Option<String>>>,
    }

    impl CannedOpportunitySource {
        pub(crate) fn with_records(records: Vec<OpportunityRecord>) -> Self {
            Self { records, ..Self::default() }
        }

        pub(crate) fn with_column(
            mut self,
            column: &str,
            values: &[&str],
        ) -> Self {
            self.columns.insert(
                column.to_owned(),
                values.iter().map(|value| (*value).to_owned()).collect(),
            );
            self
        }

        pub(crate) async fn last_filter(&self) -> Option<String> {
            self.seen_filters.lock().await.last().cloned().flatten()
        }
    }

    #[async_trait]
    impl OpportunitySource for CannedOpportunitySource {
        async fn query(
            &self,
            _table: &str,
            filter: Option<&str>,
            _fields: &[&str],
        ) -> Result<Vec<OpportunityRecord>, AirtableError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            self.seen_filters.lock().await.push(filter.map(str::to_owned));
            Ok(self.records.clone())
        }

        async fn column_values(
            &self,
            _table: &str,
            column: &str,
        ) -> Result<BTreeSet<String>, AirtableError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            Ok(self.columns.get(column).cloned().unwrap_or_default())
        }
    }
}
