use std::collections::BTreeSet;

use oppy_core::session::FilterField;
use serde::Serialize;

/// Interactive action identifiers understood by the flow.
pub const ACTION_FIND_OPPORTUNITY: &str = "opportunity.find.v1";
pub const ACTION_CREATE_OPPORTUNITY: &str = "opportunity.create.v1";
pub const ACTION_SHOW_RESULTS: &str = "opportunity.results.v1";

/// Button values carried by the results action.
pub const RESULTS_VALUE_INITIAL: &str = "initial";
pub const RESULTS_VALUE_NEXT: &str = "next";
pub const RESULTS_VALUE_PREV: &str = "prev";

/// Action id of the multi-select dropdown for one filter dimension.
pub fn filter_action_id(field: FilterField) -> &'static str {
    match field {
        FilterField::TimeCommitment => "opportunity.filter.time_commitments.v1",
        FilterField::Location => "opportunity.filter.locations.v1",
        FilterField::AreaOfFocus => "opportunity.filter.areas_of_focus.v1",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self { text: TextObject::plain(value.clone()), value }
    }
}

/// Section accessory elements. Only the multi-select is needed so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    MultiStaticSelect {
        action_id: String,
        placeholder: TextObject,
        options: Vec<SelectOption>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    Actions {
        block_id: String,
        elements: Vec<ButtonElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<Accessory>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn multi_select(
        &mut self,
        action_id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> &mut Self {
        self.accessory = Some(Accessory::MultiStaticSelect {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            options,
        });
        self
    }

    fn build(self) -> (TextObject, Option<Accessory>) {
        (self.text.unwrap_or_else(|| TextObject::plain("")), self.accessory)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Entry menu shown in response to the slash command.
pub fn menu_message() -> MessageTemplate {
    MessageBuilder::new("Find or create a volunteer opportunity")
        .actions("opportunity.menu.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(ACTION_FIND_OPPORTUNITY, "Find a Volunteer Opportunity")
                        .value("find_opportunity"),
                )
                .button(
                    ButtonElement::new(
                        ACTION_CREATE_OPPORTUNITY,
                        "Create a Volunteer Opportunity",
                    )
                    .value("create_opportunity"),
                );
        })
        .build()
}

/// Link to the external creation form.
pub fn create_opportunity_message(form_url: &str) -> MessageTemplate {
    MessageBuilder::new("Create a volunteer opportunity")
        .section("opportunity.create.link.v1", |section| {
            section.mrkdwn(format!(
                "Click the link below to create a volunteer opportunity:\n{form_url}"
            ));
        })
        .build()
}

fn prompt_label(field: FilterField) -> &'static str {
    match field {
        FilterField::TimeCommitment => "Select time commitments.",
        FilterField::Location => "Select locations.",
        FilterField::AreaOfFocus => "Select areas of focus.",
    }
}

fn filter_section(field: FilterField, options: &BTreeSet<String>) -> (String, FilterSection) {
    let block_id = format!("opportunity.filter.{}.section.v1", field.storage_key());
    let section = FilterSection {
        label: prompt_label(field),
        action_id: filter_action_id(field),
        options: options.iter().map(SelectOption::plain).collect(),
    };
    (block_id, section)
}

struct FilterSection {
    label: &'static str,
    action_id: &'static str,
    options: Vec<SelectOption>,
}

/// The three-dropdown filter prompt plus a Search button. Dropdown options
/// come from a scan of the backing table's columns.
pub fn filter_prompt_message(
    time_commitments: &BTreeSet<String>,
    locations: &BTreeSet<String>,
    areas_of_focus: &BTreeSet<String>,
) -> MessageTemplate {
    let sections = [
        filter_section(FilterField::TimeCommitment, time_commitments),
        filter_section(FilterField::Location, locations),
        filter_section(FilterField::AreaOfFocus, areas_of_focus),
    ];

    let mut builder = MessageBuilder::new("Narrow down volunteer opportunities");
    for (block_id, section) in sections {
        builder = builder.section(block_id, |block| {
            block
                .plain(section.label)
                .multi_select(section.action_id, section.label, section.options);
        });
    }

    builder
        .actions("opportunity.filter.actions.v1", |actions| {
            actions.button(
                ButtonElement::new(ACTION_SHOW_RESULTS, "Search")
                    .style(ButtonStyle::Primary)
                    .value(RESULTS_VALUE_INITIAL),
            );
        })
        .build()
}

/// One rendered search hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpportunityCard {
    pub project_name: String,
    pub organization: String,
}

/// One page of search results with Previous/Next buttons as available.
pub fn results_message(
    cards: &[OpportunityCard],
    has_prev: bool,
    has_next: bool,
) -> MessageTemplate {
    let mut builder = MessageBuilder::new("Volunteer opportunity search results");

    if cards.is_empty() {
        builder = builder.section("opportunity.results.empty.v1", |section| {
            section.mrkdwn("Didn't find any matching results :persevere:");
        });
    } else {
        for (index, card) in cards.iter().enumerate() {
            builder = builder.section(format!("opportunity.results.{index}.v1"), |section| {
                section.mrkdwn(format!(
                    "Project Name: {}\nOrganization: {}",
                    card.project_name, card.organization
                ));
            });
        }
    }

    if has_prev || has_next {
        builder = builder.actions("opportunity.results.pager.v1", |actions| {
            if has_prev {
                actions.button(
                    ButtonElement::new(ACTION_SHOW_RESULTS, "Previous")
                        .value(RESULTS_VALUE_PREV),
                );
            }
            if has_next {
                actions.button(
                    ButtonElement::new(ACTION_SHOW_RESULTS, "Next").value(RESULTS_VALUE_NEXT),
                );
            }
        });
    }

    builder.build()
}

/// Generic failure card shown when an interaction cannot be completed.
pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("opportunity.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("opportunity.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use oppy_core::session::FilterField;

    use super::{
        error_message, filter_action_id, filter_prompt_message, menu_message, results_message,
        Accessory, Block, ButtonStyle, OpportunityCard, TextObject, ACTION_CREATE_OPPORTUNITY,
        ACTION_FIND_OPPORTUNITY, ACTION_SHOW_RESULTS, RESULTS_VALUE_INITIAL, RESULTS_VALUE_NEXT,
        RESULTS_VALUE_PREV,
    };

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn menu_offers_find_and_create_buttons() {
        let message = menu_message();
        assert_eq!(message.blocks.len(), 1);

        let Block::Actions { elements, .. } = &message.blocks[0] else {
            panic!("expected actions block");
        };
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].action_id, ACTION_FIND_OPPORTUNITY);
        assert_eq!(elements[1].action_id, ACTION_CREATE_OPPORTUNITY);
    }

    #[test]
    fn filter_prompt_renders_three_dropdowns_and_primary_search() {
        let message = filter_prompt_message(
            &set(&["1-2 hrs", "3-5 hrs"]),
            &set(&["Remote"]),
            &set(&["Education"]),
        );

        assert_eq!(message.blocks.len(), 4);

        let Block::Section { accessory: Some(Accessory::MultiStaticSelect { action_id, options, .. }), .. } =
            &message.blocks[0]
        else {
            panic!("expected multi-select section");
        };
        assert_eq!(action_id, filter_action_id(FilterField::TimeCommitment));
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].value, "1-2 hrs");

        let Block::Actions { elements, .. } = &message.blocks[3] else {
            panic!("expected search actions block");
        };
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].action_id, ACTION_SHOW_RESULTS);
        assert_eq!(elements[0].value.as_deref(), Some(RESULTS_VALUE_INITIAL));
        assert_eq!(elements[0].style, Some(ButtonStyle::Primary));
    }

    #[test]
    fn results_render_cards_and_both_pager_buttons() {
        let cards = vec![
            OpportunityCard {
                project_name: "River Cleanup".to_owned(),
                organization: "Green Earth".to_owned(),
            },
            OpportunityCard {
                project_name: "Tutoring".to_owned(),
                organization: "Study Buddies".to_owned(),
            },
        ];

        let message = results_message(&cards, true, true);
        assert_eq!(message.blocks.len(), 3);

        let Block::Section { text: TextObject::Mrkdwn { text }, .. } = &message.blocks[0] else {
            panic!("expected markdown result card");
        };
        assert!(text.contains("River Cleanup"));
        assert!(text.contains("Green Earth"));

        let Block::Actions { elements, .. } = &message.blocks[2] else {
            panic!("expected pager actions block");
        };
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].value.as_deref(), Some(RESULTS_VALUE_PREV));
        assert_eq!(elements[1].value.as_deref(), Some(RESULTS_VALUE_NEXT));
    }

    #[test]
    fn first_page_omits_previous_button() {
        let cards = vec![OpportunityCard {
            project_name: "Tutoring".to_owned(),
            organization: "Study Buddies".to_owned(),
        }];

        let message = results_message(&cards, false, true);
        let Block::Actions { elements, .. } = message.blocks.last().expect("pager block") else {
            panic!("expected pager actions block");
        };
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].value.as_deref(), Some(RESULTS_VALUE_NEXT));
    }

    #[test]
    fn empty_results_render_fallback_section_without_pager() {
        let message = results_message(&[], false, false);
        assert_eq!(message.blocks.len(), 1);
        assert!(matches!(
            &message.blocks[0],
            Block::Section { text: TextObject::Mrkdwn { text }, .. }
                if text.contains("Didn't find any matching results")
        ));
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let message = error_message("Cannot process request", "req-123");
        let Block::Context { elements, .. } = &message.blocks[1] else {
            panic!("expected context block");
        };
        assert!(matches!(
            elements.first(),
            Some(TextObject::Plain { text }) if text.contains("req-123")
        ));
    }

    #[test]
    fn text_objects_serialize_with_slack_type_tags() {
        let plain = serde_json::to_value(TextObject::plain("hello")).expect("serialize");
        assert_eq!(plain["type"], "plain_text");

        let mrkdwn = serde_json::to_value(TextObject::mrkdwn("*hi*")).expect("serialize");
        assert_eq!(mrkdwn["type"], "mrkdwn");
    }
}
