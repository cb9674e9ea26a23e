// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use time::Date;
use time::macros::format_description;

use crate::model::PlanMacro;

pub const NAME_MAX_LENGTH: usize = 255;
pub const DESCRIPTION_MAX_LENGTH: usize = 10_000;

pub fn format_plan_date(date: Date) -> String {
    date.format(&format_description!("[day]/[month]/[year]"))
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_plan_date(raw: &str) -> Result<Date> {
    Date::parse(raw.trim(), &format_description!("[day]/[month]/[year]"))
        .with_context(|| format!("invalid date {raw:?}; use DD/MM/YYYY"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Name,
    Begin,
    End,
    Description,
}

impl FieldName {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Begin => "Start date",
            Self::End => "End date",
            Self::Description => "Plan description",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    TextArea,
}

/// One declarative form field. `value` is the authoritative state for the
/// field; edits (including date-picker edits) rewrite it and the form
/// re-renders from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: FieldName,
    pub kind: FieldKind,
    pub required: bool,
    pub max_length: Option<usize>,
    pub label: &'static str,
    pub value: String,
}

/// Regenerates the duplicate-plan field descriptors from the current model.
pub fn duplicate_plan_fields(model: Option<&PlanMacro>) -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor {
            name: FieldName::Name,
            kind: FieldKind::Text,
            required: true,
            max_length: Some(NAME_MAX_LENGTH),
            label: FieldName::Name.label(),
            value: model.map(|plan| plan.name.clone()).unwrap_or_default(),
        },
        FieldDescriptor {
            name: FieldName::Begin,
            kind: FieldKind::Date,
            required: true,
            max_length: None,
            label: FieldName::Begin.label(),
            value: model
                .map(|plan| format_plan_date(plan.begin))
                .unwrap_or_default(),
        },
        FieldDescriptor {
            name: FieldName::End,
            kind: FieldKind::Date,
            required: true,
            max_length: None,
            label: FieldName::End.label(),
            value: model
                .map(|plan| format_plan_date(plan.end))
                .unwrap_or_default(),
        },
        FieldDescriptor {
            name: FieldName::Description,
            kind: FieldKind::TextArea,
            required: false,
            max_length: Some(DESCRIPTION_MAX_LENGTH),
            label: FieldName::Description.label(),
            value: model
                .map(|plan| plan.description.clone())
                .unwrap_or_default(),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePlanInput {
    pub name: String,
    pub begin: Date,
    pub end: Date,
    pub description: String,
}

impl DuplicatePlanInput {
    /// Parses the edited field values. The first failing field wins, in
    /// descriptor order, so a single message can be surfaced to the user.
    pub fn from_fields(fields: &[FieldDescriptor]) -> Result<Self> {
        let mut name = None;
        let mut begin = None;
        let mut end = None;
        let mut description = String::new();

        for field in fields {
            let value = field.value.trim();
            if field.required && value.is_empty() {
                bail!("{} is required -- fill it in and retry", field.label);
            }
            if let Some(max_length) = field.max_length
                && value.chars().count() > max_length
            {
                bail!("{} must be at most {} characters", field.label, max_length);
            }

            match field.name {
                FieldName::Name => name = Some(value.to_owned()),
                FieldName::Begin => begin = Some(parse_plan_date(value)?),
                FieldName::End => end = Some(parse_plan_date(value)?),
                FieldName::Description => description = value.to_owned(),
            }
        }

        let Some(name) = name else {
            bail!("form is missing the name field");
        };
        let Some(begin) = begin else {
            bail!("form is missing the start date field");
        };
        let Some(end) = end else {
            bail!("form is missing the end date field");
        };

        Ok(Self {
            name,
            begin,
            end,
            description,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.end < self.begin {
            bail!("end date must be on/after the start date");
        }
        Ok(())
    }

    pub fn apply_to(&self, plan: &mut PlanMacro) {
        plan.name = self.name.clone();
        plan.begin = self.begin;
        plan.end = self.end;
        plan.description = self.description.clone();
    }
}
