//! Review and confirmation of a freshly extracted batch.
//!
//! Events come out of the pipeline "pending". The user toggles which ones to
//! keep ([`PendingEvent::selected`]), edits them through [`EventEdit`], and
//! finally calls [`confirm`]. Confirmation fills in missing recurrence
//! patterns and refuses the whole batch while any selected event is invalid.

use crate::dates;
use crate::error::ReviewError;
use crate::event::{CalendarEvent, EventEdit, Frequency, Recurrence};
use serde::Serialize;
use tracing::{debug, info};

/// An extracted event awaiting review. `selected` is UI state only and is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEvent {
    pub event: CalendarEvent,
    pub selected: bool,
}

impl PendingEvent {
    /// Every extracted event starts out selected.
    pub fn new(event: CalendarEvent) -> Self {
        Self { event, selected: true }
    }

    pub fn apply(&mut self, edit: EventEdit) {
        apply_edit(&mut self.event, edit);
    }
}

/// Wrap a whole extraction result for review.
pub fn pending(events: Vec<CalendarEvent>) -> Vec<PendingEvent> {
    events.into_iter().map(PendingEvent::new).collect()
}

/// Default pattern for a recurring event: weekly on the event's own weekday,
/// no end date. `None` while the event has no date.
pub fn synthesize_recurrence(event: &CalendarEvent) -> Option<Recurrence> {
    event.date.map(|date| Recurrence {
        frequency: Frequency::Weekly,
        days: vec![dates::weekday(date)],
        end_date: None,
    })
}

/// Fill in the pattern of a recurring event whose recurrence or day set is
/// empty. An existing end date and frequency are kept.
pub fn resolve_recurrence(event: &mut CalendarEvent) {
    if !event.is_recurring {
        return;
    }
    let Some(date) = event.date else {
        return;
    };
    let weekday = dates::weekday(date);
    let rec = event.recurrence.get_or_insert_with(Recurrence::default);
    if rec.days.is_empty() {
        rec.days.push(weekday);
        debug!("'{}': recurrence defaulted to {:?}", event.title, weekday);
    }
}

/// Apply a single user edit.
///
/// Turning recurrence on always starts from a fresh pattern derived from the
/// event's date; turning it off discards the pattern. A previously edited
/// pattern is not remembered across an off/on toggle.
pub fn apply_edit(event: &mut CalendarEvent, edit: EventEdit) {
    match edit {
        EventEdit::SetTitle(title) => event.title = title.trim().to_string(),
        EventEdit::SetDate(date) => event.date = date,
        EventEdit::SetTime(time) => event.time = time,
        EventEdit::SetType(event_type) => event.event_type = event_type,
        EventEdit::SetPriority(priority) => event.priority = priority,
        EventEdit::SetLocation(location) => event.location = location,
        EventEdit::SetDescription(description) => event.description = description,
        EventEdit::SetRecurring(true) => {
            event.is_recurring = true;
            event.recurrence = synthesize_recurrence(event);
        }
        EventEdit::SetRecurring(false) => {
            event.is_recurring = false;
            event.recurrence = None;
        }
        EventEdit::SetFrequency(frequency) => recurrence_mut(event).frequency = frequency,
        EventEdit::SetRecurrenceDays(days) => recurrence_mut(event).days = days,
        EventEdit::SetRecurrenceEnd(end) => recurrence_mut(event).end_date = end,
    }
}

fn recurrence_mut(event: &mut CalendarEvent) -> &mut Recurrence {
    event.recurrence.get_or_insert_with(Recurrence::default)
}

/// Check one event for confirmation.
pub fn validate(event: &CalendarEvent) -> Result<(), ReviewError> {
    if event.title.trim().is_empty() {
        return Err(ReviewError::MissingTitle);
    }
    let Some(date) = event.date else {
        return Err(ReviewError::MissingDate {
            title: event.title.clone(),
        });
    };
    if !event.is_recurring {
        return Ok(());
    }
    let end = event
        .recurrence
        .as_ref()
        .and_then(|r| r.end_date)
        .ok_or_else(|| ReviewError::RecurrenceEndDateMissing {
            title: event.title.clone(),
        })?;
    if end < date {
        return Err(ReviewError::RecurrenceEndsBeforeStart {
            title: event.title.clone(),
        });
    }
    Ok(())
}

/// Accept a reviewed batch.
///
/// Recurrence patterns are resolved first, then every selected event is
/// validated. The first invalid selected event rejects the whole batch.
/// Unselected events are discarded.
pub fn confirm(batch: Vec<PendingEvent>) -> Result<Vec<CalendarEvent>, ReviewError> {
    let total = batch.len();
    let mut accepted = Vec::with_capacity(total);

    for mut pending in batch {
        if !pending.selected {
            continue;
        }
        resolve_recurrence(&mut pending.event);
        validate(&pending.event)?;
        accepted.push(pending.event);
    }

    info!("Confirmed {} of {} events", accepted.len(), total);
    Ok(accepted)
}
