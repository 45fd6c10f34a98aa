//! Recurring task generation rules.
//!
//! A template is due when it is active, has no outstanding generated task,
//! and either never generated or at least `frequency_days` of wall-clock
//! time have passed since it last did. Elapsed time is measured in
//! fractional days, not calendar days.

use chrono::{DateTime, Utc};

use crate::model::{Task, TaskId, TaskOrigin, TaskStatus, Template};

const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Fractional days between `since` and `now` (negative if `since` is in the future).
pub fn elapsed_days(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - since).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Decide whether `template` should produce a new task at `now`.
pub fn is_due(template: &Template, has_outstanding: bool, now: DateTime<Utc>) -> bool {
    if !template.is_active || has_outstanding {
        return false;
    }
    match template.last_generated_at {
        None => true,
        Some(last) => elapsed_days(last, now) >= f64::from(template.frequency_days),
    }
}

/// Build the open task a due template produces.
///
/// The task carries the template's reward and eligibility fields as they
/// are right now.
pub fn materialize(template: &Template, now: DateTime<Utc>) -> Task {
    Task {
        id: TaskId::new(),
        name: template.name.clone(),
        description: template.description.clone(),
        base_points: template.base_points,
        requires_approval: template.requires_approval,
        min_age: template.min_age,
        status: TaskStatus::Open,
        origin: TaskOrigin::Generated {
            template_id: template.id,
        },
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateId;
    use chrono::Duration;

    fn template(frequency_days: u32, last: Option<DateTime<Utc>>) -> Template {
        Template {
            id: TemplateId::new(),
            name: "Empty dishwasher".to_string(),
            description: Some("top and bottom rack".to_string()),
            base_points: 3,
            requires_approval: true,
            min_age: Some(7),
            frequency_days,
            is_active: true,
            last_generated_at: last,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_never_generated_is_due() {
        let now = Utc::now();
        assert!(is_due(&template(2, None), false, now));
    }

    #[test]
    fn test_due_after_frequency() {
        let now = Utc::now();
        assert!(is_due(&template(2, Some(now - Duration::days(3))), false, now));
        assert!(is_due(&template(2, Some(now - Duration::days(2))), false, now));
        assert!(!is_due(
            &template(2, Some(now - Duration::hours(47))),
            false,
            now
        ));
    }

    #[test]
    fn test_fractional_days() {
        let now = Utc::now();
        let last = now - Duration::hours(36);
        assert!((elapsed_days(last, now) - 1.5).abs() < 1e-9);
        assert!(is_due(&template(1, Some(last)), false, now));
    }

    #[test]
    fn test_outstanding_or_inactive_not_due() {
        let now = Utc::now();
        assert!(!is_due(&template(1, None), true, now));

        let mut t = template(1, None);
        t.is_active = false;
        assert!(!is_due(&t, false, now));
    }

    #[test]
    fn test_future_last_generated_not_due() {
        let now = Utc::now();
        assert!(!is_due(
            &template(1, Some(now + Duration::days(5))),
            false,
            now
        ));
    }

    #[test]
    fn test_materialize_copies_fields() {
        let now = Utc::now();
        let tpl = template(2, None);
        let task = materialize(&tpl, now);
        assert_eq!(task.name, tpl.name);
        assert_eq!(task.base_points, 3);
        assert!(task.requires_approval);
        assert_eq!(task.min_age, Some(7));
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.origin.template_id(), Some(tpl.id));
        assert_eq!(task.created_at, now);
    }
}
