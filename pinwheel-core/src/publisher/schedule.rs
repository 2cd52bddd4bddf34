use std::time::Duration;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{SchedulingSection, WaitSection};
use crate::publisher::error::{PublishError, PublisherResult};
use crate::publisher::platform;
use crate::publisher::request::ScheduleSpec;
use crate::publisher::session::PinSession;

/// Bounded scroll passes while hunting a time option in a long list.
const SCROLL_PASSES: usize = 10;
const SCROLL_STEP: f64 = 160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePlan {
    Immediate,
    At {
        effective: NaiveDateTime,
        bumped: bool,
    },
}

/// Shape the date input expects, inferred from its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInputFormat {
    Iso,
    MonthFirst { separator: char },
    DayFirst { separator: char },
}

/// Plans the effective publish instant and drives the scheduling UI.
/// Planning is pure so the slot math stays testable without a page.
pub struct SchedulingPlanner {
    section: SchedulingSection,
    waits: WaitSection,
}

impl SchedulingPlanner {
    pub fn new(section: SchedulingSection, waits: WaitSection) -> Self {
        Self { section, waits }
    }

    /// Targets inside the minimum lead window are bumped forward to
    /// the first slot boundary at or after now + bump margin. Targets
    /// with enough lead pass through untouched, off-boundary or not.
    pub fn plan(&self, spec: Option<&ScheduleSpec>, now: NaiveDateTime) -> SchedulePlan {
        let Some(spec) = spec else {
            return SchedulePlan::Immediate;
        };
        let target = spec.naive();
        let lead = ChronoDuration::minutes(self.section.minimum_lead_minutes);
        if target >= now + lead {
            return SchedulePlan::At {
                effective: target,
                bumped: false,
            };
        }
        let effective = self.bump(now);
        info!(requested = %target, effective = %effective, "schedule target too close, bumped");
        SchedulePlan::At {
            effective,
            bumped: true,
        }
    }

    fn bump(&self, now: NaiveDateTime) -> NaiveDateTime {
        let safe = now + ChronoDuration::minutes(self.section.bump_margin_minutes);
        let truncated = safe
            .with_second(0)
            .and_then(|value| value.with_nanosecond(0))
            .unwrap_or(safe);
        let slot = self.section.slot_minutes.max(1) as i64;
        let ahead = (slot - truncated.minute() as i64 % slot) % slot;
        let mut candidate = truncated + ChronoDuration::minutes(ahead);
        if candidate < safe {
            candidate += ChronoDuration::minutes(slot);
        }
        candidate
    }

    /// Switches the form into scheduling mode and enters the effective
    /// date and time. A missing date input after the toggle is fatal:
    /// dispatching against half-activated scheduling UI risks an
    /// immediate post.
    pub async fn apply(
        &self,
        session: &mut dyn PinSession,
        effective: NaiveDateTime,
        warnings: &mut Vec<String>,
    ) -> PublisherResult<()> {
        self.enable_toggle(session).await?;

        let date_selector = match platform::date_field()
            .wait_visible(session, self.field_timeout(), self.poll_interval())
            .await?
        {
            Some(probe) => probe.selector.clone(),
            None => {
                return Err(PublishError::SchedulingActivation(
                    "date input never appeared after enabling the schedule".to_string(),
                ))
            }
        };

        if !self
            .pick_calendar_day(session, &date_selector, effective.date())
            .await?
        {
            self.type_date(session, &date_selector, effective.date(), warnings)
                .await?;
        }

        self.apply_time(session, effective, warnings).await
    }

    async fn enable_toggle(&self, session: &mut dyn PinSession) -> PublisherResult<()> {
        if let Some(probe) = platform::schedule_toggle()
            .wait_visible(session, self.field_timeout(), self.poll_interval())
            .await?
        {
            if session.click(&probe.selector).await? {
                debug!(probe = probe.name, "schedule toggle clicked");
                self.pace(session).await;
                return Ok(());
            }
        }
        // Structural probes missed; fall back to the control's label.
        let wanted = platform::SCHEDULE_TOGGLE_LABEL.to_ascii_lowercase();
        let actions = session.list_actions(None).await?;
        let toggle = actions
            .iter()
            .find(|action| action.label.to_ascii_lowercase().contains(&wanted));
        match toggle {
            Some(action) => {
                session.click_action(action.token).await?;
                debug!(label = %action.label, "schedule toggle clicked by label");
                self.pace(session).await;
                Ok(())
            }
            None => Err(PublishError::SchedulingActivation(
                "publish-later control not found on the form".to_string(),
            )),
        }
    }

    /// Native calendar first: click the input, wait briefly for a day
    /// cell carrying the target date's label, click it.
    async fn pick_calendar_day(
        &self,
        session: &mut dyn PinSession,
        date_selector: &str,
        date: NaiveDate,
    ) -> PublisherResult<bool> {
        if !session.click(date_selector).await? {
            return Ok(false);
        }
        let day = platform::calendar_day(date);
        let probe = day
            .wait_visible(session, self.popover_timeout(), self.poll_interval())
            .await?;
        match probe {
            Some(probe) => {
                if session.click(&probe.selector).await? {
                    debug!(date = %date, "calendar day clicked");
                    self.pace(session).await;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Ok(false),
        }
    }

    async fn type_date(
        &self,
        session: &mut dyn PinSession,
        date_selector: &str,
        date: NaiveDate,
        warnings: &mut Vec<String>,
    ) -> PublisherResult<()> {
        let type_attr = session.attribute(date_selector, "type").await?;
        let placeholder = session.attribute(date_selector, "placeholder").await?;
        let format = detect_date_format(type_attr.as_deref(), placeholder.as_deref());
        let formatted = format_date(format, date);
        debug!(format = ?format, value = %formatted, "typing schedule date");

        for attempt in 0..2 {
            session.fill(date_selector, "").await?;
            session.type_text(date_selector, &formatted).await?;
            session.press_enter(date_selector).await?;
            self.pace(session).await;

            let echoed = session.input_value(date_selector).await?.unwrap_or_default();
            if echoed.trim() == formatted {
                return Ok(());
            }
            if attempt == 0 {
                debug!(echoed = %echoed, expected = %formatted, "date echo mismatch, retyping");
            } else {
                warn!(echoed = %echoed, expected = %formatted, "date input kept a different value");
                warnings.push(format!(
                    "date input shows \"{}\" instead of \"{formatted}\"",
                    echoed.trim()
                ));
            }
        }
        Ok(())
    }

    async fn apply_time(
        &self,
        session: &mut dyn PinSession,
        effective: NaiveDateTime,
        warnings: &mut Vec<String>,
    ) -> PublisherResult<()> {
        let time_selector = match platform::time_field().first_visible(session).await? {
            Some(probe) => probe.selector.clone(),
            None => {
                warn!("time input not found, keeping the platform's default slot");
                warnings.push("time input not found, platform default slot kept".to_string());
                return Ok(());
            }
        };

        session.click(&time_selector).await?;
        self.pace(session).await;

        let variants = time_variants(effective);
        if self.pick_time_option(session, &variants).await? {
            return Ok(());
        }

        // Dropdown never offered the slot; type it instead.
        let typed = &variants[0];
        session.fill(&time_selector, "").await?;
        if session.type_text(&time_selector, typed).await? {
            session.press_enter(&time_selector).await?;
            self.pace(session).await;
            debug!(value = %typed, "time typed directly");
        } else {
            warnings.push(format!("time \"{typed}\" could not be entered"));
        }
        Ok(())
    }

    async fn pick_time_option(
        &self,
        session: &mut dyn PinSession,
        variants: &[String],
    ) -> PublisherResult<bool> {
        for pass in 0..SCROLL_PASSES {
            for variant in variants {
                let locator = platform::time_option(variant);
                if let Some(probe) = locator.first_visible(session).await? {
                    if session.click(&probe.selector).await? {
                        debug!(variant = %variant, "time option clicked");
                        self.pace(session).await;
                        return Ok(true);
                    }
                }
            }
            if pass == 0 && !session.is_visible(platform::TIME_LISTBOX).await? {
                return Ok(false);
            }
            session
                .scroll_within(platform::TIME_LISTBOX, SCROLL_STEP)
                .await?;
            tokio::time::sleep(self.poll_interval()).await;
        }
        Ok(false)
    }

    async fn pace(&self, session: &mut dyn PinSession) {
        let range = self.waits.settle_range_ms;
        let _ = session.settle((range[0], range[1])).await;
    }

    fn field_timeout(&self) -> Duration {
        Duration::from_secs(self.waits.field_timeout_seconds)
    }

    fn popover_timeout(&self) -> Duration {
        Duration::from_millis(self.waits.chip_timeout_ms)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.waits.poll_interval_ms)
    }
}

/// `type="date"` inputs take ISO regardless of locale. Placeholder
/// tokens decide otherwise; an unreadable placeholder defaults to ISO,
/// which the echo check catches when wrong.
pub fn detect_date_format(type_attr: Option<&str>, placeholder: Option<&str>) -> DateInputFormat {
    if matches!(type_attr, Some(attr) if attr.eq_ignore_ascii_case("date")) {
        return DateInputFormat::Iso;
    }
    let Some(placeholder) = placeholder else {
        return DateInputFormat::Iso;
    };
    let lower = placeholder.to_ascii_lowercase();
    let Ok(pattern) = Regex::new(r"(yyyy|dd|mm)([/.\-])(yyyy|dd|mm)") else {
        return DateInputFormat::Iso;
    };
    let Some(captures) = pattern.captures(&lower) else {
        return DateInputFormat::Iso;
    };
    let separator = captures
        .get(2)
        .and_then(|sep| sep.as_str().chars().next())
        .unwrap_or('/');
    match captures.get(1).map(|token| token.as_str()) {
        Some("dd") => DateInputFormat::DayFirst { separator },
        Some("mm") => DateInputFormat::MonthFirst { separator },
        _ => DateInputFormat::Iso,
    }
}

pub fn format_date(format: DateInputFormat, date: NaiveDate) -> String {
    match format {
        DateInputFormat::Iso => date.format("%Y-%m-%d").to_string(),
        DateInputFormat::MonthFirst { separator } => format!(
            "{:02}{separator}{:02}{separator}{}",
            date.month(),
            date.day(),
            date.year()
        ),
        DateInputFormat::DayFirst { separator } => format!(
            "{:02}{separator}{:02}{separator}{}",
            date.day(),
            date.month(),
            date.year()
        ),
    }
}

/// Labels the dropdown may use for one instant, zero-padded hour
/// first. Hours of ten and up produce a single variant.
pub fn time_variants(effective: NaiveDateTime) -> Vec<String> {
    let (is_pm, hour) = effective.hour12();
    let suffix = if is_pm { "PM" } else { "AM" };
    let padded = format!("{:02}:{:02} {}", hour, effective.minute(), suffix);
    let unpadded = format!("{}:{:02} {}", hour, effective.minute(), suffix);
    let mut variants = vec![padded];
    if unpadded != variants[0] {
        variants.push(unpadded);
    }
    variants
}
