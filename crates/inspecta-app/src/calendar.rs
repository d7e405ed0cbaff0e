// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Month/week/day cursor over one month of an inspector's schedule.
//!
//! The view never fetches anything itself. Navigation that leaves the loaded
//! month returns [`CalendarEvent::ReloadRequested`]; the shell performs the
//! fetch and hands the result back through [`ScheduleView::finish_load`].

use std::ops::{Range, RangeInclusive};

use time::{Date, Month};

use crate::ids::UserId;
use crate::model::{CalendarDay, ScheduleMonth, ScheduleStats, ViewMode};

pub const WEEK_HOURS: RangeInclusive<u8> = 6..=17;
pub const DAY_HOURS: RangeInclusive<u8> = 6..=19;

const WEEK_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScheduleTarget {
    Own,
    Inspector(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleQuery {
    pub target: ScheduleTarget,
    pub month: Month,
    pub year: i32,
}

/// Cursor placement to apply once the next month has loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavIntent {
    WeekFirst,
    WeekLast,
    DayFirst,
    DayLast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCommand {
    PrevMonth,
    NextMonth,
    PrevWeek,
    NextWeek,
    PrevDay,
    NextDay,
    Prev,
    Next,
    Today { today: Date },
    SetViewMode(ViewMode),
    SetTarget(ScheduleTarget),
    ClickDay(usize),
    ClickHour { day: usize, hour: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarEvent {
    ReloadRequested(ScheduleQuery),
    DateSelected { date: Date, time: Option<String> },
    ViewModeChanged(ViewMode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleView {
    target: ScheduleTarget,
    month: Month,
    year: i32,
    days: Vec<CalendarDay>,
    stats: ScheduleStats,
    selected: Option<usize>,
    week_start: usize,
    day_index: usize,
    view_mode: ViewMode,
    pending: Option<NavIntent>,
    status: LoadStatus,
    initial_date: Option<Date>,
    initial_time: Option<String>,
}

impl ScheduleView {
    pub fn new(target: ScheduleTarget, today: Date, view_mode: ViewMode) -> Self {
        Self {
            target,
            month: today.month(),
            year: today.year(),
            days: Vec::new(),
            stats: ScheduleStats::default(),
            selected: None,
            week_start: 0,
            day_index: 0,
            view_mode,
            pending: None,
            status: LoadStatus::Idle,
            initial_date: None,
            initial_time: None,
        }
    }

    /// Opens the calendar on the month of an existing appointment and
    /// highlights its slot once that month has loaded.
    pub fn with_initial(mut self, date: Date, time: Option<String>) -> Self {
        self.month = date.month();
        self.year = date.year();
        self.initial_date = Some(date);
        self.initial_time = time.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn query(&self) -> ScheduleQuery {
        ScheduleQuery {
            target: self.target.clone(),
            month: self.month,
            year: self.year,
        }
    }

    /// Marks the current window as in flight and returns its query.
    pub fn begin_load(&mut self) -> ScheduleQuery {
        self.status = LoadStatus::Loading;
        self.query()
    }

    pub fn target(&self) -> &ScheduleTarget {
        &self.target
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn days(&self) -> &[CalendarDay] {
        &self.days
    }

    pub fn stats(&self) -> ScheduleStats {
        self.stats
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn pending(&self) -> Option<NavIntent> {
        self.pending
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_day(&self) -> Option<&CalendarDay> {
        self.selected.and_then(|index| self.days.get(index))
    }

    pub fn week_start(&self) -> usize {
        self.week_start
    }

    pub fn day_index(&self) -> usize {
        self.day_index
    }

    pub fn initial_date(&self) -> Option<Date> {
        self.initial_date
    }

    pub fn is_initial_slot(&self, day: &CalendarDay, hour: u8) -> bool {
        self.initial_date == Some(day.date)
            && self
                .initial_time
                .as_deref()
                .is_some_and(|time| time.starts_with(&format!("{hour:02}")))
    }

    pub fn dispatch(&mut self, command: CalendarCommand) -> Vec<CalendarEvent> {
        match command {
            CalendarCommand::PrevMonth => self.shift_month(-1, None),
            CalendarCommand::NextMonth => self.shift_month(1, None),
            CalendarCommand::PrevWeek => self.prev_week(),
            CalendarCommand::NextWeek => self.next_week(),
            CalendarCommand::PrevDay => self.prev_day(),
            CalendarCommand::NextDay => self.next_day(),
            CalendarCommand::Prev => match self.view_mode {
                ViewMode::Month => self.shift_month(-1, None),
                ViewMode::Week => self.prev_week(),
                ViewMode::Day => self.prev_day(),
            },
            CalendarCommand::Next => match self.view_mode {
                ViewMode::Month => self.shift_month(1, None),
                ViewMode::Week => self.next_week(),
                ViewMode::Day => self.next_day(),
            },
            CalendarCommand::Today { today } => {
                self.month = today.month();
                self.year = today.year();
                self.pending = None;
                self.reset_window();
                vec![CalendarEvent::ReloadRequested(self.begin_load())]
            }
            CalendarCommand::SetViewMode(mode) => {
                if self.view_mode == mode {
                    return Vec::new();
                }
                self.view_mode = mode;
                vec![CalendarEvent::ViewModeChanged(mode)]
            }
            CalendarCommand::SetTarget(target) => {
                if self.target == target {
                    return Vec::new();
                }
                self.target = target;
                self.pending = None;
                self.reset_window();
                vec![CalendarEvent::ReloadRequested(self.begin_load())]
            }
            CalendarCommand::ClickDay(index) => self.click_day(index),
            CalendarCommand::ClickHour { day, hour } => self.click_hour(day, hour),
        }
    }

    /// Applies a fetched month. Results for a window other than the current
    /// one are dropped and `false` is returned.
    pub fn finish_load(
        &mut self,
        query: &ScheduleQuery,
        result: Result<ScheduleMonth, String>,
    ) -> bool {
        if *query != self.query() {
            tracing::debug!(?query, current = ?self.query(), "dropping stale schedule load");
            return false;
        }
        match result {
            Ok(month) => {
                self.days = month.calendar;
                self.stats = month.stats;
                self.status = LoadStatus::Loaded;
                if let Some(intent) = self.pending.take() {
                    self.apply_intent(intent);
                } else if self.selected.is_none() {
                    self.auto_select();
                }
            }
            Err(message) => {
                self.days.clear();
                self.stats = ScheduleStats::default();
                self.selected = None;
                self.pending = None;
                self.status = LoadStatus::Failed(message);
            }
        }
        self.week_start = self.week_start.min(self.max_week_start());
        self.day_index = self.day_index.min(self.days.len().saturating_sub(1));
        true
    }

    pub fn max_week_start(&self) -> usize {
        self.days.len().saturating_sub(WEEK_LEN)
    }

    pub fn week_range(&self) -> Range<usize> {
        let start = self.week_start.min(self.days.len());
        start..(start + WEEK_LEN).min(self.days.len())
    }

    pub fn week_days(&self) -> &[CalendarDay] {
        &self.days[self.week_range()]
    }

    /// Sunday-first grid cells: `None` for the blanks before the 1st, then one
    /// index per loaded day.
    pub fn month_grid(&self) -> Vec<Option<usize>> {
        let offset = Date::from_calendar_date(self.year, self.month, 1)
            .map(|first| usize::from(first.weekday().number_days_from_sunday()))
            .unwrap_or(0);
        std::iter::repeat_n(None, offset)
            .chain((0..self.days.len()).map(Some))
            .collect()
    }

    pub fn day_cursor(&self) -> Option<&CalendarDay> {
        self.days.get(self.day_index)
    }

    pub fn nav_title(&self) -> String {
        let month_title = format!("{} {}", self.month, self.year);
        match self.view_mode {
            ViewMode::Month => month_title,
            ViewMode::Week => {
                let week = self.week_days();
                match (week.first(), week.last()) {
                    (Some(first), Some(last)) => {
                        format!("{} - {} {}", first.day, last.day, self.month)
                    }
                    _ => String::new(),
                }
            }
            ViewMode::Day => match self.day_cursor() {
                Some(day) => format!("{} {} {}", day.date.weekday(), day.day, self.month),
                None => month_title,
            },
        }
    }

    fn shift_month(&mut self, delta: i8, intent: Option<NavIntent>) -> Vec<CalendarEvent> {
        let (month, year) = shifted(self.month, self.year, delta);
        self.month = month;
        self.year = year;
        self.pending = intent;
        self.reset_window();
        vec![CalendarEvent::ReloadRequested(self.begin_load())]
    }

    fn reset_window(&mut self) {
        self.days.clear();
        self.stats = ScheduleStats::default();
        self.selected = None;
        self.week_start = 0;
        self.day_index = 0;
    }

    fn prev_week(&mut self) -> Vec<CalendarEvent> {
        if self.week_start == 0 {
            return self.shift_month(-1, Some(NavIntent::WeekLast));
        }
        self.week_start = self.week_start.saturating_sub(WEEK_LEN);
        Vec::new()
    }

    fn next_week(&mut self) -> Vec<CalendarEvent> {
        let max_start = self.max_week_start();
        if self.week_start >= max_start {
            return self.shift_month(1, Some(NavIntent::WeekFirst));
        }
        self.week_start = (self.week_start + WEEK_LEN).min(max_start);
        Vec::new()
    }

    fn prev_day(&mut self) -> Vec<CalendarEvent> {
        if self.day_index == 0 {
            return self.shift_month(-1, Some(NavIntent::DayLast));
        }
        self.day_index -= 1;
        self.selected = Some(self.day_index);
        Vec::new()
    }

    fn next_day(&mut self) -> Vec<CalendarEvent> {
        if self.day_index + 1 >= self.days.len() {
            return self.shift_month(1, Some(NavIntent::DayFirst));
        }
        self.day_index += 1;
        self.selected = Some(self.day_index);
        Vec::new()
    }

    fn apply_intent(&mut self, intent: NavIntent) {
        let last = self.days.len().checked_sub(1);
        match intent {
            NavIntent::WeekFirst => self.week_start = 0,
            NavIntent::WeekLast => self.week_start = self.max_week_start(),
            NavIntent::DayFirst => {
                self.day_index = 0;
                self.selected = last.map(|_| 0);
            }
            NavIntent::DayLast => {
                self.day_index = last.unwrap_or(0);
                self.selected = last;
            }
        }
    }

    fn auto_select(&mut self) {
        let initial = self
            .initial_date
            .and_then(|date| self.days.iter().position(|day| day.date == date));
        let today = || self.days.iter().position(|day| day.is_today);
        if let Some(index) = initial.or_else(today) {
            self.focus(index);
        }
    }

    fn focus(&mut self, index: usize) {
        self.selected = Some(index);
        self.day_index = index;
        let weekday = usize::from(self.days[index].date.weekday().number_days_from_sunday());
        self.week_start = index.saturating_sub(weekday).min(self.max_week_start());
    }

    fn click_day(&mut self, index: usize) -> Vec<CalendarEvent> {
        let Some(day) = self.days.get(index) else {
            return Vec::new();
        };
        let (date, is_past) = (day.date, day.is_past);
        self.focus(index);
        if is_past {
            return Vec::new();
        }
        vec![CalendarEvent::DateSelected { date, time: None }]
    }

    fn click_hour(&mut self, index: usize, hour: u8) -> Vec<CalendarEvent> {
        let Some(day) = self.days.get(index) else {
            return Vec::new();
        };
        if day.is_past {
            return Vec::new();
        }
        let date = day.date;
        let occupied = day.slot_at(hour).is_some();
        self.selected = Some(index);
        if occupied {
            return Vec::new();
        }
        vec![CalendarEvent::DateSelected {
            date,
            time: Some(format!("{hour:02}:00")),
        }]
    }
}

/// Month arithmetic with year rollover in both directions.
pub fn shifted(month: Month, year: i32, delta: i8) -> (Month, i32) {
    let zero_based = i32::from(u8::from(month)) - 1 + i32::from(delta);
    let year = year + zero_based.div_euclid(12);
    let index = zero_based.rem_euclid(12) as u8 + 1;
    let month = Month::try_from(index).unwrap_or(Month::January);
    (month, year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppointmentSlot, AppointmentStatus};
    use crate::ids::SlotId;
    use time::macros::date;

    fn month_of(year: i32, month: Month, today: Option<u8>) -> ScheduleMonth {
        let mut calendar = Vec::new();
        let mut day = Date::from_calendar_date(year, month, 1).expect("first of month");
        while day.month() == month {
            let is_today = today == Some(day.day());
            let is_past = today.is_some_and(|value| day.day() < value);
            calendar.push(CalendarDay {
                date: day,
                day: day.day(),
                is_today,
                is_past,
                is_busy: false,
                appointments_count: 0,
                appointments: Vec::new(),
            });
            match day.next_day() {
                Some(next) => day = next,
                None => break,
            }
        }
        ScheduleMonth {
            calendar,
            stats: ScheduleStats::default(),
        }
    }

    fn loaded(today: Date) -> ScheduleView {
        let mut view = ScheduleView::new(ScheduleTarget::Own, today, ViewMode::Month);
        let query = view.begin_load();
        assert!(view.finish_load(
            &query,
            Ok(month_of(today.year(), today.month(), Some(today.day())))
        ));
        view
    }

    fn reload(view: &mut ScheduleView, events: &[CalendarEvent]) {
        let Some(CalendarEvent::ReloadRequested(query)) = events.first() else {
            panic!("expected reload, got {events:?}");
        };
        let month = month_of(query.year, query.month, None);
        assert!(view.finish_load(query, Ok(month)));
    }

    #[test]
    fn month_navigation_round_trips_across_year_boundary() {
        assert_eq!(shifted(Month::December, 2024, 1), (Month::January, 2025));
        assert_eq!(shifted(Month::January, 2025, -1), (Month::December, 2024));

        let mut view = loaded(date!(2024 - 12 - 20));
        let events = view.dispatch(CalendarCommand::NextMonth);
        assert_eq!((view.month(), view.year()), (Month::January, 2025));
        assert!(view.selected().is_none());
        reload(&mut view, &events);

        let events = view.dispatch(CalendarCommand::PrevMonth);
        assert_eq!((view.month(), view.year()), (Month::December, 2024));
        assert!(matches!(events[0], CalendarEvent::ReloadRequested(_)));
    }

    #[test]
    fn load_auto_selects_today_and_its_week() {
        let view = loaded(date!(2025 - 03 - 19));
        assert_eq!(view.selected(), Some(18));
        assert_eq!(view.day_index(), 18);
        // March 19 2025 is a Wednesday, so the week starts on the 16th.
        assert_eq!(view.week_start(), 15);
        assert_eq!(view.status(), &LoadStatus::Loaded);
    }

    #[test]
    fn week_start_stays_in_bounds_through_navigation() {
        let mut view = loaded(date!(2025 - 02 - 10));
        view.dispatch(CalendarCommand::SetViewMode(ViewMode::Week));
        for _ in 0..12 {
            let events = view.dispatch(CalendarCommand::Next);
            if !events.is_empty() {
                reload(&mut view, &events);
            }
            assert!(view.week_start() <= view.max_week_start());
        }
        for _ in 0..12 {
            let events = view.dispatch(CalendarCommand::Prev);
            if !events.is_empty() {
                reload(&mut view, &events);
            }
            assert!(view.week_start() <= view.max_week_start());
        }
    }

    #[test]
    fn week_past_end_loads_next_month_on_first_week() {
        let mut view = loaded(date!(2025 - 03 - 30));
        view.dispatch(CalendarCommand::SetViewMode(ViewMode::Week));
        assert_eq!(view.week_start(), view.max_week_start());

        let events = view.dispatch(CalendarCommand::NextWeek);
        assert_eq!(view.pending(), Some(NavIntent::WeekFirst));
        reload(&mut view, &events);
        assert_eq!(view.month(), Month::April);
        assert_eq!(view.week_start(), 0);
        assert!(view.pending().is_none());

        let events = view.dispatch(CalendarCommand::PrevWeek);
        reload(&mut view, &events);
        assert_eq!(view.month(), Month::March);
        assert_eq!(view.week_start(), 31 - 7);
    }

    #[test]
    fn day_navigation_crosses_months_through_intents() {
        let mut view = loaded(date!(2025 - 04 - 01));
        view.dispatch(CalendarCommand::SetViewMode(ViewMode::Day));
        let events = view.dispatch(CalendarCommand::Prev);
        reload(&mut view, &events);
        assert_eq!(view.month(), Month::March);
        assert_eq!(view.day_index(), 30);
        assert_eq!(view.selected_day().map(|day| day.day), Some(31));
        assert_eq!(view.nav_title(), "Monday 31 March");

        let events = view.dispatch(CalendarCommand::Next);
        reload(&mut view, &events);
        assert_eq!(view.month(), Month::April);
        assert_eq!(view.selected(), Some(0));
    }

    #[test]
    fn day_title_follows_the_rendered_day_without_a_selection() {
        let mut view = loaded(date!(2025 - 03 - 10));
        view.dispatch(CalendarCommand::SetViewMode(ViewMode::Day));
        let events = view.dispatch(CalendarCommand::NextMonth);
        reload(&mut view, &events);

        assert_eq!(view.month(), Month::April);
        assert!(view.selected_day().is_none());
        assert_eq!(view.day_cursor().map(|day| day.day), Some(1));
        assert_eq!(view.nav_title(), "Tuesday 1 April");
    }

    #[test]
    fn stale_loads_are_discarded() {
        let mut view = loaded(date!(2025 - 03 - 10));
        let stale = view.query();
        view.dispatch(CalendarCommand::NextMonth);
        assert!(!view.finish_load(&stale, Ok(month_of(2025, Month::March, None))));
        assert!(view.days().is_empty());
        assert_eq!(view.status(), &LoadStatus::Loading);
    }

    #[test]
    fn failed_load_drops_days_and_keeps_message() {
        let mut view = loaded(date!(2025 - 03 - 10));
        let events = view.dispatch(CalendarCommand::NextMonth);
        let CalendarEvent::ReloadRequested(query) = &events[0] else {
            panic!("expected reload");
        };
        assert!(view.finish_load(query, Err("backend unavailable".to_owned())));
        assert!(view.days().is_empty());
        assert_eq!(
            view.status(),
            &LoadStatus::Failed("backend unavailable".to_owned())
        );
    }

    #[test]
    fn past_days_never_notify() {
        let mut view = loaded(date!(2025 - 03 - 15));
        assert!(view.dispatch(CalendarCommand::ClickDay(3)).is_empty());
        assert_eq!(view.selected(), Some(3));
        assert!(
            view.dispatch(CalendarCommand::ClickHour { day: 3, hour: 9 })
                .is_empty()
        );
        assert_eq!(
            view.dispatch(CalendarCommand::ClickDay(20)),
            vec![CalendarEvent::DateSelected {
                date: date!(2025 - 03 - 21),
                time: None
            }]
        );
    }

    #[test]
    fn occupied_hours_do_not_notify() {
        let mut month = month_of(2025, Month::March, Some(1));
        month.calendar[14].appointments.push(AppointmentSlot {
            id: SlotId::new("1"),
            time: "10:30".to_owned(),
            client_name: "Ana".to_owned(),
            address: "Calle 1".to_owned(),
            status: AppointmentStatus::Confirmed,
            status_display: String::new(),
        });
        let mut view = ScheduleView::new(ScheduleTarget::Own, date!(2025 - 03 - 01), ViewMode::Week);
        let query = view.begin_load();
        view.finish_load(&query, Ok(month));

        assert!(
            view.dispatch(CalendarCommand::ClickHour { day: 14, hour: 10 })
                .is_empty()
        );
        assert_eq!(
            view.dispatch(CalendarCommand::ClickHour { day: 14, hour: 9 }),
            vec![CalendarEvent::DateSelected {
                date: date!(2025 - 03 - 15),
                time: Some("09:00".to_owned())
            }]
        );
    }

    #[test]
    fn month_grid_pads_to_first_weekday() {
        let view = loaded(date!(2025 - 03 - 10));
        let grid = view.month_grid();
        // March 1 2025 is a Saturday.
        assert_eq!(grid.iter().take_while(|cell| cell.is_none()).count(), 6);
        assert_eq!(grid.len(), 6 + 31);
        assert_eq!(view.nav_title(), "March 2025");
    }

    #[test]
    fn initial_date_wins_over_today() {
        let mut view = ScheduleView::new(ScheduleTarget::Own, date!(2025 - 02 - 02), ViewMode::Week)
            .with_initial(date!(2025 - 03 - 20), Some("14:00".to_owned()));
        let query = view.begin_load();
        assert_eq!(query.month, Month::March);
        view.finish_load(&query, Ok(month_of(2025, Month::March, Some(5))));
        assert_eq!(view.selected(), Some(19));
        let day = &view.days()[19];
        assert!(view.is_initial_slot(day, 14));
        assert!(!view.is_initial_slot(day, 15));
    }
}
