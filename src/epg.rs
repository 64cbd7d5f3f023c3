// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Program guide for the selected channel.

use crate::catalog::{Catalog, EpgListing};
use crate::error::{NimbusError, NimbusResult};
use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub is_live: bool,
    /// Percent elapsed, only while live
    pub progress: Option<f64>,
}

impl Program {
    fn refresh(&mut self, now: DateTime<Utc>, is_today: bool) {
        self.is_live = is_today && self.start_time <= now && now < self.end_time;
        self.progress = if self.is_live {
            let total = (self.end_time - self.start_time).num_milliseconds() as f64;
            let elapsed = (now - self.start_time).num_milliseconds() as f64;
            Some((elapsed / total * 100.0).clamp(0.0, 100.0))
        } else {
            None
        };
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }

    /// `HH:MM - HH:MM` in local time.
    pub fn time_range(&self) -> String {
        format!(
            "{} - {}",
            self.start_time.with_timezone(&Local).format("%H:%M"),
            self.end_time.with_timezone(&Local).format("%H:%M")
        )
    }
}

pub fn local_today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

/// Maps raw listings into programs, dropping entries with unusable timestamps.
///
/// Live flags are only computed when `is_today`; ended programs are removed in
/// that case as well.
pub fn map_listings(
    channel_id: &str,
    listings: Vec<EpgListing>,
    is_today: bool,
    now: DateTime<Utc>,
) -> Vec<Program> {
    let mut programs: Vec<Program> = listings
        .into_iter()
        .filter_map(|item| {
            let start_time = Utc.timestamp_opt(item.start_timestamp?, 0).single()?;
            let end_time = Utc.timestamp_opt(item.stop_timestamp?, 0).single()?;

            let mut program = Program {
                id: item
                    .id
                    .unwrap_or_else(|| format!("{}-{}", channel_id, start_time.timestamp_millis())),
                title: item.title,
                description: item.description.unwrap_or_default(),
                start_time,
                end_time,
                duration_minutes: ((end_time - start_time).num_seconds() as f64 / 60.0).round()
                    as i64,
                is_live: false,
                progress: None,
            };
            program.refresh(now, is_today);
            Some(program)
        })
        .collect();

    programs.sort_by_key(|p| p.start_time);
    if is_today {
        programs.retain(|p| !p.has_ended(now));
    }
    programs
}

/// One entry of the day selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOption {
    pub offset: u32,
    pub date: NaiveDate,
    pub label: String,
}

pub fn day_options(today: NaiveDate, days: u32) -> Vec<DayOption> {
    (0..days.max(1))
        .filter_map(|offset| {
            let date = today.checked_add_days(Days::new(offset as u64))?;
            let label = match offset {
                0 => "Today".to_string(),
                1 => "Tomorrow".to_string(),
                _ => date.format("%d/%m").to_string(),
            };
            Some(DayOption {
                offset,
                date,
                label,
            })
        })
        .collect()
}

/// Identifies one EPG fetch; results for superseded requests are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpgRequest {
    pub generation: u64,
    pub channel_id: String,
    pub date: NaiveDate,
}

/// Holds the program list of the selected channel and day.
pub struct EpgScheduler<C> {
    catalog: Arc<C>,
    generation: u64,
    current: Option<EpgRequest>,
    is_today: bool,
    programs: Vec<Program>,
    loading: bool,
    last_error: Option<NimbusError>,
}

impl<C: Catalog> EpgScheduler<C> {
    pub fn new(catalog: Arc<C>) -> Self {
        Self {
            catalog,
            generation: 0,
            current: None,
            is_today: false,
            programs: Vec::new(),
            loading: false,
            last_error: None,
        }
    }

    pub fn catalog(&self) -> Arc<C> {
        Arc::clone(&self.catalog)
    }

    /// Starts a new request, clearing the current list.
    pub fn begin(&mut self, channel_id: &str, date: NaiveDate) -> EpgRequest {
        self.generation += 1;
        let request = EpgRequest {
            generation: self.generation,
            channel_id: channel_id.to_string(),
            date,
        };
        self.current = Some(request.clone());
        self.programs.clear();
        self.loading = true;
        self.last_error = None;
        request
    }

    /// Fetches and maps the listings for `request`.
    pub async fn fetch(
        catalog: Arc<C>,
        request: &EpgRequest,
        now: DateTime<Utc>,
    ) -> NimbusResult<Vec<Program>> {
        let listings = catalog.epg(&request.channel_id, request.date).await?;
        let is_today = request.date == local_today(now);
        Ok(map_listings(&request.channel_id, listings, is_today, now))
    }

    /// Installs a fetch result. Returns `false` when the request was superseded.
    ///
    /// A failed fetch leaves the list empty and is kept in `last_error`.
    pub fn apply(
        &mut self,
        request: &EpgRequest,
        result: NimbusResult<Vec<Program>>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.current.as_ref() != Some(request) {
            debug!(
                "Dropping stale EPG result for {} ({})",
                request.channel_id, request.date
            );
            return false;
        }

        self.loading = false;
        self.is_today = request.date == local_today(now);
        match result {
            Ok(programs) => {
                self.programs = programs;
                self.last_error = None;
            }
            Err(e) => {
                warn!("Failed to load EPG for {}: {}", request.channel_id, e);
                self.programs = Vec::new();
                self.last_error = Some(e);
            }
        }
        true
    }

    /// Fetches `date` for `channel_id` and installs the result.
    pub async fn load(
        &mut self,
        channel_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> &[Program] {
        let request = self.begin(channel_id, date);
        let result = Self::fetch(self.catalog(), &request, now).await;
        self.apply(&request, result, now);
        &self.programs
    }

    /// Recomputes live flags against `now` without fetching.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let is_today = self
            .current
            .as_ref()
            .map(|r| r.date == local_today(now))
            .unwrap_or(false);
        self.is_today = is_today;
        for program in &mut self.programs {
            program.refresh(now, is_today);
        }
        if is_today {
            self.programs.retain(|p| !p.has_ended(now));
        }
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.current = None;
        self.programs.clear();
        self.loading = false;
        self.last_error = None;
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn current_program(&self) -> Option<&Program> {
        self.programs.iter().find(|p| p.is_live)
    }

    /// Why the current list is empty, if its fetch failed.
    pub fn last_error(&self) -> Option<&NimbusError> {
        self.last_error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn request(&self) -> Option<&EpgRequest> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn listing(id: &str, start: i64, stop: i64) -> EpgListing {
        EpgListing {
            id: Some(id.to_string()),
            title: format!("Show {}", id),
            description: None,
            start_timestamp: Some(start),
            stop_timestamp: Some(stop),
        }
    }

    #[test]
    fn test_live_program_today() {
        let now = Utc.timestamp_opt(1_700_001_800, 0).unwrap();
        let programs = map_listings(
            "42",
            vec![listing("a", 1_700_000_000, 1_700_003_600)],
            true,
            now,
        );
        assert_eq!(programs.len(), 1);
        let program = &programs[0];
        assert!(program.is_live);
        let progress = program.progress.unwrap();
        assert!((0.0..=100.0).contains(&progress));
        assert!((progress - 50.0).abs() < 1e-9);
        assert_eq!(program.duration_minutes, 60);
    }

    #[test]
    fn test_same_program_other_day_is_not_live() {
        let now = Utc.timestamp_opt(1_700_001_800, 0).unwrap();
        let programs = map_listings(
            "42",
            vec![listing("a", 1_700_000_000, 1_700_003_600)],
            false,
            now,
        );
        assert!(!programs[0].is_live);
        assert_eq!(programs[0].progress, None);
    }

    #[test]
    fn test_ended_programs_filtered_only_today() {
        let now = Utc.timestamp_opt(1_700_010_000, 0).unwrap();
        let listings = vec![
            listing("old", 1_700_000_000, 1_700_003_600),
            listing("next", 1_700_010_000, 1_700_013_600),
        ];
        assert_eq!(map_listings("1", listings.clone(), true, now).len(), 1);
        assert_eq!(map_listings("1", listings, false, now).len(), 2);
    }

    #[test]
    fn test_unparsable_entries_dropped_and_ids_filled() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let listings = vec![
            EpgListing {
                id: None,
                title: "No id".into(),
                start_timestamp: Some(1_700_100_000),
                stop_timestamp: Some(1_700_101_800),
                ..EpgListing::default()
            },
            EpgListing {
                title: "Broken".into(),
                start_timestamp: None,
                stop_timestamp: Some(1_700_101_800),
                ..EpgListing::default()
            },
        ];
        let programs = map_listings("7", listings, false, now);
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].id, "7-1700100000000");
        assert_eq!(programs[0].duration_minutes, 30);
    }

    #[test]
    fn test_day_options_labels() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 30).unwrap();
        let days = day_options(today, 7);
        let labels: Vec<&str> = days.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Today", "Tomorrow", "01/01", "02/01", "03/01", "04/01", "05/01"]
        );
        assert_eq!(days[6].date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }

    #[test]
    fn test_progress_moves_with_clock() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut program = Program {
            id: "p".into(),
            title: "t".into(),
            description: String::new(),
            start_time: start,
            end_time: start + Duration::minutes(100),
            duration_minutes: 100,
            is_live: false,
            progress: None,
        };
        program.refresh(start + Duration::minutes(25), true);
        assert_eq!(program.progress, Some(25.0));
        program.refresh(start + Duration::minutes(100), true);
        assert!(!program.is_live);
        assert_eq!(program.progress, None);
    }
}
