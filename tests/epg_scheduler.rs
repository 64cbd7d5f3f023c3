// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

mod common;

use chrono::{DateTime, Days, Duration, Local, TimeZone, Utc};
use common::FakeCatalog;
use nimbus::catalog::EpgListing;
use nimbus::epg::{EpgScheduler, local_today};
use nimbus::error::NimbusError;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn listing(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> EpgListing {
    EpgListing {
        id: None,
        title: title.to_string(),
        description: None,
        start_timestamp: Some(start.timestamp()),
        stop_timestamp: Some(end.timestamp()),
    }
}

/// Local noon, so an hour either side stays on the same day in any zone.
fn noon() -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(2025, 3, 12, 12, 0, 0)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

fn evening(now: DateTime<Utc>) -> Vec<EpgListing> {
    vec![
        listing("Late", now + Duration::hours(1), now + Duration::hours(2)),
        listing("Over", now - Duration::hours(2), now - Duration::hours(1)),
        listing("Now", now - Duration::minutes(30), now + Duration::minutes(30)),
    ]
}

#[tokio::test]
async fn test_today_marks_live_program() {
    let now = noon();
    let today = local_today(now);
    let catalog = Arc::new(FakeCatalog::default());
    catalog.set_epg("42", today, evening(now));
    let mut epg = EpgScheduler::new(catalog);

    let programs = epg.load("42", today, now).await;

    let titles: Vec<_> = programs.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["Now", "Late"]);
    assert!(programs[0].is_live);
    let progress = programs[0].progress.unwrap();
    assert!((0.0..=100.0).contains(&progress));
    assert!(!programs[1].is_live);
    assert_eq!(programs[1].progress, None);

    assert_eq!(epg.current_program().unwrap().title, "Now");
    assert!(!epg.is_loading());
}

#[tokio::test]
async fn test_other_day_has_no_live_program() {
    let now = noon();
    let tomorrow = local_today(now).checked_add_days(Days::new(1)).unwrap();
    let catalog = Arc::new(FakeCatalog::default());
    catalog.set_epg("42", tomorrow, evening(now));
    let mut epg = EpgScheduler::new(catalog);

    let programs = epg.load("42", tomorrow, now).await;

    assert_eq!(programs.len(), 3);
    assert_eq!(programs[0].title, "Over");
    assert!(programs.iter().all(|p| !p.is_live && p.progress.is_none()));
    assert!(epg.current_program().is_none());
}

#[tokio::test]
async fn test_stale_result_dropped() {
    let now = noon();
    let today = local_today(now);
    let catalog = Arc::new(FakeCatalog::default());
    catalog.set_epg("1", today, evening(now));
    let mut epg = EpgScheduler::new(Arc::clone(&catalog));

    let first = epg.begin("1", today);
    let second = epg.begin("2", today);

    let stale = EpgScheduler::fetch(Arc::clone(&catalog), &first, now).await;
    assert!(!epg.apply(&first, stale, now));
    assert!(epg.programs().is_empty());
    assert!(epg.is_loading());

    let fresh = EpgScheduler::fetch(catalog, &second, now).await;
    assert!(epg.apply(&second, fresh, now));
    assert!(epg.programs().is_empty());
    assert!(!epg.is_loading());
    assert_eq!(epg.request(), Some(&second));
}

#[tokio::test]
async fn test_fetch_error_clears_list() {
    let now = noon();
    let today = local_today(now);
    let catalog = Arc::new(FakeCatalog::default());
    catalog.set_epg("42", today, evening(now));
    let mut epg = EpgScheduler::new(Arc::clone(&catalog));
    assert_eq!(epg.load("42", today, now).await.len(), 2);
    assert_eq!(epg.last_error(), None);

    catalog.fail.store(true, Ordering::SeqCst);
    let programs = epg.load("42", today, now).await;

    assert!(programs.is_empty());
    assert!(!epg.is_loading());
    assert!(matches!(epg.last_error(), Some(NimbusError::Network(_))));
    assert_eq!(catalog.epg_calls.load(Ordering::SeqCst), 2);

    // A pending retry hides the old failure
    epg.begin("42", today);
    assert_eq!(epg.last_error(), None);

    catalog.fail.store(false, Ordering::SeqCst);
    assert_eq!(epg.load("42", today, now).await.len(), 2);
    assert_eq!(epg.last_error(), None);
}

#[tokio::test]
async fn test_stale_error_not_kept() {
    let now = noon();
    let today = local_today(now);
    let catalog = Arc::new(FakeCatalog::default());
    let mut epg = EpgScheduler::new(catalog);

    let first = epg.begin("1", today);
    let second = epg.begin("2", today);

    let failed = Err(NimbusError::Network("connection refused".to_string()));
    assert!(!epg.apply(&first, failed, now));
    assert_eq!(epg.last_error(), None);
    assert!(epg.apply(&second, Ok(Vec::new()), now));
    assert_eq!(epg.last_error(), None);
}

#[tokio::test]
async fn test_tick_advances_live_program() {
    let now = noon();
    let today = local_today(now);
    let catalog = Arc::new(FakeCatalog::default());
    catalog.set_epg("42", today, evening(now));
    let mut epg = EpgScheduler::new(catalog);
    epg.load("42", today, now).await;
    assert_eq!(epg.current_program().unwrap().title, "Now");

    epg.tick(now + Duration::minutes(45));

    let titles: Vec<_> = epg.programs().iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["Late"]);
    assert!(epg.current_program().is_none());

    epg.tick(now + Duration::minutes(90));
    assert_eq!(epg.current_program().unwrap().title, "Late");
}

#[tokio::test]
async fn test_reset() {
    let now = noon();
    let today = local_today(now);
    let catalog = Arc::new(FakeCatalog::default());
    catalog.set_epg("42", today, evening(now));
    let mut epg = EpgScheduler::new(catalog);
    epg.load("42", today, now).await;

    let pending = epg.begin("42", today);
    epg.reset();

    assert!(epg.programs().is_empty());
    assert!(epg.request().is_none());
    assert!(!epg.apply(&pending, Ok(Vec::new()), now));
}
