mod common;

use chrono::NaiveDate;
use common::{at, insert_event, now, save};
use eventdesk_core::config::CoreConfig;
use eventdesk_core::db::open_db_in_memory;
use eventdesk_core::dedupe::squash::{squash, MergePolicy};
use eventdesk_core::model::event::Event;
use eventdesk_core::model::venue::Venue;
use eventdesk_core::repo::venue_repo::{SqliteVenueRepository, VenueRepository};
use eventdesk_core::search::date_range::{BoundProblem, DateBound, DateFilter};
use eventdesk_core::search::grouped::{SearchOrder, SearchWarning};
use eventdesk_core::service::event_service::{EventService, ShowOutcome};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn future_keeps_events_still_running_today() {
    let mut conn = open_db_in_memory().unwrap();
    insert_event(&conn, "Last week", at(2026, 10, 9, 19, 0));
    // Ended earlier today; listed until midnight.
    let mut this_morning = Event::new("Breakfast talk", at(2026, 10, 16, 8, 0));
    this_morning.end_time = Some(at(2026, 10, 16, 9, 0));
    save(&conn, &this_morning);
    let mut running = Event::new("Month-long exhibit", at(2026, 10, 1, 10, 0));
    running.end_time = Some(at(2026, 10, 31, 18, 0));
    save(&conn, &running);
    insert_event(&conn, "Next week", at(2026, 10, 23, 19, 0));

    let config = CoreConfig::default();
    let service = EventService::new(&mut conn, &config);
    let titles: Vec<_> = service
        .future(None, now())
        .unwrap()
        .events
        .into_iter()
        .map(|e| e.title)
        .collect();

    assert_eq!(
        titles,
        vec!["Month-long exhibit", "Breakfast talk", "Next week"]
    );
}

#[test]
fn future_hides_duplicates() {
    let mut conn = open_db_in_memory().unwrap();
    let a = insert_event(&conn, "Jazz", at(2026, 10, 20, 19, 0));
    let b = insert_event(&conn, "Jazz", at(2026, 10, 20, 19, 0));
    squash(&mut conn, &[a.uuid, b.uuid], a.uuid, MergePolicy::KeepCanonical).unwrap();

    let config = CoreConfig::default();
    let events = EventService::new(&mut conn, &config)
        .future(None, now())
        .unwrap()
        .events;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].uuid, a.uuid);
}

#[test]
fn within_dates_without_filter_uses_default_window() {
    let mut conn = open_db_in_memory().unwrap();
    insert_event(&conn, "Yesterday", at(2026, 10, 15, 19, 0));
    insert_event(&conn, "Today", at(2026, 10, 16, 0, 0));
    insert_event(&conn, "Last day", at(2027, 1, 16, 23, 59));
    insert_event(&conn, "Too late", at(2027, 1, 17, 0, 0));

    let config = CoreConfig::default();
    let listing = EventService::new(&mut conn, &config)
        .within_dates(None, None, now())
        .unwrap();

    assert_eq!(listing.range.start, date(2026, 10, 16));
    assert_eq!(listing.range.end, date(2027, 1, 16));
    assert!(listing.range.warnings.is_empty());
    let titles: Vec<_> = listing.events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Today", "Last day"]);
}

#[test]
fn within_dates_with_bad_bounds_warns_and_falls_back() {
    let mut conn = open_db_in_memory().unwrap();
    insert_event(&conn, "Today", at(2026, 10, 16, 20, 0));
    insert_event(&conn, "Next month", at(2026, 11, 20, 20, 0));

    let config = CoreConfig::default();
    let service = EventService::new(&mut conn, &config);
    let filter = DateFilter {
        start: Some("not-a-date".to_string()),
        end: Some(" ".to_string()),
    };
    let listing = service.within_dates(Some(&filter), None, now()).unwrap();

    assert_eq!(listing.range.start, date(2026, 10, 16));
    assert_eq!(listing.range.end, date(2027, 1, 16));
    assert_eq!(listing.range.warnings.len(), 2);
    assert_eq!(listing.range.warnings[0].bound, DateBound::Start);
    assert_eq!(
        listing.range.warnings[0].problem,
        BoundProblem::Invalid("not-a-date".to_string())
    );
    assert_eq!(listing.range.warnings[1].problem, BoundProblem::Empty);
    assert_eq!(
        listing.range.warnings[0].to_string(),
        "You tried to filter events with an invalid start date, the default was used instead"
    );
    assert_eq!(listing.events.len(), 2);
}

#[test]
fn within_dates_with_explicit_range_includes_whole_end_day() {
    let mut conn = open_db_in_memory().unwrap();
    insert_event(&conn, "Before", at(2026, 10, 31, 23, 59));
    insert_event(&conn, "First", at(2026, 11, 1, 0, 0));
    insert_event(&conn, "Last", at(2026, 11, 3, 23, 30));
    insert_event(&conn, "After", at(2026, 11, 4, 0, 0));

    let config = CoreConfig::default();
    let service = EventService::new(&mut conn, &config);
    let filter = DateFilter {
        start: Some("2026-11-01".to_string()),
        end: Some("2026-11-03".to_string()),
    };
    let listing = service.within_dates(Some(&filter), None, now()).unwrap();

    assert!(listing.range.warnings.is_empty());
    let titles: Vec<_> = listing.events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Last"]);

    let only_start = DateFilter {
        start: Some("2026-11-01".to_string()),
        end: None,
    };
    let listing = service.within_dates(Some(&only_start), None, now()).unwrap();
    assert_eq!(listing.range.warnings.len(), 1);
    assert_eq!(listing.range.warnings[0].bound, DateBound::End);
    assert_eq!(listing.range.warnings[0].problem, BoundProblem::Missing);
}

#[test]
fn future_orders_by_name_or_venue() {
    let mut conn = open_db_in_memory().unwrap();
    let venues = SqliteVenueRepository::new(&conn);
    let attic = Venue::new("attic");
    let blue_room = Venue::new("Blue Room");
    venues.create_venue(&attic).unwrap();
    venues.create_venue(&blue_room).unwrap();

    let mut jazz = Event::new("jazz", at(2026, 10, 20, 19, 0));
    jazz.venue_id = Some(blue_room.uuid);
    save(&conn, &jazz);
    let mut book_fair = Event::new("Book fair", at(2026, 10, 21, 10, 0));
    book_fair.venue_id = Some(attic.uuid);
    save(&conn, &book_fair);
    insert_event(&conn, "Anywhere", at(2026, 10, 19, 10, 0));

    let config = CoreConfig::default();
    let service = EventService::new(&mut conn, &config);
    let titles = |order: &str| -> Vec<String> {
        let listing = service.future(Some(order), now()).unwrap();
        assert!(listing.warnings.is_empty());
        listing.events.into_iter().map(|e| e.title).collect()
    };

    assert_eq!(titles("name"), vec!["Anywhere", "Book fair", "jazz"]);
    assert_eq!(titles("venue"), vec!["Book fair", "jazz", "Anywhere"]);
    assert_eq!(titles("date"), vec!["Anywhere", "jazz", "Book fair"]);
}

#[test]
fn listings_fall_back_to_date_for_relevance_and_unknown_orders() {
    let mut conn = open_db_in_memory().unwrap();
    insert_event(&conn, "Zither", at(2026, 11, 2, 19, 0));
    insert_event(&conn, "Accordion", at(2026, 11, 3, 19, 0));

    let config = CoreConfig::default();
    let service = EventService::new(&mut conn, &config);
    let listing = service.future(Some("score"), now()).unwrap();
    assert_eq!(listing.order, SearchOrder::Date);
    assert_eq!(listing.warnings, vec![SearchWarning::ScoreWithoutQuery]);
    assert_eq!(listing.events[0].title, "Zither");

    let filter = DateFilter {
        start: Some("2026-11-01".to_string()),
        end: Some("2026-11-30".to_string()),
    };
    let dated = service
        .within_dates(Some(&filter), Some("loudness"), now())
        .unwrap();
    assert_eq!(dated.order, SearchOrder::Date);
    assert_eq!(
        dated.warnings,
        vec![SearchWarning::UnknownOrder("loudness".to_string())]
    );
    let titles: Vec<_> = dated.events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Zither", "Accordion"]);

    let by_name = service.within_dates(Some(&filter), Some("name"), now()).unwrap();
    assert_eq!(by_name.order, SearchOrder::Name);
    assert_eq!(by_name.events[0].title, "Accordion");
}

#[test]
fn event_detail_serializes_flat_with_venue() {
    let mut conn = open_db_in_memory().unwrap();
    let venue = Venue::new("Blue Room");
    SqliteVenueRepository::new(&conn).create_venue(&venue).unwrap();
    let mut event = Event::new("Jazz", at(2026, 10, 20, 19, 0));
    event.venue_id = Some(venue.uuid);
    event.tags = vec!["jazz".to_string()];
    save(&conn, &event);

    let config = CoreConfig::default();
    let detail = match EventService::new(&mut conn, &config).show(event.uuid).unwrap() {
        ShowOutcome::Found(detail) => detail,
        other => panic!("unexpected outcome: {other:?}"),
    };
    let json = serde_json::to_value(&detail).unwrap();

    assert_eq!(json["uuid"], event.uuid.to_string());
    assert_eq!(json["title"], "Jazz");
    assert_eq!(json["tags"], serde_json::json!(["jazz"]));
    assert_eq!(json["venue"]["title"], "Blue Room");
    assert!(json["duplicate_of"].is_null());
}
