mod common;

use common::{at, count_rows, insert_event, reload, save};
use eventdesk_core::config::CoreConfig;
use eventdesk_core::db::open_db_in_memory;
use eventdesk_core::dedupe::squash::{squash, MergePolicy};
use eventdesk_core::fetch::Candidate;
use eventdesk_core::model::event::Event;
use eventdesk_core::model::source::Source;
use eventdesk_core::model::venue::Venue;
use eventdesk_core::repo::source_repo::{SourceRepository, SqliteSourceRepository};
use eventdesk_core::repo::venue_repo::{SqliteVenueRepository, VenueRepository};
use eventdesk_core::service::event_service::{
    CloneOutcome, DeleteOutcome, EditOutcome, EventService,
};
use eventdesk_core::service::source_service::{SourceService, SourceUpdate};
use uuid::Uuid;

fn saved(outcome: EditOutcome) -> (Event, Option<Venue>) {
    match outcome {
        EditOutcome::Saved { event, new_venue } => (event, new_venue),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn create_with_unknown_venue_name_creates_it() {
    let mut conn = open_db_in_memory().unwrap();
    let config = CoreConfig::default();
    let fields = Candidate::new(" Jazz Night ")
        .starting("2026-10-20", "19:00")
        .at_venue("Blue Room")
        .tagged(["Live", "jazz"]);

    let (event, new_venue) = saved(
        EventService::new(&mut conn, &config)
            .create(&fields)
            .unwrap(),
    );

    let venue = new_venue.expect("venue created");
    assert_eq!(venue.title, "Blue Room");
    assert_eq!(venue.source_id, None);
    assert_eq!(event.title, "Jazz Night");
    assert_eq!(event.venue_id, Some(venue.uuid));
    assert_eq!(event.source_id, None);
    assert_eq!(event.end_time, Some(at(2026, 10, 20, 19, 0)));
    assert_eq!(reload(&conn, &event), event);
    assert_eq!(event.tags, vec!["jazz".to_string(), "live".to_string()]);
}

#[test]
fn create_reuses_existing_venue_by_name_or_id() {
    let mut conn = open_db_in_memory().unwrap();
    let venue = Venue::new("Blue Room");
    SqliteVenueRepository::new(&conn).create_venue(&venue).unwrap();
    let config = CoreConfig::default();
    let mut service = EventService::new(&mut conn, &config);

    let by_name = Candidate::new("Jazz")
        .starting("2026-10-20", "19:00")
        .at_venue("blue room");
    let (event, new_venue) = saved(service.create(&by_name).unwrap());
    assert_eq!(new_venue, None);
    assert_eq!(event.venue_id, Some(venue.uuid));

    let mut by_id = Candidate::new("Blues").starting("2026-10-21", "19:00");
    by_id.venue_id = Some(venue.uuid.to_string());
    by_id.venue_name = Some("Somewhere else".to_string());
    let (event, new_venue) = saved(service.create(&by_id).unwrap());
    assert_eq!(new_venue, None);
    assert_eq!(event.venue_id, Some(venue.uuid));

    drop(service);
    assert_eq!(count_rows(&conn, "venues"), 1);
}

#[test]
fn create_rejects_bad_fields_without_writing() {
    let mut conn = open_db_in_memory().unwrap();
    let config = CoreConfig::default();
    let mut service = EventService::new(&mut conn, &config);

    let mut unknown_venue = Candidate::new("Jazz").starting("2026-10-20", "19:00");
    unknown_venue.venue_id = Some(Uuid::new_v4().to_string());
    let rejections = [
        Candidate::new("  ").starting("2026-10-20", "19:00"),
        Candidate::new("Jazz").starting("someday", "19:00"),
        Candidate::new("Jazz")
            .starting("2026-10-20", "19:00")
            .ending("2026-10-19", "21:00"),
        unknown_venue,
    ];
    for fields in &rejections {
        let outcome = service.create(fields).unwrap();
        assert!(
            matches!(outcome, EditOutcome::Rejected(_)),
            "{fields:?} gave {outcome:?}"
        );
    }

    let named = Candidate::new("  ")
        .starting("2026-10-20", "19:00")
        .at_venue("Blue Room");
    assert_eq!(
        service.create(&named).unwrap(),
        EditOutcome::Rejected("title is missing".to_string())
    );

    drop(service);
    assert_eq!(count_rows(&conn, "events"), 0);
    assert_eq!(count_rows(&conn, "venues"), 0);
}

#[test]
fn update_replaces_fields_but_keeps_identity_and_links() {
    let mut conn = open_db_in_memory().unwrap();
    let source = Source::new("example.org/cal.ics").unwrap();
    SqliteSourceRepository::new(&conn).create_source(&source).unwrap();
    let mut original = Event::new("Jazz", at(2026, 10, 20, 19, 0));
    original.source_id = Some(source.uuid);
    original.description = Some("Quartet".to_string());
    save(&conn, &original);
    let copy = insert_event(&conn, "Jazz", at(2026, 10, 20, 19, 0));
    squash(
        &mut conn,
        &[original.uuid, copy.uuid],
        copy.uuid,
        MergePolicy::KeepCanonical,
    )
    .unwrap();

    let config = CoreConfig::default();
    let fields = Candidate::new("Jazz Night")
        .starting("2026-10-20", "20:00")
        .ending("", "23:00")
        .at_venue("Attic");
    let (event, new_venue) = saved(
        EventService::new(&mut conn, &config)
            .update(original.uuid, &fields)
            .unwrap(),
    );

    assert!(new_venue.is_some());
    assert_eq!(event.uuid, original.uuid);
    assert_eq!(event.source_id, Some(source.uuid));
    assert_eq!(event.duplicate_of, Some(copy.uuid));
    assert_eq!(event.description, None);
    assert_eq!(event.end_time, Some(at(2026, 10, 20, 23, 0)));
    assert_eq!(reload(&conn, &original), event);
    assert_eq!(count_rows(&conn, "events"), 2);
}

#[test]
fn update_of_missing_event_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let config = CoreConfig::default();
    let fields = Candidate::new("Jazz")
        .starting("2026-10-20", "19:00")
        .at_venue("Blue Room");

    let outcome = EventService::new(&mut conn, &config)
        .update(Uuid::new_v4(), &fields)
        .unwrap();

    assert!(matches!(outcome, EditOutcome::NotFound(_)));
    assert_eq!(count_rows(&conn, "venues"), 0);
}

#[test]
fn clone_copies_content_but_not_dates_or_provenance() {
    let mut conn = open_db_in_memory().unwrap();
    let venue = Venue::new("Blue Room");
    SqliteVenueRepository::new(&conn).create_venue(&venue).unwrap();
    let mut event = Event::new("Jazz", at(2026, 10, 20, 19, 0));
    event.end_time = Some(at(2026, 10, 20, 22, 0));
    event.description = Some("Quartet".to_string());
    event.url = Some("https://example.org/jazz".to_string());
    event.venue_id = Some(venue.uuid);
    event.tags = vec!["jazz".to_string()];
    save(&conn, &event);

    let config = CoreConfig::default();
    let mut service = EventService::new(&mut conn, &config);
    let draft = match service.clone_event(event.uuid).unwrap() {
        CloneOutcome::Draft(draft) => draft,
        other => panic!("unexpected outcome: {other:?}"),
    };

    assert_eq!(draft.title, "Jazz");
    assert_eq!(draft.description.as_deref(), Some("Quartet"));
    assert_eq!(draft.url.as_deref(), Some("https://example.org/jazz"));
    assert_eq!(draft.venue_id, Some(venue.uuid.to_string()));
    assert_eq!(draft.tags, vec!["jazz".to_string()]);
    assert_eq!(draft.start_date, None);
    assert_eq!(draft.end_time, None);

    let next_week = Candidate {
        start_date: Some("2026-10-27".to_string()),
        start_time: Some("19:00".to_string()),
        ..draft
    };
    let (copy, new_venue) = saved(service.create(&next_week).unwrap());
    assert_ne!(copy.uuid, event.uuid);
    assert_eq!(copy.venue_id, Some(venue.uuid));
    assert_eq!(new_venue, None);

    assert!(matches!(
        service.clone_event(Uuid::new_v4()).unwrap(),
        CloneOutcome::NotFound(_)
    ));
}

#[test]
fn delete_removes_event_and_releases_duplicates() {
    let mut conn = open_db_in_memory().unwrap();
    let canonical = insert_event(&conn, "Jazz", at(2026, 10, 20, 19, 0));
    let copy = insert_event(&conn, "Jazz", at(2026, 10, 20, 19, 0));
    squash(
        &mut conn,
        &[canonical.uuid, copy.uuid],
        canonical.uuid,
        MergePolicy::KeepCanonical,
    )
    .unwrap();

    let config = CoreConfig::default();
    let mut service = EventService::new(&mut conn, &config);
    match service.delete(canonical.uuid).unwrap() {
        DeleteOutcome::Deleted(event) => assert_eq!(event.uuid, canonical.uuid),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(
        service.delete(canonical.uuid).unwrap(),
        DeleteOutcome::NotFound(_)
    ));

    drop(service);
    assert_eq!(reload(&conn, &copy).duplicate_of, None);
    assert_eq!(count_rows(&conn, "events"), 1);
}

#[test]
fn venues_are_listed_by_title() {
    let mut conn = open_db_in_memory().unwrap();
    let venues = SqliteVenueRepository::new(&conn);
    for title in ["blue Room", "Attic", "Cellar"] {
        venues.create_venue(&Venue::new(title)).unwrap();
    }

    let config = CoreConfig::default();
    let titles: Vec<_> = EventService::new(&mut conn, &config)
        .venues()
        .unwrap()
        .into_iter()
        .map(|venue| venue.title)
        .collect();
    assert_eq!(titles, vec!["Attic", "blue Room", "Cellar"]);
}

#[test]
fn source_update_normalizes_origin_and_title() {
    let mut conn = open_db_in_memory().unwrap();
    let mut source = Source::new("example.org/cal.ics").unwrap();
    source.title = Some("Old".to_string());
    source.imported_at = Some(at(2026, 10, 1, 8, 0));
    SqliteSourceRepository::new(&conn).create_source(&source).unwrap();

    let service = SourceService::new(&mut conn);
    let updated = match service
        .update(source.uuid, "webcal://example.org/new.ics", Some("  "))
        .unwrap()
    {
        SourceUpdate::Updated(updated) => updated,
        other => panic!("unexpected outcome: {other:?}"),
    };

    assert_eq!(updated.uuid, source.uuid);
    assert_eq!(updated.url, "http://example.org/new.ics");
    assert_eq!(updated.title, None);
    assert_eq!(updated.imported_at, source.imported_at);
    assert_eq!(service.show(source.uuid).unwrap(), Some(updated));
}

#[test]
fn source_update_rejects_invalid_or_taken_origins() {
    let mut conn = open_db_in_memory().unwrap();
    let sources = SqliteSourceRepository::new(&conn);
    let first = Source::new("example.org/one.ics").unwrap();
    let second = Source::new("example.org/two.ics").unwrap();
    sources.create_source(&first).unwrap();
    sources.create_source(&second).unwrap();

    let service = SourceService::new(&mut conn);
    assert!(matches!(
        service
            .update(second.uuid, "webcal://example.org/one.ics", None)
            .unwrap(),
        SourceUpdate::Rejected(_)
    ));
    assert!(matches!(
        service.update(second.uuid, "not a url", None).unwrap(),
        SourceUpdate::Rejected(_)
    ));
    assert!(matches!(
        service
            .update(Uuid::new_v4(), "example.org/three.ics", None)
            .unwrap(),
        SourceUpdate::NotFound(_)
    ));
    assert_eq!(
        service.show(second.uuid).unwrap().map(|s| s.url),
        Some(second.url.clone())
    );

    // Re-saving a source under its own origin is allowed.
    assert!(matches!(
        service
            .update(second.uuid, "example.org/two.ics", Some("Two"))
            .unwrap(),
        SourceUpdate::Updated(_)
    ));
}
