//! Engine tests against in-memory collaborators.

use std::{sync::Arc, sync::atomic::Ordering, time::Duration};

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
  Checkpoint, Entity, Error,
  diner::{NewDiner, RosterEntry},
  dispatch::{DispatchOrigin, DispatchUpdate, ManualDispatch},
  ledger::Ledger,
  fakes::{MemoryStore, RecordingPublisher, StaticProvider},
  shift::Shift,
  store::{DinerStore, DirectoryProvider, FixedClock},
};

fn shift(id: i64, starts: &str, ends: &str, label: &str) -> Shift {
  Shift {
    id,
    starts: starts.into(),
    ends: ends.into(),
    label: label.into(),
    accept_chime_repeats: Some(1),
    reject_chime_repeats: Some(3),
  }
}

fn day_shifts() -> Vec<Shift> {
  vec![
    shift(1, "06:00", "14:00", "Breakfast"),
    shift(2, "14:00", "22:00", "Lunch"),
    shift(3, "22:00", "06:00", "Dinner"),
  ]
}

fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2025, 8, day)
    .unwrap()
    .and_hms_opt(h, m, 0)
    .unwrap()
}

fn roster(identification: &str, name: &str) -> RosterEntry {
  RosterEntry {
    identification: identification.into(),
    name:           name.into(),
    area:           Some("Packing".into()),
    cost_center:    Some("CC-10".into()),
    note:           None,
  }
}

fn local_diner(identification: &str, name: &str, active: bool) -> NewDiner {
  NewDiner {
    identification:   identification.into(),
    name:             name.into(),
    area:             None,
    cost_center:      None,
    note:             None,
    active,
    registered_from:  None,
    registered_until: None,
    alert:            Default::default(),
  }
}

struct Harness {
  store:      Arc<MemoryStore>,
  publisher:  Arc<RecordingPublisher>,
  clock:      Arc<FixedClock>,
  checkpoint: Checkpoint<MemoryStore>,
}

fn harness_with(shifts: Vec<Shift>, providers: Vec<Arc<StaticProvider>>) -> Harness {
  let providers = providers
    .into_iter()
    .map(|p| p as Arc<dyn DirectoryProvider>)
    .collect();
  let store = Arc::new(MemoryStore::with_shifts(shifts));
  let publisher = Arc::new(RecordingPublisher::default());
  let clock = Arc::new(FixedClock::new(at(15, 7, 30)));
  let checkpoint = Checkpoint::new(Arc::clone(&store), publisher.clone())
    .with_clock(clock.clone())
    .with_providers(providers);
  Harness { store, publisher, clock, checkpoint }
}

fn harness(providers: Vec<Arc<StaticProvider>>) -> Harness {
  harness_with(day_shifts(), providers)
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_diner_found_in_payroll_is_served() {
  let reservations = Arc::new(StaticProvider::new("reservations", vec![]));
  let payroll = Arc::new(StaticProvider::new("payroll", vec![roster("12345", "Jane Doe")]));
  let h = harness(vec![reservations.clone(), payroll.clone()]);

  let outcome = h.checkpoint.verify_and_dispatch("12345").await.unwrap();

  assert!(outcome.is_accepted());
  assert_eq!(outcome.reason, None);
  let diner = outcome.diner.unwrap();
  assert_eq!(diner.name, "Jane Doe");
  assert!(diner.active);
  assert_eq!(reservations.lookups.load(Ordering::SeqCst), 1);

  let dispatches = h.store.dispatches();
  assert_eq!(dispatches.len(), 1);
  assert_eq!(dispatches[0].origin, DispatchOrigin::Verification);
  assert_eq!(dispatches[0].shift_id, 1);
  assert_eq!(dispatches[0].diner_id, diner.id);
  assert!(dispatches[0].active);
  assert!(!dispatches[0].dispatched);
  assert_eq!(dispatches[0].quantity, 1);

  let events = h.publisher.events();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].diner_name, "Jane Doe");
  assert_eq!(events[0].shift_window, "06:00 - 14:00");
  assert_eq!(events[0].dispatch_id, dispatches[0].id);
  assert_eq!(events[0].handed_out_at, "");
}

#[tokio::test]
async fn second_visit_in_same_shift_is_rejected() {
  let h = harness(vec![]);
  h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();

  assert!(h.checkpoint.verify_and_dispatch("555").await.unwrap().is_accepted());

  h.clock.set(at(15, 13, 59));
  let again = h.checkpoint.verify_and_dispatch("555").await.unwrap();
  assert_eq!(again.diner, None);
  assert_eq!(
    again.reason.as_deref(),
    Some("already has a record for the current shift and day")
  );
  assert_eq!(h.store.dispatches().len(), 1);
  assert_eq!(h.publisher.events().len(), 1);
}

#[tokio::test]
async fn next_shift_and_next_day_are_new_keys() {
  let h = harness(vec![]);
  h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();

  assert!(h.checkpoint.verify_and_dispatch("555").await.unwrap().is_accepted());
  h.clock.set(at(15, 15, 0));
  assert!(h.checkpoint.verify_and_dispatch("555").await.unwrap().is_accepted());
  h.clock.set(at(16, 7, 0));
  assert!(h.checkpoint.verify_and_dispatch("555").await.unwrap().is_accepted());

  let shifts: Vec<i64> = h.store.dispatches().iter().map(|d| d.shift_id).collect();
  assert_eq!(shifts, vec![1, 2, 1]);
}

#[tokio::test]
async fn overnight_shift_matches_after_midnight() {
  let h = harness(vec![]);
  h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  h.clock.set(at(16, 2, 0));

  assert!(h.checkpoint.verify_and_dispatch("555").await.unwrap().is_accepted());
  assert_eq!(h.store.dispatches()[0].shift_id, 3);
  assert_eq!(h.publisher.events()[0].shift_window, "22:00 - 06:00");
}

#[tokio::test]
async fn outside_meal_hours_creates_nothing() {
  let h = harness_with(
    vec![shift(1, "06:00", "14:00", "Breakfast"), shift(2, "14:00", "22:00", "Lunch")],
    vec![],
  );
  h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  h.clock.set(at(15, 23, 0));

  let outcome = h.checkpoint.verify_and_dispatch("555").await.unwrap();
  assert_eq!(outcome.diner, None);
  assert_eq!(outcome.reason.as_deref(), Some("outside meal hours"));
  assert!(h.store.dispatches().is_empty());
  assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn unknown_everywhere_is_not_eligible() {
  let payroll = Arc::new(StaticProvider::new("payroll", vec![]));
  let h = harness(vec![payroll]);

  let outcome = h.checkpoint.verify_and_dispatch("99999").await.unwrap();
  assert_eq!(outcome.reason.as_deref(), Some("diner not found or not eligible"));
  assert!(h.store.diners().is_empty());
  assert!(h.store.dispatches().is_empty());
}

#[tokio::test]
async fn blank_identification_is_not_eligible() {
  let h = harness(vec![]);
  let outcome = h.checkpoint.verify_and_dispatch(" -- ").await.unwrap();
  assert_eq!(outcome.reason.as_deref(), Some("diner not found or not eligible"));
}

// ─── Resolution ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn punctuation_is_ignored_for_local_lookup() {
  let h = harness(vec![]);
  h.store
    .upsert_diner(local_diner("001-2345678-9", "Luis", true))
    .await
    .unwrap();

  let outcome = h.checkpoint.verify_and_dispatch("'00123456789'").await.unwrap();
  assert_eq!(outcome.diner.unwrap().name, "Luis");
}

#[tokio::test]
async fn inactive_local_diner_is_not_reused_without_a_source() {
  let h = harness(vec![]);
  h.store.upsert_diner(local_diner("777", "Old", false)).await.unwrap();

  let outcome = h.checkpoint.verify_and_dispatch("777").await.unwrap();
  assert_eq!(outcome.reason.as_deref(), Some("diner not found or not eligible"));
}

#[tokio::test]
async fn inactive_local_diner_falls_through_to_sources() {
  let payroll = Arc::new(StaticProvider::new("payroll", vec![roster("777", "Renewed")]));
  let h = harness(vec![payroll.clone()]);
  let old = h.store.upsert_diner(local_diner("777", "Old", false)).await.unwrap();

  let diner = h.checkpoint.resolver().resolve("777").await.unwrap();

  assert_eq!(payroll.lookups.load(Ordering::SeqCst), 1);
  assert_eq!(diner.id, old.id);
  assert_eq!(diner.name, "Renewed");
  assert!(diner.active);
  assert_eq!(h.store.diners().len(), 1);
}

#[tokio::test]
async fn provisioning_is_idempotent() {
  let payroll = Arc::new(StaticProvider::new("payroll", vec![roster("12345", "Jane Doe")]));
  let h = harness(vec![payroll.clone()]);

  let first = h.checkpoint.resolver().resolve("12345").await.unwrap();
  let second = h.checkpoint.resolver().resolve("12345").await.unwrap();

  assert_eq!(first.id, second.id);
  assert_eq!(h.store.diners().len(), 1);
  assert_eq!(payroll.lookups.load(Ordering::SeqCst), 1);
  assert_eq!(first.registered_from, Some(at(15, 7, 30)));
}

#[tokio::test]
async fn providers_are_consulted_in_order() {
  let reservations =
    Arc::new(StaticProvider::new("reservations", vec![roster("12345", "From Reservations")]));
  let payroll = Arc::new(StaticProvider::new("payroll", vec![roster("12345", "From Payroll")]));
  let h = harness(vec![reservations, payroll.clone()]);

  let diner = h.checkpoint.resolver().resolve("12345").await.unwrap();
  assert_eq!(diner.name, "From Reservations");
  assert_eq!(payroll.lookups.load(Ordering::SeqCst), 0);

  let names: Vec<&str> = h.checkpoint.resolver().providers().collect();
  assert_eq!(names, vec!["reservations", "payroll"]);
}

#[tokio::test]
async fn failing_provider_is_skipped() {
  let mut reservations = StaticProvider::new("reservations", vec![]);
  reservations.failing = true;
  let payroll = StaticProvider::new("payroll", vec![roster("12345", "Jane Doe")]);
  let h = harness(vec![Arc::new(reservations), Arc::new(payroll)]);

  let outcome = h.checkpoint.verify_and_dispatch("12345").await.unwrap();
  assert_eq!(outcome.diner.unwrap().name, "Jane Doe");
}

// ─── Faults ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn storage_failure_propagates() {
  let h = harness(vec![]);
  h.store.set_offline(true);

  let err = h.checkpoint.verify_and_dispatch("555").await.unwrap_err();
  assert!(matches!(err, Error::Storage(_)));
  assert!(!err.is_recoverable());
}

#[tokio::test]
async fn slow_verification_times_out() {
  let mut payroll = StaticProvider::new("payroll", vec![roster("12345", "Jane Doe")]);
  payroll.delay = Some(Duration::from_millis(500));
  let store = Arc::new(MemoryStore::with_shifts(day_shifts()));
  let checkpoint = Checkpoint::new(Arc::clone(&store), Arc::new(RecordingPublisher::default()))
    .with_clock(Arc::new(FixedClock::new(at(15, 7, 30))))
    .with_providers(vec![Arc::new(payroll) as Arc<dyn DirectoryProvider>])
    .with_timeout(Duration::from_millis(20));

  let err = checkpoint.verify_and_dispatch("12345").await.unwrap_err();
  assert!(matches!(err, Error::Timeout));
  assert!(store.dispatches().is_empty());
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_verifications_serve_once() {
  let h = harness(vec![]);
  h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  let checkpoint = Arc::new(h.checkpoint);

  let attempts: Vec<_> = (0..16)
    .map(|_| {
      let checkpoint = Arc::clone(&checkpoint);
      tokio::spawn(async move { checkpoint.verify_and_dispatch("555").await })
    })
    .collect();

  let mut accepted = 0;
  for attempt in attempts {
    if attempt.await.unwrap().unwrap().is_accepted() {
      accepted += 1;
    }
  }

  assert_eq!(accepted, 1);
  assert_eq!(h.store.dispatches().len(), 1);
  assert_eq!(h.publisher.events().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ledger_inserts_keep_one_active() {
  let h = harness(vec![]);
  let diner_id = h
    .store
    .upsert_diner(local_diner("555", "Ana", true))
    .await
    .unwrap()
    .id;
  let checkpoint = Arc::new(h.checkpoint);
  let breakfast = day_shifts().remove(0);

  let attempts: Vec<_> = (0..8)
    .map(|_| {
      let checkpoint = Arc::clone(&checkpoint);
      let breakfast = breakfast.clone();
      tokio::spawn(async move {
        checkpoint
          .ledger()
          .create_from_verification(diner_id, "555", Some(&breakfast))
          .await
      })
    })
    .collect();

  let mut created = 0;
  for attempt in attempts {
    match attempt.await.unwrap() {
      Ok(_) => created += 1,
      Err(Error::DuplicateDispatch) => {}
      Err(e) => panic!("unexpected error: {e}"),
    }
  }
  assert_eq!(created, 1);
  assert_eq!(h.store.dispatches().iter().filter(|d| d.active).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_ledgers_rely_on_store_uniqueness() {
  let h = harness(vec![]);
  let diner_id = h
    .store
    .upsert_diner(local_diner("555", "Ana", true))
    .await
    .unwrap()
    .id;
  let breakfast = day_shifts().remove(0);

  // Independent lock tables, as in separate processes sharing one database.
  let attempts: Vec<_> = (0..8)
    .map(|_| {
      let ledger = Ledger::new(Arc::clone(&h.store), h.clock.clone());
      let breakfast = breakfast.clone();
      tokio::spawn(async move {
        ledger
          .create_from_verification(diner_id, "555", Some(&breakfast))
          .await
      })
    })
    .collect();

  let mut created = 0;
  for attempt in attempts {
    match attempt.await.unwrap() {
      Ok(_) => created += 1,
      Err(Error::DuplicateDispatch) => {}
      Err(e) => panic!("unexpected error: {e}"),
    }
  }
  assert_eq!(created, 1);
  assert_eq!(h.store.dispatches().iter().filter(|d| d.active).count(), 1);
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn verification_without_shift_is_rejected_by_ledger() {
  let h = harness(vec![]);
  let err = h
    .checkpoint
    .ledger()
    .create_from_verification(1, "555", None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NoActiveShift));
}

#[tokio::test]
async fn annulment_reopens_the_key() {
  let h = harness(vec![]);
  let diner = h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  let ledger = h.checkpoint.ledger();
  let breakfast = &day_shifts()[0];

  let first = ledger
    .create_from_verification(diner.id, "555", Some(breakfast))
    .await
    .unwrap();
  assert!(matches!(
    ledger.create_from_verification(diner.id, "555", Some(breakfast)).await,
    Err(Error::DuplicateDispatch)
  ));

  assert!(ledger.annul(first.id).await.unwrap());
  assert!(!ledger.annul(9_999).await.unwrap());

  let second = ledger
    .create_from_verification(diner.id, "555", Some(breakfast))
    .await
    .unwrap();
  assert_ne!(first.id, second.id);

  let annulled = ledger.get(first.id).await.unwrap().unwrap();
  assert!(!annulled.active);
}

#[tokio::test]
async fn marking_dispatched_sets_hand_out_time() {
  let h = harness(vec![]);
  let diner = h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  let ledger = h.checkpoint.ledger();
  let created = ledger
    .create_from_verification(diner.id, "555", Some(&day_shifts()[0]))
    .await
    .unwrap();
  assert_eq!(created.handed_out_at, None);

  h.clock.set(at(15, 7, 45));
  let handed = ledger.mark_dispatched(created.id).await.unwrap();
  assert!(handed.dispatched);
  assert_eq!(handed.handed_out_at, Some(at(15, 7, 45)));

  h.clock.set(at(15, 7, 50));
  let again = ledger.mark_dispatched(created.id).await.unwrap();
  assert_eq!(again.handed_out_at, Some(at(15, 7, 50)));

  assert!(matches!(
    ledger.mark_dispatched(9_999).await,
    Err(Error::NotFound(Entity::Dispatch, 9_999))
  ));
}

#[tokio::test]
async fn annul_and_hand_out_keep_each_others_changes() {
  let h = harness(vec![]);
  let diner = h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  let ledger = h.checkpoint.ledger();
  let created = ledger
    .create_from_verification(diner.id, "555", Some(&day_shifts()[0]))
    .await
    .unwrap();

  ledger.mark_dispatched(created.id).await.unwrap();
  assert!(ledger.annul(created.id).await.unwrap());
  h.clock.set(at(15, 8, 0));
  let handed = ledger.mark_dispatched(created.id).await.unwrap();

  assert!(!handed.active);
  assert!(handed.dispatched);
  assert_eq!(handed.handed_out_at, Some(at(15, 8, 0)));
}

#[tokio::test]
async fn manual_dispatch_validates_references_and_never_broadcasts() {
  let h = harness(vec![]);
  let diner = h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  let ledger = h.checkpoint.ledger();

  let manual = |diner_id, shift_id| ManualDispatch {
    diner_id,
    shift_id,
    registered_at: None,
    identification: "555".into(),
    quantity: 2,
    unit_cost: 3.5,
  };

  assert!(matches!(
    ledger.create_manual(manual(42, 1)).await,
    Err(Error::NotFound(Entity::Diner, 42))
  ));
  assert!(matches!(
    ledger.create_manual(manual(diner.id, 42)).await,
    Err(Error::NotFound(Entity::Shift, 42))
  ));

  let created = ledger.create_manual(manual(diner.id, 2)).await.unwrap();
  assert_eq!(created.origin, DispatchOrigin::Administration);
  assert_eq!(created.quantity, 2);
  assert_eq!(created.registered_at, at(15, 7, 30));
  assert!(h.publisher.events().is_empty());

  assert!(matches!(
    ledger.create_manual(manual(diner.id, 2)).await,
    Err(Error::DuplicateDispatch)
  ));
}

#[tokio::test]
async fn manual_dispatch_rejects_invalid_input() {
  let h = harness(vec![]);
  let ledger = h.checkpoint.ledger();
  let err = ledger
    .create_manual(ManualDispatch {
      diner_id:       1,
      shift_id:       1,
      registered_at:  None,
      identification: "  ".into(),
      quantity:       1,
      unit_cost:      1.0,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn update_cannot_move_onto_an_occupied_key() {
  let h = harness(vec![]);
  let diner = h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  let ledger = h.checkpoint.ledger();
  let shifts = day_shifts();

  let breakfast = ledger
    .create_from_verification(diner.id, "555", Some(&shifts[0]))
    .await
    .unwrap();
  let lunch = ledger
    .create_from_verification(diner.id, "555", Some(&shifts[1]))
    .await
    .unwrap();

  let edit = DispatchUpdate {
    diner_id:       diner.id,
    shift_id:       1,
    registered_at:  lunch.registered_at,
    identification: "555".into(),
    quantity:       1,
    unit_cost:      1.0,
    active:         true,
  };
  assert!(matches!(
    ledger.update(lunch.id, edit.clone()).await,
    Err(Error::DuplicateDispatch)
  ));

  // Inactive records may share a key.
  let parked = ledger
    .update(lunch.id, DispatchUpdate { active: false, ..edit.clone() })
    .await
    .unwrap()
    .unwrap();
  assert!(!parked.active);
  assert_eq!(parked.shift_id, breakfast.shift_id);

  assert_eq!(ledger.update(9_999, edit).await.unwrap(), None);
}

#[tokio::test]
async fn pending_projects_undelivered_dispatches() {
  let h = harness(vec![]);
  let ana = h.store.upsert_diner(local_diner("555", "Ana", true)).await.unwrap();
  let luis = h.store.upsert_diner(local_diner("556", "Luis", true)).await.unwrap();
  let ledger = h.checkpoint.ledger();
  let breakfast = &day_shifts()[0];

  let a = ledger
    .create_from_verification(ana.id, "555", Some(breakfast))
    .await
    .unwrap();
  let l = ledger
    .create_from_verification(luis.id, "556", Some(breakfast))
    .await
    .unwrap();
  ledger.mark_dispatched(a.id).await.unwrap();

  let pending = ledger.pending().await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].dispatch_id, l.id);
  assert_eq!(pending[0].diner_name, "Luis");
  assert_eq!(pending[0].shift_window, "06:00 - 14:00");

  assert!(ledger.delete(l.id).await.unwrap());
  assert!(!ledger.delete(l.id).await.unwrap());
  assert!(ledger.pending().await.unwrap().is_empty());
}
