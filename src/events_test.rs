use uuid::Uuid;

use super::*;

#[test]
fn subscribers_receive_emitted_events() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    let id = Uuid::new_v4();
    bus.emit(SyncEvent::FeatureCreated { id });

    assert_eq!(rx.try_recv().unwrap(), SyncEvent::FeatureCreated { id });
}

#[test]
fn emit_without_subscribers_does_not_panic() {
    let bus = EventBus::new();
    bus.emit(SyncEvent::FeatureDeleted { id: Uuid::new_v4() });
}

#[test]
fn each_subscriber_sees_every_event() {
    let bus = EventBus::new();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    let id = Uuid::new_v4();
    bus.emit(SyncEvent::FeatureModified { id });

    assert_eq!(a.try_recv().unwrap(), SyncEvent::FeatureModified { id });
    assert_eq!(b.try_recv().unwrap(), SyncEvent::FeatureModified { id });
}

#[test]
fn late_subscriber_misses_earlier_events() {
    let bus = EventBus::new();
    bus.emit(SyncEvent::FeatureCreated { id: Uuid::new_v4() });

    let mut rx = bus.subscribe();
    assert!(rx.try_recv().is_err());
}

#[test]
fn selection_changed_carries_both_sides() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    let picked = Uuid::new_v4();
    let dropped = Uuid::new_v4();
    bus.emit(SyncEvent::SelectionChanged {
        selected: vec![picked],
        deselected: vec![dropped],
    });

    let SyncEvent::SelectionChanged { selected, deselected } = rx.try_recv().unwrap() else {
        panic!("expected SelectionChanged");
    };
    assert_eq!(selected, vec![picked]);
    assert_eq!(deselected, vec![dropped]);
}
