//! Listener registry: category → ordered listeners.
//!
//! Listeners are invoked in registration order. Every invocation is
//! isolated: a listener returning `Err` or panicking is logged and the
//! remaining listeners still run.
//!
//! Dispatch iterates over a snapshot of the list, so a listener may call
//! [`ListenerRegistry::off`] on itself (or register new listeners) without
//! affecting the dispatch in progress.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use super::{EventCategory, NotificationEvent};

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a listener.
pub type ListenerResult = Result<(), ListenerError>;

/// A registered callback. Identity (for `off`) is the `Arc` allocation.
pub type Listener = Arc<dyn Fn(&NotificationEvent) -> ListenerResult + Send + Sync>;

/// Wraps a closure into a [`Listener`].
///
/// Keep the returned value around if you intend to call `off` later.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&NotificationEvent) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that were called.
    pub invoked: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

/// Ordered listener lists keyed by category name.
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
}

impl ListenerRegistry {
    /// Creates a registry with empty lists for the built-in categories.
    pub fn new() -> Self {
        let listeners = EventCategory::BUILTIN
            .iter()
            .map(|category| (category.as_str().to_string(), Vec::new()))
            .collect();
        Self {
            listeners: RwLock::new(listeners),
        }
    }

    /// Appends a listener. Duplicates are allowed.
    pub fn on(&self, category: &EventCategory, listener: Listener) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        listeners
            .entry(category.as_str().to_string())
            .or_default()
            .push(listener);
    }

    /// Removes the first registration of `listener` under `category`.
    ///
    /// Returns whether something was removed. Unknown listeners or
    /// categories are a silent no-op.
    pub fn off(&self, category: &EventCategory, listener: &Listener) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = listeners.get_mut(category.as_str()) else {
            return false;
        };
        match list.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Number of listeners registered for `category`.
    pub fn count(&self, category: &EventCategory) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category.as_str())
            .map_or(0, Vec::len)
    }

    /// Whether `category` has a list, even an empty one.
    pub fn has_category(&self, category: &EventCategory) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(category.as_str())
    }

    /// Invokes every listener registered for the event's category.
    pub fn dispatch(&self, event: &NotificationEvent) -> DispatchReport {
        // Snapshot so the lock is released before user code runs
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event.category.as_str())
            .cloned()
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for listener in snapshot {
            report.invoked += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::error!(
                        category = %event.category,
                        kind = %event.kind,
                        "Listener failed: {}",
                        e
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::error!(
                        category = %event.category,
                        kind = %event.kind,
                        "Listener panicked: {}",
                        panic_message(&*panic)
                    );
                }
            }
        }
        report
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn order_event() -> NotificationEvent {
        NotificationEvent::classify(json!({"tipo": "nuevo_pedido"}))
            .unwrap()
            .unwrap()
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = counter.clone();
        listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn new_registry_has_builtin_categories() {
        let registry = ListenerRegistry::new();
        for category in EventCategory::BUILTIN {
            assert!(registry.has_category(&category));
            assert_eq!(registry.count(&category), 0);
        }
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            registry.on(
                &EventCategory::Order,
                listener(move |_| {
                    order.lock().unwrap().push(i);
                    Ok(())
                }),
            );
        }

        registry.dispatch(&order_event());

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn failing_listener_does_not_stop_the_rest() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.on(&EventCategory::Order, listener(|_| Err("boom".into())));
        registry.on(&EventCategory::Order, counting(&counter));

        let report = registry.dispatch(&order_event());

        assert_eq!(report, DispatchReport { invoked: 2, failed: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.on(
            &EventCategory::Order,
            listener(|_| panic!("listener exploded")),
        );
        registry.on(&EventCategory::Order, counting(&counter));

        let first = registry.dispatch(&order_event());
        let second = registry.dispatch(&order_event());

        assert_eq!(first.failed, 1);
        assert_eq!(second.failed, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn off_removes_only_first_matching_instance() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let l = counting(&counter);
        registry.on(&EventCategory::Order, l.clone());
        registry.on(&EventCategory::Order, l.clone());

        assert!(registry.off(&EventCategory::Order, &l));
        assert_eq!(registry.count(&EventCategory::Order), 1);

        registry.dispatch(&order_event());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_unregistered_is_noop() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let l = counting(&counter);
        registry.on(&EventCategory::Order, l.clone());

        assert!(registry.off(&EventCategory::Order, &l));
        assert!(!registry.off(&EventCategory::Order, &l));
        assert!(!registry.off(&EventCategory::Custom("nope".into()), &l));
    }

    #[test]
    fn listener_removing_itself_mid_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let self_removing = {
            let registry = registry.clone();
            let slot = slot.clone();
            listener(move |_| {
                if let Some(me) = slot.lock().unwrap().as_ref() {
                    registry.off(&EventCategory::Order, me);
                }
                Ok(())
            })
        };
        *slot.lock().unwrap() = Some(self_removing.clone());

        registry.on(&EventCategory::Order, self_removing);
        registry.on(&EventCategory::Order, counting(&counter));

        let report = registry.dispatch(&order_event());
        assert_eq!(report.invoked, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count(&EventCategory::Order), 1);
    }

    #[test]
    fn dispatch_only_reaches_matching_category() {
        let registry = ListenerRegistry::new();
        let alerts = Arc::new(AtomicUsize::new(0));
        registry.on(&EventCategory::Alert, counting(&alerts));

        let report = registry.dispatch(&order_event());

        assert_eq!(report.invoked, 0);
        assert_eq!(alerts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_categories_are_created_on_demand() {
        let registry = ListenerRegistry::new();
        let custom = EventCategory::Custom("mesas".into());
        assert!(!registry.has_category(&custom));

        registry.on(&custom, listener(|_| Ok(())));
        assert_eq!(registry.count(&custom), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn off_removes_exactly_one(copies in 1usize..8, others in 0usize..4) {
                let registry = ListenerRegistry::new();
                let target = listener(|_| Ok(()));
                for _ in 0..copies {
                    registry.on(&EventCategory::Alert, target.clone());
                }
                for _ in 0..others {
                    registry.on(&EventCategory::Alert, listener(|_| Ok(())));
                }

                prop_assert!(registry.off(&EventCategory::Alert, &target));
                prop_assert_eq!(registry.count(&EventCategory::Alert), copies - 1 + others);
            }
        }
    }
}
