//! Open-ended enumerations whose members can grow at runtime.
//!
//! A [`DynaEnum`] behaves like a closed enum for the values declared in code
//! (`register_static`), but [`DynaEnum::resolve`] also accepts names it has
//! never seen: such names become new members on the spot and every listener is
//! told about them. This lets persisted data from older or newer
//! configurations, or free text typed by a user, round-trip without a code
//! change.
//!
//! Because `resolve` fabricates members, it grows the table without bound when
//! fed arbitrary strings. Callers must only pass names from a bounded source
//! (configuration files, saved data, a fixed UI list).
//!
//! # Concurrency
//!
//! The registry is meant to be shared process-wide. Writers serialize on an
//! internal mutex; readers load an immutable snapshot through [`ArcSwap`] and
//! therefore never block and never see a half-built value.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::text::fold;

/// How a value came to exist in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueOrigin {
    /// Declared by code or configuration via `register_static`.
    Declared,
    /// Fabricated by `resolve` from a previously unknown name.
    Discovered,
}

/// One member of a [`DynaEnum`].
///
/// Values are immutable once published. Two values are equal when their
/// symbolic names are equal.
#[derive(Debug)]
pub struct DynaEnumValue {
    name: String,
    ordinal: usize,
    title: Option<String>,
    pattern: Option<String>,
    origin: ValueOrigin,
}

impl DynaEnumValue {
    /// Symbolic name, unique within the registry (e.g. `"BLURAY"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordinal assigned at creation; defines the default display order.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Display title, if any (e.g. `"Bluray"`).
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Raw matcher pattern (an alternation such as `bluray|bdrip`), if any.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn origin(&self) -> ValueOrigin {
        self.origin
    }
}

impl PartialEq for DynaEnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DynaEnumValue {}

impl Hash for DynaEnumValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for DynaEnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title.as_deref().unwrap_or(&self.name))
    }
}

impl Serialize for DynaEnumValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Notification sent to listeners when the registry changes.
#[derive(Debug, Clone)]
pub enum DynaEnumEvent {
    /// A new value was created (declared or discovered).
    Added(Arc<DynaEnumValue>),
    /// A previously discovered value was replaced by a declaration of the
    /// same name.
    Declared(Arc<DynaEnumValue>),
}

impl DynaEnumEvent {
    pub fn value(&self) -> &Arc<DynaEnumValue> {
        match self {
            Self::Added(v) | Self::Declared(v) => v,
        }
    }
}

/// Handle returned by [`DynaEnum::add_listener`], used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&DynaEnumEvent) + Send + Sync>;

#[derive(Clone, Default)]
struct Snapshot {
    by_name: HashMap<String, Arc<DynaEnumValue>>,
    /// Sorted by display title (locale comparator, titleless last).
    sorted: Vec<Arc<DynaEnumValue>>,
}

impl Snapshot {
    fn with(&self, value: Arc<DynaEnumValue>) -> Self {
        let mut next = self.clone();
        next.by_name.insert(value.name.clone(), value);
        next.sorted = next.by_name.values().cloned().collect();
        next.sorted.sort_by(|a, b| compare_titles(a, b));
        next
    }

    fn lookup(&self, name: &str) -> Option<&Arc<DynaEnumValue>> {
        if let Some(value) = self.by_name.get(name) {
            return Some(value);
        }
        // Same order as `values()` so the result is deterministic when two
        // titles only differ by case.
        self.sorted.iter().find(|v| {
            v.title
                .as_deref()
                .is_some_and(|title| title.eq_ignore_ascii_case(name) || fold(title) == fold(name))
        })
    }
}

/// An open-ended enumeration registry.
pub struct DynaEnum {
    family: &'static str,
    snap: ArcSwap<Snapshot>,
    write: Mutex<()>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl DynaEnum {
    /// Create an empty registry. `family` names it in logs (e.g. `"media_source"`).
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            snap: ArcSwap::from_pointee(Snapshot::default()),
            write: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Declare a value.
    ///
    /// Declaring a name that is already declared returns the existing value
    /// unchanged. Declaring a name that was previously *discovered* through
    /// [`resolve`](Self::resolve) replaces it with the declaration (keeping
    /// the discovered ordinal) and emits [`DynaEnumEvent::Declared`].
    pub fn register_static(
        &self,
        name: &str,
        ordinal: usize,
        title: Option<&str>,
        pattern: Option<&str>,
    ) -> Arc<DynaEnumValue> {
        self.declare_value(name, Some(ordinal), title, pattern)
    }

    /// Declare a value at the next free ordinal.
    ///
    /// Same as [`register_static`](Self::register_static), except the
    /// ordinal is the member count taken under the write lock, so
    /// concurrent declarations never share one.
    pub fn register_next(
        &self,
        name: &str,
        title: Option<&str>,
        pattern: Option<&str>,
    ) -> Arc<DynaEnumValue> {
        self.declare_value(name, None, title, pattern)
    }

    fn declare_value(
        &self,
        name: &str,
        ordinal: Option<usize>,
        title: Option<&str>,
        pattern: Option<&str>,
    ) -> Arc<DynaEnumValue> {
        let event = {
            let _guard = self.write.lock();
            let current = self.snap.load_full();
            let ordinal = ordinal.unwrap_or(current.by_name.len());

            let (value, event) = match current.by_name.get(name) {
                Some(existing) if existing.origin == ValueOrigin::Declared => {
                    return existing.clone();
                }
                Some(existing) => {
                    let value = Arc::new(DynaEnumValue {
                        name: name.to_string(),
                        ordinal: existing.ordinal,
                        title: title.map(str::to_string),
                        pattern: pattern.filter(|p| !p.trim().is_empty()).map(str::to_string),
                        origin: ValueOrigin::Declared,
                    });
                    (value.clone(), DynaEnumEvent::Declared(value))
                }
                None => {
                    let value = Arc::new(DynaEnumValue {
                        name: name.to_string(),
                        ordinal,
                        title: title.map(str::to_string),
                        pattern: pattern.filter(|p| !p.trim().is_empty()).map(str::to_string),
                        origin: ValueOrigin::Declared,
                    });
                    (value.clone(), DynaEnumEvent::Added(value))
                }
            };

            self.snap.store(Arc::new(current.with(value)));
            event
        };

        self.notify(&event);
        event.value().clone()
    }

    /// Look up a value by exact symbolic name, without fabricating anything.
    pub fn get(&self, name: &str) -> Option<Arc<DynaEnumValue>> {
        self.snap.load().by_name.get(name).cloned()
    }

    /// Look up by exact name, then by case-insensitive title.
    pub fn lookup(&self, name: &str) -> Option<Arc<DynaEnumValue>> {
        self.snap.load().lookup(name).cloned()
    }

    /// Resolve a name to a value, creating it if it is unknown.
    ///
    /// Matching order is exact symbolic name, then case-insensitive display
    /// title. An unknown name becomes a new discovered value with the name as
    /// both symbolic name and title, ordinal equal to the current member
    /// count and no pattern; listeners receive [`DynaEnumEvent::Added`].
    ///
    /// Calling this twice with the same unknown name returns the same value.
    pub fn resolve(&self, name: &str) -> Arc<DynaEnumValue> {
        if let Some(found) = self.lookup(name) {
            return found;
        }

        let value = {
            let _guard = self.write.lock();
            // Another writer may have created it while we waited.
            let current = self.snap.load_full();
            if let Some(found) = current.lookup(name) {
                return found.clone();
            }

            let value = Arc::new(DynaEnumValue {
                name: name.to_string(),
                ordinal: current.by_name.len(),
                title: Some(name.to_string()),
                pattern: None,
                origin: ValueOrigin::Discovered,
            });
            self.snap.store(Arc::new(current.with(value.clone())));
            value
        };

        debug!(
            family = self.family,
            name = %value.name,
            ordinal = value.ordinal,
            "Discovered new enumeration value"
        );
        self.notify(&DynaEnumEvent::Added(value.clone()));
        value
    }

    /// Snapshot of all values, sorted by display title.
    ///
    /// Titles are compared case- and accent-insensitively, with the raw
    /// title as tie-breaker; values without a title sort last.
    pub fn values(&self) -> Vec<Arc<DynaEnumValue>> {
        self.snap.load().sorted.clone()
    }

    /// Snapshot of all values, sorted by ordinal then name.
    pub fn values_by_ordinal(&self) -> Vec<Arc<DynaEnumValue>> {
        let mut values = self.values();
        values.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
        values
    }

    pub fn len(&self) -> usize {
        self.snap.load().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a callback invoked after every change.
    ///
    /// Callbacks run on the thread that made the change, after the new
    /// snapshot is visible and with no registry lock held.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&DynaEnumEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, AtomicOrdering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self, event: &DynaEnumEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for DynaEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynaEnum")
            .field("family", &self.family)
            .field("len", &self.len())
            .finish()
    }
}

/// Locale-aware title comparison: accent- and case-folded first, raw title
/// second, titleless values last.
fn compare_titles(a: &DynaEnumValue, b: &DynaEnumValue) -> Ordering {
    match (a.title.as_deref(), b.title.as_deref()) {
        (None, None) => a.name.cmp(&b.name),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => fold(x)
            .cmp(&fold(y))
            .then_with(|| x.cmp(y))
            .then_with(|| a.name.cmp(&b.name)),
    }
}
