//! Deterministic simulated media backend.
//!
//! Elements load over a configurable latency measured in synthetic
//! milliseconds; nothing progresses until [`SimMediaBackend::advance`] is
//! called. Sources can be made to fail, fail to resolve, or stall and
//! recover on demand. Every element operation is recorded as a
//! [`SimEvent`] so tests can assert on ordering (for example that a swap
//! reveals the incoming element before hiding the outgoing one).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use splice_common::error::{SpliceError, SpliceResult};

use crate::media::{MediaElement, MediaElementFactory, MediaResolver, MediaUri, ReadyState};
use crate::timeline::LaneId;

pub type ElementId = u32;

/// Recorded element operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Created { element: ElementId, lane: LaneId },
    Load { element: ElementId, uri: String },
    Seek { element: ElementId, secs: f64 },
    Play { element: ElementId },
    Pause { element: ElementId },
    Visible { element: ElementId, visible: bool },
    Muted { element: ElementId, muted: bool },
    Cleared { element: ElementId },
    ListenersAttached { element: ElementId, lane: LaneId },
    ListenersDetached { element: ElementId },
}

/// Point-in-time view of one simulated element.
#[derive(Debug, Clone, PartialEq)]
pub struct SimElementSnapshot {
    pub id: ElementId,
    pub lane: LaneId,
    pub uri: Option<String>,
    pub ready_state: ReadyState,
    pub current_time: f64,
    pub paused: bool,
    pub muted: bool,
    pub visible: bool,
    pub has_listeners: bool,
    pub dropped: bool,
}

#[derive(Debug)]
struct ElementState {
    id: ElementId,
    lane: LaneId,
    uri: Option<MediaUri>,
    ready: ReadyState,
    load_elapsed_ms: f64,
    error: Option<String>,
    current_time: f64,
    paused: bool,
    rate: f64,
    muted: bool,
    visible: bool,
    listeners: Option<LaneId>,
    stalled: bool,
    dropped: bool,
}

#[derive(Debug, Default)]
struct Shared {
    default_latency_ms: f64,
    source_latency_ms: HashMap<String, f64>,
    failing: HashSet<String>,
    unresolvable: HashSet<String>,
    stalled: HashSet<String>,
    elements: Vec<Rc<RefCell<ElementState>>>,
    events: Vec<SimEvent>,
    next_id: ElementId,
}

impl Shared {
    fn latency_for(&self, uri: &MediaUri) -> f64 {
        self.source_latency_ms
            .get(uri.as_str())
            .copied()
            .unwrap_or(self.default_latency_ms)
    }
}

/// Handle to the simulated backend. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimMediaBackend {
    shared: Rc<RefCell<Shared>>,
}

impl SimMediaBackend {
    /// Backend whose loads complete instantly.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency_ms(latency_ms: f64) -> Self {
        let backend = Self::new();
        backend.set_latency_ms(latency_ms);
        backend
    }

    pub fn set_latency_ms(&self, latency_ms: f64) {
        self.shared.borrow_mut().default_latency_ms = latency_ms.max(0.0);
    }

    pub fn set_source_latency_ms(&self, source_key: &str, latency_ms: f64) {
        self.shared
            .borrow_mut()
            .source_latency_ms
            .insert(source_key.to_string(), latency_ms.max(0.0));
    }

    /// Loads of `source_key` report a decode error.
    pub fn fail_source(&self, source_key: &str) {
        self.shared.borrow_mut().failing.insert(source_key.to_string());
    }

    /// `source_key` cannot be resolved to a URI.
    pub fn make_unresolvable(&self, source_key: &str) {
        self.shared
            .borrow_mut()
            .unresolvable
            .insert(source_key.to_string());
    }

    /// Elements playing `source_key` drop to metadata-only until recovered.
    pub fn stall_source(&self, source_key: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.stalled.insert(source_key.to_string());
        for element in &shared.elements {
            let mut e = element.borrow_mut();
            if e.uri.as_ref().is_some_and(|u| u.as_str() == source_key) {
                e.stalled = true;
                e.ready = e.ready.min(ReadyState::HaveMetadata);
            }
        }
    }

    pub fn recover_source(&self, source_key: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.stalled.remove(source_key);
        for element in &shared.elements {
            let mut e = element.borrow_mut();
            if e.stalled && e.uri.as_ref().is_some_and(|u| u.as_str() == source_key) {
                e.stalled = false;
                e.ready = ReadyState::HaveEnoughData;
            }
        }
    }

    /// Progress every element by `delta_ms` of synthetic time.
    pub fn advance(&self, delta_ms: f64) {
        if !(delta_ms.is_finite() && delta_ms > 0.0) {
            return;
        }
        let shared = self.shared.borrow();
        for element in &shared.elements {
            let mut e = element.borrow_mut();
            let Some(uri) = e.uri.clone() else {
                continue;
            };
            if e.dropped || e.error.is_some() || e.stalled {
                continue;
            }
            if e.ready < ReadyState::HaveEnoughData {
                e.load_elapsed_ms += delta_ms;
                let latency = shared.latency_for(&uri);
                if e.load_elapsed_ms >= latency {
                    e.ready = ReadyState::HaveEnoughData;
                } else if e.load_elapsed_ms * 2.0 >= latency {
                    e.ready = ReadyState::HaveMetadata;
                }
            }
            if !e.paused && e.ready.can_render() {
                e.current_time += delta_ms / 1000.0 * e.rate;
            }
        }
    }

    pub fn resolver(&self) -> SimResolver {
        SimResolver {
            backend: self.clone(),
        }
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.shared.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.shared.borrow_mut().events.clear();
    }

    /// How many times `source_key` has been loaded into any element.
    pub fn load_count(&self, source_key: &str) -> usize {
        self.shared
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::Load { uri, .. } if uri == source_key))
            .count()
    }

    pub fn elements(&self) -> Vec<SimElementSnapshot> {
        self.shared
            .borrow()
            .elements
            .iter()
            .map(|e| {
                let e = e.borrow();
                SimElementSnapshot {
                    id: e.id,
                    lane: e.lane,
                    uri: e.uri.as_ref().map(|u| u.as_str().to_string()),
                    ready_state: e.ready,
                    current_time: e.current_time,
                    paused: e.paused,
                    muted: e.muted,
                    visible: e.visible,
                    has_listeners: e.listeners.is_some(),
                    dropped: e.dropped,
                }
            })
            .collect()
    }

    /// Elements not yet dropped.
    pub fn live_elements(&self) -> Vec<SimElementSnapshot> {
        self.elements().into_iter().filter(|e| !e.dropped).collect()
    }

    fn record(&self, event: SimEvent) {
        self.shared.borrow_mut().events.push(event);
    }
}

impl MediaElementFactory for SimMediaBackend {
    fn create(&mut self, lane: &LaneId) -> Box<dyn MediaElement> {
        let state = {
            let mut shared = self.shared.borrow_mut();
            let id = shared.next_id;
            shared.next_id += 1;
            let state = Rc::new(RefCell::new(ElementState {
                id,
                lane: *lane,
                uri: None,
                ready: ReadyState::HaveNothing,
                load_elapsed_ms: 0.0,
                error: None,
                current_time: 0.0,
                paused: true,
                rate: 1.0,
                muted: false,
                visible: false,
                listeners: None,
                stalled: false,
                dropped: false,
            }));
            shared.elements.push(Rc::clone(&state));
            shared.events.push(SimEvent::Created { element: id, lane: *lane });
            state
        };
        Box::new(SimElement {
            state,
            backend: self.clone(),
        })
    }
}

/// Resolves every key to itself unless marked unresolvable.
#[derive(Debug, Clone)]
pub struct SimResolver {
    backend: SimMediaBackend,
}

impl MediaResolver for SimResolver {
    fn resolve(&self, source_key: &str) -> SpliceResult<MediaUri> {
        if self
            .backend
            .shared
            .borrow()
            .unresolvable
            .contains(source_key)
        {
            return Err(SpliceError::media_resolution(source_key, "source not found"));
        }
        Ok(MediaUri::new(source_key))
    }
}

/// One simulated decoder.
#[derive(Debug)]
pub struct SimElement {
    state: Rc<RefCell<ElementState>>,
    backend: SimMediaBackend,
}

impl SimElement {
    fn id(&self) -> ElementId {
        self.state.borrow().id
    }
}

impl MediaElement for SimElement {
    fn load(&mut self, uri: &MediaUri) {
        let (fails, stalled, latency) = {
            let shared = self.backend.shared.borrow();
            (
                shared.failing.contains(uri.as_str()),
                shared.stalled.contains(uri.as_str()),
                shared.latency_for(uri),
            )
        };
        {
            let mut e = self.state.borrow_mut();
            e.uri = Some(uri.clone());
            e.load_elapsed_ms = 0.0;
            e.current_time = 0.0;
            e.stalled = stalled;
            e.error = fails.then(|| format!("decode failed: {uri}"));
            e.ready = if !fails && !stalled && latency <= 0.0 {
                ReadyState::HaveEnoughData
            } else {
                ReadyState::HaveNothing
            };
        }
        self.backend.record(SimEvent::Load {
            element: self.id(),
            uri: uri.as_str().to_string(),
        });
    }

    fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready
    }

    fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    fn seek(&mut self, secs: f64) {
        self.state.borrow_mut().current_time = secs;
        self.backend.record(SimEvent::Seek {
            element: self.id(),
            secs,
        });
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn play(&mut self) {
        self.state.borrow_mut().paused = false;
        self.backend.record(SimEvent::Play { element: self.id() });
    }

    fn pause(&mut self) {
        self.state.borrow_mut().paused = true;
        self.backend.record(SimEvent::Pause { element: self.id() });
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state.borrow_mut().rate = rate;
    }

    fn set_muted(&mut self, muted: bool) {
        let changed = {
            let mut e = self.state.borrow_mut();
            let changed = e.muted != muted;
            e.muted = muted;
            changed
        };
        if changed {
            self.backend.record(SimEvent::Muted {
                element: self.id(),
                muted,
            });
        }
    }

    fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    fn set_visible(&mut self, visible: bool) {
        let changed = {
            let mut e = self.state.borrow_mut();
            let changed = e.visible != visible;
            e.visible = visible;
            changed
        };
        if changed {
            self.backend.record(SimEvent::Visible {
                element: self.id(),
                visible,
            });
        }
    }

    fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    fn clear_source(&mut self) {
        {
            let mut e = self.state.borrow_mut();
            e.uri = None;
            e.ready = ReadyState::HaveNothing;
            e.error = None;
            e.stalled = false;
        }
        self.backend.record(SimEvent::Cleared { element: self.id() });
    }

    fn attach_listeners(&mut self, lane: &LaneId) {
        self.state.borrow_mut().listeners = Some(*lane);
        self.backend.record(SimEvent::ListenersAttached {
            element: self.id(),
            lane: *lane,
        });
    }

    fn detach_listeners(&mut self) {
        let had = self.state.borrow_mut().listeners.take().is_some();
        if had {
            self.backend
                .record(SimEvent::ListenersDetached { element: self.id() });
        }
    }
}

impl Drop for SimElement {
    fn drop(&mut self) {
        self.state.borrow_mut().dropped = true;
    }
}
