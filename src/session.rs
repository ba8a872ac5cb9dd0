//! The reactive controller bound to one data-entry session.
//!
//! A [`FormSession`] owns one path store, a result cache, and a subscriber
//! registry. All mutation flows through it; every logical mutation produces
//! at most one batched change event, dispatched synchronously to subscribers
//! in registration order. The registry is owned by the session and passed by
//! handle to every field binding, so concurrent sessions stay fully
//! isolated.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace};
use serde_json::Value;

use crate::compile::{build_items, compile_into, ResultMap};
use crate::context::{Env, RuleCtx};
use crate::fields::{FieldDescriptor, Schema};
use crate::items::DataItem;
use crate::mode::{apply_scope, cascade, FieldSetState, Mode};
use crate::outcome::FieldResult;
use crate::path::resolve_relative;
use crate::store::{PathStore, StoreError};

/// One value change within a batched event.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub path: String,
    pub value: Value,
}

/// One result-cache change within a batched event. `None` clears the path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDelta {
    pub path: String,
    pub result: Option<FieldResult>,
}

/// Typed change events dispatched to subscribers.
///
/// Events carry explicit deltas where a partial update happened; for the
/// whole-session events (`Refresh`, `Validation`, `DepsChange`) subscribers
/// re-read current state through the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Session (re)initialization: new store contents and a full result map.
    Refresh,
    /// The externally supplied dependency context changed.
    DepsChange,
    /// Explicit value changes.
    Value { deltas: Vec<Delta> },
    /// A mutation that also produced its own re-validated result.
    ValueResult {
        deltas: Vec<Delta>,
        results: Vec<ResultDelta>,
    },
    /// Result-cache-only changes.
    Result { results: Vec<ResultDelta> },
    /// A forced full validation replaced the whole result cache.
    Validation,
}

/// Handle returned by [`FormSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Optional metadata a subscriber registers with (the field it renders).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub path: String,
}

/// When a field binding runs its validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidateTrigger {
    /// Validate on every change.
    #[default]
    Change,
    /// Validate only on forced full validation (submit).
    Submit,
}

struct Subscriber {
    id: SubscriptionId,
    callback: Rc<dyn Fn(&ChangeEvent)>,
    mount: Option<MountInfo>,
}

struct Inner {
    schema: Schema,
    store: PathStore,
    original: Value,
    results: ResultMap,
    deps: Value,
    env: Env,
    items: Vec<DataItem>,
    field_set: FieldSetState,
    busy: bool,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

/// The runtime object bound to one data-entry session.
///
/// Cheap to clone; clones share the same session state. Single-threaded by
/// design: all mutation and subscriber notification happens synchronously
/// within the call that triggered it.
#[derive(Clone)]
pub struct FormSession {
    inner: Rc<RefCell<Inner>>,
}

impl FormSession {
    /// Start a session from a schema and raw nested input data.
    pub fn new(schema: Schema, raw: Value, deps: Value, env: Env) -> Self {
        Self::with_store(schema, PathStore::from_value(raw), deps, env)
    }

    /// Start a session from a flat multi-valued pair list (e.g. a decoded
    /// form submission).
    pub fn from_flat_pairs<I, K>(
        schema: Schema,
        pairs: I,
        deps: Value,
        env: Env,
    ) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        Ok(Self::with_store(
            schema,
            PathStore::from_flat_pairs(pairs)?,
            deps,
            env,
        ))
    }

    fn with_store(schema: Schema, mut store: PathStore, deps: Value, env: Env) -> Self {
        let original = store.data().clone();
        let results = compile_into(&schema, &mut store, &deps, &env);
        let items = build_items(&schema);
        debug!(
            "session start: {} items, {} initial results",
            items.len(),
            results.len()
        );
        Self {
            inner: Rc::new(RefCell::new(Inner {
                schema,
                store,
                original,
                results,
                deps,
                env,
                items,
                field_set: FieldSetState::default(),
                busy: false,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    // --- reads ---

    pub fn get_value(&self, path: &str) -> Option<Value> {
        self.inner.borrow().store.get(path).cloned()
    }

    pub fn get_result(&self, path: &str) -> Option<FieldResult> {
        self.inner.borrow().results.get(path).cloned()
    }

    /// The current nested data graph.
    pub fn data(&self) -> Value {
        self.inner.borrow().store.data().clone()
    }

    /// The current result cache.
    pub fn results(&self) -> ResultMap {
        self.inner.borrow().results.clone()
    }

    pub fn has_error(&self) -> bool {
        self.inner
            .borrow()
            .results
            .values()
            .any(FieldResult::is_error)
    }

    /// The session's data item tree (one item per top-level member).
    pub fn items(&self) -> Vec<DataItem> {
        self.inner.borrow().items.clone()
    }

    pub fn dependency_context(&self) -> Value {
        self.inner.borrow().deps.clone()
    }

    pub fn descriptor_at(&self, path: &str) -> Option<Rc<FieldDescriptor>> {
        self.inner.borrow().schema.descriptor_at(path)
    }

    /// Paths of all subscribers that registered mount metadata.
    pub fn mounted_paths(&self) -> Vec<String> {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter_map(|s| s.mount.as_ref().map(|m| m.path.clone()))
            .collect()
    }

    // --- writes ---

    /// Write a value through the store. Emits one value-change event when
    /// the value actually changed; a no-op write emits nothing.
    ///
    /// Callers are responsible for having already run the field's parser
    /// (the field binding does).
    pub fn set_value(&self, path: &str, value: Value) -> bool {
        let changed = self.inner.borrow_mut().store.set(path, value.clone());
        if changed {
            self.dispatch(&ChangeEvent::Value {
                deltas: vec![Delta {
                    path: path.to_string(),
                    value,
                }],
            });
        }
        changed
    }

    /// Write many values as one logical mutation: one batched event listing
    /// only the deltas that actually changed.
    pub fn set_values<I, K>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut deltas = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            for (path, value) in items {
                if inner.store.set(path.as_ref(), value.clone()) {
                    deltas.push(Delta {
                        path: path.as_ref().to_string(),
                        value,
                    });
                }
            }
        }
        if deltas.is_empty() {
            return false;
        }
        self.dispatch(&ChangeEvent::Value { deltas });
        true
    }

    /// Update one cached result. Change detection compares severity and
    /// code, never identity. Emits a result-change event when it differed.
    pub fn set_result(&self, path: &str, result: Option<FieldResult>) -> bool {
        let changed = self.set_result_silent(path, result.clone());
        if changed {
            self.dispatch(&ChangeEvent::Result {
                results: vec![ResultDelta {
                    path: path.to_string(),
                    result,
                }],
            });
        }
        changed
    }

    /// Batch form of [`set_result`](Self::set_result): one event for the
    /// deltas that differed.
    pub fn set_results(&self, batch: Vec<ResultDelta>) -> bool {
        let mut changed = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            for delta in batch {
                if apply_result(&mut inner.results, &delta.path, delta.result.clone()) {
                    changed.push(delta);
                }
            }
        }
        if changed.is_empty() {
            return false;
        }
        self.dispatch(&ChangeEvent::Result { results: changed });
        true
    }

    /// Atomic value + result update for one field: a mutation whose own
    /// re-validation is part of the same logical change. One combined event.
    pub fn set_value_and_result(
        &self,
        path: &str,
        value: Value,
        result: Option<FieldResult>,
    ) -> bool {
        self.set_values_and_results(
            vec![(path.to_string(), value)],
            vec![ResultDelta {
                path: path.to_string(),
                result,
            }],
        )
    }

    /// Batch form of [`set_value_and_result`](Self::set_value_and_result).
    pub fn set_values_and_results(
        &self,
        values: Vec<(String, Value)>,
        results: Vec<ResultDelta>,
    ) -> bool {
        let mut deltas = Vec::new();
        let mut result_deltas = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            for (path, value) in values {
                if inner.store.set(&path, value.clone()) {
                    deltas.push(Delta { path, value });
                }
            }
            for delta in results {
                if apply_result(&mut inner.results, &delta.path, delta.result.clone()) {
                    result_deltas.push(delta);
                }
            }
        }
        if deltas.is_empty() && result_deltas.is_empty() {
            return false;
        }
        self.dispatch(&ChangeEvent::ValueResult {
            deltas,
            results: result_deltas,
        });
        true
    }

    /// Force a full second-pass validation over the current store contents
    /// (submit). Replaces the entire result cache and emits a validation
    /// event. Returns `has_error`.
    pub fn validate_all(&self) -> bool {
        let has_error = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.results = compile_into(&inner.schema, &mut inner.store, &inner.deps, &inner.env);
            inner.results.values().any(FieldResult::is_error)
        };
        self.dispatch(&ChangeEvent::Validation);
        has_error
    }

    /// Restore the store from the session's original input and replay a
    /// full-refresh event.
    pub fn reset(&self) {
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.store = PathStore::from_value(inner.original.clone());
            inner.results = compile_into(&inner.schema, &mut inner.store, &inner.deps, &inner.env);
        }
        self.dispatch(&ChangeEvent::Refresh);
    }

    /// Replace the externally supplied dependency context. Emits a
    /// dependency-context event when it actually differed.
    pub fn set_dependency_context(&self, deps: Value) -> bool {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            if inner.deps == deps {
                false
            } else {
                inner.deps = deps;
                true
            }
        };
        if changed {
            self.dispatch(&ChangeEvent::DepsChange);
        }
        changed
    }

    /// Set the enclosing field-set scope flags (mode flooring only).
    pub fn set_field_set(&self, field_set: FieldSetState) {
        self.inner.borrow_mut().field_set = field_set;
    }

    /// Set the session busy flag (submitting/loading; mode flooring only).
    pub fn set_busy(&self, busy: bool) {
        self.inner.borrow_mut().busy = busy;
    }

    // --- subscriptions ---

    /// Register a change subscriber. Dispatch is synchronous and in
    /// registration order.
    pub fn subscribe(
        &self,
        callback: impl Fn(&ChangeEvent) + 'static,
        mount: Option<MountInfo>,
    ) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscribers.push(Subscriber {
            id,
            callback: Rc::new(callback),
            mount,
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.retain(|s| s.id != id);
    }

    // --- mode / required resolution ---

    /// A field's effective mode: its own mode function cascaded with its
    /// ancestor chain, then floored by field-set scope and busy state.
    pub fn effective_mode(&self, path: &str) -> Mode {
        let inner = self.inner.borrow();
        let chain = inner.schema.chain(path);
        let Some(((own_path, own_desc), ancestors)) = chain.split_last() else {
            return apply_scope(Mode::Enabled, inner.field_set, inner.busy);
        };
        let null = Value::Null;
        let mode_of = |p: &str, d: &Rc<FieldDescriptor>| {
            let value = inner.store.get(p).unwrap_or(&null);
            d.mode_in(&RuleCtx {
                path: p,
                value,
                data: inner.store.data(),
                deps: &inner.deps,
                env: &inner.env,
            })
        };
        let own = mode_of(own_path, own_desc);
        let structural = cascade(own, ancestors.iter().rev().map(|(p, d)| mode_of(p, d)));
        apply_scope(structural, inner.field_set, inner.busy)
    }

    /// Evaluate a field's required predicate against current data.
    pub fn is_required(&self, path: &str) -> bool {
        let Some(descriptor) = self.descriptor_at(path) else {
            return false;
        };
        let inner = self.inner.borrow();
        let null = Value::Null;
        let value = inner.store.get(path).unwrap_or(&null);
        descriptor.is_required(&RuleCtx {
            path,
            value,
            data: inner.store.data(),
            deps: &inner.deps,
            env: &inner.env,
        })
    }

    // --- internals shared with field bindings ---

    pub(crate) fn set_value_silent(&self, path: &str, value: Value) -> bool {
        self.inner.borrow_mut().store.set(path, value)
    }

    pub(crate) fn set_result_silent(&self, path: &str, result: Option<FieldResult>) -> bool {
        apply_result(&mut self.inner.borrow_mut().results, path, result)
    }

    /// Run a descriptor's validator chain against the current store state.
    pub(crate) fn validate_path(
        &self,
        path: &str,
        descriptor: &FieldDescriptor,
    ) -> Option<FieldResult> {
        let inner = self.inner.borrow();
        let null = Value::Null;
        let value = inner.store.get(path).unwrap_or(&null);
        descriptor.validate(&RuleCtx {
            path,
            value,
            data: inner.store.data(),
            deps: &inner.deps,
            env: &inner.env,
        })
    }

    /// Notify subscribers, in registration order, without holding the
    /// session borrow (callbacks re-enter the session).
    pub(crate) fn dispatch(&self, event: &ChangeEvent) {
        trace!("dispatch {:?}", event);
        let callbacks: Vec<Rc<dyn Fn(&ChangeEvent)>> = self
            .inner
            .borrow()
            .subscribers
            .iter()
            .map(|s| Rc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

fn apply_result(results: &mut ResultMap, path: &str, result: Option<FieldResult>) -> bool {
    match result {
        Some(result) => {
            if results.get(path) == Some(&result) {
                false
            } else {
                results.insert(path.to_string(), result);
                true
            }
        }
        None => results.remove(path).is_some(),
    }
}

/// True when a change at `changed` affects the value visible at `watched`
/// (same path, a descendant write, or an ancestor rewrite).
fn paths_touch(watched: &str, changed: &str) -> bool {
    if watched == changed {
        return true;
    }
    let is_prefix = |shorter: &str, longer: &str| {
        longer.len() > shorter.len()
            && longer.starts_with(shorter)
            && matches!(longer.as_bytes()[shorter.len()], b'.' | b'[')
    };
    is_prefix(watched, changed) || is_prefix(changed, watched)
}

// ---------------------------------------------------------------------------
// Field binding
// ---------------------------------------------------------------------------

struct BindingState {
    path: String,
    descriptor: Rc<FieldDescriptor>,
    dep_paths: Vec<String>,
    trigger: ValidateTrigger,
    value: Value,
    result: Option<FieldResult>,
}

/// The per-leaf subscription logic a UI field installs on activation.
///
/// On mount it resolves the descriptor's declared refs against its own path
/// into an absolute dependency set. Own-path value events re-run the parser
/// (and, with [`ValidateTrigger::Change`], the validator); dependency-path
/// events re-run only the validator and refresh mode/required; result-only
/// and full-validation events just refresh the cached result. A recomputed
/// result is pushed to the shared cache only when it differs, which keeps
/// dependency fan-out from triggering event storms.
pub struct FieldBinding {
    session: FormSession,
    state: Rc<RefCell<BindingState>>,
    subscription: SubscriptionId,
}

impl FieldBinding {
    /// Activate a binding for one schema path. Returns `None` when the
    /// schema declares no field there.
    pub fn mount(session: &FormSession, path: &str, trigger: ValidateTrigger) -> Option<Self> {
        let descriptor = session.descriptor_at(path)?;
        let dep_paths = descriptor
            .dependencies()
            .iter()
            .map(|r| resolve_relative(path, r))
            .collect();
        let state = Rc::new(RefCell::new(BindingState {
            path: path.to_string(),
            descriptor,
            dep_paths,
            trigger,
            value: session.get_value(path).unwrap_or(Value::Null),
            result: session.get_result(path),
        }));

        let cb_state = Rc::clone(&state);
        let cb_session = session.clone();
        let subscription = session.subscribe(
            move |event| handle_event(&cb_state, &cb_session, event),
            Some(MountInfo {
                path: path.to_string(),
            }),
        );

        Some(Self {
            session: session.clone(),
            state,
            subscription,
        })
    }

    pub fn path(&self) -> String {
        self.state.borrow().path.clone()
    }

    /// The locally cached (normalized) value.
    pub fn value(&self) -> Value {
        self.state.borrow().value.clone()
    }

    /// The locally cached result.
    pub fn result(&self) -> Option<FieldResult> {
        self.state.borrow().result.clone()
    }

    /// Effective mode, recomputed against current data.
    pub fn mode(&self) -> Mode {
        self.session.effective_mode(&self.state.borrow().path)
    }

    /// Required-ness, recomputed against current data.
    pub fn required(&self) -> bool {
        self.session.is_required(&self.state.borrow().path)
    }

    /// The absolute dependency set (declared refs plus custom refs).
    pub fn dependency_paths(&self) -> Vec<String> {
        self.state.borrow().dep_paths.clone()
    }

    /// Register an additional dependency at runtime (used when a dynamic
    /// constraint declares it reads another named field).
    pub fn add_ref(&self, reference: &str) {
        let mut state = self.state.borrow_mut();
        let absolute = resolve_relative(&state.path, reference);
        if !state.dep_paths.contains(&absolute) {
            state.dep_paths.push(absolute);
        }
    }

    /// UI edit entry point: parse the raw input, validate per trigger, and
    /// commit value + result as one combined event. A no-op edit emits
    /// nothing.
    pub fn input(&self, raw: Value) -> bool {
        let (path, descriptor, trigger) = {
            let state = self.state.borrow();
            (
                state.path.clone(),
                Rc::clone(&state.descriptor),
                state.trigger,
            )
        };
        let parsed = descriptor.parse(Some(&raw));
        let value = parsed.value.clone().unwrap_or(Value::Null);
        let value_changed = self.session.set_value_silent(&path, value.clone());
        let result = if parsed.error.is_some() {
            parsed.error
        } else if trigger == ValidateTrigger::Change {
            self.session.validate_path(&path, &descriptor)
        } else {
            None
        };
        let result_changed = self.session.set_result_silent(&path, result.clone());
        {
            let mut state = self.state.borrow_mut();
            state.value = value.clone();
            state.result = result.clone();
        }
        if !value_changed && !result_changed {
            return false;
        }
        let deltas = if value_changed {
            vec![Delta {
                path: path.clone(),
                value,
            }]
        } else {
            Vec::new()
        };
        let results = if result_changed {
            vec![ResultDelta { path, result }]
        } else {
            Vec::new()
        };
        self.session
            .dispatch(&ChangeEvent::ValueResult { deltas, results });
        true
    }

    /// Release the subscription.
    pub fn release(self) {
        self.session.unsubscribe(self.subscription);
    }
}

fn handle_event(state: &Rc<RefCell<BindingState>>, session: &FormSession, event: &ChangeEvent) {
    match event {
        ChangeEvent::Value { deltas } => on_value_deltas(state, session, deltas),
        ChangeEvent::ValueResult { deltas, results } => {
            refresh_result_if_touched(state, results);
            on_value_deltas(state, session, deltas);
        }
        ChangeEvent::Result { results } => refresh_result_if_touched(state, results),
        ChangeEvent::Refresh | ChangeEvent::Validation => {
            let path = state.borrow().path.clone();
            let value = session.get_value(&path).unwrap_or(Value::Null);
            let result = session.get_result(&path);
            let mut state = state.borrow_mut();
            state.value = value;
            state.result = result;
        }
        ChangeEvent::DepsChange => revalidate(state, session),
    }
}

fn on_value_deltas(state: &Rc<RefCell<BindingState>>, session: &FormSession, deltas: &[Delta]) {
    let (path, descriptor, trigger, touches_own, touches_dep) = {
        let s = state.borrow();
        let touches_own = deltas.iter().any(|d| paths_touch(&s.path, &d.path));
        let touches_dep = deltas
            .iter()
            .any(|d| s.dep_paths.iter().any(|dep| paths_touch(dep, &d.path)));
        (
            s.path.clone(),
            Rc::clone(&s.descriptor),
            s.trigger,
            touches_own,
            touches_dep,
        )
    };

    if touches_own {
        // own value changed: re-run the parser, normalize in place, and
        // validate per the trigger setting
        let raw = session.get_value(&path);
        let parsed = descriptor.parse(raw.as_ref());
        let value = parsed.value.clone().unwrap_or(Value::Null);
        if raw.as_ref() != Some(&value) {
            session.set_value_silent(&path, value.clone());
        }
        let result = if parsed.error.is_some() {
            parsed.error
        } else if trigger == ValidateTrigger::Change {
            session.validate_path(&path, &descriptor)
        } else {
            state.borrow().result.clone()
        };
        {
            let mut s = state.borrow_mut();
            s.value = value;
            s.result = result.clone();
        }
        // push to the shared cache only when it differs (suppression)
        session.set_result(&path, result);
    } else if touches_dep {
        revalidate(state, session);
    }
}

/// Dependency or context change: re-run only the validator against the
/// current value; the parser is not re-run.
fn revalidate(state: &Rc<RefCell<BindingState>>, session: &FormSession) {
    let (path, descriptor) = {
        let s = state.borrow();
        (s.path.clone(), Rc::clone(&s.descriptor))
    };
    let result = session.validate_path(&path, &descriptor);
    state.borrow_mut().result = result.clone();
    session.set_result(&path, result);
}

fn refresh_result_if_touched(state: &Rc<RefCell<BindingState>>, results: &[ResultDelta]) {
    let mut s = state.borrow_mut();
    for delta in results {
        if delta.path == s.path {
            s.result = delta.result.clone();
        }
    }
}
