//! Per-method component instances.
//!
//! A component combines a schema-typed props/state cell with a one-shot
//! return cell and a single observer slot. State only ever enters through
//! its validator; once the return cell is set it is frozen and later state
//! writes are ignored.

use crate::error::IoError;
use crate::method::{self, MethodDef, MethodName};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

/// Recomputes props from freshly received state, e.g. running a search
/// handler over a new query.
pub type StateChangeHook =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Single observer slot; re-registration replaces.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

struct Cell {
    props: Value,
    state: Value,
    returned: bool,
    return_tx: Option<oneshot::Sender<Value>>,
    return_rx: Option<oneshot::Receiver<Value>>,
    observer: Option<Observer>,
}

pub struct IoComponent {
    def: MethodDef,
    label: String,
    on_state_change: Option<StateChangeHook>,
    cell: Mutex<Cell>,
}

impl IoComponent {
    /// Build a component, validating `initial_props` when present.
    pub fn new(
        method: MethodName,
        label: impl Into<String>,
        initial_props: Value,
        on_state_change: Option<StateChangeHook>,
    ) -> Result<Self, IoError> {
        let def = method::lookup(method);
        let props = (def.props)(initial_props).map_err(IoError::Schema)?;
        let (return_tx, return_rx) = oneshot::channel();
        Ok(Self {
            def,
            label: label.into(),
            on_state_change,
            cell: Mutex::new(Cell {
                props,
                state: Value::Null,
                returned: false,
                return_tx: Some(return_tx),
                return_rx: Some(return_rx),
                observer: None,
            }),
        })
    }

    pub fn method(&self) -> MethodName {
        self.def.name
    }

    pub fn is_exclusive(&self) -> bool {
        self.def.exclusive
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn props(&self) -> Value {
        self.cell.lock().await.props.clone()
    }

    pub async fn state(&self) -> Value {
        self.cell.lock().await.state.clone()
    }

    /// Accept new state through the validator. With a state hook
    /// registered, props are recomputed from the new state; without one, a
    /// non-null state logs a diagnostic but still lands.
    pub async fn set_state(&self, new_state: Value) -> Result<(), IoError> {
        let state = (self.def.state)(new_state).map_err(IoError::Schema)?;
        {
            let mut cell = self.cell.lock().await;
            if cell.returned {
                debug!(method = %self.def.name, "ignoring state write after return");
                return Ok(());
            }
            cell.state = state.clone();
        }
        match &self.on_state_change {
            Some(hook) => {
                let props = hook(state).await.map_err(IoError::Schema)?;
                let props = (self.def.props)(props).map_err(IoError::Schema)?;
                self.cell.lock().await.props = props;
            }
            None => {
                if !state.is_null() {
                    warn!(
                        method = %self.def.name,
                        "received state but no state handler is registered"
                    );
                }
            }
        }
        self.notify().await;
        Ok(())
    }

    /// Replace props outright and notify the observer.
    pub async fn set_props(&self, props: Value) -> Result<(), IoError> {
        let props = (self.def.props)(props).map_err(IoError::Schema)?;
        self.cell.lock().await.props = props;
        self.notify().await;
        Ok(())
    }

    /// Resolve the return cell with a validated value. At most one call
    /// wins; later calls are no-ops.
    pub async fn set_return_value(&self, raw: Value) -> Result<(), IoError> {
        let canonical = (self.def.returns)(raw).map_err(IoError::Schema)?;
        let mut cell = self.cell.lock().await;
        match cell.return_tx.take() {
            Some(tx) => {
                cell.returned = true;
                let _ = tx.send(canonical);
            }
            None => debug!(method = %self.def.name, "return value already set"),
        }
        Ok(())
    }

    /// Install the observer, replacing any previous registration.
    pub async fn set_observer(&self, observer: Observer) {
        self.cell.lock().await.observer = Some(observer);
    }

    /// Hand out the receiving half of the return cell. Consumed once.
    pub async fn take_return_receiver(&self) -> Option<oneshot::Receiver<Value>> {
        self.cell.lock().await.return_rx.take()
    }

    async fn notify(&self) {
        let observer = self.cell.lock().await.observer.clone();
        if let Some(observer) = observer {
            observer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn text_component() -> IoComponent {
        IoComponent::new(MethodName::InputText, "name", Value::Null, None).unwrap()
    }

    #[tokio::test]
    async fn return_cell_resolves_at_most_once() {
        let component = text_component();
        let rx = component.take_return_receiver().await.unwrap();

        component.set_return_value(json!("first")).await.unwrap();
        component.set_return_value(json!("second")).await.unwrap();

        assert_eq!(rx.await.unwrap(), json!("first"));
    }

    #[tokio::test]
    async fn state_after_return_is_ignored() {
        let component = text_component();
        component.set_return_value(json!("done")).await.unwrap();
        component.set_state(json!("late")).await.unwrap();
        assert_eq!(component.state().await, Value::Null);
    }

    #[tokio::test]
    async fn invalid_initial_props_are_rejected() {
        let result = IoComponent::new(MethodName::InputText, "name", json!("not an object"), None);
        assert!(matches!(result, Err(IoError::Schema(_))));
    }

    #[tokio::test]
    async fn return_value_goes_through_the_schema() {
        let component = IoComponent::new(MethodName::InputNumber, "age", Value::Null, None).unwrap();
        assert!(matches!(
            component.set_return_value(json!("nan")).await,
            Err(IoError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn state_hook_reshapes_props() {
        let hook: StateChangeHook = Arc::new(|state| {
            Box::pin(async move { Ok(json!({"results": [state.as_str().unwrap_or("").len()]})) })
        });
        let component =
            IoComponent::new(MethodName::Search, "users", json!({"results": []}), Some(hook))
                .unwrap();
        component.set_state(json!("abc")).await.unwrap();
        assert_eq!(component.props().await, json!({"results": [3]}));
    }

    #[tokio::test]
    async fn observer_fires_on_state_and_props_and_replaces() {
        let component = text_component();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        component
            .set_observer(Arc::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }))
            .await;
        component.set_state(Value::Null).await.unwrap();
        component.set_props(json!({})).await.unwrap();
        assert_eq!(first.load(Ordering::Relaxed), 2);

        let counter = second.clone();
        component
            .set_observer(Arc::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }))
            .await;
        component.set_props(json!({})).await.unwrap();
        assert_eq!(first.load(Ordering::Relaxed), 2);
        assert_eq!(second.load(Ordering::Relaxed), 1);
    }
}
