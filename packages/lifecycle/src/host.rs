//! In-memory component host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use buffer_search_presenter::ResultPresenter;

use crate::{ComponentHandle, ComponentHost, ComponentProps, ComponentRef};

#[derive(Default)]
struct Registry {
    next_id: AtomicUsize,
    live: Mutex<Vec<(String, ResultPresenter)>>,
}

/// [`ComponentHost`] that keeps displayed components in a list.
#[derive(Default, Clone)]
pub struct HeadlessHost {
    registry: Arc<Registry>,
}

impl HeadlessHost {
    /// Number of components currently displayed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.registry
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of display requests ever made.
    #[must_use]
    pub fn display_count(&self) -> usize {
        self.registry.next_id.load(Ordering::SeqCst)
    }

    /// Presenter of the most recently displayed live component.
    #[must_use]
    pub fn presenter(&self) -> Option<ResultPresenter> {
        self.registry
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(_, presenter)| presenter.clone())
    }
}

impl ComponentHost for HeadlessHost {
    fn display(&self, component: &ComponentRef, props: ComponentProps) -> Box<dyn ComponentHandle> {
        let n = self.registry.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{component}#{n}");
        log::debug!("Displaying {id} for layer '{}'", props.layer_id);
        self.registry
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id.clone(), props.presenter));
        Box::new(HeadlessHandle {
            id,
            registry: Arc::clone(&self.registry),
        })
    }
}

struct HeadlessHandle {
    id: String,
    registry: Arc<Registry>,
}

impl ComponentHandle for HeadlessHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn dispose(self: Box<Self>) {
        self.registry
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}
