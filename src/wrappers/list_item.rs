//! # List-Item Views
//!
//! Borrowed wrappers over native list-widget items. The containing widget
//! owns every item; a wrapper is only a typed view, so it always attaches
//! with [`Ownership::Borrowed`] and never destroys the native object.
//! Widget items live on the UI thread, so the view attaches with
//! [`Affinity::UiThread`].

use std::sync::Arc;

use serde_json::json;

use crate::context::UiContext;
use crate::error::Result;
use crate::handle::Ownership;
use crate::native::{NativeInterface, RawId};
use crate::proxy::{Affinity, Proxy};
use crate::registry::WrapperRegistry;
use crate::signal::SubscriptionId;

// ============================================================================
// SIGNALS
// ============================================================================

/// Signal names exposed by native list items
pub mod signals {
    /// Item selection toggled
    pub const SELECTION_CHANGED: &str = "SelectionChanged";
    /// Item expanded or contracted
    pub const EXPANDED_STATE_CHANGED: &str = "ExpandedStateChanged";
}

// ============================================================================
// ITEM VIEW
// ============================================================================

/// Borrowed view of one native list item
pub struct ListItem {
    proxy: Arc<Proxy>,
}

impl ListItem {
    /// Attach a view to an item owned by its containing widget
    pub fn attach(
        native: Arc<dyn NativeInterface>,
        ctx: Arc<UiContext>,
        registry: Arc<WrapperRegistry>,
        id: RawId,
    ) -> Result<Self> {
        let proxy = Proxy::attach(
            native,
            ctx,
            registry,
            id,
            Ownership::Borrowed,
            Affinity::UiThread,
        )?;
        Ok(ListItem { proxy })
    }

    /// The underlying proxy
    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    /// Position of the item within its widget, starting at 1
    pub fn index(&self) -> Result<i64> {
        let value = self.proxy.invoke("item_index", &[])?;
        Ok(value.as_i64().unwrap_or(0))
    }

    /// Whether the item is selected
    pub fn is_selected(&self) -> Result<bool> {
        let value = self.proxy.invoke("item_is_selected", &[])?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Select or deselect the item
    pub fn set_selected(&self, selected: bool) -> Result<()> {
        self.proxy
            .invoke("item_set_selected", &[json!(selected)])
            .map(drop)
    }

    /// Whether the item subtree is expanded
    pub fn is_expanded(&self) -> Result<bool> {
        let value = self.proxy.invoke("item_is_expanded", &[])?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Expand or contract the item subtree
    pub fn set_expanded(&self, expanded: bool) -> Result<()> {
        self.proxy
            .invoke("item_set_expanded", &[json!(expanded)])
            .map(drop)
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Redraw the whole item
    pub fn update(&self) -> Result<()> {
        self.proxy.invoke("item_update", &[]).map(drop)
    }

    /// Redraw one named part of the item
    pub fn update_field(&self, part: &str) -> Result<()> {
        self.proxy
            .invoke("item_update_field", &[json!(part)])
            .map(drop)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Subscribe to selection changes
    pub fn on_selection_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::SELECTION_CHANGED, move |payload| {
            handler(payload.flag("selected").unwrap_or(false));
            None
        })
    }

    /// Subscribe to expansion changes
    pub fn on_expanded_state_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.proxy
            .subscribe(signals::EXPANDED_STATE_CHANGED, move |payload| {
                handler(payload.flag("expanded").unwrap_or(false));
                None
            })
    }

    /// Detach a previously registered subscriber
    pub fn unsubscribe(&self, signal: &str, subscription: SubscriptionId) -> Result<()> {
        self.proxy.unsubscribe(signal, subscription)
    }

    /// Dispose the view, leaving the native item alive
    pub fn dispose(&self) -> Result<()> {
        self.proxy.dispose()
    }
}

// ============================================================================
// TESTS
// ============================================================================
