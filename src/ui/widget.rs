//! Root window and the widgets it owns.
//!
//! A `Window` lives on the UI thread only: activation handlers are `Rc`
//! closures, which keeps the window `!Send`. Code off the UI thread holds
//! `WidgetHandle`s and goes through the dispatcher.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use super::dispatcher::UiContext;
use crate::harness::{HarnessError, HarnessResult};

/// Kind of an addressable widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    /// Editable single-line text field
    TextBox,
    /// Clickable button with an activation notification
    Button,
    /// Read-only text label
    TextBlock,
}

impl WidgetKind {
    /// Word used in "not found" messages
    pub fn noun(&self) -> &'static str {
        match self {
            WidgetKind::Button => "button",
            WidgetKind::TextBox | WidgetKind::TextBlock => "control",
        }
    }
}

/// Resolved reference to a widget. A lookup result, not a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WidgetHandle {
    name: String,
    kind: WidgetKind,
}

impl WidgetHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }
}

pub(crate) type ActivationHandler = Rc<dyn Fn(&mut UiContext)>;

#[derive(Clone)]
struct Subscription {
    handler: ActivationHandler,
    once: bool,
}

enum WidgetState {
    TextBox {
        text: String,
    },
    Button {
        content: String,
        enabled: bool,
        activated: Vec<Subscription>,
    },
    TextBlock {
        text: String,
    },
}

impl WidgetState {
    fn kind(&self) -> WidgetKind {
        match self {
            WidgetState::TextBox { .. } => WidgetKind::TextBox,
            WidgetState::Button { .. } => WidgetKind::Button,
            WidgetState::TextBlock { .. } => WidgetKind::TextBlock,
        }
    }
}

struct Widget {
    name: String,
    state: WidgetState,
}

/// Top-level application window
pub struct Window {
    title: String,
    widgets: Vec<Widget>,
    closed: bool,
    on_closed: Vec<Box<dyn FnOnce(&Window)>>,
}

impl Window {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            widgets: Vec::new(),
            closed: false,
            on_closed: Vec::new(),
        }
    }

    pub fn with_text_box(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_widget(name, WidgetState::TextBox { text: text.into() })
    }

    pub fn with_button(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.with_widget(
            name,
            WidgetState::Button {
                content: content.into(),
                enabled: true,
                activated: Vec::new(),
            },
        )
    }

    pub fn with_text_block(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_widget(name, WidgetState::TextBlock { text: text.into() })
    }

    fn with_widget(mut self, name: impl Into<String>, state: WidgetState) -> Self {
        self.widgets.push(Widget {
            name: name.into(),
            state,
        });
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Names of all widgets, in creation order
    pub fn widget_names(&self) -> Vec<&str> {
        self.widgets.iter().map(|w| w.name.as_str()).collect()
    }

    /// Resolve a widget by identifier, checking its kind
    pub fn find(&self, name: &str, kind: WidgetKind) -> HarnessResult<WidgetHandle> {
        self.ensure_open()?;
        let widget = self
            .widgets
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| HarnessError::WidgetNotFound {
                name: name.to_string(),
                kind,
            })?;

        let found = widget.state.kind();
        if found != kind {
            return Err(HarnessError::WidgetKindMismatch {
                name: name.to_string(),
                expected: kind,
                found,
            });
        }

        Ok(WidgetHandle {
            name: widget.name.clone(),
            kind,
        })
    }

    /// Text of a text box or text block; a button's content
    pub fn text(&self, handle: &WidgetHandle) -> HarnessResult<String> {
        let widget = self.widget(handle)?;
        Ok(match &widget.state {
            WidgetState::TextBox { text } | WidgetState::TextBlock { text } => text.clone(),
            WidgetState::Button { content, .. } => content.clone(),
        })
    }

    pub fn set_text(&mut self, handle: &WidgetHandle, value: impl Into<String>) -> HarnessResult<()> {
        let widget = self.widget_mut(handle)?;
        match &mut widget.state {
            WidgetState::TextBox { text } | WidgetState::TextBlock { text } => *text = value.into(),
            WidgetState::Button { content, .. } => *content = value.into(),
        }
        Ok(())
    }

    /// Disabled buttons ignore activation
    pub fn set_enabled(&mut self, handle: &WidgetHandle, value: bool) -> HarnessResult<()> {
        match &mut self.widget_mut(handle)?.state {
            WidgetState::Button { enabled, .. } => {
                *enabled = value;
                Ok(())
            }
            other => Err(HarnessError::WidgetKindMismatch {
                name: handle.name.clone(),
                expected: WidgetKind::Button,
                found: other.kind(),
            }),
        }
    }

    /// Subscribe to a button's activation notification
    pub fn on_activated<F>(&mut self, handle: &WidgetHandle, handler: F) -> HarnessResult<()>
    where
        F: Fn(&mut UiContext) + 'static,
    {
        self.subscribe(handle, Rc::new(handler), false)
    }

    /// Subscribe for the next activation only
    pub fn on_activated_once<F>(&mut self, handle: &WidgetHandle, handler: F) -> HarnessResult<()>
    where
        F: Fn(&mut UiContext) + 'static,
    {
        self.subscribe(handle, Rc::new(handler), true)
    }

    fn subscribe(
        &mut self,
        handle: &WidgetHandle,
        handler: ActivationHandler,
        once: bool,
    ) -> HarnessResult<()> {
        match &mut self.widget_mut(handle)?.state {
            WidgetState::Button { activated, .. } => {
                activated.push(Subscription { handler, once });
                Ok(())
            }
            other => Err(HarnessError::WidgetKindMismatch {
                name: handle.name.clone(),
                expected: WidgetKind::Button,
                found: other.kind(),
            }),
        }
    }

    /// Handlers to run for one activation, in subscription order. One-shot
    /// subscriptions are removed. A disabled button yields none.
    pub(crate) fn take_activation(
        &mut self,
        handle: &WidgetHandle,
    ) -> HarnessResult<Vec<ActivationHandler>> {
        match &mut self.widget_mut(handle)?.state {
            WidgetState::Button {
                enabled: false, ..
            } => Ok(Vec::new()),
            WidgetState::Button { activated, .. } => {
                let handlers = activated.iter().map(|s| s.handler.clone()).collect();
                activated.retain(|s| !s.once);
                Ok(handlers)
            }
            other => Err(HarnessError::WidgetKindMismatch {
                name: handle.name.clone(),
                expected: WidgetKind::Button,
                found: other.kind(),
            }),
        }
    }

    /// Run `callback` when the window closes. Callbacks see the final
    /// widget state; lookups still succeed inside them.
    pub fn on_closed<F>(&mut self, callback: F)
    where
        F: FnOnce(&Window) + 'static,
    {
        self.on_closed.push(Box::new(callback));
    }

    /// Close the window. Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        for callback in std::mem::take(&mut self.on_closed) {
            callback(self);
        }
        self.closed = true;
        true
    }

    fn ensure_open(&self) -> HarnessResult<()> {
        if self.closed {
            Err(HarnessError::WindowClosed)
        } else {
            Ok(())
        }
    }

    fn widget(&self, handle: &WidgetHandle) -> HarnessResult<&Widget> {
        self.ensure_open()?;
        self.widgets
            .iter()
            .find(|w| w.name == handle.name)
            .ok_or_else(|| HarnessError::WidgetNotFound {
                name: handle.name.clone(),
                kind: handle.kind,
            })
    }

    fn widget_mut(&mut self, handle: &WidgetHandle) -> HarnessResult<&mut Widget> {
        self.ensure_open()?;
        self.widgets
            .iter_mut()
            .find(|w| w.name == handle.name)
            .ok_or_else(|| HarnessError::WidgetNotFound {
                name: handle.name.clone(),
                kind: handle.kind,
            })
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("title", &self.title)
            .field("widgets", &self.widget_names())
            .field("closed", &self.closed)
            .finish()
    }
}
