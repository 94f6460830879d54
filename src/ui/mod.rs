pub mod dispatcher;
pub mod lifetime;
pub mod widget;

pub use dispatcher::{UiContext, UiDispatcher};
pub use lifetime::{AppLifetime, Application};
pub use widget::{WidgetHandle, WidgetKind, Window};
