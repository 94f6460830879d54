//! # Calculator Demo Application
//!
//! A small two-operand calculator built on the in-process widget model, used
//! as the target of the bundled `CalculatorTest`. Its window exposes:
//!
//! - `FirstNumberTextBox` and `SecondNumberTextBox` for the operands
//! - `AddCommand`, whose activation runs the add command
//! - `ResultTextBlock`, updated through a queued binding update after the
//!   command runs, like a view-model property change would be

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::harness::HarnessResult;
use crate::ui::{Application, UiContext, UiDispatcher, WidgetKind, Window};

pub const FIRST_NUMBER: &str = "FirstNumberTextBox";
pub const SECOND_NUMBER: &str = "SecondNumberTextBox";
pub const ADD_COMMAND: &str = "AddCommand";
pub const RESULT: &str = "ResultTextBlock";

/// Text shown when an operand is not a number
pub const INVALID_INPUT: &str = "Invalid input";

/// Calculator state behind the window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatorViewModel {
    pub first_number: String,
    pub second_number: String,
    pub result: String,
}

impl CalculatorViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the two operands into `result`
    pub fn add(&mut self) {
        self.result = match (
            parse_operand(&self.first_number),
            parse_operand(&self.second_number),
        ) {
            (Some(a), Some(b)) if (a + b).is_finite() => format_number(a + b),
            _ => INVALID_INPUT.to_string(),
        };
    }
}

fn parse_operand(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Canonical text of a result: `9`, `2.5`, never `-0`
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

/// The calculator application, launched with a fresh view-model
#[derive(Debug, Default)]
pub struct CalculatorApp {
    view_model: CalculatorViewModel,
}

impl CalculatorApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view_model(view_model: CalculatorViewModel) -> Self {
        Self { view_model }
    }
}

impl Application for CalculatorApp {
    fn build_window(self, _dispatcher: &UiDispatcher) -> HarnessResult<Window> {
        let mut window = Window::new("Calculator")
            .with_text_box(FIRST_NUMBER, self.view_model.first_number.clone())
            .with_text_box(SECOND_NUMBER, self.view_model.second_number.clone())
            .with_button(ADD_COMMAND, "Add")
            .with_text_block(RESULT, self.view_model.result.clone());

        let first = window.find(FIRST_NUMBER, WidgetKind::TextBox)?;
        let second = window.find(SECOND_NUMBER, WidgetKind::TextBox)?;
        let add = window.find(ADD_COMMAND, WidgetKind::Button)?;
        let result = window.find(RESULT, WidgetKind::TextBlock)?;

        let view_model = Rc::new(RefCell::new(self.view_model));
        window.on_activated(&add, move |ctx: &mut UiContext| {
            let text = {
                let window = ctx.window();
                let mut vm = view_model.borrow_mut();
                vm.first_number = window.text(&first).unwrap_or_default();
                vm.second_number = window.text(&second).unwrap_or_default();
                vm.add();
                vm.result.clone()
            };
            debug!(result = %text, "add command executed");

            let result = result.clone();
            let update = ctx.post(move |ctx| {
                if let Err(err) = ctx.window_mut().set_text(&result, text) {
                    warn!("failed to update result: {}", err);
                }
            });
            if let Err(err) = update {
                warn!("failed to queue result update: {}", err);
            }
        })?;

        Ok(window)
    }
}
